use chrono::prelude::*;
use core::{convert::TryFrom, fmt};

use crate::{
    cfg_val::{self, CfgValue, KeyId},
    error::DateTimeError,
    ParserError, Record,
};

/// GPS fix Type
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GpsFix {
    NoFix,
    DeadReckoningOnly,
    Fix2D,
    Fix3D,
    GPSPlusDeadReckoning,
    TimeOnlyFix,
}

impl From<u8> for GpsFix {
    fn from(raw: u8) -> Self {
        match raw {
            1 => GpsFix::DeadReckoningOnly,
            2 => GpsFix::Fix2D,
            3 => GpsFix::Fix3D,
            4 => GpsFix::GPSPlusDeadReckoning,
            5 => GpsFix::TimeOnlyFix,
            _ => GpsFix::NoFix,
        }
    }
}

/// Carrier phase range solution status
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CarrierSolution {
    None,
    Float,
    Fixed,
}

impl From<u64> for CarrierSolution {
    fn from(raw: u64) -> Self {
        match raw {
            1 => CarrierSolution::Float,
            2 => CarrierSolution::Fixed,
            _ => CarrierSolution::None,
        }
    }
}

/// Fix quality as reported to the user: the plain fix type, upgraded to RTK
/// when a carrier phase solution is in use
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FixType {
    Gps(GpsFix),
    RtkFloat,
    RtkFixed,
}

impl fmt::Display for FixType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixType::Gps(GpsFix::NoFix) => f.write_str("NO FIX"),
            FixType::Gps(GpsFix::DeadReckoningOnly) => f.write_str("DR"),
            FixType::Gps(GpsFix::Fix2D) => f.write_str("2D"),
            FixType::Gps(GpsFix::Fix3D) => f.write_str("3D"),
            FixType::Gps(GpsFix::GPSPlusDeadReckoning) => f.write_str("GNSS+DR"),
            FixType::Gps(GpsFix::TimeOnlyFix) => f.write_str("TIME ONLY"),
            FixType::RtkFloat => f.write_str("RTK FLOAT"),
            FixType::RtkFixed => f.write_str("RTK FIXED"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GnssId {
    Gps,
    Sbas,
    Galileo,
    BeiDou,
    Imes,
    Qzss,
    Glonass,
    Unknown(u8),
}

impl From<u8> for GnssId {
    fn from(raw: u8) -> Self {
        match raw {
            0 => GnssId::Gps,
            1 => GnssId::Sbas,
            2 => GnssId::Galileo,
            3 => GnssId::BeiDou,
            4 => GnssId::Imes,
            5 => GnssId::Qzss,
            6 => GnssId::Glonass,
            other => GnssId::Unknown(other),
        }
    }
}

/// Represents a world position
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Logitude in degrees
    pub lon: f64,

    /// Latitude in degrees
    pub lat: f64,

    /// Altitude above mean sea level in meters
    pub alt: f64,
}

fn field<T>(
    record: &Record,
    packet: &'static str,
    name: &'static str,
    get: impl Fn(&Record, &str) -> Option<T>,
) -> Result<T, ParserError> {
    get(record, name).ok_or(ParserError::InvalidField {
        packet,
        field: name,
    })
}

/// Navigation solution from a decoded NAV-PVT record
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct NavSolution {
    /// GPS time of week in ms
    pub itow: u32,
    /// UTC time, when the receiver reports both date and time as valid
    pub time: Option<DateTime<Utc>>,
    pub fix: GpsFix,
    pub carrier: CarrierSolution,
    /// Fix within DOP and accuracy masks
    pub fix_ok: bool,
    pub num_sv: u8,
    pub position: Position,
    /// Horizontal accuracy estimate in mm
    pub h_acc: u32,
    /// Vertical accuracy estimate in mm
    pub v_acc: u32,
    pub p_dop: f64,
}

impl NavSolution {
    pub fn fix_type(&self) -> FixType {
        match self.carrier {
            CarrierSolution::Fixed => FixType::RtkFixed,
            CarrierSolution::Float => FixType::RtkFloat,
            CarrierSolution::None => FixType::Gps(self.fix),
        }
    }
}

impl TryFrom<&Record> for NavSolution {
    type Error = ParserError;

    fn try_from(pvt: &Record) -> Result<Self, Self::Error> {
        const P: &str = "NAV-PVT";
        let u = |name| field(pvt, P, name, Record::get_u64);
        let f = |name| field(pvt, P, name, Record::get_f64);
        let time = if pvt.bit("valid", "valid_date") == Some(1)
            && pvt.bit("valid", "valid_time") == Some(1)
        {
            utc_time(pvt).ok()
        } else {
            None
        };
        Ok(Self {
            itow: u("itow")? as u32,
            time,
            fix: GpsFix::from(u("fix_type")? as u8),
            carrier: CarrierSolution::from(pvt.bit("flags", "carr_soln").unwrap_or_default()),
            fix_ok: pvt.bit("flags", "gnss_fix_ok") == Some(1),
            num_sv: u("num_sv")? as u8,
            position: Position {
                lon: f("lon")?,
                lat: f("lat")?,
                alt: f("h_msl")? * 1e-3,
            },
            h_acc: u("h_acc")? as u32,
            v_acc: u("v_acc")? as u32,
            p_dop: f("p_dop")?,
        })
    }
}

fn utc_time(pvt: &Record) -> Result<DateTime<Utc>, DateTimeError> {
    let part = |name| pvt.get_u64(name).unwrap_or_default() as u32;
    let date = NaiveDate::from_ymd_opt(part("year") as i32, part("month"), part("day"))
        .ok_or(DateTimeError::InvalidDate)?;
    let time = NaiveTime::from_hms_opt(part("hour"), part("min"), part("second"))
        .ok_or(DateTimeError::InvalidTime)?;
    const NANOS_LIM: u64 = 1_000_000_000;
    let nano = pvt.get_i64("nano").unwrap_or_default();
    if nano.unsigned_abs() >= NANOS_LIM {
        return Err(DateTimeError::InvalidNanoseconds);
    }

    let dt = NaiveDateTime::new(date, time) + chrono::Duration::nanoseconds(nano);

    Ok(DateTime::from_naive_utc_and_offset(dt, Utc))
}

/// One entry of a NAV-SAT record
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SatelliteInfo {
    pub gnss: GnssId,
    pub sv_id: u8,
    /// Carrier to noise ratio in dBHz
    pub cno: u8,
    /// Elevation in degrees
    pub elev: i8,
    /// Azimuth in degrees
    pub azim: i16,
    pub quality: u8,
    pub used: bool,
}

impl TryFrom<&Record> for SatelliteInfo {
    type Error = ParserError;

    fn try_from(sv: &Record) -> Result<Self, Self::Error> {
        const P: &str = "NAV-SAT";
        let u = |name| field(sv, P, name, Record::get_u64);
        let i = |name| field(sv, P, name, Record::get_i64);
        Ok(Self {
            gnss: GnssId::from(u("gnss_id")? as u8),
            sv_id: u("sv_id")? as u8,
            cno: u("cno")? as u8,
            elev: i("elev")? as i8,
            azim: i("azim")? as i16,
            quality: sv.bit("flags", "quality_ind").unwrap_or_default() as u8,
            used: sv.bit("flags", "sv_used") == Some(1),
        })
    }
}

/// Satellite list of a NAV-SAT record
pub fn satellites(nav_sat: &Record) -> Result<Vec<SatelliteInfo>, ParserError> {
    nav_sat
        .group("svs")
        .unwrap_or_default()
        .iter()
        .map(SatelliteInfo::try_from)
        .collect()
}

/// Enabled constellations
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SatelliteSystems {
    pub gps: bool,
    pub glonass: bool,
    pub galileo: bool,
    pub beidou: bool,
}

impl SatelliteSystems {
    pub const KEYS: [KeyId; 4] = [
        cfg_val::CFG_SIGNAL_GPS_ENA,
        cfg_val::CFG_SIGNAL_GLO_ENA,
        cfg_val::CFG_SIGNAL_GAL_ENA,
        cfg_val::CFG_SIGNAL_BDS_ENA,
    ];

    pub fn key_values(&self) -> [(KeyId, CfgValue); 4] {
        [
            (cfg_val::CFG_SIGNAL_GPS_ENA, CfgValue::Bool(self.gps)),
            (cfg_val::CFG_SIGNAL_GLO_ENA, CfgValue::Bool(self.glonass)),
            (cfg_val::CFG_SIGNAL_GAL_ENA, CfgValue::Bool(self.galileo)),
            (cfg_val::CFG_SIGNAL_BDS_ENA, CfgValue::Bool(self.beidou)),
        ]
    }

    /// Collect from CFG-VALGET items; keys not present stay disabled
    pub fn from_key_values(items: &[(KeyId, CfgValue)]) -> Self {
        let mut systems = Self::default();
        for (key, value) in items {
            let enabled = value.as_u64() != 0;
            match *key {
                cfg_val::CFG_SIGNAL_GPS_ENA => systems.gps = enabled,
                cfg_val::CFG_SIGNAL_GLO_ENA => systems.glonass = enabled,
                cfg_val::CFG_SIGNAL_GAL_ENA => systems.galileo = enabled,
                cfg_val::CFG_SIGNAL_BDS_ENA => systems.beidou = enabled,
                _ => {},
            }
        }
        systems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    fn pvt(carr_soln: u8, valid: u8) -> Record {
        Record::new()
            .with("itow", 1000u32)
            .with("year", 2024u16)
            .with("month", 5u8)
            .with("day", 17u8)
            .with("hour", 10u8)
            .with("min", 30u8)
            .with("second", 15u8)
            .with(
                "valid",
                Record::new()
                    .with("valid_date", valid)
                    .with("valid_time", valid),
            )
            .with("nano", -500i32)
            .with("fix_type", 3u8)
            .with(
                "flags",
                Record::new()
                    .with("gnss_fix_ok", 1u8)
                    .with("carr_soln", carr_soln),
            )
            .with("num_sv", 17u8)
            .with("lon", 7.3161025)
            .with("lat", 50.390281)
            .with("h_msl", 269_700i32)
            .with("h_acc", 14u32)
            .with("v_acc", 21u32)
            .with("p_dop", 1.2)
    }

    #[test]
    fn nav_solution_from_record() {
        let sol = NavSolution::try_from(&pvt(0, 1)).unwrap();
        assert_eq!(sol.fix_type(), FixType::Gps(GpsFix::Fix3D));
        assert!(sol.fix_ok);
        assert_eq!(sol.h_acc, 14);
        assert!((sol.position.alt - 269.7).abs() < 1e-9);
        let time = sol.time.unwrap();
        assert_eq!(time.year(), 2024);
        assert_eq!(time.second(), 14);
        assert_eq!(time.nanosecond(), 999_999_500);
    }

    #[test]
    fn carrier_solution_upgrades_fix_type() {
        assert_eq!(
            NavSolution::try_from(&pvt(1, 1)).unwrap().fix_type(),
            FixType::RtkFloat
        );
        assert_eq!(
            NavSolution::try_from(&pvt(2, 1)).unwrap().fix_type(),
            FixType::RtkFixed
        );
        assert_eq!(FixType::RtkFixed.to_string(), "RTK FIXED");
    }

    #[test]
    fn invalid_time_is_dropped() {
        assert_eq!(NavSolution::try_from(&pvt(0, 0)).unwrap().time, None);
    }

    #[test]
    fn missing_field_is_error() {
        let err = NavSolution::try_from(&Record::new()).unwrap_err();
        assert_eq!(
            err,
            ParserError::InvalidField {
                packet: "NAV-PVT",
                field: "itow",
            }
        );
    }

    #[test]
    fn satellites_from_group() {
        let sv = |id: u8, used: u8| {
            Record::new()
                .with("gnss_id", 6u8)
                .with("sv_id", id)
                .with("cno", 40u8)
                .with("elev", -3i8)
                .with("azim", 270i16)
                .with(
                    "flags",
                    Record::new().with("quality_ind", 7u8).with("sv_used", used),
                )
        };
        let record = Record::new().with("svs", Value::Group(vec![sv(1, 1), sv(2, 0)]));
        let list = satellites(&record).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].gnss, GnssId::Glonass);
        assert_eq!(list[0].elev, -3);
        assert!(list[0].used);
        assert!(!list[1].used);
    }

    #[test]
    fn satellite_systems_from_items() {
        let systems = SatelliteSystems::from_key_values(&[
            (cfg_val::CFG_SIGNAL_GPS_ENA, CfgValue::Bool(true)),
            (cfg_val::CFG_SIGNAL_BDS_ENA, CfgValue::Bool(true)),
            (cfg_val::CFG_RATE_MEAS, CfgValue::U2(1000)),
        ]);
        assert_eq!(
            systems,
            SatelliteSystems {
                gps: true,
                glonass: false,
                galileo: false,
                beidou: true,
            }
        );
    }
}
