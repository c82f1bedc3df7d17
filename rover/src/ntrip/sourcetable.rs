//! NTRIP sourcetable records and nearest mountpoint selection.

use serde::Serialize;

/// Last line of a sourcetable
pub const END_MARKER: &str = "ENDSOURCETABLE";

/// Mean Earth radius used for distances
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// One `STR` record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceEntry {
    pub mountpoint: String,
    pub identifier: String,
    pub format: String,
    pub format_details: String,
    /// 0 none, 1 L1, 2 L1 and L2
    pub carrier: Option<u8>,
    pub nav_system: String,
    pub network: String,
    pub country: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Caster expects GGA sentences from the client
    pub nmea: bool,
}

impl SourceEntry {
    /// Parse a `STR;...` line, `None` for other record types
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.trim_end().split(';');
        if fields.next()? != "STR" {
            return None;
        }
        let fields: Vec<&str> = fields.collect();
        let text = |idx: usize| fields.get(idx).copied().unwrap_or_default().to_string();
        let number = |idx: usize| fields.get(idx).and_then(|f| f.trim().parse::<f64>().ok());
        let mountpoint = text(0);
        if mountpoint.is_empty() {
            return None;
        }
        Some(Self {
            mountpoint,
            identifier: text(1),
            format: text(2),
            format_details: text(3),
            carrier: fields.get(4).and_then(|f| f.trim().parse().ok()),
            nav_system: text(5),
            network: text(6),
            country: text(7),
            lat: number(8),
            lon: number(9),
            nmea: fields.get(10).is_some_and(|f| f.trim() == "1"),
        })
    }

    /// Great circle distance to the entry's reference station, `None` when
    /// the record has no usable position
    pub fn distance_km(&self, lat: f64, lon: f64) -> Option<f64> {
        Some(haversine_km(lat, lon, self.lat?, self.lon?))
    }
}

pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Entry closest to `lat`/`lon` with its distance in km
pub fn nearest(entries: &[SourceEntry], lat: f64, lon: f64) -> Option<(&SourceEntry, f64)> {
    entries
        .iter()
        .filter_map(|entry| entry.distance_km(lat, lon).map(|d| (entry, d)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}
