//! NMEA 0183 sentences as emitted by u-blox receivers.

use chrono::{NaiveTime, Timelike};
use core::fmt::Write as _;

use crate::{
    constants::{NMEA_END_CHAR_1, NMEA_END_CHAR_2, NMEA_SYNC_CHAR},
    NmeaError,
};

/// Talker identifiers accepted after `$`, `P` marks proprietary sentences
pub const TALKERS: [&str; 8] = ["GA", "GB", "GI", "GL", "GN", "GP", "GQ", "P"];

/// CFG-MSG ids of the standard sentences (message class 0xF0)
pub const NMEA_MSG_IDS: [(u8, &str); 22] = [
    (0x00, "GGA"),
    (0x01, "GLL"),
    (0x02, "GSA"),
    (0x03, "GSV"),
    (0x04, "RMC"),
    (0x05, "VTG"),
    (0x06, "GRS"),
    (0x07, "GST"),
    (0x08, "ZDA"),
    (0x09, "GBS"),
    (0x0a, "DTM"),
    (0x0b, "RLM"),
    (0x0d, "GNS"),
    (0x0e, "THS"),
    (0x0f, "VLW"),
    (0x40, "GPQ"),
    (0x41, "TXT"),
    (0x42, "GNQ"),
    (0x43, "GLQ"),
    (0x44, "GBQ"),
    (0x45, "GAQ"),
    (0x47, "GQQ"),
];

const GGA: &[&str] = &[
    "time",
    "lat",
    "ns",
    "lon",
    "ew",
    "quality",
    "num_sv",
    "hdop",
    "alt",
    "alt_unit",
    "sep",
    "sep_unit",
    "diff_age",
    "diff_station",
];
const GLL: &[&str] = &["lat", "ns", "lon", "ew", "time", "status", "pos_mode"];
const GNS: &[&str] = &[
    "time",
    "lat",
    "ns",
    "lon",
    "ew",
    "pos_mode",
    "num_sv",
    "hdop",
    "alt",
    "sep",
    "diff_age",
    "diff_station",
    "nav_status",
];
const GSA: &[&str] = &[
    "op_mode", "nav_mode", "svid_01", "svid_02", "svid_03", "svid_04", "svid_05", "svid_06",
    "svid_07", "svid_08", "svid_09", "svid_10", "svid_11", "svid_12", "pdop", "hdop", "vdop",
    "system_id",
];
const GST: &[&str] = &[
    "time",
    "range_rms",
    "std_major",
    "std_minor",
    "orient",
    "std_lat",
    "std_long",
    "std_alt",
];
const GSV: &[&str] = &[
    "num_msg", "msg_num", "num_sv", "svid_01", "elv_01", "az_01", "cno_01", "svid_02", "elv_02",
    "az_02", "cno_02", "svid_03", "elv_03", "az_03", "cno_03", "svid_04", "elv_04", "az_04",
    "cno_04",
];
const GRS: &[&str] = &[
    "time",
    "mode",
    "residual_01",
    "residual_02",
    "residual_03",
    "residual_04",
    "residual_05",
    "residual_06",
    "residual_07",
    "residual_08",
    "residual_09",
    "residual_10",
    "residual_11",
    "residual_12",
    "system_id",
    "signal_id",
];
const GBS: &[&str] = &[
    "time",
    "err_lat",
    "err_lon",
    "err_alt",
    "svid",
    "prob",
    "bias",
    "stddev",
    "system_id",
    "signal_id",
];
const RMC: &[&str] = &[
    "time",
    "status",
    "lat",
    "ns",
    "lon",
    "ew",
    "spd",
    "cog",
    "date",
    "mv",
    "mv_ew",
    "pos_mode",
    "nav_status",
];
const TXT: &[&str] = &["num_msg", "msg_num", "msg_type", "text"];
const VTG: &[&str] = &[
    "cogt",
    "cogt_unit",
    "cogm",
    "cogm_unit",
    "sogn",
    "sogn_unit",
    "sogk",
    "sogk_unit",
    "pos_mode",
];
const ZDA: &[&str] = &["time", "day", "month", "year", "ltzh", "ltzn"];
const DTM: &[&str] = &[
    "datum",
    "sub_datum",
    "lat",
    "ns",
    "lon",
    "ew",
    "alt",
    "ref_datum",
];
const VLW: &[&str] = &[
    "twd", "twd_unit", "wd", "wd_unit", "tgd", "tgd_unit", "gd", "gd_unit",
];
const THS: &[&str] = &["headt", "mi"];
const RLM: &[&str] = &["beacon", "time", "code", "body"];
const PUBX: &[&str] = &[
    "msg_id", "time", "lat", "ns", "lon", "ew", "alt_ref", "nav_stat", "h_acc", "v_acc", "sog",
    "cog", "v_vel", "diff_age", "hdop", "vdop", "tdop", "num_svs", "reserved", "dr",
];

/// Positional field names of sentence `id` from talker `talker`
pub fn schema(talker: &str, id: &str) -> Option<&'static [&'static str]> {
    if talker == "P" {
        return (id == "UBX").then_some(PUBX);
    }
    Some(match id {
        "GGA" => GGA,
        "GLL" => GLL,
        "GNS" => GNS,
        "GSA" => GSA,
        "GST" => GST,
        "GSV" => GSV,
        "GRS" => GRS,
        "GBS" => GBS,
        "RMC" => RMC,
        "TXT" => TXT,
        "VTG" => VTG,
        "ZDA" => ZDA,
        "DTM" => DTM,
        "VLW" => VLW,
        "THS" => THS,
        "RLM" => RLM,
        _ => return None,
    })
}

/// XOR of every byte between `$` and `*`
pub fn checksum(content: &str) -> u8 {
    content.bytes().fold(0, |acc, b| acc ^ b)
}

/// Structural checks shared by [`is_valid`] and [`Sentence::parse`]
fn split_frame(line: &str) -> Result<&str, NmeaError> {
    let line = line.trim_end_matches([char::from(NMEA_END_CHAR_1), char::from(NMEA_END_CHAR_2)]);
    let body = line
        .strip_prefix(char::from(NMEA_SYNC_CHAR))
        .ok_or(NmeaError::Malformed("missing '$'"))?;
    let mut parts = body.split('*');
    let content = parts.next().unwrap_or_default();
    let received = parts.next().ok_or(NmeaError::Malformed("missing '*'"))?;
    if parts.next().is_some() {
        return Err(NmeaError::Malformed("more than one '*'"));
    }
    if received.len() != 2 || !received.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(NmeaError::Malformed("checksum is not two hex digits"));
    }
    let received =
        u8::from_str_radix(received, 16).map_err(|_| NmeaError::Malformed("checksum"))?;
    let expect = checksum(content);
    if expect != received {
        return Err(NmeaError::InvalidChecksum {
            expect,
            got: received,
        });
    }
    Ok(content)
}

/// Whether `line` is a well formed sentence with a matching checksum
pub fn is_valid(line: &str) -> bool {
    split_frame(line).is_ok()
}

/// One decoded sentence
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Sentence {
    talker: String,
    id: String,
    fields: Vec<String>,
    checksum: u8,
}

impl Sentence {
    /// Build an outgoing sentence, computing its checksum
    pub fn new(talker: &str, id: &str, fields: Vec<String>) -> Self {
        let mut sentence = Self {
            talker: talker.to_string(),
            id: id.to_string(),
            fields,
            checksum: 0,
        };
        sentence.checksum = checksum(&sentence.content());
        sentence
    }

    /// Validate and decode one line, with or without its CRLF terminator
    pub fn parse(line: &str) -> Result<Self, NmeaError> {
        let content = split_frame(line)?;
        let mut tokens = content.split(',');
        let address = tokens.next().unwrap_or_default();
        let (talker, id) = if let Some(id) = address.strip_prefix('P') {
            ("P", id)
        } else {
            match (address.get(..2), address.get(2..)) {
                (Some(talker), Some(id)) if !id.is_empty() => (talker, id),
                _ => return Err(NmeaError::Malformed("address field")),
            }
        };
        if !TALKERS.contains(&talker) {
            return Err(NmeaError::UnknownTalker(talker.to_string()));
        }
        if schema(talker, id).is_none() {
            return Err(NmeaError::UnknownSentence(address.to_string()));
        }
        Ok(Self {
            talker: talker.to_string(),
            id: id.to_string(),
            fields: tokens.map(str::to_string).collect(),
            checksum: checksum(content),
        })
    }

    pub fn talker(&self) -> &str {
        &self.talker
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    /// Two digit upper case hex, as found after `*`
    pub fn checksum_hex(&self) -> String {
        format!("{:02X}", self.checksum)
    }

    /// Field by schema name, `None` when absent or empty
    pub fn field(&self, name: &str) -> Option<&str> {
        let idx = schema(&self.talker, &self.id)?
            .iter()
            .position(|n| *n == name)?;
        self.fields
            .get(idx)
            .map(String::as_str)
            .filter(|f| !f.is_empty())
    }

    fn content(&self) -> String {
        let mut content = format!("{}{}", self.talker, self.id);
        for field in &self.fields {
            content.push(',');
            content.push_str(field);
        }
        content
    }

    /// Wire form with checksum and CRLF
    pub fn to_line(&self) -> String {
        format!("${}*{}\r\n", self.content(), self.checksum_hex())
    }
}

/// Position fix carried by a GGA sentence
#[derive(Debug, Clone, PartialEq)]
pub struct Gga {
    pub time: NaiveTime,
    /// Degrees, negative south
    pub lat: f64,
    /// Degrees, negative west
    pub lon: f64,
    pub quality: u8,
    pub num_sv: u8,
    pub hdop: f64,
    /// Altitude above mean sea level in meters
    pub alt: f64,
    /// Geoid separation in meters
    pub sep: f64,
    pub diff_age: Option<f64>,
    pub diff_station: Option<u16>,
}

/// Minutes are rounded to 1e-5 before the degrees are split off, so a
/// rounding carry never leaves `60.00000` minutes behind.
fn format_coordinate(value: f64, degree_digits: usize) -> String {
    const UNITS_PER_MINUTE: u64 = 100_000;
    const UNITS_PER_DEGREE: u64 = 60 * UNITS_PER_MINUTE;
    let units = (value.abs() * 60.0 * UNITS_PER_MINUTE as f64).round() as u64;
    let degrees = units / UNITS_PER_DEGREE;
    let minutes = units % UNITS_PER_DEGREE;
    format!(
        "{:0width$}{:02}.{:05}",
        degrees,
        minutes / UNITS_PER_MINUTE,
        minutes % UNITS_PER_MINUTE,
        width = degree_digits
    )
}

fn parse_coordinate(text: &str, hemisphere: &str, degree_digits: usize) -> Option<f64> {
    let degrees: f64 = text.get(..degree_digits)?.parse().ok()?;
    let minutes: f64 = text.get(degree_digits..)?.parse().ok()?;
    let value = degrees + minutes / 60.0;
    match hemisphere {
        "N" | "E" => Some(value),
        "S" | "W" => Some(-value),
        _ => None,
    }
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    let hour = text.get(0..2)?.parse().ok()?;
    let min = text.get(2..4)?.parse().ok()?;
    let secs: f64 = text.get(4..)?.parse().ok()?;
    NaiveTime::from_hms_milli_opt(
        hour,
        min,
        secs.trunc() as u32,
        (secs.fract() * 1000.0).round() as u32,
    )
}

impl Gga {
    pub fn to_sentence(&self, talker: &str) -> Sentence {
        let mut time = String::new();
        // writing to a String cannot fail
        let _ = write!(
            time,
            "{:02}{:02}{:02}.{:02}",
            self.time.hour(),
            self.time.minute(),
            self.time.second(),
            self.time.nanosecond() / 10_000_000 % 100
        );
        let fields = vec![
            time,
            format_coordinate(self.lat, 2),
            if self.lat < 0.0 { "S" } else { "N" }.to_string(),
            format_coordinate(self.lon, 3),
            if self.lon < 0.0 { "W" } else { "E" }.to_string(),
            self.quality.to_string(),
            format!("{:02}", self.num_sv),
            format!("{:.2}", self.hdop),
            format!("{:.1}", self.alt),
            "M".to_string(),
            format!("{:.1}", self.sep),
            "M".to_string(),
            self.diff_age.map(|a| format!("{:.1}", a)).unwrap_or_default(),
            self.diff_station
                .map(|s| format!("{:04}", s))
                .unwrap_or_default(),
        ];
        Sentence::new(talker, "GGA", fields)
    }

    pub fn from_sentence(sentence: &Sentence) -> Result<Self, NmeaError> {
        if sentence.id() != "GGA" {
            return Err(NmeaError::UnknownSentence(sentence.id().to_string()));
        }
        let invalid = NmeaError::Malformed("GGA field");
        let number = |name| -> Result<f64, NmeaError> {
            sentence
                .field(name)
                .and_then(|f| f.parse().ok())
                .ok_or(invalid.clone())
        };
        Ok(Self {
            time: sentence
                .field("time")
                .and_then(parse_time)
                .ok_or(invalid.clone())?,
            lat: sentence
                .field("lat")
                .zip(sentence.field("ns"))
                .and_then(|(v, h)| parse_coordinate(v, h, 2))
                .ok_or(invalid.clone())?,
            lon: sentence
                .field("lon")
                .zip(sentence.field("ew"))
                .and_then(|(v, h)| parse_coordinate(v, h, 3))
                .ok_or(invalid.clone())?,
            quality: number("quality")? as u8,
            num_sv: number("num_sv")? as u8,
            hdop: number("hdop")?,
            alt: number("alt")?,
            sep: number("sep").unwrap_or_default(),
            diff_age: sentence.field("diff_age").and_then(|f| f.parse().ok()),
            diff_station: sentence.field("diff_station").and_then(|f| f.parse().ok()),
        })
    }
}
