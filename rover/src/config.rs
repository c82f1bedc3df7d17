//! Runtime settings, loaded from an optional JSON file and overridden from
//! the command line.

use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::framer::ErrorPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    pub port: String,
    pub baud: u32,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud: 38400,
        }
    }
}

/// Capacity of each queue between the tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub ack: usize,
    pub cfg: usize,
    pub nav: usize,
    pub gga: usize,
    /// Requests waiting for the receiver link
    pub outbound: usize,
    /// Correction frames waiting for the correction port
    pub corrections: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            ack: 8,
            cfg: 4,
            nav: 4,
            gga: 4,
            outbound: 32,
            corrections: 64,
        }
    }
}

/// Receiver configuration applied once the tasks are running
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupSettings {
    pub update_rate_ms: Option<u32>,
    /// Leave GGA as the only NMEA sentence on UART1
    pub minimum_nmea: bool,
}

impl Default for StartupSettings {
    fn default() -> Self {
        Self {
            update_rate_ms: Some(1000),
            minimum_nmea: true,
        }
    }
}

/// Source of the GGA sentences sent to the caster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GgaMode {
    /// Latest sentence produced by the receiver
    #[default]
    Live,
    /// Built from the reference position
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferencePosition {
    pub lat: f64,
    pub lon: f64,
    /// Meters above mean sea level
    pub alt: f64,
    /// Geoid separation in meters
    pub sep: f64,
}

impl Default for ReferencePosition {
    fn default() -> Self {
        Self {
            lat: 50.390281,
            lon: 7.3161025,
            alt: 269.7,
            sep: 46.9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NtripSettings {
    pub server: String,
    pub port: u16,
    /// Empty to request the sourcetable and pick the nearest mountpoint
    pub mountpoint: String,
    /// No `Authorization` header without a user
    pub user: Option<String>,
    pub password: String,
    pub version: String,
    /// `None` disables the GGA keepalive
    pub gga_interval_secs: Option<u64>,
    pub gga_mode: GgaMode,
    pub reference: ReferencePosition,
    pub connect_timeout_secs: u64,
    /// Cadence at which the stop signal is checked
    pub poll_interval_ms: u64,
}

impl Default for NtripSettings {
    fn default() -> Self {
        Self {
            server: String::new(),
            port: 2101,
            mountpoint: String::new(),
            user: None,
            password: String::new(),
            version: "2.0".to_string(),
            gga_interval_secs: Some(10),
            gga_mode: GgaMode::Live,
            reference: ReferencePosition::default(),
            connect_timeout_secs: 10,
            poll_interval_ms: 1000,
        }
    }
}

impl NtripSettings {
    /// GGA keepalive period, `None` when disabled by a missing or zero value
    pub fn gga_interval(&self) -> Option<Duration> {
        self.gga_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// UART1, the receiver's UBX and NMEA link
    pub receiver: SerialSettings,
    /// UART2, where correction frames are written
    pub corrections: SerialSettings,
    pub queues: QueueSettings,
    pub error_policy: ErrorPolicy,
    /// Off unless set; replies are then awaited indefinitely
    pub reply_timeout_ms: Option<u64>,
    pub startup: StartupSettings,
    /// `None` runs the rover without a correction relay
    pub ntrip: Option<NtripSettings>,
    /// Probe the caster every 5 s and pause the relay while it is unreachable
    pub reachability_probe: bool,
    pub fix_log_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            receiver: SerialSettings {
                port: "/dev/ttyUSB0".to_string(),
                ..SerialSettings::default()
            },
            corrections: SerialSettings {
                port: "/dev/ttyUSB1".to_string(),
                ..SerialSettings::default()
            },
            queues: QueueSettings::default(),
            error_policy: ErrorPolicy::Log,
            reply_timeout_ms: None,
            startup: StartupSettings::default(),
            ntrip: None,
            reachability_probe: false,
            fix_log_interval_secs: 10,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn reply_timeout(&self) -> Option<Duration> {
        self.reply_timeout_ms.map(Duration::from_millis)
    }
}
