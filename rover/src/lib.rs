//! Rover side of an RTK setup.
//!
//! A [`framer::StreamFramer`] splits the receiver link into UBX replies, NMEA
//! sentences and RTCM3 frames and feeds them to bounded queues. The
//! [`handler::GnssHandler`] drives configuration and telemetry requests over
//! those queues, a [`writer::UartWriter`] per serial port serializes
//! everything going out, and the [`ntrip::NtripClient`] relays corrections
//! from a caster to the receiver's second port.

pub mod cli;
pub mod config;
pub mod error;
pub mod framer;
pub mod handler;
pub mod logging;
pub mod ntrip;
pub mod position;
pub mod queue;
pub mod status;
pub mod wire;
pub mod writer;

pub use error::{CommandError, FramerError, NtripError};
pub use framer::{ErrorPolicy, FramerStats, Routes, StreamFramer};
pub use handler::{GnssHandler, Precision, ReplyQueues};
pub use ntrip::{NtripClient, SessionOutcome, SessionState};
pub use status::{StatusFlag, StopSignal};
pub use writer::{OutboundFrame, UartWriter};
