use core::fmt;
use std::io;

use rover_proto::{ErrorKind, NmeaError, ParserError};

/// Failure while reading frames off the receiver link
#[derive(Debug)]
pub enum FramerError {
    /// Serial transport failed or was closed mid-frame
    Io(io::Error),
    /// Binary frame rejected by the codec
    Ubx(ParserError),
    /// Sentence rejected by the codec
    Nmea(NmeaError),
    /// RTCM3 frame could not be read to its announced length
    Rtcm { expect: usize, got: usize },
}

impl FramerError {
    /// Taxonomy bucket, `None` for transport failures
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            FramerError::Io(_) => None,
            FramerError::Ubx(e) => Some(e.kind()),
            FramerError::Nmea(e) => Some(e.kind()),
            FramerError::Rtcm { .. } => Some(ErrorKind::Format),
        }
    }
}

impl fmt::Display for FramerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramerError::Io(e) => write!(f, "serial transport: {}", e),
            FramerError::Ubx(e) => write!(f, "UBX frame: {}", e),
            FramerError::Nmea(e) => write!(f, "NMEA sentence: {}", e),
            FramerError::Rtcm { expect, got } => {
                write!(f, "RTCM3 frame: expect {} bytes, got {}", expect, got)
            },
        }
    }
}

impl std::error::Error for FramerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FramerError::Io(e) => Some(e),
            FramerError::Ubx(e) => Some(e),
            FramerError::Nmea(e) => Some(e),
            FramerError::Rtcm { .. } => None,
        }
    }
}

impl From<io::Error> for FramerError {
    fn from(e: io::Error) -> Self {
        FramerError::Io(e)
    }
}

impl From<ParserError> for FramerError {
    fn from(e: ParserError) -> Self {
        FramerError::Ubx(e)
    }
}

impl From<NmeaError> for FramerError {
    fn from(e: NmeaError) -> Self {
        FramerError::Nmea(e)
    }
}

/// Failure of a receiver command. A NAK is not an error.
#[derive(Debug)]
pub enum CommandError {
    /// Request could not be built
    Encode(ParserError),
    /// Reply arrived but does not decode
    Decode(ParserError),
    /// Outbound or reply queue was closed
    ChannelClosed,
    /// No reply within the configured reply timeout
    Timeout,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Encode(e) => write!(f, "cannot build request: {}", e),
            CommandError::Decode(e) => write!(f, "cannot decode reply: {}", e),
            CommandError::ChannelClosed => f.write_str("receiver channel closed"),
            CommandError::Timeout => f.write_str("no reply from receiver"),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::Encode(e) | CommandError::Decode(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure of one NTRIP session
#[derive(Debug)]
pub enum NtripError {
    /// Connection refused, reset, aborted or timed out
    Transport(io::Error),
    ConnectTimeout,
    /// Status line with a code of 400 or above
    Status(String),
    /// Caster closed the connection or sent something that is not a status line
    Protocol(&'static str),
    /// Sourcetable listed no mountpoint with a usable position
    NoMountpoint,
}

impl fmt::Display for NtripError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NtripError::Transport(e) => write!(f, "caster connection: {}", e),
            NtripError::ConnectTimeout => f.write_str("caster connection: timeout"),
            NtripError::Status(line) => write!(f, "caster refused request: {}", line),
            NtripError::Protocol(what) => write!(f, "unexpected caster response: {}", what),
            NtripError::NoMountpoint => f.write_str("sourcetable has no usable mountpoint"),
        }
    }
}

impl std::error::Error for NtripError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NtripError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for NtripError {
    fn from(e: io::Error) -> Self {
        NtripError::Transport(e)
    }
}
