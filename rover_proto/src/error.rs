use core::fmt;

/// Coarse classification of every decode failure, shared by the binary and
/// text codecs so callers can count or filter without matching variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed header, length or field layout
    Format,
    /// Computed checksum differs from the received one
    Checksum,
    /// Well formed, but the class/id or talker is not in the catalogue
    UnknownIdentity,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Format => f.write_str("format"),
            ErrorKind::Checksum => f.write_str("checksum"),
            ErrorKind::UnknownIdentity => f.write_str("unknown identity"),
        }
    }
}

/// Error that possible during UBX packets parsing or building
#[derive(Debug, Clone, PartialEq)]
pub enum ParserError {
    InvalidHeader {
        expect: [u8; 2],
        got: [u8; 2],
    },
    InvalidPacketLen {
        packet: &'static str,
        expect: usize,
        got: usize,
    },
    InvalidChecksum {
        expect: u16,
        got: u16,
    },
    UnknownPacket {
        class: u8,
        msg_id: u8,
        subtype: Option<u8>,
    },
    InvalidField {
        packet: &'static str,
        field: &'static str,
    },
}

impl ParserError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ParserError::InvalidHeader { .. }
            | ParserError::InvalidPacketLen { .. }
            | ParserError::InvalidField { .. } => ErrorKind::Format,
            ParserError::InvalidChecksum { .. } => ErrorKind::Checksum,
            ParserError::UnknownPacket { .. } => ErrorKind::UnknownIdentity,
        }
    }
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParserError::InvalidHeader { expect, got } => write!(
                f,
                "Invalid packet header, expect {:02x}{:02x}, got {:02x}{:02x}",
                expect[0], expect[1], got[0], got[1]
            ),
            ParserError::InvalidPacketLen {
                packet,
                expect,
                got,
            } => write!(
                f,
                "Invalid packet({}) length, expect {}, got {}",
                packet, expect, got
            ),
            ParserError::InvalidChecksum { expect, got } => write!(
                f,
                "Not valid packet's checksum, expect {:x}, got {:x}",
                expect, got
            ),
            ParserError::UnknownPacket {
                class,
                msg_id,
                subtype: Some(subtype),
            } => write!(
                f,
                "Unknown packet class {:#04x}, id {:#04x}, type {:#04x}",
                class, msg_id, subtype
            ),
            ParserError::UnknownPacket {
                class,
                msg_id,
                subtype: None,
            } => write!(f, "Unknown packet class {:#04x}, id {:#04x}", class, msg_id),
            ParserError::InvalidField { packet, field } => {
                write!(f, "Invalid field {} of packet {}", field, packet)
            },
        }
    }
}

impl std::error::Error for ParserError {}

/// Error that possible during NMEA sentence parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NmeaError {
    Malformed(&'static str),
    InvalidChecksum { expect: u8, got: u8 },
    UnknownTalker(String),
    UnknownSentence(String),
}

impl NmeaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NmeaError::Malformed(_) => ErrorKind::Format,
            NmeaError::InvalidChecksum { .. } => ErrorKind::Checksum,
            NmeaError::UnknownTalker(_) | NmeaError::UnknownSentence(_) => {
                ErrorKind::UnknownIdentity
            },
        }
    }
}

impl fmt::Display for NmeaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NmeaError::Malformed(reason) => write!(f, "Malformed sentence: {}", reason),
            NmeaError::InvalidChecksum { expect, got } => write!(
                f,
                "Not valid sentence checksum, expect {:02X}, got {:02X}",
                expect, got
            ),
            NmeaError::UnknownTalker(talker) => write!(f, "Unknown talker {}", talker),
            NmeaError::UnknownSentence(id) => write!(f, "Unknown sentence {}", id),
        }
    }
}

impl std::error::Error for NmeaError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeError {
    InvalidDate,
    InvalidTime,
    InvalidNanoseconds,
}

impl fmt::Display for DateTimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateTimeError::InvalidDate => f.write_str("invalid date"),
            DateTimeError::InvalidTime => f.write_str("invalid time"),
            DateTimeError::InvalidNanoseconds => f.write_str("invalid nanoseconds"),
        }
    }
}

impl std::error::Error for DateTimeError {}
