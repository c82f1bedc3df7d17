//! # rover_proto
//!
//! Wire formats spoken between an RTK rover and its u-blox receiver: the UBX
//! binary protocol, NMEA 0183 sentences and the framing of RTCM3 correction
//! data. Nothing here performs I/O; the `rover` crate feeds bytes in and
//! writes the produced frames out.
//!
//! Building Packets
//! ================
//!
//! UBX messages are described by static [`MessageDef`] tables in the
//! [`catalog`]. A packet is built from a [`Record`] of named values:
//! ```
//! use rover_proto::{catalog, Mode, Record, UbxPacket};
//!
//! let record = Record::new()
//!     .with("msg_class", 0xf0u8)
//!     .with("msg_id", 0x00u8)
//!     .with("rate_uart1", 1u8);
//! let bytes = UbxPacket::build(&catalog::CFG_MSG, Mode::Set, &record)
//!     .unwrap()
//!     .to_bytes();
//! assert_eq!(&bytes[..6], [0xb5, 0x62, 0x06, 0x01, 0x08, 0x00]);
//! ```
//! Fields missing from the record are written as zero.
//!
//! Parsing Packets
//! ===============
//!
//! ```
//! use rover_proto::{catalog, Mode, UbxPacket};
//!
//! let packet = UbxPacket::from_bytes(&[0xb5, 0x62, 0x05, 0x01, 0x02, 0x00, 0x06, 0x08, 0x16, 0x3f]).unwrap();
//! assert!(packet.is(&catalog::ACK_ACK));
//! let record = packet.decode(Mode::Get).unwrap();
//! assert_eq!(record.get_u64("cls_id"), Some(0x06));
//! ```
//!
//! NMEA sentences go through [`Sentence::parse`], which rejects corrupt lines
//! before any field is looked at.

#[cfg(feature = "serde")]
extern crate serde;

pub mod cfg_val;
pub mod constants;
mod error;
pub mod nmea;
pub mod rtcm;
mod types;
mod ubx;

pub use crate::{
    error::{DateTimeError, ErrorKind, NmeaError, ParserError},
    nmea::{Gga, Sentence},
    rtcm::RtcmFrame,
    types::{
        satellites, CarrierSolution, FixType, GnssId, GpsFix, NavSolution, Position,
        SatelliteInfo, SatelliteSystems,
    },
    ubx::{
        catalog, schema, ubx_checksum, MessageDef, Mode, Record, UbxChecksumCalc, UbxPacket,
        Value,
    },
};
