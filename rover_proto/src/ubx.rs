pub mod catalog;
mod checksum;
mod packet;
mod record;
pub mod schema;

pub use self::{
    catalog::{MessageDef, Mode},
    checksum::{ubx_checksum, UbxChecksumCalc},
    packet::UbxPacket,
    record::{Record, Value},
};
