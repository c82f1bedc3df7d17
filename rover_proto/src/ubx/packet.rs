use super::{
    catalog::{self, MessageDef, Mode},
    checksum::UbxChecksumCalc,
    record::Record,
    schema,
};
use crate::{
    constants::{
        UBX_CHECKSUM_LEN, UBX_CLASS_OFFSET, UBX_HEADER_LEN, UBX_LENGTH_OFFSET, UBX_MSG_ID_OFFSET,
        UBX_SYNC_CHAR_1, UBX_SYNC_CHAR_2,
    },
    ParserError,
};

/// A complete UBX frame
///
/// The checksum is derived from the other fields on construction, so a
/// `UbxPacket` always describes a consistent frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UbxPacket {
    class: u8,
    msg_id: u8,
    payload: Vec<u8>,
    checksum: u16,
}

impl UbxPacket {
    pub fn new(class: u8, msg_id: u8, payload: Vec<u8>) -> Result<Self, ParserError> {
        let len = u16::try_from(payload.len()).map_err(|_| ParserError::InvalidPacketLen {
            packet: "UBX",
            expect: usize::from(u16::MAX),
            got: payload.len(),
        })?;
        let mut calc = UbxChecksumCalc::new();
        calc.update(&[class, msg_id]);
        calc.update(&len.to_le_bytes());
        calc.update(&payload);
        let (ck_a, ck_b) = calc.result();
        Ok(Self {
            class,
            msg_id,
            payload,
            checksum: u16::from_le_bytes([ck_a, ck_b]),
        })
    }

    /// Encode `record` with the `mode` layout of `def`
    ///
    /// ```
    /// use rover_proto::{catalog, Mode, Record, UbxPacket};
    ///
    /// let record = Record::new()
    ///     .with("meas_rate", 1000u16)
    ///     .with("nav_rate", 1u16)
    ///     .with("time_ref", 1u16);
    /// let packet = UbxPacket::build(&catalog::CFG_RATE, Mode::Set, &record).unwrap();
    /// assert_eq!(
    ///     packet.to_bytes(),
    ///     [0xb5, 0x62, 0x06, 0x08, 0x06, 0x00, 0xe8, 0x03, 0x01, 0x00, 0x01, 0x00, 0x01, 0x39]
    /// );
    /// ```
    pub fn build(def: &'static MessageDef, mode: Mode, record: &Record) -> Result<Self, ParserError> {
        let layout = def.layout(mode)?;
        let mut payload = Vec::with_capacity(schema::layout_size(layout).unwrap_or(64));
        match def.subtype {
            // the discriminating byte is part of the identity, not caller data
            Some(subtype) => {
                let mut record = record.clone();
                record.set("type", subtype);
                schema::encode_fields(def.name, layout, &record, &mut payload)?;
            },
            None => schema::encode_fields(def.name, layout, record, &mut payload)?,
        }
        Self::new(def.class, def.id, payload)
    }

    /// Poll request for `def`, with an empty payload unless the poll layout
    /// carries parameters
    pub fn poll(def: &'static MessageDef) -> Result<Self, ParserError> {
        Self::build(def, Mode::Poll, &Record::new())
    }

    /// Parse one frame. `bytes` must hold exactly one frame, sync chars included.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParserError> {
        if bytes.len() < UBX_HEADER_LEN + UBX_CHECKSUM_LEN {
            return Err(ParserError::InvalidPacketLen {
                packet: "UBX",
                expect: UBX_HEADER_LEN + UBX_CHECKSUM_LEN,
                got: bytes.len(),
            });
        }
        if bytes[0] != UBX_SYNC_CHAR_1 || bytes[1] != UBX_SYNC_CHAR_2 {
            return Err(ParserError::InvalidHeader {
                expect: [UBX_SYNC_CHAR_1, UBX_SYNC_CHAR_2],
                got: [bytes[0], bytes[1]],
            });
        }
        let pack_len = usize::from(u16::from_le_bytes([
            bytes[UBX_LENGTH_OFFSET],
            bytes[UBX_LENGTH_OFFSET + 1],
        ]));
        let expect = UBX_HEADER_LEN + pack_len + UBX_CHECKSUM_LEN;
        if bytes.len() != expect {
            return Err(ParserError::InvalidPacketLen {
                packet: "UBX",
                expect,
                got: bytes.len(),
            });
        }

        let mut calc = UbxChecksumCalc::new();
        calc.update(&bytes[UBX_CLASS_OFFSET..UBX_HEADER_LEN + pack_len]);
        calc.validate_result(bytes[expect - 2], bytes[expect - 1])?;

        Self::new(
            bytes[UBX_CLASS_OFFSET],
            bytes[UBX_MSG_ID_OFFSET],
            bytes[UBX_HEADER_LEN..UBX_HEADER_LEN + pack_len].to_vec(),
        )
    }

    /// Wire form including sync chars and checksum
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(UBX_HEADER_LEN + self.payload.len() + UBX_CHECKSUM_LEN);
        out.extend_from_slice(&[UBX_SYNC_CHAR_1, UBX_SYNC_CHAR_2, self.class, self.msg_id]);
        // length fits, checked in `new`
        out.extend_from_slice(&(self.payload.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.payload);
        out.extend_from_slice(&self.checksum.to_le_bytes());
        out
    }

    pub fn class(&self) -> u8 {
        self.class
    }

    pub fn msg_id(&self) -> u8 {
        self.msg_id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// `ck_a` in the low byte, `ck_b` in the high byte
    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    /// Catalogue entry of this packet, peeking into the payload for the MGA family
    pub fn definition(&self) -> Result<&'static MessageDef, ParserError> {
        catalog::lookup(self.class, self.msg_id, &self.payload)
    }

    pub fn is(&self, def: &MessageDef) -> bool {
        self.class == def.class
            && self.msg_id == def.id
            && def
                .subtype
                .is_none_or(|subtype| self.payload.first() == Some(&subtype))
    }

    /// Decode the payload into named fields
    pub fn decode(&self, mode: Mode) -> Result<Record, ParserError> {
        let def = self.definition()?;
        let layout = def.layout(mode)?;
        let mut record = Record::new();
        let mut pos = 0;
        schema::decode_fields(def.name, layout, &self.payload, &mut pos, &mut record)?;
        if pos != self.payload.len() {
            return Err(ParserError::InvalidPacketLen {
                packet: def.name,
                expect: pos,
                got: self.payload.len(),
            });
        }
        Ok(record)
    }
}
