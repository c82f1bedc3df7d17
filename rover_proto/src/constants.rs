pub const UBX_SYNC_CHAR_1: u8 = 0xb5;
pub const UBX_SYNC_CHAR_2: u8 = 0x62;
pub(crate) const UBX_SYNC_SIZE: usize = 2;
pub(crate) const UBX_PAYLOAD_SIZE_LEN: usize = 2;
pub(crate) const UBX_CLASS_LEN: usize = 1;
pub(crate) const UBX_ID_LEN: usize = 1;
pub const UBX_HEADER_LEN: usize =
    UBX_SYNC_SIZE + UBX_PAYLOAD_SIZE_LEN + UBX_CLASS_LEN + UBX_ID_LEN;
pub const UBX_CHECKSUM_LEN: usize = 2;

pub(crate) const UBX_CLASS_OFFSET: usize = 2; // After SYNC_CHAR_1, SYNC_CHAR_2
pub(crate) const UBX_MSG_ID_OFFSET: usize = 3; // After CLASS
pub(crate) const UBX_LENGTH_OFFSET: usize = 4; // After MSG_ID

pub const NMEA_SYNC_CHAR: u8 = 0x24; // '$'
pub const NMEA_END_CHAR_1: u8 = 0x0d; // '\r' (<CR>)
pub const NMEA_END_CHAR_2: u8 = 0x0a; // '\n' (<LF>)
/// Second header byte of standard (`$G..`) and proprietary (`$P..`) sentences
pub const NMEA_HEADER_CHARS: [u8; 2] = [b'G', b'P'];
/// Upper bound used when reading a sentence off the wire. Receivers exceed the
/// nominal 82 characters for proprietary sentences.
pub const NMEA_MAX_LINE_LENGTH: usize = 256;

pub const RTCM_SYNC_CHAR: u8 = 0xd3;
pub const RTCM_HEADER_SIZE: usize = 3; // sync char (1) + length field (2)
pub const RTCM_CRC_LEN: usize = 3; // CRC-24Q
pub(crate) const RTCM_LENGTH_MASK: u16 = 0x03ff; // 10 bits for length (6 bits reserved)

/// Decimal places kept after applying a scale factor
pub(crate) const SCALE_ROUNDING: i32 = 12;
