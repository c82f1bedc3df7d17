//! RTCM3 frame boundary detection.
//!
//! Frames are never decoded here; the receiver consumes them as they are.

use crate::constants::{RTCM_CRC_LEN, RTCM_HEADER_SIZE, RTCM_LENGTH_MASK, RTCM_SYNC_CHAR};

/// Whether `lead` and `second` can open an RTCM3 frame: the preamble byte
/// followed by six reserved bits that must be zero.
pub const fn is_frame_start(lead: u8, second: u8) -> bool {
    lead == RTCM_SYNC_CHAR && second & !(RTCM_LENGTH_MASK >> 8) as u8 == 0
}

/// Message length from the two bytes after the preamble
pub const fn payload_len(second: u8, third: u8) -> usize {
    (u16::from_be_bytes([second, third]) & RTCM_LENGTH_MASK) as usize
}

/// Bytes that follow the 3 byte header: payload plus CRC-24Q
pub const fn body_len(second: u8, third: u8) -> usize {
    payload_len(second, third) + RTCM_CRC_LEN
}

/// One opaque RTCM3 frame, header and CRC included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcmFrame {
    data: Vec<u8>,
}

impl RtcmFrame {
    /// Wrap a complete frame, checking only that the header and length agree
    pub fn from_bytes(data: Vec<u8>) -> Option<Self> {
        if data.len() < RTCM_HEADER_SIZE + RTCM_CRC_LEN || !is_frame_start(data[0], data[1]) {
            return None;
        }
        (data.len() == RTCM_HEADER_SIZE + body_len(data[1], data[2])).then_some(Self { data })
    }

    /// RTCM message number, the first 12 bits of the payload
    pub fn message_type(&self) -> Option<u16> {
        let hi = *self.data.get(RTCM_HEADER_SIZE)?;
        let lo = *self.data.get(RTCM_HEADER_SIZE + 1)?;
        (self.data.len() >= RTCM_HEADER_SIZE + 2 + RTCM_CRC_LEN)
            .then(|| u16::from_be_bytes([hi, lo]) >> 4)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1005 station coordinates, 19 byte payload
    const FRAME_1005: [u8; 25] = [
        0xd3, 0x00, 0x13, 0x3e, 0xd0, 0x00, 0x03, 0x8a, 0x8d, 0x6a, 0x30, 0x94, 0x05, 0x19, 0x35,
        0x7e, 0x83, 0x46, 0x0f, 0x43, 0x1f, 0x6e, 0x5a, 0x7f, 0x36,
    ];

    #[test]
    fn frame_start_requires_reserved_bits_clear() {
        assert!(is_frame_start(0xd3, 0x00));
        assert!(is_frame_start(0xd3, 0x03));
        assert!(!is_frame_start(0xd3, 0x04));
        assert!(!is_frame_start(0xd3, 0x80));
        assert!(!is_frame_start(0xd2, 0x00));
    }

    #[test]
    fn length_spans_two_bytes() {
        assert_eq!(payload_len(0x00, 0x13), 19);
        assert_eq!(payload_len(0x03, 0xff), 1023);
        assert_eq!(payload_len(0x01, 0x00), 256);
        assert_eq!(body_len(0x00, 0x13), 22);
    }

    #[test]
    fn frame_wraps_complete_bytes() {
        let frame = RtcmFrame::from_bytes(FRAME_1005.to_vec()).unwrap();
        assert_eq!(frame.message_type(), Some(1005));
        assert_eq!(frame.as_bytes(), FRAME_1005);
        assert!(RtcmFrame::from_bytes(FRAME_1005[..24].to_vec()).is_none());
    }
}
