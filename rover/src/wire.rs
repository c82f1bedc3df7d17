//! Frame body readers shared by the serial framer and the NTRIP stream.
//!
//! Each reader is entered after the caller consumed the two header bytes and
//! reads exactly one frame, so the stream stays aligned on success.

use rover_proto::{
    constants::{
        NMEA_END_CHAR_2, NMEA_MAX_LINE_LENGTH, RTCM_HEADER_SIZE, UBX_CHECKSUM_LEN, UBX_HEADER_LEN,
        UBX_SYNC_CHAR_1, UBX_SYNC_CHAR_2,
    },
    rtcm, NmeaError, RtcmFrame, UbxPacket,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::FramerError;

/// Read class, id, length, payload and checksum of a UBX frame
pub async fn read_ubx<R>(reader: &mut R) -> Result<UbxPacket, FramerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut frame = vec![0u8; UBX_HEADER_LEN];
    frame[0] = UBX_SYNC_CHAR_1;
    frame[1] = UBX_SYNC_CHAR_2;
    reader.read_exact(&mut frame[2..]).await?;
    let len = usize::from(u16::from_le_bytes([frame[4], frame[5]]));
    frame.resize(UBX_HEADER_LEN + len + UBX_CHECKSUM_LEN, 0);
    reader.read_exact(&mut frame[UBX_HEADER_LEN..]).await?;
    Ok(UbxPacket::from_bytes(&frame)?)
}

/// Read the rest of a sentence up to and including its line feed
pub async fn read_nmea_line<R>(reader: &mut R, header: [u8; 2]) -> Result<String, FramerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = header.to_vec();
    let limit = (NMEA_MAX_LINE_LENGTH - header.len()) as u64;
    let read = (&mut *reader)
        .take(limit)
        .read_until(NMEA_END_CHAR_2, &mut line)
        .await?;
    if read == 0 {
        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
    }
    if line.last() != Some(&NMEA_END_CHAR_2) {
        return Err(NmeaError::Malformed("line exceeds maximum length").into());
    }
    String::from_utf8(line).map_err(|_| NmeaError::Malformed("non ASCII characters").into())
}

/// Read the remaining length byte, payload and CRC of an RTCM3 frame
pub async fn read_rtcm<R>(reader: &mut R, lead: u8, second: u8) -> Result<RtcmFrame, FramerError>
where
    R: AsyncBufRead + Unpin,
{
    let third = reader.read_u8().await?;
    let body = rtcm::body_len(second, third);
    let mut data = Vec::with_capacity(RTCM_HEADER_SIZE + body);
    data.extend_from_slice(&[lead, second, third]);
    data.resize(RTCM_HEADER_SIZE + body, 0);
    reader.read_exact(&mut data[RTCM_HEADER_SIZE..]).await?;
    let got = data.len();
    RtcmFrame::from_bytes(data).ok_or(FramerError::Rtcm {
        expect: RTCM_HEADER_SIZE + body,
        got,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn ubx_body() {
        let bytes: &[u8] = &[0x05, 0x01, 0x02, 0x00, 0x06, 0x08, 0x16, 0x3f, 0xaa];
        let mut reader = BufReader::new(bytes);
        let packet = read_ubx(&mut reader).await.unwrap();
        assert_eq!(packet.payload(), [0x06, 0x08]);
        assert_eq!(reader.read_u8().await.unwrap(), 0xaa);
    }

    #[tokio::test]
    async fn ubx_truncated_is_io_error() {
        let bytes: &[u8] = &[0x05, 0x01, 0x02, 0x00, 0x06];
        let err = read_ubx(&mut BufReader::new(bytes)).await.unwrap_err();
        assert!(matches!(err, FramerError::Io(_)));
        assert_eq!(err.kind(), None);
    }

    #[tokio::test]
    async fn nmea_line() {
        let bytes: &[u8] = b"PGGA,1*00\r\n$GP";
        let mut reader = BufReader::new(bytes);
        let line = read_nmea_line(&mut reader, *b"$G").await.unwrap();
        assert_eq!(line, "$GPGGA,1*00\r\n");
    }

    #[tokio::test]
    async fn nmea_line_too_long() {
        let long = vec![b'A'; 400];
        let mut reader = BufReader::new(&long[..]);
        let err = read_nmea_line(&mut reader, *b"$G").await.unwrap_err();
        assert_eq!(err.kind(), Some(rover_proto::ErrorKind::Format));
    }

    #[tokio::test]
    async fn rtcm_frame() {
        let mut bytes = vec![0x06];
        bytes.extend_from_slice(&[0x3e, 0xd0, 0x00, 0x00, 0x00, 0x00]);
        bytes.extend_from_slice(&[0x01, 0x02, 0x03]);
        let mut reader = BufReader::new(&bytes[..]);
        let frame = read_rtcm(&mut reader, 0xd3, 0x00).await.unwrap();
        assert_eq!(frame.as_bytes().len(), 12);
        assert_eq!(frame.message_type(), Some(1005));
    }
}
