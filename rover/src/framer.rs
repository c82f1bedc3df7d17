//! Demultiplexer for the receiver link.
//!
//! UBX, NMEA and RTCM3 arrive interleaved on one UART. The framer slides over
//! the byte stream one byte at a time until it sees a known header, reads
//! exactly one frame and hands it to the queue of its consumer.

use std::io;

use rover_proto::{
    catalog::class,
    constants::{
        NMEA_HEADER_CHARS, NMEA_SYNC_CHAR, RTCM_SYNC_CHAR, UBX_SYNC_CHAR_1, UBX_SYNC_CHAR_2,
    },
    rtcm, ErrorKind, Mode, RtcmFrame, Sentence, UbxPacket,
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::{
    error::FramerError,
    queue::{DropSender, Pushed},
    wire,
};

/// What happens to a frame that fails to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Count it and continue
    Ignore,
    /// Count it, log it and continue
    #[default]
    Log,
    /// Stop the framer with the error
    Raise,
}

/// Destination queues, one per consumer
#[derive(Debug, Clone)]
pub struct Routes {
    /// ACK-ACK, ACK-NAK and the MGA acknowledgements
    pub ack: DropSender<UbxPacket>,
    /// Replies in the CFG class
    pub cfg: DropSender<UbxPacket>,
    /// Replies in the NAV class
    pub nav: DropSender<UbxPacket>,
    /// GGA sentences, the rover's own position
    pub gga: DropSender<Sentence>,
    /// RTCM3 frames seen on the receiver link, `None` to discard them
    pub rtcm: Option<DropSender<RtcmFrame>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FramerStats {
    pub ubx: u64,
    pub nmea: u64,
    pub rtcm: u64,
    /// Bytes skipped while looking for a header
    pub skipped: u64,
    /// Frames that decoded but found their queue full
    pub dropped: u64,
    pub format_errors: u64,
    pub checksum_errors: u64,
    pub unknown_identity_errors: u64,
}

impl FramerStats {
    pub fn errors(&self) -> u64 {
        self.format_errors + self.checksum_errors + self.unknown_identity_errors
    }

    fn count_error(&mut self, kind: ErrorKind) {
        match kind {
            ErrorKind::Format => self.format_errors += 1,
            ErrorKind::Checksum => self.checksum_errors += 1,
            ErrorKind::UnknownIdentity => self.unknown_identity_errors += 1,
        }
    }
}

pub struct StreamFramer<R> {
    reader: BufReader<R>,
    routes: Routes,
    policy: ErrorPolicy,
    stats: FramerStats,
    /// Byte read as a second header byte that did not complete a header
    pending: Option<u8>,
}

impl<R: AsyncRead + Unpin> StreamFramer<R> {
    pub fn new(reader: R, routes: Routes, policy: ErrorPolicy) -> Self {
        Self {
            reader: BufReader::new(reader),
            routes,
            policy,
            stats: FramerStats::default(),
            pending: None,
        }
    }

    pub fn stats(&self) -> FramerStats {
        self.stats
    }

    /// Process frames until the stream ends.
    ///
    /// Returns the final counters once the reader reports end of file. Fails on
    /// transport errors, and on decode errors under [`ErrorPolicy::Raise`].
    pub async fn run(mut self) -> Result<FramerStats, FramerError> {
        info!(policy = ?self.policy, "stream framer started");
        loop {
            match self.next_frame().await {
                Ok(()) => {},
                Err(FramerError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    info!(stats = ?self.stats, "receiver stream closed");
                    return Ok(self.stats);
                },
                Err(e @ FramerError::Io(_)) => return Err(e),
                Err(e) => self.on_decode_error(e)?,
            }
        }
    }

    async fn read_byte(&mut self) -> io::Result<u8> {
        match self.pending.take() {
            Some(byte) => Ok(byte),
            None => self.reader.read_u8().await,
        }
    }

    async fn next_frame(&mut self) -> Result<(), FramerError> {
        let lead = self.read_byte().await?;
        if !matches!(lead, UBX_SYNC_CHAR_1 | NMEA_SYNC_CHAR | RTCM_SYNC_CHAR) {
            self.stats.skipped += 1;
            return Ok(());
        }
        let second = self.reader.read_u8().await?;
        match (lead, second) {
            (UBX_SYNC_CHAR_1, UBX_SYNC_CHAR_2) => {
                let packet = wire::read_ubx(&mut self.reader).await?;
                self.route_ubx(packet)?;
            },
            (NMEA_SYNC_CHAR, c) if NMEA_HEADER_CHARS.contains(&c) => {
                let line = wire::read_nmea_line(&mut self.reader, [lead, second]).await?;
                let sentence = Sentence::parse(&line)?;
                self.route_sentence(sentence);
            },
            (RTCM_SYNC_CHAR, c) if rtcm::is_frame_start(lead, c) => {
                let frame = wire::read_rtcm(&mut self.reader, lead, second).await?;
                self.route_rtcm(frame);
            },
            _ => {
                self.stats.skipped += 1;
                self.pending = Some(second);
            },
        }
        Ok(())
    }

    fn on_decode_error(&mut self, e: FramerError) -> Result<(), FramerError> {
        if let Some(kind) = e.kind() {
            self.stats.count_error(kind);
        }
        match self.policy {
            ErrorPolicy::Ignore => Ok(()),
            ErrorPolicy::Log => {
                warn!(error = %e, "dropping frame");
                Ok(())
            },
            ErrorPolicy::Raise => Err(e),
        }
    }

    fn push<T>(stats: &mut FramerStats, queue: &DropSender<T>, item: T) {
        match queue.push(item) {
            Pushed::Queued => {},
            Pushed::Dropped => stats.dropped += 1,
            Pushed::Closed => debug!(queue = queue.name(), "consumer gone"),
        }
    }

    fn route_ubx(&mut self, packet: UbxPacket) -> Result<(), FramerError> {
        let def = packet.definition()?;
        let queue = match packet.class() {
            class::ACK => &self.routes.ack,
            class::MGA if def.subtype.is_some() => &self.routes.ack,
            class::CFG => &self.routes.cfg,
            class::NAV => &self.routes.nav,
            class::INF => {
                let record = packet.decode(Mode::Get)?;
                self.stats.ubx += 1;
                let text = record.get_str("message").unwrap_or_default();
                match def.id {
                    0x00 | 0x01 => warn!(msg = def.name, "{}", text),
                    _ => info!(msg = def.name, "{}", text),
                }
                return Ok(());
            },
            _ => {
                self.stats.ubx += 1;
                debug!(msg = def.name, "no consumer for message");
                return Ok(());
            },
        };
        // consumers only ever get payloads that fit the output layout
        packet.decode(Mode::Get)?;
        self.stats.ubx += 1;
        Self::push(&mut self.stats, queue, packet);
        Ok(())
    }

    fn route_sentence(&mut self, sentence: Sentence) {
        self.stats.nmea += 1;
        if sentence.id() == "GGA" {
            Self::push(&mut self.stats, &self.routes.gga, sentence);
        } else {
            debug!(talker = sentence.talker(), id = sentence.id(), "no consumer for sentence");
        }
    }

    fn route_rtcm(&mut self, frame: RtcmFrame) {
        self.stats.rtcm += 1;
        match &self.routes.rtcm {
            Some(queue) => Self::push(&mut self.stats, queue, frame),
            None => debug!(message_type = ?frame.message_type(), "RTCM3 frame on receiver link"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::drop_on_full;
    use tokio::sync::mpsc::Receiver;

    const GGA_LINE: &[u8] =
        b"$GPGGA,092725.00,4717.11399,N,00833.91590,E,1,08,1.01,499.6,M,48.0,M,,*5B\r\n";
    const ACK_ACK_CFG_RATE: [u8; 10] = [0xb5, 0x62, 0x05, 0x01, 0x02, 0x00, 0x06, 0x08, 0x16, 0x3f];

    struct Sinks {
        ack: Receiver<UbxPacket>,
        cfg: Receiver<UbxPacket>,
        nav: Receiver<UbxPacket>,
        gga: Receiver<Sentence>,
        rtcm: Receiver<RtcmFrame>,
    }

    fn routes(capacity: usize) -> (Routes, Sinks) {
        let (ack, ack_rx) = drop_on_full("ack", capacity);
        let (cfg, cfg_rx) = drop_on_full("cfg", capacity);
        let (nav, nav_rx) = drop_on_full("nav", capacity);
        let (gga, gga_rx) = drop_on_full("gga", capacity);
        let (rtcm, rtcm_rx) = drop_on_full("rtcm", capacity);
        (
            Routes {
                ack,
                cfg,
                nav,
                gga,
                rtcm: Some(rtcm),
            },
            Sinks {
                ack: ack_rx,
                cfg: cfg_rx,
                nav: nav_rx,
                gga: gga_rx,
                rtcm: rtcm_rx,
            },
        )
    }

    async fn run(bytes: Vec<u8>, policy: ErrorPolicy, capacity: usize) -> (Result<FramerStats, FramerError>, Sinks) {
        let (routes, sinks) = routes(capacity);
        let result = StreamFramer::new(&bytes[..], routes, policy).run().await;
        (result, sinks)
    }

    #[tokio::test]
    async fn routes_by_class() {
        let mut bytes = vec![0x00, 0x13];
        bytes.extend_from_slice(&ACK_ACK_CFG_RATE);
        bytes.extend_from_slice(&[0xb5, 0x62, 0x06, 0x08, 0x06, 0x00, 0xe8, 0x03, 0x01, 0x00, 0x01, 0x00, 0x01, 0x39]);
        bytes.extend_from_slice(&UbxPacket::new(0x01, 0x03, vec![0; 16]).unwrap().to_bytes());
        bytes.extend_from_slice(GGA_LINE);
        bytes.extend_from_slice(&[0xd3, 0x00, 0x02, 0x3e, 0xd0, 0x01, 0x02, 0x03]);
        let (result, mut sinks) = run(bytes, ErrorPolicy::Log, 4).await;
        let stats = result.unwrap();
        assert_eq!((stats.ubx, stats.nmea, stats.rtcm), (3, 1, 1));
        assert_eq!(stats.skipped, 2);
        assert_eq!(sinks.ack.recv().await.unwrap().payload(), [0x06, 0x08]);
        assert_eq!(sinks.cfg.recv().await.unwrap().msg_id(), 0x08);
        assert_eq!(sinks.nav.recv().await.unwrap().msg_id(), 0x03);
        assert_eq!(sinks.gga.recv().await.unwrap().field("num_sv"), Some("08"));
        assert_eq!(sinks.rtcm.recv().await.unwrap().message_type(), Some(1005));
    }

    #[tokio::test]
    async fn corrupt_sentence_is_not_forwarded() {
        let mut bytes = GGA_LINE.to_vec();
        bytes[10] = b'9';
        let (result, mut sinks) = run(bytes, ErrorPolicy::Ignore, 4).await;
        let stats = result.unwrap();
        assert_eq!(stats.checksum_errors, 1);
        assert_eq!(stats.nmea, 0);
        assert!(sinks.gga.try_recv().is_err());
    }

    #[tokio::test]
    async fn resync_on_false_header() {
        // '$' followed by a UBX sync char must not swallow the frame
        let mut bytes = vec![b'$'];
        bytes.extend_from_slice(&ACK_ACK_CFG_RATE);
        let (result, mut sinks) = run(bytes, ErrorPolicy::Raise, 4).await;
        assert_eq!(result.unwrap().ubx, 1);
        assert!(sinks.ack.recv().await.is_some());
    }

    #[tokio::test]
    async fn unknown_identity_counts() {
        let packet = UbxPacket::new(0x0a, 0x7f, vec![1, 2, 3]).unwrap();
        let (result, _sinks) = run(packet.to_bytes(), ErrorPolicy::Log, 4).await;
        assert_eq!(result.unwrap().unknown_identity_errors, 1);
    }

    #[tokio::test]
    async fn raise_stops_on_first_error() {
        let mut bytes = ACK_ACK_CFG_RATE.to_vec();
        bytes[8] ^= 0x01;
        bytes.extend_from_slice(&ACK_ACK_CFG_RATE);
        let (result, mut sinks) = run(bytes, ErrorPolicy::Raise, 4).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Checksum));
        assert!(sinks.ack.try_recv().is_err());
    }

    #[tokio::test]
    async fn short_payload_is_a_format_error() {
        // CFG-RATE with a valid checksum but only 3 of its 6 payload bytes
        let mut bytes = UbxPacket::new(0x06, 0x08, vec![0xe8, 0x03, 0x01])
            .unwrap()
            .to_bytes();
        bytes.extend_from_slice(&ACK_ACK_CFG_RATE);
        let (result, mut sinks) = run(bytes.clone(), ErrorPolicy::Log, 4).await;
        let stats = result.unwrap();
        assert_eq!(stats.format_errors, 1);
        assert_eq!(stats.ubx, 1);
        assert!(sinks.cfg.try_recv().is_err());
        assert!(sinks.ack.try_recv().is_ok());

        let (result, mut sinks) = run(bytes, ErrorPolicy::Raise, 4).await;
        assert_eq!(result.unwrap_err().kind(), Some(ErrorKind::Format));
        assert!(sinks.cfg.try_recv().is_err());
    }
}
