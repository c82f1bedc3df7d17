use std::borrow::Cow;

use rover_proto::{RtcmFrame, UbxPacket};
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};
use tracing::{debug, info, trace};

/// Anything the rover sends to the receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Ubx(UbxPacket),
    Rtcm(RtcmFrame),
    /// Already in wire form, e.g. an NMEA line
    Raw(Vec<u8>),
}

impl OutboundFrame {
    pub fn to_bytes(&self) -> Cow<'_, [u8]> {
        match self {
            OutboundFrame::Ubx(packet) => Cow::Owned(packet.to_bytes()),
            OutboundFrame::Rtcm(frame) => Cow::Borrowed(frame.as_bytes()),
            OutboundFrame::Raw(bytes) => Cow::Borrowed(bytes),
        }
    }
}

impl From<UbxPacket> for OutboundFrame {
    fn from(packet: UbxPacket) -> Self {
        OutboundFrame::Ubx(packet)
    }
}

impl From<RtcmFrame> for OutboundFrame {
    fn from(frame: RtcmFrame) -> Self {
        OutboundFrame::Rtcm(frame)
    }
}

/// Drains one outbound queue into one serial port, in arrival order.
pub struct UartWriter<W> {
    port: &'static str,
    writer: W,
    rx: mpsc::Receiver<OutboundFrame>,
}

impl<W: AsyncWrite + Unpin> UartWriter<W> {
    pub fn new(port: &'static str, writer: W, rx: mpsc::Receiver<OutboundFrame>) -> Self {
        Self { port, writer, rx }
    }

    /// Write frames until every sender is dropped. Each frame is flushed
    /// before the next one is taken from the queue.
    pub async fn run(mut self) -> std::io::Result<u64> {
        debug!(port = self.port, "uart writer started");
        let mut written = 0;
        while let Some(frame) = self.rx.recv().await {
            let bytes = frame.to_bytes();
            self.writer.write_all(&bytes).await?;
            self.writer.flush().await?;
            written += 1;
            trace!(port = self.port, len = bytes.len(), "frame written");
        }
        info!(port = self.port, frames = written, "uart writer stopped");
        Ok(written)
    }
}
