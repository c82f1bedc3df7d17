//! NTRIP client relaying RTCM3 corrections from a caster to the receiver.
//!
//! One session is one TCP connection: connect, send the request, then either
//! read a sourcetable or stream correction frames until the stop signal is
//! raised or the connection fails. [`NtripClient::run`] repeats sessions for
//! as long as the correction output is open.

pub mod request;
pub mod sourcetable;

use chrono::Utc;
use rover_proto::{constants::RTCM_SYNC_CHAR, rtcm, Gga, Sentence};
use tokio::{
    io::{AsyncBufRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpStream,
    sync::mpsc,
    time::{timeout, Instant},
};
use tracing::{debug, info, trace, warn};

use crate::{
    config::{GgaMode, NtripSettings},
    error::{FramerError, NtripError},
    status::{StatusFlag, StopSignal},
    wire,
    writer::OutboundFrame,
};
use request::Response;
pub use sourcetable::SourceEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Handshaking,
    Streaming,
}

/// How a session without a transport or protocol error ended
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// The caster sent its sourcetable instead of a stream
    Sourcetable(Vec<SourceEntry>),
    /// The stop signal was raised while streaming
    Stopped { frames: u64 },
    /// Nobody takes correction frames anymore
    OutputClosed { frames: u64 },
}

pub struct NtripClient {
    settings: NtripSettings,
    /// Configured mountpoint, or the nearest one once a sourcetable was read
    mountpoint: String,
    state: SessionState,
    status: StatusFlag,
    stop: StopSignal,
    corrections: mpsc::Sender<OutboundFrame>,
    positions: Option<mpsc::Receiver<Sentence>>,
    latest_gga: Option<Sentence>,
    sourcetable: Vec<SourceEntry>,
}

impl NtripClient {
    pub fn new(
        settings: NtripSettings,
        corrections: mpsc::Sender<OutboundFrame>,
        status: StatusFlag,
        stop: StopSignal,
    ) -> Self {
        Self {
            mountpoint: settings.mountpoint.clone(),
            settings,
            state: SessionState::Idle,
            status,
            stop,
            corrections,
            positions: None,
            latest_gga: None,
            sourcetable: Vec::new(),
        }
    }

    /// Source of the rover's own GGA sentences for [`GgaMode::Live`]
    pub fn with_positions(mut self, positions: mpsc::Receiver<Sentence>) -> Self {
        self.positions = Some(positions);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mountpoint(&self) -> &str {
        &self.mountpoint
    }

    /// Entries of the last sourcetable received
    pub fn sourcetable(&self) -> &[SourceEntry] {
        &self.sourcetable
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "ntrip session");
            self.state = next;
        }
    }

    /// Run sessions until the correction output is closed. Failures end the
    /// session, never the client.
    pub async fn run(mut self) {
        let poll = self.settings.poll_interval();
        info!(server = %self.settings.server, port = self.settings.port, "correction relay started");
        loop {
            self.stop.wait_resumed(poll).await;
            let closed = match self.session().await {
                Ok(SessionOutcome::Sourcetable(entries)) => {
                    info!(entries = entries.len(), mountpoint = %self.mountpoint, "sourcetable received");
                    false
                },
                Ok(SessionOutcome::Stopped { frames }) => {
                    info!(frames, "correction relay paused");
                    false
                },
                Ok(SessionOutcome::OutputClosed { frames }) => {
                    info!(frames, "correction output closed");
                    true
                },
                Err(e) => {
                    warn!(error = %e, "correction session failed");
                    false
                },
            };
            self.status.set(false);
            self.transition(SessionState::Idle);
            if closed || self.corrections.is_closed() {
                info!("correction relay stopped");
                return;
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// One connection to the caster. The status flag is false when this
    /// returns.
    pub async fn session(&mut self) -> Result<SessionOutcome, NtripError> {
        let result = self.connect_and_relay().await;
        self.status.set(false);
        self.transition(SessionState::Idle);
        result
    }

    async fn connect_and_relay(&mut self) -> Result<SessionOutcome, NtripError> {
        self.transition(SessionState::Connecting);
        let address = (self.settings.server.as_str(), self.settings.port);
        let mut stream = timeout(self.settings.connect_timeout(), TcpStream::connect(address))
            .await
            .map_err(|_| NtripError::ConnectTimeout)??;
        debug!(server = %self.settings.server, port = self.settings.port, "connected to caster");

        self.transition(SessionState::Handshaking);
        let (read, mut write) = stream.split();
        let mut reader = BufReader::new(read);
        let request = request::build_request(&self.settings, &self.mountpoint);
        write.write_all(request.as_bytes()).await?;
        match request::read_response(&mut reader).await? {
            Response::Sourcetable => self.read_sourcetable(&mut reader).await,
            Response::Stream => {
                info!(mountpoint = %self.mountpoint, "streaming corrections");
                self.transition(SessionState::Streaming);
                self.relay(&mut reader, &mut write).await
            },
        }
    }

    async fn read_sourcetable<R>(&mut self, reader: &mut R) -> Result<SessionOutcome, NtripError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut entries = Vec::new();
        loop {
            let Some(line) = request::read_text_line(reader).await? else {
                warn!("sourcetable ended without {}", sourcetable::END_MARKER);
                break;
            };
            let line = line.trim_end();
            if line == sourcetable::END_MARKER {
                break;
            }
            match SourceEntry::parse(line) {
                Some(entry) => {
                    trace!(mountpoint = %entry.mountpoint, "sourcetable entry");
                    entries.push(entry);
                },
                None if line.starts_with("STR;") => debug!(line, "skipping malformed stream record"),
                None => {},
            }
        }
        self.sourcetable = entries.clone();
        if self.mountpoint.is_empty() {
            let reference = self.settings.reference;
            let (entry, distance_km) = sourcetable::nearest(&entries, reference.lat, reference.lon)
                .ok_or(NtripError::NoMountpoint)?;
            info!(mountpoint = %entry.mountpoint, distance_km, "selected nearest mountpoint");
            self.mountpoint = entry.mountpoint.clone();
        }
        Ok(SessionOutcome::Sourcetable(entries))
    }

    /// Sentence to send upstream, `None` when there is nothing to report yet
    fn next_gga(&mut self) -> Option<Sentence> {
        match self.settings.gga_mode {
            GgaMode::Live => {
                if let Some(positions) = self.positions.as_mut() {
                    while let Ok(sentence) = positions.try_recv() {
                        self.latest_gga = Some(sentence);
                    }
                }
                self.latest_gga.clone()
            },
            GgaMode::Fixed => {
                let reference = self.settings.reference;
                let gga = Gga {
                    time: Utc::now().time(),
                    lat: reference.lat,
                    lon: reference.lon,
                    quality: 1,
                    num_sv: 15,
                    hdop: 0.0,
                    alt: reference.alt,
                    sep: reference.sep,
                    diff_age: None,
                    diff_station: None,
                };
                Some(gga.to_sentence("GP"))
            },
        }
    }

    /// Write the next GGA sentence, `Ok(false)` when there was none to send
    async fn send_gga<W>(&mut self, writer: &mut W) -> Result<bool, NtripError>
    where
        W: AsyncWrite + Unpin,
    {
        let Some(sentence) = self.next_gga() else {
            trace!("no position to send to caster yet");
            return Ok(false);
        };
        let line = sentence.to_line();
        writer.write_all(line.as_bytes()).await?;
        debug!(gga = line.trim_end(), "position sent to caster");
        Ok(true)
    }

    /// Forward correction frames until stopped. The stop signal is checked
    /// between frames and whenever the caster stays silent for a poll
    /// interval.
    async fn relay<R, W>(&mut self, reader: &mut R, writer: &mut W) -> Result<SessionOutcome, NtripError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let poll = self.settings.poll_interval();
        let interval = self.settings.gga_interval();
        let mut next_gga = interval.map(|_| Instant::now());
        let mut pending = None;
        let mut frames = 0u64;
        loop {
            if self.stop.is_stopped() {
                return Ok(SessionOutcome::Stopped { frames });
            }
            if let (Some(due), Some(interval)) = (next_gga, interval) {
                // stays due until a sentence actually went out
                if Instant::now() >= due && self.send_gga(writer).await? {
                    next_gga = Some(Instant::now() + interval);
                }
            }

            let lead = match pending.take() {
                Some(byte) => byte,
                None => match timeout(poll, reader.read_u8()).await {
                    Ok(byte) => byte?,
                    Err(_) => continue,
                },
            };
            if lead != RTCM_SYNC_CHAR {
                continue;
            }
            let second = reader.read_u8().await?;
            if !rtcm::is_frame_start(lead, second) {
                pending = Some(second);
                continue;
            }
            let frame = match wire::read_rtcm(reader, lead, second).await {
                Ok(frame) => frame,
                Err(FramerError::Io(e)) => return Err(e.into()),
                Err(e) => {
                    warn!(error = %e, "skipping correction frame");
                    continue;
                },
            };
            trace!(message_type = ?frame.message_type(), "correction frame");
            if self.corrections.send(frame.into()).await.is_err() {
                return Ok(SessionOutcome::OutputClosed { frames });
            }
            if frames == 0 {
                info!("corrections flowing");
                self.status.set(true);
            }
            frames += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReferencePosition;

    fn client(mode: GgaMode) -> (NtripClient, mpsc::Sender<Sentence>) {
        let (corrections, _rx) = mpsc::channel(4);
        let (positions_tx, positions) = mpsc::channel(1);
        let settings = NtripSettings {
            gga_mode: mode,
            reference: ReferencePosition {
                lat: 50.5,
                lon: -7.25,
                alt: 100.0,
                sep: 46.9,
            },
            ..NtripSettings::default()
        };
        let client = NtripClient::new(settings, corrections, StatusFlag::new(), StopSignal::new())
            .with_positions(positions);
        (client, positions_tx)
    }

    #[tokio::test]
    async fn fixed_gga_from_reference() {
        let (mut client, _tx) = client(GgaMode::Fixed);
        let sentence = client.next_gga().unwrap();
        assert_eq!(sentence.talker(), "GP");
        assert_eq!(sentence.field("lat"), Some("5030.00000"));
        assert_eq!(sentence.field("ew"), Some("W"));
        assert_eq!(sentence.field("num_sv"), Some("15"));
        assert!(rover_proto::nmea::is_valid(&sentence.to_line()));
    }

    #[tokio::test]
    async fn live_gga_keeps_latest() {
        let (mut client, tx) = client(GgaMode::Live);
        assert!(client.next_gga().is_none());
        let line = "$GPGGA,092725.00,4717.11399,N,00833.91590,E,1,08,1.01,499.6,M,48.0,M,,*5B";
        tx.send(Sentence::parse(line).unwrap()).await.unwrap();
        assert_eq!(client.next_gga().unwrap().field("num_sv"), Some("08"));
        // still the last one known while the queue is empty
        assert!(client.next_gga().is_some());
    }

    #[tokio::test]
    async fn live_gga_goes_out_once_a_fix_exists() {
        let (mut client, tx) = client(GgaMode::Live);
        client.settings.gga_interval_secs = Some(60);
        client.settings.poll_interval_ms = 20;
        let stop = client.stop.clone();

        let (caster, rover) = tokio::io::duplex(1024);
        let (rover_read, mut rover_write) = tokio::io::split(rover);
        let mut rover_read = BufReader::new(rover_read);
        let (mut caster_read, _caster_write) = tokio::io::split(caster);

        let upstream = async {
            // no fix when the stream starts
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            let line = "$GPGGA,092725.00,4717.11399,N,00833.91590,E,1,08,1.01,499.6,M,48.0,M,,*5B";
            tx.send(Sentence::parse(line).unwrap()).await.unwrap();
            let mut buf = vec![0; 128];
            let read = timeout(std::time::Duration::from_secs(1), caster_read.read(&mut buf))
                .await
                .unwrap()
                .unwrap();
            stop.stop();
            String::from_utf8_lossy(&buf[..read]).into_owned()
        };
        let (outcome, upstream) = tokio::join!(client.relay(&mut rover_read, &mut rover_write), upstream);
        assert!(matches!(outcome, Ok(SessionOutcome::Stopped { frames: 0 })));
        assert!(upstream.starts_with("$GPGGA,092725.00,4717.11399,N,"));
    }
}
