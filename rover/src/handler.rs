//! Request/response API over the receiver queues.
//!
//! The UBX protocol has no transaction ids. A reply is matched to its request
//! by the queue it arrives on and by the class and id it carries, and every
//! exchange starts by discarding whatever replies are still queued. The
//! handler therefore takes `&mut self` for every operation: one exchange at a
//! time, enforced by the borrow checker, with a mutex around the handler when
//! several tasks need it.

use std::time::Duration;

use rover_proto::{
    catalog::{self, class, MessageDef},
    cfg_val::{self, CfgLayerGet, CfgLayerSet},
    nmea::NMEA_MSG_IDS,
    satellites, FixType, Mode, NavSolution, Record, SatelliteInfo, SatelliteSystems, UbxPacket,
};
use tokio::{sync::mpsc, time::Instant};
use tracing::{debug, info, trace};

use crate::{error::CommandError, queue::flush, writer::OutboundFrame};

pub const MIN_UPDATE_RATE_MS: u32 = 50;
pub const MAX_UPDATE_RATE_MS: u32 = 5000;

/// Receiving ends of the queues the framer fills for the handler
#[derive(Debug)]
pub struct ReplyQueues {
    pub ack: mpsc::Receiver<UbxPacket>,
    pub cfg: mpsc::Receiver<UbxPacket>,
    pub nav: mpsc::Receiver<UbxPacket>,
}

/// Position accuracy estimates in millimeters
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Precision {
    pub h_acc: u32,
    pub v_acc: u32,
}

#[derive(Debug, Clone, Copy)]
enum ReplyQueue {
    Cfg,
    Nav,
}

/// Class and id a packet acknowledges, and whether it is positive
fn acknowledged(packet: &UbxPacket) -> Option<((u8, u8), bool)> {
    let record = packet.decode(Mode::Get).ok()?;
    let msg_id = record.get_u64("msg_id")? as u8;
    if packet.is(&catalog::ACK_ACK) || packet.is(&catalog::ACK_NAK) {
        let cls_id = record.get_u64("cls_id")? as u8;
        Some(((cls_id, msg_id), packet.is(&catalog::ACK_ACK)))
    } else if packet.is(&catalog::MGA_ACK_DATA0) || packet.is(&catalog::MGA_NAK_DATA0) {
        Some(((class::MGA, msg_id), packet.is(&catalog::MGA_ACK_DATA0)))
    } else {
        None
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn build(def: &'static MessageDef, mode: Mode, record: &Record) -> Result<UbxPacket, CommandError> {
    UbxPacket::build(def, mode, record).map_err(CommandError::Encode)
}

fn decode(packet: &UbxPacket) -> Result<Record, CommandError> {
    packet.decode(Mode::Get).map_err(CommandError::Decode)
}

pub struct GnssHandler {
    outbound: mpsc::Sender<OutboundFrame>,
    replies: ReplyQueues,
    reply_timeout: Option<Duration>,
}

impl GnssHandler {
    pub fn new(outbound: mpsc::Sender<OutboundFrame>, replies: ReplyQueues) -> Self {
        Self {
            outbound,
            replies,
            reply_timeout: None,
        }
    }

    /// Give up on a reply after `timeout`. Without it the handler waits for
    /// as long as the receiver takes.
    pub fn with_reply_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.reply_timeout = timeout;
        self
    }

    fn deadline(&self) -> Option<Instant> {
        self.reply_timeout.map(|timeout| Instant::now() + timeout)
    }

    fn flush_replies(&mut self) {
        let stale = flush(&mut self.replies.ack)
            + flush(&mut self.replies.cfg)
            + flush(&mut self.replies.nav);
        if stale > 0 {
            debug!(stale, "discarded stale replies");
        }
    }

    async fn send(&mut self, packet: UbxPacket) -> Result<(), CommandError> {
        self.outbound
            .send(packet.into())
            .await
            .map_err(|_| CommandError::ChannelClosed)
    }

    /// Send a SET style request, `Ok(false)` on NAK
    async fn command(&mut self, request: UbxPacket) -> Result<bool, CommandError> {
        let target = (request.class(), request.msg_id());
        self.flush_replies();
        self.send(request).await?;
        let deadline = self.deadline();
        loop {
            let ack = tokio::select! {
                ack = self.replies.ack.recv() => ack.ok_or(CommandError::ChannelClosed)?,
                _ = until(deadline) => return Err(CommandError::Timeout),
            };
            match acknowledged(&ack) {
                Some((acked, ok)) if acked == target => return Ok(ok),
                _ => debug!(class = ack.class(), id = ack.msg_id(), "skipping unrelated acknowledgement"),
            }
        }
    }

    /// Send a poll request and wait for the reply carrying the same class and
    /// id, `Ok(None)` on NAK
    async fn poll(
        &mut self,
        request: UbxPacket,
        queue: ReplyQueue,
    ) -> Result<Option<UbxPacket>, CommandError> {
        let target = (request.class(), request.msg_id());
        self.flush_replies();
        self.send(request).await?;
        let deadline = self.deadline();
        let (replies, acks) = match queue {
            ReplyQueue::Cfg => (&mut self.replies.cfg, &mut self.replies.ack),
            ReplyQueue::Nav => (&mut self.replies.nav, &mut self.replies.ack),
        };
        loop {
            tokio::select! {
                reply = replies.recv() => {
                    let reply = reply.ok_or(CommandError::ChannelClosed)?;
                    if (reply.class(), reply.msg_id()) == target {
                        return Ok(Some(reply));
                    }
                    debug!(class = reply.class(), id = reply.msg_id(), "skipping unrelated reply");
                },
                ack = acks.recv() => {
                    let ack = ack.ok_or(CommandError::ChannelClosed)?;
                    match acknowledged(&ack) {
                        Some((acked, false)) if acked == target => return Ok(None),
                        Some((acked, true)) if acked == target => trace!("poll acknowledged"),
                        _ => debug!(class = ack.class(), id = ack.msg_id(), "skipping unrelated acknowledgement"),
                    }
                },
                _ = until(deadline) => return Err(CommandError::Timeout),
            }
        }
    }

    /// Set the measurement period in ms, clamped to 50..=5000
    pub async fn set_update_rate(&mut self, rate_ms: u32) -> Result<bool, CommandError> {
        let rate = rate_ms.clamp(MIN_UPDATE_RATE_MS, MAX_UPDATE_RATE_MS);
        if rate != rate_ms {
            debug!(requested = rate_ms, rate, "update rate clamped");
        }
        let record = Record::new()
            .with("meas_rate", rate)
            .with("nav_rate", 1u16)
            .with("time_ref", 1u16);
        let ok = self
            .command(build(&catalog::CFG_RATE, Mode::Set, &record)?)
            .await?;
        info!(rate, ok, "set update rate");
        Ok(ok)
    }

    /// Measurement period in ms
    pub async fn get_update_rate(&mut self) -> Result<Option<u16>, CommandError> {
        let Some(reply) = self
            .poll(UbxPacket::poll(&catalog::CFG_RATE).map_err(CommandError::Encode)?, ReplyQueue::Cfg)
            .await?
        else {
            return Ok(None);
        };
        Ok(decode(&reply)?.get_u64("meas_rate").map(|rate| rate as u16))
    }

    /// Enable or disable constellations in the RAM layer
    pub async fn set_satellite_systems(
        &mut self,
        systems: SatelliteSystems,
    ) -> Result<bool, CommandError> {
        let mut cfg_data = Vec::new();
        for (key, value) in systems.key_values() {
            cfg_val::encode_key_value(key, value, &mut cfg_data).map_err(CommandError::Encode)?;
        }
        let record = Record::new()
            .with("version", 0u8)
            .with("layers", CfgLayerSet::RAM.bits())
            .with("transaction", 0u8)
            .with(
                "group",
                cfg_data
                    .into_iter()
                    .map(|b| Record::new().with("cfg_data", b))
                    .collect::<Vec<_>>(),
            );
        let ok = self
            .command(build(&catalog::CFG_VALSET, Mode::Set, &record)?)
            .await?;
        info!(?systems, ok, "set satellite systems");
        Ok(ok)
    }

    /// Constellations enabled in the RAM layer
    pub async fn get_satellite_systems(&mut self) -> Result<Option<SatelliteSystems>, CommandError> {
        let record = Record::new()
            .with("version", 0u8)
            .with("layer", CfgLayerGet::Ram as u8)
            .with("position", 0u16)
            .with(
                "group",
                SatelliteSystems::KEYS
                    .iter()
                    .map(|key| Record::new().with("keys", key.raw()))
                    .collect::<Vec<_>>(),
            );
        let request = build(&catalog::CFG_VALGET, Mode::Poll, &record)?;
        let Some(reply) = self.poll(request, ReplyQueue::Cfg).await? else {
            return Ok(None);
        };
        let cfg_data: Vec<u8> = decode(&reply)?
            .group("group")
            .unwrap_or_default()
            .iter()
            .filter_map(|item| item.get_u64("cfg_data"))
            .map(|b| b as u8)
            .collect();
        let items = cfg_val::parse_cfg_data(&cfg_data).map_err(CommandError::Decode)?;
        Ok(Some(SatelliteSystems::from_key_values(&items)))
    }

    async fn poll_nav(&mut self, def: &'static MessageDef) -> Result<Option<Record>, CommandError> {
        let request = UbxPacket::poll(def).map_err(CommandError::Encode)?;
        match self.poll(request, ReplyQueue::Nav).await? {
            Some(reply) => Ok(Some(decode(&reply)?)),
            None => Ok(None),
        }
    }

    /// Current NAV-PVT solution
    pub async fn get_navigation_solution(&mut self) -> Result<Option<NavSolution>, CommandError> {
        match self.poll_nav(&catalog::NAV_PVT).await? {
            Some(record) => NavSolution::try_from(&record)
                .map(Some)
                .map_err(CommandError::Decode),
            None => Ok(None),
        }
    }

    pub async fn get_precision(&mut self) -> Result<Option<Precision>, CommandError> {
        Ok(self
            .get_navigation_solution()
            .await?
            .map(|solution| Precision {
                h_acc: solution.h_acc,
                v_acc: solution.v_acc,
            }))
    }

    /// Fix type, refined to RTK float or fixed from the carrier solution
    pub async fn get_fix_type(&mut self) -> Result<Option<FixType>, CommandError> {
        Ok(self
            .get_navigation_solution()
            .await?
            .map(|solution| solution.fix_type()))
    }

    /// Satellites used in the navigation solution
    pub async fn get_satellites_in_use(&mut self) -> Result<Option<Vec<SatelliteInfo>>, CommandError> {
        let Some(record) = self.poll_nav(&catalog::NAV_SAT).await? else {
            return Ok(None);
        };
        let mut svs = satellites(&record).map_err(CommandError::Decode)?;
        svs.retain(|sv| sv.used);
        Ok(Some(svs))
    }

    /// Turn off every standard NMEA sentence on UART1 except GGA.
    ///
    /// Acknowledgements are drained as they come in but not checked. Returns
    /// the number of requests sent.
    pub async fn set_minimum_nmea_msgs(&mut self) -> Result<usize, CommandError> {
        self.flush_replies();
        let mut sent = 0;
        for (msg_id, name) in NMEA_MSG_IDS {
            let rate = u8::from(msg_id == 0x00);
            let record = Record::new()
                .with("msg_class", class::NMEA)
                .with("msg_id", msg_id)
                .with("rate_uart1", rate)
                .with("rate_usb", 0u8);
            self.send(build(&catalog::CFG_MSG, Mode::Set, &record)?)
                .await?;
            sent += 1;
            while let Ok(ack) = self.replies.ack.try_recv() {
                trace!(ack = ?acknowledged(&ack), "minimum nmea acknowledgement");
            }
            debug!(sentence = name, rate, "nmea output rate");
        }
        info!(requests = sent, "minimum NMEA output configured");
        Ok(sent)
    }
}
