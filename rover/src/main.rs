use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use rover::{
    cli,
    config::{SerialSettings, Settings},
    logging,
    position::forward_positions,
    queue::drop_on_full,
    GnssHandler, NtripClient, ReplyQueues, Routes, StatusFlag, StopSignal, StreamFramer,
    UartWriter,
};
use tokio::{
    net::TcpStream,
    sync::{mpsc, Mutex},
    time::timeout,
};
use tokio_serial::SerialStream;
use tracing::{error, info, warn};

const PROBE_INTERVAL: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    let matches = cli::CommandBuilder::default().build().get_matches();
    logging::initialize(cli::log_to_file(&matches))?;
    let settings = cli::settings(&matches)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;
    runtime.block_on(run(settings))
}

fn open(port: &SerialSettings) -> Result<SerialStream> {
    let builder = tokio_serial::new(&port.port, port.baud);
    let stream = SerialStream::open(&builder)
        .with_context(|| format!("Failed to open port: {}", port.port))?;
    info!(port = %port.port, baud = port.baud, "serial port open");
    Ok(stream)
}

async fn run(settings: Settings) -> Result<()> {
    let (receiver_rx, receiver_tx) = tokio::io::split(open(&settings.receiver)?);

    let queues = &settings.queues;
    let (ack, ack_rx) = drop_on_full("ack", queues.ack);
    let (cfg, cfg_rx) = drop_on_full("cfg", queues.cfg);
    let (nav, nav_rx) = drop_on_full("nav", queues.nav);
    let (gga, gga_rx) = drop_on_full("gga", queues.gga);
    let routes = Routes {
        ack,
        cfg,
        nav,
        gga,
        rtcm: None,
    };
    let mut framer =
        tokio::spawn(StreamFramer::new(receiver_rx, routes, settings.error_policy).run());

    let (outbound_tx, outbound_rx) = mpsc::channel(queues.outbound);
    tokio::spawn(async move {
        if let Err(e) = UartWriter::new("uart1", receiver_tx, outbound_rx).run().await {
            error!(error = %e, "receiver link writer failed");
        }
    });
    let replies = ReplyQueues {
        ack: ack_rx,
        cfg: cfg_rx,
        nav: nav_rx,
    };
    let handler = Arc::new(Mutex::new(
        GnssHandler::new(outbound_tx, replies).with_reply_timeout(settings.reply_timeout()),
    ));

    let status = StatusFlag::new();
    let (reports_tx, reports_rx) = mpsc::channel(1);
    tokio::spawn(forward_positions(gga_rx, reports_tx));

    if let Some(ntrip) = settings.ntrip.clone() {
        let (corrections_tx, corrections_rx) = mpsc::channel(queues.corrections);
        let correction_port = open(&settings.corrections)?;
        tokio::spawn(async move {
            if let Err(e) = UartWriter::new("uart2", correction_port, corrections_rx).run().await {
                error!(error = %e, "correction port writer failed");
            }
        });
        let stop = StopSignal::new();
        if settings.reachability_probe {
            tokio::spawn(probe_caster(ntrip.server.clone(), ntrip.port, stop.clone()));
        }
        let client = NtripClient::new(ntrip, corrections_tx, status.clone(), stop)
            .with_positions(reports_rx);
        tokio::spawn(client.run());
    } else {
        info!("no NTRIP caster configured, running without corrections");
    }

    startup(&handler, &settings).await;

    let mut ticker = tokio::time::interval(Duration::from_secs(settings.fix_log_interval_secs.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => log_fix(&handler, &status).await,
            stats = &mut framer => {
                let stats = stats.context("framer task panicked")??;
                info!(?stats, "receiver link closed");
                return Ok(());
            },
        }
    }
}

async fn startup(handler: &Mutex<GnssHandler>, settings: &Settings) {
    let mut handler = handler.lock().await;
    if let Some(rate) = settings.startup.update_rate_ms {
        match handler.set_update_rate(rate).await {
            Ok(true) => {},
            Ok(false) => warn!(rate, "receiver rejected update rate"),
            Err(e) => warn!(error = %e, "cannot set update rate"),
        }
    }
    if settings.startup.minimum_nmea {
        if let Err(e) = handler.set_minimum_nmea_msgs().await {
            warn!(error = %e, "cannot configure NMEA output");
        }
    }
}

async fn log_fix(handler: &Mutex<GnssHandler>, status: &StatusFlag) {
    let mut handler = handler.lock().await;
    let solution = match handler.get_navigation_solution().await {
        Ok(Some(solution)) => solution,
        Ok(None) => {
            warn!("receiver rejected navigation solution poll");
            return;
        },
        Err(e) => {
            warn!(error = %e, "cannot poll navigation solution");
            return;
        },
    };
    let in_use = match handler.get_satellites_in_use().await {
        Ok(svs) => svs.map(|svs| svs.len()),
        Err(e) => {
            warn!(error = %e, "cannot poll satellites");
            None
        },
    };
    info!(
        fix = %solution.fix_type(),
        lat = solution.position.lat,
        lon = solution.position.lon,
        alt = solution.position.alt,
        h_acc_mm = solution.h_acc,
        v_acc_mm = solution.v_acc,
        num_sv = solution.num_sv,
        ?in_use,
        corrections = status.get(),
        "fix"
    );
}

/// Pause the relay while the caster does not accept connections
async fn probe_caster(server: String, port: u16, stop: StopSignal) {
    let mut ticker = tokio::time::interval(PROBE_INTERVAL);
    loop {
        ticker.tick().await;
        let reachable = matches!(
            timeout(PROBE_INTERVAL, TcpStream::connect((server.as_str(), port))).await,
            Ok(Ok(_))
        );
        match (reachable, stop.is_stopped()) {
            (true, true) => {
                info!(%server, "caster reachable, resuming corrections");
                stop.resume();
            },
            (false, false) => {
                warn!(%server, "caster unreachable, pausing corrections");
                stop.stop();
            },
            _ => {},
        }
    }
}
