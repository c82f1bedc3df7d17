use rover_proto::Sentence;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Move GGA sentences from the framer into the single slot position report
/// queue.
///
/// The framer's queue drops on full and this task is the only one that
/// blocks, so a relay that is busy elsewhere holds back at most one report.
/// Whatever piled up meanwhile is skipped in favor of the newest sentence.
/// Returns the number of reports handed over once either side is closed.
pub async fn forward_positions(
    mut gga: mpsc::Receiver<Sentence>,
    reports: mpsc::Sender<Sentence>,
) -> u64 {
    let mut forwarded = 0;
    while let Some(mut latest) = gga.recv().await {
        while let Ok(newer) = gga.try_recv() {
            latest = newer;
        }
        trace!(time = latest.field("time"), "position report");
        if reports.send(latest).await.is_err() {
            break;
        }
        forwarded += 1;
    }
    debug!(forwarded, "position forwarder stopped");
    forwarded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gga(time: &str) -> Sentence {
        Sentence::new(
            "GN",
            "GGA",
            vec![time.to_string(), String::new(), String::new()],
        )
    }

    #[tokio::test]
    async fn latest_wins_while_slot_is_taken() {
        let (gga_tx, gga_rx) = mpsc::channel(4);
        let (reports_tx, mut reports) = mpsc::channel(1);
        let task = tokio::spawn(forward_positions(gga_rx, reports_tx));

        gga_tx.send(gga("100000.00")).await.unwrap();
        // first report takes the slot
        tokio::task::yield_now().await;
        for time in ["100001.00", "100002.00", "100003.00"] {
            gga_tx.send(gga(time)).await.unwrap();
        }
        tokio::task::yield_now().await;

        assert_eq!(reports.recv().await.unwrap().field("time"), Some("100000.00"));
        assert_eq!(reports.recv().await.unwrap().field("time"), Some("100003.00"));
        drop(gga_tx);
        assert_eq!(task.await.unwrap(), 2);
        assert!(reports.recv().await.is_none());
    }
}
