use std::time::Duration;

use rover::{queue::drop_on_full, ErrorPolicy, Routes, StreamFramer};
use rover_proto::{Sentence, UbxPacket};
use tokio::sync::mpsc::Receiver;

const GGA_LINE: &[u8] =
    b"$GPGGA,092725.00,4717.11399,N,00833.91590,E,1,08,1.01,499.6,M,48.0,M,,*5B\r\n";
// ACK-ACK for CFG-RATE
const ACK_ACK: [u8; 10] = [0xb5, 0x62, 0x05, 0x01, 0x02, 0x00, 0x06, 0x08, 0x16, 0x3f];

/// NAV-STATUS report without a fix
fn nav_status() -> Vec<u8> {
    UbxPacket::new(0x01, 0x03, vec![0; 16]).unwrap().to_bytes()
}

struct Sinks {
    ack: Receiver<UbxPacket>,
    nav: Receiver<UbxPacket>,
    gga: Receiver<Sentence>,
}

fn routes(capacity: usize) -> (Routes, Sinks) {
    let (ack, ack_rx) = drop_on_full("ack", capacity);
    let (cfg, _) = drop_on_full("cfg", capacity);
    let (nav, nav_rx) = drop_on_full("nav", capacity);
    let (gga, gga_rx) = drop_on_full("gga", capacity);
    (
        Routes {
            ack,
            cfg,
            nav,
            gga,
            rtcm: None,
        },
        Sinks {
            ack: ack_rx,
            nav: nav_rx,
            gga: gga_rx,
        },
    )
}

#[tokio::test]
async fn malformed_then_sentence_then_packet() {
    let mut bytes = ACK_ACK.to_vec();
    // corrupt the checksum of the first frame
    bytes[9] ^= 0x40;
    bytes.extend_from_slice(GGA_LINE);
    bytes.extend_from_slice(&ACK_ACK);

    let (routes, mut sinks) = routes(4);
    let stats = StreamFramer::new(&bytes[..], routes, ErrorPolicy::Log)
        .run()
        .await
        .unwrap();

    assert_eq!(stats.errors(), 1);
    assert_eq!(stats.checksum_errors, 1);
    assert_eq!((stats.nmea, stats.ubx), (1, 1));

    let sentence = sinks.gga.try_recv().unwrap();
    assert_eq!(sentence.talker(), "GP");
    assert_eq!(sentence.field("lat"), Some("4717.11399"));
    assert!(sinks.gga.try_recv().is_err());

    let ack = sinks.ack.try_recv().unwrap();
    assert_eq!(ack.to_bytes(), ACK_ACK);
    assert!(sinks.ack.try_recv().is_err());
}

#[tokio::test]
async fn full_queue_never_stalls_the_framer() {
    let bytes: Vec<u8> = std::iter::repeat_with(nav_status)
        .take(100)
        .flatten()
        .collect();

    let (routes, mut sinks) = routes(4);
    let nav = routes.nav.clone();
    // nobody drains the queue while the framer runs
    let stats = tokio::time::timeout(
        Duration::from_secs(5),
        StreamFramer::new(&bytes[..], routes, ErrorPolicy::Raise).run(),
    )
    .await
    .expect("framer stalled on a full queue")
    .unwrap();

    assert_eq!(stats.ubx, 100);
    assert_eq!(stats.dropped, 96);
    assert_eq!(nav.dropped(), 96);
    assert_eq!(nav.len(), 4);

    let mut received = 0;
    while sinks.nav.try_recv().is_ok() {
        received += 1;
    }
    assert_eq!(received, 4);
}

#[tokio::test]
async fn noise_between_frames_is_skipped() {
    let mut bytes = vec![0x00, 0xff, b'$', 0x13];
    bytes.extend_from_slice(&nav_status());
    bytes.extend_from_slice(b"garbage\r\n");
    bytes.extend_from_slice(GGA_LINE);

    let (routes, mut sinks) = routes(4);
    let stats = StreamFramer::new(&bytes[..], routes, ErrorPolicy::Raise)
        .run()
        .await
        .unwrap();

    assert_eq!(stats.errors(), 0);
    assert!(sinks.nav.try_recv().is_ok());
    assert!(sinks.gga.try_recv().is_ok());
}
