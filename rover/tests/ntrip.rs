use std::time::Duration;

use rover::{
    config::{GgaMode, NtripSettings, ReferencePosition},
    NtripClient, NtripError, OutboundFrame, SessionOutcome, SessionState, StatusFlag, StopSignal,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{tcp::OwnedReadHalf, TcpListener},
    sync::mpsc,
    time::{sleep, timeout, Instant},
};

const SOURCETABLE: &str = "SOURCETABLE 200 OK\r\n\
Server: test caster\r\n\
Content-Type: text/plain\r\n\
\r\n\
CAS;caster.example;2101;test;none;0;DEU;50.00;8.00;0.0.0.0;0;\r\n\
NET;SAPOS;LVermGeo;B;N;none;none;none;none\r\n\
STR;MAIN00DEU0;Mainz;RTCM 3.3;1005(10);2;GPS+GLO;SAPOS;DEU;49.99;8.25;0;0;sNTRIP;none;B;N;5600;\r\n\
STR;KOBL00DEU0;Koblenz;RTCM 3.3;1005(10),1077(1);2;GPS+GLO+GAL;SAPOS;DEU;50.36;7.60;1;0;sNTRIP;none;B;N;5600;\r\n\
STR;BONN00DEU0;Bonn;RTCM 3.3;1005(10);2;GPS;SAPOS;DEU;50.72;7.10;1;0;sNTRIP;none;B;N;5600;\r\n\
ENDSOURCETABLE\r\n";

const RTCM_1005: [u8; 8] = [0xd3, 0x00, 0x02, 0x3e, 0xd0, 0x01, 0x02, 0x03];

fn settings(port: u16) -> NtripSettings {
    NtripSettings {
        server: "127.0.0.1".to_string(),
        port,
        gga_mode: GgaMode::Fixed,
        reference: ReferencePosition {
            lat: 50.390281,
            lon: 7.3161025,
            alt: 269.7,
            sep: 46.9,
        },
        poll_interval_ms: 200,
        ..NtripSettings::default()
    }
}

async fn read_request(reader: &mut BufReader<OwnedReadHalf>) -> String {
    let mut request = String::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await.unwrap() == 0 || line == "\r\n" {
            return request;
        }
        request.push_str(&line);
    }
}

#[tokio::test]
async fn sourcetable_selects_nearest_mountpoint() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let caster = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut reader = BufReader::new(read);
        let request = read_request(&mut reader).await;
        write.write_all(SOURCETABLE.as_bytes()).await.unwrap();
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).await.unwrap();
        (request, rest)
    });

    let (corrections, mut corrections_rx) = mpsc::channel::<OutboundFrame>(4);
    let status = StatusFlag::new();
    let mut client = NtripClient::new(settings(port), corrections, status.clone(), StopSignal::new());
    assert_eq!(client.mountpoint(), "");

    let outcome = client.session().await.unwrap();
    let SessionOutcome::Sourcetable(entries) = outcome else {
        panic!("expected a sourcetable, got {:?}", outcome);
    };
    assert_eq!(entries.len(), 3);
    assert_eq!(client.sourcetable().len(), 3);
    assert_eq!(client.mountpoint(), "KOBL00DEU0");
    assert_eq!(client.state(), SessionState::Idle);
    assert!(!status.get());
    drop(client);
    assert!(corrections_rx.recv().await.is_none());

    let (request, rest) = caster.await.unwrap();
    assert!(request.starts_with("GET / HTTP/1.1\r\n"));
    assert!(request.contains(&format!("Host: 127.0.0.1:{}\r\n", port)));
    assert!(request.contains("Ntrip-Version: Ntrip/2.0\r\n"));
    assert!(!request.contains("Authorization"));
    // no position report outside a stream
    assert!(rest.is_empty());
}

#[tokio::test]
async fn latin1_station_name_does_not_end_the_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut reader = BufReader::new(read);
        read_request(&mut reader).await;
        let mut table = b"SOURCETABLE 200 OK\r\nContent-Type: text/plain\r\n\r\n".to_vec();
        table.extend_from_slice(
            b"STR;MUEL00DEU0;M\xfcllheim;RTCM 3.3;1005(10);2;GPS;SAPOS;DEU;47.81;7.63;1;0;sNTRIP;none;B;N;5600;\r\n",
        );
        table.extend_from_slice(
            b"STR;KOBL00DEU0;Koblenz;RTCM 3.3;1005(10);2;GPS;SAPOS;DEU;50.36;7.60;1;0;sNTRIP;none;B;N;5600;\r\n",
        );
        table.extend_from_slice(b"ENDSOURCETABLE\r\n");
        write.write_all(&table).await.unwrap();
    });

    let (corrections, _rx) = mpsc::channel(4);
    let mut client = NtripClient::new(settings(port), corrections, StatusFlag::new(), StopSignal::new());
    let outcome = client.session().await.unwrap();
    assert!(matches!(outcome, SessionOutcome::Sourcetable(ref entries) if entries.len() == 2));
    assert_eq!(client.sourcetable()[0].identifier, "M\u{fffd}llheim");
    assert_eq!(client.mountpoint(), "KOBL00DEU0");
}

#[tokio::test]
async fn stop_signal_ends_streaming() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let caster = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut reader = BufReader::new(read);
        let request = read_request(&mut reader).await;
        write.write_all(b"ICY 200 OK\r\n").await.unwrap();
        tokio::spawn(async move {
            while write.write_all(&RTCM_1005).await.is_ok() {
                sleep(Duration::from_millis(20)).await;
            }
        });
        let mut upstream = Vec::new();
        let _ = reader.read_to_end(&mut upstream).await;
        (request, String::from_utf8_lossy(&upstream).into_owned())
    });

    let (corrections, mut corrections_rx) = mpsc::channel(64);
    let status = StatusFlag::new();
    let stop = StopSignal::new();
    let mut ntrip = settings(port);
    ntrip.mountpoint = "KOBL00DEU0".to_string();
    ntrip.user = Some("rover".to_string());
    let poll = ntrip.poll_interval();
    tokio::spawn(NtripClient::new(ntrip, corrections, status.clone(), stop.clone()).run());

    let first = timeout(Duration::from_secs(5), corrections_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.to_bytes().as_ref(), RTCM_1005);
    timeout(Duration::from_secs(5), async {
        while !status.get() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    stop.stop();
    let stopped_at = Instant::now();
    while status.get() {
        sleep(Duration::from_millis(5)).await;
    }
    assert!(stopped_at.elapsed() <= poll);

    // at most a frame that was already in flight
    sleep(poll).await;
    while corrections_rx.try_recv().is_ok() {}
    sleep(poll * 2).await;
    assert!(corrections_rx.try_recv().is_err());
    assert!(!status.get());

    let (request, upstream) = timeout(Duration::from_secs(5), caster).await.unwrap().unwrap();
    assert!(request.starts_with("GET /KOBL00DEU0 HTTP/1.1\r\n"));
    assert!(request.contains("Authorization: Basic "));
    assert!(upstream.starts_with("$GPGGA,"));
    assert!(upstream.contains(",5023.41686,N,00718.96615,E,1,15,"));
}

#[tokio::test]
async fn error_status_fails_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut reader = BufReader::new(read);
        read_request(&mut reader).await;
        write
            .write_all(b"HTTP/1.1 401 Unauthorized\r\n\r\n")
            .await
            .unwrap();
    });

    let (corrections, _rx) = mpsc::channel(4);
    let status = StatusFlag::new();
    let mut client = NtripClient::new(settings(port), corrections, status.clone(), StopSignal::new());
    match client.session().await {
        Err(NtripError::Status(line)) => assert!(line.contains("401")),
        other => panic!("unexpected {:?}", other),
    }
    assert!(!status.get());
    assert_eq!(client.state(), SessionState::Idle);
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let (corrections, _rx) = mpsc::channel(4);
    let mut client = NtripClient::new(settings(port), corrections, StatusFlag::new(), StopSignal::new());
    assert!(matches!(
        client.session().await,
        Err(NtripError::Transport(_))
    ));
}
