use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use rover_proto::{
    catalog, constants::UBX_HEADER_LEN, rtcm, Mode, Record, Sentence, UbxPacket,
};
use std::hint::black_box;

const GGA_LINE: &str =
    "$GPGGA,092725.00,4717.11399,N,00833.91590,E,1,08,1.01,499.6,M,48.0,M,,*5B\r\n";

fn nav_pvt_frame() -> Vec<u8> {
    let record = Record::new()
        .with("itow", 417_000u32)
        .with("year", 2024u16)
        .with("month", 5u8)
        .with("day", 17u8)
        .with("fix_type", 3u8)
        .with("num_sv", 21u8)
        .with("lon", 7.3161025)
        .with("lat", 50.390281)
        .with("h_msl", 269_700i32)
        .with("p_dop", 1.27);
    UbxPacket::build(&catalog::NAV_PVT, Mode::Get, &record)
        .map(|p| p.to_bytes())
        .unwrap_or_default()
}

/// Stream of interleaved UBX, NMEA and RTCM frames with a little noise
fn mixed_stream(repeats: usize) -> Vec<u8> {
    let pvt = nav_pvt_frame();
    let mut rtcm = vec![0xd3, 0x00, 0x13, 0x3e, 0xd0];
    rtcm.resize(3 + 0x13 + 3, 0x55);
    let mut data = Vec::new();
    for _ in 0..repeats {
        data.extend_from_slice(&pvt);
        data.extend_from_slice(GGA_LINE.as_bytes());
        data.extend_from_slice(&rtcm);
        data.extend_from_slice(&[0x00, 0xff]);
    }
    data
}

/// Single pass over `data` the way the serial framer walks it, without I/O
fn frame_all(data: &[u8]) -> usize {
    let mut count = 0;
    let mut pos = 0;
    while pos < data.len() {
        let rest = &data[pos..];
        match rest {
            [0xb5, 0x62, _, _, lo, hi, ..] => {
                let end = UBX_HEADER_LEN + usize::from(u16::from_le_bytes([*lo, *hi])) + 2;
                if let Some(Ok(packet)) = rest.get(..end).map(UbxPacket::from_bytes) {
                    count += usize::from(packet.decode(Mode::Get).is_ok());
                }
                pos += end;
            },
            [b'$', ..] => {
                let end = rest
                    .iter()
                    .position(|b| *b == b'\n')
                    .map_or(rest.len(), |n| n + 1);
                let line = std::str::from_utf8(&rest[..end]).unwrap_or_default();
                count += usize::from(Sentence::parse(line).is_ok());
                pos += end;
            },
            [lead, second, third, ..] if rtcm::is_frame_start(*lead, *second) => {
                pos += 3 + rtcm::body_len(*second, *third);
                count += 1;
            },
            _ => pos += 1,
        }
    }
    count
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let data = mixed_stream(200);
    let mut group = c.benchmark_group("framing");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("mixed_stream", |b| {
        b.iter(|| assert_eq!(frame_all(black_box(&data)), 600))
    });
    group.finish();

    let pvt = nav_pvt_frame();
    c.bench_function("nav_pvt_decode", |b| {
        b.iter(|| {
            UbxPacket::from_bytes(black_box(&pvt))
                .and_then(|p| p.decode(Mode::Get))
                .map(|r| r.len())
        })
    });
    c.bench_function("gga_parse", |b| {
        b.iter(|| Sentence::parse(black_box(GGA_LINE)).map(|s| s.fields().len()))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
