//! Properties shared by every frame the codecs accept.

use proptest::prelude::*;
use rover_proto::{
    catalog::CFG_RATE, constants::UBX_HEADER_LEN, nmea, ErrorKind, Mode, Record, Sentence,
    UbxPacket,
};

fn ubx_packet_strategy() -> impl Strategy<Value = UbxPacket> {
    (any::<u8>(), any::<u8>(), prop::collection::vec(any::<u8>(), 0..300))
        .prop_map(|(class, id, payload)| UbxPacket::new(class, id, payload).unwrap())
}

fn reference_xor(content: &str) -> u8 {
    content.bytes().fold(0, |acc, b| acc ^ b)
}

proptest! {
    #[test]
    fn ubx_round_trip(packet in ubx_packet_strategy()) {
        let bytes = packet.to_bytes();
        prop_assert_eq!(bytes.len(), UBX_HEADER_LEN + packet.payload().len() + 2);
        prop_assert_eq!(UbxPacket::from_bytes(&bytes).unwrap(), packet);
    }

    #[test]
    fn ubx_single_bit_corruption(
        packet in ubx_packet_strategy(),
        pick in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut bytes = packet.to_bytes();
        // payload and checksum bytes, header untouched
        let idx = UBX_HEADER_LEN + pick.index(bytes.len() - UBX_HEADER_LEN);
        bytes[idx] ^= 1 << bit;
        let err = UbxPacket::from_bytes(&bytes).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::Checksum);
    }

    #[test]
    fn cfg_rate_record_round_trip(meas in any::<u16>(), nav in any::<u16>(), time_ref in 0u16..6) {
        let record = Record::new()
            .with("meas_rate", meas)
            .with("nav_rate", nav)
            .with("time_ref", time_ref);
        let packet = UbxPacket::build(&CFG_RATE, Mode::Set, &record).unwrap();
        let parsed = UbxPacket::from_bytes(&packet.to_bytes()).unwrap();
        let decoded = parsed.decode(Mode::Get).unwrap();
        prop_assert_eq!(decoded.get_u64("meas_rate"), Some(u64::from(meas)));
        prop_assert_eq!(decoded.get_u64("nav_rate"), Some(u64::from(nav)));
        prop_assert_eq!(decoded.get_u64("time_ref"), Some(u64::from(time_ref)));
    }

    #[test]
    fn nmea_checksum_agrees_with_xor(
        fields in prop::collection::vec("[0-9A-Z.]{0,10}", 14),
        claimed in any::<u8>(),
    ) {
        let content = format!("GPGGA,{}", fields.join(","));
        let line = format!("${}*{:02X}\r\n", content, claimed);
        prop_assert_eq!(nmea::checksum(&content), reference_xor(&content));
        prop_assert_eq!(nmea::is_valid(&line), claimed == reference_xor(&content));
    }

    #[test]
    fn nmea_built_sentences_parse(fields in prop::collection::vec("[0-9A-Z.]{0,10}", 0..20)) {
        let sentence = Sentence::new("GN", "GGA", fields);
        let parsed = Sentence::parse(&sentence.to_line()).unwrap();
        prop_assert_eq!(parsed, sentence);
    }
}

#[test]
fn nmea_reference_sentence() {
    let line = "$GPGGA,092725.00,4717.11399,N,00833.91590,E,1,08,1.01,499.6,M,48.0,M,,*5B";
    assert!(nmea::is_valid(line));
    let sentence = Sentence::parse(line).unwrap();
    assert_eq!(sentence.checksum_hex(), "5B");
    assert_eq!(sentence.field("num_sv"), Some("08"));
    assert_eq!(sentence.field("diff_age"), None);
}
