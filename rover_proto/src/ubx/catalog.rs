//! Payload layouts of the UBX messages exchanged with the receiver.
//!
//! Field names follow the u-blox interface description, converted to
//! snake case. Reserved bytes are described with [`pad`] and never show up in
//! decoded records.

use super::schema::{
    bit, bits, group, pad, scalar, scaled, Bit, Count, Field, Scale, Ty, I1, I2, I4, U1, U2, U4,
};
use crate::ParserError;

/// Message classes
pub mod class {
    pub const NAV: u8 = 0x01;
    pub const RXM: u8 = 0x02;
    pub const INF: u8 = 0x04;
    pub const ACK: u8 = 0x05;
    pub const CFG: u8 = 0x06;
    pub const MON: u8 = 0x0a;
    pub const TIM: u8 = 0x0d;
    pub const MGA: u8 = 0x13;
    /// Standard NMEA sentences, only used as CFG-MSG targets
    pub const NMEA: u8 = 0xf0;
}

/// Direction and purpose of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Output from the receiver
    Get,
    /// Command to the receiver
    Set,
    /// Request for a [`Mode::Get`] reply
    Poll,
}

/// Static description of one message
#[derive(Debug, PartialEq)]
pub struct MessageDef {
    pub name: &'static str,
    pub class: u8,
    pub id: u8,
    /// First payload byte, for families where class and id are not unique
    pub subtype: Option<u8>,
    pub get: Option<&'static [Field]>,
    pub set: Option<&'static [Field]>,
    pub poll: Option<&'static [Field]>,
}

impl MessageDef {
    pub fn layout(&self, mode: Mode) -> Result<&'static [Field], ParserError> {
        let layout = match mode {
            Mode::Get => self.get,
            Mode::Set => self.set,
            Mode::Poll => self.poll,
        };
        layout.ok_or(ParserError::InvalidField {
            packet: self.name,
            field: match mode {
                Mode::Get => "<get layout>",
                Mode::Set => "<set layout>",
                Mode::Poll => "<poll layout>",
            },
        })
    }
}

const EMPTY: &[Field] = &[];

// ACK

static ACK_FIELDS: [Field; 2] = [scalar("cls_id", U1), scalar("msg_id", U1)];

pub static ACK_ACK: MessageDef = MessageDef {
    name: "ACK-ACK",
    class: class::ACK,
    id: 0x01,
    subtype: None,
    get: Some(&ACK_FIELDS),
    set: None,
    poll: None,
};

pub static ACK_NAK: MessageDef = MessageDef {
    name: "ACK-NAK",
    class: class::ACK,
    id: 0x00,
    subtype: None,
    get: Some(&ACK_FIELDS),
    set: None,
    poll: None,
};

// CFG

static CFG_MSG_FIELDS: [Field; 8] = [
    scalar("msg_class", U1),
    scalar("msg_id", U1),
    scalar("rate_ddc", U1),
    scalar("rate_uart1", U1),
    scalar("rate_uart2", U1),
    scalar("rate_usb", U1),
    scalar("rate_spi", U1),
    pad(1),
];
static CFG_MSG_POLL: [Field; 2] = [scalar("msg_class", U1), scalar("msg_id", U1)];

pub static CFG_MSG: MessageDef = MessageDef {
    name: "CFG-MSG",
    class: class::CFG,
    id: 0x01,
    subtype: None,
    get: Some(&CFG_MSG_FIELDS),
    set: Some(&CFG_MSG_FIELDS),
    poll: Some(&CFG_MSG_POLL),
};

static CFG_RATE_FIELDS: [Field; 3] = [
    scalar("meas_rate", U2),
    scalar("nav_rate", U2),
    scalar("time_ref", U2),
];

pub static CFG_RATE: MessageDef = MessageDef {
    name: "CFG-RATE",
    class: class::CFG,
    id: 0x08,
    subtype: None,
    get: Some(&CFG_RATE_FIELDS),
    set: Some(&CFG_RATE_FIELDS),
    poll: Some(EMPTY),
};

static CFG_DATA: [Field; 1] = [scalar("cfg_data", U1)];
static CFG_KEYS: [Field; 1] = [scalar("keys", U4)];

static CFG_VALSET_FIELDS: [Field; 5] = [
    scalar("version", U1),
    scalar("layers", U1),
    scalar("transaction", U1),
    pad(1),
    group("group", Count::Remaining, &CFG_DATA),
];

pub static CFG_VALSET: MessageDef = MessageDef {
    name: "CFG-VALSET",
    class: class::CFG,
    id: 0x8a,
    subtype: None,
    get: None,
    set: Some(&CFG_VALSET_FIELDS),
    poll: None,
};

static CFG_VALGET_FIELDS: [Field; 4] = [
    scalar("version", U1),
    scalar("layer", U1),
    scalar("position", U2),
    group("group", Count::Remaining, &CFG_DATA),
];
static CFG_VALGET_POLL: [Field; 4] = [
    scalar("version", U1),
    scalar("layer", U1),
    scalar("position", U2),
    group("group", Count::Remaining, &CFG_KEYS),
];

pub static CFG_VALGET: MessageDef = MessageDef {
    name: "CFG-VALGET",
    class: class::CFG,
    id: 0x8b,
    subtype: None,
    get: Some(&CFG_VALGET_FIELDS),
    set: None,
    poll: Some(&CFG_VALGET_POLL),
};

static CFG_VALDEL_FIELDS: [Field; 5] = [
    scalar("version", U1),
    scalar("layers", U1),
    scalar("transaction", U1),
    pad(1),
    group("group", Count::Remaining, &CFG_KEYS),
];

pub static CFG_VALDEL: MessageDef = MessageDef {
    name: "CFG-VALDEL",
    class: class::CFG,
    id: 0x8c,
    subtype: None,
    get: None,
    set: Some(&CFG_VALDEL_FIELDS),
    poll: None,
};

// NAV

static NAV_POSLLH_FIELDS: [Field; 7] = [
    scalar("itow", U4),
    scaled("lon", I4, Scale::Pow10(7)),
    scaled("lat", I4, Scale::Pow10(7)),
    scalar("height", I4),
    scalar("h_msl", I4),
    scalar("h_acc", U4),
    scalar("v_acc", U4),
];

pub static NAV_POSLLH: MessageDef = MessageDef {
    name: "NAV-POSLLH",
    class: class::NAV,
    id: 0x02,
    subtype: None,
    get: Some(&NAV_POSLLH_FIELDS),
    set: None,
    poll: Some(EMPTY),
};

static NAV_STATUS_FLAGS: [Bit; 4] = [
    bit("gps_fix_ok", 1),
    bit("diff_soln", 1),
    bit("wkn_set", 1),
    bit("tow_set", 1),
];
static NAV_STATUS_FIX_STAT: [Bit; 4] = [
    bit("diff_corr", 1),
    bit("carr_soln_valid", 1),
    bit("reserved0", 4),
    bit("map_matching", 2),
];
static NAV_STATUS_FLAGS2: [Bit; 5] = [
    bit("psm_state", 2),
    bit("reserved1", 1),
    bit("spoof_det_state", 2),
    bit("reserved2", 1),
    bit("carr_soln", 2),
];
static NAV_STATUS_FIELDS: [Field; 7] = [
    scalar("itow", U4),
    scalar("gps_fix", U1),
    bits("flags", 1, &NAV_STATUS_FLAGS),
    bits("fix_stat", 1, &NAV_STATUS_FIX_STAT),
    bits("flags2", 1, &NAV_STATUS_FLAGS2),
    scalar("ttff", U4),
    scalar("msss", U4),
];

pub static NAV_STATUS: MessageDef = MessageDef {
    name: "NAV-STATUS",
    class: class::NAV,
    id: 0x03,
    subtype: None,
    get: Some(&NAV_STATUS_FIELDS),
    set: None,
    poll: Some(EMPTY),
};

static NAV_DOP_FIELDS: [Field; 8] = [
    scalar("itow", U4),
    scaled("g_dop", U2, Scale::Pow10(2)),
    scaled("p_dop", U2, Scale::Pow10(2)),
    scaled("t_dop", U2, Scale::Pow10(2)),
    scaled("v_dop", U2, Scale::Pow10(2)),
    scaled("h_dop", U2, Scale::Pow10(2)),
    scaled("n_dop", U2, Scale::Pow10(2)),
    scaled("e_dop", U2, Scale::Pow10(2)),
];

pub static NAV_DOP: MessageDef = MessageDef {
    name: "NAV-DOP",
    class: class::NAV,
    id: 0x04,
    subtype: None,
    get: Some(&NAV_DOP_FIELDS),
    set: None,
    poll: Some(EMPTY),
};

static NAV_PVT_VALID: [Bit; 4] = [
    bit("valid_date", 1),
    bit("valid_time", 1),
    bit("fully_resolved", 1),
    bit("valid_mag", 1),
];
static NAV_PVT_FLAGS: [Bit; 5] = [
    bit("gnss_fix_ok", 1),
    bit("dif_soln", 1),
    bit("psm_state", 3),
    bit("head_veh_valid", 1),
    bit("carr_soln", 2),
];
static NAV_PVT_FLAGS2: [Bit; 4] = [
    bit("reserved", 5),
    bit("confirmed_avai", 1),
    bit("confirmed_date", 1),
    bit("confirmed_time", 1),
];
static NAV_PVT_FLAGS3: [Bit; 2] = [bit("invalid_llh", 1), bit("last_correction_age", 4)];
static NAV_PVT_FIELDS: [Field; 33] = [
    scalar("itow", U4),
    scalar("year", U2),
    scalar("month", U1),
    scalar("day", U1),
    scalar("hour", U1),
    scalar("min", U1),
    scalar("second", U1),
    bits("valid", 1, &NAV_PVT_VALID),
    scalar("t_acc", U4),
    scalar("nano", I4),
    scalar("fix_type", U1),
    bits("flags", 1, &NAV_PVT_FLAGS),
    bits("flags2", 1, &NAV_PVT_FLAGS2),
    scalar("num_sv", U1),
    scaled("lon", I4, Scale::Pow10(7)),
    scaled("lat", I4, Scale::Pow10(7)),
    scalar("height", I4),
    scalar("h_msl", I4),
    scalar("h_acc", U4),
    scalar("v_acc", U4),
    scalar("vel_n", I4),
    scalar("vel_e", I4),
    scalar("vel_d", I4),
    scalar("g_speed", I4),
    scaled("head_mot", I4, Scale::Pow10(5)),
    scalar("s_acc", U4),
    scaled("head_acc", U4, Scale::Pow10(5)),
    scaled("p_dop", U2, Scale::Pow10(2)),
    bits("flags3", 2, &NAV_PVT_FLAGS3),
    pad(4),
    scaled("head_veh", I4, Scale::Pow10(5)),
    scaled("mag_dec", I2, Scale::Pow10(2)),
    scaled("mag_acc", U2, Scale::Pow10(2)),
];

pub static NAV_PVT: MessageDef = MessageDef {
    name: "NAV-PVT",
    class: class::NAV,
    id: 0x07,
    subtype: None,
    get: Some(&NAV_PVT_FIELDS),
    set: None,
    poll: Some(EMPTY),
};

static NAV_SAT_SV_FLAGS: [Bit; 18] = [
    bit("quality_ind", 3),
    bit("sv_used", 1),
    bit("health", 2),
    bit("diff_corr", 1),
    bit("smoothed", 1),
    bit("orbit_source", 3),
    bit("eph_avail", 1),
    bit("alm_avail", 1),
    bit("ano_avail", 1),
    bit("aop_avail", 1),
    bit("reserved13", 1),
    bit("sbas_corr_used", 1),
    bit("rtcm_corr_used", 1),
    bit("slas_corr_used", 1),
    bit("spartn_corr_used", 1),
    bit("pr_corr_used", 1),
    bit("cr_corr_used", 1),
    bit("do_corr_used", 1),
];
static NAV_SAT_SV: [Field; 7] = [
    scalar("gnss_id", U1),
    scalar("sv_id", U1),
    scalar("cno", U1),
    scalar("elev", I1),
    scalar("azim", I2),
    scaled("pr_res", I2, Scale::Pow10(1)),
    bits("flags", 4, &NAV_SAT_SV_FLAGS),
];
static NAV_SAT_FIELDS: [Field; 5] = [
    scalar("itow", U4),
    scalar("version", U1),
    scalar("num_svs", U1),
    pad(2),
    group("svs", Count::Field("num_svs"), &NAV_SAT_SV),
];

pub static NAV_SAT: MessageDef = MessageDef {
    name: "NAV-SAT",
    class: class::NAV,
    id: 0x35,
    subtype: None,
    get: Some(&NAV_SAT_FIELDS),
    set: None,
    poll: Some(EMPTY),
};

// MON

static MON_VER_EXTENSION: [Field; 1] = [scalar("extension", Ty::Char(30))];
static MON_VER_FIELDS: [Field; 3] = [
    scalar("sw_version", Ty::Char(30)),
    scalar("hw_version", Ty::Char(10)),
    group("extensions", Count::Remaining, &MON_VER_EXTENSION),
];

pub static MON_VER: MessageDef = MessageDef {
    name: "MON-VER",
    class: class::MON,
    id: 0x04,
    subtype: None,
    get: Some(&MON_VER_FIELDS),
    set: None,
    poll: Some(EMPTY),
};

// INF

static INF_FIELDS: [Field; 1] = [scalar("message", Ty::Text)];

macro_rules! inf_message {
    ($ident:ident, $name:literal, $id:literal) => {
        pub static $ident: MessageDef = MessageDef {
            name: $name,
            class: class::INF,
            id: $id,
            subtype: None,
            get: Some(&INF_FIELDS),
            set: None,
            poll: None,
        };
    };
}

inf_message!(INF_ERROR, "INF-ERROR", 0x00);
inf_message!(INF_WARNING, "INF-WARNING", 0x01);
inf_message!(INF_NOTICE, "INF-NOTICE", 0x02);
inf_message!(INF_TEST, "INF-TEST", 0x03);
inf_message!(INF_DEBUG, "INF-DEBUG", 0x04);

// MGA

static MGA_ACK_FIELDS: [Field; 5] = [
    scalar("type", U1),
    scalar("version", U1),
    scalar("info_code", U1),
    scalar("msg_id", U1),
    scalar("msg_payload_start", U4),
];

pub static MGA_ACK_DATA0: MessageDef = MessageDef {
    name: "MGA-ACK-DATA0",
    class: class::MGA,
    id: 0x60,
    subtype: Some(0x01),
    get: Some(&MGA_ACK_FIELDS),
    set: None,
    poll: None,
};

pub static MGA_NAK_DATA0: MessageDef = MessageDef {
    name: "MGA-NAK-DATA0",
    class: class::MGA,
    id: 0x60,
    subtype: Some(0x00),
    get: Some(&MGA_ACK_FIELDS),
    set: None,
    poll: None,
};

static MGA_DBD_DATA: [Field; 1] = [scalar("data", U1)];
static MGA_DBD_FIELDS: [Field; 2] = [pad(12), group("group", Count::Remaining, &MGA_DBD_DATA)];

pub static MGA_DBD: MessageDef = MessageDef {
    name: "MGA-DBD",
    class: class::MGA,
    id: 0x80,
    subtype: None,
    get: Some(&MGA_DBD_FIELDS),
    set: Some(&MGA_DBD_FIELDS),
    poll: Some(EMPTY),
};

/// Every message this crate can decode or build
pub static CATALOG: [&MessageDef; 21] = [
    &ACK_ACK,
    &ACK_NAK,
    &CFG_MSG,
    &CFG_RATE,
    &CFG_VALSET,
    &CFG_VALGET,
    &CFG_VALDEL,
    &NAV_POSLLH,
    &NAV_STATUS,
    &NAV_DOP,
    &NAV_PVT,
    &NAV_SAT,
    &MON_VER,
    &INF_ERROR,
    &INF_WARNING,
    &INF_NOTICE,
    &INF_TEST,
    &INF_DEBUG,
    &MGA_ACK_DATA0,
    &MGA_NAK_DATA0,
    &MGA_DBD,
];

/// Resolve the definition of a received message.
///
/// For the MGA family the class and id pair is shared by several layouts, so
/// the first payload byte is consulted as well.
pub fn lookup(class: u8, id: u8, payload: &[u8]) -> Result<&'static MessageDef, ParserError> {
    let mut candidates = CATALOG
        .iter()
        .copied()
        .filter(|def| def.class == class && def.id == id)
        .peekable();
    let first = candidates.peek().copied();
    let unknown = |subtype| ParserError::UnknownPacket {
        class,
        msg_id: id,
        subtype,
    };
    match first {
        None => Err(unknown(None)),
        Some(def) if def.subtype.is_none() => Ok(def),
        Some(_) => {
            let subtype = payload.first().copied();
            candidates
                .find(|def| def.subtype.is_some() && def.subtype == subtype)
                .ok_or(unknown(subtype))
        },
    }
}

/// Find a definition by its u-blox name, e.g. `"NAV-PVT"`
pub fn by_name(name: &str) -> Option<&'static MessageDef> {
    CATALOG.iter().copied().find(|def| def.name == name)
}
