//! Configuration items for CFG-VALSET / CFG-VALGET / CFG-VALDEL.

use bitflags::bitflags;

use crate::ParserError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageSize {
    OneBit,
    OneByte,
    TwoBytes,
    FourBytes,
    EightBytes,
}

impl StorageSize {
    pub const fn to_usize(self) -> usize {
        match self {
            Self::OneBit | Self::OneByte => 1,
            Self::TwoBytes => 2,
            Self::FourBytes => 4,
            Self::EightBytes => 8,
        }
    }
}

impl KeyId {
    pub(crate) const SIZE: usize = 4;

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Size of the value, `None` for a key with an undefined size code
    pub const fn value_size(self) -> Option<StorageSize> {
        match (self.0 >> 28) & 0b111 {
            1 => Some(StorageSize::OneBit),
            2 => Some(StorageSize::OneByte),
            3 => Some(StorageSize::TwoBytes),
            4 => Some(StorageSize::FourBytes),
            5 => Some(StorageSize::EightBytes),
            _ => None,
        }
    }

    pub const fn group_id(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn item_id(self) -> u8 {
        self.0 as u8
    }
}

pub const CFG_SIGNAL_GPS_ENA: KeyId = KeyId(0x1031001f);
pub const CFG_SIGNAL_GAL_ENA: KeyId = KeyId(0x10310021);
pub const CFG_SIGNAL_BDS_ENA: KeyId = KeyId(0x10310022);
pub const CFG_SIGNAL_GLO_ENA: KeyId = KeyId(0x10310025);
pub const CFG_RATE_MEAS: KeyId = KeyId(0x30210001);
pub const CFG_UART2_BAUDRATE: KeyId = KeyId(0x40530001);

bitflags! {
    /// Target layers of CFG-VALSET and CFG-VALDEL
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CfgLayerSet: u8 {
        const RAM = 0b001;
        const BBR = 0b010;
        const FLASH = 0b100;
    }
}

/// Source layer of CFG-VALGET, a single value unlike [`CfgLayerSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CfgLayerGet {
    Ram = 0,
    Bbr = 1,
    Flash = 2,
    Default = 7,
}

/// A configuration value, sized by its key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfgValue {
    Bool(bool),
    U1(u8),
    U2(u16),
    U4(u32),
    U8(u64),
}

impl CfgValue {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            CfgValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_u64(self) -> u64 {
        match self {
            CfgValue::Bool(b) => u64::from(b),
            CfgValue::U1(v) => u64::from(v),
            CfgValue::U2(v) => u64::from(v),
            CfgValue::U4(v) => u64::from(v),
            CfgValue::U8(v) => v,
        }
    }
}

/// Key and value bytes as they appear in a CFG-VALSET payload
pub fn encode_key_value(key: KeyId, value: CfgValue, out: &mut Vec<u8>) -> Result<(), ParserError> {
    let invalid = ParserError::InvalidField {
        packet: "CFG-VALSET",
        field: "cfg_data",
    };
    let raw = value.as_u64();
    let size = key.value_size().ok_or(invalid.clone())?;
    let fits = match size {
        StorageSize::OneBit => raw <= 1,
        StorageSize::EightBytes => true,
        other => raw < 1u64 << (8 * other.to_usize()),
    };
    if !fits {
        return Err(invalid);
    }
    out.extend_from_slice(&key.raw().to_le_bytes());
    out.extend_from_slice(&raw.to_le_bytes()[..size.to_usize()]);
    Ok(())
}

/// Split the `cfg_data` bytes of a CFG-VALGET response into key/value pairs
pub fn parse_cfg_data(mut data: &[u8]) -> Result<Vec<(KeyId, CfgValue)>, ParserError> {
    let truncated = ParserError::InvalidField {
        packet: "CFG-VALGET",
        field: "cfg_data",
    };
    let mut items = Vec::new();
    while !data.is_empty() {
        let key_bytes = data.get(..KeyId::SIZE).ok_or(truncated.clone())?;
        let key = KeyId(u32::from_le_bytes([
            key_bytes[0],
            key_bytes[1],
            key_bytes[2],
            key_bytes[3],
        ]));
        let size = key.value_size().ok_or(truncated.clone())?;
        let end = KeyId::SIZE + size.to_usize();
        let v = data.get(KeyId::SIZE..end).ok_or(truncated.clone())?;
        let value = match size {
            StorageSize::OneBit => CfgValue::Bool(v[0] != 0),
            StorageSize::OneByte => CfgValue::U1(v[0]),
            StorageSize::TwoBytes => CfgValue::U2(u16::from_le_bytes([v[0], v[1]])),
            StorageSize::FourBytes => CfgValue::U4(u32::from_le_bytes([v[0], v[1], v[2], v[3]])),
            StorageSize::EightBytes => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(v);
                CfgValue::U8(u64::from_le_bytes(raw))
            },
        };
        items.push((key, value));
        data = &data[end..];
    }
    Ok(items)
}
