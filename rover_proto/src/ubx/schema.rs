//! Runtime field descriptors for UBX payloads.
//!
//! A message layout is a static slice of [`Field`]s walked in order by
//! [`decode_fields`] and [`encode_fields`]. New messages only need a new
//! table in [`super::catalog`].

use num_traits::ToPrimitive;

use super::record::{Record, Value};
use crate::{constants::SCALE_ROUNDING, ParserError};

/// Wire type of a scalar attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ty {
    /// Unsigned little-endian integer, 1 to 8 bytes
    U(usize),
    /// Two's complement little-endian integer, 1 to 8 bytes
    I(usize),
    R4,
    R8,
    /// Fixed length ASCII, NUL padded
    Char(usize),
    /// ASCII text filling the rest of the payload
    Text,
    /// Reserved bytes, skipped on decode and zero filled on encode
    Pad(usize),
}

pub const U1: Ty = Ty::U(1);
pub const U2: Ty = Ty::U(2);
pub const U4: Ty = Ty::U(4);
pub const I1: Ty = Ty::I(1);
pub const I2: Ty = Ty::I(2);
pub const I4: Ty = Ty::I(4);

impl Ty {
    /// Size on the wire, `None` for [`Ty::Text`]
    pub const fn size(self) -> Option<usize> {
        match self {
            Ty::U(n) | Ty::I(n) | Ty::Char(n) | Ty::Pad(n) => Some(n),
            Ty::R4 => Some(4),
            Ty::R8 => Some(8),
            Ty::Text => None,
        }
    }
}

/// Scale factor applied to a raw integer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    /// `10^-n`
    Pow10(i32),
    /// `2^-n`
    Pow2(i32),
}

impl Scale {
    pub fn factor(self) -> f64 {
        match self {
            Scale::Pow10(n) => 10f64.powi(-n),
            Scale::Pow2(n) => 2f64.powi(-n),
        }
    }

    pub(crate) fn apply(self, raw: f64) -> f64 {
        let rounding = 10f64.powi(SCALE_ROUNDING);
        (raw * self.factor() * rounding).round() / rounding
    }
}

/// Named sub-range of a bitfield, allocated from the least significant bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bit {
    pub name: &'static str,
    pub width: u32,
}

/// Repeat count of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    Fixed(usize),
    /// Value of a sibling decoded earlier in the same record
    Field(&'static str),
    /// As many repetitions as the remaining payload holds
    Remaining,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field {
    Scalar {
        name: &'static str,
        ty: Ty,
        scale: Option<Scale>,
    },
    Bits {
        name: &'static str,
        size: usize,
        parts: &'static [Bit],
    },
    Group {
        name: &'static str,
        count: Count,
        fields: &'static [Field],
    },
}

pub const fn scalar(name: &'static str, ty: Ty) -> Field {
    Field::Scalar {
        name,
        ty,
        scale: None,
    }
}

pub const fn scaled(name: &'static str, ty: Ty, scale: Scale) -> Field {
    Field::Scalar {
        name,
        ty,
        scale: Some(scale),
    }
}

pub const fn pad(len: usize) -> Field {
    Field::Scalar {
        name: "reserved",
        ty: Ty::Pad(len),
        scale: None,
    }
}

pub const fn bits(name: &'static str, size: usize, parts: &'static [Bit]) -> Field {
    Field::Bits { name, size, parts }
}

pub const fn bit(name: &'static str, width: u32) -> Bit {
    Bit { name, width }
}

pub const fn group(name: &'static str, count: Count, fields: &'static [Field]) -> Field {
    Field::Group {
        name,
        count,
        fields,
    }
}

/// Byte size of one repetition, `None` if it contains free text
pub fn layout_size(fields: &[Field]) -> Option<usize> {
    fields.iter().try_fold(0usize, |acc, field| {
        let size = match field {
            Field::Scalar { ty, .. } => ty.size()?,
            Field::Bits { size, .. } => *size,
            Field::Group {
                count: Count::Fixed(n),
                fields,
                ..
            } => n * layout_size(fields)?,
            Field::Group { .. } => return None,
        };
        Some(acc + size)
    })
}

fn take<'a>(
    packet: &'static str,
    buf: &'a [u8],
    pos: &mut usize,
    len: usize,
) -> Result<&'a [u8], ParserError> {
    let end = *pos + len;
    let bytes = buf.get(*pos..end).ok_or(ParserError::InvalidPacketLen {
        packet,
        expect: end,
        got: buf.len(),
    })?;
    *pos = end;
    Ok(bytes)
}

fn read_unsigned(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .rev()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
}

fn read_signed(bytes: &[u8]) -> i64 {
    let raw = read_unsigned(bytes);
    let shift = 64 - 8 * bytes.len() as u32;
    ((raw << shift) as i64) >> shift
}

fn read_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Decode `fields` starting at `pos`, appending to `record`.
pub(crate) fn decode_fields(
    packet: &'static str,
    fields: &'static [Field],
    buf: &[u8],
    pos: &mut usize,
    record: &mut Record,
) -> Result<(), ParserError> {
    for field in fields {
        match *field {
            Field::Scalar { name, ty, scale } => {
                let value = match ty {
                    Ty::Pad(n) => {
                        take(packet, buf, pos, n)?;
                        continue;
                    },
                    Ty::Text => {
                        let rest = take(packet, buf, pos, buf.len() - *pos)?;
                        Value::Str(read_text(rest))
                    },
                    Ty::Char(n) => Value::Str(read_text(take(packet, buf, pos, n)?)),
                    Ty::R4 => {
                        let b = take(packet, buf, pos, 4)?;
                        Value::Float(f64::from(f32::from_le_bytes([b[0], b[1], b[2], b[3]])))
                    },
                    Ty::R8 => {
                        let b = take(packet, buf, pos, 8)?;
                        let mut raw = [0u8; 8];
                        raw.copy_from_slice(b);
                        Value::Float(f64::from_le_bytes(raw))
                    },
                    Ty::U(n) => {
                        let raw = read_unsigned(take(packet, buf, pos, n)?);
                        match scale {
                            Some(scale) => Value::Float(scale.apply(raw as f64)),
                            None => Value::Unsigned(raw),
                        }
                    },
                    Ty::I(n) => {
                        let raw = read_signed(take(packet, buf, pos, n)?);
                        match scale {
                            Some(scale) => Value::Float(scale.apply(raw as f64)),
                            None => Value::Signed(raw),
                        }
                    },
                };
                record.set(name, value);
            },
            Field::Bits { name, size, parts } => {
                let mut raw = read_unsigned(take(packet, buf, pos, size)?);
                let mut flags = Record::new();
                for part in parts {
                    let mask = (1u64 << part.width) - 1;
                    flags.set(part.name, Value::Unsigned(raw & mask));
                    raw >>= part.width;
                }
                record.set(name, Value::Bits(flags));
            },
            Field::Group {
                name,
                count,
                fields,
            } => {
                let repeats = match count {
                    Count::Fixed(n) => n,
                    Count::Field(sibling) => record
                        .get_u64(sibling)
                        .and_then(|n| n.to_usize())
                        .ok_or(ParserError::InvalidField {
                            packet,
                            field: sibling,
                        })?,
                    Count::Remaining => {
                        let remaining = buf.len() - *pos;
                        match layout_size(fields) {
                            Some(0) => 0,
                            Some(size) if remaining % size == 0 => remaining / size,
                            Some(size) => {
                                return Err(ParserError::InvalidPacketLen {
                                    packet,
                                    expect: *pos + remaining.div_ceil(size) * size,
                                    got: buf.len(),
                                })
                            },
                            None => usize::from(remaining > 0),
                        }
                    },
                };
                let mut items = Vec::with_capacity(repeats);
                for _ in 0..repeats {
                    let mut item = Record::new();
                    decode_fields(packet, fields, buf, pos, &mut item)?;
                    items.push(item);
                }
                record.set(name, Value::Group(items));
            },
        }
    }
    Ok(())
}

fn write_int(
    packet: &'static str,
    name: &'static str,
    ty: Ty,
    value: i128,
    out: &mut Vec<u8>,
) -> Result<(), ParserError> {
    let (size, min, max) = match ty {
        Ty::U(n) if n >= 8 => (n, 0, i128::from(u64::MAX)),
        Ty::U(n) => (n, 0, (1i128 << (8 * n)) - 1),
        Ty::I(n) => (n, -(1i128 << (8 * n - 1)), (1i128 << (8 * n - 1)) - 1),
        _ => return Err(ParserError::InvalidField { packet, field: name }),
    };
    if value < min || value > max {
        return Err(ParserError::InvalidField { packet, field: name });
    }
    out.extend_from_slice(&value.to_le_bytes()[..size]);
    Ok(())
}

/// Value of a count field that the caller left out, taken from the group it
/// counts.
fn implied_count(name: &str, fields: &[Field], record: &Record) -> Option<usize> {
    fields.iter().find_map(|field| match field {
        Field::Group {
            name: group,
            count: Count::Field(counter),
            ..
        } if *counter == name => Some(record.group(group).map_or(0, <[Record]>::len)),
        _ => None,
    })
}

/// Encode `record` according to `fields`. Missing scalars are written as zero.
pub(crate) fn encode_fields(
    packet: &'static str,
    fields: &'static [Field],
    record: &Record,
    out: &mut Vec<u8>,
) -> Result<(), ParserError> {
    for field in fields {
        match *field {
            Field::Scalar { name, ty, scale } => {
                let value = record.get(name);
                match ty {
                    Ty::Pad(n) => out.resize(out.len() + n, 0),
                    Ty::Char(n) => {
                        let text = value.and_then(Value::as_str).unwrap_or_default();
                        if text.len() > n {
                            return Err(ParserError::InvalidField { packet, field: name });
                        }
                        out.extend_from_slice(text.as_bytes());
                        out.resize(out.len() + n - text.len(), 0);
                    },
                    Ty::Text => {
                        let text = value.and_then(Value::as_str).unwrap_or_default();
                        out.extend_from_slice(text.as_bytes());
                    },
                    Ty::R4 => {
                        let v = value.and_then(Value::as_f64).unwrap_or_default();
                        out.extend_from_slice(&(v as f32).to_le_bytes());
                    },
                    Ty::R8 => {
                        let v = value.and_then(Value::as_f64).unwrap_or_default();
                        out.extend_from_slice(&v.to_le_bytes());
                    },
                    Ty::U(_) | Ty::I(_) => {
                        let raw = match (value, scale) {
                            (None, _) => implied_count(name, fields, record)
                                .and_then(|n| n.to_i128())
                                .unwrap_or_default(),
                            (Some(v), Some(scale)) => v
                                .as_f64()
                                .and_then(|v| (v / scale.factor()).round().to_i128())
                                .ok_or(ParserError::InvalidField { packet, field: name })?,
                            (Some(v), None) => v
                                .as_i128()
                                .ok_or(ParserError::InvalidField { packet, field: name })?,
                        };
                        write_int(packet, name, ty, raw, out)?;
                    },
                }
            },
            Field::Bits { name, size, parts } => {
                let raw = match record.get(name) {
                    None => 0,
                    Some(Value::Bits(flags)) => {
                        let mut raw = 0u64;
                        let mut shift = 0;
                        for part in parts {
                            let mask = (1u64 << part.width) - 1;
                            let v = flags.get_u64(part.name).unwrap_or_default();
                            if v > mask {
                                return Err(ParserError::InvalidField {
                                    packet,
                                    field: part.name,
                                });
                            }
                            raw |= v << shift;
                            shift += part.width;
                        }
                        raw
                    },
                    Some(v) => v
                        .as_u64()
                        .ok_or(ParserError::InvalidField { packet, field: name })?,
                };
                write_int(packet, name, Ty::U(size), i128::from(raw), out)?;
            },
            Field::Group {
                name,
                count,
                fields: inner,
            } => {
                let items = record.group(name).unwrap_or_default();
                match count {
                    Count::Fixed(n) if items.len() > n => {
                        return Err(ParserError::InvalidField { packet, field: name });
                    },
                    Count::Field(counter) => {
                        let declared = record.get_u64(counter).and_then(|n| n.to_usize());
                        if declared.is_some_and(|n| n != items.len()) {
                            return Err(ParserError::InvalidField {
                                packet,
                                field: counter,
                            });
                        }
                    },
                    _ => {},
                }
                for item in items {
                    encode_fields(packet, inner, item, out)?;
                }
                if let Count::Fixed(n) = count {
                    let empty = Record::new();
                    for _ in items.len()..n {
                        encode_fields(packet, inner, &empty, out)?;
                    }
                }
            },
        }
    }
    Ok(())
}
