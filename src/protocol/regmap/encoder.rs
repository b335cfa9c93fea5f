//! Value encoding: one logical value to an ordered run of 16-bit words.
use std::{num::IntErrorKind, str::FromStr};

use super::{error::EncodeError, DataType, Endian, EndianConfig, MapRow, OrderCode, PadPolicy};

/// Longest ascii value that fits the register space: two bytes per register.
pub const MAX_ASCII_LENGTH: usize = 2 * (u16::MAX as usize + 1);

/// Parsed per-row formatting options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowOptions {
    /// Target character count for ascii values
    pub length: Option<usize>,
    pub byte_order: Option<Endian>,
    pub word_order: Option<Endian>,
    /// Wins over `byte_order` / `word_order` when present
    pub order_code: Option<OrderCode>,
    pub pad: PadPolicy,
}

impl RowOptions {
    /// Parse the optional cells of a row. Empty cells count as absent.
    pub fn from_row(row: &MapRow) -> Result<Self, EncodeError> {
        let length = match present(&row.length) {
            Some(text) => Some(
                text.parse::<usize>()
                    .ok()
                    .filter(|length| *length <= MAX_ASCII_LENGTH)
                    .ok_or_else(|| EncodeError::MalformedLength {
                        length: text.to_string(),
                    })?,
            ),
            None => None,
        };

        let byte_order = present(&row.byte_order)
            .map(|text| parse_endian("byte_order", text))
            .transpose()?;
        let word_order = present(&row.word_order)
            .map(|text| parse_endian("word_order", text))
            .transpose()?;
        let order_code = present(&row.order_code)
            .map(|text| {
                OrderCode::from_str(text).map_err(|_| EncodeError::UnknownOrderCode {
                    code: text.to_string(),
                })
            })
            .transpose()?;
        let pad = present(&row.pad)
            .map(|text| {
                PadPolicy::from_str(text).map_err(|_| EncodeError::UnknownPad {
                    pad: text.to_string(),
                })
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            length,
            byte_order,
            word_order,
            order_code,
            pad,
        })
    }

    /// Effective byte/word order: defaults, then explicit fields, then the
    /// order code.
    pub fn resolve_endian(&self, defaults: EndianConfig) -> EndianConfig {
        if let Some(code) = self.order_code {
            return EndianConfig::from_order_code(code);
        }
        EndianConfig {
            byte_order: self.byte_order.unwrap_or(defaults.byte_order),
            word_order: self.word_order.unwrap_or(defaults.word_order),
        }
    }
}

fn present(cell: &Option<String>) -> Option<&str> {
    cell.as_deref().map(str::trim).filter(|text| !text.is_empty())
}

fn parse_endian(field: &'static str, text: &str) -> Result<Endian, EncodeError> {
    Endian::from_str(text).map_err(|_| EncodeError::UnknownEndian {
        field,
        value: text.to_string(),
    })
}

/// Encode `value` as `dtype` into registers.
pub fn encode(
    dtype: &str,
    value: &str,
    options: &RowOptions,
    defaults: EndianConfig,
) -> Result<Vec<u16>, EncodeError> {
    let dtype = DataType::from_str(dtype.trim()).map_err(|_| EncodeError::UnsupportedType {
        dtype: dtype.to_string(),
    })?;

    match dtype {
        DataType::Uint16 => {
            let v = parse_integer(dtype, value, 0, i64::from(u16::MAX))?;
            Ok(vec![v as u16])
        }
        DataType::Int16 => {
            let v = parse_integer(dtype, value, i64::from(i16::MIN), i64::from(i16::MAX))?;
            Ok(vec![v as i16 as u16])
        }
        DataType::Uint32 => {
            let v = parse_integer(dtype, value, 0, i64::from(u32::MAX))?;
            let order = options.resolve_endian(defaults).order_code();
            Ok(split_u32(v as u32, order).to_vec())
        }
        DataType::Int32 => {
            let v = parse_integer(dtype, value, i64::from(i32::MIN), i64::from(i32::MAX))?;
            let order = options.resolve_endian(defaults).order_code();
            Ok(split_u32(v as i32 as u32, order).to_vec())
        }
        DataType::Ascii => Ok(encode_ascii(value, options.length, options.pad)),
    }
}

/// Decimal (optionally signed) or `0x` hexadecimal integer within `min..=max`.
fn parse_integer(dtype: DataType, text: &str, min: i64, max: i64) -> Result<i64, EncodeError> {
    let trimmed = text.trim();
    let out_of_range = || EncodeError::OutOfRange {
        dtype,
        value: trimmed.to_string(),
    };
    let malformed = || EncodeError::MalformedValue {
        value: text.to_string(),
    };

    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) if !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()) => {
            i64::from_str_radix(hex, 16)
        }
        Some(_) => return Err(malformed()),
        None => trimmed.parse::<i64>(),
    };

    let value = parsed.map_err(|err| match err.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => out_of_range(),
        _ => malformed(),
    })?;

    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(out_of_range())
    }
}

/// Split a 32-bit value into two registers laid out as `order`.
pub fn split_u32(value: u32, order: OrderCode) -> [u16; 2] {
    let high = (value >> 16) as u16;
    let low = value as u16;
    match order {
        OrderCode::Abcd => [high, low],
        OrderCode::Badc => [high.swap_bytes(), low.swap_bytes()],
        OrderCode::Cdab => [low, high],
        OrderCode::Dcba => [low.swap_bytes(), high.swap_bytes()],
    }
}

/// Inverse of [`split_u32`].
pub fn join_u32(words: [u16; 2], order: OrderCode) -> u32 {
    let (high, low) = match order {
        OrderCode::Abcd => (words[0], words[1]),
        OrderCode::Badc => (words[0].swap_bytes(), words[1].swap_bytes()),
        OrderCode::Cdab => (words[1], words[0]),
        OrderCode::Dcba => (words[1].swap_bytes(), words[0].swap_bytes()),
    };
    (u32::from(high) << 16) | u32::from(low)
}

/// Fit `text` to `length` characters (truncate, or fill with the pad
/// character), drop non-ASCII characters and pack two bytes per register,
/// first byte high. An odd trailing byte gets a zero low byte.
fn encode_ascii(text: &str, length: Option<usize>, pad: PadPolicy) -> Vec<u16> {
    let target = length.unwrap_or_else(|| text.chars().count());
    let mut chars = text.chars().take(target).collect::<Vec<_>>();
    chars.resize(target, pad.fill_char());

    let bytes = chars
        .into_iter()
        .filter(char::is_ascii)
        .map(|c| c as u8)
        .collect::<Vec<_>>();

    bytes
        .chunks(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair.get(1).copied().unwrap_or(0)]))
        .collect()
}
