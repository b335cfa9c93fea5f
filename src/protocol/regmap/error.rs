use derive_more::{Display, Error};
use std::path::PathBuf;

use super::DataType;

/// Failure to turn an address token into a zero-based register index
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum AddressError {
    #[display("malformed address '{token}'")]
    Malformed { token: String },
    #[display("4xxxx address {value} is below the configured base {four_base}")]
    BelowBase { value: u64, four_base: u32 },
    #[display("address {value} is outside the 16-bit register space")]
    OutOfRange { value: u64 },
}

/// Failure to encode a single value into registers
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum EncodeError {
    #[display("unsupported type '{dtype}'")]
    UnsupportedType { dtype: String },
    #[display("{dtype} out of range: {value}")]
    OutOfRange { dtype: DataType, value: String },
    #[display("malformed integer value '{value}'")]
    MalformedValue { value: String },
    #[display("malformed ascii length '{length}'")]
    MalformedLength { length: String },
    #[display("unknown order_code '{code}'")]
    UnknownOrderCode { code: String },
    #[display("unknown {field} '{value}' (expected big or little)")]
    UnknownEndian { field: &'static str, value: String },
    #[display("unknown pad '{pad}' (expected space or null)")]
    UnknownPad { pad: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum RowErrorKind {
    #[display("{_0}")]
    Address(AddressError),
    #[display("{_0}")]
    Encode(EncodeError),
    #[display("overlap at address {address} (already claimed by line {claimed_by})")]
    Overlap { address: u16, claimed_by: usize },
    #[display("{words} register(s) starting at {address} run past address 65535")]
    SpanOverflow { address: u16, words: usize },
}

impl From<AddressError> for RowErrorKind {
    fn from(err: AddressError) -> Self {
        RowErrorKind::Address(err)
    }
}

impl From<EncodeError> for RowErrorKind {
    fn from(err: EncodeError) -> Self {
        RowErrorKind::Encode(err)
    }
}

/// A row-level failure, positioned by source line
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("line {line}: {kind}")]
pub struct RowError {
    pub line: usize,
    pub kind: RowErrorKind,
}

impl RowError {
    pub fn new(line: usize, kind: impl Into<RowErrorKind>) -> Self {
        Self {
            line,
            kind: kind.into(),
        }
    }
}

/// Failure of a whole compilation
#[derive(Debug, Display, Error)]
pub enum CompileError {
    #[display("CSV missing required column(s): {}", columns.join(", "))]
    MissingColumn { columns: Vec<String> },
    #[display("failed to read {}: {}", path.display(), source)]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[display("malformed CSV: {}", source)]
    Csv { source: csv::Error },
    #[display(
        "register map has {} row error(s){}",
        errors.len(),
        errors.first().map(|first| format!(", first {first}")).unwrap_or_default()
    )]
    RowErrors { errors: Vec<RowError> },
}

/// Failure of a single read call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum ReadError {
    #[display("illegal address {address}")]
    IllegalAddress { address: u32 },
}
