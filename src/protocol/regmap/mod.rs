//! Register-map compilation and the read-only holding register store.
//!
//! Rows of `(address, type, value, options)` are normalized and encoded into
//! 16-bit words, assembled into a [`RegisterMap`] by the [`MapCompiler`] and
//! finally wrapped in a [`SparseRegisterStore`] that answers read queries.
pub mod address;
pub mod compiler;
pub mod encoder;
pub mod error;
pub mod reader;
pub mod store;

use serde::{Deserialize, Serialize};
use std::collections::{btree_map, BTreeMap};
use strum::{EnumIter, EnumString};

pub use address::normalize;
pub use compiler::{compile, CompileOptions, CompileResult, ErrorPolicy, MapCompiler};
pub use encoder::{encode, join_u32, split_u32, RowOptions};
pub use error::{AddressError, CompileError, EncodeError, ReadError, RowError, RowErrorKind};
pub use store::{SparseRegisterStore, StoreOptions, WriteAck};

/// Declared type of one map row
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, strum::Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DataType {
    Int16,
    Uint16,
    Int32,
    Uint32,
    Ascii,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    EnumString,
    strum::Display,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    #[default]
    Big,
    Little,
}

/// Four-letter shorthand for a `(byte_order, word_order)` pair.
///
/// The letters name the bytes of a 32-bit value from most (`A`) to least
/// (`D`) significant, in the order they appear on the wire.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    EnumString,
    strum::Display,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderCode {
    Abcd,
    Badc,
    Cdab,
    Dcba,
}

impl OrderCode {
    /// Returns `(byte_order, word_order)`.
    pub const fn endian_pair(self) -> (Endian, Endian) {
        match self {
            OrderCode::Abcd => (Endian::Big, Endian::Big),
            OrderCode::Badc => (Endian::Little, Endian::Big),
            OrderCode::Cdab => (Endian::Big, Endian::Little),
            OrderCode::Dcba => (Endian::Little, Endian::Little),
        }
    }

    pub const fn from_pair(byte_order: Endian, word_order: Endian) -> Self {
        match (byte_order, word_order) {
            (Endian::Big, Endian::Big) => OrderCode::Abcd,
            (Endian::Little, Endian::Big) => OrderCode::Badc,
            (Endian::Big, Endian::Little) => OrderCode::Cdab,
            (Endian::Little, Endian::Little) => OrderCode::Dcba,
        }
    }
}

/// Fill policy for ascii values shorter than their declared length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, strum::Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PadPolicy {
    #[default]
    Space,
    Null,
}

impl PadPolicy {
    pub const fn fill_char(self) -> char {
        match self {
            PadPolicy::Space => ' ',
            PadPolicy::Null => '\0',
        }
    }
}

/// Default byte/word order applied to rows without their own override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EndianConfig {
    pub byte_order: Endian,
    pub word_order: Endian,
}

impl EndianConfig {
    pub const fn new(byte_order: Endian, word_order: Endian) -> Self {
        Self {
            byte_order,
            word_order,
        }
    }

    pub const fn from_order_code(code: OrderCode) -> Self {
        let (byte_order, word_order) = code.endian_pair();
        Self::new(byte_order, word_order)
    }

    pub const fn order_code(self) -> OrderCode {
        OrderCode::from_pair(self.byte_order, self.word_order)
    }
}

/// One logical entry of the register map, exactly as it was written in the
/// source. Nothing here is parsed yet; the compiler does that so failures can
/// be reported against the row's line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapRow {
    /// Line of the source file the row came from (1 is the header).
    pub line: usize,
    pub address: String,
    pub dtype: String,
    pub value: String,
    pub length: Option<String>,
    pub byte_order: Option<String>,
    pub word_order: Option<String>,
    pub order_code: Option<String>,
    pub pad: Option<String>,
    pub comment: Option<String>,
}

impl MapRow {
    pub fn new(address: &str, dtype: &str, value: &str) -> Self {
        Self {
            address: address.to_string(),
            dtype: dtype.to_string(),
            value: value.to_string(),
            ..Default::default()
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    pub fn with_length(mut self, length: &str) -> Self {
        self.length = Some(length.to_string());
        self
    }

    pub fn with_byte_order(mut self, byte_order: &str) -> Self {
        self.byte_order = Some(byte_order.to_string());
        self
    }

    pub fn with_word_order(mut self, word_order: &str) -> Self {
        self.word_order = Some(word_order.to_string());
        self
    }

    pub fn with_order_code(mut self, code: &str) -> Self {
        self.order_code = Some(code.to_string());
        self
    }

    pub fn with_pad(mut self, pad: &str) -> Self {
        self.pad = Some(pad.to_string());
        self
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }
}

/// Zero-based register address to 16-bit word.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterMap {
    words: BTreeMap<u16, u16>,
}

impl RegisterMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: u16) -> Option<u16> {
        self.words.get(&address).copied()
    }

    pub fn contains(&self, address: u16) -> bool {
        self.words.contains_key(&address)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Entries in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.words.iter().map(|(address, value)| (*address, *value))
    }

    pub(crate) fn insert(&mut self, address: u16, value: u16) -> Option<u16> {
        self.words.insert(address, value)
    }
}

impl FromIterator<(u16, u16)> for RegisterMap {
    fn from_iter<T: IntoIterator<Item = (u16, u16)>>(iter: T) -> Self {
        Self {
            words: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for RegisterMap {
    type Item = (u16, u16);
    type IntoIter = btree_map::IntoIter<u16, u16>;

    fn into_iter(self) -> Self::IntoIter {
        self.words.into_iter()
    }
}
