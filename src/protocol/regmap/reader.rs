//! CSV register-map reader.
//!
//! Header names are matched case-insensitively after trimming whitespace and
//! any byte-order mark. `address`, `type` and `value` are required; `len`,
//! `byte_order`, `word_order`, `order_code`, `pad` and `comment` are optional
//! and unknown columns are ignored.
use std::{collections::HashMap, fs, path::Path};

use super::{error::CompileError, MapRow};

pub const REQUIRED_COLUMNS: [&str; 3] = ["address", "type", "value"];

const BOM: char = '\u{feff}';

/// Decode a map file. UTF-8 (with or without BOM) is preferred; anything
/// else is read as Latin-1, which accepts every byte sequence.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.strip_prefix(BOM).unwrap_or(text).to_string(),
        Err(_) => {
            log::debug!("Map file is not valid UTF-8, decoding as Latin-1");
            bytes.iter().map(|&b| char::from(b)).collect()
        }
    }
}

fn normalize_header(name: &str) -> String {
    name.trim().trim_start_matches(BOM).trim().to_lowercase()
}

/// Read map rows from CSV text.
///
/// Missing required columns fail before any row is looked at. Records whose
/// cells are all empty are skipped.
pub fn read_rows(text: &str) -> Result<Vec<MapRow>, CompileError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut columns = HashMap::new();
    for (index, name) in reader
        .headers()
        .map_err(|source| CompileError::Csv { source })?
        .iter()
        .enumerate()
    {
        columns.entry(normalize_header(name)).or_insert(index);
    }

    let missing = REQUIRED_COLUMNS
        .iter()
        .filter(|name| !columns.contains_key(**name))
        .map(|name| name.to_string())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(CompileError::MissingColumn { columns: missing });
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|source| CompileError::Csv { source })?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let cell = |name: &str| {
            columns
                .get(name)
                .and_then(|&i| record.get(i))
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        rows.push(MapRow {
            line: record
                .position()
                .map(|pos| pos.line() as usize)
                .unwrap_or(index + 2),
            address: cell("address").unwrap_or_default(),
            dtype: cell("type").unwrap_or_default(),
            value: cell("value").unwrap_or_default(),
            length: cell("len"),
            byte_order: cell("byte_order"),
            word_order: cell("word_order"),
            order_code: cell("order_code"),
            pad: cell("pad"),
            comment: cell("comment"),
        });
    }

    log::debug!("Read {} map row(s)", rows.len());
    Ok(rows)
}

/// Read map rows from a CSV file on disk.
pub fn read_rows_from_path(path: impl AsRef<Path>) -> Result<Vec<MapRow>, CompileError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| CompileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_rows(&decode_text(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_are_normalized() {
        let text = "\u{feff} Address ,TYPE, Value ,Comment,extra\n40001,uint16,5,pump speed,x\n";
        let rows = read_rows(text).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[0].address, "40001");
        assert_eq!(rows[0].dtype, "uint16");
        assert_eq!(rows[0].value, "5");
        assert_eq!(rows[0].comment.as_deref(), Some("pump speed"));
        assert_eq!(rows[0].length, None);
    }

    #[test]
    fn test_missing_value_column() {
        let err = read_rows("address,type\n1,uint16\n").unwrap_err();
        match err {
            CompileError::MissingColumn { columns } => assert_eq!(columns, vec!["value"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_input_misses_every_column() {
        assert!(matches!(
            read_rows(""),
            Err(CompileError::MissingColumn { columns }) if columns.len() == 3
        ));
    }

    #[test]
    fn test_optional_cells_and_short_records() {
        let text = "address,type,value,len,pad,order_code\n\
                    0,ascii,AB,4,null,\n\
                    ,,,,,\n\
                    2,uint32,7\n";
        let rows = read_rows(text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].length.as_deref(), Some("4"));
        assert_eq!(rows[0].pad.as_deref(), Some("null"));
        assert_eq!(rows[0].order_code, None);
        assert_eq!(rows[1].line, 4);
        assert_eq!(rows[1].value, "7");
        assert_eq!(rows[1].pad, None);
    }

    #[test]
    fn test_quoted_values_keep_commas() {
        let rows = read_rows("address,type,value\n0,ascii,\"A,B\"\n").unwrap();
        assert_eq!(rows[0].value, "A,B");
    }

    #[test]
    fn test_decode_text_fallbacks() {
        assert_eq!(decode_text(b"\xef\xbb\xbfaddress"), "address");
        assert_eq!(decode_text(b"caf\xe9"), "café");
    }
}
