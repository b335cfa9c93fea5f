use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path, sync::Arc};

use super::{
    address::normalize,
    encoder::{encode, RowOptions},
    error::{CompileError, RowError, RowErrorKind},
    reader::{read_rows, read_rows_from_path},
    EndianConfig, MapRow, RegisterMap,
};
use crate::{
    api::traits::{DiagnosticSink, NoOpSink},
    core::logs::{DiagnosticEvent, EventKind, EventLevel},
};

/// What the compiler does after a row fails.
///
/// Either way a compile with any row error is unusable; the policy only
/// decides how many problems get reported in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Keep scanning and report every failing row
    #[default]
    CollectAll,
    /// Stop at the first failing row
    StopAtFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Register number that maps to index 0 in 4xxxx references
    pub four_base: u32,
    pub defaults: EndianConfig,
    pub error_policy: ErrorPolicy,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            four_base: 40001,
            defaults: EndianConfig::default(),
            error_policy: ErrorPolicy::default(),
        }
    }
}

/// Outcome of compiling a set of rows.
///
/// The assembled map is only reachable when no row failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileResult {
    map: RegisterMap,
    errors: Vec<RowError>,
    rows: usize,
}

impl CompileResult {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[RowError] {
        &self.errors
    }

    /// Number of rows that were scanned.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn map(&self) -> Option<&RegisterMap> {
        self.is_success().then_some(&self.map)
    }

    pub fn into_map(self) -> Result<RegisterMap, CompileError> {
        if self.errors.is_empty() {
            Ok(self.map)
        } else {
            Err(CompileError::RowErrors {
                errors: self.errors,
            })
        }
    }
}

/// Turns map rows into a [`RegisterMap`], reporting problems per row.
pub struct MapCompiler {
    options: CompileOptions,
    sink: Arc<dyn DiagnosticSink>,
}

impl MapCompiler {
    pub fn new(options: CompileOptions, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { options, sink }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn compile(&self, rows: &[MapRow]) -> CompileResult {
        let mut map = RegisterMap::new();
        let mut owners: HashMap<u16, usize> = HashMap::new();
        let mut errors = Vec::new();
        let mut scanned = 0;

        for row in rows {
            scanned += 1;
            match self.compile_row(row, &owners) {
                Ok((start, words)) => {
                    if words.is_empty() {
                        log::debug!("Line {} encodes to no registers", row.line);
                    }
                    for (offset, word) in words.into_iter().enumerate() {
                        let address = start + offset as u16;
                        map.insert(address, word);
                        owners.insert(address, row.line);
                    }
                }
                Err(kind) => {
                    let err = RowError::new(row.line, kind);
                    self.sink.record(&DiagnosticEvent::new(
                        EventLevel::Error,
                        EventKind::RowRejected {
                            line: err.line,
                            reason: err.kind.to_string(),
                        },
                    ));
                    errors.push(err);
                    if self.options.error_policy == ErrorPolicy::StopAtFirst {
                        break;
                    }
                }
            }
        }

        if errors.is_empty() {
            self.sink.record(&DiagnosticEvent::new(
                EventLevel::Info,
                EventKind::MapCompiled {
                    rows: scanned,
                    registers: map.len(),
                },
            ));
        }

        CompileResult {
            map,
            errors,
            rows: scanned,
        }
    }

    /// Read rows from CSV text and compile them.
    pub fn compile_csv(&self, text: &str) -> Result<CompileResult, CompileError> {
        let rows = read_rows(text)?;
        Ok(self.compile(&rows))
    }

    /// Read rows from a CSV file and compile them.
    pub fn compile_path(&self, path: impl AsRef<Path>) -> Result<CompileResult, CompileError> {
        let rows = read_rows_from_path(path)?;
        Ok(self.compile(&rows))
    }

    /// Normalize, encode and check the claimed span of one row. Nothing is
    /// claimed unless the whole span is free.
    fn compile_row(
        &self,
        row: &MapRow,
        owners: &HashMap<u16, usize>,
    ) -> Result<(u16, Vec<u16>), RowErrorKind> {
        let start = normalize(&row.address, self.options.four_base)?;
        let options = RowOptions::from_row(row)?;
        let words = encode(&row.dtype, &row.value, &options, self.options.defaults)?;

        if usize::from(start) + words.len() > usize::from(u16::MAX) + 1 {
            return Err(RowErrorKind::SpanOverflow {
                address: start,
                words: words.len(),
            });
        }

        for offset in 0..words.len() {
            let address = start + offset as u16;
            if let Some(&claimed_by) = owners.get(&address) {
                return Err(RowErrorKind::Overlap {
                    address,
                    claimed_by,
                });
            }
        }

        Ok((start, words))
    }
}

/// Compile `rows` without diagnostics.
pub fn compile(rows: &[MapRow], options: CompileOptions) -> CompileResult {
    MapCompiler::new(options, Arc::new(NoOpSink)).compile(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::regmap::{error::EncodeError, AddressError};

    fn rows(entries: &[(&str, &str, &str)]) -> Vec<MapRow> {
        entries
            .iter()
            .enumerate()
            .map(|(i, (address, dtype, value))| MapRow::new(address, dtype, value).at_line(i + 2))
            .collect()
    }

    #[test]
    fn test_compile_mixed_rows() {
        let result = compile(
            &rows(&[
                ("40001", "uint16", "7"),
                ("40002", "int32", "-2"),
                ("0x10", "ascii", "HELLO"),
            ]),
            CompileOptions::default(),
        );
        assert!(result.is_success());
        let map = result.into_map().unwrap();
        let entries = map.iter().collect::<Vec<_>>();
        assert_eq!(
            entries,
            vec![
                (0, 7),
                (1, 0xFFFF),
                (2, 0xFFFE),
                (16, 0x4845),
                (17, 0x4C4C),
                (18, 0x4F00),
            ]
        );
    }

    #[test]
    fn test_overlap_reports_both_rows() {
        let result = compile(
            &rows(&[("10", "uint32", "1"), ("11", "uint16", "2")]),
            CompileOptions::default(),
        );
        assert!(!result.is_success());
        assert!(result.map().is_none());
        assert_eq!(
            result.errors(),
            &[RowError::new(
                3,
                RowErrorKind::Overlap {
                    address: 11,
                    claimed_by: 2
                }
            )]
        );
    }

    #[test]
    fn test_overlap_detected_in_either_order() {
        let forward = compile(
            &rows(&[("5", "uint16", "1"), ("4", "uint32", "2")]),
            CompileOptions::default(),
        );
        let backward = compile(
            &rows(&[("4", "uint32", "2"), ("5", "uint16", "1")]),
            CompileOptions::default(),
        );
        for result in [forward, backward] {
            assert!(matches!(
                result.errors(),
                [RowError {
                    kind: RowErrorKind::Overlap { address: 5, .. },
                    ..
                }]
            ));
        }
    }

    #[test]
    fn test_collect_all_keeps_scanning() {
        let input = rows(&[
            ("abc", "uint16", "1"),
            ("1", "uint16", "70000"),
            ("2", "real", "1"),
            ("3", "uint16", "1"),
        ]);
        let result = compile(&input, CompileOptions::default());
        assert_eq!(result.rows(), 4);
        let lines = result.errors().iter().map(|e| e.line).collect::<Vec<_>>();
        assert_eq!(lines, vec![2, 3, 4]);
        assert!(matches!(
            result.errors()[0].kind,
            RowErrorKind::Address(AddressError::Malformed { .. })
        ));
        assert!(matches!(
            result.errors()[2].kind,
            RowErrorKind::Encode(EncodeError::UnsupportedType { .. })
        ));
        assert!(matches!(
            result.into_map(),
            Err(CompileError::RowErrors { errors }) if errors.len() == 3
        ));
    }

    #[test]
    fn test_stop_at_first_policy() {
        let input = rows(&[
            ("1", "uint16", "1"),
            ("x", "uint16", "1"),
            ("y", "uint16", "1"),
        ]);
        let result = compile(
            &input,
            CompileOptions {
                error_policy: ErrorPolicy::StopAtFirst,
                ..Default::default()
            },
        );
        assert_eq!(result.rows(), 2);
        assert_eq!(result.errors().len(), 1);
        assert!(!result.is_success());
    }

    #[test]
    fn test_span_overflow_at_top_of_register_space() {
        let result = compile(
            &rows(&[("65535", "uint32", "1")]),
            CompileOptions::default(),
        );
        assert_eq!(
            result.errors()[0].kind,
            RowErrorKind::SpanOverflow {
                address: 65535,
                words: 2
            }
        );

        let fits = compile(
            &rows(&[("0xFFFE", "uint32", "1")]),
            CompileOptions::default(),
        );
        assert!(fits.is_success());
    }

    #[test]
    fn test_huge_ascii_length_is_a_row_error() {
        let result = compile(
            &[
                MapRow::new("0", "ascii", "AB")
                    .with_length("18446744073709551615")
                    .at_line(2),
                MapRow::new("1", "ascii", "AB").with_length("131072").at_line(3),
            ],
            CompileOptions::default(),
        );
        assert!(matches!(
            result.errors(),
            [
                RowError {
                    line: 2,
                    kind: RowErrorKind::Encode(EncodeError::MalformedLength { .. }),
                },
                RowError {
                    line: 3,
                    kind: RowErrorKind::SpanOverflow {
                        address: 1,
                        words: 65536
                    },
                },
            ]
        ));
    }

    #[test]
    fn test_defaults_apply_to_rows_without_overrides() {
        let options = CompileOptions {
            defaults: EndianConfig::from_order_code(crate::protocol::regmap::OrderCode::Cdab),
            ..Default::default()
        };
        let input = vec![
            MapRow::new("0", "uint32", "0x11223344").at_line(2),
            MapRow::new("2", "uint32", "0x11223344")
                .with_order_code("ABCD")
                .at_line(3),
        ];
        let map = compile(&input, options).into_map().unwrap();
        assert_eq!(
            map.iter().map(|(_, v)| v).collect::<Vec<_>>(),
            vec![0x3344, 0x1122, 0x1122, 0x3344]
        );
    }

    #[test]
    fn test_sink_receives_row_rejections() {
        let (sender, receiver) = flume::unbounded();
        let sink = crate::cli::handlers::FlumeSink::from_sender(sender);
        let compiler = MapCompiler::new(CompileOptions::default(), Arc::new(sink));
        let result = compiler.compile(&rows(&[("1", "uint16", "1"), ("1", "uint16", "2")]));
        assert!(!result.is_success());

        let events = receiver.try_iter().collect::<Vec<_>>();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0].kind,
            EventKind::RowRejected { line: 3, .. }
        ));
    }
}
