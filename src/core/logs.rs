/// Diagnostic events and logger setup
///
/// The compiler and the register store never log through a global; they hand
/// a [`DiagnosticEvent`] to whatever sink they were built with. Events are
/// serializable so frontends can ship them as JSON lines.
use anyhow::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A diagnostic event with timestamp and severity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub timestamp: DateTime<Local>,
    pub level: EventLevel,
    pub kind: EventKind,
}

/// Event severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl From<EventLevel> for log::Level {
    fn from(level: EventLevel) -> Self {
        match level {
            EventLevel::Debug => log::Level::Debug,
            EventLevel::Info => log::Level::Info,
            EventLevel::Warning => log::Level::Warn,
            EventLevel::Error => log::Level::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A map row failed to compile
    RowRejected { line: usize, reason: String },
    /// A map compiled without errors
    MapCompiled { rows: usize, registers: usize },
    /// A read was answered (only recorded when read logging is enabled)
    ReadServed { address: u16, count: u16 },
    /// A strict-gap read hit an unmapped address
    ReadRejected { address: u16, count: u16, missing: u32 },
    /// A write arrived and was discarded
    WriteRejected { address: u16, values: Vec<u16> },
    /// A changed map file replaced the store being served
    StoreReloaded { path: String, registers: usize },
    /// A changed map file failed to compile; the previous store stays
    ReloadFailed { path: String, reason: String },
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::RowRejected { line, reason } => write!(f, "Line {line}: {reason}"),
            EventKind::MapCompiled { rows, registers } => {
                write!(f, "Compiled {rows} row(s) into {registers} register(s)")
            }
            EventKind::ReadServed { address, count } => write!(f, "READ HR[{address}] x{count}"),
            EventKind::ReadRejected {
                address,
                count,
                missing,
            } => write!(
                f,
                "Read HR[{address}] x{count} rejected: address {missing} is not mapped"
            ),
            EventKind::WriteRejected { address, values } => {
                let last = usize::from(*address) + values.len().saturating_sub(1);
                write!(f, "Write ignored at HR[{address}..{last}]: {values:?}")
            }
            EventKind::StoreReloaded { path, registers } => {
                write!(f, "Reloaded {path}: {registers} register(s)")
            }
            EventKind::ReloadFailed { path, reason } => {
                write!(f, "Reload of {path} failed, keeping previous map: {reason}")
            }
        }
    }
}

impl DiagnosticEvent {
    /// Create a new event with the current timestamp
    pub fn new(level: EventLevel, kind: EventKind) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            kind,
        }
    }
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

/// Parse a level name as accepted by `--log`.
pub fn parse_level(name: &str) -> Option<log::LevelFilter> {
    match name.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Some(log::LevelFilter::Trace),
        "DEBUG" => Some(log::LevelFilter::Debug),
        "INFO" => Some(log::LevelFilter::Info),
        "WARN" | "WARNING" => Some(log::LevelFilter::Warn),
        "ERROR" => Some(log::LevelFilter::Error),
        "OFF" => Some(log::LevelFilter::Off),
        _ => None,
    }
}

/// Install the process logger. `RUST_LOG`, when set, refines `level`.
pub fn init_logger(level: log::LevelFilter) -> Result<()> {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_env("RUST_LOG")
        .format_timestamp_millis()
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = DiagnosticEvent::new(
            EventLevel::Warning,
            EventKind::WriteRejected {
                address: 4,
                values: vec![1, 2],
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["level"], "warning");
        assert_eq!(json["kind"]["type"], "write_rejected");
        assert_eq!(json["kind"]["address"], 4);

        let parsed: DiagnosticEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.kind, event.kind);
    }

    #[test]
    fn test_write_rejected_message_names_range() {
        let kind = EventKind::WriteRejected {
            address: 10,
            values: vec![7, 8, 9],
        };
        assert_eq!(kind.to_string(), "Write ignored at HR[10..12]: [7, 8, 9]");
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("warning"), Some(log::LevelFilter::Warn));
        assert_eq!(parse_level("DEBUG"), Some(log::LevelFilter::Debug));
        assert_eq!(parse_level("loud"), None);
    }
}
