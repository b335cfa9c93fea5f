use anyhow::{anyhow, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, str::FromStr, time::Duration};

use crate::{
    api::utils::SerialFraming,
    protocol::regmap::{CompileOptions, EndianConfig, Endian, ErrorPolicy, OrderCode, StoreOptions},
};

fn default_port() -> String {
    std::env::var("MODBUS_PORT").unwrap_or_else(|_| "COM3".to_string())
}

fn default_baud_rate() -> u32 {
    std::env::var("MODBUS_BAUD")
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(9600)
}

/// Serial line settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    /// `N`, `E` or `O`
    pub parity: char,
    pub stop_bits: u8,
    pub timeout_ms: u64,
    /// Station id the simulator answers as
    pub station_id: u8,
}

impl Default for SerialConfig {
    fn default() -> Self {
        let framing = SerialFraming::default();
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            data_bits: framing.data_bits,
            parity: framing.parity,
            stop_bits: framing.stop_bits,
            timeout_ms: 1000,
            station_id: 1,
        }
    }
}

impl SerialConfig {
    pub fn framing(&self) -> SerialFraming {
        SerialFraming {
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Register map settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub csv_path: PathBuf,
    pub four_base: u32,
    pub byte_order: Endian,
    pub word_order: Endian,
    /// Takes precedence over `byte_order` / `word_order` when set
    pub order_code: Option<OrderCode>,
    pub strict_gaps: bool,
    pub log_reads: bool,
    pub error_policy: ErrorPolicy,
    pub watch: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        let compile = CompileOptions::default();
        Self {
            csv_path: PathBuf::from("map.csv"),
            four_base: compile.four_base,
            byte_order: compile.defaults.byte_order,
            word_order: compile.defaults.word_order,
            order_code: None,
            strict_gaps: false,
            log_reads: false,
            error_policy: compile.error_policy,
            watch: false,
        }
    }
}

/// Root configuration of the simulator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub serial: SerialConfig,
    pub map: MapConfig,
}

impl SimConfig {
    /// Parse configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Read configuration from a file; the format follows the extension
    pub fn from_file(file_path: impl AsRef<Path>) -> Result<Self> {
        let file_path = file_path.as_ref();
        let content = std::fs::read_to_string(file_path)
            .map_err(|err| anyhow!("Failed to read config {}: {err}", file_path.display()))?;
        let extension = file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("json") => Ok(Self::from_json(&content)?),
            Some("toml") => Ok(Self::from_toml(&content)?),
            _ => Err(anyhow!(
                "Unsupported config format {}: expected .json or .toml",
                file_path.display()
            )),
        }
    }

    /// Convert to a JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load the `--config` file if given, then apply the other flags on top.
    pub fn load(matches: &ArgMatches) -> Result<Self> {
        let mut config = match matches.get_one::<String>("config") {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_matches(matches)?;
        Ok(config)
    }

    /// Override fields with any flags given on the command line.
    pub fn apply_matches(&mut self, matches: &ArgMatches) -> Result<()> {
        if let Some(port) = matches.get_one::<String>("port") {
            self.serial.port = port.clone();
        }
        if let Some(&baud) = matches.get_one::<u32>("baud") {
            self.serial.baud_rate = baud;
        }
        if let Some(&bits) = matches.get_one::<u8>("bytesize") {
            self.serial.data_bits = bits;
        }
        if let Some(parity) = matches.get_one::<String>("parity") {
            self.serial.parity = parity
                .chars()
                .next()
                .map(|c| c.to_ascii_uppercase())
                .ok_or_else(|| anyhow!("Empty parity"))?;
        }
        if let Some(&bits) = matches.get_one::<u8>("stopbits") {
            self.serial.stop_bits = bits;
        }
        if let Some(&secs) = matches.get_one::<f64>("timeout") {
            if !secs.is_finite() || secs < 0.0 {
                return Err(anyhow!("Invalid timeout: {secs}"));
            }
            self.serial.timeout_ms = (secs * 1000.0).round() as u64;
        }
        if let Some(&id) = matches.get_one::<u8>("slave") {
            self.serial.station_id = id;
        }

        if let Some(path) = matches.get_one::<String>("csv") {
            self.map.csv_path = PathBuf::from(path);
        }
        if let Some(&base) = matches.get_one::<u32>("four-base") {
            self.map.four_base = base;
        }
        if let Some(order) = matches.get_one::<String>("byte-order") {
            self.map.byte_order = parse_endian("byte order", order)?;
        }
        if let Some(order) = matches.get_one::<String>("word-order") {
            self.map.word_order = parse_endian("word order", order)?;
        }
        if let Some(code) = matches.get_one::<String>("order") {
            self.map.order_code = Some(
                OrderCode::from_str(code.trim())
                    .map_err(|_| anyhow!("Unknown order code: {code}"))?,
            );
        }
        if matches.get_flag("strict-gaps") {
            self.map.strict_gaps = true;
        }
        if matches.get_flag("log-reads") {
            self.map.log_reads = true;
        }
        if matches.get_flag("fail-fast") {
            self.map.error_policy = ErrorPolicy::StopAtFirst;
        }
        if matches.get_flag("watch") {
            self.map.watch = true;
        }
        Ok(())
    }

    /// Default endianness after resolving the order code.
    pub fn default_endian(&self) -> EndianConfig {
        match self.map.order_code {
            Some(code) => EndianConfig::from_order_code(code),
            None => EndianConfig::new(self.map.byte_order, self.map.word_order),
        }
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            four_base: self.map.four_base,
            defaults: self.default_endian(),
            error_policy: self.map.error_policy,
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            strict_gaps: self.map.strict_gaps,
            log_reads: self.map.log_reads,
        }
    }
}

fn parse_endian(what: &str, value: &str) -> Result<Endian> {
    Endian::from_str(value.trim()).map_err(|_| anyhow!("Unknown {what}: {value}"))
}
