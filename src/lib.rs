//! hrsim: read-only Modbus RTU holding-register simulator
//!
//! A CSV register map is compiled into a sparse, immutable holding register
//! store which is then served to a Modbus master over a serial line. Writes
//! are acknowledged and ignored, so the values a master reads are always the
//! ones in the map.
//!
//! The public modules expose the map compiler and store (`protocol::regmap`),
//! the RTU request handling (`protocol::modbus`) and a builder API (`api`).
//! The CLI frontend lives in a separate, hidden module.

pub mod api;
#[doc(hidden)]
pub mod cli;
#[doc(hidden)]
pub mod core;
pub mod protocol;

pub use api::*;
