pub mod handle;
pub mod traits;
pub mod utils;

use anyhow::Result;
use std::{path::Path, sync::Arc};

use crate::protocol::regmap::{
    CompileOptions, EndianConfig, ErrorPolicy, MapCompiler, MapRow, OrderCode,
    SparseRegisterStore, StoreOptions,
};

pub use handle::{StoreHandle, StoreState};
pub use crate::core::logs::{DiagnosticEvent, EventKind, EventLevel};
pub use traits::{DiagnosticSink, LoggingSink, NoOpSink};

/// Builder for compiling a register map and wrapping it in a store.
///
/// ```no_run
/// use hrsim::api::StoreBuilder;
///
/// let store = StoreBuilder::new()
///     .with_four_base(40001)
///     .with_strict_gaps(true)
///     .build_from_path("map.csv")?;
/// # Ok::<(), anyhow::Error>(())
/// ```
///
/// Without [`with_sink`](Self::with_sink), diagnostics go to the `log` facade.
#[derive(Clone)]
pub struct StoreBuilder {
    compile: CompileOptions,
    store: StoreOptions,
    sink: Arc<dyn DiagnosticSink>,
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self {
            compile: CompileOptions::default(),
            store: StoreOptions::default(),
            sink: Arc::new(LoggingSink),
        }
    }

    pub fn with_compile_options(mut self, options: CompileOptions) -> Self {
        self.compile = options;
        self
    }

    pub fn with_store_options(mut self, options: StoreOptions) -> Self {
        self.store = options;
        self
    }

    pub fn with_four_base(mut self, four_base: u32) -> Self {
        self.compile.four_base = four_base;
        self
    }

    /// Default byte and word order for rows that do not set their own.
    pub fn with_endian(mut self, defaults: EndianConfig) -> Self {
        self.compile.defaults = defaults;
        self
    }

    pub fn with_order_code(self, code: OrderCode) -> Self {
        self.with_endian(EndianConfig::from_order_code(code))
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.compile.error_policy = policy;
        self
    }

    pub fn with_strict_gaps(mut self, strict: bool) -> Self {
        self.store.strict_gaps = strict;
        self
    }

    pub fn with_log_reads(mut self, enabled: bool) -> Self {
        self.store.log_reads = enabled;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn compile_options(&self) -> CompileOptions {
        self.compile
    }

    pub fn store_options(&self) -> StoreOptions {
        self.store
    }

    pub fn sink(&self) -> Arc<dyn DiagnosticSink> {
        self.sink.clone()
    }

    /// A compiler sharing this builder's options and sink.
    pub fn compiler(&self) -> MapCompiler {
        MapCompiler::new(self.compile, self.sink.clone())
    }

    pub fn build_from_rows(&self, rows: &[MapRow]) -> Result<SparseRegisterStore> {
        self.finish(self.compiler().compile(rows))
    }

    pub fn build_from_csv(&self, text: &str) -> Result<SparseRegisterStore> {
        self.finish(self.compiler().compile_csv(text)?)
    }

    pub fn build_from_path(&self, path: impl AsRef<Path>) -> Result<SparseRegisterStore> {
        let path = path.as_ref();
        log::info!("Compiling register map {}", path.display());
        self.finish(self.compiler().compile_path(path)?)
    }

    fn finish(
        &self,
        result: crate::protocol::regmap::CompileResult,
    ) -> Result<SparseRegisterStore> {
        Ok(SparseRegisterStore::from_compile(
            result,
            self.store,
            self.sink.clone(),
        )?)
    }
}
