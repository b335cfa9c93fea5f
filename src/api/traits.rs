/// Diagnostic sink traits - where the compiler and the store report events
///
/// The register map code never logs through process-wide state. Each compiler
/// and store is handed a sink at construction and records its events there.
/// The CLI module provides a channel-backed implementation.
use crate::core::logs::DiagnosticEvent;

/// Receiver of diagnostic events
///
/// `record` may be called from several threads at once (one per served
/// connection), so implementations must not rely on exclusive access.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, event: &DiagnosticEvent);
}

/// Sink that drops every event (useful for testing)
pub struct NoOpSink;

impl DiagnosticSink for NoOpSink {
    fn record(&self, _event: &DiagnosticEvent) {}
}

/// Sink that forwards events to the `log` facade
pub struct LoggingSink;

impl DiagnosticSink for LoggingSink {
    fn record(&self, event: &DiagnosticEvent) {
        log::log!(target: "hrsim::diagnostics", log::Level::from(event.level), "{}", event.kind);
    }
}
