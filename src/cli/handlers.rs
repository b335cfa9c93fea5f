/// Channel-backed diagnostic sink used by the CLI
///
/// Events are pushed into a flume channel and drained by a printer thread, so
/// the serial loop never blocks on terminal output.
use crate::{api::traits::DiagnosticSink, core::logs::DiagnosticEvent};

/// Flume-based sink that sends every event through a channel
#[derive(Clone)]
pub struct FlumeSink {
    sender: flume::Sender<DiagnosticEvent>,
}

impl FlumeSink {
    /// Create a new flume sink with an unbounded channel
    pub fn new() -> (Self, flume::Receiver<DiagnosticEvent>) {
        let (sender, receiver) = flume::unbounded();
        (Self { sender }, receiver)
    }

    /// Create a new flume sink with a bounded channel
    pub fn with_capacity(cap: usize) -> (Self, flume::Receiver<DiagnosticEvent>) {
        let (sender, receiver) = flume::bounded(cap);
        (Self { sender }, receiver)
    }

    pub fn from_sender(sender: flume::Sender<DiagnosticEvent>) -> Self {
        Self { sender }
    }
}

impl DiagnosticSink for FlumeSink {
    fn record(&self, event: &DiagnosticEvent) {
        if self.sender.send(event.clone()).is_err() {
            log::debug!("Diagnostic receiver dropped: {event}");
        }
    }
}
