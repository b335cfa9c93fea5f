use std::{fmt, sync::Arc};

use super::{compiler::CompileResult, error::CompileError, error::ReadError, RegisterMap};
use crate::{
    api::traits::DiagnosticSink,
    core::logs::{DiagnosticEvent, EventKind, EventLevel},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreOptions {
    /// Reads touching an unmapped address fail instead of returning zero
    pub strict_gaps: bool,
    /// Record every served read as a diagnostic event
    pub log_reads: bool,
}

/// Acknowledgement of a write request. Writes never change the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteAck {
    pub address: u16,
    pub count: usize,
}

/// Immutable holding-register view over a compiled [`RegisterMap`].
///
/// Nothing inside changes after construction, so one instance can be shared
/// between any number of threads behind an `Arc`. Rejected writes only reach
/// the diagnostic sink.
pub struct SparseRegisterStore {
    map: RegisterMap,
    options: StoreOptions,
    sink: Arc<dyn DiagnosticSink>,
}

impl SparseRegisterStore {
    pub fn new(map: RegisterMap, options: StoreOptions, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { map, options, sink }
    }

    /// Build a store from a compile result. Fails if any row failed.
    pub fn from_compile(
        result: CompileResult,
        options: StoreOptions,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, CompileError> {
        Ok(Self::new(result.into_map()?, options, sink))
    }

    pub fn map(&self) -> &RegisterMap {
        &self.map
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    /// Read `count` registers starting at `address`.
    ///
    /// Addresses past 65535 are never mapped and behave like any other gap.
    pub fn read(&self, address: u16, count: u16) -> Result<Vec<u16>, ReadError> {
        let mut values = Vec::with_capacity(usize::from(count));
        for target in span(address, count) {
            match u16::try_from(target).ok().and_then(|a| self.map.get(a)) {
                Some(value) => values.push(value),
                None if self.options.strict_gaps => {
                    self.sink.record(&DiagnosticEvent::new(
                        EventLevel::Warning,
                        EventKind::ReadRejected {
                            address,
                            count,
                            missing: target,
                        },
                    ));
                    return Err(ReadError::IllegalAddress { address: target });
                }
                None => values.push(0),
            }
        }

        if self.options.log_reads {
            self.sink.record(&DiagnosticEvent::new(
                EventLevel::Debug,
                EventKind::ReadServed { address, count },
            ));
        }
        Ok(values)
    }

    /// Accept and discard a write. The attempt is reported to the sink.
    pub fn write(&self, address: u16, values: &[u16]) -> WriteAck {
        self.sink.record(&DiagnosticEvent::new(
            EventLevel::Warning,
            EventKind::WriteRejected {
                address,
                values: values.to_vec(),
            },
        ));
        WriteAck {
            address,
            count: values.len(),
        }
    }

    /// Whether [`read`](Self::read) over the same range would succeed.
    pub fn validate(&self, address: u16, count: u16) -> bool {
        if !self.options.strict_gaps {
            return true;
        }
        span(address, count).all(|target| {
            u16::try_from(target)
                .map(|a| self.map.contains(a))
                .unwrap_or(false)
        })
    }
}

impl fmt::Debug for SparseRegisterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseRegisterStore")
            .field("registers", &self.map.len())
            .field("options", &self.options)
            .finish()
    }
}

fn span(address: u16, count: u16) -> std::ops::Range<u32> {
    let start = u32::from(address);
    start..start + u32::from(count)
}
