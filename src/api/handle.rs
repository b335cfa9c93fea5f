use parking_lot::RwLock;
use std::sync::Arc;

use crate::protocol::regmap::SparseRegisterStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// No map has compiled yet
    Unbuilt,
    /// A store is installed and serving
    Ready,
}

/// Shared slot holding the store currently being served.
///
/// Starts `Unbuilt`; the first [`install`](Self::install) makes it `Ready`
/// and it stays `Ready` from then on. Installing again swaps in a whole new
/// store: readers that already took a [`snapshot`](Self::snapshot) keep
/// reading the old one, later snapshots see the new one, and nobody ever sees
/// a mix of both.
#[derive(Clone, Default)]
pub struct StoreHandle {
    current: Arc<RwLock<Option<Arc<SparseRegisterStore>>>>,
}

impl StoreHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: SparseRegisterStore) -> Self {
        let handle = Self::new();
        handle.install(store);
        handle
    }

    pub fn state(&self) -> StoreState {
        if self.current.read().is_some() {
            StoreState::Ready
        } else {
            StoreState::Unbuilt
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == StoreState::Ready
    }

    /// Replace the served store, returning the previous one.
    pub fn install(&self, store: SparseRegisterStore) -> Option<Arc<SparseRegisterStore>> {
        let store = Arc::new(store);
        log::debug!("Installing register store with {} register(s)", store.map().len());
        self.current.write().replace(store)
    }

    /// The store to serve the next request from, if any.
    pub fn snapshot(&self) -> Option<Arc<SparseRegisterStore>> {
        self.current.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::traits::NoOpSink,
        protocol::regmap::{RegisterMap, StoreOptions},
    };

    fn store_with(value: u16) -> SparseRegisterStore {
        SparseRegisterStore::new(
            [(0u16, value)].into_iter().collect::<RegisterMap>(),
            StoreOptions::default(),
            Arc::new(NoOpSink),
        )
    }

    #[test]
    fn test_unbuilt_to_ready() {
        let handle = StoreHandle::new();
        assert_eq!(handle.state(), StoreState::Unbuilt);
        assert!(handle.snapshot().is_none());

        assert!(handle.install(store_with(1)).is_none());
        assert_eq!(handle.state(), StoreState::Ready);
    }

    #[test]
    fn test_snapshot_survives_swap() {
        let handle = StoreHandle::with_store(store_with(1));
        let before = handle.snapshot().unwrap();

        let previous = handle.install(store_with(2)).unwrap();
        assert!(Arc::ptr_eq(&previous, &before));

        assert_eq!(before.read(0, 1), Ok(vec![1]));
        assert_eq!(handle.snapshot().unwrap().read(0, 1), Ok(vec![2]));
        assert!(handle.is_ready());
    }
}
