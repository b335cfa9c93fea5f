use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, SystemTime},
};

use crate::{
    api::{StoreBuilder, StoreHandle},
    core::logs::{DiagnosticEvent, EventKind, EventLevel},
};

type FileStamp = (Option<SystemTime>, u64);

fn stamp(path: &Path) -> Option<FileStamp> {
    let metadata = fs::metadata(path).ok()?;
    Some((metadata.modified().ok(), metadata.len()))
}

/// Recompiles the map file when it changes and swaps the result into a
/// [`StoreHandle`]. A failed recompile leaves the current store in place.
pub struct MapWatcher {
    path: PathBuf,
    builder: StoreBuilder,
    handle: StoreHandle,
    last_seen: Option<FileStamp>,
}

impl MapWatcher {
    pub fn new(path: impl Into<PathBuf>, builder: StoreBuilder, handle: StoreHandle) -> Self {
        let path = path.into();
        let last_seen = stamp(&path);
        Self {
            path,
            builder,
            handle,
            last_seen,
        }
    }

    /// Reload if the file changed since the last look. Returns whether a
    /// reload was attempted.
    pub fn poll(&mut self) -> bool {
        let current = stamp(&self.path);
        if current.is_none() || current == self.last_seen {
            return false;
        }
        self.last_seen = current;
        self.reload();
        true
    }

    /// Recompile now. Returns whether a new store was installed.
    pub fn reload(&mut self) -> bool {
        let path = self.path.display().to_string();
        match self.builder.build_from_path(&self.path) {
            Ok(store) => {
                let registers = store.map().len();
                self.handle.install(store);
                self.builder.sink().record(&DiagnosticEvent::new(
                    EventLevel::Info,
                    EventKind::StoreReloaded { path, registers },
                ));
                true
            }
            Err(err) => {
                self.builder.sink().record(&DiagnosticEvent::new(
                    EventLevel::Error,
                    EventKind::ReloadFailed {
                        path,
                        reason: err.to_string(),
                    },
                ));
                false
            }
        }
    }
}

/// Poll `watcher` every `interval` on a background thread until `running`
/// is cleared.
pub fn spawn_watcher(
    mut watcher: MapWatcher,
    interval: Duration,
    running: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        log::info!("Watching {} for changes", watcher.path.display());
        while running.load(Ordering::SeqCst) {
            thread::sleep(interval);
            watcher.poll();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::handlers::FlumeSink;
    use std::sync::Arc;

    #[test]
    fn test_reload_swaps_or_keeps_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.csv");
        fs::write(&path, "address,type,value\n0,uint16,1\n").unwrap();

        let (sink, events) = FlumeSink::new();
        let builder = StoreBuilder::new().with_sink(Arc::new(sink));
        let handle = StoreHandle::with_store(builder.build_from_path(&path).unwrap());
        let mut watcher = MapWatcher::new(&path, builder, handle.clone());
        assert!(!watcher.poll());

        fs::write(&path, "address,type,value\n0,uint16,2\n1,uint16,3\n").unwrap();
        assert!(watcher.poll());
        assert_eq!(handle.snapshot().unwrap().read(0, 2), Ok(vec![2, 3]));

        fs::write(&path, "address,type,value\n0,uint16,2\n0,uint16,3\n").unwrap();
        assert!(!watcher.reload());
        assert_eq!(handle.snapshot().unwrap().read(0, 2), Ok(vec![2, 3]));

        let kinds = events.try_iter().map(|e| e.kind).collect::<Vec<_>>();
        assert!(kinds
            .iter()
            .any(|k| matches!(k, EventKind::StoreReloaded { registers: 2, .. })));
        assert!(matches!(
            kinds.last(),
            Some(EventKind::ReloadFailed { .. })
        ));
    }
}
