//! Process-wide scratch cleanup on SIGINT, SIGTERM and SIGHUP.
//!
//! Every session that asks for it registers its store here. One listener thread,
//! started on the first registration, reclaims all stores that are still alive and
//! then re-raises the signal with its default disposition, so the process ends
//! the way it would have without the listener.

use crate::temp_store::TempStore;
use log::{debug, info, warn};
use nix::sys::signal::{raise, SigHandler, Signal};
use std::sync::{Arc, Mutex, OnceLock, Weak};

static STORES: StoreRegistry = StoreRegistry::new();
static LISTENER: OnceLock<bool> = OnceLock::new();

/// Weak references to every store that wants cleanup on termination.
#[derive(Debug)]
pub(crate) struct StoreRegistry {
    stores: Mutex<Vec<Weak<TempStore>>>,
}

impl StoreRegistry {
    pub(crate) const fn new() -> Self {
        Self {
            stores: Mutex::new(Vec::new()),
        }
    }

    fn stores(&self) -> std::sync::MutexGuard<'_, Vec<Weak<TempStore>>> {
        self.stores
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn register(&self, store: &Arc<TempStore>) {
        let store = Arc::downgrade(store);
        let mut stores = self.stores();
        stores.retain(|s| s.strong_count() > 0);
        if !stores.iter().any(|s| s.ptr_eq(&store)) {
            stores.push(store);
        }
    }

    /// Number of registered stores that are still alive.
    pub(crate) fn live(&self) -> usize {
        self.stores().iter().filter(|s| s.strong_count() > 0).count()
    }

    /// Reclaims every live store and returns how many files were removed.
    /// A store that fails to delete some files does not stop the others.
    pub(crate) fn reclaim_all(&self) -> usize {
        let live: Vec<Arc<TempStore>> = self.stores().iter().filter_map(Weak::upgrade).collect();
        let mut removed = 0;
        for store in live {
            match store.reclaim_all() {
                Ok(n) => removed += n,
                Err(e) => warn!("Scratch cleanup in {:?} incomplete: {}", store.dir(), e),
            }
        }
        removed
    }
}

/// Registers `store` for cleanup on termination and starts the listener once.
pub(crate) fn install_signal_cleanup(store: &Arc<TempStore>) {
    STORES.register(store);
    LISTENER.get_or_init(spawn_listener);
    debug!("{} scratch stores registered for signal cleanup", STORES.live());
}

fn spawn_listener() -> bool {
    let spawned = std::thread::Builder::new()
        .name("cdo-signal-cleanup".to_string())
        .spawn(|| {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!("Could not start the signal listener: {}", e);
                    return;
                }
            };
            let Some(signal) = runtime.block_on(wait_for_termination()) else {
                return;
            };
            warn!("Received {:?}, removing scratch files", signal);
            let removed = STORES.reclaim_all();
            info!("Removed {} scratch files", removed);
            reraise(signal);
        });
    match spawned {
        Ok(_) => {
            debug!("Signal cleanup listener started");
            true
        }
        Err(e) => {
            warn!("Could not start the signal listener: {}", e);
            false
        }
    }
}

async fn wait_for_termination() -> Option<Signal> {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut interrupt, mut terminate, mut hangup) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::hangup()),
    ) {
        (Ok(i), Ok(t), Ok(h)) => (i, t, h),
        _ => {
            warn!("Could not install signal handlers; scratch files are only removed on drop");
            return None;
        }
    };
    tokio::select! {
        _ = interrupt.recv() => Some(Signal::SIGINT),
        _ = terminate.recv() => Some(Signal::SIGTERM),
        _ = hangup.recv() => Some(Signal::SIGHUP),
    }
}

fn reraise(signal: Signal) {
    // SAFETY: SIG_DFL installs no handler code, so nothing can run concurrently with it.
    let restored = unsafe { nix::sys::signal::signal(signal, SigHandler::SigDfl) };
    if let Err(e) = restored.and_then(|_| raise(signal)) {
        warn!("Could not re-raise {:?}: {}", signal, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_reclaims_every_live_store() {
        let first_dir = tempdir().unwrap();
        let second_dir = tempdir().unwrap();
        let first = Arc::new(TempStore::new(first_dir.path()).unwrap());
        let second = Arc::new(TempStore::new(second_dir.path()).unwrap());

        let registry = StoreRegistry::new();
        registry.register(&first);
        registry.register(&second);
        let a = first.allocate().unwrap();
        let b = second.allocate().unwrap();
        let c = second.allocate().unwrap();

        assert_eq!(registry.reclaim_all(), 3);
        assert!(!a.exists() && !b.exists() && !c.exists());
        assert_eq!(registry.reclaim_all(), 0);
    }

    #[test]
    fn test_dropped_stores_are_pruned() {
        let dir = tempdir().unwrap();
        let registry = StoreRegistry::new();
        let kept = Arc::new(TempStore::new(dir.path()).unwrap());
        registry.register(&kept);
        {
            let dropped = Arc::new(TempStore::new(dir.path()).unwrap());
            registry.register(&dropped);
            assert_eq!(registry.live(), 2);
        }
        assert_eq!(registry.live(), 1);

        registry.register(&kept);
        assert_eq!(registry.stores().len(), 1);
    }
}
