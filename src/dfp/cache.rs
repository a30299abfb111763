use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::DfpIndex;

/// Process wide holder of the current [`DfpIndex`].
///
/// The slot mutex is held for the whole build, so concurrent callers wait for
/// the one build in flight and then share its result. [`DfpCache::invalidate`]
/// only bumps the epoch; whichever caller comes next rebuilds.
#[derive(Debug, Default)]
pub struct DfpCache {
    epoch: AtomicU64,
    slot: Mutex<Option<(u64, Arc<DfpIndex>)>>,
    builds: AtomicUsize,
}

impl DfpCache {
    pub fn new() -> DfpCache {
        DfpCache::default()
    }

    pub async fn get_or_build<F>(&self, build: F) -> Arc<DfpIndex>
    where
        F: FnOnce() -> DfpIndex + Send + 'static,
    {
        let mut slot = self.slot.lock().await;
        let epoch = self.epoch.load(Ordering::SeqCst);

        if let Some((built_in, index)) = slot.as_ref() {
            if *built_in == epoch {
                debug!("dfp index cache hit");
                return index.clone();
            }
        }

        let index = match tokio::task::spawn_blocking(build).await {
            Ok(index) => Arc::new(index),
            Err(err) => {
                warn!("dfp index build failed: {err}");
                Arc::new(DfpIndex::empty())
            }
        };
        self.builds.fetch_add(1, Ordering::SeqCst);

        *slot = Some((epoch, index.clone()));
        index
    }

    /// The cached index if it is still current. Never builds.
    pub async fn current(&self) -> Option<Arc<DfpIndex>> {
        let slot = self.slot.lock().await;
        let epoch = self.epoch.load(Ordering::SeqCst);
        slot.as_ref()
            .filter(|(built_in, _)| *built_in == epoch)
            .map(|(_, index)| index.clone())
    }

    pub fn invalidate(&self) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(epoch, "dfp index invalidated");
    }

    /// How many builds ran since creation.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}
