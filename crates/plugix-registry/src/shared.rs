//! Process-wide index handle with atomic snapshot swap
//!
//! Readers clone an `Arc` out of a short read lock and then work on that
//! snapshot, so a reload never exposes a half-built index. Reloads are
//! single-flight: concurrent callers that missed against the same generation
//! share one rebuild.

use crate::index::RegistryIndex;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
struct Current {
    index: Arc<RegistryIndex>,
    generation: u64,
}

/// Outcome of [`SharedIndex::rebuild_once`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildTicket {
    /// This caller ran the rebuild; carries the new generation
    Rebuilt(u64),
    /// Another caller replaced the index first; carries the current generation
    AlreadyRebuilt(u64),
}

impl RebuildTicket {
    pub fn generation(&self) -> u64 {
        match self {
            RebuildTicket::Rebuilt(generation) | RebuildTicket::AlreadyRebuilt(generation) => {
                *generation
            }
        }
    }
}

#[derive(Debug)]
pub struct SharedIndex {
    current: RwLock<Current>,
    rebuild_gate: Mutex<()>,
}

impl SharedIndex {
    pub fn new(index: RegistryIndex) -> Self {
        SharedIndex {
            current: RwLock::new(Current {
                index: Arc::new(index),
                generation: 0,
            }),
            rebuild_gate: Mutex::new(()),
        }
    }

    /// Handle with no entries; the first miss will trigger a rebuild
    pub fn empty() -> Self {
        Self::new(RegistryIndex::default())
    }

    /// Current index snapshot
    pub fn snapshot(&self) -> Arc<RegistryIndex> {
        Arc::clone(&self.current.read().index)
    }

    /// Snapshot together with the generation it belongs to
    pub fn snapshot_with_generation(&self) -> (Arc<RegistryIndex>, u64) {
        let current = self.current.read();
        (Arc::clone(&current.index), current.generation)
    }

    pub fn generation(&self) -> u64 {
        self.current.read().generation
    }

    /// Swap in a new index and return the new generation
    pub fn replace(&self, index: RegistryIndex) -> u64 {
        let mut current = self.current.write();
        current.index = Arc::new(index);
        current.generation += 1;
        debug!(
            "Registry index replaced (generation {}, {} entries)",
            current.generation,
            current.index.len()
        );
        current.generation
    }

    /// Run `rebuild` unless the index moved past `observed_generation`
    ///
    /// Only one rebuild runs at a time. A caller that waited on the gate while
    /// another caller replaced the index gets [`RebuildTicket::AlreadyRebuilt`]
    /// without running its closure. On error the index is left untouched.
    pub fn rebuild_once<F, E>(&self, observed_generation: u64, rebuild: F) -> Result<RebuildTicket, E>
    where
        F: FnOnce() -> Result<RegistryIndex, E>,
    {
        let _gate = self.rebuild_gate.lock();

        let generation = self.generation();
        if generation != observed_generation {
            debug!(
                "Skipping rebuild: index already at generation {} (observed {})",
                generation, observed_generation
            );
            return Ok(RebuildTicket::AlreadyRebuilt(generation));
        }

        let index = rebuild()?;
        Ok(RebuildTicket::Rebuilt(self.replace(index)))
    }
}

impl Default for SharedIndex {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InterfaceType, PluginKey, RegistryEntry};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn one_reader() -> RegistryIndex {
        RegistryIndex::from_entries([RegistryEntry::new(
            InterfaceType::Code,
            "readers",
            PluginKey::name("foo"),
            "pkgA",
            "r/foo.ext",
        )])
    }

    #[test]
    fn test_replace_bumps_generation_and_keeps_old_snapshot() {
        let shared = SharedIndex::empty();
        let before = shared.snapshot();
        assert_eq!(shared.generation(), 0);

        assert_eq!(shared.replace(one_reader()), 1);
        assert!(before.is_empty());
        assert_eq!(shared.snapshot().len(), 1);
    }

    #[test]
    fn test_stale_observer_skips_rebuild() {
        let shared = SharedIndex::empty();
        let (_, observed) = shared.snapshot_with_generation();
        shared.replace(one_reader());

        let ran = AtomicUsize::new(0);
        let ticket = shared.rebuild_once(observed, || {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(RegistryIndex::default())
        });
        assert_eq!(ticket, Ok(RebuildTicket::AlreadyRebuilt(1)));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(shared.snapshot().len(), 1);
    }

    #[test]
    fn test_failed_rebuild_leaves_index_alone() {
        let shared = SharedIndex::new(one_reader());
        let result = shared.rebuild_once(0, || Err("indexer exited with 1".to_string()));
        assert!(result.is_err());
        assert_eq!(shared.generation(), 0);
        assert_eq!(shared.snapshot().len(), 1);
    }

    #[test]
    fn test_concurrent_misses_share_one_rebuild() {
        let shared = Arc::new(SharedIndex::empty());
        let rebuilds = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = Arc::clone(&shared);
                let rebuilds = Arc::clone(&rebuilds);
                thread::spawn(move || {
                    shared.rebuild_once(0, || {
                        rebuilds.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, String>(one_reader())
                    })
                })
            })
            .collect();

        for handle in handles {
            let ticket = handle.join();
            assert!(ticket.is_ok_and(|t| t.is_ok_and(|t| t.generation() == 1)));
        }
        assert_eq!(rebuilds.load(Ordering::SeqCst), 1);
    }
}
