//! Lookup snapshot and its shared, invalidatable holder.
//!
//! # Responsibility
//! - Build id→name, id→description and name→id maps from active panels.
//! - Hand out the current snapshot, loading it on first use.
//!
//! # Invariants
//! - Readers only ever see a whole snapshot, never a half-built map.
//! - `invalidate` bumps the generation; a load that started under an older
//!   generation is returned to its caller but not installed.
//! - A poisoned lock is recovered, not propagated as a panic.

use crate::model::panel::{Panel, PanelId};
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Immutable set of lookup maps built from one active-panel listing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PanelLookupSnapshot {
    id_to_name: HashMap<PanelId, String>,
    id_to_description: HashMap<PanelId, String>,
    name_to_id: HashMap<String, PanelId>,
}

impl PanelLookupSnapshot {
    /// Builds all three maps from the given panels. Unsaved panels are skipped.
    pub fn from_panels(panels: &[Panel]) -> Self {
        let mut snapshot = Self::default();
        for panel in panels {
            let Some(id) = panel.id else {
                continue;
            };
            snapshot.id_to_name.insert(id, panel.panel_name.clone());
            snapshot
                .id_to_description
                .insert(id, panel.description.clone());
            snapshot.name_to_id.insert(panel.panel_name.clone(), id);
        }
        snapshot
    }

    pub fn name_for_id(&self, id: PanelId) -> Option<&str> {
        self.id_to_name.get(&id).map(String::as_str)
    }

    pub fn description_for_id(&self, id: PanelId) -> Option<&str> {
        self.id_to_description.get(&id).map(String::as_str)
    }

    /// Exact (case-sensitive) name match.
    pub fn id_for_name(&self, name: &str) -> Option<PanelId> {
        self.name_to_id.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.id_to_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_name.is_empty()
    }
}

#[derive(Debug, Default)]
struct CacheState {
    generation: u64,
    snapshot: Option<Arc<PanelLookupSnapshot>>,
}

/// Process-wide panel lookup cache, shared between repositories via `Arc`.
#[derive(Debug, Default)]
pub struct PanelLookupCache {
    state: RwLock<CacheState>,
}

impl PanelLookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current snapshot, rebuilding it with `load` when empty.
    ///
    /// `load` runs without holding the lock. If the cache is invalidated
    /// while it runs, the result is still returned to this caller but not
    /// installed, so the next read reloads.
    pub fn snapshot_or_load<E>(
        &self,
        load: impl FnOnce() -> Result<Vec<Panel>, E>,
    ) -> Result<Arc<PanelLookupSnapshot>, E> {
        let generation = {
            let state = self.read_state();
            if let Some(snapshot) = state.snapshot.as_ref() {
                return Ok(Arc::clone(snapshot));
            }
            state.generation
        };

        let panels = load()?;
        let rebuilt = Arc::new(PanelLookupSnapshot::from_panels(&panels));

        let mut state = self.write_state();
        if let Some(existing) = state.snapshot.as_ref() {
            return Ok(Arc::clone(existing));
        }
        if state.generation == generation {
            state.snapshot = Some(Arc::clone(&rebuilt));
            debug!(
                "event=lookup_cache_load module=cache status=ok generation={} entries={}",
                generation,
                rebuilt.len()
            );
        } else {
            debug!(
                "event=lookup_cache_load module=cache status=discarded generation={} current_generation={}",
                generation, state.generation
            );
        }
        Ok(rebuilt)
    }

    /// Drops all three lookup maps; the next lookup rebuilds them.
    pub fn invalidate(&self) {
        let mut state = self.write_state();
        state.generation = state.generation.wrapping_add(1);
        state.snapshot = None;
        debug!(
            "event=lookup_cache_invalidate module=cache status=ok generation={}",
            state.generation
        );
    }

    pub fn is_loaded(&self) -> bool {
        self.read_state().snapshot.is_some()
    }

    // A panicking loader never holds the lock, so a poisoned lock still
    // guards a consistent state.
    fn read_state(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::{PanelLookupCache, PanelLookupSnapshot};
    use crate::model::panel::Panel;
    use std::cell::Cell;
    use std::convert::Infallible;
    use std::sync::Arc;
    use std::thread;

    fn active_panels() -> Vec<Panel> {
        vec![
            Panel::with_id(1, "CBC", "Complete blood count", "1"),
            Panel::with_id(2, "Lipid", "Lipid profile", "1"),
            Panel::new("Unsaved", "never persisted", "1"),
        ]
    }

    #[test]
    fn snapshot_maps_are_built_together() {
        let snapshot = PanelLookupSnapshot::from_panels(&active_panels());
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.name_for_id(1), Some("CBC"));
        assert_eq!(snapshot.description_for_id(2), Some("Lipid profile"));
        assert_eq!(snapshot.id_for_name("Lipid"), Some(2));
        assert_eq!(snapshot.id_for_name("Unsaved"), None);
        assert_eq!(snapshot.id_for_name("cbc"), None);
    }

    #[test]
    fn loads_once_until_invalidated() {
        let cache = PanelLookupCache::new();
        let loads = Cell::new(0);
        let load = || {
            loads.set(loads.get() + 1);
            Ok::<_, Infallible>(active_panels())
        };

        cache.snapshot_or_load(load).unwrap();
        cache.snapshot_or_load(load).unwrap();
        assert_eq!(loads.get(), 1);
        assert!(cache.is_loaded());

        cache.invalidate();
        assert!(!cache.is_loaded());
        let snapshot = cache.snapshot_or_load(load).unwrap();
        assert_eq!(loads.get(), 2);
        assert_eq!(snapshot.name_for_id(1), Some("CBC"));
    }

    #[test]
    fn load_error_leaves_cache_empty() {
        let cache = PanelLookupCache::new();
        let result = cache.snapshot_or_load(|| Err::<Vec<Panel>, _>("db down"));
        assert_eq!(result.unwrap_err(), "db down");
        assert!(!cache.is_loaded());
    }

    #[test]
    fn snapshot_loaded_across_invalidation_is_not_installed() {
        let cache = PanelLookupCache::new();
        let snapshot = cache
            .snapshot_or_load(|| {
                cache.invalidate();
                Ok::<_, Infallible>(active_panels())
            })
            .unwrap();

        assert_eq!(snapshot.len(), 2);
        assert!(!cache.is_loaded());
    }

    #[test]
    fn concurrent_readers_and_invalidations_see_whole_snapshots() {
        let cache = Arc::new(PanelLookupCache::new());
        let mut handles = Vec::new();
        for worker in 0..4 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for round in 0..200 {
                    if (worker + round) % 7 == 0 {
                        cache.invalidate();
                    }
                    let snapshot = cache
                        .snapshot_or_load(|| Ok::<_, Infallible>(active_panels()))
                        .unwrap();
                    assert_eq!(snapshot.len(), 2);
                    assert_eq!(snapshot.id_for_name("CBC"), Some(1));
                    assert_eq!(snapshot.description_for_id(1), Some("Complete blood count"));
                }
            }));
        }
        for handle in handles {
            handle.join().expect("worker should not panic");
        }
    }
}
