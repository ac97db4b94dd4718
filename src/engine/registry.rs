// src/engine/registry.rs

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::state::RunView;
use crate::types::RunId;

/// Runs known to an [`super::Engine`], kept queryable until purged.
///
/// The engine never evicts on its own; retention is up to the caller.
#[derive(Debug, Clone, Default)]
pub struct RunRegistry {
    runs: Arc<RwLock<HashMap<RunId, RunView>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, view: RunView) {
        self.runs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(view.run_id(), view);
    }

    pub fn get(&self, run_id: RunId) -> Option<RunView> {
        self.runs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&run_id)
            .cloned()
    }

    pub fn run_ids(&self) -> Vec<RunId> {
        self.runs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.runs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop a finished run. Runs still in progress are kept.
    ///
    /// Returns `true` if the run was removed.
    pub fn purge(&self, run_id: RunId) -> bool {
        let mut runs = self.runs.write().unwrap_or_else(PoisonError::into_inner);
        match runs.get(&run_id) {
            Some(view) if view.is_finished() => {
                runs.remove(&run_id);
                debug!(run_id = %run_id, "run purged");
                true
            }
            _ => false,
        }
    }
}
