//! Copy-on-write registry of configured hooks.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

use crate::models::Hook;

/// Immutable view of the registry taken at the start of a dispatch cycle.
pub type HookSnapshot = Arc<Vec<Arc<Hook>>>;

/// Ordered hook list, replaced wholesale on save.
///
/// Readers clone the current [`HookSnapshot`]; a save swaps in a new one, so
/// in-flight deliveries keep the hooks they started with.
#[derive(Debug, Default)]
pub struct HookRegistry {
    hooks: RwLock<HookSnapshot>,
}

impl HookRegistry {
    pub fn new(hooks: Vec<Hook>) -> Self {
        Self {
            hooks: RwLock::new(freeze(hooks)),
        }
    }

    pub fn snapshot(&self) -> HookSnapshot {
        self.hooks.read().clone()
    }

    /// Swap in a new hook list, assigning ids where missing.
    pub fn replace(&self, hooks: Vec<Hook>) -> HookSnapshot {
        let snapshot = freeze(hooks);
        *self.hooks.write() = snapshot.clone();
        snapshot
    }

    pub fn ids(&self) -> HashSet<String> {
        self.snapshot().iter().map(|hook| hook.id.clone()).collect()
    }
}

fn freeze(hooks: Vec<Hook>) -> HookSnapshot {
    let mut seen = HashSet::new();
    Arc::new(
        hooks
            .into_iter()
            .map(|mut hook| {
                hook.ensure_id();
                // Duplicate ids would share milestone and cooldown state.
                if !seen.insert(hook.id.clone()) {
                    hook.id = uuid::Uuid::new_v4().to_string();
                    seen.insert(hook.id.clone());
                }
                Arc::new(hook)
            })
            .collect(),
    )
}
