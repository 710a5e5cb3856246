use std::collections::BTreeMap;

use crate::types::ActiveToolchain;

/// Which toolchain each backend resolves to during a run.
///
/// Owned by the orchestrator and updated only after an activation has been
/// verified, instead of being inferred from ambient shell state.
#[derive(Debug, Clone, Default)]
pub struct ActiveToolchainState {
    entries: BTreeMap<String, ActiveToolchain>,
}

impl ActiveToolchainState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, backend: &str) -> Option<&ActiveToolchain> {
        self.entries.get(backend)
    }

    /// Record the active toolchain, returning the previous one.
    pub fn record(&mut self, backend: &str, active: ActiveToolchain) -> Option<ActiveToolchain> {
        self.entries.insert(backend.to_string(), active)
    }

    pub fn forget(&mut self, backend: &str) -> Option<ActiveToolchain> {
        self.entries.remove(backend)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ActiveToolchain)> {
        self.entries.iter().map(|(name, active)| (name.as_str(), active))
    }
}
