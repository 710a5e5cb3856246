//! Read-only reporting used by `verify` and `versions`. Nothing here
//! installs, activates or removes anything, and nothing hits the network.

use std::time::SystemTime;

use log::debug;
use toolup_backend::{ActiveToolchain, BackendError, FailureKind, ToolchainBackend, ToolchainVersion};

use crate::cache::{CacheLookup, VersionCache};
use crate::guard::Guard;
use crate::protection::ProtectionClassifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub active: ActiveToolchain,
    pub protected: bool,
    pub newest_installed: Option<ToolchainVersion>,
    pub cached_latest: Option<ToolchainVersion>,
    pub installed_count: usize,
}

impl StatusReport {
    /// `true` unless a newer version is installed but not selected.
    #[must_use]
    pub fn is_newest_installed(&self) -> bool {
        self.newest_installed
            .as_ref()
            .is_none_or(|newest| *newest <= self.active.version)
    }

    #[must_use]
    pub fn update_available(&self) -> bool {
        self.cached_latest
            .as_ref()
            .is_some_and(|latest| *latest > self.active.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendStatus {
    Absent,
    NothingActive { installed_count: usize },
    Active(StatusReport),
    Failed(BackendError),
}

pub async fn verify_backend(
    backend: &dyn ToolchainBackend,
    cache: &VersionCache,
    classifier: &ProtectionClassifier,
    guard: &Guard,
) -> BackendStatus {
    let active = match guard.operation("detect", backend.detect()).await {
        Ok(active) => active,
        Err(error) if error.kind() == FailureKind::Unavailable => return BackendStatus::Absent,
        Err(error) => return BackendStatus::Failed(error),
    };

    let installed = match guard
        .operation("list installed versions", backend.list_installed())
        .await
    {
        Ok(installed) => installed,
        Err(error) => {
            debug!("{}: cannot list installed versions: {error}", backend.name());
            Vec::new()
        }
    };
    let installed_count = installed
        .iter()
        .filter(|entry| entry.version.is_some())
        .count();

    let Some(active) = active else {
        return BackendStatus::NothingActive { installed_count };
    };

    let newest_installed = installed.into_iter().filter_map(|entry| entry.version).max();
    let cached_latest = match cache.lookup(&backend.cache_key(), SystemTime::now()) {
        CacheLookup::Fresh { value, .. } => value.parse().ok(),
        CacheLookup::Stale { .. } | CacheLookup::Missing => None,
    };

    BackendStatus::Active(StatusReport {
        protected: classifier.is_protected(&active.path),
        active,
        newest_installed,
        cached_latest,
        installed_count,
    })
}

/// Dense per-backend listing; every count is optional because not every
/// backend can answer it cheaply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    pub backend: String,
    pub absent: bool,
    pub version: Option<ToolchainVersion>,
    pub installed: Option<usize>,
    pub packages: Option<usize>,
    pub tools: Option<usize>,
}

pub async fn inventory(backend: &dyn ToolchainBackend, guard: &Guard) -> Inventory {
    let mut inventory = Inventory {
        backend: backend.name().to_string(),
        ..Inventory::default()
    };

    match guard.operation("detect", backend.detect()).await {
        Ok(active) => inventory.version = active.map(|active| active.version),
        Err(error) if error.kind() == FailureKind::Unavailable => {
            inventory.absent = true;
            return inventory;
        }
        Err(error) => debug!("{}: detection failed: {error}", backend.name()),
    }

    inventory.installed = guard
        .operation("list installed versions", backend.list_installed())
        .await
        .ok()
        .map(|installed| installed.iter().filter(|entry| entry.version.is_some()).count());

    let capabilities = backend.capabilities();
    if capabilities.gated {
        inventory.packages = guard
            .operation("list packages", backend.installed_packages())
            .await
            .ok()
            .map(|packages| packages.len());
    }
    if capabilities.tool_inventory {
        inventory.tools = guard
            .operation("list tools", backend.list_tools())
            .await
            .ok()
            .map(|tools| tools.len());
    }

    inventory
}
