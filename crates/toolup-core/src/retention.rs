use log::{debug, info, warn};
use toolup_backend::{
    ActiveToolchain, BackendError, InstalledVersion, ToolchainBackend, ToolchainVersion,
    normalize_version_text,
};

use crate::guard::Guard;
use crate::protection::ProtectionClassifier;

/// Which installed versions a sweep must leave alone.
#[derive(Debug, Clone, Default)]
pub struct RetentionPolicy {
    pub enabled: bool,
    pub active: Option<ActiveToolchain>,
    pub keep: Vec<String>,
}

/// Split a comma-separated keep list into normalized identifiers.
#[must_use]
pub fn normalize_keep_list(raw: &str) -> Vec<String> {
    let mut keep: Vec<String> = raw
        .split(',')
        .map(normalize_version_text)
        .filter(|entry| !entry.is_empty())
        .collect();
    keep.dedup();
    keep
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepPlan {
    pub keep: Vec<InstalledVersion>,
    pub remove: Vec<InstalledVersion>,
    /// Not in the keep set but living under a protected root.
    pub protected: Vec<InstalledVersion>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepReport {
    Disabled,
    SkippedProtected,
    Swept {
        kept: Vec<String>,
        removed: Vec<String>,
        failed: Vec<(String, BackendError)>,
        protected: Vec<String>,
    },
    Failed(BackendError),
}

impl SweepReport {
    #[must_use]
    pub fn removed(&self) -> &[String] {
        match self {
            Self::Swept { removed, .. } => removed,
            _ => &[],
        }
    }
}

/// Partition `installed` into entries to keep and entries to uninstall.
#[must_use]
pub fn plan_sweep(
    installed: Vec<InstalledVersion>,
    policy: &RetentionPolicy,
    implicit_defaults: &[&str],
    classifier: &ProtectionClassifier,
) -> SweepPlan {
    let keep_versions: Vec<ToolchainVersion> = policy
        .keep
        .iter()
        .filter_map(|entry| entry.parse().ok())
        .collect();

    let mut plan = SweepPlan::default();
    for entry in installed {
        let name = normalize_version_text(&entry.name);
        let is_implicit = implicit_defaults
            .iter()
            .any(|default| default.eq_ignore_ascii_case(&entry.name));
        let is_active = entry.is_active
            || policy.active.as_ref().is_some_and(|active| {
                active.name == entry.name || entry.version.as_ref() == Some(&active.version)
            });
        let is_listed = policy.keep.contains(&name)
            || entry
                .version
                .as_ref()
                .is_some_and(|version| keep_versions.contains(version));

        if is_implicit || is_active || is_listed {
            plan.keep.push(entry);
        } else if entry.path().is_some_and(|path| classifier.is_protected(path)) {
            plan.protected.push(entry);
        } else {
            plan.remove.push(entry);
        }
    }
    plan
}

/// Uninstall every installed version outside the keep set.
///
/// A failed uninstall is recorded and the sweep moves on.
pub async fn sweep(
    backend: &dyn ToolchainBackend,
    policy: &RetentionPolicy,
    classifier: &ProtectionClassifier,
    guard: &Guard,
) -> SweepReport {
    let name = backend.name();
    if !policy.enabled {
        debug!("{name}: cleanup disabled");
        return SweepReport::Disabled;
    }
    if policy
        .active
        .as_ref()
        .is_some_and(|active| classifier.is_protected(&active.path))
    {
        info!("{name}: active toolchain is protected, not sweeping");
        return SweepReport::SkippedProtected;
    }

    let installed = match guard
        .operation("list installed versions", backend.list_installed())
        .await
    {
        Ok(installed) => installed,
        Err(error) => {
            warn!("{name}: cannot list installed versions: {error}");
            return SweepReport::Failed(error);
        }
    };

    let plan = plan_sweep(installed, policy, backend.implicit_defaults(), classifier);
    let mut removed = Vec::new();
    let mut failed = Vec::new();

    for entry in &plan.remove {
        if guard.is_cancelled() {
            failed.push((
                entry.name.clone(),
                BackendError::Cancelled {
                    operation: "uninstall",
                },
            ));
            continue;
        }
        match guard.operation("uninstall", backend.uninstall(entry)).await {
            Ok(()) => {
                info!("{name}: removed {}", entry.name);
                removed.push(entry.name.clone());
            }
            Err(error) => {
                warn!("{name}: failed to remove {}: {error}", entry.name);
                failed.push((entry.name.clone(), error));
            }
        }
    }

    SweepReport::Swept {
        kept: plan.keep.into_iter().map(|entry| entry.name).collect(),
        removed,
        failed,
        protected: plan.protected.into_iter().map(|entry| entry.name).collect(),
    }
}
