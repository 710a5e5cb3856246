use std::collections::BTreeMap;

use async_trait::async_trait;
use toolup_platform::Homebrew;

use crate::error::BackendError;
use crate::types::ToolchainVersion;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageOutcome {
    Installed,
    Upgraded { from: String, to: String },
    AlreadyCurrent,
}

/// Client for a system package manager that can provide toolchains.
#[async_trait]
pub trait PackageManager: Send + Sync {
    fn name(&self) -> &'static str;

    async fn list_installed(&self) -> Result<BTreeMap<String, Vec<String>>, BackendError>;

    /// Install `package`, upgrading it instead when it is already present.
    async fn install(&self, package: &str) -> Result<PackageOutcome, BackendError>;

    async fn upgrade(&self, package: &str) -> Result<PackageOutcome, BackendError>;

    /// `true` when an installed copy of `package` is exactly `version`.
    /// A successful install can still leave an older release behind when
    /// the package repository has not caught up yet.
    async fn provides(
        &self,
        package: &str,
        version: &ToolchainVersion,
    ) -> Result<bool, BackendError> {
        let listed = self.list_installed().await?;
        Ok(listed.get(package).is_some_and(|versions| {
            versions
                .iter()
                .filter_map(|text| package_version(text))
                .any(|installed| installed == *version)
        }))
    }
}

/// Parse a package manager's version string, dropping a Homebrew rebuild
/// suffix such as the `_1` in `1.22.1_1`.
#[must_use]
pub fn package_version(text: &str) -> Option<ToolchainVersion> {
    let release = text.split_once('_').map_or(text, |(release, _)| release);
    release.parse().ok()
}

#[async_trait]
impl PackageManager for Homebrew {
    fn name(&self) -> &'static str {
        "homebrew"
    }

    async fn list_installed(&self) -> Result<BTreeMap<String, Vec<String>>, BackendError> {
        Ok(self.list_versions(None).await?)
    }

    async fn install(&self, package: &str) -> Result<PackageOutcome, BackendError> {
        let before = self.list_versions(Some(package)).await?;
        if before.contains_key(package) {
            return PackageManager::upgrade(self, package).await;
        }

        Homebrew::install(self, package).await?;
        Ok(PackageOutcome::Installed)
    }

    async fn upgrade(&self, package: &str) -> Result<PackageOutcome, BackendError> {
        let before = self
            .list_versions(Some(package))
            .await?
            .remove(package)
            .unwrap_or_default();
        if before.is_empty() {
            Homebrew::install(self, package).await?;
            return Ok(PackageOutcome::Installed);
        }

        Homebrew::upgrade(self, package).await?;
        let after = self
            .list_versions(Some(package))
            .await?
            .remove(package)
            .unwrap_or_default();

        Ok(package_outcome(&before, &after))
    }
}

fn package_outcome(before: &[String], after: &[String]) -> PackageOutcome {
    if before == after {
        return PackageOutcome::AlreadyCurrent;
    }
    match (before.last(), after.last()) {
        (Some(from), Some(to)) => PackageOutcome::Upgraded {
            from: from.clone(),
            to: to.clone(),
        },
        _ => PackageOutcome::Installed,
    }
}
