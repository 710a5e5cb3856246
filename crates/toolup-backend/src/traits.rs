use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::BackendError;
use crate::types::{
    ActiveToolchain, InstallOutcome, InstalledVersion, PackageRequirement, ToolBinary,
    ToolchainVersion,
};

/// Result of looking for a backend's version manager on this machine.
#[derive(Debug, Clone, Default)]
pub struct BackendDetection {
    pub found: bool,
    pub path: Option<PathBuf>,
    pub version: Option<String>,
    pub in_path: bool,
    pub data_dir: Option<PathBuf>,
}

/// Operator choices that change how a backend is constructed.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackendOptions {
    pub unstable_channel: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BackendCapabilities {
    /// Upgrades can break installed packages and must pass the compatibility gate.
    pub gated: bool,
    /// The toolchain has a global inventory of built tools that can be refreshed.
    pub tool_inventory: bool,
}

#[async_trait]
pub trait BackendProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn display_name(&self) -> &'static str;
    async fn detect(&self) -> BackendDetection;
    fn create_backend(
        &self,
        detection: &BackendDetection,
        options: BackendOptions,
    ) -> Box<dyn ToolchainBackend>;
}

/// Uniform capability set of one toolchain family.
///
/// Implementations own all parsing of their tool's human-readable output;
/// callers only ever see typed values.
#[async_trait]
pub trait ToolchainBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> BackendCapabilities;

    /// Key under which the "latest available" lookup is cached.
    fn cache_key(&self) -> String {
        self.name().to_string()
    }

    /// Installed entries that are never counted as versions (`system`,
    /// channel names) and therefore never swept.
    fn implicit_defaults(&self) -> &'static [&'static str] {
        &[]
    }

    /// The toolchain currently selected, or `None` when nothing is active.
    async fn detect(&self) -> Result<Option<ActiveToolchain>, BackendError>;

    async fn list_installed(&self) -> Result<Vec<InstalledVersion>, BackendError>;

    /// Newest available version. Usually slow; callers cache it.
    async fn resolve_latest(&self) -> Result<ToolchainVersion, BackendError>;

    async fn install(&self, version: &ToolchainVersion) -> Result<InstallOutcome, BackendError>;

    async fn activate(&self, version: &ToolchainVersion) -> Result<(), BackendError>;

    async fn uninstall(&self, installed: &InstalledVersion) -> Result<(), BackendError>;

    /// System package names that can provide `version`, most specific first.
    fn package_variants(&self, _version: &ToolchainVersion) -> Vec<String> {
        Vec::new()
    }

    /// `true` when the active toolchain came from a package manager, which
    /// then owns its upgrades.
    fn owned_by_package_manager(&self, _active: &ActiveToolchain) -> bool {
        false
    }

    async fn installed_packages(&self) -> Result<Vec<PackageRequirement>, BackendError> {
        Ok(Vec::new())
    }

    async fn list_tools(&self) -> Result<Vec<ToolBinary>, BackendError> {
        Err(BackendError::Unsupported {
            operation: "list_tools",
        })
    }

    /// Package identity a tool binary was built from, when recoverable.
    async fn tool_origin(&self, _tool: &ToolBinary) -> Result<Option<String>, BackendError> {
        Err(BackendError::Unsupported {
            operation: "tool_origin",
        })
    }

    async fn reinstall_tool(&self, _package: &str) -> Result<(), BackendError> {
        Err(BackendError::Unsupported {
            operation: "reinstall_tool",
        })
    }
}
