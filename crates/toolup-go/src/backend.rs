use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::process::Command;

use toolup_backend::{
    ActiveToolchain, BackendCapabilities, BackendError, InstallHandle, InstallOutcome,
    InstallPath, InstalledVersion, ToolBinary, ToolchainBackend, ToolchainVersion,
    package_version,
};
use toolup_platform::{Homebrew, capture};

use crate::releases::fetch_latest;
use crate::sdk::{SdkRoot, go_binary};
use crate::tools::list_tool_binaries;
use crate::version::{parse_go_version, parse_module_path, sdk_name};

const BREW_HANDLE_PREFIX: &str = "brew:";

#[derive(Debug, Clone)]
pub struct GoBackend {
    go: PathBuf,
    sdk: SdkRoot,
    homebrew: Option<Homebrew>,
    client: reqwest::Client,
}

impl GoBackend {
    #[must_use]
    pub fn new(go: PathBuf, sdk_dir: PathBuf, client: reqwest::Client) -> Self {
        Self {
            go,
            sdk: SdkRoot::new(sdk_dir),
            homebrew: None,
            client,
        }
    }

    #[must_use]
    pub fn with_homebrew(mut self, homebrew: Homebrew) -> Self {
        self.homebrew = Some(homebrew);
        self
    }

    /// The `go` a shell would run right now.
    fn selected_go(&self) -> PathBuf {
        pick_go(which::which("go").ok(), self.sdk.current_go(), &self.go)
    }

    /// After repointing `~/sdk/current`, a shell must actually reach it.
    fn ensure_sdk_reachable(&self, on_path: Option<&Path>) -> Result<(), BackendError> {
        match on_path {
            Some(go) if !self.sdk.is_current(go) => Err(BackendError::unexpected_output(
                "go activate",
                format!(
                    "{} comes before {} on PATH",
                    go.display(),
                    self.sdk.current_bin().display()
                ),
            )),
            _ => Ok(()),
        }
    }

    async fn go_output(go: &Path, args: &[&str]) -> Result<String, BackendError> {
        let mut cmd = Command::new(go);
        cmd.args(args);
        Ok(capture(cmd).await?.stdout)
    }

    async fn gobin(&self) -> Result<PathBuf, BackendError> {
        let go = self.selected_go();
        let gobin = Self::go_output(&go, &["env", "GOBIN"]).await?;
        if !gobin.trim().is_empty() {
            return Ok(PathBuf::from(gobin.trim()));
        }
        let gopath = Self::go_output(&go, &["env", "GOPATH"]).await?;
        let first = std::env::split_paths(gopath.trim())
            .next()
            .filter(|path| !path.as_os_str().is_empty())
            .ok_or_else(|| BackendError::unexpected_output("go env GOPATH", "empty"))?;
        Ok(first.join("bin"))
    }

    /// Installed Homebrew `go` / `go@X.Y` kegs with their newest version.
    async fn brew_kegs(&self) -> Vec<(String, ToolchainVersion)> {
        let Some(homebrew) = &self.homebrew else {
            return Vec::new();
        };
        let listed = match homebrew.list_versions(None).await {
            Ok(listed) => listed,
            Err(error) => {
                warn!("Cannot list Homebrew formulae: {error}");
                return Vec::new();
            }
        };
        listed
            .into_iter()
            .filter(|(formula, _)| formula == "go" || formula.starts_with("go@"))
            .filter_map(|(formula, versions)| {
                let newest = versions
                    .iter()
                    .filter_map(|version| package_version(version))
                    .max()?;
                Some((formula, newest))
            })
            .collect()
    }

    fn is_brew_path(path: &Path) -> bool {
        path.components().any(|component| component.as_os_str() == "Cellar")
    }
}

/// PATH wins, then `~/sdk/current`, then the binary found at detection.
fn pick_go(on_path: Option<PathBuf>, sdk_current: Option<PathBuf>, detected: &Path) -> PathBuf {
    on_path
        .or(sdk_current)
        .unwrap_or_else(|| detected.to_path_buf())
}

#[async_trait]
impl ToolchainBackend for GoBackend {
    fn name(&self) -> &'static str {
        "go"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            gated: false,
            tool_inventory: true,
        }
    }

    async fn detect(&self) -> Result<Option<ActiveToolchain>, BackendError> {
        let go = self.selected_go();
        let goroot = Self::go_output(&go, &["env", "GOROOT"]).await?;
        let version = parse_go_version(&Self::go_output(&go, &["version"]).await?)?;

        let goroot = PathBuf::from(goroot.trim());
        let binary = go_binary(&goroot);
        let path = std::fs::canonicalize(&binary).unwrap_or(binary);
        debug!("go {version} at {}", path.display());

        Ok(Some(ActiveToolchain {
            name: sdk_name(&version),
            version,
            path,
        }))
    }

    async fn list_installed(&self) -> Result<Vec<InstalledVersion>, BackendError> {
        let active = self.detect().await.ok().flatten();
        let is_active = |version: &ToolchainVersion| {
            active
                .as_ref()
                .is_some_and(|active| active.version == *version)
        };

        let mut installed: Vec<InstalledVersion> = self
            .brew_kegs()
            .await
            .into_iter()
            .map(|(formula, version)| InstalledVersion {
                is_active: is_active(&version),
                handle: InstallHandle::Id(format!("{BREW_HANDLE_PREFIX}{formula}")),
                name: formula,
                version: Some(version),
            })
            .collect();

        installed.extend(self.sdk.list().into_iter().map(|(name, version, path)| {
            InstalledVersion {
                is_active: is_active(&version),
                name,
                version: Some(version),
                handle: InstallHandle::Path(path),
            }
        }));
        Ok(installed)
    }

    async fn resolve_latest(&self) -> Result<ToolchainVersion, BackendError> {
        fetch_latest(&self.client).await
    }

    fn package_variants(&self, version: &ToolchainVersion) -> Vec<String> {
        if self.homebrew.is_none() {
            return Vec::new();
        }
        vec![
            format!("go@{}.{}", version.major(), version.minor()),
            "go".to_string(),
            "golang".to_string(),
        ]
    }

    fn owned_by_package_manager(&self, active: &ActiveToolchain) -> bool {
        self.homebrew.is_some() && Self::is_brew_path(&active.path)
    }

    /// Slow path: build the `goX.Y.Z` wrapper and let it download the SDK.
    async fn install(&self, version: &ToolchainVersion) -> Result<InstallOutcome, BackendError> {
        if self.sdk.is_installed(version) {
            return Ok(InstallOutcome::AlreadyPresent);
        }
        let name = sdk_name(version);
        let go = self.selected_go();

        info!("Building golang.org/dl/{name}");
        Self::go_output(&go, &["install", &format!("golang.org/dl/{name}@latest")]).await?;

        let wrapper = self.gobin().await?.join(&name);
        let mut cmd = Command::new(&wrapper);
        cmd.arg("download");
        capture(cmd).await?;

        if !self.sdk.is_installed(version) {
            return Err(BackendError::unexpected_output(
                "go download",
                format!("{} missing after download", self.sdk.install_dir(version).display()),
            ));
        }
        Ok(InstallOutcome::Installed(InstallPath::VersionManager))
    }

    async fn activate(&self, version: &ToolchainVersion) -> Result<(), BackendError> {
        if self.sdk.is_installed(version) {
            self.sdk.select(version)?;
            return self.ensure_sdk_reachable(which::which("go").ok().as_deref());
        }

        let Some(homebrew) = &self.homebrew else {
            return Err(BackendError::unexpected_output(
                "go activate",
                format!("go {version} is not installed"),
            ));
        };
        let keg = self
            .brew_kegs()
            .await
            .into_iter()
            .find(|(_, installed)| installed == version)
            .map(|(formula, _)| formula)
            .ok_or_else(|| {
                BackendError::unexpected_output(
                    "go activate",
                    format!("no Homebrew keg provides go {version}"),
                )
            })?;
        homebrew.link(&keg).await?;
        Ok(())
    }

    async fn uninstall(&self, installed: &InstalledVersion) -> Result<(), BackendError> {
        match &installed.handle {
            InstallHandle::Path(path) => {
                self.sdk.remove(path).await?;
                if let Ok(gobin) = self.gobin().await {
                    let wrapper = gobin.join(&installed.name);
                    if wrapper.exists() {
                        tokio::fs::remove_file(&wrapper).await?;
                    }
                }
                Ok(())
            }
            InstallHandle::Id(id) => {
                let (Some(formula), Some(homebrew)) =
                    (id.strip_prefix(BREW_HANDLE_PREFIX), &self.homebrew)
                else {
                    return Err(BackendError::Unsupported {
                        operation: "uninstall of an unknown go install",
                    });
                };
                homebrew.uninstall(formula).await?;
                Ok(())
            }
        }
    }

    async fn list_tools(&self) -> Result<Vec<ToolBinary>, BackendError> {
        let gobin = self.gobin().await?;
        debug!("Listing tools in {}", gobin.display());
        Ok(list_tool_binaries(&gobin))
    }

    async fn tool_origin(&self, tool: &ToolBinary) -> Result<Option<String>, BackendError> {
        let path = tool.path.to_string_lossy();
        match Self::go_output(&self.selected_go(), &["version", "-m", &path]).await {
            Ok(output) => Ok(parse_module_path(&output)),
            Err(BackendError::CommandFailed { .. }) => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn reinstall_tool(&self, package: &str) -> Result<(), BackendError> {
        Self::go_output(&self.selected_go(), &["install", &format!("{package}@latest")]).await?;
        Ok(())
    }
}
