use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, warn};
use tokio::process::Command;

use toolup_backend::{
    ActiveToolchain, BackendCapabilities, BackendError, ConstraintDialect, InstallHandle,
    InstallOutcome, InstallPath, InstalledVersion, PackageRequirement, ToolchainBackend,
    ToolchainVersion, normalize_version_text,
};
use toolup_platform::capture;

use crate::version::{FnmListEntry, parse_current, parse_installed, parse_manifest, parse_remote_lts};

/// Packages shipped inside every Node.js release.
const BUNDLED_PACKAGES: &[&str] = &["npm", "corepack"];

#[derive(Debug, Clone)]
pub struct FnmBackend {
    path: PathBuf,
    fnm_dir: Option<PathBuf>,
}

impl FnmBackend {
    #[must_use]
    pub fn new(path: PathBuf, fnm_dir: Option<PathBuf>) -> Self {
        Self { path, fnm_dir }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn fnm_dir(&self) -> Option<&Path> {
        self.fnm_dir.as_deref()
    }

    fn build_command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.path);
        cmd.args(args);
        if let Some(dir) = &self.fnm_dir {
            debug!("Setting FNM_DIR={}", dir.display());
            cmd.env("FNM_DIR", dir);
        }
        cmd
    }

    async fn execute(&self, args: &[&str]) -> Result<String, BackendError> {
        Ok(capture(self.build_command(args)).await?.stdout)
    }

    async fn entries(&self) -> Result<Vec<FnmListEntry>, BackendError> {
        Ok(parse_installed(&self.execute(&["list"]).await?))
    }

    fn installation_dir(&self, name: &str) -> Option<PathBuf> {
        let dir = self
            .fnm_dir
            .as_ref()?
            .join("node-versions")
            .join(name)
            .join("installation");
        dir.exists().then_some(dir)
    }

    /// Absolute path of the `node` binary for an fnm-managed version.
    async fn node_binary(&self, name: &str) -> Result<PathBuf, BackendError> {
        if let Some(dir) = self.installation_dir(name) {
            return Ok(node_in(&dir));
        }
        let using = format!("--using={name}");
        let output = self
            .execute(&["exec", &using, "node", "-e", "process.stdout.write(process.execPath)"])
            .await?;
        let path = output.trim();
        if path.is_empty() {
            return Err(BackendError::unexpected_output("fnm exec", "empty execPath"));
        }
        Ok(PathBuf::from(path))
    }

    async fn system_node(&self) -> Result<Option<ActiveToolchain>, BackendError> {
        let Ok(path) = which::which("node") else {
            return Ok(None);
        };
        let path = std::fs::canonicalize(&path).unwrap_or(path);
        if self.fnm_dir.as_ref().is_some_and(|dir| path.starts_with(dir)) {
            debug!("node on PATH belongs to fnm, no system node");
            return Ok(None);
        }
        let mut cmd = Command::new(&path);
        cmd.arg("--version");
        let output = capture(cmd).await?;
        Ok(Some(ActiveToolchain {
            name: "system".to_string(),
            version: output.stdout.trim().parse()?,
            path,
        }))
    }

    fn version_arg(version: &ToolchainVersion) -> String {
        format!("v{}", version.as_str())
    }
}

fn node_in(installation: &Path) -> PathBuf {
    if cfg!(windows) {
        installation.join("node.exe")
    } else {
        installation.join("bin").join("node")
    }
}

/// Global `node_modules` for the installation owning `node`.
fn global_modules(node: &Path) -> Option<PathBuf> {
    let bin = node.parent()?;
    if cfg!(windows) {
        Some(bin.join("node_modules"))
    } else {
        Some(bin.parent()?.join("lib").join("node_modules"))
    }
}

/// `fnm current` needs the shell environment `fnm env` sets up and fails
/// without it; that only means nothing is selected in this process.
fn current_outside_shell(
    output: Result<String, BackendError>,
) -> Result<Option<String>, BackendError> {
    match output {
        Ok(output) => Ok(parse_current(&output)),
        Err(error @ BackendError::CommandFailed { .. }) => {
            debug!("fnm current unavailable outside an fnm shell: {error}");
            Ok(None)
        }
        Err(error) => Err(error),
    }
}

fn read_global_packages(modules: &Path) -> Vec<PackageRequirement> {
    let Ok(entries) = std::fs::read_dir(modules) else {
        return Vec::new();
    };

    let mut package_dirs = Vec::new();
    for entry in entries.filter_map(Result::ok) {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        if name.starts_with('@') {
            if let Ok(scoped) = std::fs::read_dir(entry.path()) {
                package_dirs.extend(scoped.filter_map(Result::ok).map(|inner| inner.path()));
            }
        } else {
            package_dirs.push(entry.path());
        }
    }

    let mut packages: Vec<PackageRequirement> = package_dirs
        .into_iter()
        .filter_map(|dir| {
            let contents = std::fs::read_to_string(dir.join("package.json")).ok()?;
            let manifest = parse_manifest(&contents)?;
            let name = manifest.name?;
            if BUNDLED_PACKAGES.contains(&name.as_str()) {
                return None;
            }
            Some(PackageRequirement {
                name,
                constraint: manifest.engines.and_then(|engines| engines.node),
                dialect: ConstraintDialect::Npm,
                isolated: false,
            })
        })
        .collect();
    packages.sort_by(|a, b| a.name.cmp(&b.name));
    packages
}

#[async_trait]
impl ToolchainBackend for FnmBackend {
    fn name(&self) -> &'static str {
        "node"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            gated: true,
            tool_inventory: false,
        }
    }

    fn implicit_defaults(&self) -> &'static [&'static str] {
        &["system"]
    }

    async fn detect(&self) -> Result<Option<ActiveToolchain>, BackendError> {
        let entries = self.entries().await?;
        let selected = match entries.iter().find(|entry| entry.is_default()) {
            Some(entry) => Some(entry.name.clone()),
            None => current_outside_shell(self.execute(&["current"]).await)?,
        };

        let Some(name) = selected else {
            return Ok(None);
        };
        if name == "system" {
            return self.system_node().await;
        }

        let version: ToolchainVersion = name.parse()?;
        let path = self.node_binary(&name).await?;
        Ok(Some(ActiveToolchain {
            name,
            version,
            path,
        }))
    }

    async fn list_installed(&self) -> Result<Vec<InstalledVersion>, BackendError> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .map(|entry| {
                let handle = self
                    .installation_dir(&entry.name)
                    .map_or_else(|| InstallHandle::Id(entry.name.clone()), InstallHandle::Path);
                InstalledVersion {
                    is_active: entry.is_default(),
                    name: entry.name,
                    version: entry.version,
                    handle,
                }
            })
            .collect())
    }

    async fn resolve_latest(&self) -> Result<ToolchainVersion, BackendError> {
        parse_remote_lts(&self.execute(&["list-remote", "--lts"]).await?)
    }

    async fn install(&self, version: &ToolchainVersion) -> Result<InstallOutcome, BackendError> {
        let already = self
            .entries()
            .await?
            .iter()
            .any(|entry| normalize_version_text(&entry.name) == version.as_str());
        if already {
            return Ok(InstallOutcome::AlreadyPresent);
        }
        self.execute(&["install", &Self::version_arg(version)]).await?;
        Ok(InstallOutcome::Installed(InstallPath::VersionManager))
    }

    async fn activate(&self, version: &ToolchainVersion) -> Result<(), BackendError> {
        self.execute(&["default", &Self::version_arg(version)]).await?;
        Ok(())
    }

    async fn uninstall(&self, installed: &InstalledVersion) -> Result<(), BackendError> {
        if installed.version.is_none() {
            return Err(BackendError::Unsupported {
                operation: "uninstall of a non-versioned node entry",
            });
        }
        self.execute(&["uninstall", &installed.name]).await?;
        Ok(())
    }

    async fn installed_packages(&self) -> Result<Vec<PackageRequirement>, BackendError> {
        let Some(active) = self.detect().await? else {
            return Ok(Vec::new());
        };
        let Some(modules) = global_modules(&active.path) else {
            warn!("Cannot locate global node_modules for {}", active.path.display());
            return Ok(Vec::new());
        };
        debug!("Reading global packages from {}", modules.display());
        Ok(read_global_packages(&modules))
    }
}
