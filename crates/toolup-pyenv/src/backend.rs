use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use tokio::process::Command;

use toolup_backend::{
    ActiveToolchain, BackendCapabilities, BackendError, ConstraintDialect, InstallHandle,
    InstallOutcome, InstallPath, InstalledVersion, PackageRequirement, ToolchainBackend,
    ToolchainVersion,
};
use toolup_platform::capture;

use crate::version::{
    LIST_DISTRIBUTIONS, parse_distributions, parse_install_list, parse_python_version,
    parse_version_name, parse_versions_bare,
};

#[derive(Debug, Clone)]
pub struct PyenvBackend {
    path: PathBuf,
    root: Option<PathBuf>,
}

impl PyenvBackend {
    #[must_use]
    pub fn new(path: PathBuf, root: Option<PathBuf>) -> Self {
        Self { path, root }
    }

    fn build_command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.path);
        cmd.args(args);
        if let Some(root) = &self.root {
            cmd.env("PYENV_ROOT", root);
        }
        cmd
    }

    async fn execute(&self, args: &[&str]) -> Result<String, BackendError> {
        Ok(capture(self.build_command(args)).await?.stdout)
    }

    fn version_dir(&self, name: &str) -> Option<PathBuf> {
        Some(self.root.as_ref()?.join("versions").join(name))
    }

    async fn interpreter_version(python: &Path) -> Result<ToolchainVersion, BackendError> {
        let mut cmd = Command::new(python);
        cmd.arg("--version");
        let output = capture(cmd).await?;
        // Python 2 printed its version on stderr.
        let text = if output.stdout.trim().is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        parse_python_version(&text)
    }
}

#[async_trait]
impl ToolchainBackend for PyenvBackend {
    fn name(&self) -> &'static str {
        "python"
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
        let Some(name) = parse_version_name(&self.execute(&["version-name"]).await?) else {
            return Ok(None);
        };

        let which = self.execute(&["which", "python3"]).await?;
        let path = PathBuf::from(which.trim());
        if path.as_os_str().is_empty() {
            return Err(BackendError::unexpected_output("pyenv which", "empty path"));
        }

        let version = match name.parse::<ToolchainVersion>() {
            Ok(version) if !version.is_prerelease() => version,
            _ => Self::interpreter_version(&path).await?,
        };
        debug!("pyenv selects {name} ({version}) at {}", path.display());

        Ok(Some(ActiveToolchain {
            name,
            version,
            path,
        }))
    }

    async fn list_installed(&self) -> Result<Vec<InstalledVersion>, BackendError> {
        let active = self
            .execute(&["version-name"])
            .await
            .ok()
            .and_then(|output| parse_version_name(&output));
        let output = self.execute(&["versions", "--bare"]).await?;

        Ok(parse_versions_bare(&output)
            .into_iter()
            .map(|(name, version)| InstalledVersion {
                is_active: active.as_deref() == Some(name.as_str()),
                handle: self
                    .version_dir(&name)
                    .map_or_else(|| InstallHandle::Id(name.clone()), InstallHandle::Path),
                version: Some(version),
                name,
            })
            .collect())
    }

    async fn resolve_latest(&self) -> Result<ToolchainVersion, BackendError> {
        parse_install_list(&self.execute(&["install", "--list"]).await?)
    }

    async fn install(&self, version: &ToolchainVersion) -> Result<InstallOutcome, BackendError> {
        if self
            .version_dir(version.as_str())
            .is_some_and(|dir| dir.join("bin").exists())
        {
            return Ok(InstallOutcome::AlreadyPresent);
        }
        self.execute(&["install", "-s", version.as_str()]).await?;
        Ok(InstallOutcome::Installed(InstallPath::VersionManager))
    }

    async fn activate(&self, version: &ToolchainVersion) -> Result<(), BackendError> {
        self.execute(&["global", version.as_str()]).await?;
        self.execute(&["rehash"]).await?;
        Ok(())
    }

    async fn uninstall(&self, installed: &InstalledVersion) -> Result<(), BackendError> {
        if installed.version.is_none() {
            return Err(BackendError::Unsupported {
                operation: "uninstall of a non-versioned python entry",
            });
        }
        self.execute(&["uninstall", "-f", &installed.name]).await?;
        Ok(())
    }

    async fn installed_packages(&self) -> Result<Vec<PackageRequirement>, BackendError> {
        let Some(active) = self.detect().await? else {
            return Ok(Vec::new());
        };
        let mut cmd = Command::new(&active.path);
        cmd.args(["-c", LIST_DISTRIBUTIONS]);
        let output = capture(cmd).await?;

        let mut packages: Vec<PackageRequirement> = parse_distributions(&output.stdout)?
            .into_iter()
            .filter_map(|distribution| {
                let isolated = distribution.is_isolated();
                Some(PackageRequirement {
                    name: distribution.name?,
                    constraint: distribution.requires_python,
                    dialect: ConstraintDialect::Pep440,
                    isolated,
                })
            })
            .collect();
        packages.sort_by(|a, b| a.name.cmp(&b.name));
        packages.dedup_by(|a, b| a.name == b.name);
        Ok(packages)
    }
}
