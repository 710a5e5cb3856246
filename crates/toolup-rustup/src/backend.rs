use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use tokio::process::Command;

use toolup_backend::{
    ActiveToolchain, BackendCapabilities, BackendError, InstallHandle, InstallOutcome,
    InstallPath, InstalledVersion, ToolchainBackend, ToolchainVersion,
};
use toolup_platform::{capture, capture_accepting};

use crate::version::{CHANNELS, parse_check, parse_rustc_version, parse_toolchain_list};

/// `rustup check` exits with this status when an update is available.
const CHECK_UPDATES_PENDING: i32 = 100;

/// Release channel the rust backend keeps current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Stable,
    Nightly,
}

impl Channel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Nightly => "nightly",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RustupBackend {
    path: PathBuf,
    home: Option<PathBuf>,
    channel: Channel,
}

impl RustupBackend {
    #[must_use]
    pub fn new(path: PathBuf, home: Option<PathBuf>, channel: Channel) -> Self {
        Self {
            path,
            home,
            channel,
        }
    }

    #[must_use]
    pub fn channel(&self) -> Channel {
        self.channel
    }

    fn build_command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.path);
        cmd.args(args);
        if let Some(home) = &self.home {
            cmd.env("RUSTUP_HOME", home);
        }
        cmd
    }

    async fn execute(&self, args: &[&str]) -> Result<String, BackendError> {
        Ok(capture(self.build_command(args)).await?.stdout)
    }

    fn toolchain_dir(&self, full_name: &str) -> Option<PathBuf> {
        Some(self.home.as_ref()?.join("toolchains").join(full_name))
    }

    /// Full name of the default toolchain, or `None` when none is configured.
    async fn default_toolchain(&self) -> Result<Option<String>, BackendError> {
        let output = match self.execute(&["default"]).await {
            Ok(output) => output,
            Err(BackendError::CommandFailed { stderr, .. }) if stderr.contains("no default") => {
                return Ok(None);
            }
            Err(error) => return Err(error),
        };
        Ok(output
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().next())
            .filter(|name| !name.starts_with("no"))
            .map(str::to_string))
    }

    async fn installed_channel(&self) -> Result<bool, BackendError> {
        let output = self.execute(&["toolchain", "list"]).await?;
        Ok(parse_toolchain_list(&output)
            .iter()
            .any(|toolchain| toolchain.short == self.channel.as_str()))
    }

    async fn rustc_version(rustc: &Path) -> Result<ToolchainVersion, BackendError> {
        let mut cmd = Command::new(rustc);
        cmd.arg("--version");
        parse_rustc_version(&capture(cmd).await?.stdout)
    }
}

#[async_trait]
impl ToolchainBackend for RustupBackend {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::default()
    }

    fn cache_key(&self) -> String {
        format!("rust-{}", self.channel.as_str())
    }

    fn implicit_defaults(&self) -> &'static [&'static str] {
        CHANNELS
    }

    async fn detect(&self) -> Result<Option<ActiveToolchain>, BackendError> {
        let Some(full_name) = self.default_toolchain().await? else {
            return Ok(None);
        };

        let which = self
            .execute(&["which", "--toolchain", &full_name, "rustc"])
            .await?;
        let path = PathBuf::from(which.trim());
        if path.as_os_str().is_empty() {
            return Err(BackendError::unexpected_output("rustup which", "empty path"));
        }
        let version = Self::rustc_version(&path).await?;

        let name = crate::version::split_toolchain_name(&full_name)
            .map_or(full_name, |(short, _)| short);
        debug!("rustup default is {name} ({version}) at {}", path.display());

        Ok(Some(ActiveToolchain {
            name,
            version,
            path,
        }))
    }

    async fn list_installed(&self) -> Result<Vec<InstalledVersion>, BackendError> {
        let output = self.execute(&["toolchain", "list"]).await?;

        Ok(parse_toolchain_list(&output)
            .into_iter()
            .map(|toolchain| InstalledVersion {
                handle: self
                    .toolchain_dir(&toolchain.full)
                    .map_or_else(|| InstallHandle::Id(toolchain.full.clone()), InstallHandle::Path),
                is_active: toolchain.is_default,
                version: toolchain.version,
                name: toolchain.short,
            })
            .collect())
    }

    async fn resolve_latest(&self) -> Result<ToolchainVersion, BackendError> {
        let output =
            capture_accepting(self.build_command(&["check"]), &[CHECK_UPDATES_PENDING]).await?;
        parse_check(&output.stdout, self.channel.as_str())
    }

    /// Channels update in place, so installing a release means installing
    /// or updating the tracked channel.
    async fn install(&self, version: &ToolchainVersion) -> Result<InstallOutcome, BackendError> {
        let channel = self.channel.as_str();
        if self.installed_channel().await? {
            let current = self.execute(&["run", channel, "rustc", "--version"]).await?;
            if parse_rustc_version(&current).is_ok_and(|current| current >= *version) {
                return Ok(InstallOutcome::AlreadyPresent);
            }
            self.execute(&["update", channel, "--no-self-update"]).await?;
        } else {
            self.execute(&["toolchain", "install", channel, "--profile", "default"])
                .await?;
        }
        Ok(InstallOutcome::Installed(InstallPath::VersionManager))
    }

    async fn activate(&self, _version: &ToolchainVersion) -> Result<(), BackendError> {
        self.execute(&["default", self.channel.as_str()]).await?;
        Ok(())
    }

    async fn uninstall(&self, installed: &InstalledVersion) -> Result<(), BackendError> {
        if CHANNELS.contains(&installed.name.as_str()) {
            return Err(BackendError::Unsupported {
                operation: "uninstall of a rust release channel",
            });
        }
        self.execute(&["toolchain", "uninstall", &installed.name])
            .await?;
        Ok(())
    }
}
