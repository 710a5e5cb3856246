use std::path::{Path, PathBuf};

use log::{debug, info};
use toolup_backend::{BackendError, ToolchainVersion};

use crate::version::sdk_name;

const CURRENT: &str = "current";

/// The `~/sdk` directory populated by `golang.org/dl` wrappers.
#[derive(Debug, Clone)]
pub(crate) struct SdkRoot {
    dir: PathBuf,
}

impl SdkRoot {
    pub(crate) fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub(crate) fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join("sdk"))
    }

    pub(crate) fn install_dir(&self, version: &ToolchainVersion) -> PathBuf {
        self.dir.join(sdk_name(version))
    }

    pub(crate) fn is_installed(&self, version: &ToolchainVersion) -> bool {
        go_binary(&self.install_dir(version)).exists()
    }

    pub(crate) fn current_bin(&self) -> PathBuf {
        self.dir.join(CURRENT).join("bin")
    }

    /// `go` of the SDK selected through `~/sdk/current`.
    pub(crate) fn current_go(&self) -> Option<PathBuf> {
        let go = go_binary(&self.dir.join(CURRENT));
        go.exists().then_some(go)
    }

    /// `true` when `go` is the binary `~/sdk/current` points at.
    pub(crate) fn is_current(&self, go: &Path) -> bool {
        let Some(current) = self.current_go() else {
            return false;
        };
        match (std::fs::canonicalize(go), std::fs::canonicalize(&current)) {
            (Ok(go), Ok(current)) => go == current,
            _ => go == current,
        }
    }

    /// Installed SDKs, oldest first.
    pub(crate) fn list(&self) -> Vec<(String, ToolchainVersion, PathBuf)> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut sdks: Vec<_> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name == CURRENT || !name.starts_with("go") {
                    return None;
                }
                let path = entry.path();
                if !go_binary(&path).exists() {
                    return None;
                }
                let version: ToolchainVersion = name.parse().ok()?;
                Some((name, version, path))
            })
            .collect();
        sdks.sort_by(|a, b| a.1.cmp(&b.1));
        sdks
    }

    /// Point `~/sdk/current` at the SDK for `version`.
    pub(crate) fn select(&self, version: &ToolchainVersion) -> Result<(), BackendError> {
        let target = self.install_dir(version);
        if !go_binary(&target).exists() {
            return Err(BackendError::unexpected_output(
                "go sdk",
                format!("{} is not installed", target.display()),
            ));
        }

        let link = self.dir.join(CURRENT);
        match std::fs::symlink_metadata(&link) {
            Ok(metadata) if metadata.file_type().is_symlink() => std::fs::remove_file(&link)?,
            Ok(_) => {
                return Err(BackendError::unexpected_output(
                    "go sdk",
                    format!("{} exists and is not a symlink", link.display()),
                ));
            }
            Err(_) => {}
        }

        link_dir(&target, &link)?;
        info!("{} -> {}", link.display(), target.display());
        Ok(())
    }

    /// Delete one SDK. Paths outside the root, and the `current` link, are refused.
    pub(crate) async fn remove(&self, path: &Path) -> Result<(), BackendError> {
        let inside = path.parent() == Some(self.dir.as_path())
            && path.file_name().is_some_and(|name| name != CURRENT);
        if !inside {
            return Err(BackendError::Protected {
                path: path.to_path_buf(),
            });
        }
        debug!("Removing {}", path.display());
        tokio::fs::remove_dir_all(path).await?;
        Ok(())
    }
}

pub(crate) fn go_binary(root: &Path) -> PathBuf {
    let name = if cfg!(windows) { "go.exe" } else { "go" };
    root.join("bin").join(name)
}

#[cfg(unix)]
fn link_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn link_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}
