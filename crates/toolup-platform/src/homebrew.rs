use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::debug;
use tokio::process::Command;
use which::which;

use crate::process::{ProcessError, ProcessOutput, capture};

/// Thin client over the `brew` executable.
#[derive(Debug, Clone)]
pub struct Homebrew {
    path: PathBuf,
}

impl Homebrew {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Find `brew` on `PATH` or in one of the standard prefixes.
    #[must_use]
    pub fn locate() -> Option<Self> {
        if let Ok(path) = which("brew") {
            return Some(Self::new(path));
        }

        common_brew_paths()
            .into_iter()
            .find(|path| path.exists())
            .map(Self::new)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.path);
        cmd.args(args);
        cmd.env("HOMEBREW_NO_AUTO_UPDATE", "1");
        cmd.env("HOMEBREW_NO_INSTALL_CLEANUP", "1");
        cmd.env("HOMEBREW_NO_ENV_HINTS", "1");
        cmd.env("HOMEBREW_NO_COLOR", "1");
        cmd
    }

    async fn execute(&self, args: &[&str]) -> Result<ProcessOutput, ProcessError> {
        capture(self.command(args)).await
    }

    /// Installed formulae and their installed versions.
    ///
    /// A formula that is not installed yields an empty map rather than an
    /// error.
    ///
    /// # Errors
    /// Returns an error if `brew` cannot be executed.
    pub async fn list_versions(
        &self,
        formula: Option<&str>,
    ) -> Result<BTreeMap<String, Vec<String>>, ProcessError> {
        let mut args = vec!["list", "--formula", "--versions"];
        if let Some(formula) = formula {
            args.push(formula);
        }

        match self.execute(&args).await {
            Ok(output) => Ok(parse_list_versions(&output.stdout)),
            Err(ProcessError::Failed { .. }) if formula.is_some() => {
                debug!("brew reports {formula:?} as not installed");
                Ok(BTreeMap::new())
            }
            Err(error) => Err(error),
        }
    }

    /// # Errors
    /// Returns an error if `brew install` fails.
    pub async fn install(&self, formula: &str) -> Result<(), ProcessError> {
        self.execute(&["install", formula]).await.map(|_| ())
    }

    /// # Errors
    /// Returns an error if `brew upgrade` fails.
    pub async fn upgrade(&self, formula: &str) -> Result<(), ProcessError> {
        self.execute(&["upgrade", formula]).await.map(|_| ())
    }

    /// # Errors
    /// Returns an error if `brew uninstall` fails.
    pub async fn uninstall(&self, formula: &str) -> Result<(), ProcessError> {
        self.execute(&["uninstall", formula]).await.map(|_| ())
    }

    /// Force-link a keg so its binaries win on `PATH`.
    ///
    /// # Errors
    /// Returns an error if `brew link` fails.
    pub async fn link(&self, formula: &str) -> Result<(), ProcessError> {
        self.execute(&["link", "--overwrite", "--force", formula])
            .await
            .map(|_| ())
    }

    /// # Errors
    /// Returns an error if `brew --prefix` fails.
    pub async fn prefix(&self) -> Result<PathBuf, ProcessError> {
        let output = self.execute(&["--prefix"]).await?;
        Ok(PathBuf::from(output.stdout.trim()))
    }
}

/// Parse `brew list --versions` output (`name v1 v2` per line).
#[must_use]
pub fn parse_list_versions(output: &str) -> BTreeMap<String, Vec<String>> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let name = parts.next()?;
            Some((name.to_string(), parts.map(str::to_string).collect()))
        })
        .collect()
}

fn common_brew_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("/opt/homebrew/bin/brew"),
        PathBuf::from("/usr/local/bin/brew"),
        PathBuf::from("/home/linuxbrew/.linuxbrew/bin/brew"),
    ];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".linuxbrew").join("bin").join("brew"));
    }
    paths
}
