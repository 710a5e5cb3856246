use serde::Deserialize;
use toolup_backend::{BackendError, ToolchainVersion};

/// One line of `fnm list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnmListEntry {
    pub name: String,
    pub version: Option<ToolchainVersion>,
    pub aliases: Vec<String>,
}

impl FnmListEntry {
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.aliases.iter().any(|alias| alias == "default")
    }
}

/// Parse `fnm list`, e.g. `* v20.11.1 default, lts-latest` or `* system`.
#[must_use]
pub fn parse_installed(output: &str) -> Vec<FnmListEntry> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim().trim_start_matches('*').trim();
            let mut tokens = line.split_whitespace();
            let name = tokens.next()?.to_string();
            let aliases = tokens
                .flat_map(|token| token.split(','))
                .filter(|alias| !alias.is_empty())
                .map(str::to_string)
                .collect();
            Some(FnmListEntry {
                version: name.parse().ok(),
                name,
                aliases,
            })
        })
        .collect()
}

/// Parse `fnm current`; `none` means nothing is selected.
#[must_use]
pub fn parse_current(output: &str) -> Option<String> {
    let current = output.trim();
    if current.is_empty() || current == "none" {
        None
    } else {
        Some(current.to_string())
    }
}

/// Newest release in `fnm list-remote --lts` output (`v20.11.1 (Iron)`).
///
/// # Errors
/// Returns an error when the output contains no versions.
pub fn parse_remote_lts(output: &str) -> Result<ToolchainVersion, BackendError> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|token| token.parse::<ToolchainVersion>().ok())
        .filter(|version| !version.is_prerelease())
        .max()
        .ok_or_else(|| BackendError::unexpected_output("fnm list-remote", "no LTS versions listed"))
}

#[derive(Debug, Deserialize)]
pub(crate) struct PackageManifest {
    pub name: Option<String>,
    #[serde(default)]
    pub engines: Option<Engines>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Engines {
    pub node: Option<String>,
}

pub(crate) fn parse_manifest(contents: &str) -> Option<PackageManifest> {
    serde_json::from_str(contents).ok()
}
