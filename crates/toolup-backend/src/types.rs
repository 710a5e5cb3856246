use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::str::FromStr;

/// A dotted-numeric toolchain version with an optional pre-release marker.
///
/// Any number of numeric components is accepted (`1.22`, `3.11.8`,
/// `1.78.0`); missing trailing components compare as zero. Anything after
/// the numeric part (`rc1`, `-nightly.20240501`, `a4`) is a pre-release
/// marker and sorts below the corresponding stable release.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolchainVersion {
    text: String,
    components: Vec<u64>,
    pre: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionParseError {
    #[error("Expected a dotted numeric version, got: {input}")]
    InvalidFormat { input: String },
    #[error("Invalid version component {value:?} in {input}")]
    InvalidComponent { input: String, value: String },
}

/// Normalize user- or tool-provided version text: trims whitespace and drops
/// the `v` / `go` prefixes toolchains commonly print.
#[must_use]
pub fn normalize_version_text(input: &str) -> String {
    let trimmed = input.trim();
    let starts_with_digit_after = |prefix: &str| {
        trimmed
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
    };

    let stripped = if starts_with_digit_after("v") || starts_with_digit_after("V") {
        &trimmed[1..]
    } else if starts_with_digit_after("go") {
        &trimmed[2..]
    } else {
        trimmed
    };
    stripped.to_ascii_lowercase()
}

impl ToolchainVersion {
    #[must_use]
    pub fn components(&self) -> &[u64] {
        &self.components
    }

    #[must_use]
    pub fn major(&self) -> u64 {
        self.components.first().copied().unwrap_or(0)
    }

    #[must_use]
    pub fn minor(&self) -> u64 {
        self.components.get(1).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn pre_release(&self) -> Option<&str> {
        self.pre.as_deref()
    }

    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some()
    }

    /// `true` when both versions share major and minor.
    #[must_use]
    pub fn same_line(&self, other: &Self) -> bool {
        self.major() == other.major() && self.minor() == other.minor()
    }

    /// `true` when this version starts with every component of `prefix`
    /// (`3.11.8` starts with `3.11`).
    #[must_use]
    pub fn starts_with(&self, prefix: &[u64]) -> bool {
        prefix
            .iter()
            .enumerate()
            .all(|(idx, part)| self.components.get(idx).copied().unwrap_or(0) == *part)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    fn significant_components(&self) -> &[u64] {
        let len = self
            .components
            .iter()
            .rposition(|part| *part != 0)
            .map_or(0, |idx| idx + 1);
        &self.components[..len]
    }
}

impl FromStr for ToolchainVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = normalize_version_text(s);
        let numeric_len = text
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(text.len());
        let numeric = text[..numeric_len].trim_end_matches('.');

        if numeric.is_empty() {
            return Err(VersionParseError::InvalidFormat { input: text });
        }

        let components = numeric
            .split('.')
            .map(|part| {
                part.parse::<u64>()
                    .map_err(|_| VersionParseError::InvalidComponent {
                        input: text.clone(),
                        value: part.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let rest = text[numeric_len..].trim_start_matches(['-', '.', '+']);
        let pre = (!rest.is_empty()).then(|| rest.to_string());

        Ok(Self {
            text,
            components,
            pre,
        })
    }
}

impl TryFrom<String> for ToolchainVersion {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ToolchainVersion> for String {
    fn from(value: ToolchainVersion) -> Self {
        value.text
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum PreToken<'a> {
    Num(u64),
    Text(&'a str),
}

fn pre_tokens(pre: &str) -> Vec<PreToken<'_>> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let bytes = pre.as_bytes();

    while start < bytes.len() {
        if !bytes[start].is_ascii_alphanumeric() {
            start += 1;
            continue;
        }
        let numeric = bytes[start].is_ascii_digit();
        let mut end = start;
        while end < bytes.len()
            && bytes[end].is_ascii_alphanumeric()
            && bytes[end].is_ascii_digit() == numeric
        {
            end += 1;
        }
        let chunk = &pre[start..end];
        tokens.push(if numeric {
            chunk.parse().map_or(PreToken::Text(chunk), PreToken::Num)
        } else {
            PreToken::Text(chunk)
        });
        start = end;
    }

    tokens
}

impl Ord for ToolchainVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let width = self.components.len().max(other.components.len());
        for idx in 0..width {
            let ours = self.components.get(idx).copied().unwrap_or(0);
            let theirs = other.components.get(idx).copied().unwrap_or(0);
            match ours.cmp(&theirs) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }

        match (&self.pre, &other.pre) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(ours), Some(theirs)) => pre_tokens(ours).cmp(&pre_tokens(theirs)),
        }
    }
}

impl PartialOrd for ToolchainVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ToolchainVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ToolchainVersion {}

impl Hash for ToolchainVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant_components().hash(state);
        self.pre.as_deref().map(pre_tokens).hash(state);
    }
}

impl fmt::Display for ToolchainVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Backend-specific identity of one installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallHandle {
    Path(PathBuf),
    Id(String),
}

/// One installed entry as reported by a backend.
///
/// `name` is what the backend itself calls the entry (`3.11.8`, `system`,
/// `stable`, `go@1.21`); `version` is absent for entries that are channels or
/// aliases rather than pinned versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledVersion {
    pub name: String,
    pub version: Option<ToolchainVersion>,
    pub handle: InstallHandle,
    pub is_active: bool,
}

impl InstalledVersion {
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match &self.handle {
            InstallHandle::Path(path) => Some(path),
            InstallHandle::Id(_) => None,
        }
    }
}

/// The toolchain a backend currently resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveToolchain {
    pub name: String,
    pub version: ToolchainVersion,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallPath {
    PackageManager { variant: String },
    VersionManager,
}

impl fmt::Display for InstallPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PackageManager { variant } => write!(f, "package manager ({variant})"),
            Self::VersionManager => f.write_str("version manager"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed(InstallPath),
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintDialect {
    /// `Requires-Python` style specifiers (`>=3.8,<3.12`, `~=3.10`).
    Pep440,
    /// `engines.node` style ranges (`^18 || >=20`).
    Npm,
}

/// A package installed into a toolchain together with its declared
/// constraint on the toolchain version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequirement {
    pub name: String,
    pub constraint: Option<String>,
    pub dialect: ConstraintDialect,
    pub isolated: bool,
}

/// An executable built against a toolchain and installed globally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolBinary {
    pub name: String,
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn v(text: &str) -> ToolchainVersion {
        text.parse().expect("valid version in test")
    }

    #[test]
    fn parse_strips_common_prefixes() {
        assert_eq!(v("v20.11.0").as_str(), "20.11.0");
        assert_eq!(v("go1.22.1").as_str(), "1.22.1");
        assert_eq!(v("  3.11.8\n").as_str(), "3.11.8");
    }

    #[test]
    fn parse_keeps_prerelease_marker() {
        let rc = v("3.13.0rc1");
        assert_eq!(rc.components(), &[3, 13, 0]);
        assert_eq!(rc.pre_release(), Some("rc1"));

        let nightly = v("1.80.0-nightly.20240501");
        assert_eq!(nightly.pre_release(), Some("nightly.20240501"));
    }

    #[test]
    fn parse_rejects_non_numeric_input() {
        assert!("system".parse::<ToolchainVersion>().is_err());
        assert!("".parse::<ToolchainVersion>().is_err());
        assert!(matches!(
            "1..2".parse::<ToolchainVersion>(),
            Err(VersionParseError::InvalidComponent { .. })
        ));
    }

    #[test]
    fn ordering_is_numeric_not_lexical() {
        assert!(v("3.10.0") > v("3.9.18"));
        assert!(v("1.22.10") > v("1.22.9"));
        assert!(v("20.11.1") > v("20.11.0"));
    }

    #[test]
    fn prerelease_sorts_below_stable() {
        assert!(v("3.13.0rc1") < v("3.13.0"));
        assert!(v("3.13.0a4") < v("3.13.0b1"));
        assert!(v("3.13.0b1") < v("3.13.0rc1"));
        assert!(v("1.22rc2") < v("1.22.0"));
        assert!(v("3.13.0rc1") > v("3.12.9"));
    }

    #[test]
    fn nightly_snapshots_order_by_date() {
        assert!(v("1.80.0-nightly.20240502") > v("1.80.0-nightly.20240501"));
    }

    #[test]
    fn missing_components_compare_as_zero() {
        assert_eq!(v("1.22"), v("1.22.0"));
        let set: HashSet<_> = [v("1.22"), v("1.22.0")].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn starts_with_matches_prefix_components() {
        assert!(v("3.11.8").starts_with(&[3, 11]));
        assert!(!v("3.12.1").starts_with(&[3, 11]));
        assert!(v("3.12.1").same_line(&v("3.12.0")));
    }

    #[test]
    fn string_conversion_round_trips() {
        let text = String::from(v("v1.78.0"));
        assert_eq!(text, "1.78.0");
        let back = ToolchainVersion::try_from(text).expect("parse back");
        assert_eq!(back, v("1.78.0"));
    }
}
