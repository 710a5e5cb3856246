use serde::Deserialize;
use toolup_backend::{BackendError, ToolchainVersion};

/// CPython release names are purely dotted-numeric (`3.12.1`).
fn is_cpython_release(name: &str) -> bool {
    !name.is_empty()
        && name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// Installed CPython releases from `pyenv versions --bare`.
///
/// Virtualenvs (`3.11.8/envs/tools`, bare env names) and other
/// implementations (`pypy3.10-7.3.15`, `miniconda3-latest`) are skipped.
#[must_use]
pub fn parse_versions_bare(output: &str) -> Vec<(String, ToolchainVersion)> {
    output
        .lines()
        .map(str::trim)
        .filter(|name| is_cpython_release(name))
        .filter_map(|name| Some((name.to_string(), name.parse().ok()?)))
        .collect()
}

/// Newest stable CPython in `pyenv install --list`.
///
/// # Errors
/// Returns an error when the list has no stable CPython release.
pub fn parse_install_list(output: &str) -> Result<ToolchainVersion, BackendError> {
    output
        .lines()
        .map(str::trim)
        .filter(|name| is_cpython_release(name))
        .filter_map(|name| name.parse::<ToolchainVersion>().ok())
        .max()
        .ok_or_else(|| {
            BackendError::unexpected_output("pyenv install --list", "no CPython releases listed")
        })
}

/// First entry of `pyenv version-name`, which joins multiple selections with `:`.
#[must_use]
pub fn parse_version_name(output: &str) -> Option<String> {
    output
        .trim()
        .split(':')
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// `Python 3.11.8` -> `3.11.8`.
///
/// # Errors
/// Returns an error when the text carries no version.
pub fn parse_python_version(output: &str) -> Result<ToolchainVersion, BackendError> {
    let text = output.trim();
    let version = text.strip_prefix("Python").unwrap_or(text).trim();
    Ok(version.parse()?)
}

/// One installed distribution as reported by `importlib.metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Distribution {
    pub name: Option<String>,
    pub requires_python: Option<String>,
    pub location: Option<String>,
}

impl Distribution {
    /// pipx and virtualenv trees have their own interpreter copy.
    #[must_use]
    pub fn is_isolated(&self) -> bool {
        self.location.as_deref().is_some_and(|location| {
            let location = location.replace('\\', "/");
            location.contains("/pipx/venvs/") || location.contains("/.virtualenvs/")
        })
    }
}

/// # Errors
/// Returns an error when the JSON does not match the listing script's shape.
pub fn parse_distributions(output: &str) -> Result<Vec<Distribution>, BackendError> {
    serde_json::from_str(output.trim())
        .map_err(|error| BackendError::unexpected_output("importlib.metadata", error.to_string()))
}

pub(crate) const LIST_DISTRIBUTIONS: &str = r#"import json, importlib.metadata as md
out = []
for d in md.distributions():
    out.append({
        "name": d.metadata.get("Name"),
        "requires_python": d.metadata.get("Requires-Python"),
        "location": str(d.locate_file("")),
    })
print(json.dumps(out))
"#;
