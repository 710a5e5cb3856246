use toolup_backend::{BackendError, ToolchainVersion};

/// `go version go1.22.1 darwin/arm64` -> `1.22.1`.
///
/// # Errors
/// Returns an error when no `goX.Y[.Z]` token is present.
pub fn parse_go_version(output: &str) -> Result<ToolchainVersion, BackendError> {
    output
        .split_whitespace()
        .find(|token| {
            token
                .strip_prefix("go")
                .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
        })
        .ok_or_else(|| BackendError::unexpected_output("go version", output.trim().to_string()))?
        .parse()
        .map_err(BackendError::from)
}

/// Main module path from `go version -m <binary>`.
///
/// The listing has a tab-indented `path` line naming the package the
/// binary was built from. Binaries built outside module mode lack it.
#[must_use]
pub fn parse_module_path(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some("path"), Some(path)) if path != "command-line-arguments" => {
                Some(path.to_string())
            }
            _ => None,
        }
    })
}

/// `go1.22.1` SDK directory and wrapper names.
#[must_use]
pub fn sdk_name(version: &ToolchainVersion) -> String {
    format!("go{}", version.as_str())
}
