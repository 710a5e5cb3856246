use toolup_backend::{BackendError, ToolchainVersion};

pub(crate) const CHANNELS: &[&str] = &["stable", "beta", "nightly"];

/// A toolchain from `rustup toolchain list`, with the host triple split off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainName {
    /// Name as rustup prints it (`stable-aarch64-apple-darwin`).
    pub full: String,
    /// Name without the host triple (`stable`, `1.75.0`, `nightly-2024-05-01`).
    pub short: String,
    /// Present only for pinned numeric releases.
    pub version: Option<ToolchainVersion>,
    pub is_default: bool,
}

fn is_date(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(index, byte)| index == 4 || index == 7 || byte.is_ascii_digit())
}

/// Split a full toolchain name. Custom (`rustup toolchain link`) names are
/// not recognised and yield `None`.
#[must_use]
pub fn split_toolchain_name(full: &str) -> Option<(String, Option<ToolchainVersion>)> {
    let (head, rest) = full.split_once('-').unwrap_or((full, ""));

    if CHANNELS.contains(&head) {
        let date = rest.get(..10).filter(|date| is_date(date));
        return Some(match date {
            Some(date) => (format!("{head}-{date}"), None),
            None => (head.to_string(), None),
        });
    }

    if head.starts_with(|c: char| c.is_ascii_digit())
        && head.chars().all(|c| c.is_ascii_digit() || c == '.')
    {
        let version = head.parse().ok()?;
        return Some((head.to_string(), Some(version)));
    }

    None
}

/// Parse `rustup toolchain list`.
#[must_use]
pub fn parse_toolchain_list(output: &str) -> Vec<ToolchainName> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let full = line.split_whitespace().next()?;
            let tags = &line[full.len()..];
            let (short, version) = split_toolchain_name(full)?;
            Some(ToolchainName {
                full: full.to_string(),
                short,
                version,
                is_default: tags.contains("default"),
            })
        })
        .collect()
}

/// `1.80.0-nightly (8e86c9567 2024-05-01)` style text into a comparable
/// version. Nightly and beta builds carry their date so successive
/// snapshots of the same release order correctly.
fn parse_release_text(text: &str) -> Result<ToolchainVersion, BackendError> {
    let mut tokens = text.split_whitespace();
    let release = tokens
        .next()
        .ok_or_else(|| BackendError::unexpected_output("rustc version", text.to_string()))?;
    let date = text
        .rsplit_once(' ')
        .map(|(_, last)| last.trim_end_matches(')'))
        .filter(|date| is_date(date));

    let is_snapshot = release.contains("nightly") || release.contains("beta");
    let text = match date {
        Some(date) if is_snapshot => format!("{release}.{}", date.replace('-', "")),
        _ => release.to_string(),
    };
    Ok(text.parse()?)
}

/// Parse `rustc --version`.
///
/// # Errors
/// Returns an error when the output is not a rustc version line.
pub fn parse_rustc_version(output: &str) -> Result<ToolchainVersion, BackendError> {
    let rest = output
        .trim()
        .strip_prefix("rustc ")
        .ok_or_else(|| BackendError::unexpected_output("rustc --version", output.trim().to_string()))?;
    parse_release_text(rest)
}

/// Latest release of `channel` from `rustup check`.
///
/// Lines look like `stable-x86_64-unknown-linux-gnu - Update available :
/// 1.77.0 (aedd173a2 2024-03-17) -> 1.78.0 (9b00956e5 2024-04-29)` or
/// `... - Up to date : 1.78.0 (9b00956e5 2024-04-29)`.
///
/// # Errors
/// Returns an error when the channel is not listed.
pub fn parse_check(output: &str, channel: &str) -> Result<ToolchainVersion, BackendError> {
    let prefix = format!("{channel}-");
    let line = output
        .lines()
        .map(str::trim)
        .find(|line| {
            line.strip_prefix(&prefix)
                .is_some_and(|rest| !rest.starts_with(|c: char| c.is_ascii_digit()))
        })
        .ok_or_else(|| {
            BackendError::unexpected_output("rustup check", format!("{channel} is not installed"))
        })?;

    let status = line
        .split_once(" : ")
        .map(|(_, status)| status)
        .ok_or_else(|| BackendError::unexpected_output("rustup check", line.to_string()))?;
    let newest = status.rsplit_once("->").map_or(status, |(_, newest)| newest);
    parse_release_text(newest.trim())
}
