use serde::Deserialize;
use toolup_backend::{BackendError, ToolchainVersion};

pub(crate) const RELEASES_URL: &str = "https://go.dev/dl/?mode=json";

/// One entry of the go.dev download index.
#[derive(Debug, Clone, Deserialize)]
pub struct GoRelease {
    pub version: String,
    #[serde(default)]
    pub stable: bool,
}

/// Highest stable release in the index.
///
/// # Errors
/// Returns an error when no stable release parses.
pub fn latest_stable(releases: &[GoRelease]) -> Result<ToolchainVersion, BackendError> {
    releases
        .iter()
        .filter(|release| release.stable)
        .filter_map(|release| release.version.parse::<ToolchainVersion>().ok())
        .filter(|version| !version.is_prerelease())
        .max()
        .ok_or_else(|| BackendError::unexpected_output("go.dev release index", "no stable releases"))
}

pub(crate) async fn fetch_latest(client: &reqwest::Client) -> Result<ToolchainVersion, BackendError> {
    let response = client
        .get(RELEASES_URL)
        .send()
        .await
        .map_err(|error| BackendError::network("go.dev release fetch", error))?;

    if !response.status().is_success() {
        return Err(BackendError::network(
            "go.dev release fetch",
            format!("HTTP {}", response.status()),
        ));
    }

    let releases: Vec<GoRelease> = response
        .json()
        .await
        .map_err(|error| BackendError::network("go.dev release fetch", error))?;
    latest_stable(&releases)
}
