use std::path::{Path, PathBuf};

use tokio::process::Command;
use which::which;

use toolup_backend::BackendDetection;
use toolup_platform::capture;

pub(crate) async fn detect_fnm() -> BackendDetection {
    let data_dir = detect_fnm_dir();

    if let Ok(path) = which("fnm") {
        let version = get_fnm_version(&path).await;
        return BackendDetection {
            found: true,
            path: Some(path),
            version,
            in_path: true,
            data_dir,
        };
    }

    for path in get_common_fnm_paths() {
        if path.exists() {
            let version = get_fnm_version(&path).await;
            return BackendDetection {
                found: true,
                path: Some(path),
                version,
                in_path: false,
                data_dir,
            };
        }
    }

    BackendDetection {
        data_dir,
        ..BackendDetection::default()
    }
}

pub(crate) fn detect_fnm_dir() -> Option<PathBuf> {
    let env_dir = std::env::var("FNM_DIR").ok().map(PathBuf::from);
    select_fnm_dir(env_dir, get_fnm_dir_candidates())
}

fn select_fnm_dir(env_dir: Option<PathBuf>, candidates: Vec<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = env_dir.filter(|path| path.exists()) {
        return Some(path);
    }

    candidates
        .iter()
        .find(|candidate| candidate.join("node-versions").exists())
        .cloned()
        .or_else(|| candidates.into_iter().find(|candidate| candidate.exists()))
}

fn get_fnm_dir_candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
        paths.push(PathBuf::from(xdg_data).join("fnm"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".local").join("share").join("fnm"));
        paths.push(home.join(".fnm"));
        #[cfg(target_os = "macos")]
        paths.push(home.join("Library").join("Application Support").join("fnm"));
    }

    paths
}

fn get_common_fnm_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".fnm").join("fnm"));
        paths.push(home.join(".local").join("share").join("fnm").join("fnm"));
        paths.push(home.join(".local").join("bin").join("fnm"));
        paths.push(home.join(".cargo").join("bin").join("fnm"));
    }

    #[cfg(target_os = "macos")]
    paths.push(PathBuf::from("/opt/homebrew/bin/fnm"));

    #[cfg(unix)]
    {
        paths.push(PathBuf::from("/usr/local/bin/fnm"));
        paths.push(PathBuf::from("/home/linuxbrew/.linuxbrew/bin/fnm"));
    }

    paths
}

async fn get_fnm_version(path: &Path) -> Option<String> {
    let mut cmd = Command::new(path);
    cmd.arg("--version");
    let output = capture(cmd).await.ok()?;

    let trimmed = output.stdout.trim();
    Some(trimmed.strip_prefix("fnm ").unwrap_or(trimmed).to_string())
}
