use std::path::{Path, PathBuf};

use tokio::process::Command;
use which::which;

use toolup_backend::BackendDetection;
use toolup_platform::capture;

pub(crate) async fn detect_rustup() -> BackendDetection {
    let data_dir = detect_rustup_home();
    let cargo_home = std::env::var("CARGO_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".cargo")));

    let candidates = which("rustup")
        .ok()
        .map(|path| (path, true))
        .into_iter()
        .chain(
            common_rustup_paths(cargo_home.as_deref())
                .into_iter()
                .map(|path| (path, false)),
        );

    for (path, in_path) in candidates {
        if path.exists() {
            let version = rustup_version(&path).await;
            return BackendDetection {
                found: true,
                path: Some(path),
                version,
                in_path,
                data_dir,
            };
        }
    }

    BackendDetection {
        data_dir,
        ..BackendDetection::default()
    }
}

pub(crate) fn detect_rustup_home() -> Option<PathBuf> {
    let env_home = std::env::var("RUSTUP_HOME").ok().map(PathBuf::from);
    env_home
        .filter(|path| path.exists())
        .or_else(|| dirs::home_dir().map(|home| home.join(".rustup")))
        .filter(|path| path.exists())
}

fn common_rustup_paths(cargo_home: Option<&Path>) -> Vec<PathBuf> {
    let binary = if cfg!(windows) { "rustup.exe" } else { "rustup" };
    let mut paths = Vec::new();
    if let Some(cargo_home) = cargo_home {
        paths.push(cargo_home.join("bin").join(binary));
    }

    #[cfg(target_os = "macos")]
    paths.push(PathBuf::from("/opt/homebrew/bin/rustup"));

    #[cfg(unix)]
    paths.push(PathBuf::from("/usr/local/bin/rustup"));

    paths
}

/// `rustup 1.27.1 (54dd3d00f 2024-04-24)` into `1.27.1`.
fn parse_rustup_version(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("rustup "))
        .and_then(|rest| rest.split_whitespace().next())
        .map(str::to_string)
}

async fn rustup_version(path: &Path) -> Option<String> {
    let mut cmd = Command::new(path);
    cmd.arg("--version");
    let output = capture(cmd).await.ok()?;
    parse_rustup_version(&output.stdout)
}
