use std::path::{Path, PathBuf};

use tokio::process::Command;
use which::which;

use toolup_backend::BackendDetection;
use toolup_platform::capture;

pub(crate) async fn detect_pyenv() -> BackendDetection {
    let data_dir = detect_pyenv_root();

    let candidates = which("pyenv")
        .ok()
        .map(|path| (path, true))
        .into_iter()
        .chain(common_pyenv_paths(data_dir.as_deref()).into_iter().map(|path| (path, false)));

    for (path, in_path) in candidates {
        if path.exists() {
            let version = pyenv_version(&path).await;
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

pub(crate) fn detect_pyenv_root() -> Option<PathBuf> {
    let env_root = std::env::var("PYENV_ROOT").ok().map(PathBuf::from);
    select_pyenv_root(env_root, dirs::home_dir().map(|home| home.join(".pyenv")))
}

fn select_pyenv_root(env_root: Option<PathBuf>, default_root: Option<PathBuf>) -> Option<PathBuf> {
    env_root
        .filter(|path| path.exists())
        .or_else(|| default_root.filter(|path| path.exists()))
}

fn common_pyenv_paths(root: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(root) = root {
        paths.push(root.join("bin").join("pyenv"));
    }

    #[cfg(target_os = "macos")]
    paths.push(PathBuf::from("/opt/homebrew/bin/pyenv"));

    #[cfg(unix)]
    {
        paths.push(PathBuf::from("/usr/local/bin/pyenv"));
        paths.push(PathBuf::from("/home/linuxbrew/.linuxbrew/bin/pyenv"));
    }

    paths
}

async fn pyenv_version(path: &Path) -> Option<String> {
    let mut cmd = Command::new(path);
    cmd.arg("--version");
    let output = capture(cmd).await.ok()?;

    let trimmed = output.stdout.trim();
    Some(trimmed.strip_prefix("pyenv ").unwrap_or(trimmed).to_string())
}
