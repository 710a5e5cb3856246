use std::path::{Path, PathBuf};

use tokio::process::Command;
use which::which;

use toolup_backend::BackendDetection;
use toolup_platform::capture;

use crate::sdk::{SdkRoot, go_binary};

pub(crate) async fn detect_go() -> BackendDetection {
    let data_dir = SdkRoot::default_dir();

    let candidates = which("go")
        .ok()
        .map(|path| (path, true))
        .into_iter()
        .chain(common_go_paths(data_dir.as_deref()).into_iter().map(|path| (path, false)));

    for (path, in_path) in candidates {
        if path.exists() {
            let version = go_version(&path).await;
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

fn common_go_paths(sdk_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(sdk_dir) = sdk_dir {
        paths.push(go_binary(&sdk_dir.join("current")));
    }

    #[cfg(target_os = "macos")]
    paths.push(PathBuf::from("/opt/homebrew/bin/go"));

    #[cfg(unix)]
    {
        paths.push(PathBuf::from("/usr/local/bin/go"));
        paths.push(PathBuf::from("/usr/local/go/bin/go"));
        paths.push(PathBuf::from("/home/linuxbrew/.linuxbrew/bin/go"));
    }

    paths
}

async fn go_version(path: &Path) -> Option<String> {
    let mut cmd = Command::new(path);
    cmd.arg("version");
    let output = capture(cmd).await.ok()?;
    crate::version::parse_go_version(&output.stdout)
        .ok()
        .map(|version| version.to_string())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::common_go_paths;

    #[test]
    fn sdk_current_is_the_first_fallback() {
        let paths = common_go_paths(Some(Path::new("/home/dev/sdk")));

        assert!(paths[0].starts_with("/home/dev/sdk/current"));
    }
}
