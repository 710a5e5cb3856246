use std::path::Path;

use toolup_backend::ToolBinary;

/// `goX.Y.Z` wrappers installed by `golang.org/dl` are SDK launchers, not tools.
fn is_sdk_wrapper(name: &str) -> bool {
    name.strip_prefix("go")
        .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
}

fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("exe"))
    }
}

/// Executables in `GOBIN`, sorted by name.
pub(crate) fn list_tool_binaries(gobin: &Path) -> Vec<ToolBinary> {
    let Ok(entries) = std::fs::read_dir(gobin) else {
        return Vec::new();
    };
    let mut tools: Vec<ToolBinary> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| is_executable(path))
        .filter_map(|path| {
            let name = path.file_stem()?.to_string_lossy().into_owned();
            (!is_sdk_wrapper(&name)).then_some(ToolBinary { name, path })
        })
        .collect();
    tools.sort_by(|a, b| a.name.cmp(&b.name));
    tools
}
