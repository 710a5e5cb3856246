use std::path::{Path, PathBuf};

/// Install roots owned by the operating system or its vendor tooling.
const SYSTEM_ROOTS: &[&str] = &[
    "/usr/bin",
    "/usr/sbin",
    "/usr/lib",
    "/usr/lib64",
    "/usr/libexec",
    "/usr/share",
    "/bin",
    "/sbin",
    "/lib",
    "/lib64",
    "/System",
    "/Library/Developer/CommandLineTools",
    "/Applications/Xcode.app",
    "/snap",
];

/// Decides whether a toolchain path belongs to the OS and must never be
/// modified or removed.
#[derive(Debug, Clone)]
pub struct ProtectionClassifier {
    roots: Vec<PathBuf>,
}

impl Default for ProtectionClassifier {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ProtectionClassifier {
    /// Built-in system roots plus `extra` operator-supplied roots.
    #[must_use]
    pub fn new(extra: Vec<PathBuf>) -> Self {
        let mut roots: Vec<PathBuf> = SYSTEM_ROOTS.iter().map(PathBuf::from).collect();
        for root in extra {
            if !root.as_os_str().is_empty() && !roots.contains(&root) {
                roots.push(root);
            }
        }
        Self { roots }
    }

    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Symlinks are followed first, so a shim in a user directory pointing
    /// into `/usr/bin` is protected too.
    #[must_use]
    pub fn is_protected(&self, path: &Path) -> bool {
        if self.is_protected_resolved(path) {
            return true;
        }
        match std::fs::canonicalize(path) {
            Ok(resolved) => self.is_protected_resolved(&resolved),
            Err(_) => false,
        }
    }

    /// Classify `path` as given, without touching the filesystem.
    #[must_use]
    pub fn is_protected_resolved(&self, path: &Path) -> bool {
        self.roots.iter().any(|root| path.starts_with(root))
    }
}
