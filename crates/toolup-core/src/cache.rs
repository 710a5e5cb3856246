use std::collections::HashMap;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use log::{debug, info, warn};
use thiserror::Error;
use toolup_backend::{BackendError, ToolchainVersion};

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to write cache entry {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Fresh { value: String, age: Duration },
    Stale { value: String, age: Duration },
    Missing,
}

/// Where a "latest available" answer came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Cache entry within its TTL; no lookup was made.
    Cached(ToolchainVersion),
    /// Fresh lookup, now stored.
    Resolved(ToolchainVersion),
    /// Lookup failed; the expired cache entry is used instead.
    StaleFallback {
        version: ToolchainVersion,
        error: BackendError,
    },
    /// Lookup failed and nothing was cached.
    Unknown(BackendError),
}

impl Resolution {
    #[must_use]
    pub fn version(&self) -> Option<&ToolchainVersion> {
        match self {
            Self::Cached(version) | Self::Resolved(version) => Some(version),
            Self::StaleFallback { version, .. } => Some(version),
            Self::Unknown(_) => None,
        }
    }

    #[must_use]
    pub fn from_cache(&self) -> bool {
        matches!(self, Self::Cached(_) | Self::StaleFallback { .. })
    }
}

/// One small file per key under `dir`, holding the last resolved value.
/// The file's mtime is the entry's timestamp.
#[derive(Debug, Clone)]
pub struct VersionCache {
    dir: PathBuf,
    default_ttl: Duration,
    ttl_overrides: HashMap<String, Duration>,
}

impl VersionCache {
    #[must_use]
    pub fn new(dir: PathBuf, default_ttl: Duration) -> Self {
        Self {
            dir,
            default_ttl,
            ttl_overrides: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_ttl_override(mut self, key: impl Into<String>, ttl: Duration) -> Self {
        self.ttl_overrides.insert(key.into(), ttl);
        self
    }

    #[must_use]
    pub fn ttl_for(&self, key: &str) -> Duration {
        self.ttl_overrides
            .get(key)
            .copied()
            .unwrap_or(self.default_ttl)
    }

    #[must_use]
    pub fn entry_path(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file_name}.latest"))
    }

    /// Read the entry for `key`, classifying it against its TTL at `now`.
    #[must_use]
    pub fn lookup(&self, key: &str, now: SystemTime) -> CacheLookup {
        let path = self.entry_path(key);
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return CacheLookup::Missing;
        };
        let value = contents.trim();
        if value.is_empty() {
            return CacheLookup::Missing;
        }

        let modified = std::fs::metadata(&path)
            .and_then(|metadata| metadata.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);

        if age <= self.ttl_for(key) {
            CacheLookup::Fresh {
                value: value.to_string(),
                age,
            }
        } else {
            CacheLookup::Stale {
                value: value.to_string(),
                age,
            }
        }
    }

    /// Last stored value regardless of age.
    #[must_use]
    pub fn recall(&self, key: &str) -> Option<String> {
        match self.lookup(key, SystemTime::now()) {
            CacheLookup::Fresh { value, .. } | CacheLookup::Stale { value, .. } => Some(value),
            CacheLookup::Missing => None,
        }
    }

    /// # Errors
    /// Returns an error when the entry cannot be written.
    pub fn store(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        std::fs::create_dir_all(&self.dir)
            .and_then(|()| write_atomic(&path, format!("{value}\n").as_bytes()))
            .map_err(|source| CacheError::Write { path, source })
    }

    /// Resolve the latest version for `key`, consulting the cache first.
    ///
    /// Failed lookups never overwrite the stored entry.
    pub async fn resolve_latest<F, Fut>(&self, key: &str, now: SystemTime, lookup: F) -> Resolution
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ToolchainVersion, BackendError>>,
    {
        let previous = match self.lookup(key, now) {
            CacheLookup::Fresh { value, age } => match value.parse::<ToolchainVersion>() {
                Ok(version) => {
                    debug!("{key}: using cached latest {version} (age {}s)", age.as_secs());
                    return Resolution::Cached(version);
                }
                Err(error) => {
                    warn!("{key}: ignoring unreadable cache entry {value:?}: {error}");
                    None
                }
            },
            CacheLookup::Stale { value, age } => {
                debug!("{key}: cache entry expired (age {}s)", age.as_secs());
                value.parse::<ToolchainVersion>().ok()
            }
            CacheLookup::Missing => None,
        };

        match lookup().await {
            Ok(version) => {
                info!("{key}: latest available is {version}");
                if let Err(error) = self.store(key, version.as_str()) {
                    warn!("{key}: {error}");
                }
                Resolution::Resolved(version)
            }
            Err(error) => match previous {
                Some(version) => {
                    warn!("{key}: lookup failed ({error}), falling back to cached {version}");
                    Resolution::StaleFallback { version, error }
                }
                None => {
                    warn!("{key}: lookup failed and nothing is cached: {error}");
                    Resolution::Unknown(error)
                }
            },
        }
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "cache path has no parent")
    })?;

    let file_name = path
        .file_name()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("cache");
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    let pid = std::process::id();

    let mut tmp_path = None;
    for attempt in 0..16_u8 {
        let candidate = parent.join(format!(".{file_name}.{pid}.{timestamp}.{attempt}.tmp"));
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(mut file) => {
                file.write_all(data)?;
                file.sync_all()?;
                tmp_path = Some(candidate);
                break;
            }
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(error) => return Err(error),
        }
    }

    let Some(tmp_path) = tmp_path else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "failed to create unique cache temp file",
        ));
    };

    if let Err(error) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(error);
    }

    Ok(())
}
