use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use toolup_backend::BackendOptions;
use toolup_core::{RetentionSettings, Timeouts, normalize_keep_list};

use crate::backend_kind::BackendKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_hours: u64,

    /// Per cache key (`go`, `rust-nightly`, ...) TTL in hours.
    #[serde(default)]
    pub cache_ttl_overrides_hours: HashMap<String, u64>,

    #[serde(default = "default_install_timeout")]
    pub install_timeout_secs: u64,

    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_retry_delays")]
    pub fetch_retry_delays_secs: Vec<u64>,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,

    /// Added to the built-in list of system-owned roots.
    #[serde(default)]
    pub protected_paths: Vec<PathBuf>,

    #[serde(default, deserialize_with = "deserialize_backend_settings")]
    pub backends: HashMap<BackendKind, BackendSettings>,

    #[serde(default)]
    pub rust_nightly: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default = "default_true")]
    pub cleanup_enabled: bool,

    #[serde(default)]
    pub keep: Vec<String>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            cleanup_enabled: true,
            keep: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    24
}

fn default_install_timeout() -> u64 {
    1800
}

fn default_operation_timeout() -> u64 {
    120
}

fn default_fetch_timeout() -> u64 {
    60
}

fn default_http_timeout() -> u64 {
    30
}

fn default_retry_delays() -> Vec<u64> {
    vec![0, 2, 5]
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

fn deserialize_backend_settings<'de, D>(
    deserializer: D,
) -> Result<HashMap<BackendKind, BackendSettings>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = HashMap::<String, BackendSettings>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(name, settings)| BackendKind::from_name(&name).map(|kind| (kind, settings)))
        .collect())
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            cache_ttl_hours: default_cache_ttl(),
            cache_ttl_overrides_hours: HashMap::new(),
            install_timeout_secs: default_install_timeout(),
            operation_timeout_secs: default_operation_timeout(),
            fetch_timeout_secs: default_fetch_timeout(),
            http_timeout_secs: default_http_timeout(),
            fetch_retry_delays_secs: default_retry_delays(),
            max_log_size_bytes: default_max_log_size_bytes(),
            protected_paths: Vec::new(),
            backends: HashMap::new(),
            rust_nightly: false,
        }
    }
}

/// `0/false/no/off` and `1/true/yes/on`, case-insensitive. Anything else is
/// treated as unset.
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "0" | "false" | "no" | "off" => Some(false),
        "1" | "true" | "yes" | "on" => Some(true),
        _ => None,
    }
}

impl AppSettings {
    /// Settings file merged with the process environment.
    pub fn load(settings_file: &Path) -> Self {
        let mut settings = Self::load_from(settings_file);
        settings.apply_env(|key| std::env::var(key).ok());
        settings
    }

    /// Read the settings file, falling back to defaults when it is missing
    /// or unreadable.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|error| {
                warn!("Ignoring invalid settings file {}: {error}", path.display());
                Self::default()
            }),
            Err(error) => {
                warn!("Could not read settings file {}: {error}", path.display());
                Self::default()
            }
        }
    }

    /// Apply `TOOLUP_*` overrides. Invalid values leave the setting as is.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for kind in BackendKind::ALL {
            let prefix = kind.env_prefix();
            if let Some(enabled) =
                lookup(&format!("TOOLUP_{prefix}_CLEANUP")).and_then(|value| parse_flag(&value))
            {
                self.backends.entry(kind).or_default().cleanup_enabled = enabled;
            }
            if let Some(keep) = lookup(&format!("TOOLUP_{prefix}_KEEP")) {
                self.backends
                    .entry(kind)
                    .or_default()
                    .keep
                    .extend(normalize_keep_list(&keep));
            }
        }

        if let Some(nightly) = lookup("TOOLUP_RUST_NIGHTLY").and_then(|value| parse_flag(&value)) {
            self.rust_nightly = nightly;
        }

        match lookup("TOOLUP_CACHE_TTL_HOURS").map(|value| value.trim().parse::<u64>()) {
            Some(Ok(hours)) => self.cache_ttl_hours = hours,
            Some(Err(error)) => warn!("Ignoring TOOLUP_CACHE_TTL_HOURS: {error}"),
            None => {}
        }

        if let Some(paths) = lookup("TOOLUP_PROTECTED_PATHS") {
            self.protected_paths.extend(
                std::env::split_paths(&paths).filter(|path| !path.as_os_str().is_empty()),
            );
        }
    }

    pub fn backend(&self, kind: BackendKind) -> BackendSettings {
        self.backends.get(&kind).cloned().unwrap_or_default()
    }

    pub fn retention_for(&self, kind: BackendKind, no_cleanup: bool) -> RetentionSettings {
        let backend = self.backend(kind);
        RetentionSettings {
            enabled: backend.cleanup_enabled && !no_cleanup,
            keep: normalize_keep_list(&backend.keep.join(",")),
        }
    }

    pub fn options_for(&self, kind: BackendKind) -> BackendOptions {
        BackendOptions {
            unstable_channel: kind == BackendKind::Rust && self.rust_nightly,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_hours.saturating_mul(3600))
    }

    pub fn cache_ttl_overrides(&self) -> impl Iterator<Item = (&str, Duration)> {
        self.cache_ttl_overrides_hours
            .iter()
            .map(|(key, hours)| (key.as_str(), Duration::from_secs(hours.saturating_mul(3600))))
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            install: Duration::from_secs(self.install_timeout_secs),
            operation: Duration::from_secs(self.operation_timeout_secs),
            fetch: Duration::from_secs(self.fetch_timeout_secs),
            fetch_retry_delays_secs: self.fetch_retry_delays_secs.clone(),
        }
    }
}
