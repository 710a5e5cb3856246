pub mod update;
pub mod verify;
pub mod versions;

use log::debug;
use tokio_util::sync::CancellationToken;

use toolup_backend::ToolchainBackend;
use toolup_core::{Guard, ProtectionClassifier, VersionCache};
use toolup_platform::AppPaths;

use crate::backend_kind::BackendKind;
use crate::settings::AppSettings;

/// Everything a command needs, built once per invocation.
pub struct Context {
    pub paths: AppPaths,
    pub settings: AppSettings,
    pub http_client: reqwest::Client,
    pub cancel: CancellationToken,
}

impl Context {
    pub fn cache(&self) -> VersionCache {
        self.settings.cache_ttl_overrides().fold(
            VersionCache::new(self.paths.version_cache_dir(), self.settings.cache_ttl()),
            |cache, (key, ttl)| cache.with_ttl_override(key, ttl),
        )
    }

    pub fn classifier(&self) -> ProtectionClassifier {
        ProtectionClassifier::new(self.settings.protected_paths.clone())
    }

    pub fn guard(&self) -> Guard {
        Guard::new(self.cancel.clone(), self.settings.timeouts())
    }

    /// Detect and construct backends in update order.
    pub async fn backends(
        &self,
        kinds: &[BackendKind],
    ) -> Vec<(BackendKind, Box<dyn ToolchainBackend>)> {
        let mut backends = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            let provider = kind.provider(&self.http_client);
            let detection = provider.detect().await;
            debug!(
                "{}: found={} path={:?} version={:?}",
                provider.display_name(),
                detection.found,
                detection.path,
                detection.version
            );
            let backend = provider.create_backend(&detection, self.settings.options_for(kind));
            backends.push((kind, backend));
        }
        backends
    }
}
