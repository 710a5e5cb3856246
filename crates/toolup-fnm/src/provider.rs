use std::path::PathBuf;

use async_trait::async_trait;

use toolup_backend::{
    BackendDetection, BackendOptions, BackendProvider, ToolchainBackend,
};

use crate::backend::FnmBackend;
use crate::detection::{detect_fnm, detect_fnm_dir};

#[derive(Default)]
pub struct FnmProvider;

impl FnmProvider {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BackendProvider for FnmProvider {
    fn name(&self) -> &'static str {
        "node"
    }

    fn display_name(&self) -> &'static str {
        "Node.js (fnm)"
    }

    async fn detect(&self) -> BackendDetection {
        detect_fnm().await
    }

    fn create_backend(
        &self,
        detection: &BackendDetection,
        _options: BackendOptions,
    ) -> Box<dyn ToolchainBackend> {
        let path = detection
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("fnm"));
        let data_dir = detection.data_dir.clone().or_else(detect_fnm_dir);
        Box::new(FnmBackend::new(path, data_dir))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use toolup_backend::{BackendDetection, BackendOptions, BackendProvider};

    use super::FnmProvider;

    #[test]
    fn provider_metadata_is_stable() {
        let provider = FnmProvider::new();

        assert_eq!(provider.name(), "node");
        assert_eq!(provider.display_name(), "Node.js (fnm)");
    }

    #[test]
    fn create_backend_uses_detected_path() {
        let provider = FnmProvider::new();
        let detection = BackendDetection {
            found: true,
            path: Some(PathBuf::from("/opt/homebrew/bin/fnm")),
            version: Some("1.38.1".to_string()),
            in_path: false,
            data_dir: Some(PathBuf::from("/tmp/fnm-data")),
        };

        let backend = provider.create_backend(&detection, BackendOptions::default());

        assert_eq!(backend.name(), "node");
        assert_eq!(backend.cache_key(), "node");
    }
}
