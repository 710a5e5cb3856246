use std::path::PathBuf;

use async_trait::async_trait;

use toolup_backend::{BackendDetection, BackendOptions, BackendProvider, ToolchainBackend};

use crate::backend::{Channel, RustupBackend};
use crate::detection::{detect_rustup, detect_rustup_home};

#[derive(Default)]
pub struct RustupProvider;

impl RustupProvider {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BackendProvider for RustupProvider {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn display_name(&self) -> &'static str {
        "Rust (rustup)"
    }

    async fn detect(&self) -> BackendDetection {
        detect_rustup().await
    }

    fn create_backend(
        &self,
        detection: &BackendDetection,
        options: BackendOptions,
    ) -> Box<dyn ToolchainBackend> {
        let path = detection
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("rustup"));
        let home = detection.data_dir.clone().or_else(detect_rustup_home);
        let channel = if options.unstable_channel {
            Channel::Nightly
        } else {
            Channel::Stable
        };
        Box::new(RustupBackend::new(path, home, channel))
    }
}
