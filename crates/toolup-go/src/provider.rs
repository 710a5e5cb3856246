use std::path::PathBuf;

use async_trait::async_trait;
use log::debug;

use toolup_backend::{BackendDetection, BackendOptions, BackendProvider, ToolchainBackend};
use toolup_platform::Homebrew;

use crate::backend::GoBackend;
use crate::detection::detect_go;
use crate::sdk::SdkRoot;

pub struct GoProvider {
    client: reqwest::Client,
}

impl GoProvider {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BackendProvider for GoProvider {
    fn name(&self) -> &'static str {
        "go"
    }

    fn display_name(&self) -> &'static str {
        "Go"
    }

    async fn detect(&self) -> BackendDetection {
        detect_go().await
    }

    fn create_backend(
        &self,
        detection: &BackendDetection,
        _options: BackendOptions,
    ) -> Box<dyn ToolchainBackend> {
        let go = detection.path.clone().unwrap_or_else(|| PathBuf::from("go"));
        let sdk_dir = detection
            .data_dir
            .clone()
            .or_else(SdkRoot::default_dir)
            .unwrap_or_else(|| PathBuf::from("sdk"));
        let backend = GoBackend::new(go, sdk_dir, self.client.clone());

        match Homebrew::locate() {
            Some(homebrew) => {
                debug!("Go installs may use Homebrew at {}", homebrew.path().display());
                Box::new(backend.with_homebrew(homebrew))
            }
            None => Box::new(backend),
        }
    }
}
