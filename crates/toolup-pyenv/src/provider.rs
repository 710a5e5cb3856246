use std::path::PathBuf;

use async_trait::async_trait;

use toolup_backend::{BackendDetection, BackendOptions, BackendProvider, ToolchainBackend};

use crate::backend::PyenvBackend;
use crate::detection::{detect_pyenv, detect_pyenv_root};

#[derive(Default)]
pub struct PyenvProvider;

impl PyenvProvider {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BackendProvider for PyenvProvider {
    fn name(&self) -> &'static str {
        "python"
    }

    fn display_name(&self) -> &'static str {
        "Python (pyenv)"
    }

    async fn detect(&self) -> BackendDetection {
        detect_pyenv().await
    }

    fn create_backend(
        &self,
        detection: &BackendDetection,
        _options: BackendOptions,
    ) -> Box<dyn ToolchainBackend> {
        let path = detection
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("pyenv"));
        let root = detection.data_dir.clone().or_else(detect_pyenv_root);
        Box::new(PyenvBackend::new(path, root))
    }
}
