use serde::{Deserialize, Serialize};

use toolup_backend::BackendProvider;
use toolup_fnm::FnmProvider;
use toolup_go::GoProvider;
use toolup_pyenv::PyenvProvider;
use toolup_rustup::RustupProvider;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Python,
    Node,
    Go,
    Rust,
}

impl BackendKind {
    /// Every backend in update order.
    pub const ALL: [Self; 4] = [Self::Python, Self::Node, Self::Go, Self::Rust];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Node => "node",
            Self::Go => "go",
            Self::Rust => "rust",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Infix of this backend's environment variables (`TOOLUP_<PREFIX>_KEEP`).
    pub fn env_prefix(self) -> String {
        self.as_str().to_ascii_uppercase()
    }

    pub fn provider(self, http_client: &reqwest::Client) -> Box<dyn BackendProvider> {
        match self {
            Self::Python => Box::new(PyenvProvider::new()),
            Self::Node => Box::new(FnmProvider::new()),
            Self::Go => Box::new(GoProvider::new(http_client.clone())),
            Self::Rust => Box::new(RustupProvider::new()),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
