mod backend;
mod detection;
mod provider;
mod version;

pub use backend::PyenvBackend;
pub use provider::PyenvProvider;
pub use version::{Distribution, parse_distributions, parse_install_list, parse_versions_bare};
