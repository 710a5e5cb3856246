mod backend;
mod detection;
mod provider;
mod version;

pub use backend::FnmBackend;
pub use provider::FnmProvider;
pub use version::{FnmListEntry, parse_current, parse_installed, parse_remote_lts};
