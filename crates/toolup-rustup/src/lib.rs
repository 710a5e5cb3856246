mod backend;
mod detection;
mod provider;
mod version;

pub use backend::{Channel, RustupBackend};
pub use provider::RustupProvider;
pub use version::{
    ToolchainName, parse_check, parse_rustc_version, parse_toolchain_list, split_toolchain_name,
};
