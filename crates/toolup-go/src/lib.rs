//! Go toolchain backend.
//!
//! Releases come from Homebrew when it is present (`go@X.Y`, `go`) and
//! otherwise from the `golang.org/dl` wrappers, which unpack SDKs under
//! `~/sdk/goX.Y.Z`. The SDK selected by `~/sdk/current` is what this backend
//! activates for non-Homebrew installs.

mod backend;
mod detection;
mod provider;
mod releases;
mod sdk;
mod tools;
mod version;

pub use backend::GoBackend;
pub use provider::GoProvider;
pub use releases::{GoRelease, latest_stable};
pub use version::{parse_go_version, parse_module_path};
