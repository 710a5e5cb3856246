mod error;
mod package;
mod state;
mod traits;
mod types;

pub use error::{BackendError, FailureKind};
pub use package::{PackageManager, PackageOutcome, package_version};
pub use state::ActiveToolchainState;
pub use traits::{
    BackendCapabilities, BackendDetection, BackendOptions, BackendProvider, ToolchainBackend,
};
pub use types::{
    ActiveToolchain, ConstraintDialect, InstallHandle, InstallOutcome, InstallPath,
    InstalledVersion, PackageRequirement, ToolBinary, ToolchainVersion, VersionParseError,
    normalize_version_text,
};
