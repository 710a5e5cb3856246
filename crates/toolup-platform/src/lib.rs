mod homebrew;
mod paths;
mod process;

pub use homebrew::{Homebrew, parse_list_versions};
pub use paths::{AppPaths, AppPathsError};
pub use process::{ProcessError, ProcessOutput, capture, capture_accepting, describe};
