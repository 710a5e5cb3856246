//! Toolchain lifecycle logic shared by every backend.
//!
//! - [`VersionCache`]: TTL-bounded memo of "latest available version" lookups.
//! - [`ProtectionClassifier`]: path-based detection of OS-owned installs.
//! - [`check_upgrade_safe`]: the compatibility gate for interpreter upgrades.
//! - [`Orchestrator`]: the per-backend detect/resolve/install/verify state machine.
//! - [`sweep`]: retention of installed versions after an upgrade.

mod cache;
mod constraint;
mod gate;
mod guard;
mod inspect;
mod orchestrator;
mod protection;
mod retention;

pub use cache::{CacheError, CacheLookup, DEFAULT_TTL, Resolution, VersionCache};
pub use constraint::{ConstraintError, allows};
pub use gate::{Confirm, GateDecision, GateMode, Incompatibility, NonInteractive, check_upgrade_safe};
pub use guard::{Guard, Timeouts};
pub use inspect::{BackendStatus, Inventory, StatusReport, inventory, verify_backend};
pub use orchestrator::{
    BackendReport, BackendTurn, Orchestrator, RetentionSettings, RunSummary, ToolReport,
    UpgradeOutcome, UpgradeResult,
};
pub use protection::ProtectionClassifier;
pub use retention::{
    RetentionPolicy, SweepPlan, SweepReport, normalize_keep_list, plan_sweep, sweep,
};
