use async_trait::async_trait;
use log::{debug, warn};
use toolup_backend::{PackageRequirement, ToolchainVersion};

use crate::constraint::allows;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    /// An operator can answer a confirmation prompt.
    Interactive,
    /// Nobody is watching; incompatible upgrades are refused.
    NonInteractive,
}

/// A package whose declared constraint excludes the upgrade candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incompatibility {
    pub package: String,
    pub constraint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    WarnConfirm(Vec<Incompatibility>),
    Block(Vec<Incompatibility>),
}

/// Asks the operator whether to proceed despite incompatibilities.
#[async_trait]
pub trait Confirm: Send + Sync {
    fn mode(&self) -> GateMode;

    async fn confirm(&self, prompt: &str, details: &[String]) -> bool;
}

/// Answers "no" to everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractive;

#[async_trait]
impl Confirm for NonInteractive {
    fn mode(&self) -> GateMode {
        GateMode::NonInteractive
    }

    async fn confirm(&self, _prompt: &str, _details: &[String]) -> bool {
        false
    }
}

/// Decide whether moving from `current` to `candidate` may break `packages`.
///
/// Packages in isolated environments are exempt. A constraint that cannot
/// be parsed is logged and does not count against the upgrade.
#[must_use]
pub fn check_upgrade_safe(
    current: &ToolchainVersion,
    candidate: &ToolchainVersion,
    packages: &[PackageRequirement],
    mode: GateMode,
) -> GateDecision {
    let mut incompatible = Vec::new();

    for package in packages {
        if package.isolated {
            debug!("{}: isolated, exempt from gate", package.name);
            continue;
        }
        let Some(constraint) = package.constraint.as_deref() else {
            continue;
        };
        match allows(constraint, package.dialect, candidate) {
            Ok(true) => {}
            Ok(false) => incompatible.push(Incompatibility {
                package: package.name.clone(),
                constraint: constraint.to_string(),
            }),
            Err(error) => warn!("{}: {error}", package.name),
        }
    }

    if incompatible.is_empty() {
        debug!(
            "{current} -> {candidate}: {} package(s) checked, none incompatible",
            packages.len()
        );
        return GateDecision::Allow;
    }

    match mode {
        GateMode::Interactive => GateDecision::WarnConfirm(incompatible),
        GateMode::NonInteractive => GateDecision::Block(incompatible),
    }
}

#[cfg(test)]
mod tests {
    use toolup_backend::{ConstraintDialect, PackageRequirement, ToolchainVersion};

    use super::{GateDecision, GateMode, Incompatibility, check_upgrade_safe};

    fn v(text: &str) -> ToolchainVersion {
        text.parse().expect("valid version")
    }

    fn package(name: &str, constraint: Option<&str>, isolated: bool) -> PackageRequirement {
        PackageRequirement {
            name: name.to_string(),
            constraint: constraint.map(str::to_string),
            dialect: ConstraintDialect::Pep440,
            isolated,
        }
    }

    #[test]
    fn no_constraints_allows_upgrade() {
        let packages = vec![package("requests", None, false)];

        let decision =
            check_upgrade_safe(&v("3.11.8"), &v("3.12.1"), &packages, GateMode::NonInteractive);

        assert_eq!(decision, GateDecision::Allow);
    }

    #[test]
    fn excluding_constraint_blocks_when_non_interactive() {
        let packages = vec![
            package("requests", Some(">=3.7"), false),
            package("numba", Some(">=3.9,<3.12"), false),
        ];

        let decision =
            check_upgrade_safe(&v("3.11.8"), &v("3.12.1"), &packages, GateMode::NonInteractive);

        assert_eq!(
            decision,
            GateDecision::Block(vec![Incompatibility {
                package: "numba".to_string(),
                constraint: ">=3.9,<3.12".to_string(),
            }])
        );
    }

    #[test]
    fn excluding_constraint_asks_when_interactive() {
        let packages = vec![package("numba", Some("<3.12"), false)];

        let decision =
            check_upgrade_safe(&v("3.11.8"), &v("3.12.1"), &packages, GateMode::Interactive);

        assert!(matches!(decision, GateDecision::WarnConfirm(ref set) if set.len() == 1));
    }

    #[test]
    fn isolated_packages_are_exempt() {
        let packages = vec![package("black", Some("<3.12"), true)];

        let decision =
            check_upgrade_safe(&v("3.11.8"), &v("3.12.1"), &packages, GateMode::NonInteractive);

        assert_eq!(decision, GateDecision::Allow);
    }

    #[test]
    fn unparsable_constraint_does_not_block() {
        let packages = vec![package("odd", Some("banana"), false)];

        let decision =
            check_upgrade_safe(&v("3.11.8"), &v("3.12.1"), &packages, GateMode::NonInteractive);

        assert_eq!(decision, GateDecision::Allow);
    }

    #[test]
    fn npm_engines_are_evaluated_in_their_dialect() {
        let packages = vec![PackageRequirement {
            name: "legacy-cli".to_string(),
            constraint: Some("^16 || ^18".to_string()),
            dialect: ConstraintDialect::Npm,
            isolated: false,
        }];

        let decision =
            check_upgrade_safe(&v("18.19.0"), &v("20.11.1"), &packages, GateMode::NonInteractive);

        assert!(matches!(decision, GateDecision::Block(_)));
    }
}
