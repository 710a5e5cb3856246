use std::time::SystemTime;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;
use toolup_backend::{
    ActiveToolchain, ActiveToolchainState, BackendError, FailureKind, InstallOutcome,
    InstallPath, PackageManager, ToolchainBackend, ToolchainVersion,
};

use crate::cache::{Resolution, VersionCache};
use crate::gate::{Confirm, GateDecision, Incompatibility, check_upgrade_safe};
use crate::guard::{Guard, Timeouts};
use crate::protection::ProtectionClassifier;
use crate::retention::{RetentionPolicy, SweepReport, sweep};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionSettings {
    pub enabled: bool,
    pub keep: Vec<String>,
}

/// One backend's slot in the run, with its cleanup preferences.
pub struct BackendTurn {
    pub backend: Box<dyn ToolchainBackend>,
    pub retention: RetentionSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    AlreadyCurrent,
    Upgraded,
    SkippedProtected,
    SkippedIncompatible { packages: Vec<Incompatibility> },
    Unavailable,
    Failed,
}

impl UpgradeOutcome {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::AlreadyCurrent => "already current",
            Self::Upgraded => "upgraded",
            Self::SkippedProtected => "skipped (protected)",
            Self::SkippedIncompatible { .. } => "skipped (incompatible packages)",
            Self::Unavailable => "unavailable",
            Self::Failed => "failed",
        }
    }
}

/// Terminal state of one backend's turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeResult {
    pub backend: String,
    pub outcome: UpgradeOutcome,
    pub from: Option<ToolchainVersion>,
    pub to: Option<ToolchainVersion>,
    pub install_path: Option<InstallPath>,
    pub error: Option<BackendError>,
    pub used_cached_latest: bool,
}

impl UpgradeResult {
    fn new(backend: &str) -> Self {
        Self {
            backend: backend.to_string(),
            outcome: UpgradeOutcome::Failed,
            from: None,
            to: None,
            install_path: None,
            error: None,
            used_cached_latest: false,
        }
    }

    fn finish(mut self, outcome: UpgradeOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    fn fail(mut self, error: BackendError) -> Self {
        self.outcome = if error.kind() == FailureKind::Unavailable {
            UpgradeOutcome::Unavailable
        } else {
            UpgradeOutcome::Failed
        };
        self.error = Some(error);
        self
    }

    /// Outcomes the operator has to look at.
    #[must_use]
    pub fn is_problem(&self) -> bool {
        matches!(
            self.outcome,
            UpgradeOutcome::Failed | UpgradeOutcome::Unavailable
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolReport {
    pub reinstalled: Vec<String>,
    /// Tools whose source package could not be recovered.
    pub skipped: Vec<String>,
    pub failed: Vec<(String, BackendError)>,
    pub inventory_error: Option<BackendError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendReport {
    pub result: UpgradeResult,
    pub sweep: Option<SweepReport>,
    pub tools: Option<ToolReport>,
}

impl BackendReport {
    #[must_use]
    pub fn has_problems(&self) -> bool {
        let sweep_failed = match &self.sweep {
            Some(SweepReport::Failed(_)) => true,
            Some(SweepReport::Swept { failed, .. }) => !failed.is_empty(),
            _ => false,
        };
        self.result.is_problem()
            || sweep_failed
            || self
                .tools
                .as_ref()
                .is_some_and(|tools| !tools.failed.is_empty() || tools.inventory_error.is_some())
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reports: Vec<BackendReport>,
    /// Backends never reached because the run was cancelled.
    pub untouched: Vec<String>,
}

impl RunSummary {
    #[must_use]
    pub fn result(&self, backend: &str) -> Option<&UpgradeResult> {
        self.reports
            .iter()
            .map(|report| &report.result)
            .find(|result| result.backend == backend)
    }

    pub fn problems(&self) -> impl Iterator<Item = &BackendReport> {
        self.reports.iter().filter(|report| report.has_problems())
    }
}

/// Drives each backend through detect, resolve, gate, install, activate and
/// verify, then sweeps old versions. Backends run strictly one after another
/// and a failure in one never stops the others.
pub struct Orchestrator {
    cache: VersionCache,
    classifier: ProtectionClassifier,
    confirm: Box<dyn Confirm>,
    package_manager: Option<Box<dyn PackageManager>>,
    timeouts: Timeouts,
    cancel: CancellationToken,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        cache: VersionCache,
        classifier: ProtectionClassifier,
        confirm: Box<dyn Confirm>,
    ) -> Self {
        Self {
            cache,
            classifier,
            confirm,
            package_manager: None,
            timeouts: Timeouts::default(),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_package_manager(mut self, package_manager: Box<dyn PackageManager>) -> Self {
        self.package_manager = Some(package_manager);
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn run(
        &self,
        turns: &[BackendTurn],
        state: &mut ActiveToolchainState,
    ) -> RunSummary {
        let started_at = Utc::now();
        let guard = Guard::new(self.cancel.clone(), self.timeouts.clone());
        let mut reports = Vec::with_capacity(turns.len());
        let mut untouched = Vec::new();

        for turn in turns {
            let backend = turn.backend.as_ref();
            if guard.is_cancelled() {
                untouched.push(backend.name().to_string());
                continue;
            }
            info!("{}: starting", backend.name());
            reports.push(self.run_turn(turn, state, &guard).await);
        }

        if !untouched.is_empty() {
            warn!("Run cancelled; not processed: {}", untouched.join(", "));
        }

        RunSummary {
            started_at,
            finished_at: Utc::now(),
            reports,
            untouched,
        }
    }

    async fn run_turn(
        &self,
        turn: &BackendTurn,
        state: &mut ActiveToolchainState,
        guard: &Guard,
    ) -> BackendReport {
        let backend = turn.backend.as_ref();
        let result = self.upgrade(backend, state, guard).await;
        info!("{}: {}", result.backend, result.outcome.label());

        if !matches!(
            result.outcome,
            UpgradeOutcome::AlreadyCurrent | UpgradeOutcome::Upgraded
        ) {
            return BackendReport {
                result,
                sweep: None,
                tools: None,
            };
        }

        let policy = RetentionPolicy {
            enabled: turn.retention.enabled,
            active: state.get(backend.name()).cloned(),
            keep: turn.retention.keep.clone(),
        };
        let sweep = sweep(backend, &policy, &self.classifier, guard).await;

        let tools = if backend.capabilities().tool_inventory {
            Some(refresh_tools(backend, guard).await)
        } else {
            None
        };

        BackendReport {
            result,
            sweep: Some(sweep),
            tools,
        }
    }

    async fn upgrade(
        &self,
        backend: &dyn ToolchainBackend,
        state: &mut ActiveToolchainState,
        guard: &Guard,
    ) -> UpgradeResult {
        let name = backend.name();
        let mut result = UpgradeResult::new(name);

        let current = match guard.operation("detect", backend.detect()).await {
            Ok(current) => current,
            Err(error) => {
                warn!("{name}: detection failed: {error}");
                return result.fail(error);
            }
        };

        if let Some(active) = &current {
            debug!("{name}: active {} at {}", active.version, active.path.display());
            result.from = Some(active.version.clone());
            state.record(name, active.clone());
            if self.classifier.is_protected(&active.path) {
                info!("{name}: {} is protected, leaving it alone", active.path.display());
                return result.finish(UpgradeOutcome::SkippedProtected);
            }
        } else {
            info!("{name}: no active toolchain");
            state.forget(name);
        }

        let key = backend.cache_key();
        let resolution = self
            .cache
            .resolve_latest(&key, SystemTime::now(), || {
                guard.fetch("resolve latest", || backend.resolve_latest())
            })
            .await;
        result.used_cached_latest = resolution.from_cache();
        let latest = match resolution {
            Resolution::Cached(version)
            | Resolution::Resolved(version)
            | Resolution::StaleFallback { version, .. } => version,
            Resolution::Unknown(error) => return result.fail(error),
        };

        if let Some(active) = &current
            && latest <= active.version
        {
            result.to = Some(active.version.clone());
            return result.finish(UpgradeOutcome::AlreadyCurrent);
        }

        if backend.capabilities().gated
            && let Some(active) = &current
            && let Some(blocked) = self.gate(backend, active, &latest, guard).await
        {
            return match blocked {
                Ok(packages) => {
                    result.to = Some(latest);
                    result.finish(UpgradeOutcome::SkippedIncompatible { packages })
                }
                Err(error) => result.fail(error),
            };
        }

        let install_path = match self
            .install(backend, current.as_ref(), &latest, guard)
            .await
        {
            Ok(path) => path,
            Err(error) => {
                warn!("{name}: install of {latest} failed: {error}");
                return result.fail(error);
            }
        };
        result.install_path = Some(install_path);

        if let Err(error) = guard.operation("activate", backend.activate(&latest)).await {
            warn!("{name}: activating {latest} failed: {error}");
            return result.fail(error);
        }

        match guard.operation("detect", backend.detect()).await {
            Ok(Some(active)) if active.version == latest => {
                info!("{name}: now on {latest}");
                result.to = Some(active.version.clone());
                state.record(name, active);
                result.finish(UpgradeOutcome::Upgraded)
            }
            Ok(detected) => {
                let error = BackendError::VerificationMismatch {
                    expected: latest.to_string(),
                    detected: detected
                        .map_or_else(|| "nothing".to_string(), |active| active.version.to_string()),
                };
                warn!("{name}: {error}");
                result.fail(error)
            }
            Err(error) => result.fail(error),
        }
    }

    /// `None` lets the upgrade proceed; `Some(Ok(_))` names the packages it
    /// would break; `Some(Err(_))` means the package set could not be read.
    async fn gate(
        &self,
        backend: &dyn ToolchainBackend,
        active: &ActiveToolchain,
        latest: &ToolchainVersion,
        guard: &Guard,
    ) -> Option<Result<Vec<Incompatibility>, BackendError>> {
        let name = backend.name();
        let packages = match guard
            .operation("list packages", backend.installed_packages())
            .await
        {
            Ok(packages) => packages,
            Err(error) => {
                warn!("{name}: cannot list installed packages, not upgrading: {error}");
                return Some(Err(error));
            }
        };

        match check_upgrade_safe(&active.version, latest, &packages, self.confirm.mode()) {
            GateDecision::Allow => None,
            GateDecision::Block(incompatible) => {
                warn!(
                    "{name}: {} package(s) incompatible with {latest}, skipping",
                    incompatible.len()
                );
                Some(Ok(incompatible))
            }
            GateDecision::WarnConfirm(incompatible) => {
                let details: Vec<String> = incompatible
                    .iter()
                    .map(|item| format!("{} requires {}", item.package, item.constraint))
                    .collect();
                let prompt = format!(
                    "Upgrading {name} {} -> {latest} may break these packages. Continue?",
                    active.version
                );
                let accepted = tokio::select! {
                    biased;
                    () = guard.cancelled() => {
                        return Some(Err(BackendError::Cancelled {
                            operation: "confirm upgrade",
                        }));
                    }
                    accepted = self.confirm.confirm(&prompt, &details) => accepted,
                };
                if accepted {
                    info!("{name}: operator accepted incompatible upgrade");
                    None
                } else {
                    Some(Ok(incompatible))
                }
            }
        }
    }

    async fn install(
        &self,
        backend: &dyn ToolchainBackend,
        current: Option<&ActiveToolchain>,
        latest: &ToolchainVersion,
        guard: &Guard,
    ) -> Result<InstallPath, BackendError> {
        let name = backend.name();
        let variants = backend.package_variants(latest);

        if let Some(package_manager) = &self.package_manager
            && !variants.is_empty()
        {
            let memo_key = format!("{}-variant", backend.cache_key());
            let variants = memoized_first(variants, self.cache.recall(&memo_key));
            let mut last_error = None;

            for variant in variants {
                info!(
                    "{name}: trying {} package {variant}",
                    package_manager.name()
                );
                let outcome = match guard
                    .install("package install", package_manager.install(&variant))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(error) => {
                        info!("{name}: package {variant} failed: {error}");
                        last_error = Some(error);
                        continue;
                    }
                };

                match guard
                    .operation("list packages", package_manager.provides(&variant, latest))
                    .await
                {
                    Ok(true) => {
                        info!("{name}: {variant} via {}: {outcome:?}", package_manager.name());
                        if let Err(error) = self.cache.store(&memo_key, &variant) {
                            warn!("{name}: {error}");
                        }
                        return Ok(InstallPath::PackageManager { variant });
                    }
                    Ok(false) => {
                        info!("{name}: {variant} ({outcome:?}) does not provide {latest}");
                        last_error = Some(BackendError::unexpected_output(
                            "package install",
                            format!("{variant} does not provide {latest}"),
                        ));
                    }
                    Err(error) => {
                        info!("{name}: cannot confirm what {variant} installed: {error}");
                        last_error = Some(error);
                    }
                }
            }

            if current.is_some_and(|active| backend.owned_by_package_manager(active))
                && let Some(error) = last_error
            {
                return Err(error);
            }
            info!("{name}: package variants exhausted, using the version manager");
        }

        info!("{name}: installing {latest} with the version manager");
        match guard.install("install", backend.install(latest)).await? {
            InstallOutcome::Installed(path) => Ok(path),
            InstallOutcome::AlreadyPresent => {
                debug!("{name}: {latest} was already installed");
                Ok(InstallPath::VersionManager)
            }
        }
    }
}

fn memoized_first(mut variants: Vec<String>, memo: Option<String>) -> Vec<String> {
    if let Some(memo) = memo
        && let Some(index) = variants.iter().position(|variant| *variant == memo)
    {
        let winner = variants.remove(index);
        variants.insert(0, winner);
    }
    variants
}

async fn refresh_tools(backend: &dyn ToolchainBackend, guard: &Guard) -> ToolReport {
    let name = backend.name();
    let mut report = ToolReport::default();

    let tools = match guard.operation("list tools", backend.list_tools()).await {
        Ok(tools) => tools,
        Err(error) => {
            warn!("{name}: cannot list tools: {error}");
            report.inventory_error = Some(error);
            return report;
        }
    };

    let mut packages: Vec<String> = Vec::new();
    for tool in &tools {
        match guard.operation("inspect tool", backend.tool_origin(tool)).await {
            Ok(Some(package)) => {
                if !packages.contains(&package) {
                    packages.push(package);
                }
            }
            Ok(None) => {
                debug!("{name}: no package recorded in {}", tool.path.display());
                report.skipped.push(tool.name.clone());
            }
            Err(error) => {
                debug!("{name}: cannot inspect {}: {error}", tool.path.display());
                report.skipped.push(tool.name.clone());
            }
        }
    }

    for package in packages {
        if guard.is_cancelled() {
            break;
        }
        match guard
            .install("reinstall tool", backend.reinstall_tool(&package))
            .await
        {
            Ok(()) => {
                info!("{name}: reinstalled {package}");
                report.reinstalled.push(package);
            }
            Err(error) => {
                warn!("{name}: reinstalling {package} failed: {error}");
                report.failed.push((package, error));
            }
        }
    }

    report
}
