mod support;

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use support::{Call, FakePackageManager, MockBackend};
use tokio_util::sync::CancellationToken;
use toolup_backend::{
    ActiveToolchainState, BackendError, ConstraintDialect, InstallPath, PackageRequirement,
};
use toolup_core::{
    BackendTurn, CacheLookup, Confirm, GateMode, NonInteractive, Orchestrator,
    ProtectionClassifier, Resolution, RetentionSettings, RunSummary, SweepReport, Timeouts,
    UpgradeOutcome, VersionCache, normalize_keep_list,
};

struct AlwaysYes;

#[async_trait]
impl Confirm for AlwaysYes {
    fn mode(&self) -> GateMode {
        GateMode::Interactive
    }

    async fn confirm(&self, _prompt: &str, _details: &[String]) -> bool {
        true
    }
}

/// An operator who presses Ctrl-C instead of answering.
struct InterruptedPrompt(CancellationToken);

#[async_trait]
impl Confirm for InterruptedPrompt {
    fn mode(&self) -> GateMode {
        GateMode::Interactive
    }

    async fn confirm(&self, _prompt: &str, _details: &[String]) -> bool {
        self.0.cancel();
        std::future::pending().await
    }
}

fn cache(dir: &tempfile::TempDir) -> VersionCache {
    VersionCache::new(dir.path().to_path_buf(), Duration::from_secs(24 * 3600))
}

fn orchestrator(cache: VersionCache) -> Orchestrator {
    Orchestrator::new(cache, ProtectionClassifier::default(), Box::new(NonInteractive))
        .with_timeouts(Timeouts {
            fetch_retry_delays_secs: vec![0],
            ..Timeouts::default()
        })
}

fn turn(backend: &MockBackend, keep: &str) -> BackendTurn {
    BackendTurn {
        backend: backend.boxed(),
        retention: RetentionSettings {
            enabled: true,
            keep: normalize_keep_list(keep),
        },
    }
}

async fn run(orchestrator: &Orchestrator, turns: &[BackendTurn]) -> RunSummary {
    let mut state = ActiveToolchainState::new();
    orchestrator.run(turns, &mut state).await
}

fn outcome(summary: &RunSummary, backend: &str) -> UpgradeOutcome {
    summary
        .result(backend)
        .map(|result| result.outcome.clone())
        .expect("backend should be reported")
}

fn upper_bound(name: &str, constraint: &str) -> PackageRequirement {
    PackageRequirement {
        name: name.to_string(),
        constraint: Some(constraint.to_string()),
        dialect: ConstraintDialect::Pep440,
        isolated: false,
    }
}

#[tokio::test]
async fn second_run_is_already_current_and_removes_nothing() {
    let dir = tempfile::tempdir().expect("temporary directory should be created");
    let orchestrator = orchestrator(cache(&dir));
    let python = MockBackend::new("python", "3.11.8", &["3.10.13", "3.11.8"], "3.12.1").gated();
    let turns = [turn(&python, "")];

    let first = run(&orchestrator, &turns).await;
    assert_eq!(outcome(&first, "python"), UpgradeOutcome::Upgraded);
    assert_eq!(python.installed(), vec!["3.12.1"]);

    python.clear_calls();
    let second = run(&orchestrator, &turns).await;

    assert_eq!(outcome(&second, "python"), UpgradeOutcome::AlreadyCurrent);
    assert!(python.mutating_calls().is_empty());
    assert!(!python.calls().contains(&Call::ResolveLatest));
    let report = &second.reports[0];
    assert!(matches!(report.sweep, Some(ref sweep) if sweep.removed().is_empty()));
}

#[tokio::test]
async fn protected_installations_are_never_touched() {
    let dir = tempfile::tempdir().expect("temporary directory should be created");
    let orchestrator = orchestrator(cache(&dir));
    let python = MockBackend::new("python", "3.9.6", &["3.9.6", "3.8.0"], "3.12.1");
    python.state().root = PathBuf::from("/usr/bin");
    let turns = [turn(&python, "")];

    for _ in 0..2 {
        let summary = run(&orchestrator, &turns).await;
        assert_eq!(outcome(&summary, "python"), UpgradeOutcome::SkippedProtected);
        assert!(summary.reports[0].sweep.is_none());
    }

    assert!(python.mutating_calls().is_empty());
    assert_eq!(python.installed(), vec!["3.9.6", "3.8.0"]);
}

#[tokio::test]
async fn sweep_keeps_exactly_active_and_listed_versions() {
    let dir = tempfile::tempdir().expect("temporary directory should be created");
    let orchestrator = orchestrator(cache(&dir));
    let go = MockBackend::new("go", "1.22.1", &["1.20.14", "1.21.8", "1.22.1"], "1.22.1");
    let rust = MockBackend::new(
        "rust",
        "1.77.0",
        &["stable", "1.75.0", "1.76.0", "1.77.0"],
        "1.78.0",
    )
    .with_implicit(&["stable", "beta", "nightly"]);
    let turns = [turn(&go, "1.20.14"), turn(&rust, "")];

    let summary = run(&orchestrator, &turns).await;

    assert_eq!(outcome(&summary, "go"), UpgradeOutcome::AlreadyCurrent);
    assert_eq!(go.installed(), vec!["1.20.14", "1.22.1"]);
    assert_eq!(outcome(&summary, "rust"), UpgradeOutcome::Upgraded);
    assert_eq!(rust.installed(), vec!["stable", "1.78.0"]);
}

#[tokio::test]
async fn disabled_cleanup_removes_nothing() {
    let dir = tempfile::tempdir().expect("temporary directory should be created");
    let orchestrator = orchestrator(cache(&dir));
    let node = MockBackend::new("node", "20.11.1", &["18.19.0", "20.11.1"], "20.11.1");
    let turns = [BackendTurn {
        backend: node.boxed(),
        retention: RetentionSettings {
            enabled: false,
            keep: Vec::new(),
        },
    }];

    let summary = run(&orchestrator, &turns).await;

    assert_eq!(summary.reports[0].sweep, Some(SweepReport::Disabled));
    assert_eq!(node.installed(), vec!["18.19.0", "20.11.1"]);
}

#[tokio::test]
async fn failed_uninstall_does_not_stop_the_sweep() {
    let dir = tempfile::tempdir().expect("temporary directory should be created");
    let orchestrator = orchestrator(cache(&dir));
    let node = MockBackend::new("node", "20.11.1", &["16.20.2", "18.19.0", "20.11.1"], "20.11.1");
    node.state().fail_uninstall = vec!["16.20.2".to_string()];

    let summary = run(&orchestrator, &[turn(&node, "")]).await;

    let Some(SweepReport::Swept { removed, failed, .. }) = &summary.reports[0].sweep else {
        panic!("expected a completed sweep");
    };
    assert_eq!(removed, &vec!["18.19.0".to_string()]);
    assert_eq!(failed.len(), 1);
    assert!(summary.reports[0].has_problems());
}

#[test]
fn cache_entry_expires_exactly_at_ttl() {
    let dir = tempfile::tempdir().expect("temporary directory should be created");
    let ttl = Duration::from_secs(24 * 3600);
    let cache = cache(&dir);
    cache.store("python", "3.11.8").expect("store entry");
    let written = std::fs::metadata(cache.entry_path("python"))
        .and_then(|metadata| metadata.modified())
        .expect("entry mtime");
    let epsilon = Duration::from_millis(500);

    assert!(matches!(
        cache.lookup("python", written + ttl - epsilon),
        CacheLookup::Fresh { .. }
    ));
    assert!(matches!(
        cache.lookup("python", written + ttl + epsilon),
        CacheLookup::Stale { .. }
    ));
}

#[tokio::test]
async fn stale_entry_triggers_fresh_resolution() {
    let dir = tempfile::tempdir().expect("temporary directory should be created");
    let cache = cache(&dir);
    cache.store("node", "20.11.0").expect("store entry");
    let later = SystemTime::now() + Duration::from_secs(25 * 3600);

    let resolution = cache
        .resolve_latest("node", later, || async {
            Ok("20.11.1".parse().expect("valid version"))
        })
        .await;

    assert!(matches!(resolution, Resolution::Resolved(_)));
    assert_eq!(cache.recall("node").as_deref(), Some("20.11.1"));
}

#[tokio::test]
async fn incompatible_package_blocks_unattended_upgrade() {
    let dir = tempfile::tempdir().expect("temporary directory should be created");
    let orchestrator = orchestrator(cache(&dir));
    let python = MockBackend::new("python", "3.11.8", &["3.11.8"], "3.12.1").gated();
    python.state().packages = vec![
        upper_bound("requests", ">=3.8"),
        upper_bound("numba", "<3.12"),
    ];

    let summary = run(&orchestrator, &[turn(&python, "")]).await;

    let UpgradeOutcome::SkippedIncompatible { packages } = outcome(&summary, "python") else {
        panic!("expected the gate to block the upgrade");
    };
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0].package, "numba");
    let result = summary.result("python").expect("python result");
    assert_eq!(result.to.as_ref().map(ToString::to_string).as_deref(), Some("3.12.1"));
    assert_eq!(python.active().as_deref(), Some("3.11.8"));
    assert!(python.mutating_calls().is_empty());
    assert!(python.calls().contains(&Call::ResolveLatest));
}

#[tokio::test]
async fn confirmed_upgrade_proceeds_past_the_gate() {
    let dir = tempfile::tempdir().expect("temporary directory should be created");
    let orchestrator =
        Orchestrator::new(cache(&dir), ProtectionClassifier::default(), Box::new(AlwaysYes));
    let python = MockBackend::new("python", "3.11.8", &["3.11.8"], "3.12.1").gated();
    python.state().packages = vec![upper_bound("numba", "<3.12")];

    let summary = run(&orchestrator, &[turn(&python, "3.11.8")]).await;

    assert_eq!(outcome(&summary, "python"), UpgradeOutcome::Upgraded);
    assert_eq!(python.installed(), vec!["3.11.8", "3.12.1"]);
}

#[tokio::test]
async fn cancelling_at_the_prompt_stops_the_run() {
    let dir = tempfile::tempdir().expect("temporary directory should be created");
    let cancel = CancellationToken::new();
    let orchestrator = Orchestrator::new(
        cache(&dir),
        ProtectionClassifier::default(),
        Box::new(InterruptedPrompt(cancel.clone())),
    )
    .with_cancellation(cancel);
    let python = MockBackend::new("python", "3.11.8", &["3.11.8"], "3.12.1").gated();
    python.state().packages = vec![upper_bound("numba", "<3.12")];
    let node = MockBackend::new("node", "20.11.1", &["20.11.1"], "22.1.0");

    let summary = run(&orchestrator, &[turn(&python, ""), turn(&node, "")]).await;

    let result = summary.result("python").expect("python result");
    assert_eq!(result.outcome, UpgradeOutcome::Failed);
    assert!(matches!(result.error, Some(BackendError::Cancelled { .. })));
    assert!(python.mutating_calls().is_empty());
    assert_eq!(summary.untouched, vec!["node"]);
    assert!(node.calls().is_empty());
}

#[tokio::test]
async fn isolated_packages_do_not_block() {
    let dir = tempfile::tempdir().expect("temporary directory should be created");
    let orchestrator = orchestrator(cache(&dir));
    let python = MockBackend::new("python", "3.11.8", &["3.11.8"], "3.12.1").gated();
    python.state().packages = vec![PackageRequirement {
        isolated: true,
        ..upper_bound("black", "<3.12")
    }];

    let summary = run(&orchestrator, &[turn(&python, "")]).await;

    assert_eq!(outcome(&summary, "python"), UpgradeOutcome::Upgraded);
}

#[tokio::test]
async fn one_failing_backend_does_not_affect_the_others() {
    let dir = tempfile::tempdir().expect("temporary directory should be created");
    let orchestrator = orchestrator(cache(&dir));
    let python = MockBackend::new("python", "3.11.8", &["3.11.8"], "3.12.1");
    python.state().fail_install = true;
    let node = MockBackend::new("node", "18.19.0", &["18.19.0"], "20.11.1");
    let go = MockBackend::new("go", "1.21.8", &["1.21.8"], "1.22.1");
    let rust = MockBackend::new("rust", "1.78.0", &["1.78.0"], "1.78.0");
    let turns = [
        turn(&python, ""),
        turn(&node, ""),
        turn(&go, ""),
        turn(&rust, ""),
    ];

    let summary = run(&orchestrator, &turns).await;

    assert_eq!(outcome(&summary, "python"), UpgradeOutcome::Failed);
    assert!(matches!(
        summary.result("python").and_then(|result| result.error.clone()),
        Some(BackendError::CommandFailed { .. })
    ));
    assert_eq!(outcome(&summary, "node"), UpgradeOutcome::Upgraded);
    assert_eq!(outcome(&summary, "go"), UpgradeOutcome::Upgraded);
    assert_eq!(outcome(&summary, "rust"), UpgradeOutcome::AlreadyCurrent);
    assert_eq!(summary.problems().count(), 1);
}

#[tokio::test]
async fn cached_latest_equal_to_current_is_already_current() {
    let dir = tempfile::tempdir().expect("temporary directory should be created");
    let cache = cache(&dir);
    cache.store("python", "3.11.8").expect("seed cache");
    let written = std::fs::metadata(cache.entry_path("python"))
        .and_then(|metadata| metadata.modified())
        .expect("entry mtime");
    assert!(matches!(
        cache.lookup("python", written + Duration::from_secs(2 * 3600)),
        CacheLookup::Fresh { .. }
    ));

    let orchestrator = orchestrator(cache);
    let python = MockBackend::new("python", "3.11.8", &["3.11.8"], "3.12.1").gated();

    let summary = run(&orchestrator, &[turn(&python, "")]).await;

    assert_eq!(outcome(&summary, "python"), UpgradeOutcome::AlreadyCurrent);
    assert!(summary.result("python").is_some_and(|result| result.used_cached_latest));
    assert!(!python.calls().contains(&Call::ResolveLatest));
    assert!(python.mutating_calls().is_empty());
    assert_eq!(python.installed(), vec!["3.11.8"]);
}

#[tokio::test]
async fn cache_miss_with_blocking_constraint_stays_on_current() {
    let dir = tempfile::tempdir().expect("temporary directory should be created");
    let orchestrator = orchestrator(cache(&dir));
    let python = MockBackend::new("python", "3.11.8", &["3.11.8"], "3.12.1").gated();
    python.state().packages = vec![upper_bound("legacy", "<3.12")];

    let summary = run(&orchestrator, &[turn(&python, "")]).await;

    assert!(matches!(
        outcome(&summary, "python"),
        UpgradeOutcome::SkippedIncompatible { .. }
    ));
    assert_eq!(python.active().as_deref(), Some("3.11.8"));
    let result = summary.result("python").expect("python result");
    assert!(!result.used_cached_latest);
    assert_eq!(result.from.as_ref().map(ToString::to_string), Some("3.11.8".to_string()));
}

#[tokio::test]
async fn mismatched_version_after_install_is_reported() {
    let dir = tempfile::tempdir().expect("temporary directory should be created");
    let orchestrator = orchestrator(cache(&dir));
    let node = MockBackend::new("node", "18.19.0", &["18.19.0"], "20.11.1");
    node.state().ignore_activate = true;

    let summary = run(&orchestrator, &[turn(&node, "")]).await;

    let result = summary.result("node").expect("node result");
    assert_eq!(result.outcome, UpgradeOutcome::Failed);
    assert!(matches!(
        result.error,
        Some(BackendError::VerificationMismatch { ref expected, ref detected })
            if expected == "20.11.1" && detected == "18.19.0"
    ));
    assert!(summary.reports[0].sweep.is_none());
}

#[tokio::test]
async fn missing_toolchain_is_unavailable() {
    let dir = tempfile::tempdir().expect("temporary directory should be created");
    let orchestrator = orchestrator(cache(&dir));
    let rust = MockBackend::new("rust", "1.78.0", &[], "1.78.0");
    rust.state().unavailable = true;

    let summary = run(&orchestrator, &[turn(&rust, "")]).await;

    assert_eq!(outcome(&summary, "rust"), UpgradeOutcome::Unavailable);
    assert_eq!(rust.calls(), vec![Call::Detect]);
}

#[tokio::test]
async fn lookup_failure_without_cache_fails_the_backend() {
    let dir = tempfile::tempdir().expect("temporary directory should be created");
    let orchestrator = orchestrator(cache(&dir));
    let go = MockBackend::new("go", "1.21.8", &["1.21.8"], "1.22.1");
    go.state().latest = Err(BackendError::network("resolve latest", "offline"));

    let summary = run(&orchestrator, &[turn(&go, "")]).await;

    assert_eq!(outcome(&summary, "go"), UpgradeOutcome::Failed);
    assert!(go.mutating_calls().is_empty());
}

#[tokio::test]
async fn package_manager_variant_is_memoized() {
    let dir = tempfile::tempdir().expect("temporary directory should be created");
    let cache = cache(&dir);
    let brew = FakePackageManager::with_available(&[("go", "1.22.1")]);
    let orchestrator = Orchestrator::new(
        cache.clone(),
        ProtectionClassifier::default(),
        Box::new(NonInteractive),
    )
    .with_package_manager(Box::new(brew.clone()));
    let go = MockBackend::new("go", "1.21.8", &["1.21.8"], "1.22.1");
    go.state().variants = vec!["go@1.22".to_string(), "go".to_string(), "golang".to_string()];

    let summary = run(&orchestrator, &[turn(&go, "")]).await;

    let result = summary.result("go").expect("go result");
    assert_eq!(result.outcome, UpgradeOutcome::Upgraded);
    assert_eq!(
        result.install_path,
        Some(InstallPath::PackageManager {
            variant: "go".to_string()
        })
    );
    assert_eq!(brew.attempts(), vec!["go@1.22", "go"]);
    assert_eq!(cache.recall("go-variant").as_deref(), Some("go"));
    assert!(!go.calls().iter().any(|call| matches!(call, Call::Install(_))));
}

#[tokio::test]
async fn exhausted_variants_fall_back_to_version_manager() {
    let dir = tempfile::tempdir().expect("temporary directory should be created");
    let brew = FakePackageManager::with_available(&[]);
    let orchestrator = orchestrator(cache(&dir)).with_package_manager(Box::new(brew.clone()));
    let go = MockBackend::new("go", "1.21.8", &["1.21.8"], "1.22.1");
    go.state().variants = vec!["go@1.22".to_string(), "go".to_string()];

    let summary = run(&orchestrator, &[turn(&go, "")]).await;

    let result = summary.result("go").expect("go result");
    assert_eq!(result.outcome, UpgradeOutcome::Upgraded);
    assert_eq!(result.install_path, Some(InstallPath::VersionManager));
    assert_eq!(brew.attempts().len(), 2);
    assert!(go.calls().contains(&Call::Install("1.22.1".to_string())));
}

#[tokio::test]
async fn stale_package_falls_back_to_version_manager() {
    let dir = tempfile::tempdir().expect("temporary directory should be created");
    let cache = cache(&dir);
    let brew = FakePackageManager::with_available(&[("go@1.22", "1.22.0"), ("go", "1.21.8")])
        .with_installed("go", "1.21.8");
    let orchestrator = Orchestrator::new(
        cache.clone(),
        ProtectionClassifier::default(),
        Box::new(NonInteractive),
    )
    .with_package_manager(Box::new(brew.clone()));
    let go = MockBackend::new("go", "1.21.8", &["1.21.8"], "1.22.1");
    go.state().variants = vec!["go@1.22".to_string(), "go".to_string()];

    let summary = run(&orchestrator, &[turn(&go, "")]).await;

    let result = summary.result("go").expect("go result");
    assert_eq!(result.outcome, UpgradeOutcome::Upgraded);
    assert_eq!(result.install_path, Some(InstallPath::VersionManager));
    assert_eq!(brew.attempts(), vec!["go@1.22", "go"]);
    assert!(go.calls().contains(&Call::Install("1.22.1".to_string())));
    assert_eq!(cache.recall("go-variant"), None);
}

#[tokio::test]
async fn stale_memoized_variant_is_not_trusted() {
    let dir = tempfile::tempdir().expect("temporary directory should be created");
    let cache = cache(&dir);
    cache.store("go-variant", "go").expect("memo should be stored");
    let brew =
        FakePackageManager::with_available(&[("go", "1.21.8")]).with_installed("go", "1.21.8");
    let orchestrator = Orchestrator::new(
        cache.clone(),
        ProtectionClassifier::default(),
        Box::new(NonInteractive),
    )
    .with_package_manager(Box::new(brew.clone()));
    let go = MockBackend::new("go", "1.21.8", &["1.21.8"], "1.22.1");
    go.state().variants = vec!["go@1.22".to_string(), "go".to_string()];

    let summary = run(&orchestrator, &[turn(&go, "")]).await;

    let result = summary.result("go").expect("go result");
    assert_eq!(result.outcome, UpgradeOutcome::Upgraded);
    assert_eq!(result.install_path, Some(InstallPath::VersionManager));
    assert_eq!(brew.attempts(), vec!["go", "go@1.22"]);
    assert_eq!(go.active().as_deref(), Some("1.22.1"));
}

#[tokio::test]
async fn tools_are_reinstalled_once_per_package() {
    let dir = tempfile::tempdir().expect("temporary directory should be created");
    let orchestrator = orchestrator(cache(&dir));
    let go = MockBackend::new("go", "1.22.1", &["1.22.1"], "1.22.1").with_tool_inventory();
    go.state().tools = vec![
        ("gopls".to_string(), Some("golang.org/x/tools/gopls".to_string())),
        ("staticcheck".to_string(), Some("honnef.co/go/tools/cmd/staticcheck".to_string())),
        ("gopls-copy".to_string(), Some("golang.org/x/tools/gopls".to_string())),
        ("handmade".to_string(), None),
    ];

    let summary = run(&orchestrator, &[turn(&go, "")]).await;

    let tools = summary.reports[0].tools.as_ref().expect("tool report");
    assert_eq!(
        tools.reinstalled,
        vec!["golang.org/x/tools/gopls", "honnef.co/go/tools/cmd/staticcheck"]
    );
    assert_eq!(tools.skipped, vec!["handmade"]);
    assert!(tools.failed.is_empty());
    assert!(!summary.reports[0].has_problems());
}

#[tokio::test]
async fn cancellation_leaves_remaining_backends_untouched() {
    let dir = tempfile::tempdir().expect("temporary directory should be created");
    let cancel = CancellationToken::new();
    cancel.cancel();
    let orchestrator = orchestrator(cache(&dir)).with_cancellation(cancel);
    let python = MockBackend::new("python", "3.11.8", &["3.11.8"], "3.12.1");
    let node = MockBackend::new("node", "20.11.1", &["20.11.1"], "20.11.1");

    let summary = run(&orchestrator, &[turn(&python, ""), turn(&node, "")]).await;

    assert!(summary.reports.is_empty());
    assert_eq!(summary.untouched, vec!["python", "node"]);
    assert!(python.calls().is_empty());
}

#[tokio::test]
async fn run_state_tracks_each_backend() {
    let dir = tempfile::tempdir().expect("temporary directory should be created");
    let orchestrator = orchestrator(cache(&dir));
    let node = MockBackend::new("node", "18.19.0", &["18.19.0"], "20.11.1");
    let go = MockBackend::new("go", "1.22.1", &["1.22.1"], "1.22.1");
    let mut state = ActiveToolchainState::new();

    orchestrator
        .run(&[turn(&node, ""), turn(&go, "")], &mut state)
        .await;

    assert_eq!(
        state.get("node").map(|active| active.version.to_string()),
        Some("20.11.1".to_string())
    );
    assert_eq!(
        state.get("go").map(|active| active.version.to_string()),
        Some("1.22.1".to_string())
    );
}
