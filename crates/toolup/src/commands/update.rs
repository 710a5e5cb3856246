use log::info;

use toolup_backend::ActiveToolchainState;
use toolup_core::{BackendTurn, Orchestrator, RunSummary};
use toolup_platform::Homebrew;

use super::Context;
use crate::cli::UpdateArgs;
use crate::confirm::TerminalConfirm;

pub async fn run(ctx: &Context, args: &UpdateArgs) -> RunSummary {
    let turns: Vec<BackendTurn> = ctx
        .backends(&args.selected())
        .await
        .into_iter()
        .map(|(kind, backend)| BackendTurn {
            backend,
            retention: ctx.settings.retention_for(kind, args.no_cleanup),
        })
        .collect();

    let mut orchestrator = Orchestrator::new(
        ctx.cache(),
        ctx.classifier(),
        Box::new(TerminalConfirm::new(args.yes)),
    )
    .with_timeouts(ctx.settings.timeouts())
    .with_cancellation(ctx.cancel.clone());

    if let Some(homebrew) = Homebrew::locate() {
        info!("Using Homebrew at {}", homebrew.path().display());
        orchestrator = orchestrator.with_package_manager(Box::new(homebrew));
    }

    let mut state = ActiveToolchainState::new();
    let summary = orchestrator.run(&turns, &mut state).await;
    for (backend, active) in state.iter() {
        info!("{backend} now resolves to {} at {}", active.version, active.path.display());
    }
    summary
}
