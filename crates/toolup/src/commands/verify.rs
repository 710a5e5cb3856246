use toolup_core::{BackendStatus, verify_backend};

use super::Context;
use crate::backend_kind::BackendKind;

pub async fn run(ctx: &Context) -> Vec<(BackendKind, BackendStatus)> {
    let cache = ctx.cache();
    let classifier = ctx.classifier();
    let guard = ctx.guard();

    let mut statuses = Vec::new();
    for (kind, backend) in ctx.backends(&BackendKind::ALL).await {
        if guard.is_cancelled() {
            break;
        }
        let status = verify_backend(backend.as_ref(), &cache, &classifier, &guard).await;
        statuses.push((kind, status));
    }
    statuses
}
