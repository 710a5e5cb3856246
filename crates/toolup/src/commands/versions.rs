use toolup_core::{Inventory, inventory};

use super::Context;
use crate::backend_kind::BackendKind;

pub async fn run(ctx: &Context) -> Vec<Inventory> {
    let guard = ctx.guard();

    let mut inventories = Vec::new();
    for (_, backend) in ctx.backends(&BackendKind::ALL).await {
        if guard.is_cancelled() {
            break;
        }
        inventories.push(inventory(backend.as_ref(), &guard).await);
    }
    inventories
}
