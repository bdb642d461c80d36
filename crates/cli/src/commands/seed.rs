use cobuy_core::config::StoreBackend;
use cobuy_store::DemoCatalog;

use crate::commands::context::{execute, CommandFailure};
use crate::commands::CommandResult;

/// Loads the demo catalog and records its demo orders.
pub fn run() -> CommandResult {
    execute("seed", |context| async move {
        let seeded = DemoCatalog::load(context.catalog.as_ref(), &context.recommender)
            .await
            .map_err(|error| CommandFailure::new("seed_execution", error.to_string(), 5))?;

        let mut message = format!(
            "seeded {} product(s) and recorded {} demo order(s)",
            seeded.products_seeded,
            seeded.orders_recorded.len()
        );
        if context.config.store.backend == StoreBackend::Memory {
            message.push_str("; memory store associations last for this run only");
        }
        Ok(CommandResult::success_with_data("seed", message, &seeded))
    })
}
