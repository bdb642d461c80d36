use serde::Serialize;

use cobuy_core::recommender::{co_purchase_pairs, distinct};

use crate::commands::context::{execute, CommandFailure};
use crate::commands::{parse_product_ids, CommandResult};

#[derive(Debug, Serialize)]
struct RecordOutput {
    products: Vec<i64>,
    pairs: usize,
}

/// Records one order's worth of co-purchases for a comma-separated id list.
pub fn run(products: &str) -> CommandResult {
    let products = match parse_product_ids(products) {
        Ok(products) => distinct(&products),
        Err(error) => {
            return CommandFailure::from(error).into_result("record");
        }
    };

    execute("record", |context| async move {
        context.recommender.record_co_purchases(&products).await?;

        let output = RecordOutput {
            products: products.iter().map(|id| id.0).collect(),
            pairs: co_purchase_pairs(&products).len(),
        };
        let message = format!("recorded {} co-purchase pair(s)", output.pairs);
        Ok(CommandResult::success_with_data("record", message, &output))
    })
}
