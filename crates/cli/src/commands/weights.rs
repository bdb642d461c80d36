use serde::Serialize;

use cobuy_core::domain::product::ProductId;

use crate::commands::context::{execute, CommandFailure};
use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct Association {
    product_id: i64,
    weight: u64,
}

/// Prints the association list of one product, heaviest first.
pub fn run(product: &str) -> CommandResult {
    let product = match product.parse::<ProductId>() {
        Ok(product) => product,
        Err(error) => {
            return CommandFailure::from(error).into_result("weights");
        }
    };

    execute("weights", |context| async move {
        let associations = context
            .recommender
            .associations(product)
            .await?
            .into_iter()
            .map(|(product_id, weight)| Association { product_id: product_id.0, weight })
            .collect::<Vec<_>>();

        let message = format!("product {product} has {} association(s)", associations.len());
        Ok(CommandResult::success_with_data("weights", message, &associations))
    })
}
