use serde::Serialize;

use cobuy_core::domain::product::Product;
use cobuy_core::recommender::SuggestionQuery;

use crate::commands::context::{execute, CommandFailure};
use crate::commands::{parse_product_ids, CommandResult};

#[derive(Debug, Serialize)]
struct SuggestOutput {
    seeds: Vec<i64>,
    max_results: usize,
    suggestions: Vec<Product>,
}

/// Suggests products for a comma-separated seed list, best first.
///
/// `max_results` falls back to `recommender.max_results` from config.
pub fn run(products: &str, max_results: Option<usize>) -> CommandResult {
    let seeds = match parse_product_ids(products) {
        Ok(seeds) => seeds,
        Err(error) => {
            return CommandFailure::from(error).into_result("suggest");
        }
    };

    execute("suggest", |context| async move {
        let max_results = max_results.unwrap_or(context.config.recommender.max_results);
        let query = SuggestionQuery::new(seeds.iter().copied()).with_max_results(max_results);
        let suggestions =
            context.recommender.suggest(&query).await.map_err(CommandFailure::from)?;

        let message = format!("{} suggestion(s)", suggestions.len());
        let output = SuggestOutput {
            seeds: seeds.iter().map(|id| id.0).collect(),
            max_results,
            suggestions,
        };
        Ok(CommandResult::success_with_data("suggest", message, &output))
    })
}
