use crate::commands::context::execute;
use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    execute("clear", |context| async move {
        context.recommender.clear_all().await?;
        Ok(CommandResult::success("clear", "cleared association lists for every catalog product"))
    })
}
