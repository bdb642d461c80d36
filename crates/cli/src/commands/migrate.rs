use cobuy_store::{connect_with_settings, migrations};

use crate::commands::context::{build_runtime, load_config, CommandFailure};
use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    match apply() {
        Ok(applied) => {
            CommandResult::success("migrate", format!("catalog schema at {applied} migration(s)"))
        }
        Err(failure) => failure.into_result("migrate"),
    }
}

fn apply() -> Result<usize, CommandFailure> {
    let config = load_config()?;
    let runtime = build_runtime()?;

    runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| CommandFailure::new("db_connectivity", error.to_string(), 4))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| CommandFailure::new("migration", error.to_string(), 5))?;
        let applied = migrations::MIGRATOR.iter().count();
        pool.close().await;
        Ok(applied)
    })
}
