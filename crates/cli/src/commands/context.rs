use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use cobuy_core::config::{AppConfig, LoadOptions};
use cobuy_core::errors::{ApplicationError, DomainError, FailureKind, InterfaceError};
use cobuy_core::recommender::{Recommender, RecommenderError, RecommenderSettings};
use cobuy_store::{connect_with_settings, migrations, open_ranked_store, SqlProductCatalog};

use crate::commands::CommandResult;

/// Everything a recommender command needs, wired from the loaded config.
pub(crate) struct CommandContext {
    pub config: AppConfig,
    pub catalog: Arc<SqlProductCatalog>,
    pub recommender: Recommender,
}

#[derive(Debug)]
pub(crate) struct CommandFailure {
    error_class: &'static str,
    message: String,
    exit_code: u8,
}

impl CommandFailure {
    pub(crate) fn new(
        error_class: &'static str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self { error_class, message: message.into(), exit_code }
    }

    pub(crate) fn into_result(self, command: &str) -> CommandResult {
        CommandResult::failure(command, self.error_class, self.message, self.exit_code)
    }
}

impl From<InterfaceError> for CommandFailure {
    fn from(error: InterfaceError) -> Self {
        let (error_class, exit_code) = match error.kind {
            FailureKind::InvalidInput => ("invalid_input", 6),
            FailureKind::Misconfigured => ("config_validation", 2),
            FailureKind::Unavailable | FailureKind::Internal => ("recommender", 7),
        };
        let message = format!(
            "{} ({error}; correlation_id: {})",
            error.user_message(),
            error.correlation_id
        );
        Self::new(error_class, message, exit_code)
    }
}

impl From<RecommenderError> for CommandFailure {
    fn from(error: RecommenderError) -> Self {
        let retryable = error.is_retryable();
        let mut failure =
            Self::from(ApplicationError::from(error).into_interface(correlation_id()));
        failure.message = format!("{} [retryable: {retryable}]", failure.message);
        failure
    }
}

impl From<DomainError> for CommandFailure {
    fn from(error: DomainError) -> Self {
        Self::from(ApplicationError::from(error).into_interface(correlation_id()))
    }
}

fn correlation_id() -> String {
    format!("cli-{}", std::process::id())
}

/// Loads the layered config, reporting failures as `config_validation`.
pub(crate) fn load_config() -> Result<AppConfig, CommandFailure> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandFailure::from(
            ApplicationError::Configuration(error.to_string()).into_interface(correlation_id()),
        )
    })
}

pub(crate) fn build_runtime() -> Result<tokio::runtime::Runtime, CommandFailure> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandFailure::new(
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

/// Loads config, opens the catalog and ranked store, and runs `body` on a
/// current-thread runtime. The catalog pool is closed once `body` finishes.
pub(crate) fn execute<F, Fut>(command: &str, body: F) -> CommandResult
where
    F: FnOnce(CommandContext) -> Fut,
    Fut: Future<Output = Result<CommandResult, CommandFailure>>,
{
    let config = match load_config() {
        Ok(config) => config,
        Err(failure) => return failure.into_result(command),
    };
    let runtime = match build_runtime() {
        Ok(runtime) => runtime,
        Err(failure) => return failure.into_result(command),
    };

    let result = runtime.block_on(async move {
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

        let store = open_ranked_store(&config.store)
            .await
            .map_err(|error| CommandFailure::new("store_connectivity", error.to_string(), 4))?;

        let catalog = Arc::new(SqlProductCatalog::new(pool.clone()));
        let settings = RecommenderSettings::from_config(&config);
        let recommender = Recommender::new(store, catalog.clone(), settings);
        debug!(
            event_name = "cli.context.ready",
            backend = ?config.store.backend,
            "command context initialised"
        );

        let outcome = body(CommandContext { config, catalog, recommender }).await;
        pool.close().await;
        outcome
    });

    result.unwrap_or_else(|failure| failure.into_result(command))
}

#[cfg(test)]
mod tests {
    use cobuy_core::errors::ApplicationError;
    use cobuy_core::ports::StoreError;
    use cobuy_core::recommender::RecommenderError;

    use super::CommandFailure;

    #[test]
    fn input_errors_map_to_invalid_input_exit_code() {
        let failure = CommandFailure::from(RecommenderError::EmptySeed);
        assert_eq!(failure.exit_code, 6);
        assert_eq!(failure.error_class, "invalid_input");
        assert!(failure.message.contains("at least one seed product is required"));
    }

    #[test]
    fn store_errors_map_to_recommender_exit_code() {
        let failure =
            CommandFailure::from(RecommenderError::Store(StoreError::Unavailable("down".into())));
        assert_eq!(failure.exit_code, 7);
        assert_eq!(failure.error_class, "recommender");
        assert!(failure.message.contains("retryable: true"));
        assert!(failure.message.starts_with("Recommendations are temporarily unavailable."));
    }

    #[test]
    fn configuration_failures_use_config_exit_code() {
        let failure = CommandFailure::from(
            ApplicationError::Configuration("store.url must not be empty".into())
                .into_interface("cli-test"),
        );
        assert_eq!(failure.exit_code, 2);
        assert_eq!(failure.error_class, "config_validation");
        assert!(failure.message.contains("store.url must not be empty"));
        assert!(failure.message.contains("correlation_id: cli-test"));
        assert!(failure.message.starts_with("The recommender is misconfigured."));
    }
}
