use std::sync::Arc;

use chief_agent::{Orchestrator, Repositories};
use chief_core::config::{AppConfig, ConfigError};
use chief_db::{connect_with_settings, migrations, DbPool};
use chief_llm::{HttpProviderClient, LlmError, ModelCatalog};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub orchestrator: Arc<Orchestrator>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("provider client setup failed: {0}")]
    Provider(#[source] LlmError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "bootstrap_started", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "database_connected", url = %config.database.url, "database pool ready");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "migrations_applied", "database schema up to date");

    let provider = HttpProviderClient::from_config(&config).map_err(BootstrapError::Provider)?;
    let catalog = ModelCatalog::from_config(&config);
    let repos = Repositories::sqlite(db_pool.clone());
    let orchestrator =
        Arc::new(Orchestrator::new(repos, Arc::new(provider), catalog, config.integrations.clone()));

    Ok(Application { config, db_pool, orchestrator })
}

#[cfg(test)]
mod tests {
    use chief_core::config::{AppConfig, LogFormat};

    use crate::bootstrap::bootstrap_with_config;

    fn memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:?cache=shared".to_string();
        config.database.max_connections = 1;
        config.logging.format = LogFormat::Compact;
        config
    }

    #[tokio::test]
    async fn bootstrap_applies_the_schema_before_serving() {
        let app = bootstrap_with_config(memory_config())
            .await
            .expect("bootstrap should succeed against an in-memory database");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN \
             ('leads', 'follow_up_suggestions', 'chat_messages', 'usage_daily')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query should succeed");

        assert_eq!(table_count, 4);
        app.db_pool.close().await;
    }
}
