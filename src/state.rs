use crate::config::AppConfig;
use crate::db;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let db = db::connect(&config).await?;
        db::ensure_schema(&db).await?;
        Ok(Self::from_parts(db, config))
    }

    pub fn from_parts(db: SqlitePool, config: Arc<AppConfig>) -> Self {
        Self { db, config }
    }
}

#[cfg(test)]
impl AppState {
    /// Fresh in-memory database. A single connection that never expires keeps
    /// the memory database alive for the whole test.
    pub async fn for_tests(strict_update_validation: bool) -> Self {
        let db = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        db::ensure_schema(&db).await.expect("schema");

        let config = Arc::new(AppConfig {
            database_url: "sqlite::memory:".into(),
            max_connections: 1,
            host: "127.0.0.1".into(),
            port: 0,
            strict_update_validation,
        });
        Self::from_parts(db, config)
    }
}
