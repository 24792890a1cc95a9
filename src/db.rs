use std::str::FromStr;

use anyhow::Context;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

use crate::config::AppConfig;

/// Opens the pool, creating the database file when it does not exist yet.
pub async fn connect(config: &AppConfig) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database_url)
        .with_context(|| format!("parse DATABASE_URL {}", config.database_url))?
        .create_if_missing(true);

    let db = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
        .context("connect to database")?;
    Ok(db)
}

/// Creates the `users` table if it is missing. There is no migration history:
/// the table shape below is the only one the service knows.
pub async fn ensure_schema(db: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            name       TEXT    NOT NULL,
            email      TEXT    NOT NULL UNIQUE,
            age        INTEGER NOT NULL,
            sex        TEXT    NOT NULL,
            created_at TEXT    NOT NULL,
            updated_at TEXT
        )
        "#,
    )
    .execute(db)
    .await
    .context("create users table")?;

    // email is covered by its UNIQUE constraint's implicit index
    let indexes = [
        ("ix_users_name", "name"),
        ("ix_users_age", "age"),
        ("ix_users_sex", "sex"),
    ];
    for (name, column) in indexes {
        sqlx::query(&format!("CREATE INDEX IF NOT EXISTS {name} ON users ({column})"))
            .execute(db)
            .await
            .with_context(|| format!("create index {name}"))?;
    }

    tracing::debug!("users schema ready");
    Ok(())
}
