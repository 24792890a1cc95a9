use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub host: String,
    pub port: u16,
    /// Reject unknown `sex` values on PATCH as well as on create.
    pub strict_update_validation: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./user.db".into());
        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(5);
        let host = std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = match std::env::var("APP_PORT") {
            Ok(v) => v.parse::<u16>()?,
            Err(_) => 8080,
        };
        let strict_update_validation = std::env::var("STRICT_UPDATE_VALIDATION")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);
        Ok(Self {
            database_url,
            max_connections,
            host,
            port,
            strict_update_validation,
        })
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
