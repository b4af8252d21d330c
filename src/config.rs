use anyhow::bail;
use serde::Deserialize;

pub const ENV_DEVELOPMENT: &str = "development";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub env: String,
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source; `from_env` feeds it the
    /// process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = match get("DATABASE_URL").filter(|v| !v.is_empty()) {
            Some(url) => url,
            None => {
                let Some(host) = get("PSQL_HOST").filter(|v| !v.is_empty()) else {
                    bail!("database not configured: set DATABASE_URL or PSQL_HOST");
                };
                format!(
                    "postgres://{}:{}@{}:{}/{}?sslmode={}",
                    get("PSQL_USER").unwrap_or_else(|| "postgres".into()),
                    get("PSQL_PASS").unwrap_or_default(),
                    host,
                    parse_or(&get, "PSQL_PORT", 5432u16)?,
                    get("PSQL_DBNAME").unwrap_or_else(|| "oink".into()),
                    get("PSQL_SSLMODE").unwrap_or_else(|| "disable".into()),
                )
            }
        };

        Ok(Self {
            database_url,
            max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 10)?,
            env: get("APP_ENV").unwrap_or_else(|| ENV_DEVELOPMENT.into()),
            server: ServerConfig {
                host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
                port: parse_or(&get, "APP_PORT", 8080)?,
                request_timeout_secs: parse_or(&get, "REQUEST_TIMEOUT_SECS", 30)?,
            },
        })
    }

    pub fn is_development(&self) -> bool {
        self.env == ENV_DEVELOPMENT
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw:?}: {e}")),
        None => Ok(default),
    }
}
