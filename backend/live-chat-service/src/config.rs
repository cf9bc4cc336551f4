use crate::error::AppError;
use dotenvy::dotenv;
use std::env;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/social_network.db?mode=rwc";
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";
pub const DEFAULT_SESSION_COOKIE: &str = "social-network";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    /// Exact `Origin` value accepted on the WebSocket upgrade.
    pub allowed_origin: String,
    pub session_cookie_name: String,
    /// When set, handshake frames must carry a token signed with this secret.
    pub handshake_jwt_secret: Option<String>,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            database_max_connections: 5,
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origin: DEFAULT_ALLOWED_ORIGIN.to_string(),
            session_cookie_name: DEFAULT_SESSION_COOKIE.to_string(),
            handshake_jwt_secret: None,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests need not touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL").unwrap_or(defaults.database_url);

        let database_max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw.parse::<u32>().ok().filter(|n| *n > 0).ok_or_else(|| {
                AppError::Config(format!("DATABASE_MAX_CONNECTIONS invalid: {raw}"))
            })?,
            None => defaults.database_max_connections,
        };

        let host = lookup("HOST").unwrap_or(defaults.host);

        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| AppError::Config(format!("PORT invalid: {raw}")))?,
            None => defaults.port,
        };

        let allowed_origin = lookup("ALLOWED_ORIGIN").unwrap_or(defaults.allowed_origin);
        if allowed_origin.trim().is_empty() {
            return Err(AppError::Config("ALLOWED_ORIGIN must not be empty".into()));
        }

        let session_cookie_name =
            lookup("SESSION_COOKIE_NAME").unwrap_or(defaults.session_cookie_name);

        let handshake_jwt_secret = lookup("HANDSHAKE_JWT_SECRET").filter(|s| !s.is_empty());

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(AppError::Config(format!(
                    "LOG_FORMAT must be 'pretty' or 'json', got '{other}'"
                )))
            }
        };

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            allowed_origin,
            session_cookie_name,
            handshake_jwt_secret,
            log_format,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
