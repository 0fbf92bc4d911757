use std::{env, fmt, net::SocketAddr, time::Duration};

use super::server_bind_address;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://hrm.db?mode=rwc";
const DEV_TOKEN_SECRET: &str = "dev-secret";

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub database_url: String,
    pub auth_token_secret: Vec<u8>,
    /// Cadence of the background DA increment run; `None` disables the worker.
    pub da_increment_interval: Option<Duration>,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;
        let bind_addr = server_bind_address().map_err(ConfigError::BindAddress)?;
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let auth_token_secret = match env::var("AUTH_TOKEN_SECRET") {
            Ok(value) if !value.is_empty() => value.into_bytes(),
            _ if environment == Environment::Production => {
                return Err(ConfigError::MissingTokenSecret)
            }
            _ => DEV_TOKEN_SECRET.as_bytes().to_vec(),
        };

        let da_increment_interval = match env::var("DA_INCREMENT_INTERVAL_SECS") {
            Ok(raw) => Some(parse_interval(&raw)?),
            Err(_) => None,
        };

        Ok(Self {
            bind_addr,
            environment,
            database_url,
            auth_token_secret,
            da_increment_interval,
        })
    }
}

fn parse_interval(raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidInterval(raw.to_string())),
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    MissingTokenSecret,
    InvalidInterval(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::MissingTokenSecret => {
                write!(f, "AUTH_TOKEN_SECRET must be set in production")
            }
            Self::InvalidInterval(value) => write!(
                f,
                "DA_INCREMENT_INTERVAL_SECS must be a positive number of seconds (got {value})"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
