use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::notices::policy::{DEFAULT_GRACE_PERIOD_DAYS, DEFAULT_MAX_PAGE_SIZE};

const MAX_PAGE_SIZE_CEILING: usize = 1000;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the notice desk.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub publication: PublicationConfig,
    pub payments: PaymentConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "4040".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let grace_period_days = match env::var("NOTICE_GRACE_DAYS") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|days| *days > 0)
                .ok_or(ConfigError::InvalidGracePeriod { value: raw })?,
            Err(_) => DEFAULT_GRACE_PERIOD_DAYS as u32,
        };

        let max_page_size = match env::var("NOTICE_MAX_PAGE_SIZE") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|size| (1..=MAX_PAGE_SIZE_CEILING).contains(size))
                .ok_or(ConfigError::InvalidPageSize { value: raw })?,
            Err(_) => DEFAULT_MAX_PAGE_SIZE,
        };

        let webhook_token = env::var("NOTICE_PAYMENT_WEBHOOK_TOKEN")
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            publication: PublicationConfig {
                grace_period_days,
                max_page_size,
            },
            payments: PaymentConfig { webhook_token },
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Publication scheduling and listing limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationConfig {
    pub grace_period_days: u32,
    pub max_page_size: usize,
}

impl Default for PublicationConfig {
    fn default() -> Self {
        Self {
            grace_period_days: DEFAULT_GRACE_PERIOD_DAYS as u32,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

/// Shared secret expected on payment webhooks. `None` accepts unsigned calls.
#[derive(Debug, Clone, Default)]
pub struct PaymentConfig {
    pub webhook_token: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidGracePeriod { value: String },
    InvalidPageSize { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidGracePeriod { value } => write!(
                f,
                "NOTICE_GRACE_DAYS must be a positive whole number of days (got '{value}')"
            ),
            ConfigError::InvalidPageSize { value } => write!(
                f,
                "NOTICE_MAX_PAGE_SIZE must be between 1 and {MAX_PAGE_SIZE_CEILING} (got '{value}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidGracePeriod { .. }
            | ConfigError::InvalidPageSize { .. } => None,
        }
    }
}
