//! Configuration loading from environment variables.

use std::net::SocketAddr;

/// Default number of rows per page when `PAGE_SIZE` is unset.
pub const DEFAULT_PAGE_SIZE: usize = 100;
/// Default retention period in months when `RETENTION_PERIOD_MONTHS` is unset.
pub const DEFAULT_RETENTION_MONTHS: u32 = 60;
/// Default HTTP port when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 8081;

/// Server configuration, built once at startup and passed down explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// HTTP listen port
    pub port: u16,
    /// Page size ceiling for paginated listings
    pub page_size: usize,
    /// Age in months after which responses are purged
    pub retention_months: u32,
    /// PostgreSQL connection URL; the in-memory store is used when absent
    pub database_url: Option<String>,
    /// Allowed CORS origins; empty means permissive
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            page_size: DEFAULT_PAGE_SIZE,
            retention_months: DEFAULT_RETENTION_MONTHS,
            database_url: None,
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `PORT`: HTTP port (default: 8081)
    /// - `PAGE_SIZE`: maximum page size (default: 100)
    /// - `RETENTION_PERIOD_MONTHS`: response retention in months (default: 60)
    /// - `DATABASE_URL`: PostgreSQL connection string (default: in-memory storage)
    /// - `CORS_ALLOWED_ORIGINS`: comma separated origins (default: permissive)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid("PORT", "must be a valid port number"))?,
            None => DEFAULT_PORT,
        };

        let page_size = match lookup("PAGE_SIZE") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|size| *size > 0)
                .ok_or(ConfigError::Invalid("PAGE_SIZE", "must be a positive integer"))?,
            None => DEFAULT_PAGE_SIZE,
        };

        let retention_months = match lookup("RETENTION_PERIOD_MONTHS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|months| *months > 0)
                .ok_or(ConfigError::Invalid(
                    "RETENTION_PERIOD_MONTHS",
                    "must be a positive integer",
                ))?,
            None => DEFAULT_RETENTION_MONTHS,
        };

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            port,
            page_size,
            retention_months,
            database_url,
            cors_allowed_origins,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    pub fn pagination(&self) -> PaginationConfig {
        PaginationConfig {
            page_size: self.page_size,
        }
    }
}

/// Page size settings handed to the pagination component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationConfig {
    pub page_size: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PaginationConfig {
    /// Effective page size: the requested size capped at the configured one.
    /// Missing, unparsable or non-positive requests use the configured size.
    pub fn effective_size(&self, requested: Option<&str>) -> usize {
        requested
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|size| *size > 0)
            .map(|size| (size as u64).min(self.page_size as u64) as usize)
            .unwrap_or(self.page_size)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
