//! Process configuration resolved from the environment.
//!
//! `.env` files are loaded by the binary before `Config::from_env` runs; CLI
//! flags are applied on top by `main`.

pub(crate) mod helpers;

use std::net::SocketAddr;

use secrecy::SecretString;

use crate::config::helpers::{parse_env, parse_string_env, parse_value, required_env};
use crate::error::ConfigError;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
pub const DEFAULT_POOL_SIZE: usize = 16;

/// Connection settings for the relational store.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: SecretString,
    pub pool_size: usize,
}

/// Listener settings.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub bind_address: SocketAddr,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidValue {
                key: "LOG_FORMAT".to_string(),
                message: format!("unsupported format '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub http: HttpConfig,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = required_env("DATABASE_URL")?;
        let pool_size = validate_pool_size(parse_env("DATABASE_POOL_SIZE", DEFAULT_POOL_SIZE)?)?;
        let bind_raw = parse_string_env("BIND_ADDRESS", DEFAULT_BIND_ADDRESS.to_string())?;
        let log_format = LogFormat::parse(&parse_string_env("LOG_FORMAT", "text".to_string())?)?;

        Ok(Self {
            database: DatabaseConfig {
                url: SecretString::from(url),
                pool_size,
            },
            http: HttpConfig {
                bind_address: parse_value("BIND_ADDRESS", &bind_raw)?,
            },
            log_format,
        })
    }
}

fn validate_pool_size(size: usize) -> Result<usize, ConfigError> {
    if size == 0 {
        return Err(ConfigError::InvalidValue {
            key: "DATABASE_POOL_SIZE".to_string(),
            message: "pool size must be at least 1".to_string(),
        });
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_accepts_known_values() {
        assert_eq!(LogFormat::parse("JSON").expect("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("text").expect("text"), LogFormat::Text);
    }

    #[test]
    fn log_format_rejects_unknown_values() {
        let err = LogFormat::parse("xml").expect_err("must reject");
        let ConfigError::InvalidValue { key, message } = err else {
            panic!("expected InvalidValue");
        };
        assert_eq!(key, "LOG_FORMAT");
        assert!(message.contains("xml"), "unexpected message: {message}");
    }

    #[test]
    fn validate_pool_size_rejects_zero() {
        assert!(validate_pool_size(0).is_err());
        assert_eq!(validate_pool_size(4).expect("valid"), 4);
    }
}
