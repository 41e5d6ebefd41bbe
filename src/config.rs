use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::banking::charge::{DEFAULT_WITHDRAWAL_CHARGE, MONEY_LIMIT, MONEY_SCALE};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Process settings, read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub max_connection_pooling: u32,
    pub port: u16,
    pub log_file: String,
    pub withdrawal_charge: Decimal,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // mandatory fields
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        // optional fields
        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| "your-jwt-secret".to_string());
        let max_connection_pooling = parse_or(&lookup, "MAX_CONNECTION_POOLING", 5)?;
        let port = parse_or(&lookup, "PORT", 3000)?;
        let log_file = lookup("LOG_FILE").unwrap_or_else(|| "app.log".to_string());
        let withdrawal_charge = parse_or(&lookup, "WITHDRAWAL_CHARGE", DEFAULT_WITHDRAWAL_CHARGE)?;
        // the charge is booked into NUMERIC(18, 2) balances
        if withdrawal_charge < Decimal::ZERO
            || withdrawal_charge >= MONEY_LIMIT
            || withdrawal_charge.normalize().scale() > MONEY_SCALE
        {
            return Err(ConfigError::Invalid {
                key: "WITHDRAWAL_CHARGE",
                value: withdrawal_charge.to_string(),
            });
        }

        Ok(Self {
            database_url,
            jwt_secret,
            max_connection_pooling,
            port,
            log_file,
            withdrawal_charge,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}
