// src/config.rs
use crate::error::ConfigError;
use crate::price::PriceApiConfig;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Scylla { node: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub store: StoreBackend,
    pub price_api: PriceApiConfig,
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

impl Config {
    /// Reads the configuration from the process environment (and `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key: &str| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = parse_var(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 5001)))?;

        let store = match lookup("STORE_BACKEND").as_deref().map(str::trim) {
            None | Some("memory") => StoreBackend::Memory,
            Some("scylla") => StoreBackend::Scylla {
                node: lookup("SCYLLA_NODE").unwrap_or_else(|| "127.0.0.1:9042".to_string()),
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let api_key = lookup("PRICE_API_KEY").ok_or(ConfigError::Missing("PRICE_API_KEY"))?;
        let defaults = PriceApiConfig::new(api_key);
        let max_attempts: u32 =
            parse_var(&lookup, "PRICE_API_MAX_ATTEMPTS", defaults.max_attempts)?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "PRICE_API_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }
        let price_api = PriceApiConfig {
            base_url: lookup("PRICE_API_URL").unwrap_or(defaults.base_url),
            timeout: Duration::from_secs(parse_var(
                &lookup,
                "PRICE_API_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )?),
            max_attempts,
            retry_delay: Duration::from_secs(parse_var(
                &lookup,
                "PRICE_API_RETRY_DELAY_SECS",
                defaults.retry_delay.as_secs(),
            )?),
            api_key: defaults.api_key,
        };

        Ok(Config {
            bind_addr,
            store,
            price_api,
        })
    }
}
