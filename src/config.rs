//! Runtime configuration read from the environment (after `.env` has been loaded).

use std::time::Duration;
use crate::{Result, StorefrontError};

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub cart_db_url: String,
    pub token: Option<String>,
    pub cache_capacity: u64,
    pub cache_ttl: Duration,
    pub query_retries: u32,
    pub http_timeout: Option<Duration>,
    pub currency: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5000/api".to_string(),
            cart_db_url: "sqlite://maison-cart.db".to_string(),
            token: None,
            cache_capacity: 1_000,
            cache_ttl: Duration::from_secs(300),
            query_retries: 1,
            http_timeout: None,
            currency: "USD".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source; unset or blank variables keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();
        Ok(Self {
            api_url: get("STOREFRONT_API_URL").unwrap_or(defaults.api_url).trim_end_matches('/').to_string(),
            cart_db_url: get("STOREFRONT_CART_DB").unwrap_or(defaults.cart_db_url),
            token: get("STOREFRONT_TOKEN"),
            cache_capacity: parse(&get, "STOREFRONT_CACHE_CAPACITY")?.unwrap_or(defaults.cache_capacity),
            cache_ttl: parse(&get, "STOREFRONT_CACHE_TTL_SECS")?.map(Duration::from_secs).unwrap_or(defaults.cache_ttl),
            query_retries: parse(&get, "STOREFRONT_QUERY_RETRIES")?.unwrap_or(defaults.query_retries),
            http_timeout: parse(&get, "STOREFRONT_HTTP_TIMEOUT_SECS")?.map(Duration::from_secs),
            currency: get("STOREFRONT_CURRENCY").map(|c| c.to_uppercase()).unwrap_or(defaults.currency),
        })
    }
}

fn parse<T: std::str::FromStr>(get: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>> {
    get(name)
        .map(|raw| raw.parse::<T>().map_err(|_| StorefrontError::Config(format!("{} must be a number, got {:?}", name, raw))))
        .transpose()
}
