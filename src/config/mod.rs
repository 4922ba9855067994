//! Application configuration module
use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::clients::APOD_URL;
use crate::domain::DateKey;
use crate::errors::{ApiError, ApiResult};
use std::env;

const DEFAULT_API_KEY: &str = "DEMO_KEY";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub nasa_api_key: String,
    pub apod_url: String,
    pub cache_capacity: usize,
    pub http_timeout_seconds: u64,
    /// Day loaded when a request names none; `None` means today
    pub default_date: Option<DateKey>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nasa_api_key: DEFAULT_API_KEY.to_string(),
            apod_url: APOD_URL.to_string(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            http_timeout_seconds: 30,
            default_date: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ApiResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> ApiResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let nasa_api_key = lookup("NASA_API_KEY").unwrap_or(defaults.nasa_api_key);
        let apod_url = lookup("APOD_URL").unwrap_or(defaults.apod_url);

        let default_date = match lookup("APOD_DEFAULT_DATE").filter(|s| !s.trim().is_empty()) {
            Some(text) => Some(text.trim().parse::<DateKey>().map_err(|_| {
                ApiError::Config(format!("APOD_DEFAULT_DATE '{}' is not YYYY-MM-DD", text))
            })?),
            None => None,
        };

        let config = Self {
            nasa_api_key,
            apod_url,
            cache_capacity: parsed(&lookup, "APOD_CACHE_CAPACITY", defaults.cache_capacity),
            http_timeout_seconds: parsed(
                &lookup,
                "HTTP_TIMEOUT_SECONDS",
                defaults.http_timeout_seconds,
            ),
            default_date,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ApiResult<()> {
        if !self.apod_url.starts_with("http://") && !self.apod_url.starts_with("https://") {
            return Err(ApiError::Config(
                "APOD_URL must start with http:// or https://".into(),
            ));
        }

        if self.cache_capacity == 0 {
            return Err(ApiError::Config(
                "APOD_CACHE_CAPACITY must be greater than zero".into(),
            ));
        }

        if self.http_timeout_seconds == 0 {
            return Err(ApiError::Config(
                "HTTP_TIMEOUT_SECONDS must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
