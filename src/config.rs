use log::{info, warn};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub openweather_api_key: Option<String>,
    pub tomtom_api_key: Option<String>,
    pub weather_cache_ttl: Duration,
    pub stats_refresh_interval: Duration,
    pub search_debounce: Duration,
    pub session_idle_timeout: Duration,
    pub seed_file: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:ridepoll.db".to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            openweather_api_key: optional_secret("OPENWEATHER_API_KEY"),
            tomtom_api_key: optional_secret("TOMTOM_API_KEY"),
            weather_cache_ttl: Duration::from_secs(parse_or("WEATHER_CACHE_SECS", 900)),
            stats_refresh_interval: Duration::from_secs(parse_or("STATS_REFRESH_SECS", 60)),
            search_debounce: Duration::from_millis(parse_or("SEARCH_DEBOUNCE_MS", 300)),
            session_idle_timeout: Duration::from_secs(parse_or("SESSION_IDLE_SECS", 1800)),
            seed_file: env::var("SEED_FILE").ok().filter(|path| !path.trim().is_empty()),
        }
    }
}

// Missing and blank keys both disable the provider.
fn optional_secret(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => {
            warn!("{} not set, the matching conditions panel will be unavailable", key);
            None
        }
    }
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Invalid {} value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => {
            info!("{} not set, using default: {}", key, default);
            default
        }
    }
}
