use std::collections::HashMap;
use std::time::Duration;

use crate::error::CoreError;
use crate::provider::ProviderConfig;

pub const GOATCOUNTER_SITE_CODE: &str = "GOATCOUNTER_SITE_CODE";
pub const GOATCOUNTER_API_TOKEN: &str = "GOATCOUNTER_API_TOKEN";
pub const GA4_MEASUREMENT_ID: &str = "GA4_MEASUREMENT_ID";
pub const GA4_API_SECRET: &str = "GA4_API_SECRET";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    /// Ceiling for both the declared `content-length` and the actual body.
    pub max_body_bytes: usize,
    pub rate_limit: RateLimitConfig,
    /// Bypass the per-IP limiter entirely.
    pub rate_limit_disable: bool,
    pub analytics_debug: bool,
    pub goatcounter: ProviderConfig,
    pub ga4: ProviderConfig,
}

/// Longest accepted rate-limit window (one day).
pub const MAX_RATE_LIMIT_WINDOW_SECS: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
    /// Expired entries are pruned at most once per this interval.
    pub cleanup_interval_secs: u64,
    /// Hard cap on tracked clients.
    pub max_entries: usize,
    /// Size the map is trimmed down to once `max_entries` is exceeded.
    pub trim_to: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window_secs: 60,
            cleanup_interval_secs: 60,
            max_entries: 1000,
            trim_to: 500,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: Vec::new(),
            max_body_bytes: 10_000,
            rate_limit: RateLimitConfig::default(),
            rate_limit_disable: false,
            analytics_debug: false,
            goatcounter: ProviderConfig::default(),
            ga4: ProviderConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source. Absent provider
    /// credentials are not an error; they leave that provider unconfigured.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let limits = RateLimitConfig::default();
        let analytics_debug = lookup("FOLIO_ANALYTICS_DEBUG")
            .map(|v| is_truthy(&v))
            .unwrap_or(false);

        let rate_limit = RateLimitConfig {
            max_requests: parse_or(&lookup, "FOLIO_RATE_LIMIT_MAX", limits.max_requests)?,
            window_secs: parse_or(&lookup, "FOLIO_RATE_LIMIT_WINDOW_SECS", limits.window_secs)?,
            cleanup_interval_secs: parse_or(
                &lookup,
                "FOLIO_RATE_LIMIT_CLEANUP_SECS",
                limits.cleanup_interval_secs,
            )?,
            max_entries: parse_or(&lookup, "FOLIO_RATE_LIMIT_MAX_ENTRIES", limits.max_entries)?,
            trim_to: parse_or(&lookup, "FOLIO_RATE_LIMIT_TRIM_TO", limits.trim_to)?,
        };
        if !(1..=MAX_RATE_LIMIT_WINDOW_SECS).contains(&rate_limit.window_secs) {
            return Err(CoreError::Config(format!(
                "FOLIO_RATE_LIMIT_WINDOW_SECS must be between 1 and {MAX_RATE_LIMIT_WINDOW_SECS}, got {}",
                rate_limit.window_secs
            )));
        }
        if rate_limit.max_entries == 0 {
            return Err(CoreError::Config(
                "FOLIO_RATE_LIMIT_MAX_ENTRIES must be at least 1".to_string(),
            ));
        }
        if rate_limit.trim_to > rate_limit.max_entries {
            return Err(CoreError::Config(format!(
                "FOLIO_RATE_LIMIT_TRIM_TO ({}) must not exceed FOLIO_RATE_LIMIT_MAX_ENTRIES ({})",
                rate_limit.trim_to, rate_limit.max_entries
            )));
        }

        Ok(Self {
            host: lookup("FOLIO_HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "FOLIO_PORT", defaults.port)?,
            cors_origins: lookup("FOLIO_CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            max_body_bytes: parse_or(&lookup, "FOLIO_MAX_BODY_BYTES", defaults.max_body_bytes)?,
            rate_limit,
            rate_limit_disable: lookup("FOLIO_RATE_LIMIT_DISABLE")
                .map(|v| is_truthy(&v))
                .unwrap_or(false),
            analytics_debug,
            goatcounter: provider_config(
                &lookup,
                &[GOATCOUNTER_SITE_CODE, GOATCOUNTER_API_TOKEN],
                "GOATCOUNTER_ENDPOINT",
                analytics_debug,
            ),
            ga4: provider_config(
                &lookup,
                &[GA4_MEASUREMENT_ID, GA4_API_SECRET],
                "GA4_ENDPOINT",
                analytics_debug,
            ),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn provider_config<F>(lookup: &F, keys: &[&str], endpoint_key: &str, debug: bool) -> ProviderConfig
where
    F: Fn(&str) -> Option<String>,
{
    let credentials: HashMap<String, String> = keys
        .iter()
        .filter_map(|key| lookup(key).map(|v| (key.to_string(), v.trim().to_string())))
        .collect();
    ProviderConfig {
        credentials,
        debug,
        endpoint: lookup(endpoint_key).filter(|v| !v.is_empty()),
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, CoreError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| CoreError::Config(format!("invalid {key}: {e}"))),
        None => Ok(default),
    }
}

fn is_truthy(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.eq_ignore_ascii_case("1")
        || trimmed.eq_ignore_ascii_case("true")
        || trimmed.eq_ignore_ascii_case("yes")
}
