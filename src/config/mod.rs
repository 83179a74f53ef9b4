//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File, Map};
use serde::Deserialize;
use thiserror::Error;
use time::UtcOffset;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::{
    CliArgs, Command, HabitsCommand, MarkArg, Overrides, PageArgs, ProjectsCommand,
    ReminderFilterArgs, RemindersCommand, TagsCommand,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "dayboard";
const ENV_PREFIX: &str = "DAYBOARD";
const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:3000/api";
const DEFAULT_API_TIMEOUT_MS: u64 = 15_000;
pub(crate) const DEFAULT_FRESHNESS_MS: u64 = 30_000;
pub(crate) const DEFAULT_RETENTION_MS: u64 = 5 * 60_000;
pub(crate) const DEFAULT_GC_INTERVAL_MS: u64 = 60_000;
pub(crate) const DEFAULT_QUERY_RETRY_ATTEMPTS: u32 = 1;
pub(crate) const DEFAULT_QUERY_RETRY_DELAY_MS: u64 = 500;
pub(crate) const DEFAULT_DEBOUNCE_MS: u64 = 300;
const MAX_QUERY_RETRY_ATTEMPTS: u32 = 5;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: Url,
    pub token: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub freshness: Duration,
    pub retention: Duration,
    pub gc_interval: Duration,
    pub query_retry_attempts: u32,
    pub query_retry_delay: Duration,
    pub debounce: Duration,
    pub utc_offset: UtcOffset,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    load_with_env(cli, None)
}

/// Like [`load`], reading `DAYBOARD__*` variables from `env` instead of the
/// process environment when given.
pub fn load_with_env(
    cli: &CliArgs,
    env: Option<Map<String, String>>,
) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .source(env),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);
    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    api: RawApiSettings,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(url) = overrides.api_base_url.as_ref() {
            self.api.base_url = Some(url.clone());
        }
        if let Some(token) = overrides.api_token.as_ref() {
            self.api.token = Some(token.clone());
        }
        if let Some(timeout) = overrides.api_timeout_ms {
            self.api.timeout_ms = Some(timeout);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(freshness) = overrides.cache_freshness_ms {
            self.cache.freshness_ms = Some(freshness);
        }
        if let Some(retention) = overrides.cache_retention_ms {
            self.cache.retention_ms = Some(retention);
        }
        if let Some(attempts) = overrides.cache_query_retry_attempts {
            self.cache.query_retry_attempts = Some(attempts);
        }
        if let Some(offset) = overrides.utc_offset_hours {
            self.cache.utc_offset_hours = Some(offset);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            api,
            logging,
            cache,
        } = raw;

        Ok(Self {
            api: build_api_settings(api)?,
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
        })
    }
}

fn build_api_settings(api: RawApiSettings) -> Result<ApiSettings, LoadError> {
    let raw_url = api
        .base_url
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
    let base_url = Url::parse(raw_url.trim())
        .map_err(|err| LoadError::invalid("api.base_url", format!("failed to parse: {err}")))?;
    if !matches!(base_url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "api.base_url",
            format!("unsupported scheme `{}`", base_url.scheme()),
        ));
    }

    let token = api.token.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let timeout_ms = api.timeout_ms.unwrap_or(DEFAULT_API_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "api.timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(ApiSettings {
        base_url,
        token,
        timeout: Duration::from_millis(timeout_ms),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::WARN,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let freshness_ms = cache.freshness_ms.unwrap_or(DEFAULT_FRESHNESS_MS);
    let retention_ms = cache.retention_ms.unwrap_or(DEFAULT_RETENTION_MS);
    if freshness_ms > retention_ms {
        return Err(LoadError::invalid(
            "cache.freshness_ms",
            format!("must not exceed cache.retention_ms ({retention_ms})"),
        ));
    }

    let gc_interval_ms = cache.gc_interval_ms.unwrap_or(DEFAULT_GC_INTERVAL_MS);
    if gc_interval_ms == 0 {
        return Err(LoadError::invalid(
            "cache.gc_interval_ms",
            "must be greater than zero",
        ));
    }

    let query_retry_attempts = cache
        .query_retry_attempts
        .unwrap_or(DEFAULT_QUERY_RETRY_ATTEMPTS);
    if query_retry_attempts > MAX_QUERY_RETRY_ATTEMPTS {
        return Err(LoadError::invalid(
            "cache.query_retry_attempts",
            format!("must be at most {MAX_QUERY_RETRY_ATTEMPTS}"),
        ));
    }

    let utc_offset_hours = cache.utc_offset_hours.unwrap_or(0);
    let utc_offset = UtcOffset::from_hms(utc_offset_hours, 0, 0)
        .ok()
        .filter(|_| (-12..=14).contains(&utc_offset_hours))
        .ok_or_else(|| {
            LoadError::invalid("cache.utc_offset_hours", "must be between -12 and 14")
        })?;

    Ok(CacheSettings {
        freshness: Duration::from_millis(freshness_ms),
        retention: Duration::from_millis(retention_ms),
        gc_interval: Duration::from_millis(gc_interval_ms),
        query_retry_attempts,
        query_retry_delay: Duration::from_millis(
            cache
                .query_retry_delay_ms
                .unwrap_or(DEFAULT_QUERY_RETRY_DELAY_MS),
        ),
        debounce: Duration::from_millis(cache.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS)),
        utc_offset,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawApiSettings {
    base_url: Option<String>,
    token: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    freshness_ms: Option<u64>,
    retention_ms: Option<u64>,
    gc_interval_ms: Option<u64>,
    query_retry_attempts: Option<u32>,
    query_retry_delay_ms: Option<u64>,
    debounce_ms: Option<u64>,
    utc_offset_hours: Option<i8>,
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
