use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CoreError, CoreResult};
use crate::handler::DEFAULT_NOTIFICATION_DURATION;
use crate::retry::{DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES};

pub const DEFAULT_REPORT_DIR: &str = ".meal-resilience";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub report_dir: PathBuf,
    pub webhook_url: Option<String>,
    pub notification_duration: Duration,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            report_dir: PathBuf::from(DEFAULT_REPORT_DIR),
            webhook_url: None,
            notification_duration: DEFAULT_NOTIFICATION_DURATION,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source. Unset or blank
    /// variables take their defaults.
    pub fn from_lookup<F>(lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let max_retries = match var("RESILIENCE_MAX_RETRIES") {
            Some(value) => parse_number("RESILIENCE_MAX_RETRIES", &value)?,
            None => defaults.max_retries,
        };

        let base_delay = match var("RESILIENCE_BASE_DELAY_MS") {
            Some(value) => Duration::from_millis(parse_number("RESILIENCE_BASE_DELAY_MS", &value)?),
            None => defaults.base_delay,
        };

        let notification_duration = match var("NOTIFICATION_DURATION_MS") {
            Some(value) => Duration::from_millis(parse_number("NOTIFICATION_DURATION_MS", &value)?),
            None => defaults.notification_duration,
        };

        let webhook_url = var("ERROR_REPORT_WEBHOOK_URL");
        if let Some(url) = &webhook_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(CoreError::config(format!(
                    "ERROR_REPORT_WEBHOOK_URL must be an http(s) URL: {}",
                    url
                )));
            }
        }

        Ok(Self {
            max_retries,
            base_delay,
            report_dir: var("ERROR_REPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.report_dir),
            webhook_url,
            notification_duration,
            log_level: var("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> CoreResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| CoreError::config(format!("{} must be a valid number, got '{}'", key, value)))
}
