use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::clinical::{ReferenceError, ReferenceRanges};
use crate::pipeline::extraction::gemini;
use crate::pipeline::structuring::anthropic;

/// Application-level constants
pub const APP_NAME: &str = "abg-narrative";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_JOB_TTL_SECS: u64 = 600;
pub const DEFAULT_JOB_CAPACITY: usize = 256;

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "abg_narrative=debug,tower_http=debug,info"
    } else {
        "abg_narrative=info,warn"
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Service configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    /// Absent key: analysis endpoints answer NOT_CONFIGURED.
    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: String,
    pub anthropic_model: String,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub upstream_timeout_secs: u64,
    pub job_ttl_secs: u64,
    pub job_capacity: usize,
    /// JSON file overriding the canonical reference ranges.
    pub reference_ranges_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            anthropic_api_key: None,
            anthropic_base_url: anthropic::DEFAULT_BASE_URL.to_string(),
            anthropic_model: anthropic::DEFAULT_MODEL.to_string(),
            gemini_api_key: None,
            gemini_base_url: gemini::DEFAULT_BASE_URL.to_string(),
            gemini_model: gemini::DEFAULT_MODEL.to_string(),
            upstream_timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
            job_ttl_secs: DEFAULT_JOB_TTL_SECS,
            job_capacity: DEFAULT_JOB_CAPACITY,
            reference_ranges_path: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        Ok(Self {
            bind_addr: parse_or(get("ABG_BIND_ADDR"), "ABG_BIND_ADDR", defaults.bind_addr)?,
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            anthropic_base_url: get("ANTHROPIC_BASE_URL").unwrap_or(defaults.anthropic_base_url),
            anthropic_model: get("ANTHROPIC_MODEL").unwrap_or(defaults.anthropic_model),
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_base_url: get("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            gemini_model: get("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            upstream_timeout_secs: parse_positive(
                get("ABG_UPSTREAM_TIMEOUT_SECS"),
                "ABG_UPSTREAM_TIMEOUT_SECS",
                defaults.upstream_timeout_secs,
            )?,
            job_ttl_secs: parse_positive(get("ABG_JOB_TTL_SECS"), "ABG_JOB_TTL_SECS", defaults.job_ttl_secs)?,
            job_capacity: parse_positive(get("ABG_JOB_CAPACITY"), "ABG_JOB_CAPACITY", defaults.job_capacity)?,
            reference_ranges_path: get("ABG_REFERENCE_RANGES").map(PathBuf::from),
        })
    }

    /// Canonical ranges, or the override file when one is configured.
    pub fn reference_ranges(&self) -> Result<ReferenceRanges, ReferenceError> {
        match &self.reference_ranges_path {
            Some(path) => {
                let ranges = ReferenceRanges::load(path)?;
                tracing::info!(path = %path.display(), "Loaded reference range override");
                Ok(ranges)
            }
            None => Ok(ReferenceRanges::canonical()),
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(default),
    }
}

fn parse_positive<T>(raw: Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let value = parse_or(raw.clone(), var, default)?;
    if value <= T::default() {
        return Err(ConfigError::Invalid {
            var,
            value: raw.unwrap_or_default(),
        });
    }
    Ok(value)
}
