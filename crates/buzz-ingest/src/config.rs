//! Ingestion settings.
//!
//! Resolution order: built-in defaults, then `<data_dir>/buzz.toml`, then the
//! `BUZZ_UPSTREAM_URL` environment variable. The CLI applies its own flags on
//! top of the returned value.

use std::path::Path;
use std::time::Duration;
use std::{env, fs};

use buzz_core::{DEFAULT_CACHE_TTL_SECS, DEFAULT_GRID_STEP_SECS, Timeframe};
use serde::Deserialize;

use crate::error::ConfigError;

pub const CONFIG_FILE_NAME: &str = "buzz.toml";
pub const UPSTREAM_URL_ENV: &str = "BUZZ_UPSTREAM_URL";

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    pub upstream_url: String,
    pub locale: String,
    pub tz_offset: i32,
    pub default_geo: String,
    pub default_timeframe: Timeframe,
    pub session_lifetime_secs: u64,
    pub request_timeout_secs: u64,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub cache_ttl_secs: u64,
    pub update_interval_secs: u64,
    pub inter_target_delay_ms: u64,
    pub grid_step_secs: i64,
    pub densify_max_window_days: i64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            upstream_url: "https://trends.google.com".to_string(),
            locale: "en-US".to_string(),
            tz_offset: 360,
            default_geo: String::new(),
            default_timeframe: Timeframe::PastWeek,
            session_lifetime_secs: 3600,
            request_timeout_secs: 30,
            min_delay_ms: 1000,
            max_delay_ms: 60_000,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            update_interval_secs: 300,
            inter_target_delay_ms: 2000,
            grid_step_secs: DEFAULT_GRID_STEP_SECS,
            densify_max_window_days: 5 * 365,
        }
    }
}

impl IngestConfig {
    /// Load defaults, overlay `<data_dir>/buzz.toml` if it exists, then env.
    pub fn load(data_dir: &Path) -> Result<Self, ConfigError> {
        let path = data_dir.join(CONFIG_FILE_NAME);
        let mut config = if path.is_file() {
            let content = fs::read_to_string(&path).map_err(|e| ConfigError::Read {
                path: path.clone(),
                source: e,
            })?;
            let parsed = Self::from_toml_str(&content).map_err(|e| match e {
                ConfigError::Parse { message, .. } => ConfigError::Parse {
                    path: path.clone(),
                    message,
                },
                other => other,
            })?;
            tracing::debug!("loaded config from {}", path.display());
            parsed
        } else {
            Self::default()
        };

        if let Ok(url) = env::var(UPSTREAM_URL_ENV)
            && !url.trim().is_empty()
        {
            config.upstream_url = url.trim().to_string();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: Default::default(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.upstream_url.starts_with("http://") || self.upstream_url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid {
                key: "upstream_url",
                message: format!("'{}' is not an http(s) URL", self.upstream_url),
            });
        }
        if self.max_delay_ms < self.min_delay_ms {
            return Err(ConfigError::Invalid {
                key: "max_delay_ms",
                message: "must be >= min_delay_ms".to_string(),
            });
        }
        if self.grid_step_secs <= 0 {
            return Err(ConfigError::Invalid {
                key: "grid_step_secs",
                message: "must be positive".to_string(),
            });
        }
        if self.session_lifetime_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "session_lifetime_secs",
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::new(&self.upstream_url)
    }

    pub fn session_lifetime(&self) -> Duration {
        Duration::from_secs(self.session_lifetime_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub fn inter_target_delay(&self) -> Duration {
        Duration::from_millis(self.inter_target_delay_ms)
    }

    pub fn densify_max_window_secs(&self) -> i64 {
        self.densify_max_window_days.saturating_mul(buzz_core::time::SECS_PER_DAY)
    }
}

/// Upstream URLs derived from the configured base.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    pub cookie_bootstrap: String,
    pub explore: String,
    pub widget_data: String,
    pub region_data: String,
}

impl Endpoints {
    pub fn new(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            cookie_bootstrap: format!("{base}/?geo=US"),
            explore: format!("{base}/trends/api/explore"),
            widget_data: format!("{base}/trends/api/widgetdata/multiline"),
            region_data: format!("{base}/trends/api/widgetdata/comparedgeo"),
        }
    }
}
