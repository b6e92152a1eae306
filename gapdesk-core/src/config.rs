//! Engine configuration, loaded from TOML.
//!
//! Every section has defaults, so an empty file (or no file at all) yields the
//! stock configuration. Hand-tuned constants that the scoring falls back to live
//! in [`FallbackConstants`] rather than inline in the analyzers.

use crate::data::universe::SectorUniverse;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub underlying: UnderlyingConfig,
    pub decision: DecisionThresholds,
    pub momentum: MomentumThresholds,
    pub technical: TechnicalConfig,
    pub feeds: FeedConfig,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub breaker: BreakerConfig,
    pub fallbacks: FallbackConstants,
    pub internals: InternalsConfig,
    pub sectors: SectorUniverse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnderlyingConfig {
    pub symbol: String,
}

impl Default for UnderlyingConfig {
    fn default() -> Self {
        Self {
            symbol: "SPY".into(),
        }
    }
}

/// Net-score thresholds for the entry classification (applied symmetrically).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionThresholds {
    pub strong: f64,
    pub moderate: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            strong: 7.0,
            moderate: 5.0,
        }
    }
}

/// Momentum-shift detection thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumThresholds {
    /// |mom5 − mom10| in percent.
    pub strong_divergence: f64,
    pub moderate_divergence: f64,
    /// Recent-vs-prior volume ratio.
    pub strong_volume: f64,
    pub moderate_volume: f64,
}

impl Default for MomentumThresholds {
    fn default() -> Self {
        Self {
            strong_divergence: 0.3,
            moderate_divergence: 0.2,
            strong_volume: 1.3,
            moderate_volume: 1.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TechnicalConfig {
    /// Score VWAP distance with the trend-adjusted threshold.
    pub use_dynamic_vwap: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub tradier_base_url: String,
    pub tradier_sandbox_url: String,
    pub sandbox: bool,
    /// API token; `TRADIER_TOKEN` in the environment takes precedence.
    pub token: Option<String>,
    pub yahoo_base_url: String,
    pub request_timeout_secs: u64,
    pub breadth_timeout_secs: u64,
    pub retries: u32,
    pub retry_base_delay_secs: f64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            tradier_base_url: "https://api.tradier.com/v1".into(),
            tradier_sandbox_url: "https://sandbox.tradier.com/v1".into(),
            sandbox: false,
            token: None,
            yahoo_base_url: "https://query2.finance.yahoo.com".into(),
            request_timeout_secs: 10,
            breadth_timeout_secs: 5,
            retries: 3,
            retry_base_delay_secs: 2.0,
        }
    }
}

impl FeedConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn breadth_timeout(&self) -> Duration {
        Duration::from_secs(self.breadth_timeout_secs)
    }

    pub fn tradier_url(&self) -> &str {
        if self.sandbox {
            &self.tradier_sandbox_url
        } else {
            &self.tradier_base_url
        }
    }

    /// Token from the environment, else from the file.
    pub fn resolved_token(&self) -> Option<String> {
        std::env::var("TRADIER_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.token.clone().filter(|t| !t.trim().is_empty()))
    }
}

/// Secondary-feed throttle settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub min_interval_secs: f64,
    pub max_requests_per_hour: u32,
    pub max_backoff: f64,
    pub jitter_min_secs: f64,
    pub jitter_max_secs: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: 3.0,
            max_requests_per_hour: 50,
            max_backoff: 10.0,
            jitter_min_secs: 0.1,
            jitter_max_secs: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 30 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 300,
        }
    }
}

/// Hand-tuned values used when live data is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConstants {
    pub proxy_price: f64,
    /// Per-hour drift applied to the proxy price during market hours.
    pub proxy_price_drift: f64,
    pub proxy_volume: u64,
    pub proxy_volume_closed: u64,
    /// Gap used when no tier can supply daily bars.
    pub default_gap_pct: f64,
    /// Gap reported by the gap analyzer's static fallback.
    pub fallback_gap_pct: f64,
    pub proxy_benchmark_change_pct: f64,
    /// Volume-surge ratio assumed when average volume is unknown.
    pub proxy_volume_surge: f64,
    /// Price used for unknown symbols by the proxy tier.
    pub nominal_price: f64,
}

impl Default for FallbackConstants {
    fn default() -> Self {
        Self {
            proxy_price: 640.27,
            proxy_price_drift: 0.1,
            proxy_volume: 50_000_000,
            proxy_volume_closed: 45_000_000,
            default_gap_pct: -1.2,
            fallback_gap_pct: -1.17,
            proxy_benchmark_change_pct: -0.75,
            proxy_volume_surge: 1.39,
            nominal_price: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InternalsConfig {
    /// TICK, TRIN and NYSE advance/decline, in that order.
    pub breadth_symbols: Vec<String>,
    pub index_symbols: Vec<String>,
}

impl Default for InternalsConfig {
    fn default() -> Self {
        Self {
            breadth_symbols: vec!["$TICK".into(), "$TRIN".into(), "$NYAD".into()],
            index_symbols: vec!["SPY".into(), "QQQ".into(), "IWM".into(), "DIA".into()],
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.decision;
        if !(d.moderate > 0.0 && d.strong > 0.0) {
            return Err(ConfigError::Invalid(
                "decision thresholds must be positive".into(),
            ));
        }
        if d.moderate >= d.strong {
            return Err(ConfigError::Invalid(format!(
                "decision.moderate ({}) must be below decision.strong ({})",
                d.moderate, d.strong
            )));
        }
        if self.underlying.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("underlying.symbol is empty".into()));
        }
        if self.sectors.is_empty() {
            return Err(ConfigError::Invalid("at least one sector is required".into()));
        }
        let weight_sum = self.sectors.weight_sum();
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::Invalid(format!(
                "sector weights sum to {weight_sum}, expected 1.0"
            )));
        }
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::Invalid("cache.ttl_secs must be positive".into()));
        }
        if self.feeds.request_timeout_secs == 0 || self.feeds.breadth_timeout_secs == 0 {
            return Err(ConfigError::Invalid("feed timeouts must be positive".into()));
        }
        let rl = &self.rate_limit;
        let timings = [rl.min_interval_secs, rl.max_backoff, rl.jitter_min_secs, rl.jitter_max_secs];
        if timings.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::Invalid("rate_limit timings must be finite".into()));
        }
        if rl.min_interval_secs < 0.0 || rl.jitter_min_secs < 0.0 || rl.jitter_min_secs > rl.jitter_max_secs {
            return Err(ConfigError::Invalid("rate_limit timings are inconsistent".into()));
        }
        if rl.max_backoff < 1.0 {
            return Err(ConfigError::Invalid("rate_limit.max_backoff must be >= 1".into()));
        }
        Ok(())
    }
}
