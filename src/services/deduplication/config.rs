//! Deduplication configuration.

use std::time::Duration;

/// Configuration for the deduplication service.
///
/// # Environment Variables
///
/// | Variable | Type | Default | Description |
/// |----------|------|---------|-------------|
/// | `KATRA_DEDUP_ENABLED` | bool | `true` | Enable deduplication |
/// | `KATRA_DEDUP_THRESHOLD` | f32 | `0.0` | Default semantic threshold (0 = exact only) |
/// | `KATRA_DEDUP_WINDOW_SECS` | u64 | `300` | Exact-match recency window |
/// | `KATRA_DEDUP_CANDIDATE_LIMIT` | usize | `100` | Most recent records scored by the semantic pass (min 1) |
///
/// # Example
///
/// ```rust
/// use katra::services::deduplication::DeduplicationConfig;
/// use std::time::Duration;
///
/// let config = DeduplicationConfig::default();
/// assert!(config.enabled);
/// assert_eq!(config.recent_window, Duration::from_secs(300));
/// assert_eq!(config.candidate_limit, 100);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DeduplicationConfig {
    /// Enable/disable entire deduplication.
    pub enabled: bool,

    /// Semantic threshold used when the caller does not pass one.
    pub default_threshold: f32,

    /// Window in which an identical record counts as an exact duplicate.
    pub recent_window: Duration,

    /// Number of most recent records scored by the semantic pass.
    pub candidate_limit: usize,

    /// Maximum length of the match preview.
    pub preview_length: usize,
}

impl DeduplicationConfig {
    /// Creates a new configuration from environment variables.
    ///
    /// Falls back to defaults for any unset variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies `KATRA_DEDUP_*` environment variables on top of `self`.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("KATRA_DEDUP_ENABLED") {
            self.enabled = v.to_lowercase() != "false" && v != "0";
        }
        if let Some(threshold) = env_parse::<f32>("KATRA_DEDUP_THRESHOLD") {
            self.default_threshold = threshold.clamp(0.0, 1.0);
        }
        if let Some(secs) = env_parse::<u64>("KATRA_DEDUP_WINDOW_SECS") {
            self.recent_window = Duration::from_secs(secs);
        }
        if let Some(limit) = env_parse::<usize>("KATRA_DEDUP_CANDIDATE_LIMIT") {
            self.candidate_limit = limit.max(1);
        }
        self
    }

    /// Builder method to set enabled state.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder method to set the default semantic threshold.
    #[must_use]
    pub const fn with_default_threshold(mut self, threshold: f32) -> Self {
        self.default_threshold = threshold;
        self
    }

    /// Builder method to set the exact-match window.
    #[must_use]
    pub const fn with_recent_window(mut self, duration: Duration) -> Self {
        self.recent_window = duration;
        self
    }

    /// Builder method to set the semantic candidate limit (at least 1).
    #[must_use]
    pub const fn with_candidate_limit(mut self, limit: usize) -> Self {
        self.candidate_limit = if limit == 0 { 1 } else { limit };
        self
    }
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_threshold: 0.0,
            recent_window: Duration::from_secs(300), // 5 minutes
            candidate_limit: 100,
            preview_length: 200,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
