//! Configuration management.
//!
//! [`KatraConfig`] collects every tunable of the engine. Values come from
//! defaults, then an optional TOML file, then `KATRA_*` environment variables.
//!
//! ```toml
//! [working_memory]
//! capacity = 9
//!
//! [deduplication]
//! window_secs = 600
//!
//! [background]
//! max_concurrent = 4
//! fail_fast = true
//!
//! [logging]
//! format = "json"
//! ```

use crate::observability::{LogFormat, LoggingConfig};
use crate::services::consolidation::{BackgroundConfig, ConsolidationConfig};
use crate::services::deduplication::DeduplicationConfig;
use crate::services::graph::{ConnectionGraph, DEFAULT_CENTRALITY_FLOOR, DEFAULT_MIN_SHARED_KEYWORDS};
use crate::services::patterns::{
    DEFAULT_MIN_PATTERN_SIZE, DEFAULT_SIMILARITY_THRESHOLD, PatternDetector,
};
use crate::services::working_memory::WorkingMemoryConfig;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Connection graph settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphConfig {
    /// Shared keywords that make two records connected.
    pub min_shared_keywords: usize,
    /// Lower bound of the centrality denominator.
    pub centrality_floor: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            min_shared_keywords: DEFAULT_MIN_SHARED_KEYWORDS,
            centrality_floor: DEFAULT_CENTRALITY_FLOOR,
        }
    }
}

impl GraphConfig {
    /// Builds the connection graph.
    #[must_use]
    pub fn build(&self) -> ConnectionGraph {
        ConnectionGraph::new()
            .with_min_shared_keywords(self.min_shared_keywords)
            .with_centrality_floor(self.centrality_floor)
    }
}

/// Pattern detector settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternConfig {
    /// Minimum keyword similarity to the seed.
    pub similarity_threshold: f32,
    /// Minimum members of a pattern.
    pub min_pattern_size: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            min_pattern_size: DEFAULT_MIN_PATTERN_SIZE,
        }
    }
}

impl PatternConfig {
    /// Builds the pattern detector.
    #[must_use]
    pub fn build(&self) -> PatternDetector {
        PatternDetector::new()
            .with_similarity_threshold(self.similarity_threshold)
            .with_min_pattern_size(self.min_pattern_size)
    }
}

/// Main configuration for katra.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KatraConfig {
    /// Working memory buffers.
    pub working_memory: WorkingMemoryConfig,
    /// Connection graph.
    pub graph: GraphConfig,
    /// Pattern detection.
    pub patterns: PatternConfig,
    /// Duplicate detection.
    pub deduplication: DeduplicationConfig,
    /// WAKE/SLEEP consolidation.
    pub consolidation: ConsolidationConfig,
    /// Background annotation bulkhead.
    pub background: BackgroundConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Configuration file format.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Working memory section.
    pub working_memory: Option<ConfigFileWorkingMemory>,
    /// Graph section.
    pub graph: Option<ConfigFileGraph>,
    /// Patterns section.
    pub patterns: Option<ConfigFilePatterns>,
    /// Deduplication section.
    pub deduplication: Option<ConfigFileDeduplication>,
    /// Consolidation section.
    pub consolidation: Option<ConfigFileConsolidation>,
    /// Background section.
    pub background: Option<ConfigFileBackground>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// Working memory section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileWorkingMemory {
    /// Buffer capacity.
    pub capacity: Option<usize>,
    /// Consolidation interval in seconds.
    pub consolidation_interval_secs: Option<u64>,
    /// Fill ratio that triggers consolidation.
    pub capacity_threshold: Option<f32>,
}

/// Graph section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileGraph {
    /// Shared keyword threshold.
    pub min_shared_keywords: Option<usize>,
    /// Centrality floor.
    pub centrality_floor: Option<usize>,
}

/// Patterns section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFilePatterns {
    /// Similarity threshold.
    pub similarity_threshold: Option<f32>,
    /// Minimum pattern size.
    pub min_pattern_size: Option<usize>,
}

/// Deduplication section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileDeduplication {
    /// Enable duplicate detection.
    pub enabled: Option<bool>,
    /// Default semantic threshold.
    pub threshold: Option<f32>,
    /// Exact-match window in seconds.
    pub window_secs: Option<u64>,
    /// Semantic candidate limit.
    pub candidate_limit: Option<usize>,
}

/// Consolidation section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileConsolidation {
    /// HIGH strength cut-off.
    pub high_threshold: Option<f32>,
    /// MEDIUM strength cut-off.
    pub medium_threshold: Option<f32>,
    /// Persist graph and pattern annotations.
    pub persist_annotations: Option<bool>,
}

/// Background section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileBackground {
    /// Max concurrent passes.
    pub max_concurrent: Option<usize>,
    /// Permit timeout in milliseconds.
    pub acquire_timeout_ms: Option<u64>,
    /// Reject when full.
    pub fail_fast: Option<bool>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Filter directive.
    pub filter: Option<String>,
    /// Log file path.
    pub file: Option<String>,
}

impl KatraConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from defaults and environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Loads configuration from a TOML file.
    ///
    /// Missing sections and keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        let file: ConfigFile =
            toml::from_str(&contents).map_err(|e| Error::operation_failed("parse_config_file", e))?;

        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(Self::from_config_file(file))
    }

    /// Applies every `KATRA_*` environment override.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        self.working_memory = self.working_memory.with_env_overrides();
        self.deduplication = self.deduplication.with_env_overrides();
        self.background = self.background.with_env_overrides();
        self.logging = self.logging.with_env_overrides();

        if let Some(v) = env_parse::<usize>("KATRA_GRAPH_MIN_SHARED_KEYWORDS") {
            self.graph.min_shared_keywords = v.max(1);
        }
        if let Some(v) = env_parse::<f32>("KATRA_PATTERN_THRESHOLD") {
            self.patterns.similarity_threshold = v.clamp(0.0, 1.0);
        }
        if let Some(v) = env_parse::<usize>("KATRA_PATTERN_MIN_SIZE") {
            self.patterns.min_pattern_size = v.max(DEFAULT_MIN_PATTERN_SIZE);
        }
        self
    }

    /// Converts a `ConfigFile` to `KatraConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(wm) = file.working_memory {
            if let Some(capacity) = wm.capacity {
                config.working_memory.capacity = capacity;
            }
            if let Some(secs) = wm.consolidation_interval_secs {
                config.working_memory.consolidation_interval_secs = secs;
            }
            if let Some(threshold) = wm.capacity_threshold {
                config.working_memory.capacity_threshold = threshold;
            }
        }

        if let Some(graph) = file.graph {
            if let Some(min) = graph.min_shared_keywords {
                config.graph.min_shared_keywords = min;
            }
            if let Some(floor) = graph.centrality_floor {
                config.graph.centrality_floor = floor;
            }
        }

        if let Some(patterns) = file.patterns {
            if let Some(threshold) = patterns.similarity_threshold {
                config.patterns.similarity_threshold = threshold;
            }
            if let Some(size) = patterns.min_pattern_size {
                config.patterns.min_pattern_size = size.max(DEFAULT_MIN_PATTERN_SIZE);
            }
        }

        if let Some(dedup) = file.deduplication {
            if let Some(enabled) = dedup.enabled {
                config.deduplication.enabled = enabled;
            }
            if let Some(threshold) = dedup.threshold {
                config.deduplication.default_threshold = threshold;
            }
            if let Some(secs) = dedup.window_secs {
                config.deduplication.recent_window = Duration::from_secs(secs);
            }
            if let Some(limit) = dedup.candidate_limit {
                config.deduplication.candidate_limit = limit.max(1);
            }
        }

        if let Some(consolidation) = file.consolidation {
            if let Some(high) = consolidation.high_threshold {
                config.consolidation.thresholds.high = high;
            }
            if let Some(medium) = consolidation.medium_threshold {
                config.consolidation.thresholds.medium = medium;
            }
            if let Some(persist) = consolidation.persist_annotations {
                config.consolidation.persist_annotations = persist;
            }
        }

        if let Some(background) = file.background {
            if let Some(max) = background.max_concurrent {
                config.background.max_concurrent = max.max(1);
            }
            if let Some(timeout) = background.acquire_timeout_ms {
                config.background.acquire_timeout_ms = timeout;
            }
            if let Some(fail_fast) = background.fail_fast {
                config.background.fail_fast = fail_fast;
            }
        }

        if let Some(logging) = file.logging {
            if let Some(format) = logging.format.as_deref().and_then(LogFormat::parse) {
                config.logging.format = format;
            }
            if let Some(filter) = logging.filter {
                config.logging.filter = filter;
            }
            if let Some(file) = logging.file {
                config.logging.file = Some(PathBuf::from(file));
            }
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
