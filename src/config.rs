use std::path::Path;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::error::Error;
use crate::fingerprint::DEFAULT_SEARCH_RADIUS;

/// Config file name, looked up in the project root.
pub const CONFIG_FILE: &str = ".driftmark.toml";

/// Timing and thresholds for marker tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingConfig {
    /// Inserted text must be longer than this (trimmed) to count as a paste.
    pub paste_min_chars: usize,
    /// Delay before verifying when an edit touched a marker line.
    pub priority_delay: Duration,
    /// Lines searched on each side when relocating by fingerprint.
    pub search_radius: u32,
    /// Debounce delay before verifying after an ordinary edit.
    pub verify_delay: Duration,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        return Self {
            paste_min_chars: 20,
            priority_delay: Duration::from_millis(100),
            search_radius: DEFAULT_SEARCH_RADIUS,
            verify_delay: Duration::from_millis(500),
        };
    }
}

/// Project configuration loaded from `.driftmark.toml`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Config {
    /// Symbol tree cache sizing.
    pub cache: CacheConfig,
    /// Marker tracking behavior.
    pub tracking: TrackingConfig,
}

/// Raw TOML structure for `.driftmark.toml`.
#[derive(serde::Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DriftmarkToml {
    /// `[cache]` table.
    #[serde(default)]
    cache: RawCache,
    /// `[tracking]` table.
    #[serde(default)]
    tracking: RawTracking,
}

/// Raw `[cache]` table; absent keys keep their defaults.
#[derive(serde::Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawCache {
    /// Maximum cached documents.
    capacity: Option<usize>,
    /// Entry lifetime in seconds.
    max_age_secs: Option<u64>,
}

/// Raw `[tracking]` table; absent keys keep their defaults.
#[derive(serde::Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawTracking {
    /// Paste threshold in chars.
    paste_min_chars: Option<usize>,
    /// Priority delay in milliseconds.
    priority_delay_ms: Option<u64>,
    /// Fingerprint search radius in lines.
    search_radius: Option<u32>,
    /// Debounce delay in milliseconds.
    verify_delay_ms: Option<u64>,
}

impl Config {
    /// Load config from `.driftmark.toml` in the given root directory.
    /// Returns defaults if the file doesn't exist.
    /// Returns an error if the file exists but is malformed; never silently
    /// falls back to defaults when the user wrote a config file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::TomlDe` if the TOML is malformed.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(CONFIG_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::Io(e)),
        };
        return Self::parse(&content);
    }

    /// Parse config text, filling absent keys with defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` if the TOML is malformed or has unknown keys.
    pub fn parse(content: &str) -> Result<Self, Error> {
        let raw: DriftmarkToml = toml::from_str(content)?;
        let defaults = Self::default();
        let tracking = TrackingConfig {
            paste_min_chars: raw.tracking.paste_min_chars.unwrap_or(defaults.tracking.paste_min_chars),
            priority_delay: raw
                .tracking
                .priority_delay_ms
                .map_or(defaults.tracking.priority_delay, Duration::from_millis),
            search_radius: raw.tracking.search_radius.unwrap_or(defaults.tracking.search_radius),
            verify_delay: raw.tracking.verify_delay_ms.map_or(defaults.tracking.verify_delay, Duration::from_millis),
        };
        let cache = CacheConfig {
            capacity: raw.cache.capacity.unwrap_or(defaults.cache.capacity).max(1),
            max_age: raw.cache.max_age_secs.map_or(defaults.cache.max_age, Duration::from_secs),
        };
        return Ok(Self { cache, tracking });
    }
}
