//! Configuration module for netpath

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::DiagError;

/// Default file name looked up in the home directory
pub const DEFAULT_CONFIG_FILE: &str = ".netpath.toml";

/// Main configuration structure for diagnostics operations
///
/// All timeouts are milliseconds, matching how they appear in the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiagConfig {
    /// Timeout for the single-ping operation
    pub ping_timeout: u64,

    /// Per-address timeout during a reachability sweep
    pub scan_timeout: u64,

    /// Timeout of the loopback warm-up probe
    pub warmup_timeout: u64,

    /// Per-hop timeout during path tracing
    pub hop_timeout: u64,

    /// Maximum TTL probed by a trace
    pub max_hops: u8,

    /// Cap on concurrent probes in a sweep (unbounded when unset)
    pub scan_parallel_limit: Option<usize>,

    /// Resolve hop locations through the geo service
    pub geo_enabled: bool,

    /// Base URL of the geo service; the address is appended as a path segment
    pub geo_endpoint: String,

    /// HTTP timeout of a single geo lookup
    pub geo_timeout: u64,
}

impl Default for DiagConfig {
    fn default() -> Self {
        Self {
            ping_timeout: 5000,
            scan_timeout: 500,
            warmup_timeout: 100,
            hop_timeout: 1000,
            max_hops: 30,
            scan_parallel_limit: None,
            geo_enabled: true,
            geo_endpoint: "http://ip-api.com/json".to_string(),
            geo_timeout: 3000,
        }
    }
}

impl DiagConfig {
    /// Set the per-hop trace timeout
    pub fn with_hop_timeout(mut self, hop_timeout: u64) -> Self {
        self.hop_timeout = hop_timeout;
        self
    }

    /// Set the maximum number of hops
    pub fn with_max_hops(mut self, max_hops: u8) -> Self {
        self.max_hops = max_hops;
        self
    }

    /// Set the sweep concurrency cap
    pub fn with_scan_parallel_limit(mut self, limit: usize) -> Self {
        self.scan_parallel_limit = Some(limit);
        self
    }

    /// Enable or disable geo enrichment
    pub fn with_geo(mut self, enabled: bool) -> Self {
        self.geo_enabled = enabled;
        self
    }

    pub fn ping_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.ping_timeout)
    }

    pub fn scan_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.scan_timeout)
    }

    pub fn warmup_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.warmup_timeout)
    }

    pub fn hop_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.hop_timeout)
    }

    pub fn geo_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.geo_timeout)
    }

    /// Load configuration from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DiagError::ConfigError(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: DiagConfig = toml::from_str(&content)
            .map_err(|e| DiagError::ConfigError(format!("Failed to parse TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Path of the per-user configuration file
    pub fn default_path() -> PathBuf {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home_dir.join(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from the default location, falling back to defaults
    pub fn load_default_config() -> Self {
        let path = Self::default_path();

        if path.exists() {
            match Self::from_toml_file(&path) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    return config;
                }
                Err(e) => log::warn!("Ignoring {}: {}", path.display(), e),
            }
        }

        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        let timeouts = [
            ("ping_timeout", self.ping_timeout),
            ("scan_timeout", self.scan_timeout),
            ("warmup_timeout", self.warmup_timeout),
            ("hop_timeout", self.hop_timeout),
            ("geo_timeout", self.geo_timeout),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(DiagError::ConfigError(format!("{} must be greater than 0", name)));
            }
        }

        if self.max_hops == 0 {
            return Err(DiagError::ConfigError("max_hops must be between 1 and 255".to_string()));
        }

        if self.scan_parallel_limit == Some(0) {
            return Err(DiagError::ConfigError(
                "scan_parallel_limit must be greater than 0".to_string(),
            ));
        }

        if self.geo_enabled && self.geo_endpoint.trim().is_empty() {
            return Err(DiagError::ConfigError("geo_endpoint cannot be empty".to_string()));
        }

        Ok(())
    }
}
