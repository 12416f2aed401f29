//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files, reading
//! `PRC_*` environment variables, and merging configurations with proper
//! precedence rules.

use crate::delay::MIN_SAFE_DELAY_SECS;
use crate::error::PageRankError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FileConfig {
    /// Default values for CLI options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// Remote service settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceConfig>,
}

/// Default configuration values that map to CLI options.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DefaultsConfig {
    /// Fixed delay in seconds; randomized delays are used when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,

    /// Randomized delay lower bound in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_delay: Option<u64>,

    /// Randomized delay upper bound in seconds (exclusive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalize: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub incremental_dump: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,

    /// Request timeout (as string, e.g., "20s", "1m")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_html: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_dir: Option<String>,
}

/// Remote service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ServiceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Report discovered files at info level instead of debug
    pub verbose: bool,
}

impl ConfigManager {
    /// Create a new configuration manager.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load and validate configuration from a specific file.
    ///
    /// # Errors
    ///
    /// `FileError` when the file is missing or unreadable, `ConfigError` when
    /// it is not valid TOML or fails validation.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, PageRankError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(PageRankError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            PageRankError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            PageRankError::config(format!("Failed to parse TOML configuration: {}", e))
        })?;

        self.validate_config(&config)?;

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// Lower precedence files are loaded first and overridden field by field:
    /// XDG config, then the home directory, then the working directory.
    /// Files that fail to load are skipped with a warning.
    pub fn discover_and_load(&self) -> Result<FileConfig, PageRankError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    merged_config = self.merge_configs(merged_config, config);
                    loaded_files.push(path);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping config file"),
            }
        }

        for path in &loaded_files {
            if self.verbose {
                info!(path = %path.display(), "loaded config file");
            } else {
                debug!(path = %path.display(), "loaded config file");
            }
        }

        Ok(merged_config)
    }

    /// Configuration file in the current directory.
    fn get_local_config_path(&self) -> Option<PathBuf> {
        ["./pagerank-check.toml", "./.pagerank-check.toml"]
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
    }

    /// Configuration file in the user's home directory.
    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".pagerank-check.toml", "pagerank-check.toml"]
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// Configuration file under the XDG config directory.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("pagerank-check").join("config.toml");
        path.exists().then_some(path)
    }

    /// Merge two configurations; values from `higher` win.
    pub fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            defaults: match (lower.defaults, higher.defaults) {
                (Some(lower), Some(higher)) => Some(DefaultsConfig {
                    delay: higher.delay.or(lower.delay),
                    min_delay: higher.min_delay.or(lower.min_delay),
                    max_delay: higher.max_delay.or(lower.max_delay),
                    normalize: higher.normalize.or(lower.normalize),
                    incremental_dump: higher.incremental_dump.or(lower.incremental_dump),
                    output_dir: higher.output_dir.or(lower.output_dir),
                    timeout: higher.timeout.or(lower.timeout),
                    save_html: higher.save_html.or(lower.save_html),
                    html_dir: higher.html_dir.or(lower.html_dir),
                }),
                (lower, higher) => higher.or(lower),
            },
            service: match (lower.service, higher.service) {
                (Some(lower), Some(higher)) => Some(ServiceConfig {
                    endpoint: higher.endpoint.or(lower.endpoint),
                    referer: higher.referer.or(lower.referer),
                }),
                (lower, higher) => higher.or(lower),
            },
        }
    }

    /// Validate a configuration for common issues.
    pub fn validate_config(&self, config: &FileConfig) -> Result<(), PageRankError> {
        if let Some(defaults) = &config.defaults {
            if let Some(delay) = defaults.delay {
                if delay < MIN_SAFE_DELAY_SECS {
                    return Err(PageRankError::config(format!(
                        "delay must be at least {} seconds, got {}",
                        MIN_SAFE_DELAY_SECS, delay
                    )));
                }
                if defaults.min_delay.is_some() || defaults.max_delay.is_some() {
                    return Err(PageRankError::config(
                        "Cannot specify both 'delay' and 'min_delay'/'max_delay' in defaults",
                    ));
                }
            }

            if let Some(min_delay) = defaults.min_delay {
                if min_delay < MIN_SAFE_DELAY_SECS {
                    return Err(PageRankError::config(format!(
                        "min_delay must be at least {} seconds, got {}",
                        MIN_SAFE_DELAY_SECS, min_delay
                    )));
                }
            }

            if let (Some(min_delay), Some(max_delay)) = (defaults.min_delay, defaults.max_delay) {
                if max_delay <= min_delay {
                    return Err(PageRankError::config(format!(
                        "max_delay ({}) must be greater than min_delay ({})",
                        max_delay, min_delay
                    )));
                }
            }

            if let Some(timeout_str) = &defaults.timeout {
                if parse_timeout_string(timeout_str).is_none() {
                    return Err(PageRankError::config(format!(
                        "Invalid timeout format '{}'. Use format like '20s', '1m'",
                        timeout_str
                    )));
                }
            }
        }

        if let Some(endpoint) = config.service.as_ref().and_then(|s| s.endpoint.as_ref()) {
            url::Url::parse(endpoint).map_err(|e| {
                PageRankError::config(format!("Invalid service endpoint '{}': {}", endpoint, e))
            })?;
        }

        Ok(())
    }
}

/// Environment variable configuration that mirrors CLI options.
///
/// This represents configuration values that can be set via PRC_* environment variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub delay: Option<u64>,
    pub min_delay: Option<u64>,
    pub max_delay: Option<u64>,
    pub normalize: Option<bool>,
    pub dump: Option<bool>,
    pub output_dir: Option<String>,
    pub timeout: Option<String>,
    pub save_html: Option<bool>,
    pub json: Option<bool>,
    pub file: Option<String>,
    pub config: Option<String>,
}

/// Load configuration from `PRC_*` environment variables.
///
/// Invalid values are logged as warnings and ignored.
pub fn load_env_config() -> EnvConfig {
    load_env_config_from(|key| env::var(key).ok())
}

/// Same as [`load_env_config`], reading variables through `lookup`.
pub fn load_env_config_from<F>(lookup: F) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let max_delay = lookup("PRC_MAX_DELAY").and_then(|val| match val.trim().parse::<u64>() {
        Ok(secs) => {
            debug!(value = secs, "using PRC_MAX_DELAY");
            Some(secs)
        }
        Err(_) => {
            warn!(value = %val, "ignoring invalid PRC_MAX_DELAY, expected whole seconds");
            None
        }
    });

    let timeout = lookup("PRC_TIMEOUT").and_then(|timeout_str| {
        if parse_timeout_string(&timeout_str).is_some() {
            debug!(value = %timeout_str, "using PRC_TIMEOUT");
            Some(timeout_str)
        } else {
            warn!(
                value = %timeout_str,
                "ignoring invalid PRC_TIMEOUT, use format like '20s', '1m'"
            );
            None
        }
    });

    EnvConfig {
        delay: read_delay(&lookup, "PRC_DELAY"),
        min_delay: read_delay(&lookup, "PRC_MIN_DELAY"),
        max_delay,
        normalize: read_bool(&lookup, "PRC_NORMALIZE"),
        dump: read_bool(&lookup, "PRC_DUMP"),
        output_dir: read_path(&lookup, "PRC_OUTPUT_DIR"),
        timeout,
        save_html: read_bool(&lookup, "PRC_SAVE_HTML"),
        json: read_bool(&lookup, "PRC_JSON"),
        file: read_path(&lookup, "PRC_FILE"),
        config: read_path(&lookup, "PRC_CONFIG"),
    }
}

fn read_delay<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Option<u64> {
    let val = lookup(key)?;
    match val.trim().parse::<u64>() {
        Ok(secs) if secs >= MIN_SAFE_DELAY_SECS => {
            debug!(key, value = secs, "using environment delay");
            Some(secs)
        }
        _ => {
            warn!(
                key,
                value = %val,
                "ignoring invalid delay, must be at least {} seconds",
                MIN_SAFE_DELAY_SECS
            );
            None
        }
    }
}

fn read_bool<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Option<bool> {
    let val = lookup(key)?;
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => {
            warn!(key, value = %val, "ignoring invalid flag, use true/false");
            None
        }
    }
}

fn read_path<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Option<String> {
    lookup(key).filter(|val| !val.trim().is_empty())
}

/// Parse a timeout string like "20s", "1m" or "20" into seconds.
///
/// Returns `None` for malformed input and for zero.
pub fn parse_timeout_string(timeout_str: &str) -> Option<u64> {
    let timeout_str = timeout_str.trim().to_lowercase();

    let secs = if let Some(secs) = timeout_str.strip_suffix('s') {
        secs.parse::<u64>().ok()
    } else if let Some(mins) = timeout_str.strip_suffix('m') {
        mins.parse::<u64>().ok().and_then(|m| m.checked_mul(60))
    } else {
        // Assume seconds if no unit
        timeout_str.parse::<u64>().ok()
    };

    secs.filter(|s| *s > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_parse_timeout_string() {
        assert_eq!(parse_timeout_string("20s"), Some(20));
        assert_eq!(parse_timeout_string("2m"), Some(120));
        assert_eq!(parse_timeout_string("5"), Some(5));
        assert_eq!(parse_timeout_string("0s"), None);
        assert_eq!(parse_timeout_string("invalid"), None);
    }

    #[test]
    fn test_parse_timeout_string_overflow() {
        assert_eq!(parse_timeout_string("400000000000000000m"), None);
        assert_eq!(
            parse_timeout_string(&format!("{}m", u64::MAX / 60)),
            Some(u64::MAX / 60 * 60)
        );
    }

    #[test]
    fn test_load_valid_config() {
        let temp_file = write_config(
            r#"
[defaults]
min_delay = 40
max_delay = 90
normalize = true
timeout = "30s"

[service]
referer = "https://duckduckgo.com/"
"#,
        );

        let manager = ConfigManager::new(false);
        let config = manager.load_file(temp_file.path()).unwrap();

        let defaults = config.defaults.unwrap();
        assert_eq!(defaults.min_delay, Some(40));
        assert_eq!(defaults.max_delay, Some(90));
        assert_eq!(defaults.normalize, Some(true));
        assert_eq!(defaults.delay, None);

        let service = config.service.unwrap();
        assert_eq!(service.referer.as_deref(), Some("https://duckduckgo.com/"));
        assert_eq!(service.endpoint, None);
    }

    #[test]
    fn test_short_delay_rejected() {
        let temp_file = write_config("[defaults]\ndelay = 10\n");
        let result = ConfigManager::new(false).load_file(temp_file.path());
        assert!(matches!(result, Err(PageRankError::ConfigError { .. })));
    }

    #[test]
    fn test_inverted_random_bounds_rejected() {
        let temp_file = write_config("[defaults]\nmin_delay = 50\nmax_delay = 40\n");
        assert!(ConfigManager::new(false).load_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_fixed_and_random_delay_conflict() {
        let temp_file = write_config("[defaults]\ndelay = 45\nmin_delay = 35\n");
        assert!(ConfigManager::new(false).load_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let temp_file = write_config("[defaults\ndelay = ");
        let result = ConfigManager::new(false).load_file(temp_file.path());
        assert!(matches!(result, Err(PageRankError::ConfigError { .. })));
    }

    #[test]
    fn test_missing_file_is_file_error() {
        let result = ConfigManager::new(false).load_file("/no/such/pagerank-check.toml");
        assert!(matches!(result, Err(PageRankError::FileError { .. })));
    }

    #[test]
    fn test_merge_configs() {
        let manager = ConfigManager::new(false);

        let lower = FileConfig {
            defaults: Some(DefaultsConfig {
                delay: Some(45),
                normalize: Some(false),
                output_dir: Some("lower".to_string()),
                ..Default::default()
            }),
            service: Some(ServiceConfig {
                referer: Some("https://lower.example/".to_string()),
                ..Default::default()
            }),
        };

        let higher = FileConfig {
            defaults: Some(DefaultsConfig {
                normalize: Some(true),
                ..Default::default()
            }),
            service: None,
        };

        let merged = manager.merge_configs(lower, higher);
        let defaults = merged.defaults.unwrap();

        assert_eq!(defaults.delay, Some(45)); // Lower preserved
        assert_eq!(defaults.normalize, Some(true)); // Higher wins
        assert_eq!(defaults.output_dir.as_deref(), Some("lower"));
        assert_eq!(
            merged.service.unwrap().referer.as_deref(),
            Some("https://lower.example/")
        );
    }

    #[test]
    fn test_env_config_parsing() {
        let vars: HashMap<&str, &str> = [
            ("PRC_DELAY", "45"),
            ("PRC_NORMALIZE", "yes"),
            ("PRC_DUMP", "0"),
            ("PRC_TIMEOUT", "1m"),
            ("PRC_OUTPUT_DIR", "out"),
            ("PRC_FILE", "  "),
        ]
        .into_iter()
        .collect();

        let env_config = load_env_config_from(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(env_config.delay, Some(45));
        assert_eq!(env_config.normalize, Some(true));
        assert_eq!(env_config.dump, Some(false));
        assert_eq!(env_config.timeout.as_deref(), Some("1m"));
        assert_eq!(env_config.output_dir.as_deref(), Some("out"));
        assert_eq!(env_config.file, None);
        assert_eq!(env_config.json, None);
    }

    #[test]
    fn test_env_config_ignores_invalid_values() {
        let vars: HashMap<&str, &str> = [
            ("PRC_DELAY", "10"),
            ("PRC_MIN_DELAY", "abc"),
            ("PRC_JSON", "maybe"),
            ("PRC_TIMEOUT", "soon"),
        ]
        .into_iter()
        .collect();

        let env_config = load_env_config_from(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(env_config, EnvConfig::default());
    }
}
