/*!
 * Configuration for bucket-hub
 *
 * A `HubConfig` is either one bucket's credentials or a map of them keyed by
 * bucket name. Files are TOML:
 *
 * ```toml
 * [logging]
 * level = "debug"
 *
 * [storage]
 * bucket = "logs"
 * region = "oss-cn-hangzhou"
 * access_key_id = "K"
 * access_key_secret = "S"
 * ```
 *
 * or, for several buckets, one table per bucket under `[storage.<name>]`.
 */

use crate::error::{HubError, Result};
use crate::protocol::s3::S3Config;
use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Storage credentials for one or several buckets
///
/// The two shapes are told apart structurally: a table whose values are all
/// tables is a bucket map, anything else is a single bucket. Only the chosen
/// shape is then parsed, so a bad value in one entry is reported as such.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HubConfig {
    /// Bucket name -> credentials
    Multi(HashMap<String, S3Config>),

    /// One bucket, which is also the default
    Single(S3Config),
}

impl HubConfig {
    /// Parse from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: HubConfig = serde_json::from_str(json)?;
        Ok(config.normalized())
    }

    /// Parse from a TOML document
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: HubConfig = toml::from_str(contents)?;
        Ok(config.normalized())
    }

    /// Fill in the bucket of map entries that leave it empty with their key
    pub fn normalized(self) -> Self {
        match self {
            HubConfig::Multi(map) => HubConfig::Multi(
                map.into_iter()
                    .map(|(name, mut config)| {
                        if config.bucket.is_empty() {
                            config.bucket = name.clone();
                        }
                        (name, config)
                    })
                    .collect(),
            ),
            single => single,
        }
    }

    /// Check the configuration before any client is built
    ///
    /// Bucket naming rules are left to client construction.
    pub fn validate(&self) -> Result<()> {
        match self {
            HubConfig::Single(config) => {
                if config.bucket.is_empty() {
                    return Err(HubError::InvalidConfig(
                        "single-bucket configuration needs a bucket name".to_string(),
                    ));
                }
                config
                    .validate_settings()
                    .map_err(|e| HubError::InvalidConfig(format!("{}: {}", config.bucket, e)))
            }
            HubConfig::Multi(map) => {
                if map.is_empty() {
                    return Err(HubError::InvalidConfig(
                        "no buckets configured".to_string(),
                    ));
                }
                for (name, config) in map {
                    if name.is_empty() {
                        return Err(HubError::InvalidConfig(
                            "bucket map contains an empty name".to_string(),
                        ));
                    }
                    config
                        .validate_settings()
                        .map_err(|e| HubError::InvalidConfig(format!("{}: {}", name, e)))?;
                }
                Ok(())
            }
        }
    }

    /// Bucket used when a call names none
    ///
    /// Only a single-bucket configuration has one.
    pub fn default_bucket(&self) -> Option<&str> {
        match self {
            HubConfig::Single(config) if !config.bucket.is_empty() => Some(&config.bucket),
            _ => None,
        }
    }

    /// Credentials for a bucket name, if configured
    pub fn credentials_for(&self, bucket: &str) -> Option<&S3Config> {
        match self {
            HubConfig::Single(config) => (config.bucket == bucket).then_some(config),
            HubConfig::Multi(map) => map.get(bucket),
        }
    }

    /// All configured bucket names, sorted
    pub fn configured_buckets(&self) -> Vec<String> {
        let mut names: Vec<String> = match self {
            HubConfig::Single(config) => vec![config.bucket.clone()],
            HubConfig::Multi(map) => map.keys().cloned().collect(),
        };
        names.sort();
        names
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, HubConfig::Multi(_))
    }
}

impl<'de> Deserialize<'de> for HubConfig {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Object(fields) if fields.values().all(Value::is_object) => fields
                .into_iter()
                .map(|(name, entry)| match bucket_from_value(entry) {
                    Ok(config) => Ok((name, config)),
                    Err(e) => Err(D::Error::custom(format!("bucket '{}': {}", name, e))),
                })
                .collect::<std::result::Result<HashMap<_, _>, _>>()
                .map(HubConfig::Multi),
            other => bucket_from_value(other)
                .map(HubConfig::Single)
                .map_err(D::Error::custom),
        }
    }
}

/// Parse one bucket's settings, naming the first field that fails
fn bucket_from_value(value: Value) -> std::result::Result<S3Config, String> {
    let err = match S3Config::deserialize(&value) {
        Ok(config) => return Ok(config),
        Err(e) => e,
    };

    let Value::Object(fields) = value else {
        return Err(err.to_string());
    };
    // Every field has a default, so each one can be checked on its own
    Err(fields
        .into_iter()
        .find_map(|(key, field)| {
            let alone = Value::Object(Map::from_iter([(key.clone(), field)]));
            S3Config::deserialize(alone)
                .err()
                .map(|e| format!("{}: {}", key, e))
        })
        .unwrap_or_else(|| err.to_string()))
}

impl From<S3Config> for HubConfig {
    fn from(config: S3Config) -> Self {
        HubConfig::Single(config)
    }
}

impl From<HashMap<String, S3Config>> for HubConfig {
    fn from(map: HashMap<String, S3Config>) -> Self {
        HubConfig::Multi(map).normalized()
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Logging section of the settings file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level
    pub level: LogLevel,

    /// Log file path (None = stdout); written as JSON lines
    pub file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for level = debug)
    pub verbose: bool,
}

/// Settings file: logging plus storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub logging: LogConfig,

    pub storage: HubConfig,
}

impl Settings {
    /// Load settings from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            HubError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    /// Parse settings from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut settings: Settings = toml::from_str(contents)?;
        settings.storage = settings.storage.normalized();
        settings.storage.validate()?;
        Ok(settings)
    }
}
