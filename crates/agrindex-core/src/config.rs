use crate::error::{AgrindexError, Result};
use crate::models::IndexDefinition;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has at least the current precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() >= self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Where fetched and intermediate rasters live during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkingSetStrategy {
    /// Keep everything in memory buffers
    #[default]
    Memory,
    /// Spill to a temporary directory removed when the run ends
    Disk,
}

/// Layered configuration for Agrindex
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub catalog_url: ConfigValue<String>,
    pub collections: ConfigValue<Vec<String>>,
    pub lookback_days: ConfigValue<u32>,
    pub result_limit: ConfigValue<u32>,
    pub output_bucket: ConfigValue<String>,
    pub state_machine_arn: ConfigValue<Option<String>>,
    pub notification_topic_arn: ConfigValue<Option<String>>,
    pub max_probe_attempts: ConfigValue<u32>,
    pub max_start_attempts: ConfigValue<u32>,
    pub request_timeout_secs: ConfigValue<u64>,
    pub band_nodata: ConfigValue<u16>,
    pub index_nodata: ConfigValue<f32>,
    pub working_set: ConfigValue<WorkingSetStrategy>,
    pub indices: ConfigValue<Vec<IndexDefinition>>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            catalog_url: ConfigValue::new(
                "https://earth-search.aws.element84.com/v1/search".to_string(),
                ConfigSource::Default,
            ),
            collections: ConfigValue::new(
                vec!["sentinel-2-l2a".to_string()],
                ConfigSource::Default,
            ),
            lookback_days: ConfigValue::new(6, ConfigSource::Default),
            result_limit: ConfigValue::new(1, ConfigSource::Default),
            output_bucket: ConfigValue::new(
                "sentinel-2-cogs-rnil".to_string(),
                ConfigSource::Default,
            ),
            state_machine_arn: ConfigValue::new(None, ConfigSource::Default),
            notification_topic_arn: ConfigValue::new(None, ConfigSource::Default),
            max_probe_attempts: ConfigValue::new(25, ConfigSource::Default),
            max_start_attempts: ConfigValue::new(3, ConfigSource::Default),
            request_timeout_secs: ConfigValue::new(60, ConfigSource::Default),
            band_nodata: ConfigValue::new(0, ConfigSource::Default),
            index_nodata: ConfigValue::new(-9999.0, ConfigSource::Default),
            working_set: ConfigValue::new(WorkingSetStrategy::Memory, ConfigSource::Default),
            indices: ConfigValue::new(IndexDefinition::defaults(), ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| AgrindexError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| AgrindexError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(url) = file_config.catalog_url {
            self.catalog_url.update(url, ConfigSource::File);
        }
        if let Some(collections) = file_config.collections {
            self.collections.update(collections, ConfigSource::File);
        }
        if let Some(days) = file_config.lookback_days {
            self.lookback_days.update(days, ConfigSource::File);
        }
        if let Some(limit) = file_config.result_limit {
            self.result_limit.update(limit, ConfigSource::File);
        }
        if let Some(bucket) = file_config.output_bucket {
            self.output_bucket.update(bucket, ConfigSource::File);
        }
        if let Some(arn) = file_config.state_machine_arn {
            self.state_machine_arn.update(Some(arn), ConfigSource::File);
        }
        if let Some(arn) = file_config.notification_topic_arn {
            self.notification_topic_arn.update(Some(arn), ConfigSource::File);
        }
        if let Some(attempts) = file_config.max_probe_attempts {
            self.max_probe_attempts.update(attempts, ConfigSource::File);
        }
        if let Some(attempts) = file_config.max_start_attempts {
            self.max_start_attempts.update(attempts, ConfigSource::File);
        }
        if let Some(secs) = file_config.request_timeout_secs {
            self.request_timeout_secs.update(secs, ConfigSource::File);
        }
        if let Some(nodata) = file_config.band_nodata {
            self.band_nodata.update(nodata, ConfigSource::File);
        }
        if let Some(nodata) = file_config.index_nodata {
            self.index_nodata.update(nodata, ConfigSource::File);
        }
        if let Some(strategy) = file_config.working_set {
            self.working_set.update(strategy, ConfigSource::File);
        }
        if let Some(indices) = file_config.indices {
            let indices = indices
                .into_iter()
                .map(|(name, bands)| match bands.as_slice() {
                    [a, b] => Ok(IndexDefinition::new(name, a.clone(), b.clone())),
                    _ => Err(AgrindexError::ConfigInvalid {
                        key: format!("indices.{}", name),
                        reason: format!("expected exactly two bands, found {}", bands.len()),
                    }),
                })
                .collect::<Result<Vec<_>>>()?;
            self.indices.update(indices, ConfigSource::File);
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        if let Ok(url) = env::var("AGRINDEX_CATALOG_URL") {
            self.catalog_url.update(url, ConfigSource::Environment);
        }

        if let Ok(list) = env::var("AGRINDEX_COLLECTIONS") {
            let collections: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            if collections.is_empty() {
                tracing::warn!("Ignoring empty AGRINDEX_COLLECTIONS");
            } else {
                self.collections.update(collections, ConfigSource::Environment);
            }
        }

        if let Some(days) = parse_env::<u32>("AGRINDEX_LOOKBACK_DAYS") {
            self.lookback_days.update(days, ConfigSource::Environment);
        }

        if let Some(limit) = parse_env::<u32>("AGRINDEX_RESULT_LIMIT") {
            self.result_limit.update(limit, ConfigSource::Environment);
        }

        if let Ok(bucket) = env::var("AGRINDEX_OUTPUT_BUCKET") {
            self.output_bucket.update(bucket, ConfigSource::Environment);
        }

        if let Ok(arn) = env::var("AGRINDEX_STATE_MACHINE_ARN") {
            self.state_machine_arn.update(Some(arn), ConfigSource::Environment);
        }

        if let Ok(arn) = env::var("AGRINDEX_NOTIFICATION_TOPIC_ARN") {
            self.notification_topic_arn.update(Some(arn), ConfigSource::Environment);
        }

        if let Some(attempts) = parse_env::<u32>("AGRINDEX_MAX_PROBE_ATTEMPTS") {
            self.max_probe_attempts.update(attempts, ConfigSource::Environment);
        }

        if let Some(attempts) = parse_env::<u32>("AGRINDEX_MAX_START_ATTEMPTS") {
            self.max_start_attempts.update(attempts, ConfigSource::Environment);
        }

        if let Some(secs) = parse_env::<u64>("AGRINDEX_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs.update(secs, ConfigSource::Environment);
        }

        if let Some(nodata) = parse_env::<u16>("AGRINDEX_BAND_NODATA") {
            self.band_nodata.update(nodata, ConfigSource::Environment);
        }

        if let Some(nodata) = parse_env::<f32>("AGRINDEX_INDEX_NODATA") {
            self.index_nodata.update(nodata, ConfigSource::Environment);
        }

        if let Ok(strategy) = env::var("AGRINDEX_WORKING_SET") {
            match parse_working_set(&strategy) {
                Ok(strategy) => self.working_set.update(strategy, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid AGRINDEX_WORKING_SET value '{}': expected memory or disk",
                    strategy
                ),
            }
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        if let Some(url) = overrides.catalog_url {
            self.catalog_url.update(url, ConfigSource::Cli);
        }

        if let Some(bucket) = overrides.output_bucket {
            self.output_bucket.update(bucket, ConfigSource::Cli);
        }

        if let Some(arn) = overrides.state_machine_arn {
            self.state_machine_arn.update(Some(arn), ConfigSource::Cli);
        }

        if let Some(arn) = overrides.notification_topic_arn {
            self.notification_topic_arn.update(Some(arn), ConfigSource::Cli);
        }

        if let Some(attempts) = overrides.max_probe_attempts {
            self.max_probe_attempts.update(attempts, ConfigSource::Cli);
        }

        if let Some(strategy) = overrides.working_set {
            self.working_set.update(strategy, ConfigSource::Cli);
        }
    }

    /// Check cross-field constraints that no single source can guarantee
    pub fn validate(&self) -> Result<()> {
        if self.max_probe_attempts.value == 0 {
            return Err(AgrindexError::ConfigInvalid {
                key: "max_probe_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.max_start_attempts.value == 0 {
            return Err(AgrindexError::ConfigInvalid {
                key: "max_start_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.indices.value.is_empty() {
            return Err(AgrindexError::ConfigInvalid {
                key: "indices".to_string(),
                reason: "at least one index must be configured".to_string(),
            });
        }

        for index in &self.indices.value {
            if index.band_a == index.band_b {
                return Err(AgrindexError::ConfigInvalid {
                    key: format!("indices.{}", index.name),
                    reason: format!("uses band '{}' twice", index.band_a),
                });
            }
        }

        if self.collections.value.is_empty() {
            return Err(AgrindexError::ConfigInvalid {
                key: "collections".to_string(),
                reason: "at least one collection must be configured".to_string(),
            });
        }

        Ok(())
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert(
            "catalog_url".to_string(),
            (self.catalog_url.value.clone(), self.catalog_url.source),
        );
        map.insert(
            "collections".to_string(),
            (self.collections.value.join(","), self.collections.source),
        );
        map.insert(
            "lookback_days".to_string(),
            (self.lookback_days.value.to_string(), self.lookback_days.source),
        );
        map.insert(
            "result_limit".to_string(),
            (self.result_limit.value.to_string(), self.result_limit.source),
        );
        map.insert(
            "output_bucket".to_string(),
            (self.output_bucket.value.clone(), self.output_bucket.source),
        );
        map.insert(
            "state_machine_arn".to_string(),
            (
                self.state_machine_arn.value.clone().unwrap_or_else(|| "(unset)".to_string()),
                self.state_machine_arn.source,
            ),
        );
        map.insert(
            "notification_topic_arn".to_string(),
            (
                self.notification_topic_arn.value.clone().unwrap_or_else(|| "(unset)".to_string()),
                self.notification_topic_arn.source,
            ),
        );
        map.insert(
            "max_probe_attempts".to_string(),
            (self.max_probe_attempts.value.to_string(), self.max_probe_attempts.source),
        );
        map.insert(
            "max_start_attempts".to_string(),
            (self.max_start_attempts.value.to_string(), self.max_start_attempts.source),
        );
        map.insert(
            "request_timeout_secs".to_string(),
            (self.request_timeout_secs.value.to_string(), self.request_timeout_secs.source),
        );
        map.insert(
            "band_nodata".to_string(),
            (self.band_nodata.value.to_string(), self.band_nodata.source),
        );
        map.insert(
            "index_nodata".to_string(),
            (self.index_nodata.value.to_string(), self.index_nodata.source),
        );
        map.insert(
            "working_set".to_string(),
            (format!("{:?}", self.working_set.value), self.working_set.source),
        );
        map.insert(
            "indices".to_string(),
            (
                self.indices
                    .value
                    .iter()
                    .map(|i| format!("{}=({},{})", i.name, i.band_a, i.band_b))
                    .collect::<Vec<_>>()
                    .join(" "),
                self.indices.source,
            ),
        );

        map
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Invalid {} value '{}': ignoring", key, raw);
            None
        }
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    catalog_url: Option<String>,
    collections: Option<Vec<String>>,
    lookback_days: Option<u32>,
    result_limit: Option<u32>,
    output_bucket: Option<String>,
    state_machine_arn: Option<String>,
    notification_topic_arn: Option<String>,
    max_probe_attempts: Option<u32>,
    max_start_attempts: Option<u32>,
    request_timeout_secs: Option<u64>,
    band_nodata: Option<u16>,
    index_nodata: Option<f32>,
    working_set: Option<WorkingSetStrategy>,
    /// Index name to `[band_a, band_b]`
    indices: Option<std::collections::BTreeMap<String, Vec<String>>>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub catalog_url: Option<String>,
    pub output_bucket: Option<String>,
    pub state_machine_arn: Option<String>,
    pub notification_topic_arn: Option<String>,
    pub max_probe_attempts: Option<u32>,
    pub working_set: Option<WorkingSetStrategy>,
}

/// Parse working set strategy from string
pub fn parse_working_set(s: &str) -> Result<WorkingSetStrategy> {
    match s.to_lowercase().as_str() {
        "memory" | "mem" => Ok(WorkingSetStrategy::Memory),
        "disk" | "tmp" => Ok(WorkingSetStrategy::Disk),
        _ => Err(AgrindexError::ConfigInvalid {
            key: "working_set".to_string(),
            reason: format!("Invalid working set: {}. Use memory or disk", s),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = LayeredConfig::with_defaults();
        assert_eq!(config.lookback_days.value, 6);
        assert_eq!(config.result_limit.value, 1);
        assert_eq!(config.max_probe_attempts.value, 25);
        assert_eq!(config.index_nodata.value, -9999.0);
        assert_eq!(config.indices.value, IndexDefinition::defaults());
        assert_eq!(config.catalog_url.source, ConfigSource::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_precedence() {
        let mut value = ConfigValue::new(100, ConfigSource::Default);

        // File should override default
        value.update(200, ConfigSource::File);
        assert_eq!(value.value, 200);
        assert_eq!(value.source, ConfigSource::File);

        // Environment should override file
        value.update(300, ConfigSource::Environment);
        assert_eq!(value.value, 300);

        // CLI should override environment
        value.update(400, ConfigSource::Cli);
        assert_eq!(value.value, 400);
        assert_eq!(value.source, ConfigSource::Cli);

        // Lower precedence should not override
        value.update(500, ConfigSource::File);
        assert_eq!(value.value, 400);
        assert_eq!(value.source, ConfigSource::Cli);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
output_bucket = "my-indices"
max_probe_attempts = 5
working_set = "disk"

[indices]
NDWI = ["nir", "green"]
"#
        )
        .unwrap();

        let config = LayeredConfig::with_defaults().load_from_file(file.path()).unwrap();

        assert_eq!(config.output_bucket.value, "my-indices");
        assert_eq!(config.output_bucket.source, ConfigSource::File);
        assert_eq!(config.max_probe_attempts.value, 5);
        assert_eq!(config.working_set.value, WorkingSetStrategy::Disk);
        assert_eq!(config.indices.value, vec![IndexDefinition::new("NDWI", "nir", "green")]);
        assert_eq!(config.lookback_days.source, ConfigSource::Default);
    }

    #[test]
    fn test_index_with_wrong_band_count() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[indices]\nEVI = [\"blue\", \"red\", \"nir\"]").unwrap();

        let err = LayeredConfig::with_defaults().load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, AgrindexError::ConfigInvalid { ref key, .. } if key == "indices.EVI"));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = LayeredConfig::with_defaults();

        config.update_from_cli(CliConfigOverrides {
            state_machine_arn: Some("arn:aws:states:us-west-2:1:stateMachine:x".to_string()),
            max_probe_attempts: Some(3),
            ..Default::default()
        });

        assert_eq!(config.max_probe_attempts.value, 3);
        assert_eq!(config.max_probe_attempts.source, ConfigSource::Cli);
        assert!(config.state_machine_arn.value.is_some());
        assert_eq!(config.output_bucket.source, ConfigSource::Default);
    }

    #[test]
    fn test_validate_rejects_zero_probe_bound() {
        let mut config = LayeredConfig::with_defaults();
        config.max_probe_attempts.update(0, ConfigSource::Cli);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_repeated_band() {
        let mut config = LayeredConfig::with_defaults();
        config.indices.update(vec![IndexDefinition::new("BAD", "nir", "nir")], ConfigSource::File);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_working_set() {
        assert_eq!(parse_working_set("memory").unwrap(), WorkingSetStrategy::Memory);
        assert_eq!(parse_working_set("DISK").unwrap(), WorkingSetStrategy::Disk);
        assert!(parse_working_set("s3").is_err());
    }

    #[test]
    fn test_inspection_map() {
        let config = LayeredConfig::with_defaults();
        let map = config.to_inspection_map();

        assert!(map.contains_key("catalog_url"));
        assert!(map.contains_key("indices"));

        let (indices, source) = &map["indices"];
        assert_eq!(indices, "NDVI=(red,nir) NDMI=(nir08,swir16)");
        assert_eq!(*source, ConfigSource::Default);

        let (arn, _) = &map["state_machine_arn"];
        assert_eq!(arn, "(unset)");
    }
}
