//! Source configuration loading.
//!
//! Loads one YAML file per upstream feed from config/sources/

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use gauge_common::{parse_interval, EntityQuery, StreamLayout};

/// Root configuration loaded from a source YAML file.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub source: SourceInfo,
    /// Which store entities belong to this source
    pub entities: EntityQuery,
    pub observations: ObservationsConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Sensor registration settings (USGS only)
    #[serde(default)]
    pub sensors: Option<SensorsConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Usgs,
    Sfwmd,
}

/// Basic source identification.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceInfo {
    pub id: String,
    pub kind: SourceKind,
    /// Observation endpoint including fixed query parameters
    pub base_url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservationsConfig {
    /// ISO-8601 duration; the sync window is [now - interval, now]
    pub interval: String,
    #[serde(default)]
    pub layout: StreamLayout,
    #[serde(default)]
    pub data_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Entities synced at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_poll_interval() -> u64 {
    900
}

fn default_concurrency() -> usize {
    4
}

/// USGS site listing used to register new sensors.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorsConfig {
    pub county_code: String,
    pub parameter_code: String,
    #[serde(default = "default_site_status")]
    pub site_status: String,
    /// Class stored on registered sensors and used to find existing ones
    pub sensor_class: String,
    /// Catalog endpoint; defaults to the source's `base_url`
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_site_status() -> String {
    "all".to_string()
}

impl SourceConfig {
    /// Load and validate a source configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: SourceConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        debug!(source = %config.source.id, path = %path.display(), "Loaded source config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.interval()?;

        if self.schedule.concurrency == 0 {
            bail!("schedule.concurrency must be at least 1");
        }
        if self.schedule.poll_interval_secs == 0 {
            bail!("schedule.poll_interval_secs must be positive");
        }
        if self.sensors.is_some() && self.source.kind != SourceKind::Usgs {
            bail!("sensors block is only supported for usgs sources");
        }
        if self.source.kind == SourceKind::Sfwmd && self.observations.layout == StreamLayout::Paired {
            bail!("sfwmd sources only support the flat layout");
        }

        Ok(())
    }

    /// Length of the trailing sync window.
    pub fn interval(&self) -> Result<chrono::Duration> {
        Ok(parse_interval(&self.observations.interval)?)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.poll_interval_secs)
    }
}

/// Load all enabled source configurations from a directory.
///
/// Unreadable, invalid and duplicate-id files are logged and skipped.
pub fn load_source_configs(config_dir: &Path) -> Result<Vec<SourceConfig>> {
    let sources_dir = config_dir.join("sources");

    if !sources_dir.exists() {
        warn!(path = %sources_dir.display(), "Sources config directory not found");
        return Ok(Vec::new());
    }

    let mut paths: Vec<_> = std::fs::read_dir(&sources_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().map_or(false, |ext| ext == "yaml" || ext == "yml"))
        .collect();
    paths.sort();

    let mut seen = HashSet::new();
    let mut configs = Vec::new();

    for path in paths {
        match SourceConfig::load(&path) {
            Ok(config) => {
                if !config.source.enabled {
                    debug!(source = %config.source.id, "Skipping disabled source");
                } else if !seen.insert(config.source.id.clone()) {
                    warn!(source = %config.source.id, path = %path.display(), "Duplicate source id, skipping");
                } else {
                    info!(
                        source = %config.source.id,
                        kind = ?config.source.kind,
                        interval = %config.observations.interval,
                        "Loaded source configuration"
                    );
                    configs.push(config);
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{e:#}"), "Failed to load source config");
            }
        }
    }

    info!(count = configs.len(), "Loaded source configurations");
    Ok(configs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauge_common::EntityFilter;

    const USGS_YAML: &str = r#"
source:
  id: usgs-gauges
  kind: usgs
  base_url: "https://waterservices.usgs.gov/nwis/iv/?format=json&parameterCd=00065"

entities:
  uid_property: uid
  filter:
    type: property_equals
    property: class
    value: "00065"

observations:
  interval: PT6H
  layout: paired

schedule:
  poll_interval_secs: 600

sensors:
  county_code: "12011"
  parameter_code: "00065"
  sensor_class: "00065"
"#;

    const SFWMD_YAML: &str = r#"
source:
  id: sfwmd-aggregate
  kind: sfwmd
  base_url: "https://apps.sfwmd.gov/api/aggregate?format=json"

entities:
  uid_property: stationId
  filter:
    type: has_property
    property: stationId

observations:
  interval: P1D
  data_type: aggregate
"#;

    fn write(dir: &Path, name: &str, content: &str) {
        let sources = dir.join("sources");
        std::fs::create_dir_all(&sources).unwrap();
        std::fs::write(sources.join(name), content).unwrap();
    }

    #[test]
    fn test_parse_usgs_config() {
        let config: SourceConfig = serde_yaml::from_str(USGS_YAML).unwrap();
        config.validate().unwrap();

        assert_eq!(config.source.kind, SourceKind::Usgs);
        assert!(config.source.enabled);
        assert_eq!(config.observations.layout, StreamLayout::Paired);
        assert_eq!(config.interval().unwrap(), chrono::Duration::hours(6));
        assert_eq!(config.schedule.poll_interval_secs, 600);
        assert_eq!(config.schedule.concurrency, 4);
        assert_eq!(
            config.entities.filter,
            Some(EntityFilter::PropertyEquals {
                property: "class".into(),
                value: "00065".into()
            })
        );

        let sensors = config.sensors.unwrap();
        assert_eq!(sensors.site_status, "all");
        assert!(sensors.base_url.is_none());
    }

    #[test]
    fn test_parse_sfwmd_defaults() {
        let config: SourceConfig = serde_yaml::from_str(SFWMD_YAML).unwrap();
        config.validate().unwrap();

        assert_eq!(config.observations.layout, StreamLayout::Flat);
        assert_eq!(config.observations.data_type.as_deref(), Some("aggregate"));
        assert_eq!(config.poll_interval(), Duration::from_secs(900));
        assert!(config.sensors.is_none());
    }

    #[test]
    fn test_validation_rejects_bad_configs() {
        let bad_interval = USGS_YAML.replace("PT6H", "P1M");
        let config: SourceConfig = serde_yaml::from_str(&bad_interval).unwrap();
        assert!(config.validate().is_err());

        let zero_concurrency = SFWMD_YAML.to_string() + "schedule:\n  concurrency: 0\n";
        let config: SourceConfig = serde_yaml::from_str(&zero_concurrency).unwrap();
        assert!(config.validate().is_err());

        let sfwmd_sensors = SFWMD_YAML.to_string()
            + "sensors:\n  county_code: \"12011\"\n  parameter_code: \"00065\"\n  sensor_class: x\n";
        let config: SourceConfig = serde_yaml::from_str(&sfwmd_sensors).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_source_configs_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "usgs.yaml", USGS_YAML);
        write(dir.path(), "sfwmd.yml", SFWMD_YAML);
        write(dir.path(), "broken.yaml", "source: [not, a, map]");
        write(dir.path(), "disabled.yaml", &USGS_YAML.replace("kind: usgs", "kind: usgs\n  enabled: false"));
        write(dir.path(), "notes.txt", "ignored");

        let configs = load_source_configs(dir.path()).unwrap();
        let ids: Vec<_> = configs.iter().map(|c| c.source.id.as_str()).collect();
        assert_eq!(ids, vec!["sfwmd-aggregate", "usgs-gauges"]);
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.yaml", USGS_YAML);
        write(dir.path(), "b.yaml", &USGS_YAML.replace("PT6H", "PT1H"));

        let configs = load_source_configs(dir.path()).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].observations.interval, "PT6H");
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_source_configs(dir.path()).unwrap().is_empty());
    }
}
