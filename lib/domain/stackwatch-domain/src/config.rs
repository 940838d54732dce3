use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::routing::RoutingPolicy;

pub const DEFAULT_HOME_REGION: &str = "eu-west-1";
pub const GLOBAL_REGION: &str = "us-east-1";
pub const PLACEHOLDER_ACCOUNT_ID: &str = "000000000000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackwatchConfig {
    pub project: String,
    pub stack: String,
    #[serde(default = "default_home_region")]
    pub home_region: String,
    #[serde(default = "default_account_id")]
    pub account_id: String,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    #[serde(default)]
    pub disk: DiskConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub topology: TopologyConfig,
}

impl StackwatchConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        Self::from_yaml_str(&raw)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn new(project: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            stack: stack.into(),
            home_region: default_home_region(),
            account_id: default_account_id(),
            alerts: AlertsConfig::default(),
            thresholds: ThresholdsConfig::default(),
            disk: DiskConfig::default(),
            upstream: UpstreamConfig::default(),
            topology: TopologyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub email: Option<String>,
    /// Region holding global edge metrics; enables the second channel.
    #[serde(default)]
    pub secondary_region: Option<String>,
    #[serde(default)]
    pub routing: RoutingPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdsConfig {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub edge_error_rate_percent: f64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            cpu_percent: 80.0,
            memory_percent: 80.0,
            disk_percent: 80.0,
            edge_error_rate_percent: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskConfig {
    pub path: String,
    pub device: String,
    pub fstype: String,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            device: "nvme0n1p1".to_string(),
            fstype: "xfs".to_string(),
        }
    }
}

/// Identifiers owned by the compute and CDN resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub distribution_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    pub instance_type: String,
    pub db_instance_class: String,
    pub ebs_size_gb: u32,
    pub storage_volume_gb: u32,
    pub key_name: Option<String>,
    /// Secret holding the database password; never a literal password.
    pub db_password_secret: Option<String>,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            instance_type: "t3.micro".to_string(),
            db_instance_class: "db.t3.micro".to_string(),
            ebs_size_gb: 20,
            storage_volume_gb: 10,
            key_name: None,
            db_password_secret: None,
        }
    }
}

fn default_home_region() -> String {
    DEFAULT_HOME_REGION.to_string()
}

fn default_account_id() -> String {
    PLACEHOLDER_ACCOUNT_ID.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn minimal_config_takes_defaults() {
        let config = StackwatchConfig::from_yaml_str("project: weprint\nstack: dev\n").unwrap();
        assert_eq!(config.home_region, "eu-west-1");
        assert_eq!(config.alerts.routing, RoutingPolicy::AlarmOnly);
        assert_eq!(config.thresholds.cpu_percent, 80.0);
        assert_eq!(config.thresholds.edge_error_rate_percent, 5.0);
        assert_eq!(config.disk.device, "nvme0n1p1");
        assert_eq!(config.topology.instance_type, "t3.micro");
        assert!(config.alerts.email.is_none());
    }

    #[test]
    fn loads_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "project: weprint
stack: prod
home_region: eu-central-1
account_id: \"123456789012\"
alerts:
  email: ops@example.com
  secondary_region: us-east-1
  routing: alarm_and_recovery
thresholds:
  cpu_percent: 90
upstream:
  instance_id: i-0abc
  distribution_id: E2XYZ
"
        )
        .unwrap();
        let config = StackwatchConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.stack, "prod");
        assert_eq!(config.alerts.routing, RoutingPolicy::AlarmAndRecovery);
        assert_eq!(config.alerts.secondary_region.as_deref(), Some("us-east-1"));
        assert_eq!(config.thresholds.cpu_percent, 90.0);
        assert_eq!(config.thresholds.memory_percent, 80.0);
        assert_eq!(config.upstream.instance_id.as_deref(), Some("i-0abc"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = StackwatchConfig::load_from_path(Path::new("/nonexistent/stackwatch.yaml"))
            .unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/stackwatch.yaml"));
    }
}
