//! Config file discovery and command-line overrides.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use stackwatch_domain::StackwatchConfig;

pub const CONFIG_PATH_ENV: &str = "STACKWATCH_CONFIG_PATH";

/// `STACKWATCH_CONFIG_PATH`, then `$HOME/.stackwatch/config.yaml`, then
/// `stackwatch.yaml` in the working directory.
pub fn config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }

    if let Ok(home) = env::var("HOME") {
        let candidate = Path::new(&home).join(".stackwatch").join("config.yaml");
        if candidate.exists() {
            return candidate;
        }
    }

    PathBuf::from("stackwatch.yaml")
}

/// Values given on the command line win over the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub stack: Option<String>,
    pub email: Option<String>,
    pub secondary_region: Option<String>,
    pub instance_id: Option<String>,
    pub distribution_id: Option<String>,
}

impl Overrides {
    pub fn apply(&self, config: &mut StackwatchConfig) {
        if let Some(stack) = &self.stack {
            config.stack = stack.clone();
        }
        if let Some(email) = &self.email {
            config.alerts.email = Some(email.clone());
        }
        if let Some(region) = &self.secondary_region {
            config.alerts.secondary_region = Some(region.clone());
        }
        if let Some(id) = &self.instance_id {
            config.upstream.instance_id = Some(id.clone());
        }
        if let Some(id) = &self.distribution_id {
            config.upstream.distribution_id = Some(id.clone());
        }
    }
}

pub fn load_config(path: &Path, overrides: &Overrides) -> Result<StackwatchConfig> {
    let mut config = StackwatchConfig::load_from_path(path)?;
    overrides.apply(&mut config);
    Ok(config)
}

/// Parses `85,85,-` into per-period datapoints; `-` marks a period with no
/// data.
pub fn parse_datapoints(raw: &str) -> Result<Vec<Option<f64>>> {
    let values = raw
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| match value {
            "-" => Ok(None),
            value => value
                .parse::<f64>()
                .map(Some)
                .with_context(|| format!("invalid datapoint: {value}")),
        })
        .collect::<Result<Vec<_>>>()?;
    if values.is_empty() {
        bail!("no datapoints given");
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn overrides_replace_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "project: weprint\nstack: dev\nalerts:\n  email: old@example.com\nupstream:\n  instance_id: i-file"
        )
        .unwrap();
        let overrides = Overrides {
            stack: Some("prod".into()),
            email: Some("ops@example.com".into()),
            distribution_id: Some("E2XYZ".into()),
            ..Default::default()
        };
        let config = load_config(file.path(), &overrides).unwrap();
        assert_eq!(config.stack, "prod");
        assert_eq!(config.alerts.email.as_deref(), Some("ops@example.com"));
        assert_eq!(config.upstream.instance_id.as_deref(), Some("i-file"));
        assert_eq!(config.upstream.distribution_id.as_deref(), Some("E2XYZ"));
    }

    #[test]
    fn missing_file_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let err = load_config(&path, &Overrides::default()).unwrap_err();
        assert!(format!("{err:#}").contains("absent.yaml"));
    }

    #[test]
    fn datapoints_accept_gaps() {
        assert_eq!(
            parse_datapoints("85, 85,-,10.5").unwrap(),
            vec![Some(85.0), Some(85.0), None, Some(10.5)]
        );
        assert!(parse_datapoints("85,high").is_err());
        assert!(parse_datapoints(" , ").is_err());
    }
}
