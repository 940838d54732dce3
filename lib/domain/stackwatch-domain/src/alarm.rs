//! Threshold alarm descriptors.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOperator {
    GreaterThanOrEqualToThreshold,
    GreaterThanThreshold,
    LessThanThreshold,
    LessThanOrEqualToThreshold,
}

impl ComparisonOperator {
    pub fn breaches(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThanOrEqualToThreshold => value >= threshold,
            Self::GreaterThanThreshold => value > threshold,
            Self::LessThanThreshold => value < threshold,
            Self::LessThanOrEqualToThreshold => value <= threshold,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::GreaterThanOrEqualToThreshold => ">=",
            Self::GreaterThanThreshold => ">",
            Self::LessThanThreshold => "<",
            Self::LessThanOrEqualToThreshold => "<=",
        }
    }
}

/// How periods without datapoints are treated when evaluating an alarm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MissingDataPolicy {
    #[default]
    NotBreaching,
    Breaching,
    Ignore,
    Missing,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statistic {
    #[default]
    Average,
    Sum,
    Minimum,
    Maximum,
    SampleCount,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlarmState {
    #[default]
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ALARM")]
    Alarm,
    #[serde(rename = "INSUFFICIENT_DATA")]
    InsufficientData,
}

impl AlarmState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Alarm => "ALARM",
            Self::InsufficientData => "INSUFFICIENT_DATA",
        }
    }
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlarmState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OK" => Ok(Self::Ok),
            "ALARM" => Ok(Self::Alarm),
            "INSUFFICIENT_DATA" => Ok(Self::InsufficientData),
            other => anyhow::bail!("unknown alarm state: {other}"),
        }
    }
}

/// The fixed set of health checks declared for every stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlarmKind {
    CpuHigh,
    MemoryHigh,
    DiskHigh,
    EdgeErrorRate,
}

impl AlarmKind {
    pub const ALL: [AlarmKind; 4] = [
        AlarmKind::CpuHigh,
        AlarmKind::MemoryHigh,
        AlarmKind::DiskHigh,
        AlarmKind::EdgeErrorRate,
    ];

    /// Name suffix used after the stack prefix.
    pub fn slug(self) -> &'static str {
        match self {
            Self::CpuHigh => "cpu-high",
            Self::MemoryHigh => "mem-high",
            Self::DiskHigh => "disk-high",
            Self::EdgeErrorRate => "edge-5xx",
        }
    }
}

impl FromStr for AlarmKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.slug() == s)
            .or(match s {
                "cpu" => Some(Self::CpuHigh),
                "memory" | "mem" => Some(Self::MemoryHigh),
                "disk" => Some(Self::DiskHigh),
                "edge" => Some(Self::EdgeErrorRate),
                _ => None,
            })
            .ok_or_else(|| anyhow::anyhow!("unknown alarm kind: {s}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmDefinition {
    pub name: String,
    pub kind: AlarmKind,
    pub region: String,
    pub metric_name: String,
    pub namespace: String,
    pub statistic: Statistic,
    pub comparison: ComparisonOperator,
    pub threshold: f64,
    pub evaluation_periods: u32,
    pub period_seconds: u32,
    pub dimensions: BTreeMap<String, String>,
    #[serde(default)]
    pub missing_data: MissingDataPolicy,
    pub description: String,
}

impl AlarmDefinition {
    pub fn breaches(&self, value: f64) -> bool {
        self.comparison.breaches(value, self.threshold)
    }

    pub fn condition(&self) -> String {
        format!(
            "{} {} {} for {} x {}s",
            self.metric_name,
            self.comparison.symbol(),
            self.threshold,
            self.evaluation_periods,
            self.period_seconds
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_boundaries() {
        assert!(ComparisonOperator::GreaterThanOrEqualToThreshold.breaches(80.0, 80.0));
        assert!(!ComparisonOperator::GreaterThanThreshold.breaches(5.0, 5.0));
        assert!(ComparisonOperator::GreaterThanThreshold.breaches(6.0, 5.0));
        assert!(ComparisonOperator::LessThanThreshold.breaches(1.0, 2.0));
    }

    #[test]
    fn missing_data_defaults_to_not_breaching() {
        assert_eq!(MissingDataPolicy::default(), MissingDataPolicy::NotBreaching);
        let encoded = serde_json::to_string(&MissingDataPolicy::NotBreaching).unwrap();
        assert_eq!(encoded, "\"notBreaching\"");
    }

    #[test]
    fn alarm_state_wire_names() {
        assert_eq!(
            serde_json::to_string(&AlarmState::InsufficientData).unwrap(),
            "\"INSUFFICIENT_DATA\""
        );
        assert_eq!("ALARM".parse::<AlarmState>().unwrap(), AlarmState::Alarm);
        assert!("alarm".parse::<AlarmState>().is_err());
    }

    #[test]
    fn alarm_kind_parses_slugs_and_short_names() {
        assert_eq!("cpu-high".parse::<AlarmKind>().unwrap(), AlarmKind::CpuHigh);
        assert_eq!("edge".parse::<AlarmKind>().unwrap(), AlarmKind::EdgeErrorRate);
        assert!("network".parse::<AlarmKind>().is_err());
    }
}
