use std::collections::BTreeMap;

use stackwatch_domain::{
    AlarmDefinition, AlarmKind, ComparisonOperator, DiskConfig, MissingDataPolicy, Namer,
    Statistic, ThresholdsConfig,
};

const PERIOD_SECONDS: u32 = 300;

/// Where the alarms live and which resources their dimensions point at.
#[derive(Debug, Clone, Copy)]
pub struct AlarmTargets<'a> {
    pub instance_id: &'a str,
    pub distribution_id: &'a str,
    pub home_region: &'a str,
    /// Edge metrics are only published in the global region.
    pub edge_region: &'a str,
}

pub fn declare_alarms(
    namer: &Namer,
    thresholds: &ThresholdsConfig,
    disk: &DiskConfig,
    targets: AlarmTargets<'_>,
) -> Vec<AlarmDefinition> {
    AlarmKind::ALL
        .into_iter()
        .map(|kind| declare_alarm(namer, kind, thresholds, disk, targets))
        .collect()
}

fn declare_alarm(
    namer: &Namer,
    kind: AlarmKind,
    thresholds: &ThresholdsConfig,
    disk: &DiskConfig,
    targets: AlarmTargets<'_>,
) -> AlarmDefinition {
    let instance = || BTreeMap::from([("InstanceId".to_string(), targets.instance_id.to_string())]);
    let sustained = |metric: &str, namespace: &str, threshold: f64, what: &str| {
        (
            metric.to_string(),
            namespace.to_string(),
            ComparisonOperator::GreaterThanOrEqualToThreshold,
            threshold,
            2,
            format!("{what} at or above {threshold}% for 10 minutes"),
        )
    };

    let (metric_name, namespace, comparison, threshold, evaluation_periods, description) =
        match kind {
            AlarmKind::CpuHigh => {
                sustained("CPUUtilization", "AWS/EC2", thresholds.cpu_percent, "CPU")
            }
            AlarmKind::MemoryHigh => sustained(
                "mem_used_percent",
                "CWAgent",
                thresholds.memory_percent,
                "Memory",
            ),
            AlarmKind::DiskHigh => sustained(
                "disk_used_percent",
                "CWAgent",
                thresholds.disk_percent,
                "Disk",
            ),
            AlarmKind::EdgeErrorRate => (
                "TotalErrorRate".to_string(),
                "AWS/CloudFront".to_string(),
                ComparisonOperator::GreaterThanThreshold,
                thresholds.edge_error_rate_percent,
                1,
                format!(
                    "Edge error rate above {}% (frontend or backend downtime)",
                    thresholds.edge_error_rate_percent
                ),
            ),
        };

    let (region, dimensions) = match kind {
        AlarmKind::CpuHigh | AlarmKind::MemoryHigh => (targets.home_region, instance()),
        AlarmKind::DiskHigh => {
            let mut dimensions = instance();
            dimensions.insert("path".to_string(), disk.path.clone());
            dimensions.insert("device".to_string(), disk.device.clone());
            dimensions.insert("fstype".to_string(), disk.fstype.clone());
            (targets.home_region, dimensions)
        }
        AlarmKind::EdgeErrorRate => (
            targets.edge_region,
            BTreeMap::from([
                (
                    "DistributionId".to_string(),
                    targets.distribution_id.to_string(),
                ),
                ("Region".to_string(), "Global".to_string()),
            ]),
        ),
    };

    AlarmDefinition {
        name: namer.name(kind.slug()),
        kind,
        region: region.to_string(),
        metric_name,
        namespace,
        statistic: Statistic::Average,
        comparison,
        threshold,
        evaluation_periods,
        period_seconds: PERIOD_SECONDS,
        dimensions,
        missing_data: MissingDataPolicy::NotBreaching,
        description,
    }
}
