//! Plain-text and structured rendering of plans, messages and topology.

use std::fmt::Write as _;
use std::str::FromStr;

use anyhow::{Result, bail};
use serde::Serialize;

use stackwatch_application::{AlertPlan, ProvisioningReport};
use stackwatch_domain::{ChannelSet, RoutedMessage, StackTopology};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => bail!("unknown output format: {other}"),
        }
    }
}

fn structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<Option<String>> {
    Ok(match format {
        OutputFormat::Text => None,
        OutputFormat::Json => Some(serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => Some(serde_yaml::to_string(value)?),
    })
}

pub fn render_plan(plan: &AlertPlan, format: OutputFormat) -> Result<String> {
    if let Some(out) = structured(plan, format)? {
        return Ok(out);
    }

    let mut out = String::new();
    writeln!(out, "Stack {}-{} (home {})", plan.project, plan.stack, plan.home_region)?;
    let mode = match plan.channels {
        ChannelSet::Single { .. } => "single",
        ChannelSet::Dual { .. } => "dual",
    };
    writeln!(out, "\nChannels ({mode}):")?;
    for channel in plan.channels.iter() {
        let subscriber = channel
            .subscription
            .as_ref()
            .map(|s| s.endpoint.as_str())
            .unwrap_or("no subscriber");
        writeln!(out, "  {} [{}] -> {}", channel.name, channel.region, subscriber)?;
    }
    writeln!(out, "\nAlarms:")?;
    for alarm in &plan.alarms {
        writeln!(out, "  {} [{}] {}", alarm.name, alarm.region, alarm.condition())?;
    }
    writeln!(out, "\nRules:")?;
    for rule in &plan.rules {
        let states: Vec<_> = rule.pattern.states.iter().map(|s| s.as_str()).collect();
        writeln!(
            out,
            "  {} [{}] {} -> {}",
            rule.name,
            rule.region,
            states.join("|"),
            rule.target_channel
        )?;
    }
    if !plan.unrouted_alarms.is_empty() {
        writeln!(out, "\nUnrouted: {}", plan.unrouted_alarms.join(", "))?;
    }
    Ok(out)
}

pub fn render_report(report: &ProvisioningReport, format: OutputFormat) -> Result<String> {
    if let Some(out) = structured(report, format)? {
        return Ok(out);
    }
    let mut out = String::new();
    for resource in &report.resources {
        let kind = serde_json::to_value(resource.kind)?;
        writeln!(
            out,
            "{:<20} {:<40} {:<10} {}",
            kind.as_str().unwrap_or_default(),
            resource.name,
            resource.region,
            resource.id
        )?;
    }
    Ok(out)
}

pub fn render_messages(messages: &[RoutedMessage]) -> String {
    if messages.is_empty() {
        return "No messages routed.\n".to_string();
    }
    let mut out = String::new();
    for message in messages {
        let _ = writeln!(out, "To: {} ({})", message.channel, message.region);
        let _ = writeln!(out, "Subject: {}", message.subject);
        let _ = writeln!(out, "\n{}", message.body);
    }
    out
}

pub fn render_topology(topology: &StackTopology, format: OutputFormat) -> Result<String> {
    if let Some(out) = structured(topology, format)? {
        return Ok(out);
    }
    let mut out = String::new();
    writeln!(out, "VPC {} {}", topology.network.vpc.name, topology.network.vpc.cidr_block)?;
    for subnet in &topology.network.subnets {
        let scope = if subnet.public { "public" } else { "private" };
        writeln!(
            out,
            "  subnet {} {} {} {scope}",
            subnet.name, subnet.cidr_block, subnet.availability_zone
        )?;
    }
    writeln!(
        out,
        "Backend {} ({}), data volume {} {}GB attached as {}",
        topology.backend.name,
        topology.backend.instance_type,
        topology.backend.data_volume.name,
        topology.backend.data_volume.size_gb,
        topology.backend.volume_attachment.device_name
    )?;
    writeln!(
        out,
        "Database {} {} {} ({})",
        topology.database.name,
        topology.database.engine,
        topology.database.engine_version,
        topology.database.instance_class
    )?;
    writeln!(
        out,
        "Frontend {} via {}",
        topology.frontend.bucket, topology.frontend.distribution
    )?;
    for pattern in topology
        .frontend
        .ordered_behaviors
        .iter()
        .filter_map(|behavior| behavior.path_pattern.as_deref())
    {
        writeln!(out, "  {pattern}")?;
    }
    writeln!(out, "Outputs")?;
    for output in &topology.outputs {
        writeln!(out, "  {} = {}.{}", output.key, output.resource, output.attribute)?;
    }
    Ok(out)
}
