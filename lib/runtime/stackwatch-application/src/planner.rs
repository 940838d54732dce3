//! Resolves configuration into a fully-determined alert plan.
//!
//! Every optional input (email, secondary region, routing policy) is
//! decided here, once. Provisioning and routing only ever see the result.

use serde::Serialize;
use tracing::warn;

use stackwatch_domain::config::GLOBAL_REGION;
use stackwatch_domain::{
    AlarmDefinition, AlarmKind, ChannelSet, ConfigError, Namer, ProjectName, RoutingPolicy,
    RoutingRule, StackId, StackwatchConfig, ThresholdsConfig, is_valid_email,
};

use crate::alarm_set::{AlarmTargets, declare_alarms};
use crate::rules::declare_rules;
use crate::topics::declare_channels;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertPlan {
    pub project: ProjectName,
    pub stack: StackId,
    pub alarm_prefix: String,
    pub account_id: String,
    pub home_region: String,
    pub routing: RoutingPolicy,
    pub channels: ChannelSet,
    pub alarms: Vec<AlarmDefinition>,
    pub rules: Vec<RoutingRule>,
    /// Alarms declared in a region that owns no channel.
    pub unrouted_alarms: Vec<String>,
}

impl AlertPlan {
    pub fn resolve(config: &StackwatchConfig) -> Result<Self, ConfigError> {
        let namer = Namer::new(
            ProjectName::parse(&config.project)?,
            StackId::parse(&config.stack)?,
        );

        let home_region = non_empty(Some(config.home_region.as_str()))
            .ok_or(ConfigError::MissingRegion("home_region"))?;
        let secondary_region = non_empty(config.alerts.secondary_region.as_deref());
        if secondary_region == Some(home_region) {
            return Err(ConfigError::DuplicateRegion(home_region.to_string()));
        }
        if let Some(region) = secondary_region.filter(|region| *region != GLOBAL_REGION) {
            return Err(ConfigError::UnsupportedSecondaryRegion(region.to_string()));
        }
        validate_account(&config.account_id)?;

        let email = non_empty(config.alerts.email.as_deref());
        if let Some(email) = email {
            if !is_valid_email(email) {
                return Err(ConfigError::InvalidEmail(email.to_string()));
            }
        }

        validate_thresholds(&config.thresholds)?;

        let instance_id = non_empty(config.upstream.instance_id.as_deref())
            .ok_or(ConfigError::MissingUpstream("instance"))?;
        let distribution_id = non_empty(config.upstream.distribution_id.as_deref())
            .ok_or(ConfigError::MissingUpstream("distribution"))?;

        let channels = declare_channels(
            &namer,
            &config.account_id,
            home_region,
            secondary_region,
            email,
        );
        let alarms = declare_alarms(
            &namer,
            &config.thresholds,
            &config.disk,
            AlarmTargets {
                instance_id,
                distribution_id,
                home_region,
                edge_region: GLOBAL_REGION,
            },
        );

        let routing = config.alerts.routing;
        if routing == RoutingPolicy::AlarmAndRecovery {
            warn!(
                stack = %namer.stack(),
                "Recovery transitions will be routed; ALARM-only is the default policy"
            );
        }
        let rules = declare_rules(&namer, &channels, routing);

        let unrouted_alarms: Vec<String> = alarms
            .iter()
            .filter(|alarm| channels.for_region(&alarm.region).is_none())
            .map(|alarm| alarm.name.clone())
            .collect();
        for name in &unrouted_alarms {
            warn!(alarm = %name, "Alarm region has no notification channel; it will not be routed");
        }

        Ok(Self {
            alarm_prefix: namer.prefix(),
            project: namer.project().clone(),
            stack: namer.stack().clone(),
            account_id: config.account_id.clone(),
            home_region: home_region.to_string(),
            routing,
            channels,
            alarms,
            rules,
            unrouted_alarms,
        })
    }

    pub fn alarm(&self, name: &str) -> Option<&AlarmDefinition> {
        self.alarms.iter().find(|alarm| alarm.name == name)
    }

    pub fn alarm_by_kind(&self, kind: AlarmKind) -> Option<&AlarmDefinition> {
        self.alarms.iter().find(|alarm| alarm.kind == kind)
    }

    /// Every name this plan generates, in declaration order.
    pub fn resource_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for channel in self.channels.iter() {
            names.push(channel.name.clone());
            names.push(channel.policy_name.clone());
            if let Some(subscription) = &channel.subscription {
                names.push(subscription.name.clone());
            }
        }
        names.extend(self.alarms.iter().map(|alarm| alarm.name.clone()));
        names.extend(self.rules.iter().map(|rule| rule.name.clone()));
        names
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn validate_account(account_id: &str) -> Result<(), ConfigError> {
    if account_id.len() == 12 && account_id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ConfigError::InvalidAccount(account_id.to_string()))
    }
}

fn validate_thresholds(thresholds: &ThresholdsConfig) -> Result<(), ConfigError> {
    let checks = [
        ("cpu_percent", thresholds.cpu_percent),
        ("memory_percent", thresholds.memory_percent),
        ("disk_percent", thresholds.disk_percent),
        ("edge_error_rate_percent", thresholds.edge_error_rate_percent),
    ];
    for (name, value) in checks {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::InvalidThreshold { name, value });
        }
    }
    Ok(())
}
