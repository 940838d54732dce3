//! Applies a resolved plan through a [`ProvisionPort`].
//!
//! Order: topic, topic policy, subscription (per channel); alarms; rule,
//! rule target. Failures stop the run and are returned as-is. Nothing is
//! retried: provider rejections (a bad email address, say) need an operator.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::info;

use stackwatch_domain::NotificationChannel;
use stackwatch_ports::ProvisionPort;

use crate::planner::AlertPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Topic,
    TopicPolicy,
    EmailSubscription,
    Alarm,
    Rule,
    RuleTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionedResource {
    pub kind: ResourceKind,
    pub name: String,
    pub region: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisioningReport {
    pub resources: Vec<ProvisionedResource>,
    pub channels: Vec<NotificationChannel>,
}

impl ProvisioningReport {
    pub fn channel(&self, name: &str) -> Option<&NotificationChannel> {
        self.channels.iter().find(|channel| channel.name == name)
    }

    pub fn id_of(&self, kind: ResourceKind, name: &str) -> Option<&str> {
        self.resources
            .iter()
            .find(|resource| resource.kind == kind && resource.name == name)
            .map(|resource| resource.id.as_str())
    }

    fn record(&mut self, kind: ResourceKind, name: &str, region: &str, id: impl Into<String>) {
        self.resources.push(ProvisionedResource {
            kind,
            name: name.to_string(),
            region: region.to_string(),
            id: id.into(),
        });
    }
}

#[derive(Clone)]
pub struct Provisioner {
    port: Arc<dyn ProvisionPort>,
}

impl Provisioner {
    pub fn new(port: Arc<dyn ProvisionPort>) -> Self {
        Self { port }
    }

    pub async fn apply(&self, plan: &AlertPlan) -> Result<ProvisioningReport> {
        let mut report = ProvisioningReport::default();

        for channel in plan.channels.iter() {
            let arn = self
                .port
                .create_topic(channel)
                .await
                .with_context(|| format!("failed to create topic {}", channel.name))?;
            report.record(ResourceKind::Topic, &channel.name, &channel.region, &arn);
            let channel = channel.with_arn(arn.clone());

            self.port
                .put_topic_policy(&arn, &channel.publish_policy())
                .await
                .with_context(|| format!("failed to attach publish policy to {}", channel.name))?;
            report.record(
                ResourceKind::TopicPolicy,
                &channel.policy_name,
                &channel.region,
                &arn,
            );

            if let Some(subscription) = &channel.subscription {
                let id = self
                    .port
                    .subscribe_email(&arn, subscription)
                    .await
                    .with_context(|| {
                        format!(
                            "email subscription {} was rejected; correct the address and re-apply",
                            subscription.name
                        )
                    })?;
                report.record(
                    ResourceKind::EmailSubscription,
                    &subscription.name,
                    &channel.region,
                    id,
                );
            }
            info!(topic = %channel.name, region = %channel.region, "Notification channel ready");
            report.channels.push(channel);
        }

        for alarm in &plan.alarms {
            let id = self
                .port
                .put_alarm(alarm)
                .await
                .with_context(|| format!("failed to put alarm {}", alarm.name))?;
            report.record(ResourceKind::Alarm, &alarm.name, &alarm.region, id);
        }

        for rule in &plan.rules {
            let Some(channel) = report.channel(&rule.target_channel).cloned() else {
                bail!(
                    "rule {} targets unknown channel {}",
                    rule.name,
                    rule.target_channel
                );
            };
            if channel.region != rule.region {
                bail!(
                    "rule {} in {} cannot deliver to channel {} in {}",
                    rule.name,
                    rule.region,
                    channel.name,
                    channel.region
                );
            }
            let id = self
                .port
                .put_rule(rule)
                .await
                .with_context(|| format!("failed to put rule {}", rule.name))?;
            report.record(ResourceKind::Rule, &rule.name, &rule.region, id);

            let topic_arn = channel.topic_arn();
            self.port
                .put_target(rule, &topic_arn)
                .await
                .with_context(|| format!("failed to attach {} to rule {}", topic_arn, rule.name))?;
            report.record(ResourceKind::RuleTarget, &rule.name, &rule.region, topic_arn);
            info!(rule = %rule.name, region = %rule.region, "Routing rule ready");
        }

        Ok(report)
    }
}
