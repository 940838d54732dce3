//! Dry-run provisioning: records every resource a plan would create into a
//! manifest instead of calling a cloud provider.

use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use stackwatch_domain::{
    AlarmDefinition, EmailSubscription, Event, EventLevel, NotificationChannel, PolicyDocument,
    RoutingRule, is_valid_email,
};
use stackwatch_ports::{InMemoryLogPort, ProvisionPort};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestEntry {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    pub region: String,
    pub arn: String,
    pub properties: Value,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingProvider {
    account_id: String,
    entries: Arc<Mutex<Vec<ManifestEntry>>>,
    log: Option<InMemoryLogPort>,
}

impl RecordingProvider {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            entries: Arc::default(),
            log: None,
        }
    }

    /// Reports every recorded resource to `log`.
    pub fn with_log(mut self, log: InMemoryLogPort) -> Self {
        self.log = Some(log);
        self
    }

    pub fn manifest(&self) -> Vec<ManifestEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn manifest_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.manifest())?)
    }

    fn record(
        &self,
        resource_type: &str,
        name: &str,
        region: &str,
        arn: String,
        properties: Value,
    ) -> Result<String> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("manifest lock poisoned"))?;
        // Re-applying the same descriptor replaces it rather than duplicating.
        entries.retain(|entry| !(entry.resource_type == resource_type && entry.name == name));
        entries.push(ManifestEntry {
            resource_type: resource_type.to_string(),
            name: name.to_string(),
            region: region.to_string(),
            arn: arn.clone(),
            properties,
        });
        debug!(resource_type, name, region, "Recorded resource");
        if let Some(log) = &self.log {
            log.push(Event::new(
                EventLevel::Info,
                format!("Recorded {resource_type} {name} in {region}"),
            ));
        }
        Ok(arn)
    }

    fn region_of(&self, arn: &str) -> Option<String> {
        self.manifest()
            .into_iter()
            .find(|entry| entry.arn == arn)
            .map(|entry| entry.region)
    }
}

#[async_trait]
impl ProvisionPort for RecordingProvider {
    async fn create_topic(&self, channel: &NotificationChannel) -> Result<String> {
        let arn = format!(
            "arn:aws:sns:{}:{}:{}",
            channel.region, self.account_id, channel.name
        );
        self.record(
            "aws:sns:Topic",
            &channel.name,
            &channel.region,
            arn,
            json!({ "displayName": channel.display_name }),
        )
    }

    async fn put_topic_policy(&self, topic_arn: &str, policy: &PolicyDocument) -> Result<()> {
        let region = self
            .region_of(topic_arn)
            .ok_or_else(|| anyhow!("topic {topic_arn} does not exist"))?;
        self.record(
            "aws:sns:TopicPolicy",
            topic_arn,
            &region,
            topic_arn.to_string(),
            json!({ "policy": policy.to_json()? }),
        )?;
        Ok(())
    }

    async fn subscribe_email(
        &self,
        topic_arn: &str,
        subscription: &EmailSubscription,
    ) -> Result<String> {
        if !is_valid_email(&subscription.endpoint) {
            bail!("Invalid parameter: Email address {}", subscription.endpoint);
        }
        let region = self
            .region_of(topic_arn)
            .ok_or_else(|| anyhow!("topic {topic_arn} does not exist"))?;
        self.record(
            "aws:sns:TopicSubscription",
            &subscription.name,
            &region,
            format!("{topic_arn}:{}", subscription.name),
            json!({
                "topic": topic_arn,
                "protocol": subscription.protocol,
                "endpoint": subscription.endpoint,
            }),
        )
    }

    async fn put_alarm(&self, alarm: &AlarmDefinition) -> Result<String> {
        let arn = format!(
            "arn:aws:cloudwatch:{}:{}:alarm:{}",
            alarm.region, self.account_id, alarm.name
        );
        self.record(
            "aws:cloudwatch:MetricAlarm",
            &alarm.name,
            &alarm.region,
            arn,
            serde_json::to_value(alarm)?,
        )
    }

    async fn put_rule(&self, rule: &RoutingRule) -> Result<String> {
        let arn = format!(
            "arn:aws:events:{}:{}:rule/{}",
            rule.region, self.account_id, rule.name
        );
        self.record(
            "aws:cloudwatch:EventRule",
            &rule.name,
            &rule.region,
            arn,
            json!({ "eventPattern": rule.pattern.to_document() }),
        )
    }

    async fn put_target(&self, rule: &RoutingRule, topic_arn: &str) -> Result<()> {
        let topic_region = self
            .region_of(topic_arn)
            .ok_or_else(|| anyhow!("topic {topic_arn} does not exist"))?;
        if topic_region != rule.region {
            bail!(
                "rule {} in {} cannot target topic in {}",
                rule.name,
                rule.region,
                topic_region
            );
        }
        self.record(
            "aws:cloudwatch:EventTarget",
            &rule.name,
            &rule.region,
            topic_arn.to_string(),
            json!({
                "rule": rule.name,
                "inputTransformer": {
                    "inputPaths": rule.template.input_paths,
                    "subject": rule.template.subject,
                    "body": rule.template.body,
                },
            }),
        )?;
        Ok(())
    }
}
