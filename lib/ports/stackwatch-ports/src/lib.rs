//! Ports between the alert planner/router and the outside world.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use stackwatch_domain::{
    AlarmDefinition, EmailSubscription, Event, NotificationChannel, PolicyDocument, RoutedMessage,
    RoutingRule,
};

/// Creates the resources of a resolved plan. Each call returns the
/// identifier the provider assigned.
#[async_trait]
pub trait ProvisionPort: Send + Sync {
    async fn create_topic(&self, channel: &NotificationChannel) -> Result<String>;
    async fn put_topic_policy(&self, topic_arn: &str, policy: &PolicyDocument) -> Result<()>;
    async fn subscribe_email(
        &self,
        topic_arn: &str,
        subscription: &EmailSubscription,
    ) -> Result<String>;
    async fn put_alarm(&self, alarm: &AlarmDefinition) -> Result<String>;
    async fn put_rule(&self, rule: &RoutingRule) -> Result<String>;
    async fn put_target(&self, rule: &RoutingRule, topic_arn: &str) -> Result<()>;
}

/// Hands rendered messages to a channel's subscribers.
#[async_trait]
pub trait DeliveryPort: Send + Sync {
    async fn deliver(&self, message: RoutedMessage) -> Result<()>;
}

pub trait LogPort: Send + Sync {
    fn drain_events(&self) -> Vec<Event>;
}

#[derive(Clone)]
pub struct PortSet {
    pub provision: Arc<dyn ProvisionPort>,
    pub delivery: Arc<dyn DeliveryPort>,
    pub logs: Arc<dyn LogPort>,
}

impl PortSet {
    pub fn empty() -> Self {
        Self {
            provision: Arc::new(NullProvisionPort),
            delivery: Arc::new(NullDeliveryPort),
            logs: Arc::new(NullLogPort),
        }
    }
}

#[derive(Clone, Default)]
struct NullProvisionPort;

#[async_trait]
impl ProvisionPort for NullProvisionPort {
    async fn create_topic(&self, channel: &NotificationChannel) -> Result<String> {
        anyhow::bail!("no provisioning backend configured for topic {}", channel.name)
    }

    async fn put_topic_policy(&self, topic_arn: &str, _policy: &PolicyDocument) -> Result<()> {
        anyhow::bail!("no provisioning backend configured for policy on {topic_arn}")
    }

    async fn subscribe_email(
        &self,
        topic_arn: &str,
        _subscription: &EmailSubscription,
    ) -> Result<String> {
        anyhow::bail!("no provisioning backend configured for subscription on {topic_arn}")
    }

    async fn put_alarm(&self, alarm: &AlarmDefinition) -> Result<String> {
        anyhow::bail!("no provisioning backend configured for alarm {}", alarm.name)
    }

    async fn put_rule(&self, rule: &RoutingRule) -> Result<String> {
        anyhow::bail!("no provisioning backend configured for rule {}", rule.name)
    }

    async fn put_target(&self, rule: &RoutingRule, _topic_arn: &str) -> Result<()> {
        anyhow::bail!("no provisioning backend configured for target of {}", rule.name)
    }
}

#[derive(Clone, Default)]
struct NullDeliveryPort;

#[async_trait]
impl DeliveryPort for NullDeliveryPort {
    async fn deliver(&self, _message: RoutedMessage) -> Result<()> {
        Ok(())
    }
}

/// Shared between adapters and the runtime; adapters push, the runtime
/// drains into its event bus.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLogPort {
    events: Arc<Mutex<VecDeque<Event>>>,
}

impl InMemoryLogPort {
    pub fn push(&self, event: Event) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push_back(event);
        }
    }
}

impl LogPort for InMemoryLogPort {
    fn drain_events(&self) -> Vec<Event> {
        if let Ok(mut guard) = self.events.lock() {
            guard.drain(..).collect()
        } else {
            Vec::new()
        }
    }
}

#[derive(Clone, Default)]
struct NullLogPort;

impl LogPort for NullLogPort {
    fn drain_events(&self) -> Vec<Event> {
        Vec::new()
    }
}
