//! In-process notification channels. Messages handed to a channel land in
//! its outbox, one entry per subscriber.

use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use stackwatch_domain::{ChannelSet, Event, EventLevel, NotificationChannel, RoutedMessage};
use stackwatch_ports::{DeliveryPort, InMemoryLogPort};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    pub channel: String,
    /// `None` when the channel had no subscriber; the message is kept but
    /// reaches nobody.
    pub recipient: Option<String>,
    pub subject: String,
    pub body: String,
    pub delivered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NotificationService {
    channels: Arc<RwLock<Vec<NotificationChannel>>>,
    outbox: Arc<RwLock<Vec<Delivery>>>,
    log: Option<InMemoryLogPort>,
}

impl NotificationService {
    pub fn new(channels: Vec<NotificationChannel>) -> Self {
        Self {
            channels: Arc::new(RwLock::new(channels)),
            outbox: Arc::default(),
            log: None,
        }
    }

    /// Reports deliveries that reach nobody to `log`.
    pub fn with_log(mut self, log: InMemoryLogPort) -> Self {
        self.log = Some(log);
        self
    }

    pub fn from_channels(channels: &ChannelSet) -> Self {
        Self::new(channels.iter().cloned().collect())
    }

    pub async fn channels(&self) -> Vec<NotificationChannel> {
        self.channels.read().await.clone()
    }

    /// Replaces a channel with the same name or adds it.
    pub async fn configure_channel(&self, channel: NotificationChannel) {
        let mut channels = self.channels.write().await;
        if let Some(existing) = channels
            .iter_mut()
            .find(|existing| existing.name == channel.name)
        {
            *existing = channel;
        } else {
            channels.push(channel);
        }
    }

    pub async fn delivered(&self) -> Vec<Delivery> {
        self.outbox.read().await.clone()
    }

    pub async fn delivered_to(&self, channel: &str) -> Vec<Delivery> {
        self.outbox
            .read()
            .await
            .iter()
            .filter(|delivery| delivery.channel == channel)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DeliveryPort for NotificationService {
    async fn deliver(&self, message: RoutedMessage) -> Result<()> {
        let channel = {
            let channels = self.channels.read().await;
            channels
                .iter()
                .find(|channel| channel.name == message.channel)
                .cloned()
                .ok_or_else(|| anyhow!("Unknown channel: {}", message.channel))?
        };
        if channel.region != message.region {
            bail!(
                "channel {} lives in {}, message was routed in {}",
                channel.name,
                channel.region,
                message.region
            );
        }

        let recipient = channel
            .subscription
            .as_ref()
            .map(|subscription| subscription.endpoint.clone());
        match &recipient {
            Some(endpoint) => info!(
                channel = %channel.name,
                alarm = %message.alarm_name,
                "Delivering to {endpoint}"
            ),
            None => {
                warn!(
                    channel = %channel.name,
                    alarm = %message.alarm_name,
                    "Channel has no subscriber; message reaches nobody"
                );
                if let Some(log) = &self.log {
                    log.push(Event::new(
                        EventLevel::Warn,
                        format!(
                            "Channel {} has no subscriber; {} reached nobody",
                            channel.name, message.alarm_name
                        ),
                    ));
                }
            }
        }

        // Duplicate events are recorded again; the channel does not dedupe.
        self.outbox.write().await.push(Delivery {
            channel: channel.name,
            recipient,
            subject: message.subject,
            body: message.body,
            delivered_at: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackwatch_domain::EmailSubscription;

    fn channel(name: &str, region: &str, email: Option<&str>) -> NotificationChannel {
        NotificationChannel {
            name: name.to_string(),
            region: region.to_string(),
            display_name: "Critical Alerts".to_string(),
            account_id: "123456789012".to_string(),
            subscription: email.map(|email| EmailSubscription::new(format!("{name}-email"), email)),
            policy_name: format!("{name}-policy"),
            arn: None,
        }
    }

    fn message(channel: &str, region: &str) -> RoutedMessage {
        RoutedMessage {
            rule: "weprint-dev-alarm-route".to_string(),
            channel: channel.to_string(),
            region: region.to_string(),
            alarm_name: "weprint-dev-cpu-high".to_string(),
            subject: "CRITICAL ALERT: weprint-dev-cpu-high".to_string(),
            body: "CRITICAL ALERT\nAlarm: weprint-dev-cpu-high\n".to_string(),
        }
    }

    #[tokio::test]
    async fn delivers_to_the_subscriber() {
        let service = NotificationService::new(vec![channel(
            "weprint-dev-alerts",
            "eu-west-1",
            Some("ops@example.com"),
        )]);
        service
            .deliver(message("weprint-dev-alerts", "eu-west-1"))
            .await
            .unwrap();
        let delivered = service.delivered_to("weprint-dev-alerts").await;
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].recipient.as_deref(), Some("ops@example.com"));
        assert!(delivered[0].subject.starts_with("CRITICAL ALERT"));
    }

    #[tokio::test]
    async fn unknown_channel_is_an_error() {
        let service = NotificationService::default();
        let err = service
            .deliver(message("weprint-dev-alerts", "eu-west-1"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown channel"));
    }

    #[tokio::test]
    async fn cross_region_delivery_is_refused() {
        let service =
            NotificationService::new(vec![channel("weprint-dev-alerts", "eu-west-1", None)]);
        assert!(
            service
                .deliver(message("weprint-dev-alerts", "us-east-1"))
                .await
                .is_err()
        );
        assert!(service.delivered().await.is_empty());
    }

    #[tokio::test]
    async fn duplicates_and_unsubscribed_channels_are_recorded() {
        let service = NotificationService::default();
        service
            .configure_channel(channel("weprint-dev-alerts", "eu-west-1", None))
            .await;
        for _ in 0..2 {
            service
                .deliver(message("weprint-dev-alerts", "eu-west-1"))
                .await
                .unwrap();
        }
        let delivered = service.delivered().await;
        assert_eq!(delivered.len(), 2);
        assert!(delivered.iter().all(|delivery| delivery.recipient.is_none()));
    }

    #[tokio::test]
    async fn unsubscribed_delivery_is_reported_to_the_log() {
        use stackwatch_ports::LogPort;

        let log = InMemoryLogPort::default();
        let service =
            NotificationService::new(vec![channel("weprint-dev-alerts", "eu-west-1", None)])
                .with_log(log.clone());
        service
            .deliver(message("weprint-dev-alerts", "eu-west-1"))
            .await
            .unwrap();
        let events = log.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, EventLevel::Warn);
        assert!(events[0].message.contains("weprint-dev-cpu-high reached nobody"));
    }

    #[tokio::test]
    async fn configure_channel_replaces_by_name() {
        let service =
            NotificationService::new(vec![channel("weprint-dev-alerts", "eu-west-1", None)]);
        service
            .configure_channel(channel(
                "weprint-dev-alerts",
                "eu-west-1",
                Some("ops@example.com"),
            ))
            .await;
        let channels = service.channels().await;
        assert_eq!(channels.len(), 1);
        assert!(channels[0].subscription.is_some());
    }
}
