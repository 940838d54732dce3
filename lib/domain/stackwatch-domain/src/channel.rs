//! Regional notification channels (email-subscribed topics).

use serde::Serialize;

use crate::policy::{PolicyDocument, PolicyStatement, Principal};

pub const EVENTS_SERVICE_PRINCIPAL: &str = "events.amazonaws.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailSubscription {
    pub name: String,
    pub protocol: String,
    pub endpoint: String,
}

impl EmailSubscription {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            protocol: "email".to_string(),
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationChannel {
    pub name: String,
    pub region: String,
    pub display_name: String,
    pub account_id: String,
    pub subscription: Option<EmailSubscription>,
    pub policy_name: String,
    /// Assigned once the topic exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
}

impl NotificationChannel {
    /// Topic ARNs are derived from region, account and name, so the
    /// publish policy can be built before the topic is created.
    pub fn expected_arn(&self) -> String {
        format!(
            "arn:aws:sns:{}:{}:{}",
            self.region, self.account_id, self.name
        )
    }

    pub fn topic_arn(&self) -> String {
        self.arn.clone().unwrap_or_else(|| self.expected_arn())
    }

    pub fn publish_policy(&self) -> PolicyDocument {
        PolicyDocument::new(vec![
            PolicyStatement::allow(Principal::Service(EVENTS_SERVICE_PRINCIPAL.to_string()))
                .sid("AllowEventRulesToPublish")
                .action("sns:Publish")
                .resource(self.topic_arn()),
        ])
    }

    pub fn with_arn(&self, arn: impl Into<String>) -> Self {
        Self {
            arn: Some(arn.into()),
            ..self.clone()
        }
    }
}

/// The channels of one stack, fixed when the plan is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ChannelSet {
    Single {
        primary: NotificationChannel,
    },
    Dual {
        primary: NotificationChannel,
        secondary: NotificationChannel,
    },
}

impl ChannelSet {
    pub fn primary(&self) -> &NotificationChannel {
        match self {
            Self::Single { primary } | Self::Dual { primary, .. } => primary,
        }
    }

    pub fn secondary(&self) -> Option<&NotificationChannel> {
        match self {
            Self::Single { .. } => None,
            Self::Dual { secondary, .. } => Some(secondary),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &NotificationChannel> {
        std::iter::once(self.primary()).chain(self.secondary())
    }

    pub fn for_region(&self, region: &str) -> Option<&NotificationChannel> {
        self.iter().find(|channel| channel.region == region)
    }

    pub fn by_name(&self, name: &str) -> Option<&NotificationChannel> {
        self.iter().find(|channel| channel.name == name)
    }

    pub fn regions(&self) -> Vec<&str> {
        self.iter().map(|channel| channel.region.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single { .. } => 1,
            Self::Dual { .. } => 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Shape check only; the provider remains the final authority.
pub fn is_valid_email(raw: &str) -> bool {
    if raw.is_empty() || raw.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = raw.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}
