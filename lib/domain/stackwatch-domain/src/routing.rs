//! Routing rules: event patterns plus the message transform applied to
//! matching events.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::alarm::AlarmState;
use crate::alarm_event::{ALARM_EVENT_DETAIL_TYPE, ALARM_EVENT_SOURCE, AlarmStateChangeEvent};

pub const MISSING_REASON_PLACEHOLDER: &str = "No details provided.";

/// Which state transitions reach a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingPolicy {
    #[default]
    AlarmOnly,
    /// Legacy behaviour: recoveries to OK are routed as well.
    AlarmAndRecovery,
}

impl RoutingPolicy {
    pub fn routed_states(self) -> &'static [AlarmState] {
        match self {
            Self::AlarmOnly => &[AlarmState::Alarm],
            Self::AlarmAndRecovery => &[AlarmState::Alarm, AlarmState::Ok],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPattern {
    pub source: String,
    pub detail_type: String,
    pub alarm_name_prefix: String,
    pub states: Vec<AlarmState>,
}

impl EventPattern {
    pub fn alarm_state_change(prefix: impl Into<String>, states: Vec<AlarmState>) -> Self {
        Self {
            source: ALARM_EVENT_SOURCE.to_string(),
            detail_type: ALARM_EVENT_DETAIL_TYPE.to_string(),
            alarm_name_prefix: prefix.into(),
            states,
        }
    }

    pub fn matches(&self, event: &AlarmStateChangeEvent) -> bool {
        event.source == self.source
            && event.detail_type == self.detail_type
            && event.alarm_name().starts_with(&self.alarm_name_prefix)
            && event
                .state()
                .is_some_and(|state| self.states.contains(&state))
    }

    /// Pattern document in the event bus's matching syntax.
    pub fn to_document(&self) -> Value {
        let states: Vec<&str> = self.states.iter().map(|state| state.as_str()).collect();
        json!({
            "source": [self.source],
            "detail-type": [self.detail_type],
            "detail": {
                "alarmName": [{ "prefix": self.alarm_name_prefix }],
                "state": { "value": states },
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

/// Input transformer: named JSON paths substituted into `<name>` slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub input_paths: BTreeMap<String, String>,
    #[serde(default)]
    pub fallbacks: BTreeMap<String, String>,
    pub subject: String,
    pub body: String,
}

impl MessageTemplate {
    pub fn critical_alert() -> Self {
        Self::with_status("CRITICAL ALERT")
    }

    pub fn resolved() -> Self {
        Self::with_status("RESOLVED")
    }

    fn with_status(status: &str) -> Self {
        let input_paths = [
            ("alarmName", "$.detail.alarmName"),
            ("state", "$.detail.state.value"),
            ("time", "$.time"),
            ("reason", "$.detail.state.reason"),
        ]
        .into_iter()
        .map(|(name, path)| (name.to_string(), path.to_string()))
        .collect();
        let fallbacks = BTreeMap::from([(
            "reason".to_string(),
            MISSING_REASON_PLACEHOLDER.to_string(),
        )]);
        Self {
            input_paths,
            fallbacks,
            subject: format!("{status}: <alarmName>"),
            body: format!(
                "{status}\nAlarm: <alarmName>\nState: <state>\nTime: <time>\nReason: <reason>\n"
            ),
        }
    }

    pub fn render(&self, payload: &Value) -> RenderedMessage {
        let values: BTreeMap<&str, String> = self
            .input_paths
            .iter()
            .map(|(name, path)| {
                let value = lookup(payload, path)
                    .or_else(|| self.fallbacks.get(name).cloned())
                    .unwrap_or_default();
                (name.as_str(), value)
            })
            .collect();
        RenderedMessage {
            subject: substitute(&self.subject, &values),
            body: substitute(&self.body, &values),
        }
    }
}

fn lookup(payload: &Value, path: &str) -> Option<String> {
    let path = path.strip_prefix('$')?;
    let mut current = payload;
    for segment in path.split('.').filter(|segment| !segment.is_empty()) {
        current = current.get(segment)?;
    }
    match current {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn substitute(template: &str, values: &BTreeMap<&str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let replaced = tail[1..].find('>').and_then(|end| {
            let name = &tail[1..1 + end];
            values.get(name).map(|value| (value, end + 2))
        });
        match replaced {
            Some((value, consumed)) => {
                out.push_str(value);
                rest = &tail[consumed..];
            }
            None => {
                out.push('<');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub name: String,
    pub region: String,
    pub pattern: EventPattern,
    pub target_channel: String,
    pub template: MessageTemplate,
}

impl RoutingRule {
    /// An event that names its region only reaches rules in that region;
    /// a region-less event is matched on pattern alone.
    pub fn matches(&self, event: &AlarmStateChangeEvent) -> bool {
        (event.region.is_empty() || event.region == self.region) && self.pattern.matches(event)
    }
}

/// A rendered message on its way to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutedMessage {
    pub rule: String,
    pub channel: String,
    pub region: String,
    pub alarm_name: String,
    pub subject: String,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(reason: Option<&str>) -> Value {
        let mut state = json!({ "value": "ALARM" });
        if let Some(reason) = reason {
            state["reason"] = json!(reason);
        }
        json!({
            "source": "aws.cloudwatch",
            "detail-type": "CloudWatch Alarm State Change",
            "time": "2024-05-01T10:00:00Z",
            "region": "eu-west-1",
            "detail": { "alarmName": "weprint-dev-cpu-high", "state": state },
        })
    }

    #[test]
    fn renders_all_fields() {
        let message = MessageTemplate::critical_alert().render(&payload(Some("Threshold Crossed")));
        assert_eq!(message.subject, "CRITICAL ALERT: weprint-dev-cpu-high");
        assert_eq!(
            message.body,
            "CRITICAL ALERT\nAlarm: weprint-dev-cpu-high\nState: ALARM\n\
             Time: 2024-05-01T10:00:00Z\nReason: Threshold Crossed\n"
        );
    }

    #[test]
    fn missing_reason_uses_placeholder() {
        let message = MessageTemplate::critical_alert().render(&payload(None));
        assert!(message.body.contains("Reason: No details provided.\n"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let template = MessageTemplate::critical_alert();
        let event = payload(Some("x"));
        assert_eq!(template.render(&event), template.render(&event));
    }

    #[test]
    fn unknown_slots_and_stray_brackets_are_literal() {
        let values = BTreeMap::from([("a", "1".to_string())]);
        assert_eq!(substitute("<a> <b> 3 < 4 <", &values), "1 <b> 3 < 4 <");
    }

    #[test]
    fn values_containing_slot_syntax_are_not_expanded_again() {
        let values = BTreeMap::from([("a", "<b>".to_string()), ("b", "x".to_string())]);
        assert_eq!(substitute("<a><b>", &values), "<b>x");
    }

    #[test]
    fn pattern_document_shape() {
        let pattern = EventPattern::alarm_state_change("weprint-dev-", vec![AlarmState::Alarm]);
        let doc = pattern.to_document();
        assert_eq!(doc["source"], json!(["aws.cloudwatch"]));
        assert_eq!(doc["detail"]["alarmName"][0]["prefix"], "weprint-dev-");
        assert_eq!(doc["detail"]["state"]["value"], json!(["ALARM"]));
    }

    #[test]
    fn routing_policy_states() {
        assert_eq!(RoutingPolicy::default().routed_states(), &[AlarmState::Alarm]);
        assert!(RoutingPolicy::AlarmAndRecovery
            .routed_states()
            .contains(&AlarmState::Ok));
    }
}
