use std::borrow::Cow;
use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

use stackwatch_domain::{AlarmStateChangeEvent, RoutedMessage, RoutingRule};

use crate::planner::AlertPlan;

/// Applies routing rules to alarm state-change events.
///
/// Output depends only on the plan and the event payload.
#[derive(Debug, Clone, Default)]
pub struct EventRouter {
    rules: Vec<RoutingRule>,
    /// Declared region per alarm, used when the bus omits `region`.
    alarm_regions: BTreeMap<String, String>,
}

impl EventRouter {
    pub fn new(rules: Vec<RoutingRule>) -> Self {
        Self {
            rules,
            alarm_regions: BTreeMap::new(),
        }
    }

    pub fn from_plan(plan: &AlertPlan) -> Self {
        Self {
            rules: plan.rules.clone(),
            alarm_regions: plan
                .alarms
                .iter()
                .map(|alarm| (alarm.name.clone(), alarm.region.clone()))
                .collect(),
        }
    }

    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }

    pub fn route(&self, event: &AlarmStateChangeEvent) -> Result<Vec<RoutedMessage>> {
        let payload = serde_json::to_value(event).context("failed to encode alarm event")?;
        Ok(self.route_payload(event, &payload))
    }

    /// Routes a raw bus payload; fields outside the typed event are still
    /// visible to message templates.
    pub fn route_json(&self, raw: &str) -> Result<Vec<RoutedMessage>> {
        let payload: Value = serde_json::from_str(raw).context("event payload is not JSON")?;
        let event: AlarmStateChangeEvent = serde_json::from_value(payload.clone())
            .context("event payload is not an alarm state change")?;
        Ok(self.route_payload(&event, &payload))
    }

    fn route_payload(&self, event: &AlarmStateChangeEvent, payload: &Value) -> Vec<RoutedMessage> {
        let event = self.with_region(event);
        let event = event.as_ref();
        let messages: Vec<RoutedMessage> = self
            .rules
            .iter()
            .filter(|rule| rule.matches(event))
            .map(|rule| {
                let rendered = rule.template.render(payload);
                RoutedMessage {
                    rule: rule.name.clone(),
                    channel: rule.target_channel.clone(),
                    region: rule.region.clone(),
                    alarm_name: event.alarm_name().to_string(),
                    subject: rendered.subject,
                    body: rendered.body,
                }
            })
            .collect();
        if messages.is_empty() {
            debug!(
                alarm = event.alarm_name(),
                state = %event.detail.state.value,
                region = %event.region,
                "No routing rule matched"
            );
        }
        messages
    }

    fn with_region<'a>(&self, event: &'a AlarmStateChangeEvent) -> Cow<'a, AlarmStateChangeEvent> {
        if !event.region.is_empty() {
            return Cow::Borrowed(event);
        }
        match self.alarm_regions.get(event.alarm_name()) {
            Some(region) => {
                let mut event = event.clone();
                event.region = region.clone();
                Cow::Owned(event)
            }
            None => Cow::Borrowed(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackwatch_domain::StackwatchConfig;

    fn plan(secondary: Option<&str>) -> AlertPlan {
        let mut config = StackwatchConfig::new("weprint", "dev");
        config.alerts.email = Some("ops@example.com".into());
        config.alerts.secondary_region = secondary.map(str::to_string);
        config.upstream.instance_id = Some("i-0abc".into());
        config.upstream.distribution_id = Some("E2XYZ".into());
        AlertPlan::resolve(&config).unwrap()
    }

    fn event(alarm: &str, region: &str, state: &str, reason: Option<&str>) -> String {
        let reason = reason
            .map(|r| format!(r#", "reason": "{r}""#))
            .unwrap_or_default();
        format!(
            r#"{{
                "source": "aws.cloudwatch",
                "detail-type": "CloudWatch Alarm State Change",
                "time": "2024-05-01T10:00:00Z",
                "region": "{region}",
                "detail": {{ "alarmName": "{alarm}", "state": {{ "value": "{state}"{reason} }} }}
            }}"#
        )
    }

    #[test]
    fn alarm_entry_is_routed_to_regional_channel() {
        let router = EventRouter::from_plan(&plan(Some("us-east-1")));
        let messages = router
            .route_json(&event("weprint-dev-edge-5xx", "us-east-1", "ALARM", Some("x")))
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].channel, "weprint-dev-alerts-global");
        assert_eq!(messages[0].region, "us-east-1");
    }

    #[test]
    fn non_alarm_states_are_suppressed() {
        let router = EventRouter::from_plan(&plan(None));
        for state in ["OK", "INSUFFICIENT_DATA", "SOMETHING_NEW"] {
            let messages = router
                .route_json(&event("weprint-dev-cpu-high", "eu-west-1", state, None))
                .unwrap();
            assert!(messages.is_empty(), "{state} should not be routed");
        }
    }

    #[test]
    fn foreign_prefix_source_or_region_is_ignored() {
        let router = EventRouter::from_plan(&plan(None));
        let other_stack = event("weprint-prod-cpu-high", "eu-west-1", "ALARM", None);
        let other_region = event("weprint-dev-cpu-high", "us-west-2", "ALARM", None);
        let other_source = event("weprint-dev-cpu-high", "eu-west-1", "ALARM", None)
            .replace("aws.cloudwatch", "custom.app");
        for raw in [other_stack, other_region, other_source] {
            assert!(router.route_json(&raw).unwrap().is_empty());
        }
    }

    #[test]
    fn missing_reason_gets_placeholder() {
        let router = EventRouter::from_plan(&plan(None));
        let messages = router
            .route_json(&event("weprint-dev-disk-high", "eu-west-1", "ALARM", None))
            .unwrap();
        assert!(messages[0].body.contains("Reason: No details provided."));
    }

    #[test]
    fn formatting_is_byte_identical_across_calls() {
        let router = EventRouter::from_plan(&plan(None));
        let raw = event("weprint-dev-cpu-high", "eu-west-1", "ALARM", Some("Threshold Crossed"));
        let first = router.route_json(&raw).unwrap();
        let second = router.route_json(&raw).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].body.as_bytes(), second[0].body.as_bytes());
    }

    fn regionless(alarm: &str) -> String {
        format!(
            r#"{{
                "source": "aws.cloudwatch",
                "detail-type": "CloudWatch Alarm State Change",
                "time": "2024-05-01T10:00:00Z",
                "detail": {{ "alarmName": "{alarm}", "state": {{ "value": "ALARM", "reason": "r" }} }}
            }}"#
        )
    }

    #[test]
    fn event_without_region_routes_by_alarm_region() {
        let router = EventRouter::from_plan(&plan(None));
        let messages = router.route_json(&regionless("weprint-dev-cpu-high")).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].channel, "weprint-dev-alerts");

        let dual = EventRouter::from_plan(&plan(Some("us-east-1")));
        let cpu = dual.route_json(&regionless("weprint-dev-cpu-high")).unwrap();
        assert_eq!(cpu.len(), 1);
        assert_eq!(cpu[0].channel, "weprint-dev-alerts");
        let edge = dual.route_json(&regionless("weprint-dev-edge-5xx")).unwrap();
        assert_eq!(edge.len(), 1);
        assert_eq!(edge[0].channel, "weprint-dev-alerts-global");
    }

    #[test]
    fn event_without_region_for_undeclared_alarm_matches_on_pattern() {
        let router = EventRouter::new(plan(None).rules);
        let messages = router.route_json(&regionless("weprint-dev-custom")).unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn rejects_payloads_that_are_not_alarm_events() {
        let router = EventRouter::from_plan(&plan(None));
        assert!(router.route_json("not json").is_err());
        assert!(router.route_json(r#"{"source": "aws.cloudwatch"}"#).is_err());
    }
}
