//! Alarm state-change events as delivered on the event bus.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::alarm::{AlarmDefinition, AlarmState};

pub const ALARM_EVENT_SOURCE: &str = "aws.cloudwatch";
pub const ALARM_EVENT_DETAIL_TYPE: &str = "CloudWatch Alarm State Change";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmStateChangeEvent {
    pub source: String,
    #[serde(rename = "detail-type")]
    pub detail_type: String,
    pub time: String,
    #[serde(default)]
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    pub detail: AlarmDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmDetail {
    pub alarm_name: String,
    pub state: StateSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_state: Option<StateSnapshot>,
}

/// State values are kept as raw strings; unknown values must still parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl StateSnapshot {
    pub fn new(state: AlarmState, reason: Option<String>, at: DateTime<Utc>) -> Self {
        Self {
            value: state.as_str().to_string(),
            reason,
            timestamp: Some(at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

impl AlarmStateChangeEvent {
    pub fn transition(
        alarm: &AlarmDefinition,
        previous: AlarmState,
        current: AlarmState,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            source: ALARM_EVENT_SOURCE.to_string(),
            detail_type: ALARM_EVENT_DETAIL_TYPE.to_string(),
            time: at.to_rfc3339_opts(SecondsFormat::Secs, true),
            region: alarm.region.clone(),
            account: None,
            detail: AlarmDetail {
                alarm_name: alarm.name.clone(),
                state: StateSnapshot::new(current, Some(reason.into()), at),
                previous_state: Some(StateSnapshot::new(previous, None, at)),
            },
        }
    }

    pub fn alarm_name(&self) -> &str {
        &self.detail.alarm_name
    }

    /// `None` when the bus carries a state this crate does not know.
    pub fn state(&self) -> Option<AlarmState> {
        self.detail.state.value.parse().ok()
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bus_payload_without_reason() {
        let raw = r#"{
            "source": "aws.cloudwatch",
            "detail-type": "CloudWatch Alarm State Change",
            "time": "2024-05-01T10:00:00Z",
            "region": "eu-west-1",
            "detail": {
                "alarmName": "weprint-dev-cpu-high",
                "state": { "value": "ALARM" }
            }
        }"#;
        let event = AlarmStateChangeEvent::from_json(raw).unwrap();
        assert_eq!(event.alarm_name(), "weprint-dev-cpu-high");
        assert_eq!(event.state(), Some(AlarmState::Alarm));
        assert!(event.detail.state.reason.is_none());
    }

    #[test]
    fn unknown_state_value_is_preserved() {
        let raw = r#"{"source":"aws.cloudwatch","detail-type":"CloudWatch Alarm State Change",
            "time":"t","detail":{"alarmName":"a","state":{"value":"PENDING"}}}"#;
        let event = AlarmStateChangeEvent::from_json(raw).unwrap();
        assert_eq!(event.state(), None);
        assert_eq!(event.detail.state.value, "PENDING");
        assert_eq!(event.region, "");
    }
}
