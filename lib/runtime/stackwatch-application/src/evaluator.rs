//! Local model of the monitoring backend's per-alarm state machine.
//!
//! The real evaluation happens outside this crate; the model exists so the
//! routing path can be exercised end to end from metric datapoints.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use stackwatch_domain::{
    AlarmDefinition, AlarmState, AlarmStateChangeEvent, ComparisonOperator, MissingDataPolicy,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Good,
    Bad,
    Absent,
}

#[derive(Debug, Clone)]
pub struct AlarmEvaluator {
    alarm: AlarmDefinition,
    state: AlarmState,
    periods: usize,
    window: VecDeque<Option<f64>>,
}

impl AlarmEvaluator {
    /// Starts in OK: a freshly declared alarm has not seen a breach.
    pub fn new(alarm: AlarmDefinition) -> Self {
        let periods = alarm.evaluation_periods.max(1) as usize;
        Self {
            alarm,
            state: AlarmState::Ok,
            periods,
            window: VecDeque::with_capacity(periods),
        }
    }

    pub fn alarm(&self) -> &AlarmDefinition {
        &self.alarm
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    /// Feeds one period's datapoint (`None` when the metric had no data)
    /// and returns the state-change event if the state moved.
    pub fn observe(
        &mut self,
        datapoint: Option<f64>,
        at: DateTime<Utc>,
    ) -> Option<AlarmStateChangeEvent> {
        if self.window.len() == self.periods {
            self.window.pop_front();
        }
        self.window.push_back(datapoint);

        let next = self.next_state();
        if next == self.state {
            return None;
        }
        let previous = self.state;
        self.state = next;
        Some(AlarmStateChangeEvent::transition(
            &self.alarm,
            previous,
            next,
            self.reason(next),
            at,
        ))
    }

    fn classify(&self, datapoint: Option<f64>) -> Slot {
        match (datapoint, self.alarm.missing_data) {
            (Some(value), _) if self.alarm.breaches(value) => Slot::Bad,
            (Some(_), _) => Slot::Good,
            (None, MissingDataPolicy::NotBreaching) => Slot::Good,
            (None, MissingDataPolicy::Breaching) => Slot::Bad,
            (None, MissingDataPolicy::Ignore | MissingDataPolicy::Missing) => Slot::Absent,
        }
    }

    fn next_state(&self) -> AlarmState {
        let slots: Vec<Slot> = self.window.iter().map(|d| self.classify(*d)).collect();
        let full = slots.len() == self.periods;
        if full && slots.iter().all(|slot| *slot == Slot::Bad) {
            return AlarmState::Alarm;
        }
        if slots.contains(&Slot::Good) {
            return AlarmState::Ok;
        }
        let no_data = slots.iter().all(|slot| *slot == Slot::Absent);
        match self.alarm.missing_data {
            MissingDataPolicy::Missing if no_data => AlarmState::InsufficientData,
            // Too few breaching periods, or breaches mixed with gaps: hold.
            _ => self.state,
        }
    }

    fn reason(&self, state: AlarmState) -> String {
        let periods = self.window.len();
        match state {
            AlarmState::Alarm => format!(
                "Threshold Crossed: {periods} out of the last {periods} datapoints [{}] were {} the threshold ({}).",
                self.datapoints(),
                describe(self.alarm.comparison),
                self.alarm.threshold
            ),
            AlarmState::Ok => format!(
                "Threshold Cleared: datapoints [{}] are within the threshold ({}).",
                self.datapoints(),
                self.alarm.threshold
            ),
            AlarmState::InsufficientData => {
                format!("Insufficient Data: no datapoints in the last {periods} periods.")
            }
        }
    }

    fn datapoints(&self) -> String {
        self.window
            .iter()
            .map(|datapoint| match datapoint {
                Some(value) => format!("{value:.1}"),
                None => "missing".to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn describe(comparison: ComparisonOperator) -> &'static str {
    match comparison {
        ComparisonOperator::GreaterThanOrEqualToThreshold => "greater than or equal to",
        ComparisonOperator::GreaterThanThreshold => "greater than",
        ComparisonOperator::LessThanThreshold => "less than",
        ComparisonOperator::LessThanOrEqualToThreshold => "less than or equal to",
    }
}
