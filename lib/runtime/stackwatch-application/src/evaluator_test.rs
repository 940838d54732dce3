use chrono::{DateTime, Duration, TimeZone, Utc};

use stackwatch_domain::{AlarmKind, AlarmState, MissingDataPolicy, StackwatchConfig};

use crate::evaluator::AlarmEvaluator;
use crate::planner::AlertPlan;

fn plan() -> AlertPlan {
    let mut config = StackwatchConfig::new("weprint", "dev");
    config.upstream.instance_id = Some("i-0abc".into());
    config.upstream.distribution_id = Some("E2XYZ".into());
    AlertPlan::resolve(&config).unwrap()
}

fn evaluator(kind: AlarmKind) -> AlarmEvaluator {
    AlarmEvaluator::new(plan().alarm_by_kind(kind).unwrap().clone())
}

fn period(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap() + Duration::minutes(5 * n)
}

#[test]
fn cpu_needs_two_breaching_periods() {
    let mut cpu = evaluator(AlarmKind::CpuHigh);
    assert!(cpu.observe(Some(85.0), period(0)).is_none());
    assert_eq!(cpu.state(), AlarmState::Ok);

    let event = cpu.observe(Some(85.0), period(1)).expect("transition");
    assert_eq!(cpu.state(), AlarmState::Alarm);
    assert_eq!(event.state(), Some(AlarmState::Alarm));
    assert_eq!(
        event.detail.previous_state.as_ref().map(|s| s.value.as_str()),
        Some("OK")
    );
    assert!(event.alarm_name().contains("cpu-high"));
    assert_eq!(event.region, "eu-west-1");
    assert_eq!(event.time, "2024-05-01T10:05:00Z");
    let reason = event.detail.state.reason.unwrap();
    assert!(reason.contains("[85.0, 85.0]"), "{reason}");
    assert!(reason.contains("greater than or equal to"));
}

#[test]
fn staying_in_alarm_emits_nothing_more() {
    let mut cpu = evaluator(AlarmKind::CpuHigh);
    cpu.observe(Some(90.0), period(0));
    assert!(cpu.observe(Some(90.0), period(1)).is_some());
    assert!(cpu.observe(Some(95.0), period(2)).is_none());
    let recovery = cpu.observe(Some(10.0), period(3)).expect("recovery");
    assert_eq!(recovery.state(), Some(AlarmState::Ok));
}

#[test]
fn zero_traffic_keeps_alarm_ok() {
    let mut cpu = evaluator(AlarmKind::CpuHigh);
    for n in 0..3 {
        assert!(cpu.observe(None, period(n)).is_none());
    }
    assert_eq!(cpu.state(), AlarmState::Ok);
}

#[test]
fn threshold_is_inclusive_for_host_alarms_and_strict_for_edge() {
    let mut disk = evaluator(AlarmKind::DiskHigh);
    disk.observe(Some(80.0), period(0));
    assert!(disk.observe(Some(80.0), period(1)).is_some());

    let mut edge = evaluator(AlarmKind::EdgeErrorRate);
    assert!(edge.observe(Some(5.0), period(0)).is_none());
    assert!(edge.observe(Some(6.0), period(1)).is_some());
}

#[test]
fn edge_error_rate_fires_after_one_period() {
    let mut edge = evaluator(AlarmKind::EdgeErrorRate);
    let event = edge.observe(Some(6.0), period(0)).expect("transition");
    assert_eq!(event.state(), Some(AlarmState::Alarm));
    assert_eq!(event.region, "us-east-1");
}

#[test]
fn missing_policy_reports_insufficient_data() {
    let mut alarm = plan().alarm_by_kind(AlarmKind::MemoryHigh).unwrap().clone();
    alarm.missing_data = MissingDataPolicy::Missing;
    let mut memory = AlarmEvaluator::new(alarm);
    let event = memory.observe(None, period(0)).expect("transition");
    assert_eq!(event.state(), Some(AlarmState::InsufficientData));
    assert!(memory.observe(Some(10.0), period(1)).is_some());
    assert_eq!(memory.state(), AlarmState::Ok);
}

#[test]
fn breaching_policy_counts_gaps_against_the_alarm() {
    let mut alarm = plan().alarm_by_kind(AlarmKind::MemoryHigh).unwrap().clone();
    alarm.missing_data = MissingDataPolicy::Breaching;
    let mut memory = AlarmEvaluator::new(alarm);
    assert!(memory.observe(None, period(0)).is_none());
    assert!(memory.observe(None, period(1)).is_some());
    assert_eq!(memory.state(), AlarmState::Alarm);
}

#[test]
fn ignore_policy_holds_state_through_gaps() {
    let mut alarm = plan().alarm_by_kind(AlarmKind::CpuHigh).unwrap().clone();
    alarm.missing_data = MissingDataPolicy::Ignore;
    let mut cpu = AlarmEvaluator::new(alarm);
    cpu.observe(Some(90.0), period(0));
    cpu.observe(Some(90.0), period(1));
    assert_eq!(cpu.state(), AlarmState::Alarm);
    assert!(cpu.observe(None, period(2)).is_none());
    assert!(cpu.observe(None, period(3)).is_none());
    assert_eq!(cpu.state(), AlarmState::Alarm);
}
