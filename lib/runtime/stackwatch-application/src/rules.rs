use stackwatch_domain::{
    AlarmState, ChannelSet, EventPattern, MessageTemplate, Namer, NotificationChannel,
    RoutingPolicy, RoutingRule,
};

/// One rule per channel region for ALARM entries; with the legacy policy a
/// second rule per region carries OK transitions under a `RESOLVED` banner.
pub fn declare_rules(namer: &Namer, channels: &ChannelSet, policy: RoutingPolicy) -> Vec<RoutingRule> {
    let mut rules = Vec::new();
    for (index, channel) in channels.iter().enumerate() {
        let suffix = if index == 0 { "" } else { "-global" };
        for state in policy.routed_states() {
            let (kind, template) = match state {
                AlarmState::Alarm => ("alarm-route", MessageTemplate::critical_alert()),
                _ => ("recovery-route", MessageTemplate::resolved()),
            };
            rules.push(rule(
                namer,
                &format!("{kind}{suffix}"),
                channel,
                *state,
                template,
            ));
        }
    }
    rules
}

fn rule(
    namer: &Namer,
    kind: &str,
    channel: &NotificationChannel,
    state: AlarmState,
    template: MessageTemplate,
) -> RoutingRule {
    RoutingRule {
        name: namer.name(kind),
        region: channel.region.clone(),
        pattern: EventPattern::alarm_state_change(namer.prefix(), vec![state]),
        target_channel: channel.name.clone(),
        template,
    }
}
