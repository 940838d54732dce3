use stackwatch_domain::{ChannelSet, EmailSubscription, Namer, NotificationChannel};

pub const PRIMARY_TOPIC: &str = "alerts";
pub const SECONDARY_TOPIC: &str = "alerts-global";

/// The second channel exists only when a secondary region and an email are
/// both configured; an unsubscribed global topic would deliver nowhere.
pub fn declare_channels(
    namer: &Namer,
    account_id: &str,
    home_region: &str,
    secondary_region: Option<&str>,
    email: Option<&str>,
) -> ChannelSet {
    let primary = declare_channel(namer, account_id, home_region, PRIMARY_TOPIC, email);
    match (secondary_region, email) {
        (Some(region), Some(_)) => ChannelSet::Dual {
            primary,
            secondary: declare_channel(namer, account_id, region, SECONDARY_TOPIC, email),
        },
        _ => ChannelSet::Single { primary },
    }
}

fn declare_channel(
    namer: &Namer,
    account_id: &str,
    region: &str,
    kind: &str,
    email: Option<&str>,
) -> NotificationChannel {
    NotificationChannel {
        name: namer.name(kind),
        region: region.to_string(),
        display_name: format!(
            "{} infrastructure alerts - {} ({region})",
            namer.project(),
            namer.stack()
        ),
        account_id: account_id.to_string(),
        subscription: email
            .map(|endpoint| EmailSubscription::new(namer.name(&format!("{kind}-email")), endpoint)),
        policy_name: namer.name(&format!("{kind}-policy")),
        arn: None,
    }
}
