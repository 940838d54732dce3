//! Domain models and invariants.

pub mod alarm;
pub mod alarm_event;
pub mod channel;
pub mod config;
pub mod error;
pub mod events;
pub mod naming;
pub mod policy;
pub mod routing;
pub mod topology;

pub use alarm::{AlarmDefinition, AlarmKind, AlarmState, ComparisonOperator, MissingDataPolicy, Statistic};
pub use alarm_event::{ALARM_EVENT_DETAIL_TYPE, ALARM_EVENT_SOURCE, AlarmDetail, AlarmStateChangeEvent, StateSnapshot};
pub use channel::{ChannelSet, EmailSubscription, NotificationChannel, is_valid_email};
pub use config::{
    AlertsConfig, DiskConfig, StackwatchConfig, ThresholdsConfig, TopologyConfig, UpstreamConfig,
};
pub use error::ConfigError;
pub use events::{Event, EventBus, EventLevel, now_millis};
pub use naming::{Namer, ProjectName, StackId};
pub use policy::{Effect, PolicyDocument, PolicyStatement, Principal};
pub use routing::{
    EventPattern, MISSING_REASON_PLACEHOLDER, MessageTemplate, RenderedMessage, RoutedMessage,
    RoutingPolicy, RoutingRule,
};
pub use topology::{StackOutput, StackTopology, VolumeAttachmentSpec};
