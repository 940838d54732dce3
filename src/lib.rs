//! Per-stack monitoring alarms and alert routing.
//!
//! The workspace crates are re-exported under short names; most callers
//! only need [`AlertPlan`] and [`Runtime`].

pub use stackwatch_adapter_dryrun as dryrun;
pub use stackwatch_adapter_notification as notification;
pub use stackwatch_application as application;
pub use stackwatch_domain as domain;
pub use stackwatch_ports as ports;

pub use stackwatch_application::{AlertPlan, EventRouter, Provisioner, Runtime};
pub use stackwatch_domain::{ConfigError, StackwatchConfig};
