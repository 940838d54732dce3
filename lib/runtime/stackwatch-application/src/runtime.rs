use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use tracing::info;

use stackwatch_domain::{
    AlarmState, AlarmStateChangeEvent, Event, EventBus, EventLevel, RoutedMessage,
};
use stackwatch_ports::PortSet;

use crate::evaluator::AlarmEvaluator;
use crate::planner::AlertPlan;
use crate::provisioner::{Provisioner, ProvisioningReport};
use crate::router::EventRouter;

/// Drives alarm evaluation, routing and delivery for one resolved plan.
pub struct Runtime {
    plan: AlertPlan,
    router: EventRouter,
    evaluators: BTreeMap<String, AlarmEvaluator>,
    events: EventBus,
    ports: PortSet,
}

impl Runtime {
    pub fn new(plan: AlertPlan) -> Self {
        Self::new_with_ports(plan, PortSet::empty())
    }

    pub fn new_with_ports(plan: AlertPlan, ports: PortSet) -> Self {
        let mut events = EventBus::default();
        events.push(Event::new(
            EventLevel::Info,
            format!("Runtime initialized for stack {}", plan.stack),
        ));
        for name in &plan.unrouted_alarms {
            events.push(Event::new(
                EventLevel::Warn,
                format!("Alarm {name} has no channel in its region"),
            ));
        }
        let evaluators = plan
            .alarms
            .iter()
            .map(|alarm| (alarm.name.clone(), AlarmEvaluator::new(alarm.clone())))
            .collect();
        let mut runtime = Self {
            router: EventRouter::from_plan(&plan),
            plan,
            evaluators,
            events,
            ports,
        };
        runtime.drain_port_events();
        runtime
    }

    pub fn plan(&self) -> &AlertPlan {
        &self.plan
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn alarm_state(&self, alarm_name: &str) -> Option<AlarmState> {
        self.evaluators.get(alarm_name).map(AlarmEvaluator::state)
    }

    pub async fn provision(&mut self) -> Result<ProvisioningReport> {
        let provisioner = Provisioner::new(self.ports.provision.clone());
        let outcome = provisioner.apply(&self.plan).await;
        self.drain_port_events();
        match outcome {
            Ok(report) => {
                self.events.push(Event::new(
                    EventLevel::Info,
                    format!("Provisioned {} resources", report.resources.len()),
                ));
                Ok(report)
            }
            Err(err) => {
                self.events.push(Event::new(
                    EventLevel::Error,
                    format!("Provisioning failed: {err:#}"),
                ));
                Err(err)
            }
        }
    }

    /// Feeds one period's datapoint to an alarm and routes any resulting
    /// state change.
    pub async fn observe(
        &mut self,
        alarm_name: &str,
        datapoint: Option<f64>,
        at: DateTime<Utc>,
    ) -> Result<Vec<RoutedMessage>> {
        self.drain_port_events();
        let evaluator = self
            .evaluators
            .get_mut(alarm_name)
            .ok_or_else(|| anyhow!("Unknown alarm: {alarm_name}"))?;
        let previous = evaluator.state();
        let Some(event) = evaluator.observe(datapoint, at) else {
            return Ok(Vec::new());
        };
        self.events.push(Event::new(
            EventLevel::Info,
            format!("{alarm_name}: {previous} -> {}", event.detail.state.value),
        ));
        self.dispatch(&event).await
    }

    /// Routes an event from the bus and delivers every resulting message.
    pub async fn dispatch(&mut self, event: &AlarmStateChangeEvent) -> Result<Vec<RoutedMessage>> {
        let messages = self.router.route(event)?;
        if messages.is_empty() {
            self.events.push(Event::new(
                EventLevel::Info,
                format!(
                    "Not routed: {} entered {}",
                    event.alarm_name(),
                    event.detail.state.value
                ),
            ));
            return Ok(messages);
        }
        for message in &messages {
            self.ports
                .delivery
                .deliver(message.clone())
                .await
                .with_context(|| format!("failed to deliver to {}", message.channel))?;
            info!(channel = %message.channel, alarm = %message.alarm_name, "Alert delivered");
            self.events.push(Event::new(
                EventLevel::Warn,
                format!("Delivered to {}: {}", message.channel, message.subject),
            ));
        }
        self.drain_port_events();
        Ok(messages)
    }

    fn drain_port_events(&mut self) {
        for event in self.ports.logs.drain_events() {
            self.events.push(event);
        }
    }
}
