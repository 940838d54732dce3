//! Alert planning, provisioning and routing.

pub mod alarm_set;
pub mod evaluator;
pub mod planner;
pub mod provisioner;
pub mod router;
pub mod rules;
pub mod runtime;
pub mod topics;

pub use evaluator::AlarmEvaluator;
pub use planner::AlertPlan;
pub use provisioner::{ProvisionedResource, Provisioner, ProvisioningReport, ResourceKind};
pub use router::EventRouter;
pub use runtime::Runtime;

#[cfg(test)]
mod evaluator_test;
