use thiserror::Error;

/// Problems found while resolving configuration into a plan.
///
/// All of these need an operator to correct the input; none are retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("stack identity must not be empty")]
    EmptyStack,
    #[error("stack identity `{0}` may only contain lowercase letters, digits and underscores")]
    InvalidStack(String),
    #[error("project name `{0}` may only contain lowercase letters, digits and inner hyphens")]
    InvalidProject(String),
    #[error("subscriber email `{0}` is malformed")]
    InvalidEmail(String),
    #[error("`{0}` must name a region")]
    MissingRegion(&'static str),
    #[error("secondary region `{0}` is the same as the home region")]
    DuplicateRegion(String),
    #[error("secondary region `{0}` must be us-east-1, the only region publishing edge metrics")]
    UnsupportedSecondaryRegion(String),
    #[error("account id `{0}` must be 12 digits")]
    InvalidAccount(String),
    #[error("threshold `{name}` must be finite and non-negative, got {value}")]
    InvalidThreshold { name: &'static str, value: f64 },
    #[error("{0} identifier is required to declare alarms")]
    MissingUpstream(&'static str),
}
