//! Stack-scoped resource naming.
//!
//! Every generated name has the shape `{project}-{stack}-{kind}`. Stack
//! identities never contain `-`, so the prefix `{project}-{stack}-` belongs
//! to exactly one stack and names from different stacks cannot collide.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Per-environment namespace discriminator (`dev`, `prod`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StackId(String);

impl StackId {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(ConfigError::EmptyStack);
        }
        let allowed = value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !allowed {
            return Err(ConfigError::InvalidStack(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StackId {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StackId> for String {
    fn from(value: StackId) -> Self {
        value.0
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed deployment prefix shared by all stacks of one project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectName(String);

impl ProjectName {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let value = raw.trim();
        let allowed = !value.is_empty()
            && !value.starts_with('-')
            && !value.ends_with('-')
            && value
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !allowed {
            return Err(ConfigError::InvalidProject(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProjectName {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProjectName> for String {
    fn from(value: ProjectName) -> Self {
        value.0
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namer {
    project: ProjectName,
    stack: StackId,
}

impl Namer {
    pub fn new(project: ProjectName, stack: StackId) -> Self {
        Self { project, stack }
    }

    pub fn project(&self) -> &ProjectName {
        &self.project
    }

    pub fn stack(&self) -> &StackId {
        &self.stack
    }

    pub fn name(&self, kind: &str) -> String {
        format!("{}{}", self.prefix(), kind)
    }

    /// Prefix shared by every resource of this stack, alarms included.
    pub fn prefix(&self) -> String {
        format!("{}-{}-", self.project, self.stack)
    }

    pub fn owns(&self, name: &str) -> bool {
        name.starts_with(&self.prefix())
    }
}
