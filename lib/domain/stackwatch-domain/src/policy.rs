//! Typed IAM-style policy documents.
//!
//! Documents are assembled from statements and only turned into JSON at the
//! provisioning boundary, so ARNs never pass through string templates.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Principal {
    Service(String),
    #[serde(rename = "AWS")]
    Aws(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub effect: Effect,
    pub principal: Principal,
    #[serde(serialize_with = "one_or_many")]
    pub action: Vec<String>,
    #[serde(serialize_with = "one_or_many")]
    pub resource: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub condition: BTreeMap<String, BTreeMap<String, String>>,
}

impl PolicyStatement {
    pub fn allow(principal: Principal) -> Self {
        Self::with_effect(Effect::Allow, principal)
    }

    pub fn deny(principal: Principal) -> Self {
        Self::with_effect(Effect::Deny, principal)
    }

    fn with_effect(effect: Effect, principal: Principal) -> Self {
        Self {
            sid: None,
            effect,
            principal,
            action: Vec::new(),
            resource: Vec::new(),
            condition: BTreeMap::new(),
        }
    }

    pub fn sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action.push(action.into());
        self
    }

    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource.push(resource.into());
        self
    }

    pub fn condition(
        mut self,
        operator: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.condition
            .entry(operator.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Statement")]
    pub statements: Vec<PolicyStatement>,
}

impl PolicyDocument {
    pub fn new(statements: Vec<PolicyStatement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statements,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn one_or_many<S>(values: &[String], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match values {
        [single] => serializer.serialize_str(single),
        many => many.serialize(serializer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_action_and_resource_serialize_as_strings() {
        let doc = PolicyDocument::new(vec![
            PolicyStatement::allow(Principal::Service("events.amazonaws.com".into()))
                .sid("AllowEventsPublish")
                .action("sns:Publish")
                .resource("arn:aws:sns:eu-west-1:123456789012:weprint-dev-alerts"),
        ]);
        assert_eq!(
            doc.to_value(),
            json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Sid": "AllowEventsPublish",
                    "Effect": "Allow",
                    "Principal": { "Service": "events.amazonaws.com" },
                    "Action": "sns:Publish",
                    "Resource": "arn:aws:sns:eu-west-1:123456789012:weprint-dev-alerts"
                }]
            })
        );
    }

    #[test]
    fn conditions_and_lists_are_kept_structured() {
        let doc = PolicyDocument::new(vec![
            PolicyStatement::deny(Principal::Aws("*".into()))
                .action("s3:GetObject")
                .action("s3:PutObject")
                .resource("arn:aws:s3:::bucket/*")
                .condition("StringEquals", "AWS:SourceArn", "arn\"injected"),
        ]);
        let value = doc.to_value();
        let statement = &value["Statement"][0];
        assert_eq!(statement["Principal"], json!({ "AWS": "*" }));
        assert_eq!(statement["Action"], json!(["s3:GetObject", "s3:PutObject"]));
        assert_eq!(
            statement["Condition"]["StringEquals"]["AWS:SourceArn"],
            json!("arn\"injected")
        );
        assert!(statement.get("Sid").is_none());
    }
}
