//! ABAC policy, attribute and decision types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use orgcentral_core::{OrgId, PolicyId, UserId};

/// Priority assigned to policies that do not declare one.
pub const DEFAULT_POLICY_PRIORITY: i32 = 100;

fn default_priority() -> i32 {
    DEFAULT_POLICY_PRIORITY
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbacEffect {
    Allow,
    Deny,
}

/// One allow/deny rule in an organization's ordered policy list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbacPolicy {
    pub id: PolicyId,
    pub effect: AbacEffect,
    /// Action selectors, e.g. `"hr.leave.*"`.
    pub actions: Vec<String>,
    /// Resource selectors.
    pub resources: Vec<String>,
    /// Lower numbers are evaluated first.
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<PolicyCondition>,
}

impl AbacPolicy {
    pub fn new(
        id: impl Into<PolicyId>,
        effect: AbacEffect,
        actions: &[&str],
        resources: &[&str],
    ) -> Self {
        Self {
            id: id.into(),
            effect,
            actions: actions.iter().map(|a| a.to_string()).collect(),
            resources: resources.iter().map(|r| r.to_string()).collect(),
            priority: DEFAULT_POLICY_PRIORITY,
            condition: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_condition(mut self, condition: PolicyCondition) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// Scalar-or-list attribute value.
///
/// Loose JSON is narrowed into this type at the boundary; floats and nested
/// objects are not representable and are dropped there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Integer(i64),
    Text(String),
    List(Vec<AttributeValue>),
}

impl AttributeValue {
    /// Narrow a JSON value. Returns `None` for floats and objects.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;

        match value {
            Value::Null => Some(AttributeValue::Null),
            Value::Bool(b) => Some(AttributeValue::Bool(*b)),
            Value::Number(n) => n.as_i64().map(AttributeValue::Integer),
            Value::String(s) => Some(AttributeValue::Text(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(AttributeValue::from_json)
                .collect::<Option<Vec<_>>>()
                .map(AttributeValue::List),
            Value::Object(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Equality, or list membership when `self` is a list.
    pub fn matches(&self, expected: &AttributeValue) -> bool {
        if self == expected {
            return true;
        }
        match self {
            AttributeValue::List(items) => items.iter().any(|item| item == expected),
            _ => false,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

pub type AttributeMap = BTreeMap<String, AttributeValue>;

/// Narrow a loose JSON object into typed attributes, dropping unsupported
/// shapes. Non-object input yields an empty map.
pub fn attributes_from_json(value: &serde_json::Value) -> AttributeMap {
    let Some(object) = value.as_object() else {
        return AttributeMap::new();
    };
    object
        .iter()
        .filter_map(|(key, value)| AttributeValue::from_json(value).map(|v| (key.clone(), v)))
        .collect()
}

/// Extra predicate a policy can carry on top of its selectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PolicyCondition {
    /// Subject holds at least one of `roles`.
    SubjectRoleIn { roles: Vec<String> },
    SubjectAttributeEquals {
        attribute: String,
        value: AttributeValue,
    },
    ResourceAttributeEquals {
        attribute: String,
        value: AttributeValue,
    },
    /// Subject attribute equals a resource attribute; both must be present and non-null.
    #[serde(rename_all = "camelCase")]
    SubjectMatchesResource {
        subject_attribute: String,
        resource_attribute: String,
    },
    All { conditions: Vec<PolicyCondition> },
    Any { conditions: Vec<PolicyCondition> },
}

impl PolicyCondition {
    pub fn holds(&self, subject: &AbacSubject, resource: &AttributeMap) -> bool {
        match self {
            PolicyCondition::SubjectRoleIn { roles } => {
                subject.roles.iter().any(|role| roles.contains(role))
            }
            PolicyCondition::SubjectAttributeEquals { attribute, value } => subject
                .attributes
                .get(attribute)
                .is_some_and(|actual| actual.matches(value)),
            PolicyCondition::ResourceAttributeEquals { attribute, value } => resource
                .get(attribute)
                .is_some_and(|actual| actual.matches(value)),
            PolicyCondition::SubjectMatchesResource {
                subject_attribute,
                resource_attribute,
            } => match (
                subject.attributes.get(subject_attribute),
                resource.get(resource_attribute),
            ) {
                (Some(s), Some(r)) => !s.is_null() && s == r,
                _ => false,
            },
            PolicyCondition::All { conditions } => {
                conditions.iter().all(|c| c.holds(subject, resource))
            }
            PolicyCondition::Any { conditions } => {
                conditions.iter().any(|c| c.holds(subject, resource))
            }
        }
    }
}

/// Who is asking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbacSubject {
    pub org_id: OrgId,
    pub user_id: UserId,
    /// Role tokens: role key plus role name when they differ.
    pub roles: Vec<String>,
    /// Includes `orgId` and `userId`.
    pub attributes: AttributeMap,
}

impl AbacSubject {
    pub fn new(org_id: OrgId, user_id: UserId, roles: Vec<String>, attributes: AttributeMap) -> Self {
        let mut attributes = attributes;
        attributes.insert("orgId".into(), org_id.as_str().into());
        attributes.insert("userId".into(), user_id.as_str().into());
        Self {
            org_id,
            user_id,
            roles,
            attributes,
        }
    }
}

/// One concrete `(action, resource)` question.
#[derive(Debug, Clone, Copy)]
pub struct AbacRequest<'a> {
    pub action: &'a str,
    pub resource: &'a str,
    pub subject: &'a AbacSubject,
    pub resource_attributes: &'a AttributeMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AbacDecision {
    Allow { policy_id: PolicyId },
    Deny { policy_id: PolicyId },
    /// No policy matched; the role check decides.
    NotApplicable,
}

impl AbacDecision {
    pub fn is_allow(&self) -> bool {
        matches!(self, AbacDecision::Allow { .. })
    }

    pub fn is_deny(&self) -> bool {
        matches!(self, AbacDecision::Deny { .. })
    }

    pub fn policy_id(&self) -> Option<&PolicyId> {
        match self {
            AbacDecision::Allow { policy_id } | AbacDecision::Deny { policy_id } => Some(policy_id),
            AbacDecision::NotApplicable => None,
        }
    }
}
