//! Attribute-based access control layered on top of role permissions.

mod defaults;
mod engine;
mod selector;
mod types;
mod validator;

pub use defaults::{MEMBERSHIP_STATUS_ATTRIBUTE, default_bootstrap_policies};
pub use engine::{evaluate, order_policies, policy_applies};
pub use selector::{WILDCARD, any_selector_matches, selector_matches};
pub use types::{
    AbacDecision, AbacEffect, AbacPolicy, AbacRequest, AbacSubject, AttributeMap, AttributeValue,
    DEFAULT_POLICY_PRIORITY, PolicyCondition, attributes_from_json,
};
pub use validator::{
    EXTRA_ALLOWED_ACTIONS, EXTRA_ALLOWED_RESOURCES, SelectorAllowlist,
    assert_policies_use_known_selectors, validate_policy_shape,
};
