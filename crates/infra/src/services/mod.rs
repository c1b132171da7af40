//! Services composing repositories, cache and audit around the pure gate.

pub mod authorization;

pub use authorization::{ACCESS_DENIED_ACTION, AuthorizationService};
