//! `orgcentral-core` — tenant-boundary building blocks.
//!
//! This crate contains **pure** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod tenant;

pub use entity::{Entity, TenantScoped};
pub use error::{AuthorizationError, AuthorizationReason, DomainError, DomainResult};
pub use id::{OrgId, PolicyId, RoleId, UserId};
pub use tenant::{DataClassification, DataResidency, TenantScope};
