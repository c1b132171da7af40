//! Infrastructure layer: repositories, cache, audit sink and the use cases
//! that compose them with the authorization core.

pub mod audit;
pub mod cache;
pub mod clock;
pub mod repositories;
pub mod services;
pub mod use_cases;
