//! `salesagent-core`: domain foundation building blocks.
//!
//! Identifiers, the domain error model and the aggregate traits shared by the
//! product catalog, media-buy and inventory crates. No infrastructure here.

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot};
pub use error::{DomainError, DomainResult};
pub use id::{PrincipalId, TenantId};
