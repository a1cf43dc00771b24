//! `salesagent-api`: request services for the AdCP sales agent.
//!
//! Transport-agnostic: callers build a [`RequestContext`] from whatever
//! framing they speak and map [`ApiError`] to its [`ErrorPayload`].

pub mod context;
pub mod error;
pub mod services;

pub use context::{PrincipalContext, RequestContext, TenantContext};
pub use error::{ApiError, ErrorPayload};
pub use services::{
    CreateMediaBuyRequest, GetProductsRequest, MediaBuyResponse, PublishProductRequest, SalesAgent,
};
