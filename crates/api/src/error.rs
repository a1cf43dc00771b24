//! Service errors and their AdCP error payloads.

use serde::Serialize;

use salesagent_core::DomainError;
use salesagent_gam::GamError;
use salesagent_infra::{AdServerError, CatalogError, RepositoryError, TenantError};
use salesagent_inventory::{InventoryStoreError, SyncError};
use salesagent_media_buy::MediaBuyError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    /// Request is well-formed but the resource is in the wrong state for it.
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// Tenant or product setup prevents the operation.
    #[error("{0}")]
    Configuration(String),
    #[error("{0}")]
    Unsupported(String),
    #[error("{0}")]
    AdServer(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Internal(String),
}

/// AdCP error body: `{ "code": ..., "message": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::InvalidState(_) => "invalid_state",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Configuration(_) => "configuration_error",
            ApiError::Unsupported(_) => "unsupported_operation",
            ApiError::AdServer(_) => "adapter_error",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::Internal(_) => "internal_error",
        }
    }

    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Validation(msg) => ApiError::Validation(msg),
            DomainError::InvalidId { .. } => ApiError::Validation(e.to_string()),
            DomainError::InvariantViolation(msg) => ApiError::InvalidState(msg),
            DomainError::NotFound(_) => ApiError::NotFound(e.to_string()),
            DomainError::Conflict(msg) => ApiError::Conflict(msg),
            DomainError::TenantMismatch { .. } => ApiError::Forbidden(e.to_string()),
        }
    }
}

impl From<MediaBuyError> for ApiError {
    fn from(e: MediaBuyError) -> Self {
        if e.is_configuration_error() {
            return ApiError::Configuration(e.to_string());
        }
        match e {
            MediaBuyError::Domain(inner) => inner.into(),
            other => ApiError::Validation(other.to_string()),
        }
    }
}

impl From<GamError> for ApiError {
    fn from(e: GamError) -> Self {
        match e {
            GamError::MediaBuy(inner) => inner.into(),
            GamError::Rpc(msg) => ApiError::AdServer(msg),
            GamError::MissingImpressionGoal { .. } | GamError::UnknownPricingOption { .. } => {
                ApiError::Validation(e.to_string())
            }
            GamError::UnknownLineItemType { .. }
            | GamError::IncompatibleLineItemType { .. }
            | GamError::UnsupportedPricingModel { .. }
            | GamError::MissingPackageMetadata { .. } => ApiError::Configuration(e.to_string()),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::Concurrency(msg) => ApiError::Conflict(msg),
            CatalogError::TenantIsolation(msg) => ApiError::Forbidden(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Concurrency(msg) => ApiError::Conflict(msg),
            RepositoryError::TenantIsolation => ApiError::Forbidden(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<TenantError> for ApiError {
    fn from(e: TenantError) -> Self {
        match e {
            TenantError::NotFound(_) => ApiError::NotFound(e.to_string()),
            TenantError::Invalid(msg) => ApiError::Configuration(msg),
            TenantError::Storage(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<InventoryStoreError> for ApiError {
    fn from(e: InventoryStoreError) -> Self {
        match e {
            InventoryStoreError::TenantIsolation => ApiError::Forbidden(e.to_string()),
            InventoryStoreError::Storage(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Unsupported(_) => ApiError::Unsupported(e.to_string()),
            SyncError::NoPriorSync => ApiError::InvalidState(e.to_string()),
            SyncError::AlreadyRunning(_) => ApiError::Conflict(e.to_string()),
            SyncError::Store(inner) => inner.into(),
        }
    }
}

impl From<AdServerError> for ApiError {
    fn from(e: AdServerError) -> Self {
        match e {
            AdServerError::Unsupported(_) => ApiError::Unsupported(e.to_string()),
            AdServerError::NotConfigured { .. } => ApiError::Configuration(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salesagent_core::TenantId;

    #[test]
    fn missing_delivery_type_is_a_configuration_error() {
        let err: ApiError = GamError::MediaBuy(MediaBuyError::MissingDeliveryType {
            package_id: "pkg_1".to_string(),
        })
        .into();

        let payload = err.payload();
        assert_eq!(payload.code, "configuration_error");
        assert!(payload.message.contains("pkg_1"));
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            serde_json::json!({ "code": "configuration_error", "message": payload.message })
        );
    }

    #[test]
    fn buyer_mistakes_are_validation_errors() {
        let err: ApiError = MediaBuyError::UnknownProduct {
            package_id: "pkg_1".to_string(),
            product_id: "nope".to_string(),
        }
        .into();
        assert_eq!(err.code(), "validation_error");

        let err: ApiError = MediaBuyError::Domain(DomainError::not_found("media buy")).into();
        assert_eq!(err.code(), "not_found");
        assert_eq!(err.to_string(), "media buy not found");

        let err: ApiError =
            MediaBuyError::Domain(DomainError::tenant_mismatch("media buy", TenantId::new())).into();
        assert_eq!(err.code(), "forbidden");
    }

    #[test]
    fn sync_refusals_map_to_distinct_codes() {
        let err: ApiError = SyncError::NoPriorSync.into();
        assert_eq!(err.code(), "invalid_state");

        let err: ApiError =
            SyncError::Store(InventoryStoreError::Storage("down".to_string())).into();
        assert_eq!(err, ApiError::Internal("down".to_string()));
    }
}
