//! Tenant configuration lookup.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use salesagent_channels::AdapterType;
use salesagent_core::TenantId;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TenantError {
    #[error("tenant not found: {0}")]
    NotFound(TenantId),
    #[error("invalid tenant configuration: {0}")]
    Invalid(String),
    #[error("tenant store error: {0}")]
    Storage(String),
}

/// Per-tenant settings that drive adapter selection and approval flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantConfig {
    pub tenant_id: TenantId,
    pub name: String,
    pub adapter: AdapterType,
    /// Media buys wait in `pending_approval` until a human approves them.
    #[serde(default)]
    pub human_review_required: bool,
    /// GAM network code. Required for GAM inventory sync and order submission.
    #[serde(default)]
    pub network_code: Option<String>,
    /// GAM advertiser (company) id used on created orders.
    #[serde(default)]
    pub advertiser_id: Option<String>,
}

impl TenantConfig {
    pub fn new(tenant_id: TenantId, name: impl Into<String>, adapter: AdapterType) -> Self {
        Self {
            tenant_id,
            name: name.into(),
            adapter,
            human_review_required: false,
            network_code: None,
            advertiser_id: None,
        }
    }

    pub fn with_human_review(mut self, required: bool) -> Self {
        self.human_review_required = required;
        self
    }

    pub fn with_gam(mut self, network_code: impl Into<String>, advertiser_id: impl Into<String>) -> Self {
        self.network_code = Some(network_code.into());
        self.advertiser_id = Some(advertiser_id.into());
        self
    }
}

#[async_trait::async_trait]
pub trait TenantResolver: Send + Sync {
    async fn resolve(&self, tenant_id: TenantId) -> Result<TenantConfig, TenantError>;

    async fn list_tenants(&self) -> Result<Vec<TenantConfig>, TenantError>;
}

#[async_trait::async_trait]
impl<S> TenantResolver for Arc<S>
where
    S: TenantResolver + ?Sized,
{
    async fn resolve(&self, tenant_id: TenantId) -> Result<TenantConfig, TenantError> {
        (**self).resolve(tenant_id).await
    }

    async fn list_tenants(&self) -> Result<Vec<TenantConfig>, TenantError> {
        (**self).list_tenants().await
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTenantResolver {
    tenants: RwLock<HashMap<TenantId, TenantConfig>>,
}

impl InMemoryTenantResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Load tenants from a JSON array of [`TenantConfig`].
    pub fn from_json(raw: &str) -> Result<Self, TenantError> {
        let configs: Vec<TenantConfig> =
            serde_json::from_str(raw).map_err(|e| TenantError::Invalid(e.to_string()))?;
        let resolver = Self::new();
        for config in configs {
            resolver.upsert(config)?;
        }
        Ok(resolver)
    }

    pub fn upsert(&self, config: TenantConfig) -> Result<(), TenantError> {
        let mut tenants = self.tenants.write().map_err(poisoned)?;
        tenants.insert(config.tenant_id, config);
        Ok(())
    }
}

fn poisoned<T>(_: T) -> TenantError {
    TenantError::Storage("lock poisoned".to_string())
}

#[async_trait::async_trait]
impl TenantResolver for InMemoryTenantResolver {
    async fn resolve(&self, tenant_id: TenantId) -> Result<TenantConfig, TenantError> {
        let tenants = self.tenants.read().map_err(poisoned)?;
        tenants
            .get(&tenant_id)
            .cloned()
            .ok_or(TenantError::NotFound(tenant_id))
    }

    async fn list_tenants(&self) -> Result<Vec<TenantConfig>, TenantError> {
        let tenants = self.tenants.read().map_err(poisoned)?;
        let mut all: Vec<TenantConfig> = tenants.values().cloned().collect();
        all.sort_by_key(|t| t.tenant_id);
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_registered_tenants_only() {
        let resolver = InMemoryTenantResolver::new();
        let tenant = TenantConfig::new(TenantId::new(), "acme", AdapterType::GoogleAdManager)
            .with_gam("1234", "adv-1");
        resolver.upsert(tenant.clone()).unwrap();

        assert_eq!(resolver.resolve(tenant.tenant_id).await.unwrap(), tenant);

        let missing = TenantId::new();
        assert!(matches!(
            resolver.resolve(missing).await,
            Err(TenantError::NotFound(id)) if id == missing
        ));
    }

    #[tokio::test]
    async fn loads_tenants_from_json() {
        let a = TenantId::new();
        let raw = serde_json::json!([
            { "tenant_id": a, "name": "news", "adapter": "gam", "network_code": "1234" },
            { "tenant_id": TenantId::new(), "name": "radio", "adapter": "triton" },
        ])
        .to_string();

        let resolver = InMemoryTenantResolver::from_json(&raw).unwrap();
        assert_eq!(resolver.list_tenants().await.unwrap().len(), 2);
        assert_eq!(
            resolver.resolve(a).await.unwrap().adapter,
            AdapterType::GoogleAdManager
        );
        assert!(matches!(
            InMemoryTenantResolver::from_json("{}"),
            Err(TenantError::Invalid(_))
        ));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let tenant_id = TenantId::new();
        let json = serde_json::json!({
            "tenant_id": tenant_id,
            "name": "acme",
            "adapter": "mock",
        });
        let config: TenantConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.adapter, AdapterType::Mock);
        assert!(!config.human_review_required);
        assert!(config.network_code.is_none());
    }
}
