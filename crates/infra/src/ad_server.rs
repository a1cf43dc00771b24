//! Adapter wiring: which ad-server client and discovery a tenant uses.

use std::sync::Arc;

use salesagent_channels::AdapterType;
use salesagent_core::TenantId;
use salesagent_gam::{GamClient, GamInventoryDiscovery, RecordingGamClient};
use salesagent_inventory::InventoryDiscovery;
use tracing::warn;

use crate::tenant::TenantConfig;

/// Network code used by mock tenants that configure none.
pub const MOCK_NETWORK_CODE: &str = "mock";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdServerError {
    #[error("adapter '{0}' has no ad-server integration")]
    Unsupported(AdapterType),
    #[error("tenant {tenant_id} is missing {setting}")]
    NotConfigured {
        tenant_id: TenantId,
        setting: &'static str,
    },
}

/// GAM connection details resolved for one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamTarget {
    pub network_code: String,
    pub advertiser_id: String,
}

#[derive(Clone)]
pub struct AdServerRegistry {
    gam: Arc<dyn GamClient>,
    in_process: bool,
}

impl core::fmt::Debug for AdServerRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AdServerRegistry")
            .field("in_process", &self.in_process)
            .finish_non_exhaustive()
    }
}

impl AdServerRegistry {
    pub fn new(gam: Arc<dyn GamClient>) -> Self {
        Self {
            gam,
            in_process: false,
        }
    }

    /// Registry backed by the in-process recording client. Orders never leave
    /// the process and discovery returns no inventory.
    pub fn in_process() -> Self {
        warn!("no ad server transport configured; orders are recorded in process and inventory discovery returns nothing");
        Self {
            gam: Arc::new(RecordingGamClient::new()),
            in_process: true,
        }
    }

    pub fn is_in_process(&self) -> bool {
        self.in_process
    }

    pub fn gam_client(&self) -> Arc<dyn GamClient> {
        Arc::clone(&self.gam)
    }

    /// GAM settings for order submission. Mock tenants fall back to
    /// placeholder values.
    pub fn gam_target(&self, tenant: &TenantConfig) -> Result<GamTarget, AdServerError> {
        match tenant.adapter {
            AdapterType::GoogleAdManager => Ok(GamTarget {
                network_code: required(tenant, tenant.network_code.as_deref(), "network_code")?,
                advertiser_id: required(tenant, tenant.advertiser_id.as_deref(), "advertiser_id")?,
            }),
            AdapterType::Mock => Ok(GamTarget {
                network_code: tenant
                    .network_code
                    .clone()
                    .unwrap_or_else(|| MOCK_NETWORK_CODE.to_string()),
                advertiser_id: tenant
                    .advertiser_id
                    .clone()
                    .unwrap_or_else(|| format!("mock-advertiser-{}", tenant.tenant_id)),
            }),
            ref other => Err(AdServerError::Unsupported(other.clone())),
        }
    }

    /// Inventory discovery for tenants whose adapter supports sync.
    pub fn discovery_for(
        &self,
        tenant: &TenantConfig,
    ) -> Result<Arc<dyn InventoryDiscovery>, AdServerError> {
        if !tenant.adapter.capabilities().supports_inventory_sync {
            return Err(AdServerError::Unsupported(tenant.adapter.clone()));
        }
        let target = self.gam_target(tenant)?;
        Ok(Arc::new(GamInventoryDiscovery::new(
            self.gam_client(),
            target.network_code,
        )))
    }
}

fn required(
    tenant: &TenantConfig,
    value: Option<&str>,
    setting: &'static str,
) -> Result<String, AdServerError> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .ok_or(AdServerError::NotConfigured {
            tenant_id: tenant.tenant_id,
            setting,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> AdServerRegistry {
        AdServerRegistry::new(Arc::new(RecordingGamClient::new()))
    }

    #[test]
    fn gam_tenant_needs_network_and_advertiser() {
        let tenant = TenantConfig::new(TenantId::new(), "acme", AdapterType::GoogleAdManager);
        assert_eq!(
            registry().gam_target(&tenant),
            Err(AdServerError::NotConfigured {
                tenant_id: tenant.tenant_id,
                setting: "network_code",
            })
        );

        let tenant = tenant.with_gam("1234", "adv-9");
        assert_eq!(
            registry().gam_target(&tenant).unwrap(),
            GamTarget {
                network_code: "1234".to_string(),
                advertiser_id: "adv-9".to_string(),
            }
        );
    }

    #[test]
    fn mock_tenant_uses_placeholders() {
        let tenant = TenantConfig::new(TenantId::new(), "demo", AdapterType::Mock);
        let target = registry().gam_target(&tenant).unwrap();
        assert_eq!(target.network_code, MOCK_NETWORK_CODE);
        assert!(registry().discovery_for(&tenant).is_ok());
    }

    #[test]
    fn adapters_without_sync_get_no_discovery() {
        let tenant = TenantConfig::new(TenantId::new(), "radio", AdapterType::Triton);
        assert!(matches!(
            registry().discovery_for(&tenant),
            Err(AdServerError::Unsupported(AdapterType::Triton))
        ));
    }

    #[test]
    fn in_process_registry_is_flagged() {
        assert!(AdServerRegistry::in_process().is_in_process());
        assert!(!registry().is_in_process());
        assert!(format!("{:?}", AdServerRegistry::in_process()).contains("in_process: true"));
    }
}
