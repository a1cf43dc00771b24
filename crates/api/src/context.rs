use salesagent_adcp::CompatMode;
use salesagent_core::{PrincipalId, TenantId};

/// Tenant context for a request.
///
/// This is immutable and must be present for every service call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Authenticated buyer making the request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: PrincipalId,
}

impl PrincipalContext {
    pub fn new(principal_id: PrincipalId) -> Self {
        Self { principal_id }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }
}

/// Everything a service call needs to know about its caller.
///
/// The response compatibility mode is derived from the declared AdCP
/// version when the context is built and never re-evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    tenant: TenantContext,
    principal: PrincipalContext,
    adcp_version: Option<String>,
    compat: CompatMode,
}

impl RequestContext {
    pub fn new(tenant_id: TenantId, principal_id: PrincipalId, adcp_version: Option<&str>) -> Self {
        Self {
            tenant: TenantContext::new(tenant_id),
            principal: PrincipalContext::new(principal_id),
            adcp_version: adcp_version.map(str::to_string),
            compat: CompatMode::for_client(adcp_version),
        }
    }

    pub fn tenant(&self) -> TenantContext {
        self.tenant
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant.tenant_id()
    }

    pub fn principal(&self) -> PrincipalContext {
        self.principal
    }

    pub fn adcp_version(&self) -> Option<&str> {
        self.adcp_version.as_deref()
    }

    pub fn compat(&self) -> CompatMode {
        self.compat
    }
}
