use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use salesagent_channels::Channel;
use salesagent_core::{Aggregate, AggregateRoot, DomainError, DomainResult, TenantId};
use salesagent_events::Event;

use crate::country::CountryCode;
use crate::pricing::{DeliveryType, PricingOption};

/// Product identifier, as shown to buyers (e.g. `"prod_display_premium"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Archived,
}

/// Aggregate root: Product.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    id: ProductId,
    tenant_id: Option<TenantId>,
    name: String,
    description: String,
    format_ids: Vec<String>,
    delivery_type: DeliveryType,
    pricing_options: Vec<PricingOption>,
    countries: Option<BTreeSet<CountryCode>>,
    channels: Option<BTreeSet<Channel>>,
    implementation_config: JsonValue,
    status: ProductStatus,
    published_at: Option<DateTime<Utc>>,
    archived_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-published instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            description: String::new(),
            format_ids: Vec::new(),
            delivery_type: DeliveryType::NonGuaranteed,
            pricing_options: Vec::new(),
            countries: None,
            channels: None,
            implementation_config: JsonValue::Object(Default::default()),
            status: ProductStatus::Active,
            published_at: None,
            archived_at: None,
            expires_at: None,
            version: 0,
            created: false,
        }
    }

    /// Publish a new product and return the resulting aggregate.
    pub fn publish(cmd: PublishProduct) -> DomainResult<Self> {
        let mut product = Product::empty(cmd.product_id.clone());
        product.execute(&ProductCommand::PublishProduct(cmd))?;
        Ok(product)
    }

    /// Rebuild a product from its event history.
    pub fn from_events<'a>(
        id: ProductId,
        events: impl IntoIterator<Item = &'a ProductEvent>,
    ) -> Self {
        let mut product = Product::empty(id);
        for event in events {
            product.apply(event);
        }
        product
    }

    pub fn id_typed(&self) -> &ProductId {
        &self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn format_ids(&self) -> &[String] {
        &self.format_ids
    }

    pub fn delivery_type(&self) -> DeliveryType {
        self.delivery_type
    }

    pub fn pricing_options(&self) -> &[PricingOption] {
        &self.pricing_options
    }

    pub fn pricing_option(&self, pricing_option_id: &str) -> Option<&PricingOption> {
        self.pricing_options
            .iter()
            .find(|p| p.pricing_option_id == pricing_option_id)
    }

    /// Declared countries. `None` means the product is global.
    pub fn countries(&self) -> Option<&BTreeSet<CountryCode>> {
        self.countries.as_ref()
    }

    /// Declared channels. `None` means "use the adapter's defaults".
    pub fn channels(&self) -> Option<&BTreeSet<Channel>> {
        self.channels.as_ref()
    }

    pub fn implementation_config(&self) -> &JsonValue {
        &self.implementation_config
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    pub fn archived_at(&self) -> Option<DateTime<Utc>> {
        self.archived_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Published, not archived, and not expired at `now`.
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.created
            && self.status == ProductStatus::Active
            && self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PublishProduct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub name: String,
    pub description: String,
    pub format_ids: Vec<String>,
    pub delivery_type: DeliveryType,
    pub pricing_options: Vec<PricingOption>,
    pub countries: Option<BTreeSet<CountryCode>>,
    pub channels: Option<BTreeSet<Channel>>,
    pub implementation_config: JsonValue,
    pub expires_at: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ArchiveProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetProductExpiry. `expires_at = None` clears the expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetProductExpiry {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub expires_at: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProductCommand {
    PublishProduct(PublishProduct),
    ArchiveProduct(ArchiveProduct),
    SetProductExpiry(SetProductExpiry),
}

/// Event: ProductPublished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPublished {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub name: String,
    pub description: String,
    pub format_ids: Vec<String>,
    pub delivery_type: DeliveryType,
    pub pricing_options: Vec<PricingOption>,
    pub countries: Option<BTreeSet<CountryCode>>,
    pub channels: Option<BTreeSet<Channel>>,
    pub implementation_config: JsonValue,
    pub expires_at: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductArchived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductArchived {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductExpiryChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductExpiryChanged {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub expires_at: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductPublished(ProductPublished),
    ProductArchived(ProductArchived),
    ProductExpiryChanged(ProductExpiryChanged),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductPublished(_) => "products.product.published",
            ProductEvent::ProductArchived(_) => "products.product.archived",
            ProductEvent::ProductExpiryChanged(_) => "products.product.expiry_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductPublished(e) => e.occurred_at,
            ProductEvent::ProductArchived(e) => e.occurred_at,
            ProductEvent::ProductExpiryChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductPublished(e) => {
                self.id = e.product_id.clone();
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.format_ids = e.format_ids.clone();
                self.delivery_type = e.delivery_type;
                self.pricing_options = e.pricing_options.clone();
                self.countries = e.countries.clone();
                self.channels = e.channels.clone();
                self.implementation_config = e.implementation_config.clone();
                self.status = ProductStatus::Active;
                self.published_at = Some(e.occurred_at);
                self.expires_at = e.expires_at;
                self.created = true;
            }
            ProductEvent::ProductArchived(e) => {
                self.status = ProductStatus::Archived;
                self.archived_at = Some(e.occurred_at);
            }
            ProductEvent::ProductExpiryChanged(e) => {
                self.expires_at = e.expires_at;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::PublishProduct(cmd) => self.handle_publish(cmd),
            ProductCommand::ArchiveProduct(cmd) => self.handle_archive(cmd),
            ProductCommand::SetProductExpiry(cmd) => self.handle_set_expiry(cmd),
        }
    }
}

impl Product {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::tenant_mismatch("product", tenant_id));
        }
        Ok(())
    }

    fn ensure_product_id(&self, product_id: &ProductId) -> Result<(), DomainError> {
        if &self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_publish(&self, cmd: &PublishProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already published"));
        }
        self.ensure_product_id(&cmd.product_id)?;

        if cmd.product_id.as_str().trim().is_empty() {
            return Err(DomainError::validation("product_id cannot be empty"));
        }

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        if cmd.pricing_options.is_empty() {
            return Err(DomainError::validation(
                "product must offer at least one pricing option",
            ));
        }

        let mut seen = BTreeSet::new();
        for option in &cmd.pricing_options {
            option.validate()?;
            if !seen.insert(option.pricing_option_id.as_str()) {
                return Err(DomainError::validation(format!(
                    "duplicate pricing_option_id '{}'",
                    option.pricing_option_id
                )));
            }
        }

        let implementation_config = match &cmd.implementation_config {
            JsonValue::Null => JsonValue::Object(Default::default()),
            JsonValue::Object(_) => cmd.implementation_config.clone(),
            _ => {
                return Err(DomainError::validation(
                    "implementation_config must be a JSON object",
                ));
            }
        };

        if matches!(cmd.expires_at, Some(expires_at) if expires_at <= cmd.occurred_at) {
            return Err(DomainError::validation("expires_at must be in the future"));
        }

        // An explicitly empty set carries no information: store it as "absent"
        // so global / adapter-default semantics apply.
        let countries = cmd.countries.clone().filter(|c| !c.is_empty());
        let channels = cmd.channels.clone().filter(|c| !c.is_empty());

        Ok(vec![ProductEvent::ProductPublished(ProductPublished {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id.clone(),
            name: cmd.name.trim().to_string(),
            description: cmd.description.clone(),
            format_ids: cmd.format_ids.clone(),
            delivery_type: cmd.delivery_type,
            pricing_options: cmd.pricing_options.clone(),
            countries,
            channels,
            implementation_config,
            expires_at: cmd.expires_at,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_archive(&self, cmd: &ArchiveProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found("product"));
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_product_id(&cmd.product_id)?;

        if self.status == ProductStatus::Archived {
            return Err(DomainError::conflict("product is already archived"));
        }

        Ok(vec![ProductEvent::ProductArchived(ProductArchived {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_expiry(&self, cmd: &SetProductExpiry) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found("product"));
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_product_id(&cmd.product_id)?;

        if self.status == ProductStatus::Archived {
            return Err(DomainError::invariant(
                "archived products cannot change expiry",
            ));
        }

        if self.expires_at == cmd.expires_at {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::ProductExpiryChanged(ProductExpiryChanged {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id.clone(),
            expires_at: cmd.expires_at,
            occurred_at: cmd.occurred_at,
        })])
    }
}
