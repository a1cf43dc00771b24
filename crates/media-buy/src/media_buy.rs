use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use salesagent_core::{Aggregate, AggregateRoot, DomainError, PrincipalId, TenantId};
use salesagent_events::Event;

use crate::error::MediaBuyError;
use crate::package::PackageRequest;
use crate::packages_map::PackagesProductsMap;

/// Media buy identifier (UUIDv7).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaBuyId(Uuid);

impl MediaBuyId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MediaBuyId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for MediaBuyId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for MediaBuyId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::invalid_id("MediaBuyId", e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaBuyStatus {
    PendingApproval,
    Approved,
    Rejected,
    /// The ad-server order exists.
    Active,
}

impl MediaBuyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaBuyStatus::PendingApproval => "pending_approval",
            MediaBuyStatus::Approved => "approved",
            MediaBuyStatus::Rejected => "rejected",
            MediaBuyStatus::Active => "active",
        }
    }
}

/// Aggregate root: MediaBuy.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaBuy {
    id: MediaBuyId,
    tenant_id: Option<TenantId>,
    principal_id: Option<PrincipalId>,
    buyer_ref: String,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    packages: Vec<PackageRequest>,
    /// Stored serialized; parsed strictly when an order is built.
    packages_products: JsonValue,
    status: MediaBuyStatus,
    rejection_reason: Option<String>,
    order_id: Option<String>,
    line_item_ids: Vec<String>,
    /// Last ad-server submission error; cleared once an order is recorded.
    order_error: Option<String>,
    version: u64,
    created: bool,
}

impl MediaBuy {
    /// Create an empty, not-yet-created instance for rehydration.
    pub fn empty(id: MediaBuyId) -> Self {
        Self {
            id,
            tenant_id: None,
            principal_id: None,
            buyer_ref: String::new(),
            start_time: None,
            end_time: None,
            packages: Vec::new(),
            packages_products: JsonValue::Object(Default::default()),
            status: MediaBuyStatus::PendingApproval,
            rejection_reason: None,
            order_id: None,
            line_item_ids: Vec::new(),
            order_error: None,
            version: 0,
            created: false,
        }
    }

    pub fn from_events<'a>(
        id: MediaBuyId,
        events: impl IntoIterator<Item = &'a MediaBuyEvent>,
    ) -> Self {
        let mut media_buy = MediaBuy::empty(id);
        for event in events {
            media_buy.apply(event);
        }
        media_buy
    }

    pub fn id_typed(&self) -> MediaBuyId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn principal_id(&self) -> Option<PrincipalId> {
        self.principal_id
    }

    pub fn buyer_ref(&self) -> &str {
        &self.buyer_ref
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn packages(&self) -> &[PackageRequest] {
        &self.packages
    }

    pub fn status(&self) -> MediaBuyStatus {
        self.status
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn order_id(&self) -> Option<&str> {
        self.order_id.as_deref()
    }

    pub fn line_item_ids(&self) -> &[String] {
        &self.line_item_ids
    }

    pub fn order_error(&self) -> Option<&str> {
        self.order_error.as_deref()
    }

    /// Approved, with no ad-server order yet.
    pub fn awaiting_order(&self) -> bool {
        self.status == MediaBuyStatus::Approved && self.order_id.is_none()
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    /// Parse the stored packages-to-products map.
    pub fn packages_products(&self) -> Result<PackagesProductsMap, MediaBuyError> {
        PackagesProductsMap::from_json(&self.packages_products)
    }
}

impl AggregateRoot for MediaBuy {
    type Id = MediaBuyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateMediaBuy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateMediaBuy {
    pub tenant_id: TenantId,
    pub media_buy_id: MediaBuyId,
    pub principal_id: PrincipalId,
    pub buyer_ref: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub packages: Vec<PackageRequest>,
    pub packages_products: PackagesProductsMap,
    /// Tenant requires human review before the order is created.
    pub requires_approval: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveMediaBuy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveMediaBuy {
    pub tenant_id: TenantId,
    pub media_buy_id: MediaBuyId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectMediaBuy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectMediaBuy {
    pub tenant_id: TenantId,
    pub media_buy_id: MediaBuyId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordAdServerOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordAdServerOrder {
    pub tenant_id: TenantId,
    pub media_buy_id: MediaBuyId,
    pub order_id: String,
    pub line_item_ids: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordOrderFailure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOrderFailure {
    pub tenant_id: TenantId,
    pub media_buy_id: MediaBuyId,
    pub error: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MediaBuyCommand {
    CreateMediaBuy(CreateMediaBuy),
    ApproveMediaBuy(ApproveMediaBuy),
    RejectMediaBuy(RejectMediaBuy),
    RecordAdServerOrder(RecordAdServerOrder),
    RecordOrderFailure(RecordOrderFailure),
}

/// Event: MediaBuyCreated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaBuyCreated {
    pub tenant_id: TenantId,
    pub media_buy_id: MediaBuyId,
    pub principal_id: PrincipalId,
    pub buyer_ref: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub packages: Vec<PackageRequest>,
    pub packages_products: JsonValue,
    pub status: MediaBuyStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MediaBuyApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaBuyApproved {
    pub tenant_id: TenantId,
    pub media_buy_id: MediaBuyId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MediaBuyRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaBuyRejected {
    pub tenant_id: TenantId,
    pub media_buy_id: MediaBuyId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AdServerOrderRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdServerOrderRecorded {
    pub tenant_id: TenantId,
    pub media_buy_id: MediaBuyId,
    pub order_id: String,
    pub line_item_ids: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AdServerOrderFailed. The buy stays approved and can be resubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdServerOrderFailed {
    pub tenant_id: TenantId,
    pub media_buy_id: MediaBuyId,
    pub error: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MediaBuyEvent {
    MediaBuyCreated(MediaBuyCreated),
    MediaBuyApproved(MediaBuyApproved),
    MediaBuyRejected(MediaBuyRejected),
    AdServerOrderRecorded(AdServerOrderRecorded),
    AdServerOrderFailed(AdServerOrderFailed),
}

impl Event for MediaBuyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MediaBuyEvent::MediaBuyCreated(_) => "media_buy.created",
            MediaBuyEvent::MediaBuyApproved(_) => "media_buy.approved",
            MediaBuyEvent::MediaBuyRejected(_) => "media_buy.rejected",
            MediaBuyEvent::AdServerOrderRecorded(_) => "media_buy.order_recorded",
            MediaBuyEvent::AdServerOrderFailed(_) => "media_buy.order_failed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            MediaBuyEvent::MediaBuyCreated(e) => e.occurred_at,
            MediaBuyEvent::MediaBuyApproved(e) => e.occurred_at,
            MediaBuyEvent::MediaBuyRejected(e) => e.occurred_at,
            MediaBuyEvent::AdServerOrderRecorded(e) => e.occurred_at,
            MediaBuyEvent::AdServerOrderFailed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for MediaBuy {
    type Command = MediaBuyCommand;
    type Event = MediaBuyEvent;
    type Error = MediaBuyError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            MediaBuyEvent::MediaBuyCreated(e) => {
                self.id = e.media_buy_id;
                self.tenant_id = Some(e.tenant_id);
                self.principal_id = Some(e.principal_id);
                self.buyer_ref = e.buyer_ref.clone();
                self.start_time = Some(e.start_time);
                self.end_time = Some(e.end_time);
                self.packages = e.packages.clone();
                self.packages_products = e.packages_products.clone();
                self.status = e.status;
                self.created = true;
            }
            MediaBuyEvent::MediaBuyApproved(_) => {
                self.status = MediaBuyStatus::Approved;
            }
            MediaBuyEvent::MediaBuyRejected(e) => {
                self.status = MediaBuyStatus::Rejected;
                self.rejection_reason = Some(e.reason.clone());
            }
            MediaBuyEvent::AdServerOrderRecorded(e) => {
                self.status = MediaBuyStatus::Active;
                self.order_id = Some(e.order_id.clone());
                self.line_item_ids = e.line_item_ids.clone();
                self.order_error = None;
            }
            MediaBuyEvent::AdServerOrderFailed(e) => {
                self.order_error = Some(e.error.clone());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            MediaBuyCommand::CreateMediaBuy(cmd) => self.handle_create(cmd),
            MediaBuyCommand::ApproveMediaBuy(cmd) => self.handle_approve(cmd),
            MediaBuyCommand::RejectMediaBuy(cmd) => self.handle_reject(cmd),
            MediaBuyCommand::RecordAdServerOrder(cmd) => self.handle_record_order(cmd),
            MediaBuyCommand::RecordOrderFailure(cmd) => self.handle_record_failure(cmd),
        }
    }
}

impl MediaBuy {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::tenant_mismatch("media buy", tenant_id));
        }
        Ok(())
    }

    fn ensure_media_buy_id(&self, media_buy_id: MediaBuyId) -> Result<(), DomainError> {
        if self.id != media_buy_id {
            return Err(DomainError::invariant("media_buy_id mismatch"));
        }
        Ok(())
    }

    fn ensure_existing(&self, tenant_id: TenantId, media_buy_id: MediaBuyId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("media buy"));
        }
        self.ensure_tenant(tenant_id)?;
        self.ensure_media_buy_id(media_buy_id)
    }

    fn handle_create(&self, cmd: &CreateMediaBuy) -> Result<Vec<MediaBuyEvent>, MediaBuyError> {
        if self.created {
            return Err(DomainError::conflict("media buy already exists").into());
        }
        self.ensure_media_buy_id(cmd.media_buy_id)?;

        if cmd.buyer_ref.trim().is_empty() {
            return Err(DomainError::validation("buyer_ref cannot be empty").into());
        }
        if cmd.end_time <= cmd.start_time {
            return Err(DomainError::validation("end_time must be after start_time").into());
        }
        if cmd.packages.is_empty() {
            return Err(DomainError::validation("a media buy needs at least one package").into());
        }

        let mut seen = BTreeSet::new();
        for package in &cmd.packages {
            package.validate()?;
            if !seen.insert(&package.package_id) {
                return Err(MediaBuyError::DuplicatePackage {
                    package_id: package.package_id.to_string(),
                });
            }
            if !cmd.packages_products.contains(&package.package_id) {
                return Err(DomainError::invariant(format!(
                    "package '{}' has no product metadata",
                    package.package_id
                ))
                .into());
            }
        }
        if cmd.packages_products.len() != cmd.packages.len() {
            return Err(DomainError::invariant(
                "product metadata references packages not in the media buy",
            )
            .into());
        }

        let status = if cmd.requires_approval {
            MediaBuyStatus::PendingApproval
        } else {
            MediaBuyStatus::Approved
        };

        Ok(vec![MediaBuyEvent::MediaBuyCreated(MediaBuyCreated {
            tenant_id: cmd.tenant_id,
            media_buy_id: cmd.media_buy_id,
            principal_id: cmd.principal_id,
            buyer_ref: cmd.buyer_ref.trim().to_string(),
            start_time: cmd.start_time,
            end_time: cmd.end_time,
            packages: cmd.packages.clone(),
            packages_products: cmd.packages_products.to_json(),
            status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveMediaBuy) -> Result<Vec<MediaBuyEvent>, MediaBuyError> {
        self.ensure_existing(cmd.tenant_id, cmd.media_buy_id)?;

        if self.status != MediaBuyStatus::PendingApproval {
            return Err(DomainError::invariant(format!(
                "only pending media buys can be approved (status: {})",
                self.status.as_str()
            ))
            .into());
        }

        // Approval leads straight to order construction; refuse it while the
        // stored metadata cannot drive line-item selection.
        self.packages_products()?;

        Ok(vec![MediaBuyEvent::MediaBuyApproved(MediaBuyApproved {
            tenant_id: cmd.tenant_id,
            media_buy_id: cmd.media_buy_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectMediaBuy) -> Result<Vec<MediaBuyEvent>, MediaBuyError> {
        self.ensure_existing(cmd.tenant_id, cmd.media_buy_id)?;

        if self.status != MediaBuyStatus::PendingApproval {
            return Err(DomainError::invariant(format!(
                "only pending media buys can be rejected (status: {})",
                self.status.as_str()
            ))
            .into());
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("rejection reason cannot be empty").into());
        }

        Ok(vec![MediaBuyEvent::MediaBuyRejected(MediaBuyRejected {
            tenant_id: cmd.tenant_id,
            media_buy_id: cmd.media_buy_id,
            reason: cmd.reason.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_order(
        &self,
        cmd: &RecordAdServerOrder,
    ) -> Result<Vec<MediaBuyEvent>, MediaBuyError> {
        self.ensure_existing(cmd.tenant_id, cmd.media_buy_id)?;

        if self.status != MediaBuyStatus::Approved {
            return Err(DomainError::invariant(format!(
                "an order can only be recorded for an approved media buy (status: {})",
                self.status.as_str()
            ))
            .into());
        }
        if cmd.order_id.trim().is_empty() {
            return Err(DomainError::validation("order_id cannot be empty").into());
        }

        Ok(vec![MediaBuyEvent::AdServerOrderRecorded(AdServerOrderRecorded {
            tenant_id: cmd.tenant_id,
            media_buy_id: cmd.media_buy_id,
            order_id: cmd.order_id.clone(),
            line_item_ids: cmd.line_item_ids.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_failure(
        &self,
        cmd: &RecordOrderFailure,
    ) -> Result<Vec<MediaBuyEvent>, MediaBuyError> {
        self.ensure_existing(cmd.tenant_id, cmd.media_buy_id)?;

        if !self.awaiting_order() {
            return Err(DomainError::invariant(format!(
                "order failures are only recorded while an order is outstanding (status: {})",
                self.status.as_str()
            ))
            .into());
        }

        Ok(vec![MediaBuyEvent::AdServerOrderFailed(AdServerOrderFailed {
            tenant_id: cmd.tenant_id,
            media_buy_id: cmd.media_buy_id,
            error: cmd.error.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageId;
    use crate::packages_map::build_packages_products_map;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use salesagent_products::{
        DeliveryType, PricingModel, PricingOption, Product, ProductId, PublishProduct,
    };
    use serde_json::json;

    struct Fixture {
        tenant_id: TenantId,
        media_buy_id: MediaBuyId,
        packages: Vec<PackageRequest>,
        packages_products: PackagesProductsMap,
    }

    fn fixture() -> Fixture {
        let tenant_id = TenantId::new();
        let product = Product::publish(PublishProduct {
            tenant_id,
            product_id: ProductId::new("prod_1"),
            name: "Run of site".to_string(),
            description: String::new(),
            format_ids: Vec::new(),
            delivery_type: DeliveryType::Guaranteed,
            pricing_options: vec![PricingOption::fixed(
                "cpm_fixed",
                PricingModel::Cpm,
                Decimal::new(10, 0),
                "USD",
            )],
            countries: None,
            channels: None,
            implementation_config: json!({}),
            expires_at: None,
            occurred_at: Utc::now(),
        })
        .unwrap();
        let packages = vec![PackageRequest {
            package_id: PackageId::new("pkg_1"),
            product_id: ProductId::new("prod_1"),
            pricing_option_id: "cpm_fixed".to_string(),
            budget: Decimal::new(1000, 0),
            impressions: Some(100_000),
            format_ids: Vec::new(),
        }];
        let packages_products = build_packages_products_map(&packages, [&product]).unwrap();
        Fixture {
            tenant_id,
            media_buy_id: MediaBuyId::new(),
            packages,
            packages_products,
        }
    }

    fn create_cmd(f: &Fixture, requires_approval: bool) -> CreateMediaBuy {
        let start = Utc::now();
        CreateMediaBuy {
            tenant_id: f.tenant_id,
            media_buy_id: f.media_buy_id,
            principal_id: PrincipalId::new(),
            buyer_ref: "campaign-42".to_string(),
            start_time: start,
            end_time: start + Duration::days(30),
            packages: f.packages.clone(),
            packages_products: f.packages_products.clone(),
            requires_approval,
            occurred_at: start,
        }
    }

    fn created(f: &Fixture, requires_approval: bool) -> MediaBuy {
        let mut media_buy = MediaBuy::empty(f.media_buy_id);
        media_buy
            .execute(&MediaBuyCommand::CreateMediaBuy(create_cmd(f, requires_approval)))
            .unwrap();
        media_buy
    }

    fn approve_cmd(f: &Fixture) -> MediaBuyCommand {
        MediaBuyCommand::ApproveMediaBuy(ApproveMediaBuy {
            tenant_id: f.tenant_id,
            media_buy_id: f.media_buy_id,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn create_with_review_starts_pending() {
        let f = fixture();
        let media_buy = created(&f, true);
        assert_eq!(media_buy.status(), MediaBuyStatus::PendingApproval);
        assert_eq!(media_buy.version(), 1);
        assert_eq!(media_buy.packages_products().unwrap(), f.packages_products);
    }

    #[test]
    fn create_without_review_is_approved_immediately() {
        let f = fixture();
        assert_eq!(created(&f, false).status(), MediaBuyStatus::Approved);
    }

    #[test]
    fn create_rejects_inverted_flight() {
        let f = fixture();
        let mut cmd = create_cmd(&f, true);
        cmd.end_time = cmd.start_time - Duration::hours(1);
        let err = MediaBuy::empty(f.media_buy_id)
            .handle(&MediaBuyCommand::CreateMediaBuy(cmd))
            .unwrap_err();
        assert!(matches!(err, MediaBuyError::Domain(DomainError::Validation(_))));
    }

    #[test]
    fn create_rejects_package_without_metadata() {
        let f = fixture();
        let mut cmd = create_cmd(&f, true);
        cmd.packages_products = PackagesProductsMap::default();
        let err = MediaBuy::empty(f.media_buy_id)
            .handle(&MediaBuyCommand::CreateMediaBuy(cmd))
            .unwrap_err();
        assert!(matches!(err, MediaBuyError::Domain(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn approve_then_record_order_activates() {
        let f = fixture();
        let mut media_buy = created(&f, true);
        media_buy.execute(&approve_cmd(&f)).unwrap();
        assert_eq!(media_buy.status(), MediaBuyStatus::Approved);

        media_buy
            .execute(&MediaBuyCommand::RecordAdServerOrder(RecordAdServerOrder {
                tenant_id: f.tenant_id,
                media_buy_id: f.media_buy_id,
                order_id: "gam-order-1".to_string(),
                line_item_ids: vec!["li-1".to_string()],
                occurred_at: Utc::now(),
            }))
            .unwrap();
        assert_eq!(media_buy.status(), MediaBuyStatus::Active);
        assert_eq!(media_buy.order_id(), Some("gam-order-1"));
    }

    #[test]
    fn failed_submission_keeps_buy_approved_until_order_recorded() {
        let f = fixture();
        let mut media_buy = created(&f, false);
        media_buy
            .execute(&MediaBuyCommand::RecordOrderFailure(RecordOrderFailure {
                tenant_id: f.tenant_id,
                media_buy_id: f.media_buy_id,
                error: "ad server request failed: timeout".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        assert_eq!(media_buy.status(), MediaBuyStatus::Approved);
        assert!(media_buy.awaiting_order());
        assert_eq!(media_buy.order_error(), Some("ad server request failed: timeout"));

        media_buy
            .execute(&MediaBuyCommand::RecordAdServerOrder(RecordAdServerOrder {
                tenant_id: f.tenant_id,
                media_buy_id: f.media_buy_id,
                order_id: "gam-order-7".to_string(),
                line_item_ids: vec!["li-1".to_string()],
                occurred_at: Utc::now(),
            }))
            .unwrap();
        assert_eq!(media_buy.status(), MediaBuyStatus::Active);
        assert_eq!(media_buy.order_error(), None);
        assert!(!media_buy.awaiting_order());
    }

    #[test]
    fn order_failure_is_refused_while_pending() {
        let f = fixture();
        let media_buy = created(&f, true);
        let cmd = MediaBuyCommand::RecordOrderFailure(RecordOrderFailure {
            tenant_id: f.tenant_id,
            media_buy_id: f.media_buy_id,
            error: "boom".to_string(),
            occurred_at: Utc::now(),
        });
        assert!(media_buy.handle(&cmd).is_err());
    }

    #[test]
    fn approving_twice_is_rejected() {
        let f = fixture();
        let mut media_buy = created(&f, true);
        media_buy.execute(&approve_cmd(&f)).unwrap();
        assert!(media_buy.handle(&approve_cmd(&f)).is_err());
    }

    #[test]
    fn approving_in_another_tenant_is_rejected() {
        let f = fixture();
        let media_buy = created(&f, true);
        let cmd = MediaBuyCommand::ApproveMediaBuy(ApproveMediaBuy {
            tenant_id: TenantId::new(),
            media_buy_id: f.media_buy_id,
            occurred_at: Utc::now(),
        });
        assert!(matches!(
            media_buy.handle(&cmd),
            Err(MediaBuyError::Domain(DomainError::TenantMismatch { entity: "media buy", .. }))
        ));
    }

    #[test]
    fn approving_stored_buy_without_delivery_type_fails() {
        let f = fixture();
        let start = Utc::now();
        let legacy = MediaBuyEvent::MediaBuyCreated(MediaBuyCreated {
            tenant_id: f.tenant_id,
            media_buy_id: f.media_buy_id,
            principal_id: PrincipalId::new(),
            buyer_ref: "legacy".to_string(),
            start_time: start,
            end_time: start + Duration::days(7),
            packages: f.packages.clone(),
            packages_products: json!({
                "pkg_1": { "product_id": "prod_1", "implementation_config": {} }
            }),
            status: MediaBuyStatus::PendingApproval,
            occurred_at: start,
        });
        let media_buy = MediaBuy::from_events(f.media_buy_id, [&legacy]);

        assert_eq!(
            media_buy.handle(&approve_cmd(&f)).unwrap_err(),
            MediaBuyError::MissingDeliveryType {
                package_id: "pkg_1".to_string()
            }
        );
    }

    #[test]
    fn reject_records_reason() {
        let f = fixture();
        let mut media_buy = created(&f, true);
        media_buy
            .execute(&MediaBuyCommand::RejectMediaBuy(RejectMediaBuy {
                tenant_id: f.tenant_id,
                media_buy_id: f.media_buy_id,
                reason: " budget too low ".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        assert_eq!(media_buy.status(), MediaBuyStatus::Rejected);
        assert_eq!(media_buy.rejection_reason(), Some("budget too low"));
    }

    #[test]
    fn cannot_record_order_while_pending() {
        let f = fixture();
        let media_buy = created(&f, true);
        let cmd = MediaBuyCommand::RecordAdServerOrder(RecordAdServerOrder {
            tenant_id: f.tenant_id,
            media_buy_id: f.media_buy_id,
            order_id: "gam-order-1".to_string(),
            line_item_ids: Vec::new(),
            occurred_at: Utc::now(),
        });
        assert!(media_buy.handle(&cmd).is_err());
    }

    #[test]
    fn events_have_stable_types() {
        let f = fixture();
        let mut media_buy = MediaBuy::empty(f.media_buy_id);
        let events = media_buy
            .execute(&MediaBuyCommand::CreateMediaBuy(create_cmd(&f, true)))
            .unwrap();
        assert_eq!(events[0].event_type(), "media_buy.created");
    }
}
