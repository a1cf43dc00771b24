use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use salesagent_core::{Aggregate, AggregateRoot};
use salesagent_events::EventRecord;
use salesagent_gam::{build_order_plan, submit_order_plan};
use salesagent_infra::{AdServerError, TenantConfig};
use salesagent_media_buy::{
    ApproveMediaBuy, CreateMediaBuy, MediaBuy, MediaBuyCommand, MediaBuyId, MediaBuyStatus,
    PackageRequest, RecordAdServerOrder, RecordOrderFailure, RejectMediaBuy,
    build_packages_products_map,
};
use salesagent_products::{Product, ProductId};

use super::SalesAgent;
use crate::context::RequestContext;
use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateMediaBuyRequest {
    pub buyer_ref: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub packages: Vec<PackageRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaBuyResponse {
    pub media_buy_id: MediaBuyId,
    pub buyer_ref: String,
    pub status: MediaBuyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub line_item_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    /// Set while an approved buy has no order because submission failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_error: Option<String>,
}

impl From<&MediaBuy> for MediaBuyResponse {
    fn from(media_buy: &MediaBuy) -> Self {
        Self {
            media_buy_id: media_buy.id_typed(),
            buyer_ref: media_buy.buyer_ref().to_string(),
            status: media_buy.status(),
            order_id: media_buy.order_id().map(str::to_string),
            line_item_ids: media_buy.line_item_ids().to_vec(),
            rejection_reason: media_buy.rejection_reason().map(str::to_string),
            order_error: media_buy.order_error().map(str::to_string),
        }
    }
}

impl SalesAgent {
    /// Create a media buy. Tenants without human review get the ad-server
    /// order immediately; the others wait in `pending_approval`.
    ///
    /// Once the buy is stored, a failed order submission is recorded on the
    /// buy and reported in `order_error` rather than returned as an error.
    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id(), buyer_ref = %request.buyer_ref), err)]
    pub async fn create_media_buy(
        &self,
        ctx: &RequestContext,
        request: CreateMediaBuyRequest,
    ) -> Result<MediaBuyResponse, ApiError> {
        let tenant = self.tenant(ctx).await?;

        // Only products a buyer could currently discover can be bought.
        let now = Utc::now();
        let products: Vec<Product> = self
            .load_products(ctx, &request.packages)
            .await?
            .into_iter()
            .filter(|p| p.is_available(now))
            .collect();
        let packages_products = build_packages_products_map(&request.packages, &products)?;

        let media_buy_id = MediaBuyId::new();
        let cmd = MediaBuyCommand::CreateMediaBuy(CreateMediaBuy {
            tenant_id: ctx.tenant_id(),
            media_buy_id,
            principal_id: ctx.principal().principal_id(),
            buyer_ref: request.buyer_ref,
            start_time: request.start_time,
            end_time: request.end_time,
            packages: request.packages,
            packages_products,
            requires_approval: tenant.human_review_required,
            occurred_at: now,
        });

        let mut media_buy = MediaBuy::empty(media_buy_id);
        let events = media_buy.execute(&cmd)?;
        self.stores
            .media_buys
            .append(ctx.tenant_id(), media_buy_id, 0, &events)
            .await?;
        info!(%media_buy_id, status = media_buy.status().as_str(), "media buy created");

        if media_buy.status() == MediaBuyStatus::Approved {
            self.place_order(ctx, &tenant, &mut media_buy, &products)
                .await?;
        }
        Ok(MediaBuyResponse::from(&media_buy))
    }

    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()), err)]
    pub async fn approve_media_buy(
        &self,
        ctx: &RequestContext,
        media_buy_id: MediaBuyId,
    ) -> Result<MediaBuyResponse, ApiError> {
        let tenant = self.tenant(ctx).await?;
        let mut media_buy = self.load_media_buy(ctx, media_buy_id).await?;

        let version = media_buy.version();
        let events = media_buy.execute(&MediaBuyCommand::ApproveMediaBuy(ApproveMediaBuy {
            tenant_id: ctx.tenant_id(),
            media_buy_id,
            occurred_at: Utc::now(),
        }))?;
        self.stores
            .media_buys
            .append(ctx.tenant_id(), media_buy_id, version, &events)
            .await?;
        info!(%media_buy_id, "media buy approved");

        let products = self.load_products(ctx, media_buy.packages()).await?;
        self.place_order(ctx, &tenant, &mut media_buy, &products)
            .await?;
        Ok(MediaBuyResponse::from(&media_buy))
    }

    /// Retry order submission for an approved buy that has no order yet.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()), err)]
    pub async fn submit_media_buy_order(
        &self,
        ctx: &RequestContext,
        media_buy_id: MediaBuyId,
    ) -> Result<MediaBuyResponse, ApiError> {
        let tenant = self.tenant(ctx).await?;
        let mut media_buy = self.load_media_buy(ctx, media_buy_id).await?;
        if !media_buy.awaiting_order() {
            return Err(ApiError::InvalidState(format!(
                "media buy {media_buy_id} is not awaiting an order (status: {})",
                media_buy.status().as_str()
            )));
        }

        let products = self.load_products(ctx, media_buy.packages()).await?;
        self.place_order(ctx, &tenant, &mut media_buy, &products)
            .await?;
        Ok(MediaBuyResponse::from(&media_buy))
    }

    #[instrument(skip(self, ctx, reason), fields(tenant_id = %ctx.tenant_id()), err)]
    pub async fn reject_media_buy(
        &self,
        ctx: &RequestContext,
        media_buy_id: MediaBuyId,
        reason: &str,
    ) -> Result<MediaBuyResponse, ApiError> {
        let mut media_buy = self.load_media_buy(ctx, media_buy_id).await?;

        let version = media_buy.version();
        let events = media_buy.execute(&MediaBuyCommand::RejectMediaBuy(RejectMediaBuy {
            tenant_id: ctx.tenant_id(),
            media_buy_id,
            reason: reason.to_string(),
            occurred_at: Utc::now(),
        }))?;
        self.stores
            .media_buys
            .append(ctx.tenant_id(), media_buy_id, version, &events)
            .await?;
        info!(%media_buy_id, "media buy rejected");

        Ok(MediaBuyResponse::from(&media_buy))
    }

    pub async fn get_media_buy(
        &self,
        ctx: &RequestContext,
        media_buy_id: MediaBuyId,
    ) -> Result<MediaBuyResponse, ApiError> {
        let media_buy = self.load_media_buy(ctx, media_buy_id).await?;
        Ok(MediaBuyResponse::from(&media_buy))
    }

    pub async fn media_buy_history(
        &self,
        ctx: &RequestContext,
        media_buy_id: MediaBuyId,
    ) -> Result<Vec<EventRecord>, ApiError> {
        Ok(self
            .stores
            .media_buys
            .audit_log(ctx.tenant_id(), media_buy_id)
            .await?)
    }

    async fn load_media_buy(
        &self,
        ctx: &RequestContext,
        media_buy_id: MediaBuyId,
    ) -> Result<MediaBuy, ApiError> {
        self.stores
            .media_buys
            .load(ctx.tenant_id(), media_buy_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("media buy {media_buy_id} not found")))
    }

    /// Every distinct product the packages reference that exists in the catalog.
    async fn load_products(
        &self,
        ctx: &RequestContext,
        packages: &[PackageRequest],
    ) -> Result<Vec<Product>, ApiError> {
        let ids: BTreeSet<&ProductId> = packages.iter().map(|p| &p.product_id).collect();
        let mut products = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(product) = self.stores.catalog.load(ctx.tenant_id(), id).await? {
                products.push(product);
            }
        }
        Ok(products)
    }

    /// Submit the order, recording a failure on the buy instead of returning it.
    /// Only a failure to store the outcome is returned.
    async fn place_order(
        &self,
        ctx: &RequestContext,
        tenant: &TenantConfig,
        media_buy: &mut MediaBuy,
        products: &[Product],
    ) -> Result<(), ApiError> {
        let err = match self.submit_order(ctx, tenant, media_buy, products).await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        // The order exists but recording it failed; nothing to mark as failed.
        if !media_buy.awaiting_order() {
            return Err(err);
        }

        let media_buy_id = media_buy.id_typed();
        warn!(%media_buy_id, code = err.code(), error = %err, "order submission failed; media buy stays approved");

        let version = media_buy.version();
        let events = media_buy.execute(&MediaBuyCommand::RecordOrderFailure(RecordOrderFailure {
            tenant_id: ctx.tenant_id(),
            media_buy_id,
            error: err.to_string(),
            occurred_at: Utc::now(),
        }))?;
        self.stores
            .media_buys
            .append(ctx.tenant_id(), media_buy_id, version, &events)
            .await?;
        Ok(())
    }

    /// Create the ad-server order for an approved buy and record it.
    ///
    /// Adapters without an order integration leave the buy approved.
    async fn submit_order(
        &self,
        ctx: &RequestContext,
        tenant: &TenantConfig,
        media_buy: &mut MediaBuy,
        products: &[Product],
    ) -> Result<(), ApiError> {
        let media_buy_id = media_buy.id_typed();
        let target = match self.ad_servers.gam_target(tenant) {
            Ok(target) => target,
            Err(AdServerError::Unsupported(adapter)) => {
                warn!(%media_buy_id, %adapter, "no order integration; media buy stays approved");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let plan = build_order_plan(media_buy, products, &target.advertiser_id)?;
        let client = self.ad_servers.gam_client();
        let created = submit_order_plan(client.as_ref(), &target.network_code, &plan).await?;

        let version = media_buy.version();
        let events = media_buy.execute(&MediaBuyCommand::RecordAdServerOrder(RecordAdServerOrder {
            tenant_id: ctx.tenant_id(),
            media_buy_id,
            order_id: created.order_id,
            line_item_ids: created.line_item_ids,
            occurred_at: Utc::now(),
        }))?;
        self.stores
            .media_buys
            .append(ctx.tenant_id(), media_buy_id, version, &events)
            .await?;
        Ok(())
    }
}
