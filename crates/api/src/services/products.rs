use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{info, instrument};

use salesagent_adcp::{GetProductsResponse, ProductResponse};
use salesagent_channels::normalize_channels;
use salesagent_core::{Aggregate, AggregateRoot, DomainResult};
use salesagent_products::{
    ArchiveProduct, CountryCode, DeliveryType, FilterCriteria, PricingOption, Product,
    ProductCommand, ProductFilter, ProductId, PublishProduct, SetProductExpiry,
};

use super::SalesAgent;
use crate::context::RequestContext;
use crate::error::ApiError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GetProductsRequest {
    #[serde(default)]
    pub filters: FilterCriteria,
}

/// Catalog entry as submitted by a publisher admin. Countries and channels
/// arrive as raw strings and are normalized here.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PublishProductRequest {
    pub product_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub format_ids: Vec<String>,
    pub delivery_type: DeliveryType,
    pub pricing_options: Vec<PricingOption>,
    #[serde(default)]
    pub countries: Option<Vec<String>>,
    #[serde(default)]
    pub channels: Option<Vec<String>>,
    #[serde(default)]
    pub implementation_config: JsonValue,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl SalesAgent {
    /// Available products matching the filters, shaped for the caller's
    /// protocol version.
    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id(), compat = ?ctx.compat()), err)]
    pub async fn get_products(
        &self,
        ctx: &RequestContext,
        request: &GetProductsRequest,
    ) -> Result<GetProductsResponse, ApiError> {
        let tenant = self.tenant(ctx).await?;
        let catalog = self.stores.catalog.list(ctx.tenant_id()).await?;

        let now = Utc::now();
        let filter = ProductFilter::new(&request.filters, &tenant.adapter);
        let matched = filter.apply(catalog.iter().filter(|p| p.is_available(now)));

        info!(
            catalog_size = catalog.len(),
            matched = matched.len(),
            "products filtered"
        );
        Ok(GetProductsResponse::build(
            matched,
            &tenant.adapter,
            ctx.compat(),
        ))
    }

    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id(), product_id = %request.product_id), err)]
    pub async fn publish_product(
        &self,
        ctx: &RequestContext,
        request: PublishProductRequest,
    ) -> Result<ProductResponse, ApiError> {
        let tenant = self.tenant(ctx).await?;

        let countries = request
            .countries
            .map(|raw| {
                raw.iter()
                    .map(|c| CountryCode::parse(c))
                    .collect::<DomainResult<BTreeSet<_>>>()
            })
            .transpose()?;
        let channels = request.channels.map(normalize_channels);

        let product_id = ProductId::new(request.product_id);
        let cmd = PublishProduct {
            tenant_id: ctx.tenant_id(),
            product_id: product_id.clone(),
            name: request.name,
            description: request.description,
            format_ids: request.format_ids,
            delivery_type: request.delivery_type,
            pricing_options: request.pricing_options,
            countries,
            channels,
            implementation_config: request.implementation_config,
            expires_at: request.expires_at,
            occurred_at: Utc::now(),
        };

        let mut product = Product::empty(product_id.clone());
        let events = product.execute(&ProductCommand::PublishProduct(cmd))?;
        self.stores
            .catalog
            .append(ctx.tenant_id(), &product_id, 0, &events)
            .await?;

        Ok(ProductResponse::build(&product, &tenant.adapter, ctx.compat()))
    }

    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()), err)]
    pub async fn archive_product(
        &self,
        ctx: &RequestContext,
        product_id: &ProductId,
    ) -> Result<(), ApiError> {
        let cmd = ProductCommand::ArchiveProduct(ArchiveProduct {
            tenant_id: ctx.tenant_id(),
            product_id: product_id.clone(),
            occurred_at: Utc::now(),
        });
        self.update_product(ctx, product_id, &cmd).await
    }

    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id()), err)]
    pub async fn set_product_expiry(
        &self,
        ctx: &RequestContext,
        product_id: &ProductId,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), ApiError> {
        let cmd = ProductCommand::SetProductExpiry(SetProductExpiry {
            tenant_id: ctx.tenant_id(),
            product_id: product_id.clone(),
            expires_at,
            occurred_at: Utc::now(),
        });
        self.update_product(ctx, product_id, &cmd).await
    }

    async fn update_product(
        &self,
        ctx: &RequestContext,
        product_id: &ProductId,
        cmd: &ProductCommand,
    ) -> Result<(), ApiError> {
        let mut product = self
            .stores
            .catalog
            .load(ctx.tenant_id(), product_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("product '{product_id}' not found")))?;

        let version = product.version();
        let events = product.execute(cmd)?;
        self.stores
            .catalog
            .append(ctx.tenant_id(), product_id, version, &events)
            .await?;
        Ok(())
    }
}
