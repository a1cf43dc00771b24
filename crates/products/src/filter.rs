//! Product filter engine.
//!
//! Every predicate here is pure: it looks only at the product, the buyer's
//! criteria and the tenant's adapter, so discovery can evaluate them from any
//! request context without locking or a database connection.
//!
//! Sub-filters combine with logical AND. An empty criterion never restricts.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use salesagent_channels::{Channel, ChannelCapabilities, normalize_channels};
use salesagent_core::DomainResult;

use crate::country::CountryCode;
use crate::pricing::DeliveryType;
use crate::product::Product;

/// Buyer-supplied discovery filters (`get_products.filters`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub countries: BTreeSet<CountryCode>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub channels: BTreeSet<Channel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_type: Option<DeliveryType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_fixed_price: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub format_ids: BTreeSet<String>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_countries<I, S>(mut self, raw: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.countries = raw
            .into_iter()
            .map(|c| CountryCode::parse(c.as_ref()))
            .collect::<DomainResult<_>>()?;
        Ok(self)
    }

    /// Raw channel tags are normalized (aliases, case) before they are stored.
    pub fn with_channels<I, S>(mut self, raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.channels = normalize_channels(raw);
        self
    }

    pub fn with_delivery_type(mut self, delivery_type: DeliveryType) -> Self {
        self.delivery_type = Some(delivery_type);
        self
    }

    pub fn with_fixed_price(mut self, is_fixed_price: bool) -> Self {
        self.is_fixed_price = Some(is_fixed_price);
        self
    }

    pub fn with_format_ids<I, S>(mut self, format_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.format_ids = format_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_unrestricted(&self) -> bool {
        self.countries.is_empty()
            && self.channels.is_empty()
            && self.delivery_type.is_none()
            && self.is_fixed_price.is_none()
            && self.format_ids.is_empty()
    }
}

/// Global products (no declared countries) match every country filter.
pub fn matches_countries(product: &Product, criteria: &FilterCriteria) -> bool {
    if criteria.countries.is_empty() {
        return true;
    }
    match product.countries() {
        Some(countries) if !countries.is_empty() => {
            !countries.is_disjoint(&criteria.countries)
        }
        _ => true,
    }
}

/// Products without declared channels are judged by the adapter's defaults.
///
/// An adapter with no defaults therefore excludes channel-less products from
/// any channel-restricted request.
pub fn matches_channels<A>(product: &Product, criteria: &FilterCriteria, adapter: &A) -> bool
where
    A: ChannelCapabilities + ?Sized,
{
    if criteria.channels.is_empty() {
        return true;
    }
    match product.channels() {
        Some(channels) if !channels.is_empty() => !channels.is_disjoint(&criteria.channels),
        _ => adapter
            .default_channels()
            .iter()
            .any(|channel| criteria.channels.contains(channel)),
    }
}

pub fn matches_delivery_type(product: &Product, criteria: &FilterCriteria) -> bool {
    criteria
        .delivery_type
        .is_none_or(|wanted| product.delivery_type() == wanted)
}

/// At least one pricing option must have the requested fixed/auction shape.
pub fn matches_pricing(product: &Product, criteria: &FilterCriteria) -> bool {
    match criteria.is_fixed_price {
        None => true,
        Some(wanted) => product
            .pricing_options()
            .iter()
            .any(|option| option.is_fixed == wanted),
    }
}

pub fn matches_format_ids(product: &Product, criteria: &FilterCriteria) -> bool {
    if criteria.format_ids.is_empty() {
        return true;
    }
    product
        .format_ids()
        .iter()
        .any(|format_id| criteria.format_ids.contains(format_id))
}

/// Combined predicate: every sub-filter must pass.
pub fn matches<A>(product: &Product, criteria: &FilterCriteria, adapter: &A) -> bool
where
    A: ChannelCapabilities + ?Sized,
{
    matches_countries(product, criteria)
        && matches_channels(product, criteria, adapter)
        && matches_delivery_type(product, criteria)
        && matches_pricing(product, criteria)
        && matches_format_ids(product, criteria)
}

/// Criteria bound to one tenant's adapter, for filtering a catalog listing.
#[derive(Debug)]
pub struct ProductFilter<'a, A: ?Sized> {
    criteria: &'a FilterCriteria,
    adapter: &'a A,
}

impl<'a, A> ProductFilter<'a, A>
where
    A: ChannelCapabilities + ?Sized,
{
    pub fn new(criteria: &'a FilterCriteria, adapter: &'a A) -> Self {
        Self { criteria, adapter }
    }

    pub fn matches(&self, product: &Product) -> bool {
        matches(product, self.criteria, self.adapter)
    }

    /// Keep matching products, preserving catalog order.
    pub fn apply<'p, I>(&self, products: I) -> Vec<&'p Product>
    where
        I: IntoIterator<Item = &'p Product>,
    {
        products.into_iter().filter(|p| self.matches(p)).collect()
    }
}
