//! Per-package product metadata consumed by order and line-item construction.
//!
//! The map is built when a media buy is created and stored in serialized form
//! until the buy is approved. Parsing it back is strict: every entry must carry
//! `delivery_type`, because line-item type selection branches on it.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue, json};

use salesagent_products::{DeliveryType, Product, ProductId};

use crate::error::MediaBuyError;
use crate::package::{PackageId, PackageRequest};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageProductEntry {
    pub product_id: ProductId,
    pub implementation_config: JsonValue,
    pub delivery_type: DeliveryType,
}

impl PackageProductEntry {
    pub fn is_guaranteed(&self) -> bool {
        self.delivery_type.is_guaranteed()
    }

    fn to_json(&self) -> JsonValue {
        json!({
            "product_id": self.product_id.as_str(),
            "implementation_config": self.implementation_config,
            "delivery_type": self.delivery_type.as_str(),
        })
    }
}

/// Wire form of an entry before validation.
#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    product_id: Option<ProductId>,
    #[serde(default)]
    implementation_config: JsonValue,
    #[serde(default)]
    delivery_type: Option<DeliveryType>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PackagesProductsMap(BTreeMap<PackageId, PackageProductEntry>);

impl PackagesProductsMap {
    pub fn get(&self, package_id: &PackageId) -> Option<&PackageProductEntry> {
        self.0.get(package_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PackageId, &PackageProductEntry)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, package_id: &PackageId) -> bool {
        self.0.contains_key(package_id)
    }

    pub fn to_json(&self) -> JsonValue {
        let object: JsonMap<String, JsonValue> = self
            .0
            .iter()
            .map(|(package_id, entry)| (package_id.as_str().to_string(), entry.to_json()))
            .collect();
        JsonValue::Object(object)
    }

    /// Parse a stored map. A missing or `null` `delivery_type` is reported as
    /// [`MediaBuyError::MissingDeliveryType`]; it is never defaulted.
    pub fn from_json(value: &JsonValue) -> Result<Self, MediaBuyError> {
        let object = value.as_object().ok_or_else(|| {
            MediaBuyError::MalformedPackagesMap("expected an object keyed by package id".into())
        })?;

        let mut entries = BTreeMap::new();
        for (package_id, raw) in object {
            let raw: RawEntry = serde_json::from_value(raw.clone()).map_err(|e| {
                MediaBuyError::MalformedPackagesMap(format!("package '{package_id}': {e}"))
            })?;

            let product_id = raw.product_id.ok_or_else(|| {
                MediaBuyError::MalformedPackagesMap(format!(
                    "package '{package_id}': missing product_id"
                ))
            })?;
            let delivery_type = raw.delivery_type.ok_or_else(|| {
                MediaBuyError::MissingDeliveryType {
                    package_id: package_id.clone(),
                }
            })?;
            let implementation_config = match raw.implementation_config {
                JsonValue::Null => JsonValue::Object(JsonMap::new()),
                other => other,
            };

            entries.insert(
                PackageId::new(package_id.clone()),
                PackageProductEntry {
                    product_id,
                    implementation_config,
                    delivery_type,
                },
            );
        }

        Ok(Self(entries))
    }
}

impl<'a> IntoIterator for &'a PackagesProductsMap {
    type Item = (&'a PackageId, &'a PackageProductEntry);
    type IntoIter = std::collections::btree_map::Iter<'a, PackageId, PackageProductEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Map each package to its product's id, implementation config and delivery
/// type. Every package must reference a known product and one of that
/// product's pricing options.
pub fn build_packages_products_map<'p, I>(
    packages: &[PackageRequest],
    products: I,
) -> Result<PackagesProductsMap, MediaBuyError>
where
    I: IntoIterator<Item = &'p Product>,
{
    let by_id: HashMap<&ProductId, &Product> =
        products.into_iter().map(|p| (p.id_typed(), p)).collect();

    let mut entries = BTreeMap::new();
    for package in packages {
        let product = by_id.get(&package.product_id).ok_or_else(|| {
            MediaBuyError::UnknownProduct {
                package_id: package.package_id.to_string(),
                product_id: package.product_id.to_string(),
            }
        })?;

        if product.pricing_option(&package.pricing_option_id).is_none() {
            return Err(MediaBuyError::UnknownPricingOption {
                package_id: package.package_id.to_string(),
                pricing_option_id: package.pricing_option_id.clone(),
            });
        }

        let entry = PackageProductEntry {
            product_id: product.id_typed().clone(),
            implementation_config: product.implementation_config().clone(),
            delivery_type: product.delivery_type(),
        };
        if entries.insert(package.package_id.clone(), entry).is_some() {
            return Err(MediaBuyError::DuplicatePackage {
                package_id: package.package_id.to_string(),
            });
        }
    }

    Ok(PackagesProductsMap(entries))
}
