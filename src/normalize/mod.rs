//! Listing normalization: one raw catalog entry in, one canonical [`Product`]
//! out — or a reason why the entry was left behind.

pub mod category;
pub mod price;

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::warn;

use crate::embedder::ImageEncoder;
use crate::product::Product;
use crate::util::env::env_opt;
use category::{category_label, fabric_tags, infer_gender};
use price::parse_price;

/// Why a listing was dropped without being counted as a failure.
///
/// Structurally incomplete listings are skipped quietly; they are distinct
/// from [`Outcome::Invalid`], which marks an unexpected error and is counted
/// against the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    MissingId,
    MissingImage,
    EmptyTitle,
}

impl Skip {
    pub fn as_str(&self) -> &'static str {
        match self {
            Skip::MissingId => "missing external id",
            Skip::MissingImage => "no usable image",
            Skip::EmptyTitle => "empty title",
        }
    }
}

/// Result of normalizing a single raw listing.
#[derive(Debug)]
pub enum Outcome {
    Product(Box<Product>),
    Skipped(Skip),
    Invalid(anyhow::Error),
}

/// Source profile applied to every listing from a catalog.
#[derive(Debug, Clone)]
pub struct NormalizerOptions {
    /// Base joined with each listing's relative `uri` to form the product URL.
    pub base_url: String,
    /// Natural-key component and `id` prefix.
    pub source: String,
    pub brand: String,
    pub currency: String,
    pub country: String,
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self {
            base_url: "https://www.cos.com/en-eu".to_string(),
            source: "scraper".to_string(),
            brand: "COS".to_string(),
            currency: "EUR".to_string(),
            country: "EU".to_string(),
        }
    }
}

impl NormalizerOptions {
    /// Profile with `CATALOG_*` env overrides on top of the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env_opt("CATALOG_BASE_URL").unwrap_or(defaults.base_url),
            source: env_opt("CATALOG_SOURCE").unwrap_or(defaults.source),
            brand: env_opt("CATALOG_BRAND").unwrap_or(defaults.brand),
            currency: env_opt("CATALOG_CURRENCY").unwrap_or(defaults.currency),
            country: env_opt("CATALOG_COUNTRY").unwrap_or(defaults.country),
        }
    }
}

/// Converts raw listings into canonical products and attaches embeddings.
///
/// The encoder is injected so tests can substitute a stub; its model state is
/// shared and read-only, so one normalizer serves a whole run.
pub struct ListingNormalizer {
    options: NormalizerOptions,
    encoder: Arc<dyn ImageEncoder>,
}

impl ListingNormalizer {
    pub fn new(options: NormalizerOptions, encoder: Arc<dyn ImageEncoder>) -> Self {
        Self { options, encoder }
    }

    /// Normalize one raw listing, attaching an embedding when the encoder
    /// succeeds. Embedding failure degrades: the product ships without a
    /// vector rather than being dropped.
    pub async fn normalize(&self, raw: &Value) -> Outcome {
        let outcome = match self.build(raw) {
            Ok(outcome) => outcome,
            Err(err) => return Outcome::Invalid(err),
        };
        let Outcome::Product(mut product) = outcome else {
            return outcome;
        };
        match self.encoder.encode(&product.image_url).await {
            Ok(vector) => product.embedding = Some(vector),
            Err(err) => {
                warn!(id = %product.id, error = %err, "embedding failed; ingesting without vector");
            }
        }
        Outcome::Product(product)
    }

    /// Field extraction without the embedding step. Any error here aborts only
    /// this listing.
    fn build(&self, raw: &Value) -> Result<Outcome> {
        let obj = raw
            .as_object()
            .context("listing is not a JSON object")?;

        let external_id = match obj.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Ok(Outcome::Skipped(Skip::MissingId)),
        };

        let product_url = obj
            .get("uri")
            .and_then(Value::as_str)
            .filter(|uri| !uri.is_empty())
            .map(|uri| {
                format!(
                    "{}/{}",
                    self.options.base_url.trim_end_matches('/'),
                    uri.trim_start_matches('/')
                )
            })
            .unwrap_or_default();

        // Prefer the designated primary image; otherwise the first entry of
        // the images list. Without either the listing is unusable downstream.
        let image_url = obj
            .get("primaryImage")
            .and_then(|img| img.get("src"))
            .and_then(Value::as_str)
            .filter(|src| !src.is_empty())
            .or_else(|| {
                obj.get("images")
                    .and_then(Value::as_array)
                    .and_then(|imgs| imgs.first())
                    .and_then(|img| img.get("src"))
                    .and_then(Value::as_str)
                    .filter(|src| !src.is_empty())
            })
            .map(str::to_string);
        let Some(image_url) = image_url else {
            return Ok(Outcome::Skipped(Skip::MissingImage));
        };

        let title = obj
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if title.is_empty() {
            return Ok(Outcome::Skipped(Skip::EmptyTitle));
        }

        let categories: Vec<String> = obj
            .get("categories")
            .and_then(Value::as_array)
            .map(|cats| {
                cats.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let price = match obj.get("price") {
            Some(Value::String(s)) => parse_price(Some(s.as_str())),
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0).max(0.0),
            _ => parse_price(None),
        };

        let all_images: Vec<&str> = obj
            .get("images")
            .and_then(Value::as_array)
            .map(|imgs| {
                imgs.iter()
                    .filter_map(|img| img.get("src").and_then(Value::as_str))
                    .filter(|src| !src.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let metadata = json!({
            "centra_product_id": obj.get("centraProductId"),
            "sku": obj.get("sku"),
            "product_sku": obj.get("product_sku"),
            "variants_count": obj.get("variantsCount"),
            "is_new": obj.get("isNew").and_then(Value::as_bool).unwrap_or(false),
            "is_on_sale": obj.get("isOnSale").and_then(Value::as_bool).unwrap_or(false),
            "categories": categories,
            "sustainability_composition": obj.get("sustainabilityComposition").cloned().unwrap_or_else(|| json!([])),
            "all_images": all_images,
        });

        let product = Product {
            id: format!("{}_{}", self.options.source, external_id),
            source: self.options.source.clone(),
            product_url,
            affiliate_url: None,
            image_url,
            brand: self.options.brand.clone(),
            title: title.to_string(),
            description: obj
                .get("description")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            category: category_label(obj.get("categoryUri").and_then(Value::as_str)),
            gender: infer_gender(&categories),
            price,
            currency: self.options.currency.clone(),
            metadata,
            size: None,
            second_hand: false,
            embedding: None,
            country: self.options.country.clone(),
            compressed_image_url: None,
            tags: fabric_tags(&categories),
        };
        Ok(Outcome::Product(Box::new(product)))
    }
}
