use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gender bucket used by downstream search filters.
///
/// Defaults to `Woman`; listings are only bucketed as `Man` when a category
/// label carries a men's token. Stored as `"MAN"` / `"WOMAN"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Man,
    #[default]
    Woman,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Man => "MAN",
            Gender::Woman => "WOMAN",
        }
    }
}

/// Canonical product record matching the store schema.
///
/// Constructed transiently by the normalizer from one raw listing, optionally
/// enriched with an image embedding, then persisted by the sink. The
/// `(source, product_url)` pair is the natural key used for upsert matching;
/// `created_at` is stamped by the sink at write time and not carried here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Display identifier, `"{source}_{external_id}"`.
    pub id: String,
    pub source: String,
    pub product_url: String,
    pub affiliate_url: Option<String>,
    pub image_url: String,
    pub brand: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub gender: Gender,
    pub price: f64,
    pub currency: String,
    /// Opaque pass-through blob (SKUs, sale flags, all image URLs). Never
    /// interpreted by the pipeline.
    pub metadata: Value,
    pub size: Option<String>,
    pub second_hand: bool,
    /// Fixed-length visual embedding, or `None` when generation failed.
    pub embedding: Option<Vec<f32>>,
    pub country: String,
    pub compressed_image_url: Option<String>,
    /// Known fabric keywords found in category labels; `None` when empty so
    /// the stored field reads as absent rather than an empty array.
    pub tags: Option<Vec<String>>,
}

impl Product {
    /// The natural key identifying this product across ingestion runs.
    pub fn key(&self) -> (&str, &str) {
        (&self.source, &self.product_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Gender::Man).unwrap(), "\"MAN\"");
        assert_eq!(serde_json::to_string(&Gender::Woman).unwrap(), "\"WOMAN\"");
        assert_eq!(Gender::default(), Gender::Woman);
    }
}
