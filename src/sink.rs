//! Product persistence with upsert-by-natural-key semantics.
//!
//! Each record commits independently: one bad row is counted and the rest of
//! the batch still lands. The sink reports a single success counter whether a
//! write inserted a fresh row or replaced an existing one — the store's
//! response does not reliably disambiguate the two.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use pgvector::Vector;
use sqlx::types::Json;
use tracing::{info, warn};

use crate::db::Db;
use crate::product::Product;

/// Per-batch (and, merged, per-run) write tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl IngestSummary {
    pub fn absorb(&mut self, other: IngestSummary) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
    }
}

impl fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "succeeded={} failed={}", self.succeeded, self.failed)
    }
}

/// Persists canonical products, write-or-replace on `(source, product_url)`.
#[async_trait]
pub trait ProductSink: Send + Sync {
    /// Upsert every product, folding per-record outcomes into a tally.
    /// Never fails as a whole; record-level errors land in `failed`.
    async fn upsert(&self, products: &[Product]) -> IngestSummary;
}

#[async_trait]
impl<T: ProductSink + ?Sized> ProductSink for std::sync::Arc<T> {
    async fn upsert(&self, products: &[Product]) -> IngestSummary {
        (**self).upsert(products).await
    }
}

/// Postgres sink writing to the `products` table, embedding column backed by
/// pgvector.
pub struct PgProductSink {
    db: Db,
}

impl PgProductSink {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Create the vector extension and the `products` table when missing.
    /// `dim` fixes the embedding column width to the encoder's output.
    pub async fn ensure_schema(&self, dim: usize) -> Result<()> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .persistent(false)
            .execute(&self.db.pool)
            .await?;
        let create = format!(
            "CREATE TABLE IF NOT EXISTS products (\
                id TEXT NOT NULL, \
                source TEXT NOT NULL, \
                product_url TEXT NOT NULL, \
                affiliate_url TEXT, \
                image_url TEXT NOT NULL, \
                brand TEXT, \
                title TEXT NOT NULL, \
                description TEXT, \
                category TEXT, \
                gender TEXT NOT NULL, \
                price DOUBLE PRECISION NOT NULL DEFAULT 0, \
                currency TEXT NOT NULL, \
                metadata JSONB, \
                size TEXT, \
                second_hand BOOLEAN NOT NULL DEFAULT FALSE, \
                embedding vector({dim}), \
                country TEXT, \
                compressed_image_url TEXT, \
                tags TEXT[], \
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(), \
                UNIQUE (source, product_url)\
            )"
        );
        sqlx::query(&create)
            .persistent(false)
            .execute(&self.db.pool)
            .await?;
        info!(dim, "products schema ensured");
        Ok(())
    }

    async fn upsert_one(&self, product: &Product) -> Result<()> {
        sqlx::query(
            "INSERT INTO products (\
                id, source, product_url, affiliate_url, image_url, brand, title, \
                description, category, gender, price, currency, metadata, size, \
                second_hand, embedding, country, compressed_image_url, tags, created_at\
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20) \
            ON CONFLICT (source, product_url) DO UPDATE SET \
                id=EXCLUDED.id, affiliate_url=EXCLUDED.affiliate_url, \
                image_url=EXCLUDED.image_url, brand=EXCLUDED.brand, \
                title=EXCLUDED.title, description=EXCLUDED.description, \
                category=EXCLUDED.category, gender=EXCLUDED.gender, \
                price=EXCLUDED.price, currency=EXCLUDED.currency, \
                metadata=EXCLUDED.metadata, size=EXCLUDED.size, \
                second_hand=EXCLUDED.second_hand, embedding=EXCLUDED.embedding, \
                country=EXCLUDED.country, \
                compressed_image_url=EXCLUDED.compressed_image_url, \
                tags=EXCLUDED.tags, created_at=EXCLUDED.created_at",
        )
        .persistent(false)
        .bind(&product.id)
        .bind(&product.source)
        .bind(&product.product_url)
        .bind(&product.affiliate_url)
        .bind(&product.image_url)
        .bind(&product.brand)
        .bind(&product.title)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.gender.as_str())
        .bind(product.price)
        .bind(&product.currency)
        .bind(Json(&product.metadata))
        .bind(&product.size)
        .bind(product.second_hand)
        .bind(product.embedding.clone().map(Vector::from))
        .bind(&product.country)
        .bind(&product.compressed_image_url)
        .bind(&product.tags)
        .bind(Utc::now())
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ProductSink for PgProductSink {
    async fn upsert(&self, products: &[Product]) -> IngestSummary {
        let mut tally = IngestSummary::default();
        for product in products {
            match self.upsert_one(product).await {
                Ok(()) => tally.succeeded += 1,
                Err(err) => {
                    tally.failed += 1;
                    warn!(id = %product.id, error = %err, "product upsert failed");
                }
            }
        }
        tally
    }
}

/// In-memory sink with the same upsert semantics, keyed by the natural key.
/// Backs `--dry-run` and the pipeline tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    rows: Mutex<BTreeMap<(String, String), Product>>,
}

impl MemorySink {
    pub fn len(&self) -> usize {
        self.rows.lock().expect("memory sink poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, source: &str, product_url: &str) -> Option<Product> {
        self.rows
            .lock()
            .expect("memory sink poisoned")
            .get(&(source.to_string(), product_url.to_string()))
            .cloned()
    }

    /// Rows in natural-key order.
    pub fn snapshot(&self) -> Vec<Product> {
        self.rows
            .lock()
            .expect("memory sink poisoned")
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ProductSink for MemorySink {
    async fn upsert(&self, products: &[Product]) -> IngestSummary {
        let mut rows = self.rows.lock().expect("memory sink poisoned");
        for product in products {
            let (source, url) = product.key();
            rows.insert((source.to_string(), url.to_string()), product.clone());
        }
        IngestSummary {
            succeeded: products.len(),
            failed: 0,
        }
    }
}
