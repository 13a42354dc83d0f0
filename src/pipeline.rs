//! Pipeline orchestration: sources in order, records in order, tallies merged.

use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::catalog::{catalog_client, CatalogSource};
use crate::normalize::{ListingNormalizer, Outcome};
use crate::product::Product;
use crate::sink::{IngestSummary, ProductSink};
use crate::util::env::env_parse;

/// Drives catalog sources through the normalizer into the sink.
///
/// Strictly sequential: sources are processed in the order supplied, and
/// within a source each record is normalized and embedded before the next
/// begins. The running tally is the only mutable aggregate.
pub struct Pipeline {
    normalizer: ListingNormalizer,
    sink: Box<dyn ProductSink>,
    http: Client,
}

impl Pipeline {
    pub fn new(normalizer: ListingNormalizer, sink: Box<dyn ProductSink>) -> Result<Self> {
        let timeout = Duration::from_secs(env_parse("SOURCE_FETCH_TIMEOUT_SECS", 30u64));
        Ok(Self {
            normalizer,
            sink,
            http: catalog_client(timeout)?,
        })
    }

    /// Ingest every source, truncating each source's valid records to `limit`.
    ///
    /// A source that cannot be fetched counts as one failure and does not
    /// stop the remaining sources.
    pub async fn run(&self, sources: &[CatalogSource], limit: Option<usize>) -> IngestSummary {
        let mut total = IngestSummary::default();
        for source in sources {
            match self.ingest_source(source, limit).await {
                Ok(tally) => total.absorb(tally),
                Err(err) => {
                    total.failed += 1;
                    warn!(source = %source, error = %err, "source failed");
                }
            }
        }
        info!(succeeded = total.succeeded, failed = total.failed, "run complete");
        total
    }

    async fn ingest_source(
        &self,
        source: &CatalogSource,
        limit: Option<usize>,
    ) -> Result<IngestSummary> {
        let raw_items = source.fetch(&self.http).await?;

        let mut tally = IngestSummary::default();
        let mut products: Vec<Product> = Vec::with_capacity(raw_items.len());
        let mut skipped = 0usize;
        for raw in &raw_items {
            match self.normalizer.normalize(raw).await {
                Outcome::Product(product) => products.push(*product),
                Outcome::Skipped(reason) => {
                    skipped += 1;
                    debug!(source = %source, reason = reason.as_str(), "listing skipped");
                }
                Outcome::Invalid(err) => {
                    tally.failed += 1;
                    warn!(source = %source, error = %err, "listing failed to normalize");
                }
            }
        }

        if let Some(limit) = limit {
            if products.len() > limit {
                info!(source = %source, limit, "truncating normalized batch");
                products.truncate(limit);
            }
        }

        tally.absorb(self.sink.upsert(&products).await);
        info!(
            source = %source,
            succeeded = tally.succeeded,
            failed = tally.failed,
            skipped,
            "source ingested"
        );
        Ok(tally)
    }
}
