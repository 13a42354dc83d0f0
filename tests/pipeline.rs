//! End-to-end pipeline behavior against file sources and the in-memory sink.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use vitrine::catalog::CatalogSource;
use vitrine::embedder::{Embedding, ImageEncoder};
use vitrine::normalize::{ListingNormalizer, NormalizerOptions};
use vitrine::pipeline::Pipeline;
use vitrine::sink::MemorySink;
use vitrine::Gender;

struct StubEncoder {
    fail: bool,
}

#[async_trait]
impl ImageEncoder for StubEncoder {
    async fn encode(&self, _image_url: &str) -> Result<Embedding> {
        if self.fail {
            Err(anyhow!("model offline"))
        } else {
            Ok(vec![0.5; 8])
        }
    }

    fn dim(&self) -> usize {
        8
    }
}

fn listing(id: usize, title: &str, categories: &[&str]) -> Value {
    json!({
        "id": format!("{id:07}"),
        "uri": format!("women/item-{id}"),
        "name": title,
        "price": "€59,00",
        "categories": categories,
        "primaryImage": { "src": format!("https://img.example/{id}.jpg") }
    })
}

fn write_batch(name: &str, items: &[Value]) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "vitrine-it-{name}-{}.json",
        std::process::id()
    ));
    let mut file = std::fs::File::create(&path).unwrap();
    write!(file, "{}", json!({ "items": items })).unwrap();
    path
}

fn pipeline(sink: Arc<MemorySink>, fail_embeddings: bool) -> Pipeline {
    let normalizer = ListingNormalizer::new(
        NormalizerOptions::default(),
        Arc::new(StubEncoder {
            fail: fail_embeddings,
        }),
    );
    Pipeline::new(normalizer, Box::new(sink)).unwrap()
}

#[tokio::test]
async fn limit_truncates_in_original_order() {
    let items: Vec<Value> = (0..20).map(|i| listing(i, &format!("Item {i}"), &[])).collect();
    let path = write_batch("limit", &items);
    let sink = Arc::new(MemorySink::default());

    let totals = pipeline(sink.clone(), false)
        .run(&[CatalogSource::File(path.clone())], Some(5))
        .await;

    assert_eq!(totals.succeeded, 5);
    assert_eq!(totals.failed, 0);
    assert_eq!(sink.len(), 5);
    for i in 0..5 {
        let url = format!("https://www.cos.com/en-eu/women/item-{i}");
        assert!(sink.get("scraper", &url).is_some(), "missing item {i}");
    }
    std::fs::remove_file(path).ok();
}

#[tokio::test]
async fn embedding_failure_still_ingests_and_counts_success() {
    let path = write_batch("degrade", &[listing(1, "Wool Coat", &["Wool Coats"])]);
    let sink = Arc::new(MemorySink::default());

    let totals = pipeline(sink.clone(), true)
        .run(&[CatalogSource::File(path.clone())], None)
        .await;

    assert_eq!(totals.succeeded, 1);
    assert_eq!(totals.failed, 0);
    let row = sink
        .get("scraper", "https://www.cos.com/en-eu/women/item-1")
        .unwrap();
    assert!(row.embedding.is_none());
    assert_eq!(row.tags.as_deref(), Some(["wool".to_string()].as_slice()));
    std::fs::remove_file(path).ok();
}

#[tokio::test]
async fn reingesting_a_batch_is_idempotent() {
    let first = write_batch(
        "idem-a",
        &[listing(7, "Silk Dress", &["Dresses"]), listing(8, "Knit Top", &[])],
    );
    let second = write_batch(
        "idem-b",
        &[listing(7, "Silk Dress (updated)", &["Men's Dresses"]), listing(8, "Knit Top", &[])],
    );
    let sink = Arc::new(MemorySink::default());
    let pipe = pipeline(sink.clone(), false);

    pipe.run(&[CatalogSource::File(first.clone())], None).await;
    let totals = pipe.run(&[CatalogSource::File(second.clone())], None).await;

    assert_eq!(totals.succeeded, 2);
    assert_eq!(sink.len(), 2, "same natural keys must not duplicate rows");
    let row = sink
        .get("scraper", "https://www.cos.com/en-eu/women/item-7")
        .unwrap();
    assert_eq!(row.title, "Silk Dress (updated)", "last write wins");
    assert_eq!(row.gender, Gender::Man);
    std::fs::remove_file(first).ok();
    std::fs::remove_file(second).ok();
}

#[tokio::test]
async fn incomplete_listings_are_skipped_not_failed() {
    let mut broken = listing(3, "No Image", &[]);
    broken.as_object_mut().unwrap().remove("primaryImage");
    let path = write_batch("skips", &[listing(2, "Fine", &[]), broken]);
    let sink = Arc::new(MemorySink::default());

    let totals = pipeline(sink.clone(), false)
        .run(&[CatalogSource::File(path.clone())], None)
        .await;

    assert_eq!(totals.succeeded, 1);
    assert_eq!(totals.failed, 0, "a skip is not a failure");
    assert_eq!(sink.len(), 1);
    std::fs::remove_file(path).ok();
}

#[tokio::test]
async fn unreadable_source_counts_once_and_does_not_stop_the_run() {
    let good = write_batch("resume", &[listing(4, "Survivor", &[])]);
    let missing = CatalogSource::File(PathBuf::from("/nonexistent/batch.json"));
    let sink = Arc::new(MemorySink::default());

    let totals = pipeline(sink.clone(), false)
        .run(&[missing, CatalogSource::File(good.clone())], None)
        .await;

    assert_eq!(totals.failed, 1);
    assert_eq!(totals.succeeded, 1);
    assert_eq!(sink.len(), 1);
    std::fs::remove_file(good).ok();
}
