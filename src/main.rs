use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use url::Url;

use vitrine::catalog::CatalogSource;
use vitrine::config::RunConfig;
use vitrine::db::Db;
use vitrine::embedder::{ImageEncoder, SiglipEncoder};
use vitrine::normalize::{ListingNormalizer, NormalizerOptions};
use vitrine::pipeline::Pipeline;
use vitrine::sink::{MemorySink, PgProductSink, ProductSink};
use vitrine::telemetry;
use vitrine::util::env as env_util;

#[derive(Parser, Debug)]
#[command(
    name = "vitrine",
    about = "Normalize catalog JSON, attach image embeddings and upsert products"
)]
struct Cli {
    /// Local JSON document to ingest (repeatable)
    #[arg(long = "file", value_name = "PATH")]
    files: Vec<PathBuf>,

    /// Remote JSON endpoint to ingest (repeatable)
    #[arg(long = "url", value_name = "URL")]
    urls: Vec<String>,

    /// Max records per source (testing aid)
    #[arg(long, env = "INGEST_LIMIT")]
    limit: Option<usize>,

    /// Config file consulted when no --file/--url is given
    #[arg(long, value_name = "PATH", default_value = "config.json")]
    config: PathBuf,

    /// Normalize and embed but keep results in memory instead of Postgres
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Create the products table and vector extension when missing
    #[arg(long, env = "PREPARE_SCHEMA", default_value_t = true)]
    prepare_schema: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    telemetry::init_tracing("info,sqlx=warn")?;
    let cli = Cli::parse();

    let Some((sources, limit)) = resolve_sources(&cli)? else {
        return Ok(());
    };
    if sources.is_empty() {
        bail!(
            "no valid sources; pass --file/--url or edit {}",
            cli.config.display()
        );
    }
    info!(sources = sources.len(), ?limit, "starting catalog ingest");

    let encoder = Arc::new(SiglipEncoder::from_env().context("failed to load embedding model")?);
    let dim = encoder.dim();
    let normalizer = ListingNormalizer::new(NormalizerOptions::from_env(), encoder);

    let sink: Box<dyn ProductSink> = if cli.dry_run {
        info!("dry run: routing products to the in-memory sink");
        Box::new(MemorySink::default())
    } else {
        let database_url = env_util::db_url()?;
        let db = Db::connect(&database_url, env_util::env_parse("DB_MAX_CONNS", 8u32)).await?;
        let sink = PgProductSink::new(db);
        if cli.prepare_schema {
            sink.ensure_schema(dim)
                .await
                .context("failed to prepare products schema")?;
        }
        Box::new(sink)
    };

    let pipeline = Pipeline::new(normalizer, sink)?;
    let totals = pipeline.run(&sources, limit).await;
    println!("Total results: {totals}");
    Ok(())
}

/// Sources from the command line, else from config.json. Returns `None` after
/// writing a fresh config template so the user can fill it in first.
fn resolve_sources(cli: &Cli) -> Result<Option<(Vec<CatalogSource>, Option<usize>)>> {
    if !cli.files.is_empty() || !cli.urls.is_empty() {
        let mut sources: Vec<CatalogSource> =
            cli.files.iter().cloned().map(CatalogSource::File).collect();
        for url in &cli.urls {
            let parsed = Url::parse(url).with_context(|| format!("invalid source url {url}"))?;
            sources.push(CatalogSource::Remote(parsed));
        }
        return Ok(Some((sources, cli.limit)));
    }

    match RunConfig::load(&cli.config)? {
        Some(config) => {
            let limit = cli.limit.or(config.limit);
            Ok(Some((config.sources()?, limit)))
        }
        None => {
            println!(
                "Created {} — add your catalog JSON files or URLs and run again.",
                cli.config.display()
            );
            Ok(None)
        }
    }
}
