//! Run configuration: the source list and per-source record limit, resolved
//! from `config.json` when the command line names no sources.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::catalog::CatalogSource;

/// Placeholder prefix used in the generated template; entries carrying it are
/// ignored so a half-edited config never points the run at junk.
const PLACEHOLDER_PREFIX: &str = "PASTE_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl RunConfig {
    /// Load from `path`. When the file is missing a template is written and
    /// `None` is returned so the caller can tell the user to fill it in.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            let template = RunConfig {
                files: Vec::new(),
                urls: vec!["PASTE_YOUR_JSON_URLS_HERE".to_string()],
                limit: None,
            };
            std::fs::write(path, serde_json::to_string_pretty(&template)?)
                .with_context(|| format!("failed to write template {}", path.display()))?;
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: RunConfig = serde_json::from_str(&raw)
            .with_context(|| format!("invalid JSON in {}", path.display()))?;
        Ok(Some(config))
    }

    /// Validated catalog sources, placeholders filtered, files before URLs.
    pub fn sources(&self) -> Result<Vec<CatalogSource>> {
        let mut sources = Vec::new();
        for file in &self.files {
            if file.starts_with(PLACEHOLDER_PREFIX) {
                continue;
            }
            sources.push(CatalogSource::File(PathBuf::from(file)));
        }
        for url in &self.urls {
            if url.starts_with(PLACEHOLDER_PREFIX) {
                warn!(url, "ignoring placeholder url in config");
                continue;
            }
            let parsed = Url::parse(url).with_context(|| format!("invalid source url {url}"))?;
            sources.push(CatalogSource::Remote(parsed));
        }
        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_filtered_out() {
        let config = RunConfig {
            files: vec!["PASTE_YOUR_FILES_HERE".to_string(), "batch1.json".to_string()],
            urls: vec![
                "PASTE_YOUR_JSON_URLS_HERE".to_string(),
                "https://shop.example/api/products".to_string(),
            ],
            limit: Some(5),
        };
        let sources = config.sources().unwrap();
        assert_eq!(sources.len(), 2);
        assert!(matches!(&sources[0], CatalogSource::File(p) if p.ends_with("batch1.json")));
        assert!(matches!(&sources[1], CatalogSource::Remote(_)));
    }

    #[test]
    fn invalid_url_is_rejected_up_front() {
        let config = RunConfig {
            files: Vec::new(),
            urls: vec!["not a url".to_string()],
            limit: None,
        };
        assert!(config.sources().is_err());
    }

    #[test]
    fn missing_file_writes_a_template() {
        let path = std::env::temp_dir().join(format!(
            "vitrine-config-{}.json",
            std::process::id()
        ));
        std::fs::remove_file(&path).ok();

        assert!(RunConfig::load(&path).unwrap().is_none());
        let reloaded = RunConfig::load(&path).unwrap().expect("template should parse");
        assert!(reloaded.sources().unwrap().is_empty());

        std::fs::remove_file(path).ok();
    }
}
