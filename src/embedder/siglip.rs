//! SigLIP-based image encoder running locally via candle.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::siglip;
use image::imageops::FilterType;
use reqwest::Client;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use super::{Embedding, ImageEncoder};
use crate::util::env::{env_opt, env_parse};

pub const DEFAULT_MODEL_ID: &str = "google/siglip-base-patch16-224";

/// Text fed through the text tower at warm-up. The checkpoint pairs both
/// towers; running the text branch once verifies the download end to end
/// before the first listing arrives.
const WARMUP_PROMPT: &str = "a photo of a fashion item";

/// Image encoder backed by a SigLIP checkpoint.
///
/// Weights and tokenizer are fetched from the Hugging Face hub once at
/// construction and the graph is bound to CUDA when available, CPU otherwise.
/// After that every call is a single forward pass through the vision tower.
pub struct SiglipEncoder {
    model: siglip::Model,
    device: Device,
    http: Client,
    image_size: usize,
    dim: usize,
}

impl SiglipEncoder {
    /// Build from environment: `SIGLIP_MODEL_ID` overrides the checkpoint,
    /// `IMAGE_FETCH_TIMEOUT_SECS` bounds each image download (default 10s).
    pub fn from_env() -> Result<Self> {
        let model_id =
            env_opt("SIGLIP_MODEL_ID").unwrap_or_else(|| DEFAULT_MODEL_ID.to_string());
        let timeout = Duration::from_secs(env_parse("IMAGE_FETCH_TIMEOUT_SECS", 10u64));
        Self::load(&model_id, timeout)
    }

    pub fn load(model_id: &str, fetch_timeout: Duration) -> Result<Self> {
        use hf_hub::{api::sync::Api, Repo, RepoType};

        let device = Device::cuda_if_available(0).context("failed to select compute device")?;
        info!(model_id, cuda = device.is_cuda(), "loading SigLIP checkpoint");

        let api = Api::new().context("failed to initialize Hugging Face hub client")?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));
        let weights = repo
            .get("model.safetensors")
            .with_context(|| format!("failed to fetch weights for {model_id}"))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .with_context(|| format!("failed to fetch tokenizer for {model_id}"))?;

        let config = siglip::Config::base_patch16_224();
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, &device)? };
        let model = siglip::Model::new(&config, vb).context("failed to build SigLIP graph")?;

        // Warm-up: one pass through the text tower on a fixed prompt pages the
        // weights in and fails fast on a broken checkpoint.
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(anyhow::Error::msg)?;
        let encoding = tokenizer
            .encode(WARMUP_PROMPT, true)
            .map_err(anyhow::Error::msg)?;
        let prompt_ids = Tensor::new(vec![encoding.get_ids().to_vec()], &device)?;
        model
            .get_text_features(&prompt_ids)
            .context("SigLIP warm-up pass failed")?;

        let http = Client::builder()
            .timeout(fetch_timeout)
            .build()
            .context("failed to build image fetch client")?;

        Ok(Self {
            model,
            device,
            http,
            image_size: config.vision_config.image_size,
            dim: config.vision_config.hidden_size,
        })
    }

    /// Decode, resize and scale image bytes into the model's input tensor
    /// (RGB, `[-1, 1]`, NCHW with a unit batch dimension).
    fn pixel_values(&self, bytes: &[u8]) -> Result<Tensor> {
        let img = image::load_from_memory(bytes).context("failed to decode image")?;
        let side = self.image_size as u32;
        let img = img.resize_to_fill(side, side, FilterType::Triangle).to_rgb8();
        let pixels = Tensor::from_vec(
            img.into_raw(),
            (self.image_size, self.image_size, 3),
            &Device::Cpu,
        )?
        .permute((2, 0, 1))?
        .to_dtype(DType::F32)?
        .affine(2.0 / 255.0, -1.0)?
        .unsqueeze(0)?
        .to_device(&self.device)?;
        Ok(pixels)
    }
}

#[async_trait]
impl ImageEncoder for SiglipEncoder {
    async fn encode(&self, image_url: &str) -> Result<Embedding> {
        let bytes = self
            .http
            .get(image_url)
            .send()
            .await
            .with_context(|| format!("image download failed: {image_url}"))?
            .error_for_status()
            .with_context(|| format!("image download rejected: {image_url}"))?
            .bytes()
            .await
            .context("failed to read image body")?;

        let pixels = self.pixel_values(&bytes)?;
        let features = self.model.get_image_features(&pixels)?;
        let vector = features.squeeze(0)?.to_vec1::<f32>()?;
        debug!(image_url, len = vector.len(), "image encoded");
        Ok(vector)
    }

    fn dim(&self) -> usize {
        self.dim
    }
}
