//! Image embedding provider abstraction.
//!
//! The pipeline treats embedding generation as a black box: an image
//! reference in, a fixed-dimension vector out, or an error. The concrete
//! provider ([`SiglipEncoder`]) runs a pretrained vision model locally;
//! tests substitute stubs through the trait.

pub mod siglip;

pub use siglip::SiglipEncoder;

use anyhow::Result;
use async_trait::async_trait;

/// A fixed-length visual embedding (f32 components).
pub type Embedding = Vec<f32>;

/// Converts an image reference into a fixed-dimension vector.
///
/// Implementations are expensive to construct and cheap to invoke after
/// warm-up; they are shared behind an `Arc` and must be read-only after
/// construction. Any failure is an error, never a partial vector — callers
/// treat an error and "vector absent" identically.
#[async_trait]
pub trait ImageEncoder: Send + Sync {
    async fn encode(&self, image_url: &str) -> Result<Embedding>;

    /// Dimensionality of vectors produced by this encoder.
    fn dim(&self) -> usize;
}
