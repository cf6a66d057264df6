//! Embedding collaborator seams
//!
//! The embedding model and the foreground-segmentation step live
//! outside this crate; these traits are the contract the synchronizer
//! and search path consume. Encoders must be deterministic for
//! identical input given fixed weights, and the core neither retries
//! nor caches their calls.

use async_trait::async_trait;

/// A raw image as it arrives from a report: base64 payload plus MIME
/// type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodableImage {
    pub payload: String,
    pub content_type: String,
}

/// Collaborator failures, one per affected image.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("image could not be decoded: {0}")]
    InvalidImage(String),

    #[error("embedding model failed: {0}")]
    Model(String),
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Optional foreground isolation before embedding.
#[async_trait]
pub trait ImagePreprocessor: Send + Sync {
    /// Idempotent: preprocessing an already-preprocessed image must be
    /// a no-op.
    async fn preprocess(&self, image: EncodableImage) -> EmbeddingResult<EncodableImage>;
}

/// Turns a preprocessed image into a fixed-length vector.
#[async_trait]
pub trait ImageEncoder: Send + Sync {
    /// Length of every vector this encoder produces.
    fn dimension(&self) -> usize;

    async fn encode(&self, image: &EncodableImage) -> EmbeddingResult<Vec<f32>>;

    /// Encode several images in one call. The default forwards to
    /// [`encode`](Self::encode) per image; model-backed implementations
    /// override this with a real batched pass.
    async fn encode_batch(&self, images: &[EncodableImage]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(images.len());
        for image in images {
            vectors.push(self.encode(image).await?);
        }
        Ok(vectors)
    }
}

/// The no-op fallback when no segmentation model is deployed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughPreprocessor;

#[async_trait]
impl ImagePreprocessor for PassthroughPreprocessor {
    async fn preprocess(&self, image: EncodableImage) -> EmbeddingResult<EncodableImage> {
        Ok(image)
    }
}
