// Embeddings module
// Sentence encoding shared by the ingestion and retrieval pipelines

pub mod encoder;

pub use encoder::OnnxEncoder;

use crate::Result;

/// Seam between the pipelines and the encoding model, so tests can
/// substitute a deterministic double for the ONNX session.
///
/// Every vector in one collection must come from the same
/// implementation with the same weights; mixing encoders makes the
/// stored distances meaningless.
pub trait Embedder {
    /// Encode each input text into one fixed-length, L2-normalized vector.
    fn encode(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
