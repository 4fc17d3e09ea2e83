
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::config::ModelConfig;
use crate::embeddings::Embedder;
use crate::{PatternError, Result};

const NORM_EPSILON: f32 = 1e-10;

/// Sentence encoder backed by a local ONNX export of a MiniLM-style
/// transformer and its tokenizer.
///
/// Encoding is tokenize (padded per batch, truncated to the configured
/// maximum) → run the model → mean-pool token vectors over non-padding
/// positions → L2-normalize. Ingestion and querying both go through
/// [`Embedder::encode`] on this type so stored and query vectors stay
/// comparable.
pub struct OnnxEncoder {
    tokenizer: Tokenizer,
    session: Session,
    needs_token_type_ids: bool,
    output_name: String,
}

impl OnnxEncoder {
    /// Load `tokenizer.json` and `model.onnx` from the configured model
    /// directory.
    #[inline]
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let model_dir = &config.model_dir;
        if !model_dir.is_dir() {
            return Err(PatternError::Config(format!(
                "Model directory not found: {}",
                model_dir.display()
            )));
        }

        debug!("Loading tokenizer from {}", model_dir.display());
        let mut tokenizer = Tokenizer::from_file(model_dir.join("tokenizer.json"))
            .map_err(|e| PatternError::Embedding(format!("Failed to load tokenizer: {e}")))?;
        tokenizer.with_padding(Some(PaddingParams::default()));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_sequence_length,
                ..TruncationParams::default()
            }))
            .map_err(|e| {
                PatternError::Embedding(format!("Failed to configure truncation: {e}"))
            })?;

        debug!("Loading ONNX model from {}", model_dir.display());
        let session = Session::builder()
            .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|builder| builder.commit_from_file(model_dir.join("model.onnx")))
            .map_err(|e| PatternError::Embedding(format!("Failed to load ONNX model: {e}")))?;

        let needs_token_type_ids = session
            .inputs
            .iter()
            .any(|input| input.name == "token_type_ids");
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| {
                PatternError::Embedding("Model declares no outputs".to_string())
            })?;

        info!("Embedding model loaded from {}", model_dir.display());
        Ok(Self {
            tokenizer,
            session,
            needs_token_type_ids,
            output_name,
        })
    }
}

impl Embedder for OnnxEncoder {
    #[inline]
    fn encode(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Encoding {} texts", texts.len());

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| PatternError::Embedding(format!("Tokenization failed: {e}")))?;

        let batch = encodings.len();
        let seq_len = encodings.first().map_or(0, |encoding| encoding.get_ids().len());

        let mut input_ids = Vec::with_capacity(batch * seq_len);
        let mut attention_mask = Vec::with_capacity(batch * seq_len);
        let mut token_type_ids = Vec::with_capacity(batch * seq_len);
        for encoding in &encodings {
            input_ids.extend(encoding.get_ids().iter().map(|&id| i64::from(id)));
            attention_mask.extend(encoding.get_attention_mask().iter().map(|&m| i64::from(m)));
            token_type_ids.extend(encoding.get_type_ids().iter().map(|&t| i64::from(t)));
        }

        let ids_tensor = Tensor::from_array(([batch, seq_len], input_ids))
            .map_err(|e| PatternError::Embedding(format!("Failed to build input tensor: {e}")))?;
        let mask_tensor = Tensor::from_array(([batch, seq_len], attention_mask))
            .map_err(|e| PatternError::Embedding(format!("Failed to build mask tensor: {e}")))?;

        let outputs = if self.needs_token_type_ids {
            let type_tensor = Tensor::from_array(([batch, seq_len], token_type_ids)).map_err(
                |e| PatternError::Embedding(format!("Failed to build type tensor: {e}")),
            )?;
            self.session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
                "token_type_ids" => type_tensor,
            ])
        } else {
            self.session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
            ])
        }
        .map_err(|e| PatternError::Embedding(format!("Model inference failed: {e}")))?;

        let (shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| PatternError::Embedding(format!("Unexpected model output: {e}")))?;
        if shape.len() != 3 {
            return Err(PatternError::Embedding(format!(
                "Expected [batch, seq, hidden] model output, got {shape:?}"
            )));
        }
        let out_seq = usize::try_from(shape[1])
            .map_err(|_| PatternError::Embedding("Negative output dimension".to_string()))?;
        let hidden = usize::try_from(shape[2])
            .map_err(|_| PatternError::Embedding("Negative output dimension".to_string()))?;
        if out_seq != seq_len {
            return Err(PatternError::Embedding(format!(
                "Model returned {out_seq} token positions for {seq_len} input tokens"
            )));
        }

        let mut sentence_vectors = Vec::with_capacity(batch);
        for (index, encoding) in encodings.iter().enumerate() {
            let tokens = &data[index * out_seq * hidden..(index + 1) * out_seq * hidden];
            let mut pooled = mean_pool(tokens, encoding.get_attention_mask(), hidden);
            l2_normalize(&mut pooled);
            sentence_vectors.push(pooled);
        }

        debug!(
            "Encoded {} texts into {hidden}-dimensional vectors",
            sentence_vectors.len()
        );
        Ok(sentence_vectors)
    }
}

/// Average one text's token vectors over its non-padding positions.
///
/// `tokens` is the `[seq, hidden]` row-major slice for a single text;
/// positions where `mask` is zero are excluded. The divisor is floored
/// at one so a fully-masked row yields zeros instead of NaN.
fn mean_pool(tokens: &[f32], mask: &[u32], hidden: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden];
    let mut kept = 0u32;

    for (position, &flag) in mask.iter().enumerate() {
        if flag == 0 {
            continue;
        }
        kept += 1;
        let offset = position * hidden;
        for (dim, value) in pooled.iter_mut().enumerate() {
            *value += tokens[offset + dim];
        }
    }

    let divisor = kept.max(1) as f32;
    for value in &mut pooled {
        *value /= divisor;
    }
    pooled
}

/// Scale a vector to unit L2 norm. The norm is floored at a small
/// epsilon so a degenerate all-zero vector stays all-zero.
fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    let divisor = norm.max(NORM_EPSILON);
    for value in vector.iter_mut() {
        *value /= divisor;
    }
}
