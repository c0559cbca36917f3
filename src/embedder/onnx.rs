//! Transformer encoder run through ONNX Runtime.
//!
//! The model directory holds `model.onnx` and `tokenizer.json`. The last
//! hidden state is pooled into one vector (first token or masked mean) and
//! L2-normalised, so cosine distance in the vector index behaves.
use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::tokenizer::ModelTokenizer;
use super::{Embedder, EmbedderError};

/// How token states collapse into one embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pooling {
    /// First token (`<s>` / `[CLS]`), as code encoders are usually read.
    #[default]
    Cls,
    /// Attention-masked mean over all tokens.
    Mean,
}

pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: ModelTokenizer,
    dimensions: usize,
    pooling: Pooling,
    token_type_ids: bool,
}

impl OnnxEmbedder {
    /// Loads `model.onnx` and `tokenizer.json` from `model_dir`.
    ///
    /// `dimensions` is the hidden size the model is expected to produce.
    /// `token_type_ids` feeds a zeroed segment input, which BERT exports need
    /// and RoBERTa exports reject.
    pub fn new(
        model_dir: &Path,
        dimensions: usize,
        pooling: Pooling,
        token_type_ids: bool,
    ) -> Result<Self, EmbedderError> {
        let model_path = model_dir.join("model.onnx");
        if !model_path.exists() {
            return Err(EmbedderError::ModelLoadFailed(format!(
                "model.onnx not found in {}",
                model_dir.display()
            )));
        }

        let tokenizer = ModelTokenizer::from_model_dir(model_dir)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("tokenizer error: {e}")))?;

        info!("Loading ONNX model from {}", model_path.display());
        let session = Session::builder()
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("session builder error: {e}")))?
            .with_intra_threads(4)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("thread config error: {e}")))?
            .commit_from_file(&model_path)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("model load error: {e}")))?;

        info!(
            "Model ready (vocab {}, {dimensions} dims, {pooling:?} pooling)",
            tokenizer.vocab_size()
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dimensions,
            pooling,
            token_type_ids,
        })
    }
}

fn tensor(shape_len: usize, data: Vec<i64>, name: &str) -> Result<Tensor<i64>, EmbedderError> {
    Tensor::from_array(([1usize, shape_len], data))
        .map_err(|e| EmbedderError::InferenceFailed(format!("{name} error: {e}")))
}

impl Embedder for OnnxEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let encoded = self
            .tokenizer
            .encode(text)
            .map_err(|e| EmbedderError::InferenceFailed(format!("tokenization failed: {e}")))?;
        let seq_len = encoded.input_ids.len();
        if seq_len == 0 {
            return Err(EmbedderError::InferenceFailed("empty token sequence".to_string()));
        }

        let input_ids = tensor(seq_len, encoded.input_ids.clone(), "input_ids")?;
        let attention_mask = tensor(seq_len, encoded.attention_mask.clone(), "attention_mask")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| EmbedderError::InferenceFailed(format!("lock poisoned: {e}")))?;
        let run = if self.token_type_ids {
            let token_type_ids = tensor(seq_len, vec![0i64; seq_len], "token_type_ids")?;
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids,
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
            ])
        };
        let outputs =
            run.map_err(|e| EmbedderError::InferenceFailed(format!("inference failed: {e}")))?;

        // [1, seq_len, hidden]
        let (_shape, hidden_states) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("output extraction: {e}")))?;

        let hidden_size = hidden_states.len() / seq_len;
        if hidden_size != self.dimensions {
            return Err(EmbedderError::DimensionMismatch {
                expected: self.dimensions,
                actual: hidden_size,
            });
        }
        debug!("Embedded {seq_len} tokens");

        let pooled = match self.pooling {
            Pooling::Cls => hidden_states[..hidden_size].to_vec(),
            Pooling::Mean => mean_pooling(hidden_states, &encoded.attention_mask, hidden_size),
        };
        Ok(l2_normalize(&pooled))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Masked mean over a flat `[seq_len, hidden_size]` buffer.
fn mean_pooling(hidden_states: &[f32], attention_mask: &[i64], hidden_size: usize) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden_size];
    let mut weight = 0.0f32;

    for (row, &mask) in hidden_states.chunks_exact(hidden_size).zip(attention_mask) {
        let mask = mask as f32;
        weight += mask;
        for (acc, value) in sum.iter_mut().zip(row) {
            *acc += value * mask;
        }
    }

    if weight > 0.0 {
        sum.iter_mut().for_each(|v| *v /= weight);
    }
    sum
}

fn l2_normalize(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vector.to_vec();
    }
    vector.iter().map(|x| x / norm).collect()
}
