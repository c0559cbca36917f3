//! Embedder trait and shared types for text embedding.
//!
//! The embedding model itself is pluggable; the indexer only depends on
//! [`Embedder`]. [`from_config`] picks the implementation named in the
//! config (`mock` or `onnx`).
pub mod mock;
pub mod onnx;
pub mod tokenizer;

use std::path::Path;
use std::sync::Arc;

use crate::config::ModelConfig;
use crate::indexer::elements::Element;
use crate::indexer::languages::LanguageTag;
use thiserror::Error;

/// Prepended to search queries so they read like the element descriptions
/// chunks are embedded from.
pub const QUERY_PREFIX: &str = "Find code that: ";

/// Errors that can occur during embedding operations.
#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("model load failed: {0}")]
    ModelLoadFailed(String),

    #[error("embedding has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Trait for text embedding implementations.
///
/// All implementations must be `Send + Sync` to allow concurrent use
/// behind `Arc`.
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    /// Embed multiple text strings into vectors.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;
}

/// Builds the text sent to the embedder for one element: a short context
/// header (kind, name, docstring, enclosing class) followed by the code with
/// whitespace collapsed.
pub fn embedding_text(element: &Element, language: LanguageTag) -> String {
    let mut context = vec![
        format!("Language: {language}"),
        format!("Type: {}", element.kind),
        format!("Name: {}", element.name),
    ];
    if let Some(doc) = element.docstring.as_deref().filter(|d| !d.is_empty()) {
        context.push(format!("Description: {doc}"));
    }
    if let Some(parent) = &element.parent_class {
        context.push(format!("Part of class: {parent}"));
    }

    let code = element.source_text.split_whitespace().collect::<Vec<_>>().join(" ");
    format!("{} {}", context.join(" "), code)
}

/// Text embedded for a search query.
pub fn query_text(query: &str) -> String {
    format!("{QUERY_PREFIX}{}", query.trim())
}

/// Builds the embedder named by `model.name`.
pub fn from_config(model: &ModelConfig) -> Result<Arc<dyn Embedder>, EmbedderError> {
    match model.name.as_str() {
        "mock" => Ok(Arc::new(mock::MockEmbedder::new(model.dimensions))),
        "onnx" => {
            let dir = model.path.as_deref().ok_or_else(|| {
                EmbedderError::ModelLoadFailed("model.path is required for onnx".to_string())
            })?;
            let embedder = onnx::OnnxEmbedder::new(
                Path::new(dir),
                model.dimensions,
                model.pooling,
                model.token_type_ids,
            )?;
            Ok(Arc::new(embedder))
        }
        other => Err(EmbedderError::ModelLoadFailed(format!(
            "unknown embedding model: {other}"
        ))),
    }
}
