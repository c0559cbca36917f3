//! Source indexing: parse, extract structural elements, and reconcile them
//! into the chunk registry.

pub mod core;
pub mod elements;
pub mod extractor;
pub mod identity;
pub mod languages;
pub mod module_chunks;
pub mod reconciler;
pub mod syntax;

pub use core::{IndexOptions, IndexRunSummary, Indexer};
pub use elements::{Element, ElementKind, ElementSet};
pub use extractor::StructuralExtractor;
pub use identity::{ChunkId, ChunkIdentity};
pub use languages::LanguageTag;
pub use reconciler::{IndexReconciler, ReconcileError, ReconcileResult};
pub use syntax::{ParseError, SyntaxParser, TreeSitterParser};
