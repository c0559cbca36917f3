//! # devflow: structural code indexer
//!
//! Parses source files with tree-sitter, extracts functions, methods and
//! classes, and keeps a per-file chunk registry plus a vector index in sync
//! with the latest extraction.
//!
//! ## Architecture
//!
//! - **[`config`]**: JSON configuration, defaults and workspace resolution
//! - **[`db`]**: SQLite + sqlite-vec store (files, chunks, feedback, vectors)
//! - **[`embedder`]**: Embedder trait, embedding text, mock and ONNX implementations
//! - **[`indexer`]**: Language table, parser, extractor, reconciler, directory walker
//! - **[`logging`]**: tracing subscriber setup

pub mod config;
pub mod db;
pub mod embedder;
pub mod indexer;
pub mod logging;
