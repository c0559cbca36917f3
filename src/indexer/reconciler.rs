//! Per-file reconciliation of extracted elements against the chunk registry.

use super::elements::{Element, ElementKind, ElementSet};
use super::extractor::StructuralExtractor;
use super::identity::ChunkIdentity;
use super::languages::LanguageTag;
use super::module_chunks::split_into_module_chunks;
use super::syntax::{ParseError, SyntaxParser, TreeSitterParser};
use crate::db::Db;
use crate::db::models::{NewChunk, VectorMetadata};
use crate::embedder::{Embedder, EmbedderError, embedding_text};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, error, info, warn};

/// Outcome of reconciling one file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconcileResult {
    pub files_touched: usize,
    pub chunks_added: usize,
    pub chunks_failed: usize,
}

/// Failures that abort a single file's reconciliation.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("metadata store error: {0}")]
    Store(#[from] rusqlite::Error),
}

/// Keeps each file's chunk set equal to its latest extraction.
pub struct IndexReconciler {
    db: Arc<TokioMutex<Db>>,
    embedder: Arc<dyn Embedder>,
    parser: Arc<dyn SyntaxParser>,
    identity: ChunkIdentity,
    module_fallback: Option<usize>,
    class_chunks: bool,
}

impl IndexReconciler {
    pub fn new(db: Arc<TokioMutex<Db>>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            db,
            embedder,
            parser: Arc::new(TreeSitterParser::new()),
            identity: ChunkIdentity::new(),
            module_fallback: None,
            class_chunks: false,
        }
    }

    pub fn with_parser(mut self, parser: Arc<dyn SyntaxParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Index files with no classes or functions as line-budgeted module chunks.
    pub fn with_module_fallback(mut self, max_chunk_size: usize) -> Self {
        self.module_fallback = Some(max_chunk_size);
        self
    }

    /// Also register class elements as chunks. By default only functions
    /// and methods are indexed.
    pub fn with_class_chunks(mut self, enabled: bool) -> Self {
        self.class_chunks = enabled;
        self
    }

    pub fn db(&self) -> &Arc<TokioMutex<Db>> {
        &self.db
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Replaces the registered chunks of `file_path` with a fresh extraction
    /// of `source_text`.
    ///
    /// A parse failure returns before the store is touched. An element whose
    /// embedding fails is skipped and counted in `chunks_failed`. The stale
    /// chunks are deleted and the new ones inserted in a single transaction.
    pub async fn reconcile(
        &self,
        file_path: &str,
        source_text: &str,
        language: LanguageTag,
    ) -> Result<ReconcileResult, ReconcileError> {
        let elements = self.extract(file_path, source_text, language)?;

        let (file, dimensions) = {
            let db = self.db.lock().await;
            (db.upsert_file(file_path, language.name())?, db.dimensions())
        };

        let mut result = ReconcileResult {
            files_touched: 1,
            ..Default::default()
        };

        let mut chunks = Vec::with_capacity(elements.len());
        for element in &elements {
            match self.embed_element(element, language, dimensions) {
                Ok(vector) => chunks.push(NewChunk {
                    id: self.identity.mint(),
                    kind: element.kind,
                    name: &element.name,
                    parent_class: element.parent_class.as_deref(),
                    start_line: element.start_line,
                    end_line: element.end_line,
                    content: &element.source_text,
                    vector,
                    metadata: VectorMetadata {
                        file_path: file_path.to_string(),
                        language: language.name().to_string(),
                        kind: element.kind,
                        name: element.name.clone(),
                        parent_class: element.parent_class.clone(),
                        start_line: element.start_line,
                        end_line: element.end_line,
                    },
                }),
                Err(e) => {
                    warn!(
                        path = file_path,
                        element = %element.name,
                        kind = %element.kind,
                        "skipping element, embedding failed: {e}"
                    );
                    result.chunks_failed += 1;
                }
            }
        }

        let removed = {
            let mut db = self.db.lock().await;
            db.replace_file_chunks(file.id, &chunks).map_err(|e| {
                error!(path = file_path, "chunk registry left indeterminate: {e}");
                e
            })?
        };

        result.chunks_added = chunks.len();
        info!(
            path = file_path,
            language = %language,
            added = result.chunks_added,
            failed = result.chunks_failed,
            removed,
            "reconciled"
        );
        Ok(result)
    }

    fn extract(
        &self,
        file_path: &str,
        source_text: &str,
        language: LanguageTag,
    ) -> Result<ElementSet, ParseError> {
        if !language.is_supported() {
            warn!(path = file_path, "unsupported language, no chunks extracted");
            return Ok(ElementSet::new());
        }

        let tree = self.parser.parse(source_text, language).map_err(|e| {
            warn!(path = file_path, "parse failed: {e}");
            e
        })?;
        let mut elements = StructuralExtractor::new(language).extract(&tree, source_text);
        debug!(path = file_path, elements = elements.len(), "extracted");
        if !self.class_chunks {
            elements = elements
                .into_iter()
                .filter(|e| e.kind != ElementKind::Class)
                .collect::<Vec<_>>()
                .into();
        }

        match self.module_fallback {
            Some(max_chunk_size) if elements.is_empty() => {
                Ok(split_into_module_chunks(source_text, max_chunk_size))
            }
            _ => Ok(elements),
        }
    }

    fn embed_element(
        &self,
        element: &Element,
        language: LanguageTag,
        dimensions: usize,
    ) -> Result<Vec<f32>, EmbedderError> {
        let vector = self.embedder.embed(&embedding_text(element, language))?;
        if vector.len() != dimensions {
            return Err(EmbedderError::DimensionMismatch {
                expected: dimensions,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::mock::MockEmbedder;
    use tree_sitter::Tree;

    /// Fails on any text mentioning `poison`.
    struct PoisonEmbedder(MockEmbedder);

    impl Embedder for PoisonEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
            if text.contains("poison") {
                return Err(EmbedderError::InferenceFailed("poisoned input".into()));
            }
            self.0.embed(text)
        }

        fn dimensions(&self) -> usize {
            self.0.dimensions()
        }
    }

    struct BrokenParser;

    impl SyntaxParser for BrokenParser {
        fn parse(&self, _source: &str, _language: LanguageTag) -> Result<Tree, ParseError> {
            Err(ParseError::NoTree)
        }
    }

    const CALCULATOR: &str = r#"class Calculator:
    def add(self, a, b):
        return a + b

    def subtract(self, a, b):
        return a - b

def greet(name):
    return "hello " + name
"#;

    fn reconciler_with(embedder: Arc<dyn Embedder>) -> IndexReconciler {
        let db = Db::open_in_memory_with_dimensions(16).unwrap();
        IndexReconciler::new(Arc::new(TokioMutex::new(db)), embedder)
    }

    fn reconciler() -> IndexReconciler {
        reconciler_with(Arc::new(MockEmbedder::new(16)))
    }

    async fn chunk_tuples(r: &IndexReconciler, path: &str) -> Vec<(String, ElementKind, usize, usize)> {
        let db = r.db().lock().await;
        let file = db.file_by_path(path).unwrap().unwrap();
        db.list_chunks(file.id)
            .unwrap()
            .into_iter()
            .map(|c| (c.name, c.kind, c.start_line, c.end_line))
            .collect()
    }

    #[tokio::test]
    async fn test_calculator_end_to_end() {
        let r = reconciler();
        let result = r
            .reconcile("calc.py", CALCULATOR, LanguageTag::Python)
            .await
            .unwrap();
        assert_eq!(result.files_touched, 1);
        assert_eq!(result.chunks_added, 3);
        assert_eq!(result.chunks_failed, 0);

        let db = r.db().lock().await;
        let file = db.file_by_path("calc.py").unwrap().unwrap();
        let chunks = db.list_chunks(file.id).unwrap();
        let methods: Vec<_> = chunks
            .iter()
            .filter(|c| c.kind == ElementKind::Method)
            .collect();
        assert_eq!(methods.len(), 2);
        assert!(
            methods
                .iter()
                .all(|m| m.parent_class.as_deref() == Some("Calculator"))
        );
        assert_eq!(
            chunks
                .iter()
                .filter(|c| c.kind == ElementKind::Function)
                .count(),
            1
        );
        assert!(chunks.iter().all(|c| c.kind != ElementKind::Class));
        assert_eq!(db.stats().unwrap().vector_count, 3);
    }

    #[tokio::test]
    async fn test_class_chunks_opt_in() {
        let r = reconciler().with_class_chunks(true);
        let result = r
            .reconcile("calc.py", CALCULATOR, LanguageTag::Python)
            .await
            .unwrap();
        assert_eq!(result.chunks_added, 4);
        let tuples = chunk_tuples(&r, "calc.py").await;
        assert_eq!(tuples[0], ("Calculator".to_string(), ElementKind::Class, 0, 5));
    }

    #[tokio::test]
    async fn test_reconcile_twice_same_set_new_ids() {
        let r = reconciler();
        r.reconcile("calc.py", CALCULATOR, LanguageTag::Python)
            .await
            .unwrap();
        let first = chunk_tuples(&r, "calc.py").await;
        let first_ids: Vec<_> = {
            let db = r.db().lock().await;
            let file = db.file_by_path("calc.py").unwrap().unwrap();
            db.list_chunks(file.id).unwrap().into_iter().map(|c| c.id).collect()
        };

        r.reconcile("calc.py", CALCULATOR, LanguageTag::Python)
            .await
            .unwrap();
        let second = chunk_tuples(&r, "calc.py").await;
        assert_eq!(first, second);

        let db = r.db().lock().await;
        assert_eq!(db.list_files().unwrap().len(), 1);
        let file = db.file_by_path("calc.py").unwrap().unwrap();
        let second_ids: Vec<_> = db.list_chunks(file.id).unwrap().into_iter().map(|c| c.id).collect();
        assert!(first_ids.iter().all(|id| !second_ids.contains(id)));
        assert_eq!(db.stats().unwrap().vector_count, 3);
    }

    #[tokio::test]
    async fn test_removed_function_leaves_no_stale_chunk() {
        let r = reconciler();
        let v1 = "def keep():\n    pass\n\ndef drop_me():\n    pass\n";
        let v2 = "def keep():\n    pass\n";
        r.reconcile("m.py", v1, LanguageTag::Python).await.unwrap();
        r.reconcile("m.py", v2, LanguageTag::Python).await.unwrap();

        let tuples = chunk_tuples(&r, "m.py").await;
        assert_eq!(tuples, vec![("keep".to_string(), ElementKind::Function, 0, 1)]);
    }

    #[tokio::test]
    async fn test_other_files_untouched() {
        let r = reconciler();
        r.reconcile("a.py", "def a():\n    pass\n", LanguageTag::Python)
            .await
            .unwrap();
        r.reconcile("b.py", "def b():\n    pass\n", LanguageTag::Python)
            .await
            .unwrap();
        r.reconcile("a.py", "x = 1\n", LanguageTag::Python)
            .await
            .unwrap();

        assert!(chunk_tuples(&r, "a.py").await.is_empty());
        assert_eq!(chunk_tuples(&r, "b.py").await.len(), 1);
    }

    #[tokio::test]
    async fn test_embedding_failure_skips_only_that_element() {
        let r = reconciler_with(Arc::new(PoisonEmbedder(MockEmbedder::new(16))));
        let source = "def fine():\n    pass\n\ndef poison():\n    pass\n\ndef also_fine():\n    pass\n";
        let result = r
            .reconcile("p.py", source, LanguageTag::Python)
            .await
            .unwrap();
        assert_eq!(result.chunks_added, 2);
        assert_eq!(result.chunks_failed, 1);

        let names: Vec<_> = chunk_tuples(&r, "p.py")
            .await
            .into_iter()
            .map(|t| t.0)
            .collect();
        assert_eq!(names, vec!["fine", "also_fine"]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_element_failure() {
        let db = Db::open_in_memory_with_dimensions(8).unwrap();
        let r = IndexReconciler::new(
            Arc::new(TokioMutex::new(db)),
            Arc::new(MockEmbedder::new(16)),
        );
        let result = r
            .reconcile("a.py", "def a():\n    pass\n", LanguageTag::Python)
            .await
            .unwrap();
        assert_eq!(result.chunks_added, 0);
        assert_eq!(result.chunks_failed, 1);
    }

    #[tokio::test]
    async fn test_reopened_index_with_other_width() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        drop(Db::open_with_dimensions(&path, 8).unwrap());

        let db = Db::open_with_dimensions(&path, 16).unwrap();
        let r = IndexReconciler::new(
            Arc::new(TokioMutex::new(db)),
            Arc::new(MockEmbedder::new(16)),
        );
        // width mismatch is reported per element, not as a store failure
        let result = r
            .reconcile("a.py", "def a():\n    pass\n", LanguageTag::Python)
            .await
            .unwrap();
        assert_eq!(result.chunks_added, 0);
        assert_eq!(result.chunks_failed, 1);

        r.db().lock().await.rebuild_vector_index(16).unwrap();
        let result = r
            .reconcile("a.py", "def a():\n    pass\n", LanguageTag::Python)
            .await
            .unwrap();
        assert_eq!(result.chunks_added, 1);
        assert_eq!(result.chunks_failed, 0);
    }

    #[tokio::test]
    async fn test_unsupported_language_is_zero_chunk_result() {
        let r = reconciler();
        let result = r
            .reconcile("notes.txt", "def looks_like_python(): pass", LanguageTag::Unsupported)
            .await
            .unwrap();
        assert_eq!(
            result,
            ReconcileResult {
                files_touched: 1,
                chunks_added: 0,
                chunks_failed: 0
            }
        );
    }

    #[tokio::test]
    async fn test_parse_error_leaves_store_untouched() {
        let r = reconciler().with_parser(Arc::new(BrokenParser));
        let err = r
            .reconcile("a.py", "def a(): pass", LanguageTag::Python)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Parse(ParseError::NoTree)));
        let db = r.db().lock().await;
        assert!(db.file_by_path("a.py").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_source() {
        let r = reconciler();
        let result = r.reconcile("e.py", "", LanguageTag::Python).await.unwrap();
        assert_eq!(result.files_touched, 1);
        assert_eq!(result.chunks_added, 0);
    }

    #[tokio::test]
    async fn test_module_fallback() {
        let r = reconciler().with_module_fallback(1000);
        let result = r
            .reconcile("settings.py", "DEBUG = True\nPORT = 8080\n", LanguageTag::Python)
            .await
            .unwrap();
        assert_eq!(result.chunks_added, 1);
        let tuples = chunk_tuples(&r, "settings.py").await;
        assert_eq!(tuples[0].1, ElementKind::Module);

        // structural elements win over the fallback
        let result = r
            .reconcile("settings.py", "def f():\n    pass\n", LanguageTag::Python)
            .await
            .unwrap();
        assert_eq!(result.chunks_added, 1);
        assert_eq!(chunk_tuples(&r, "settings.py").await[0].1, ElementKind::Function);
    }
}
