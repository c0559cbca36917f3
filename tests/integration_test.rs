//! End-to-end tests for the devflow pipeline.
//!
//! walk → reconcile → list → feedback → re-index → search → forget
use devflow::db::{Db, VectorIndex};
use devflow::embedder::mock::MockEmbedder;
use devflow::embedder::{Embedder, embedding_text};
use devflow::indexer::extractor::extract;
use devflow::indexer::{
    ElementKind, IndexOptions, IndexReconciler, Indexer, LanguageTag, SyntaxParser,
    TreeSitterParser,
};
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;
use tokio::sync::Mutex as TokioMutex;

const CALCULATOR_V1: &str = r#"class Calculator:
    """Basic arithmetic."""

    def add(self, a, b):
        """Add two numbers."""
        return a + b

    def subtract(self, a, b):
        return a - b

def greet(name):
    # say hello
    return "hello " + name
"#;

const CALCULATOR_V2: &str = r#"class Calculator:
    """Basic arithmetic."""

    def add(self, a, b):
        """Add two numbers."""
        return a + b

def greet(name):
    return "hello " + name
"#;

const SERVICE_TS: &str = r#"class Service {
  start() {}
}

function boot(): void {
  new Service().start();
}
"#;

fn reconciler(db: Db) -> IndexReconciler {
    IndexReconciler::new(Arc::new(TokioMutex::new(db)), Arc::new(MockEmbedder::new(32)))
}

#[tokio::test]
async fn test_full_pipeline() {
    let temp_dir = tempdir().unwrap();
    let src = temp_dir.path().join("src");
    fs::create_dir_all(&src).unwrap();
    let calc_path = src.join("calc.py");
    fs::write(&calc_path, CALCULATOR_V1).unwrap();
    fs::write(src.join("service.ts"), SERVICE_TS).unwrap();
    fs::write(src.join("notes.txt"), "plain text").unwrap();

    let db = Db::open_with_dimensions(temp_dir.path().join("index.db"), 32).unwrap();
    let r = reconciler(db);
    let indexer = Indexer::new(&r);

    // 1. first run
    let summary = indexer.index_directory(&src, &IndexOptions::default()).await;
    assert_eq!(summary.files_processed, 2, "txt files are not picked up");
    assert_eq!(summary.files_failed, 0);
    // add, subtract, greet, boot
    assert_eq!(summary.chunks_added, 4);

    let calc_key = calc_path.to_string_lossy().replace('\\', "/");
    let (add_id, first_ids) = {
        let db = r.db().lock().await;
        let files = db.list_files().unwrap();
        assert_eq!(files.len(), 2);
        let calc = db.file_by_path(&calc_key).unwrap().unwrap();
        assert_eq!(calc.language.as_deref(), Some("python"));

        let chunks = db.list_chunks(calc.id).unwrap();
        let names: Vec<_> = chunks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["add", "subtract", "greet"]);
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
        let add = chunks.iter().find(|c| c.name == "add").unwrap();
        (
            add.id.to_string(),
            chunks.iter().map(|c| c.id).collect::<Vec<_>>(),
        )
    };

    // 2. feedback on a chunk
    {
        let db = r.db().lock().await;
        db.add_feedback(&add_id, "helpful", Some("clear example"))
            .unwrap();
        assert_eq!(db.list_feedback(&add_id).unwrap().len(), 1);
    }

    // 3. edit the file and re-index: subtract disappears, ids are fresh
    fs::write(&calc_path, CALCULATOR_V2).unwrap();
    let summary = indexer.index_directory(&src, &IndexOptions::default()).await;
    assert_eq!(summary.chunks_added, 3);
    {
        let db = r.db().lock().await;
        let calc = db.file_by_path(&calc_key).unwrap().unwrap();
        let chunks = db.list_chunks(calc.id).unwrap();
        let tuples: Vec<_> = chunks
            .iter()
            .map(|c| (c.name.as_str(), c.kind, c.start_line, c.end_line))
            .collect();
        assert_eq!(
            tuples,
            vec![
                ("add", ElementKind::Method, 3, 5),
                ("greet", ElementKind::Function, 7, 8),
            ]
        );
        assert!(chunks.iter().all(|c| !first_ids.contains(&c.id)));

        // the old chunk is gone but its feedback is kept
        assert!(db.get_chunk(&add_id).unwrap().is_none());
        assert_eq!(db.list_feedback(&add_id).unwrap().len(), 1);

        let stats = db.stats().unwrap();
        assert_eq!(stats.file_count, 2);
        assert_eq!(stats.chunk_count, 3);
        assert_eq!(stats.vector_count, 3);
        assert_eq!(stats.languages, vec!["python", "typescript"]);
        assert!(stats.last_indexed.is_some());
    }

    // 4. search finds a chunk by the exact text it was embedded from
    let tree = TreeSitterParser::new()
        .parse(CALCULATOR_V2, LanguageTag::Python)
        .unwrap();
    let elements = extract(&tree, CALCULATOR_V2, LanguageTag::Python);
    let greet = elements.functions().next().unwrap();
    let query = r
        .embedder()
        .embed(&embedding_text(greet, LanguageTag::Python))
        .unwrap();
    {
        let db = r.db().lock().await;
        let hits = db.search(&query, 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].metadata.name, "greet");
        assert_eq!(hits[0].metadata.file_path, calc_key);
        assert!(hits[0].similarity > 0.99);
        assert!(hits[0].similarity >= hits[1].similarity);
    }

    // 5. forget the python file
    {
        let mut db = r.db().lock().await;
        assert!(db.delete_file(&calc_key).unwrap());
        let stats = db.stats().unwrap();
        assert_eq!(stats.file_count, 1);
        assert_eq!(stats.chunk_count, 1);
        assert_eq!(stats.vector_count, 1);
    }
}

#[tokio::test]
async fn test_reopen_database_keeps_index() {
    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("index.db");
    fs::write(temp_dir.path().join("lib.rs"), "struct S;\n\nimpl S {\n    fn go(&self) {}\n}\n\nfn main() {}\n").unwrap();

    {
        let r = reconciler(Db::open_with_dimensions(&db_path, 32).unwrap());
        let summary = Indexer::new(&r)
            .index_directory(temp_dir.path(), &IndexOptions::default())
            .await;
        assert_eq!(summary.chunks_added, 2);
    }

    let db = Db::open_with_dimensions(&db_path, 32).unwrap();
    let files = db.list_files().unwrap();
    assert_eq!(files.len(), 1);
    let chunks = db.list_chunks(files[0].id).unwrap();
    assert_eq!(chunks[0].name, "go");
    assert_eq!(chunks[0].kind, ElementKind::Method);
    assert_eq!(chunks[0].parent_class.as_deref(), Some("S"));
    assert_eq!(chunks[1].name, "main");
    assert_eq!(chunks[1].kind, ElementKind::Function);
}
