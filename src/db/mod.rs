//! Metadata store and vector index on SQLite + sqlite-vec.
//!
//! One database file holds the relational chunk registry (`files`, `chunks`,
//! `feedback`) and the embedding index (`embeddings` + the `vec_embeddings`
//! vec0 table keyed by the same rowid).
use rusqlite::{Connection, OptionalExtension, Result};
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;
use tracing::{info, warn};

pub mod feedback;
pub mod files;
pub mod models;
pub mod vectors;

pub use vectors::{VectorIndex, VectorTable};

/// Embedding width used when none is given.
pub const DEFAULT_DIMENSIONS: usize = 384;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    language TEXT,
    indexed_at DATETIME NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    file_id INTEGER NOT NULL,
    type TEXT NOT NULL,
    name TEXT NOT NULL,
    parent_class TEXT,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    embedding_id TEXT NOT NULL,
    FOREIGN KEY (file_id) REFERENCES files(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_chunks_file ON chunks(file_id);
CREATE INDEX IF NOT EXISTS idx_chunks_name ON chunks(name);

-- chunk_id is a weak reference: feedback outlives re-indexed chunks
CREATE TABLE IF NOT EXISTS feedback (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chunk_id TEXT NOT NULL,
    feedback_type TEXT NOT NULL,
    comment TEXT,
    created_at DATETIME NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_feedback_chunk ON feedback(chunk_id);

CREATE TABLE IF NOT EXISTS embeddings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    embedding_id TEXT NOT NULL UNIQUE,
    file_path TEXT NOT NULL,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL
);
"#;

fn vector_table_sql(dimensions: usize) -> String {
    format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS vec_embeddings USING vec0(embedding FLOAT[{dimensions}]);"
    )
}

/// Width of an existing `vec_embeddings` table, read back from its DDL.
fn stored_vector_width(conn: &Connection) -> Result<Option<usize>> {
    let sql: Option<String> = conn
        .query_row(
            "SELECT sql FROM sqlite_master WHERE name = 'vec_embeddings'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(sql.as_deref().and_then(parse_vector_width))
}

fn parse_vector_width(sql: &str) -> Option<usize> {
    let lower = sql.to_ascii_lowercase();
    let start = lower.find("float[")? + "float[".len();
    let end = start + lower[start..].find(']')?;
    lower[start..end].trim().parse().ok()
}

static INIT_VEC: Once = Once::new();

/// Initialize the sqlite-vec extension. Safe to call multiple times.
fn init_sqlite_vec() {
    INIT_VEC.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// A SQLite connection initialized with sqlite-vec and the index schema.
pub struct Db {
    pub(crate) conn: Connection,
    dimensions: usize,
}

impl Db {
    /// Open (or create) the database at `path` with the default embedding width.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_dimensions(path, DEFAULT_DIMENSIONS)
    }

    pub fn open_with_dimensions<P: AsRef<Path>>(path: P, dimensions: usize) -> Result<Self> {
        let path = path.as_ref();
        info!("Initializing database: {}", path.display());
        init_sqlite_vec();
        let conn = Connection::open(path)?;
        Self::init(conn, dimensions)
    }

    /// Open an in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with_dimensions(DEFAULT_DIMENSIONS)
    }

    pub fn open_in_memory_with_dimensions(dimensions: usize) -> Result<Self> {
        init_sqlite_vec();
        let conn = Connection::open_in_memory()?;
        Self::init(conn, dimensions)
    }

    fn init(conn: Connection, dimensions: usize) -> Result<Self> {
        let vec_version: String = conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;
        info!("sqlite-vec version: {}", vec_version);

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL)?;

        // an existing vector table keeps the width it was built with
        let dimensions = match stored_vector_width(&conn)? {
            Some(stored) => {
                if stored != dimensions {
                    warn!(
                        "vector index was built with {stored} dimensions, {dimensions} requested; keeping {stored}"
                    );
                }
                stored
            }
            None => {
                conn.execute_batch(&vector_table_sql(dimensions))?;
                dimensions
            }
        };

        Ok(Self { conn, dimensions })
    }

    /// Width of the vectors this index stores.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Drops every chunk and vector and recreates the vector table at
    /// `dimensions`. File rows and feedback are kept.
    pub fn rebuild_vector_index(&mut self, dimensions: usize) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DELETE FROM chunks;
             DELETE FROM embeddings;
             DROP TABLE IF EXISTS vec_embeddings;",
        )?;
        tx.execute_batch(&vector_table_sql(dimensions))?;
        tx.commit()?;
        info!("vector index rebuilt with {dimensions} dimensions");
        self.dimensions = dimensions;
        Ok(())
    }
}

/// Helper to serialize a float32 vector into bytes for vec0 virtual table
pub fn serialize_vector(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}
