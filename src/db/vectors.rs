use super::models::{SearchHit, VectorMetadata};
use super::{Db, serialize_vector};
use rusqlite::types::Type;
use rusqlite::{Connection, Result, params};

/// Storage and nearest-neighbour lookup of embedding vectors.
pub trait VectorIndex {
    /// Insert or replace the vector stored under `id`.
    fn upsert(
        &self,
        id: &str,
        content: &str,
        vector: &[f32],
        metadata: &VectorMetadata,
    ) -> Result<()>;

    /// `k` nearest vectors by cosine distance, closest first.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>>;

    /// Remove the given ids; returns how many existed.
    fn delete(&self, ids: &[&str]) -> Result<usize>;
}

/// The vector tables as seen through one connection or open transaction.
///
/// Writes made through a view over a transaction commit or roll back with it.
pub struct VectorTable<'c> {
    conn: &'c Connection,
    dimensions: usize,
}

impl<'c> VectorTable<'c> {
    pub(crate) fn new(conn: &'c Connection, dimensions: usize) -> Self {
        Self { conn, dimensions }
    }
}

fn dimension_error(expected: usize, actual: usize) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(
        format!("vector has {actual} dimensions, index expects {expected}").into(),
    )
}

fn map_hit_row(row: &rusqlite::Row<'_>) -> Result<SearchHit> {
    let metadata_json: String = row.get(2)?;
    let metadata: VectorMetadata = serde_json::from_str(&metadata_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    let distance: f64 = row.get(3)?;

    Ok(SearchHit {
        embedding_id: row.get(0)?,
        content: row.get(1)?,
        metadata,
        similarity: 1.0 - (distance / 2.0),
    })
}

impl VectorIndex for VectorTable<'_> {
    fn upsert(
        &self,
        id: &str,
        content: &str,
        vector: &[f32],
        metadata: &VectorMetadata,
    ) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(dimension_error(self.dimensions, vector.len()));
        }
        let metadata_json = serde_json::to_string(metadata)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

        let rowid: i64 = self.conn.query_row(
            r#"
            INSERT INTO embeddings (embedding_id, file_path, content, metadata)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(embedding_id) DO UPDATE SET
                file_path = excluded.file_path,
                content = excluded.content,
                metadata = excluded.metadata
            RETURNING id
            "#,
            params![id, metadata.file_path, content, metadata_json],
            |row| row.get(0),
        )?;

        // vec0 rows cannot be updated in place
        self.conn
            .execute("DELETE FROM vec_embeddings WHERE rowid = ?", params![rowid])?;
        self.conn.execute(
            "INSERT INTO vec_embeddings (rowid, embedding) VALUES (?, ?)",
            params![rowid, serialize_vector(vector)],
        )?;
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimensions {
            return Err(dimension_error(self.dimensions, query.len()));
        }
        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                e.embedding_id,
                e.content,
                e.metadata,
                vec_distance_cosine(v.embedding, ?) AS distance
            FROM vec_embeddings v
            JOIN embeddings e ON e.id = v.rowid
            ORDER BY distance ASC
            LIMIT ?
            "#,
        )?;
        let rows = stmt.query_map(params![serialize_vector(query), k as i64], map_hit_row)?;
        rows.collect()
    }

    fn delete(&self, ids: &[&str]) -> Result<usize> {
        let mut removed = 0;
        for id in ids {
            self.conn.execute(
                "DELETE FROM vec_embeddings WHERE rowid IN (SELECT id FROM embeddings WHERE embedding_id = ?)",
                params![id],
            )?;
            removed += self
                .conn
                .execute("DELETE FROM embeddings WHERE embedding_id = ?", params![id])?;
        }
        Ok(removed)
    }
}

impl Db {
    /// Vector view over the main connection.
    pub(crate) fn vectors(&self) -> VectorTable<'_> {
        VectorTable::new(&self.conn, self.dimensions)
    }
}

impl VectorIndex for Db {
    fn upsert(
        &self,
        id: &str,
        content: &str,
        vector: &[f32],
        metadata: &VectorMetadata,
    ) -> Result<()> {
        self.vectors().upsert(id, content, vector, metadata)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.vectors().search(query, k)
    }

    fn delete(&self, ids: &[&str]) -> Result<usize> {
        self.vectors().delete(ids)
    }
}
