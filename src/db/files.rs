use super::models::{ChunkRecord, FileRecord, IndexStats, NewChunk};
use super::Db;
use super::vectors::{VectorIndex, VectorTable};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Result, Row, params};

fn map_file_row(row: &Row<'_>) -> Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        language: row.get(2)?,
        indexed_at: row.get(3)?,
    })
}

fn map_chunk_row(row: &Row<'_>) -> Result<ChunkRecord> {
    let id: String = row.get(0)?;
    let kind: String = row.get(2)?;
    Ok(ChunkRecord {
        id: id
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?,
        file_id: row.get(1)?,
        kind: kind.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(2, Type::Text, e.into())
        })?,
        name: row.get(3)?,
        parent_class: row.get(4)?,
        start_line: row.get::<_, i64>(5)? as usize,
        end_line: row.get::<_, i64>(6)? as usize,
        embedding_id: row.get(7)?,
    })
}

const CHUNK_COLUMNS: &str =
    "id, file_id, type, name, parent_class, start_line, end_line, embedding_id";

/// Removes a file's chunk rows and, through `vectors`, the vectors they point at.
fn delete_chunks_in(conn: &Connection, vectors: &VectorTable<'_>, file_id: i64) -> Result<usize> {
    let mut stmt = conn.prepare("SELECT embedding_id FROM chunks WHERE file_id = ?")?;
    let stale = stmt
        .query_map(params![file_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>>>()?;
    let stale: Vec<&str> = stale.iter().map(String::as_str).collect();
    vectors.delete(&stale)?;
    conn.execute("DELETE FROM chunks WHERE file_id = ?", params![file_id])
}

impl Db {
    /// Inserts the file row, or refreshes `indexed_at` if `path` is already known.
    pub fn upsert_file(&self, path: &str, language: &str) -> Result<FileRecord> {
        self.conn.query_row(
            r#"
            INSERT INTO files (path, language, indexed_at)
            VALUES (?, ?, ?)
            ON CONFLICT(path) DO UPDATE SET
                language = excluded.language,
                indexed_at = excluded.indexed_at
            RETURNING id, path, language, indexed_at
            "#,
            params![path, language, Utc::now()],
            map_file_row,
        )
    }

    pub fn file_by_path(&self, path: &str) -> Result<Option<FileRecord>> {
        self.conn
            .query_row(
                "SELECT id, path, language, indexed_at FROM files WHERE path = ?",
                params![path],
                map_file_row,
            )
            .optional()
    }

    pub fn list_files(&self) -> Result<Vec<FileRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, path, language, indexed_at FROM files ORDER BY path")?;
        let rows = stmt.query_map([], map_file_row)?;
        rows.collect()
    }

    pub fn list_chunks(&self, file_id: i64) -> Result<Vec<ChunkRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CHUNK_COLUMNS} FROM chunks WHERE file_id = ? ORDER BY start_line, end_line"
        ))?;
        let rows = stmt.query_map(params![file_id], map_chunk_row)?;
        rows.collect()
    }

    pub fn get_chunk(&self, chunk_id: &str) -> Result<Option<ChunkRecord>> {
        self.conn
            .query_row(
                &format!("SELECT {CHUNK_COLUMNS} FROM chunks WHERE id = ?"),
                params![chunk_id],
                map_chunk_row,
            )
            .optional()
    }

    /// Swaps a file's chunk set in one transaction: stale chunks and vectors
    /// are deleted, then each new vector and chunk row is written.
    ///
    /// Readers see either the old set or the new one, never an empty gap.
    pub fn replace_file_chunks(&mut self, file_id: i64, chunks: &[NewChunk<'_>]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let vectors = VectorTable::new(&tx, self.dimensions);

        let removed = delete_chunks_in(&tx, &vectors, file_id)?;

        for chunk in chunks {
            let embedding_id = chunk.id.to_string();
            vectors.upsert(&embedding_id, chunk.content, &chunk.vector, &chunk.metadata)?;
            tx.execute(
                &format!("INSERT INTO chunks ({CHUNK_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"),
                params![
                    embedding_id,
                    file_id,
                    chunk.kind.as_str(),
                    chunk.name,
                    chunk.parent_class,
                    chunk.start_line as i64,
                    chunk.end_line as i64,
                    embedding_id,
                ],
            )?;
        }

        tx.commit()?;
        Ok(removed)
    }

    /// Deletes a file, its chunks (cascade) and their vectors.
    pub fn delete_file(&mut self, path: &str) -> Result<bool> {
        let Some(file) = self.file_by_path(path)? else {
            return Ok(false);
        };
        let tx = self.conn.transaction()?;
        delete_chunks_in(&tx, &VectorTable::new(&tx, self.dimensions), file.id)?;
        let rows = tx.execute("DELETE FROM files WHERE id = ?", params![file.id])?;
        tx.commit()?;
        Ok(rows > 0)
    }

    /// Most recent successful reconciliation across all files.
    pub fn last_indexed(&self) -> Result<Option<DateTime<Utc>>> {
        self.conn
            .query_row(
                "SELECT indexed_at FROM files ORDER BY indexed_at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn stats(&self) -> Result<IndexStats> {
        let count = |sql: &str| -> Result<usize> {
            self.conn
                .query_row(sql, [], |row| row.get::<_, i64>(0))
                .map(|n| n as usize)
        };

        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT language FROM files WHERE language IS NOT NULL ORDER BY language",
        )?;
        let languages = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>>>()?;

        Ok(IndexStats {
            file_count: count("SELECT COUNT(*) FROM files")?,
            chunk_count: count("SELECT COUNT(*) FROM chunks")?,
            vector_count: count("SELECT COUNT(*) FROM embeddings")?,
            feedback_count: count("SELECT COUNT(*) FROM feedback")?,
            dimensions: self.dimensions,
            languages,
            last_indexed: self.last_indexed()?,
        })
    }

    /// Drops every file, chunk, vector and feedback entry.
    pub fn clear(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DELETE FROM feedback;
             DELETE FROM vec_embeddings;
             DELETE FROM embeddings;
             DELETE FROM chunks;
             DELETE FROM files;",
        )?;
        tx.commit()
    }
}
