use super::Db;
use super::models::FeedbackRecord;
use chrono::Utc;
use rusqlite::{Result, Row, params};

fn map_feedback_row(row: &Row<'_>) -> Result<FeedbackRecord> {
    Ok(FeedbackRecord {
        id: row.get(0)?,
        chunk_id: row.get(1)?,
        feedback_type: row.get(2)?,
        comment: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl Db {
    /// Appends a feedback entry. The chunk is not required to still exist.
    pub fn add_feedback(
        &self,
        chunk_id: &str,
        feedback_type: &str,
        comment: Option<&str>,
    ) -> Result<FeedbackRecord> {
        self.conn.query_row(
            r#"
            INSERT INTO feedback (chunk_id, feedback_type, comment, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, chunk_id, feedback_type, comment, created_at
            "#,
            params![chunk_id, feedback_type, comment, Utc::now()],
            map_feedback_row,
        )
    }

    /// Feedback for a chunk, newest first.
    pub fn list_feedback(&self, chunk_id: &str) -> Result<Vec<FeedbackRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, chunk_id, feedback_type, comment, created_at
             FROM feedback WHERE chunk_id = ?
             ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![chunk_id], map_feedback_row)?;
        rows.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{NewChunk, VectorMetadata};
    use crate::indexer::elements::ElementKind;
    use crate::indexer::identity::ChunkIdentity;

    #[test]
    fn test_add_and_list() {
        let db = Db::open_in_memory().unwrap();
        let first = db.add_feedback("chunk-1", "up", None).unwrap();
        let second = db
            .add_feedback("chunk-1", "comment", Some("explains the parser well"))
            .unwrap();
        db.add_feedback("chunk-2", "down", None).unwrap();

        assert_eq!(first.feedback_type, "up");
        assert!(first.comment.is_none());

        let listed = db.list_feedback("chunk-1").unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[0].comment.as_deref(), Some("explains the parser well"));
        assert!(db.list_feedback("nobody").unwrap().is_empty());
    }

    #[test]
    fn test_feedback_outlives_chunk() {
        let mut db = Db::open_in_memory_with_dimensions(4).unwrap();
        let file = db.upsert_file("a.py", "python").unwrap();
        let id = ChunkIdentity::new().mint();
        let chunk = NewChunk {
            id,
            kind: ElementKind::Function,
            name: "f",
            parent_class: None,
            start_line: 0,
            end_line: 1,
            content: "def f(): pass",
            vector: vec![1.0, 0.0, 0.0, 0.0],
            metadata: VectorMetadata {
                file_path: "a.py".to_string(),
                language: "python".to_string(),
                kind: ElementKind::Function,
                name: "f".to_string(),
                parent_class: None,
                start_line: 0,
                end_line: 1,
            },
        };
        db.replace_file_chunks(file.id, &[chunk]).unwrap();
        db.add_feedback(&id.to_string(), "up", None).unwrap();

        // re-index with nothing: the chunk goes, its feedback stays
        db.replace_file_chunks(file.id, &[]).unwrap();
        assert!(db.get_chunk(&id.to_string()).unwrap().is_none());
        assert_eq!(db.list_feedback(&id.to_string()).unwrap().len(), 1);

        db.delete_file("a.py").unwrap();
        assert_eq!(db.list_feedback(&id.to_string()).unwrap().len(), 1);
    }
}
