use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::{Pool, Runtime};
use std::sync::Mutex;
use tokio_postgres::{NoTls, Row};

use crate::types::{Document, Feedback, NewDocument, SavedQuery};

const SCHEMA_SQL: &str = include_str!("../../../schema.sql");

const DOC_COLUMNS: &str = "id, name, doc_type, jurisdiction, status, content, \
                           feedback_rating, feedback_comment, user_id, created_at";

const QUERY_COLUMNS: &str = "id, user_id, query, jurisdiction, answer, created_at";

/// Generic data-access layer for documents and saved research queries.
///
/// Documents are only ever inserted, read, or updated with feedback. Saved
/// queries are scoped to their owner: every read and delete filters on `user_id`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_document(&self, doc: &NewDocument) -> Result<Document>;

    async fn get_document(&self, id: i64) -> Result<Option<Document>>;

    /// Newest first. `None` lists every document.
    async fn list_documents(&self, user_id: Option<&str>) -> Result<Vec<Document>>;

    /// Returns the updated document, or `None` when `id` does not exist.
    async fn update_feedback(&self, id: i64, feedback: &Feedback) -> Result<Option<Document>>;

    async fn insert_saved_query(
        &self,
        user_id: &str,
        query: &str,
        jurisdiction: &str,
        answer: &str,
    ) -> Result<SavedQuery>;

    async fn list_saved_queries(&self, user_id: &str) -> Result<Vec<SavedQuery>>;

    /// Returns false when no row with that id belongs to `user_id`.
    async fn delete_saved_query(&self, id: i64, user_id: &str) -> Result<bool>;
}

// ── Row mappers ───────────────────────────────────────────────────────────

fn row_to_document(row: &Row) -> Result<Document, tokio_postgres::Error> {
    Ok(Document {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        doc_type: row.try_get("doc_type")?,
        jurisdiction: row.try_get("jurisdiction")?,
        status: row.try_get("status")?,
        content: row.try_get("content")?,
        feedback_rating: row.try_get("feedback_rating")?,
        feedback_comment: row.try_get("feedback_comment")?,
        user_id: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_saved_query(row: &Row) -> Result<SavedQuery, tokio_postgres::Error> {
    Ok(SavedQuery {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        query: row.try_get("query")?,
        jurisdiction: row.try_get("jurisdiction")?,
        answer: row.try_get("answer")?,
        created_at: row.try_get("created_at")?,
    })
}

// ── Postgres ──────────────────────────────────────────────────────────────

pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn connect(database_url: &str) -> Result<Self> {
        let mut cfg = deadpool_postgres::Config::new();
        cfg.url = Some(database_url.to_string());
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .context("failed to create postgres pool")?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        let client = self.pool.get().await.context("postgres pool checkout")?;
        client
            .batch_execute(SCHEMA_SQL)
            .await
            .context("schema migration failed")?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn insert_document(&self, doc: &NewDocument) -> Result<Document> {
        let client = self.pool.get().await?;
        let sql = format!(
            "INSERT INTO documents (name, doc_type, jurisdiction, status, content, user_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {DOC_COLUMNS}"
        );
        let row = client
            .query_one(
                sql.as_str(),
                &[
                    &doc.name,
                    &doc.doc_type,
                    &doc.jurisdiction,
                    &doc.status,
                    &doc.content,
                    &doc.user_id,
                ],
            )
            .await?;
        Ok(row_to_document(&row)?)
    }

    async fn get_document(&self, id: i64) -> Result<Option<Document>> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {DOC_COLUMNS} FROM documents WHERE id = $1");
        let row = client.query_opt(sql.as_str(), &[&id]).await?;
        Ok(row.as_ref().map(row_to_document).transpose()?)
    }

    async fn list_documents(&self, user_id: Option<&str>) -> Result<Vec<Document>> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {DOC_COLUMNS} FROM documents \
             WHERE ($1::TEXT IS NULL OR user_id = $1) \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = client.query(sql.as_str(), &[&user_id]).await?;
        Ok(rows
            .iter()
            .map(row_to_document)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn update_feedback(&self, id: i64, feedback: &Feedback) -> Result<Option<Document>> {
        let client = self.pool.get().await?;
        let sql = format!(
            "UPDATE documents SET feedback_rating = $2, feedback_comment = $3, status = 'reviewed' \
             WHERE id = $1 RETURNING {DOC_COLUMNS}"
        );
        let row = client
            .query_opt(sql.as_str(), &[&id, &feedback.rating, &feedback.comment])
            .await?;
        Ok(row.as_ref().map(row_to_document).transpose()?)
    }

    async fn insert_saved_query(
        &self,
        user_id: &str,
        query: &str,
        jurisdiction: &str,
        answer: &str,
    ) -> Result<SavedQuery> {
        let client = self.pool.get().await?;
        let sql = format!(
            "INSERT INTO saved_queries (user_id, query, jurisdiction, answer) \
             VALUES ($1, $2, $3, $4) RETURNING {QUERY_COLUMNS}"
        );
        let row = client
            .query_one(sql.as_str(), &[&user_id, &query, &jurisdiction, &answer])
            .await?;
        Ok(row_to_saved_query(&row)?)
    }

    async fn list_saved_queries(&self, user_id: &str) -> Result<Vec<SavedQuery>> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {QUERY_COLUMNS} FROM saved_queries WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = client.query(sql.as_str(), &[&user_id]).await?;
        Ok(rows
            .iter()
            .map(row_to_saved_query)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn delete_saved_query(&self, id: i64, user_id: &str) -> Result<bool> {
        let client = self.pool.get().await?;
        let n = client
            .execute(
                "DELETE FROM saved_queries WHERE id = $1 AND user_id = $2",
                &[&id, &user_id],
            )
            .await?;
        Ok(n > 0)
    }
}

// ── In-memory ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct MemoryInner {
    documents: Vec<Document>,
    queries: Vec<SavedQuery>,
    next_id: i64,
}

impl MemoryInner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store used when no `DATABASE_URL` is configured, and in tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Documents in insertion order.
    pub fn documents(&self) -> Vec<Document> {
        self.lock().documents.clone()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_document(&self, doc: &NewDocument) -> Result<Document> {
        let mut inner = self.lock();
        let document = Document {
            id: inner.next_id(),
            name: doc.name.clone(),
            doc_type: doc.doc_type.clone(),
            jurisdiction: doc.jurisdiction.clone(),
            status: doc.status.clone(),
            content: doc.content.clone(),
            feedback_rating: None,
            feedback_comment: None,
            user_id: doc.user_id.clone(),
            created_at: Utc::now(),
        };
        inner.documents.push(document.clone());
        Ok(document)
    }

    async fn get_document(&self, id: i64) -> Result<Option<Document>> {
        Ok(self.lock().documents.iter().find(|d| d.id == id).cloned())
    }

    async fn list_documents(&self, user_id: Option<&str>) -> Result<Vec<Document>> {
        let inner = self.lock();
        Ok(inner
            .documents
            .iter()
            .rev()
            .filter(|d| user_id.is_none() || d.user_id.as_deref() == user_id)
            .cloned()
            .collect())
    }

    async fn update_feedback(&self, id: i64, feedback: &Feedback) -> Result<Option<Document>> {
        let mut inner = self.lock();
        let Some(doc) = inner.documents.iter_mut().find(|d| d.id == id) else {
            return Ok(None);
        };
        doc.feedback_rating = feedback.rating;
        doc.feedback_comment = feedback.comment.clone();
        doc.status = "reviewed".into();
        Ok(Some(doc.clone()))
    }

    async fn insert_saved_query(
        &self,
        user_id: &str,
        query: &str,
        jurisdiction: &str,
        answer: &str,
    ) -> Result<SavedQuery> {
        let mut inner = self.lock();
        let saved = SavedQuery {
            id: inner.next_id(),
            user_id: user_id.to_string(),
            query: query.to_string(),
            jurisdiction: jurisdiction.to_string(),
            answer: answer.to_string(),
            created_at: Utc::now(),
        };
        inner.queries.push(saved.clone());
        Ok(saved)
    }

    async fn list_saved_queries(&self, user_id: &str) -> Result<Vec<SavedQuery>> {
        let inner = self.lock();
        Ok(inner
            .queries
            .iter()
            .rev()
            .filter(|q| q.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_saved_query(&self, id: i64, user_id: &str) -> Result<bool> {
        let mut inner = self.lock();
        let before = inner.queries.len();
        inner
            .queries
            .retain(|q| !(q.id == id && q.user_id == user_id));
        Ok(inner.queries.len() < before)
    }
}
