//! Turso Embedded / libSQL storage sink (offline mode).
//!
//! The [`Storage`] struct wraps a libSQL database holding the denormalized
//! document collections and the search documents, with an FTS5 index over
//! the latter.
//!
//! **Access rules:**
//! - `courseforge convert` is the sole writer, via [`Storage::open`]
//! - `courseforge search` reads through [`Storage::open_readonly`]
//!
//! Documents are upserted wholesale. A SHA-256 hash of the serialized body
//! is kept per row, so re-running a conversion over an unchanged course
//! rewrites nothing.

mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use courseforge_documents::{DocumentSet, SearchDoc};
use courseforge_shared::{CourseError, Result};

/// Collection names in the document store.
pub const COURSE_COLLECTION: &str = "course";
pub const EXAM_COLLECTION: &str = "exam";
pub const QUESTION_COLLECTION: &str = "question";
pub const VERSIONED_CONTENT_COLLECTION: &str = "versioned_content";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// What an upsert did to the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// The stored hash matched; nothing was written.
    Unchanged,
}

/// Per-run totals from [`Storage::store_document_set`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub search_docs: usize,
}

impl StoreReport {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CourseError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(CourseError::Storage(format!(
                "database {} does not exist",
                path.display()
            )));
        }
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        CourseError::Storage(format!("migration v{} failed: {e}", migration.version))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(CourseError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Document store
    // -----------------------------------------------------------------------

    /// Upsert one serialized document keyed by `(collection, id)`.
    pub async fn upsert_document(
        &self,
        collection: &str,
        id: &str,
        course_id: &str,
        body: &str,
    ) -> Result<UpsertOutcome> {
        self.check_writable()?;
        let hash = content_hash(body);

        let mut rows = self
            .conn
            .query(
                "SELECT content_hash FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )
            .await
            .map_err(storage_err)?;
        let existing: Option<String> = match rows.next().await.map_err(storage_err)? {
            Some(row) => Some(row.get::<String>(0).map_err(storage_err)?),
            None => None,
        };
        if existing.as_deref() == Some(hash.as_str()) {
            return Ok(UpsertOutcome::Unchanged);
        }

        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO documents (collection, id, course_id, content_hash, body, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(collection, id) DO UPDATE SET
                   course_id = excluded.course_id,
                   content_hash = excluded.content_hash,
                   body = excluded.body,
                   updated_at = excluded.updated_at",
                params![collection, id, course_id, hash.as_str(), body, now.as_str()],
            )
            .await
            .map_err(storage_err)?;

        Ok(if existing.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    /// Fetch a document body as JSON.
    pub async fn get_document(&self, collection: &str, id: &str) -> Result<Option<serde_json::Value>> {
        let mut rows = self
            .conn
            .query(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => {
                let body: String = row.get(0).map_err(storage_err)?;
                let value = serde_json::from_str(&body).map_err(|e| {
                    CourseError::Storage(format!("{collection}/{id} holds invalid JSON: {e}"))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Number of documents in `collection`.
    pub async fn count_documents(&self, collection: &str) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                params![collection],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => row.get::<i64>(0).map(|n| n as u64).map_err(storage_err),
            None => Ok(0),
        }
    }

    // -----------------------------------------------------------------------
    // Search index
    // -----------------------------------------------------------------------

    /// Upsert a search document into `index_name`, keyed by its global id.
    pub async fn upsert_search_doc(&self, index_name: &str, doc: &SearchDoc) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO search_docs (index_name, id, doc_type, title, headline, text_content,
                                          code_content, course_id, unit_id, section_id, card_id, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(index_name, id) DO UPDATE SET
                   doc_type = excluded.doc_type,
                   title = excluded.title,
                   headline = excluded.headline,
                   text_content = excluded.text_content,
                   code_content = excluded.code_content,
                   course_id = excluded.course_id,
                   unit_id = excluded.unit_id,
                   section_id = excluded.section_id,
                   card_id = excluded.card_id,
                   updated_at = excluded.updated_at",
                params![
                    index_name,
                    doc.id.as_str(),
                    doc.doc_type.as_str(),
                    doc.title.as_str(),
                    doc.headline.as_str(),
                    doc.text_content.as_str(),
                    doc.code_content.as_str(),
                    doc.course_id.as_str(),
                    doc.unit_id.as_str(),
                    doc.section_id.as_str(),
                    doc.card_id.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Full-text search within one index. Every whitespace-separated term
    /// must match.
    pub async fn search(&self, index_name: &str, query: &str, limit: u32) -> Result<Vec<SearchHit>> {
        let Some(query) = fts_query(query) else {
            return Ok(Vec::new());
        };
        let mut rows = self
            .conn
            .query(
                "SELECT s.id, s.doc_type, s.title, s.headline, s.course_id, rank
                 FROM search_docs_fts fts
                 JOIN search_docs s ON s.rowid = fts.rowid
                 WHERE search_docs_fts MATCH ?1 AND s.index_name = ?2
                 ORDER BY rank
                 LIMIT ?3",
                params![query.as_str(), index_name, limit],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(SearchHit {
                id: row.get(0).map_err(storage_err)?,
                doc_type: row.get(1).map_err(storage_err)?,
                title: row.get(2).map_err(storage_err)?,
                headline: row.get(3).map_err(storage_err)?,
                course_id: row.get(4).map_err(storage_err)?,
                score: row.get(5).unwrap_or(0.0),
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Document sets
    // -----------------------------------------------------------------------

    /// Write a whole document set: the document collections first, then the
    /// search documents. The two sinks are written independently; a failure
    /// in the second leaves the first in place.
    #[instrument(skip_all, fields(course = %set.course.id, index = index_name))]
    pub async fn store_document_set(&self, set: &DocumentSet, index_name: &str) -> Result<StoreReport> {
        self.check_writable()?;
        let course_id = set.course.id.as_str();
        let mut report = StoreReport::default();

        for question in &set.questions {
            let body = to_body(QUESTION_COLLECTION, &question.id, question)?;
            report.record(
                self.upsert_document(QUESTION_COLLECTION, &question.id, course_id, &body)
                    .await?,
            );
        }
        for content in &set.versioned_contents {
            let body = to_body(VERSIONED_CONTENT_COLLECTION, &content.id, content)?;
            report.record(
                self.upsert_document(VERSIONED_CONTENT_COLLECTION, &content.id, course_id, &body)
                    .await?,
            );
        }
        for exam in &set.exams {
            let body = to_body(EXAM_COLLECTION, &exam.id, exam)?;
            report.record(
                self.upsert_document(EXAM_COLLECTION, &exam.id, course_id, &body)
                    .await?,
            );
        }
        let body = to_body(COURSE_COLLECTION, course_id, &set.course)?;
        report.record(
            self.upsert_document(COURSE_COLLECTION, course_id, course_id, &body)
                .await?,
        );
        debug!(
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            "document store written"
        );

        for doc in &set.search_docs {
            self.upsert_search_doc(index_name, doc).await?;
            report.search_docs += 1;
        }

        info!(
            documents = report.inserted + report.updated + report.unchanged,
            unchanged = report.unchanged,
            search_docs = report.search_docs,
            "document set stored"
        );
        Ok(report)
    }
}

/// A search result from FTS5.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// Global identifier of the matched entity.
    pub id: String,
    pub doc_type: String,
    pub title: String,
    pub headline: String,
    pub course_id: String,
    /// FTS5 rank score (lower is better).
    pub score: f64,
}

/// Hex SHA-256 of a document body.
pub fn content_hash(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Quote each term so user input never reaches the FTS5 query grammar.
fn fts_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|t| t.replace('"', ""))
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();
    (!terms.is_empty()).then(|| terms.join(" "))
}

fn to_body<T: Serialize>(collection: &str, id: &str, value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| CourseError::Storage(format!("failed to serialize {collection}/{id}: {e}")))
}

fn storage_err(e: libsql::Error) -> CourseError {
    CourseError::Storage(e.to_string())
}
