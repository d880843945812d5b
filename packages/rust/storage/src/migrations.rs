//! SQL migration definitions for the courseforge document store.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: documents, search_docs, FTS5",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Document store: one row per (collection, id)
CREATE TABLE IF NOT EXISTS documents (
    collection   TEXT NOT NULL,
    id           TEXT NOT NULL,
    course_id    TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    body         TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    PRIMARY KEY (collection, id)
);

CREATE INDEX IF NOT EXISTS idx_documents_course ON documents(course_id);

-- Search documents, partitioned by index name
CREATE TABLE IF NOT EXISTS search_docs (
    index_name   TEXT NOT NULL,
    id           TEXT NOT NULL,
    doc_type     TEXT NOT NULL,
    title        TEXT NOT NULL,
    headline     TEXT NOT NULL,
    text_content TEXT NOT NULL,
    code_content TEXT NOT NULL,
    course_id    TEXT NOT NULL,
    unit_id      TEXT NOT NULL,
    section_id   TEXT NOT NULL,
    card_id      TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    UNIQUE(index_name, id)
);

CREATE INDEX IF NOT EXISTS idx_search_docs_course ON search_docs(course_id);

-- Full-text search over search documents
CREATE VIRTUAL TABLE IF NOT EXISTS search_docs_fts USING fts5(
    title,
    headline,
    text_content,
    code_content,
    content=search_docs,
    content_rowid=rowid
);

-- Triggers to keep FTS in sync with search_docs
CREATE TRIGGER IF NOT EXISTS search_docs_fts_insert AFTER INSERT ON search_docs BEGIN
    INSERT INTO search_docs_fts(rowid, title, headline, text_content, code_content)
    VALUES (new.rowid, new.title, new.headline, new.text_content, new.code_content);
END;

CREATE TRIGGER IF NOT EXISTS search_docs_fts_delete AFTER DELETE ON search_docs BEGIN
    INSERT INTO search_docs_fts(search_docs_fts, rowid, title, headline, text_content, code_content)
    VALUES ('delete', old.rowid, old.title, old.headline, old.text_content, old.code_content);
END;

CREATE TRIGGER IF NOT EXISTS search_docs_fts_update AFTER UPDATE ON search_docs BEGIN
    INSERT INTO search_docs_fts(search_docs_fts, rowid, title, headline, text_content, code_content)
    VALUES ('delete', old.rowid, old.title, old.headline, old.text_content, old.code_content);
    INSERT INTO search_docs_fts(rowid, title, headline, text_content, code_content)
    VALUES (new.rowid, new.title, new.headline, new.text_content, new.code_content);
END;

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
