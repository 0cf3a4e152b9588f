//! Document Source - 공문서 및 FAQ 조회
//!
//! 검색 코어는 공문서와 FAQ를 읽기만 합니다. 승인 상태 변경 등은 외부 관리
//! 계층의 몫입니다. 여기서는 조회 인터페이스(`DocumentSource`)와
//! rusqlite 기반 구현을 제공합니다.
//! 저장 위치: ~/.eldercare-rag/documents.db

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};

// ============================================================================
// Types
// ============================================================================

/// FAQ 승인 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaqStatus {
    Pending,
    Approved,
    Rejected,
}

impl FaqStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// FAQ 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
    pub status: FaqStatus,
}

/// 공문서
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfficialDocument {
    pub id: i64,
    pub title: String,
    /// 문서 번호 (예: 노인정책과-1234)
    pub document_number: String,
    pub content: String,
    pub faq_items: Vec<FaqEntry>,
}

impl OfficialDocument {
    /// 승인된 FAQ만
    pub fn approved_faqs(&self) -> Vec<&FaqEntry> {
        self.faq_items
            .iter()
            .filter(|f| f.status == FaqStatus::Approved)
            .collect()
    }
}

/// 새 공문서 입력용 구조체
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub document_number: String,
    pub content: String,
}

/// 문서 목록용 요약
#[derive(Debug, Clone)]
pub struct DocumentSummary {
    pub id: i64,
    pub title: String,
    pub document_number: String,
    pub faq_count: usize,
}

// ============================================================================
// DocumentSource Trait
// ============================================================================

/// 공문서 조회 인터페이스 (읽기 전용)
pub trait DocumentSource: Send + Sync {
    /// ID로 공문서 조회 (FAQ 포함)
    fn get_document(&self, id: i64) -> Result<Option<OfficialDocument>>;
}

// ============================================================================
// SqliteDocumentStore
// ============================================================================

/// SQLite 기반 공문서 저장소
pub struct SqliteDocumentStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl SqliteDocumentStore {
    /// 저장소 열기 (없으면 생성)
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create database directory")?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open SQLite database")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };

        store.initialize()?;
        Ok(store)
    }

    /// DB 경로 반환
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))
    }

    /// 스키마 초기화
    fn initialize(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                document_number TEXT NOT NULL,
                content TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS faq_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending'
            );

            CREATE INDEX IF NOT EXISTS idx_faq_items_document ON faq_items(document_id);
            "#,
        )
        .context("Failed to create document tables")?;

        tracing::debug!("Document store initialized at {:?}", self.db_path);
        Ok(())
    }

    /// 공문서 추가
    pub fn insert_document(&self, doc: NewDocument) -> Result<i64> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO documents (title, document_number, content) VALUES (?1, ?2, ?3)",
            params![doc.title, doc.document_number, doc.content],
        )
        .context("Failed to insert document")?;

        let id = conn.last_insert_rowid();
        tracing::info!("Added document: {} (id={})", doc.title, id);
        Ok(id)
    }

    /// FAQ 추가
    pub fn insert_faq(&self, document_id: i64, faq: &FaqEntry) -> Result<i64> {
        let conn = self.lock()?;

        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM documents WHERE id = ?1)",
                params![document_id],
                |row| row.get(0),
            )
            .context("Failed to check document")?;
        if !exists {
            anyhow::bail!("Document {} not found", document_id);
        }

        conn.execute(
            "INSERT INTO faq_items (document_id, question, answer, status) VALUES (?1, ?2, ?3, ?4)",
            params![document_id, faq.question, faq.answer, faq.status.as_str()],
        )
        .context("Failed to insert FAQ")?;

        Ok(conn.last_insert_rowid())
    }

    /// 문서 수
    pub fn count_documents(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .context("Failed to count documents")?;
        Ok(count as usize)
    }

    /// 문서 목록
    pub fn list_documents(&self, limit: usize) -> Result<Vec<DocumentSummary>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT d.id, d.title, d.document_number, COUNT(f.id)
             FROM documents d
             LEFT JOIN faq_items f ON f.document_id = d.id
             GROUP BY d.id
             ORDER BY d.id DESC
             LIMIT ?1",
        )?;

        let docs = stmt
            .query_map(params![limit as i64], |row| {
                Ok(DocumentSummary {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    document_number: row.get(2)?,
                    faq_count: row.get::<_, i64>(3)? as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list documents")?;

        Ok(docs)
    }
}

impl DocumentSource for SqliteDocumentStore {
    fn get_document(&self, id: i64) -> Result<Option<OfficialDocument>> {
        let conn = self.lock()?;

        let mut stmt =
            conn.prepare("SELECT id, title, document_number, content FROM documents WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], |row| {
            Ok(OfficialDocument {
                id: row.get(0)?,
                title: row.get(1)?,
                document_number: row.get(2)?,
                content: row.get(3)?,
                faq_items: Vec::new(),
            })
        })?;

        let mut doc = match rows.next() {
            Some(row) => row.context("Failed to read document")?,
            None => return Ok(None),
        };

        let mut stmt = conn.prepare(
            "SELECT question, answer, status FROM faq_items WHERE document_id = ?1 ORDER BY id",
        )?;
        let faqs = stmt.query_map(params![id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        for faq in faqs {
            let (question, answer, status) = faq.context("Failed to read FAQ")?;
            match FaqStatus::parse(&status) {
                Some(status) => doc.faq_items.push(FaqEntry {
                    question,
                    answer,
                    status,
                }),
                None => tracing::warn!("Skipping FAQ with unknown status {:?}", status),
            }
        }

        Ok(Some(doc))
    }
}

// ============================================================================
// Tests
// ============================================================================
