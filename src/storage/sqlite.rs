//! SQLite storage backend

use super::traits::{OpenStore, PutOutcome, RecordStore, StorageError, StorageResult};
use crate::record::{ConsultationRecord, ConsultationSlug, ResponseKey, ResponseRecord};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const DATE_FORMAT: &str = "%Y-%m-%d";

const CONSULTATION_COLUMNS: &str = "slug, url, title, organisation, topics_json, start_date, end_date, \
     response_count, report_available, properties_json, html_file";

const RESPONSE_COLUMNS: &str = "consultation_slug, response_id, url, author_name, text, properties_json, \
     attachments_json, text_attachment, component";

/// Raw consultation row, before JSON and date decoding
type ConsultationRow = (
    String,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
    i64,
    bool,
    String,
    Option<String>,
);

/// Raw response row, before JSON decoding
type ResponseRow = (
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    String,
    String,
    Option<String>,
    Option<u32>,
);

/// SQLite-backed record store
///
/// One database file with a table per record kind. Each table carries an
/// autoincrement `seq` column that fixes insertion order and a unique index
/// on the natural key. Thread-safe via internal mutex on the connection, so
/// writes are serialized.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            -- Consultation snapshots
            CREATE TABLE IF NOT EXISTS consultations (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                slug TEXT NOT NULL UNIQUE,
                url TEXT NOT NULL,
                title TEXT NOT NULL,
                organisation TEXT,
                topics_json TEXT NOT NULL,
                start_date TEXT,
                end_date TEXT,
                response_count INTEGER NOT NULL,
                report_available INTEGER NOT NULL,
                properties_json TEXT NOT NULL,
                html_file TEXT
            );

            -- Responses, unique per (consultation, response id)
            CREATE TABLE IF NOT EXISTS responses (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                consultation_slug TEXT NOT NULL,
                response_id TEXT NOT NULL,
                url TEXT,
                author_name TEXT,
                text TEXT NOT NULL,
                properties_json TEXT NOT NULL,
                attachments_json TEXT NOT NULL,
                text_attachment TEXT,
                component INTEGER,
                UNIQUE (consultation_slug, response_id)
            );

            CREATE INDEX IF NOT EXISTS idx_responses_consultation
                ON responses(consultation_slug, seq);

            -- WAL for concurrent reads during writes; FULL sync so every
            -- committed put survives a crash
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn read_consultation_row(row: &Row<'_>) -> rusqlite::Result<ConsultationRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
            row.get(9)?,
            row.get(10)?,
        ))
    }

    fn read_response_row(row: &Row<'_>) -> rusqlite::Result<ResponseRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
        ))
    }

    fn parse_date(value: Option<String>) -> StorageResult<Option<NaiveDate>> {
        value
            .map(|s| {
                NaiveDate::parse_from_str(&s, DATE_FORMAT)
                    .map_err(|e| StorageError::DateParse(format!("{}: {}", s, e)))
            })
            .transpose()
    }

    /// Deserialize a consultation from database columns
    fn row_to_consultation(row: ConsultationRow) -> StorageResult<ConsultationRecord> {
        let (
            slug,
            url,
            title,
            organisation,
            topics_json,
            start_date,
            end_date,
            response_count,
            report_available,
            properties_json,
            html_file,
        ) = row;

        Ok(ConsultationRecord {
            slug: ConsultationSlug::new(slug),
            url,
            title,
            organisation,
            topics: serde_json::from_str(&topics_json)?,
            start_date: Self::parse_date(start_date)?,
            end_date: Self::parse_date(end_date)?,
            response_count: response_count.max(0) as u64,
            report_available,
            properties: serde_json::from_str(&properties_json)?,
            html_file,
        })
    }

    /// Deserialize a response from database columns
    fn row_to_response(row: ResponseRow) -> StorageResult<ResponseRecord> {
        let (
            consultation_slug,
            response_id,
            url,
            author_name,
            text,
            properties_json,
            attachments_json,
            text_attachment,
            component,
        ) = row;

        Ok(ResponseRecord {
            consultation_slug: ConsultationSlug::new(consultation_slug),
            response_id,
            url,
            author_name,
            text,
            properties: serde_json::from_str(&properties_json)?,
            attachment_refs: serde_json::from_str(&attachments_json)?,
            text_attachment,
            component,
        })
    }

    fn select_consultation(
        tx: &Connection,
        slug: &ConsultationSlug,
    ) -> StorageResult<Option<ConsultationRecord>> {
        let sql = format!("SELECT {} FROM consultations WHERE slug = ?1", CONSULTATION_COLUMNS);
        let row = tx
            .query_row(&sql, params![slug.as_str()], Self::read_consultation_row)
            .optional()?;
        row.map(Self::row_to_consultation).transpose()
    }

    fn select_response(tx: &Connection, key: &ResponseKey) -> StorageResult<Option<ResponseRecord>> {
        let sql = format!(
            "SELECT {} FROM responses WHERE consultation_slug = ?1 AND response_id = ?2",
            RESPONSE_COLUMNS
        );
        let row = tx
            .query_row(
                &sql,
                params![key.consultation.as_str(), key.response_id],
                Self::read_response_row,
            )
            .optional()?;
        row.map(Self::row_to_response).transpose()
    }

    fn insert_consultation(tx: &Transaction<'_>, record: &ConsultationRecord) -> StorageResult<()> {
        tx.execute(
            &format!(
                "INSERT INTO consultations ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                CONSULTATION_COLUMNS
            ),
            params![
                record.slug.as_str(),
                record.url,
                record.title,
                record.organisation,
                serde_json::to_string(&record.topics)?,
                record.start_date.map(|d| d.format(DATE_FORMAT).to_string()),
                record.end_date.map(|d| d.format(DATE_FORMAT).to_string()),
                record.response_count as i64,
                record.report_available,
                serde_json::to_string(&record.properties)?,
                record.html_file,
            ],
        )?;
        Ok(())
    }

    fn insert_response(tx: &Transaction<'_>, record: &ResponseRecord) -> StorageResult<()> {
        tx.execute(
            &format!(
                "INSERT INTO responses ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                RESPONSE_COLUMNS
            ),
            params![
                record.consultation_slug.as_str(),
                record.response_id,
                record.url,
                record.author_name,
                record.text,
                serde_json::to_string(&record.properties)?,
                serde_json::to_string(&record.attachment_refs)?,
                record.text_attachment,
                record.component,
            ],
        )?;
        Ok(())
    }

    /// Insert, or check and merge into the stored response, inside `tx`
    fn upsert_response(tx: &Transaction<'_>, record: &ResponseRecord) -> StorageResult<PutOutcome> {
        let key = record.key();
        let Some(stored) = Self::select_response(tx, &key)? else {
            Self::insert_response(tx, record)?;
            return Ok(PutOutcome::Inserted);
        };
        if let Some(field) = stored.immutable_mismatch(record) {
            return Err(StorageError::Conflict {
                key: key.to_string(),
                field,
            });
        }

        let mut merged = stored.clone();
        merged.merge_additive(record);
        if merged == stored {
            return Ok(PutOutcome::Unchanged);
        }
        tx.execute(
            r#"
            UPDATE responses SET
                attachments_json = ?3,
                text_attachment = ?4,
                component = ?5
            WHERE consultation_slug = ?1 AND response_id = ?2
            "#,
            params![
                key.consultation.as_str(),
                key.response_id,
                serde_json::to_string(&merged.attachment_refs)?,
                merged.text_attachment,
                merged.component,
            ],
        )?;
        Ok(PutOutcome::Merged)
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl RecordStore for SqliteStore {
    // === Consultation Operations ===

    fn contains_consultation(&self, slug: &ConsultationSlug) -> StorageResult<bool> {
        let conn = self.lock()?;
        let found: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM consultations WHERE slug = ?1)",
            params![slug.as_str()],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    fn put_consultation(&self, record: &ConsultationRecord) -> StorageResult<PutOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let outcome = match Self::select_consultation(&tx, &record.slug)? {
            None => {
                Self::insert_consultation(&tx, record)?;
                PutOutcome::Inserted
            }
            Some(stored) => {
                if let Some(field) = stored.immutable_mismatch(record) {
                    return Err(StorageError::Conflict {
                        key: record.slug.to_string(),
                        field,
                    });
                }
                let mut merged = stored.clone();
                merged.merge_additive(record);
                if merged == stored {
                    PutOutcome::Unchanged
                } else {
                    tx.execute(
                        "UPDATE consultations SET html_file = ?2 WHERE slug = ?1",
                        params![merged.slug.as_str(), merged.html_file],
                    )?;
                    PutOutcome::Merged
                }
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    fn load_consultation(&self, slug: &ConsultationSlug) -> StorageResult<Option<ConsultationRecord>> {
        let conn = self.lock()?;
        Self::select_consultation(&conn, slug)
    }

    fn load_consultations(&self) -> StorageResult<Vec<ConsultationRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM consultations ORDER BY seq",
            CONSULTATION_COLUMNS
        ))?;
        let rows = stmt.query_map([], Self::read_consultation_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(Self::row_to_consultation(row?)?);
        }
        Ok(records)
    }

    // === Response Operations ===

    fn contains_response(&self, key: &ResponseKey) -> StorageResult<bool> {
        let conn = self.lock()?;
        let found: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM responses WHERE consultation_slug = ?1 AND response_id = ?2)",
            params![key.consultation.as_str(), key.response_id],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    fn put_response(&self, record: &ResponseRecord) -> StorageResult<PutOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let outcome = Self::upsert_response(&tx, record)?;
        tx.commit()?;
        Ok(outcome)
    }

    fn put_responses(&self, records: &[ResponseRecord]) -> StorageResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut changed = 0;
        for record in records {
            if Self::upsert_response(&tx, record)? != PutOutcome::Unchanged {
                changed += 1;
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    fn load_response(&self, key: &ResponseKey) -> StorageResult<Option<ResponseRecord>> {
        let conn = self.lock()?;
        Self::select_response(&conn, key)
    }

    fn load_responses(&self, slug: &ConsultationSlug) -> StorageResult<Vec<ResponseRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM responses WHERE consultation_slug = ?1 ORDER BY seq",
            RESPONSE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![slug.as_str()], Self::read_response_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(Self::row_to_response(row?)?);
        }
        Ok(records)
    }

    fn count_responses(&self, slug: &ConsultationSlug) -> StorageResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM responses WHERE consultation_slug = ?1",
            params![slug.as_str()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as usize)
    }
}
