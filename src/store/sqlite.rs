//! SQLite-backed [`EmailStore`].
//!
//! The schema migration is applied inline via `include_str!` on open.

use std::path::Path;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::{ts_from_db, ts_to_db, Email, EmailFilter, EmailStatus, EmailStore, StoreError};

const MIGRATION: &str = include_str!("../../migrations/001_emails.sql");

const EMAIL_COLUMNS: &str = "id, sender_email, subject, body, received_at, sentiment, priority, \
     category, ai_response, status, extracted_info, response_time_ms, sent_response, metadata, \
     created_at, updated_at";

/// Raw `emails` row.
#[derive(Debug, sqlx::FromRow)]
struct EmailRow {
    id: String,
    sender_email: String,
    subject: String,
    body: String,
    received_at: String,
    sentiment: String,
    priority: String,
    category: String,
    ai_response: Option<String>,
    status: String,
    extracted_info: String,
    response_time_ms: Option<i64>,
    sent_response: Option<String>,
    metadata: String,
    created_at: String,
    updated_at: String,
}

/// Email repository on a SQLite pool.
#[derive(Debug, Clone)]
pub struct SqliteEmailStore {
    pool: SqlitePool,
}

impl SqliteEmailStore {
    /// Open (or create) the database at `path` and apply the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migration fails.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .pragma("trusted_schema", "OFF");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// Private in-memory database, used by tests and one-shot commands.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or migration fails.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool and apply the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if migration fails.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::raw_sql(MIGRATION).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Underlying pool, for aggregate queries.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch(&self, mut qb: QueryBuilder<'_, Sqlite>) -> Result<Vec<Email>, StoreError> {
        let rows: Vec<EmailRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_email).collect()
    }
}

fn select<'a>() -> QueryBuilder<'a, Sqlite> {
    QueryBuilder::new(format!("SELECT {EMAIL_COLUMNS} FROM emails"))
}

fn push_id_list<'a>(qb: &mut QueryBuilder<'a, Sqlite>, ids: &'a [String]) {
    qb.push(" id IN (");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id.as_str());
    }
    separated.push_unseparated(")");
}

/// Convert a raw row into an [`Email`].
fn row_to_email(row: EmailRow) -> Result<Email, StoreError> {
    let invalid = |field: &'static str, value: &str| StoreError::InvalidEnum {
        field,
        value: value.to_owned(),
    };
    let json = |field: &'static str, e: serde_json::Error| StoreError::Corrupt {
        field,
        reason: e.to_string(),
    };

    Ok(Email {
        received_at: ts_from_db("received_at", &row.received_at)?,
        created_at: ts_from_db("created_at", &row.created_at)?,
        updated_at: ts_from_db("updated_at", &row.updated_at)?,
        sentiment: row
            .sentiment
            .parse()
            .map_err(|_| invalid("sentiment", &row.sentiment))?,
        priority: row
            .priority
            .parse()
            .map_err(|_| invalid("priority", &row.priority))?,
        category: row
            .category
            .parse()
            .map_err(|_| invalid("category", &row.category))?,
        status: row.status.parse()?,
        extracted_info: serde_json::from_str(&row.extracted_info)
            .map_err(|e| json("extracted_info", e))?,
        sent_response: row
            .sent_response
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| json("sent_response", e))?,
        metadata: serde_json::from_str(&row.metadata).map_err(|e| json("metadata", e))?,
        id: row.id,
        sender_email: row.sender_email,
        subject: row.subject,
        body: row.body,
        ai_response: row.ai_response,
        response_time_ms: row.response_time_ms,
    })
}

fn to_json<T: serde::Serialize>(field: &'static str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Corrupt {
        field,
        reason: e.to_string(),
    })
}

#[async_trait]
impl EmailStore for SqliteEmailStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Email>, StoreError> {
        let row: Option<EmailRow> =
            sqlx::query_as(&format!("SELECT {EMAIL_COLUMNS} FROM emails WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(row_to_email).transpose()
    }

    async fn save(&self, email: &Email) -> Result<(), StoreError> {
        let extracted_info = to_json("extracted_info", &email.extracted_info)?;
        let sent_response = email
            .sent_response
            .as_ref()
            .map(|s| to_json("sent_response", s))
            .transpose()?;
        let metadata = to_json("metadata", &email.metadata)?;

        sqlx::query(&format!(
            "INSERT INTO emails ({EMAIL_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
             ON CONFLICT(id) DO UPDATE SET
                sender_email = excluded.sender_email,
                subject = excluded.subject,
                body = excluded.body,
                received_at = excluded.received_at,
                sentiment = excluded.sentiment,
                priority = excluded.priority,
                category = excluded.category,
                ai_response = excluded.ai_response,
                status = excluded.status,
                extracted_info = excluded.extracted_info,
                response_time_ms = excluded.response_time_ms,
                sent_response = excluded.sent_response,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at"
        ))
        .bind(&email.id)
        .bind(&email.sender_email)
        .bind(&email.subject)
        .bind(&email.body)
        .bind(ts_to_db(&email.received_at))
        .bind(email.sentiment.as_str())
        .bind(email.priority.as_str())
        .bind(email.category.as_str())
        .bind(&email.ai_response)
        .bind(email.status.as_str())
        .bind(extracted_info)
        .bind(email.response_time_ms)
        .bind(sent_response)
        .bind(metadata)
        .bind(ts_to_db(&email.created_at))
        .bind(ts_to_db(&Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, filter: &EmailFilter) -> Result<Vec<Email>, StoreError> {
        let mut qb = select();
        qb.push(" WHERE 1 = 1");
        if let Some(priority) = filter.priority {
            qb.push(" AND priority = ").push_bind(priority.as_str());
        }
        if let Some(sentiment) = filter.sentiment {
            qb.push(" AND sentiment = ").push_bind(sentiment.as_str());
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(category) = filter.category {
            qb.push(" AND category = ").push_bind(category.as_str());
        }

        qb.push(" ORDER BY ")
            .push(filter.sort_by.column())
            .push(" ")
            .push(filter.sort_order.keyword());
        if filter.priority.is_none() {
            qb.push(", CASE priority WHEN 'urgent' THEN 0 ELSE 1 END");
        }

        // SQLite needs a LIMIT before OFFSET; -1 means unbounded.
        let limit = filter.limit.map_or(-1, i64::from);
        qb.push(" LIMIT ").push_bind(limit);
        qb.push(" OFFSET ").push_bind(i64::from(filter.skip));

        self.fetch(qb).await
    }

    async fn find_by_sender_and_subject(
        &self,
        sender_email: &str,
        subject: &str,
    ) -> Result<Option<Email>, StoreError> {
        let row: Option<EmailRow> = sqlx::query_as(&format!(
            "SELECT {EMAIL_COLUMNS} FROM emails WHERE sender_email = ?1 AND subject = ?2 LIMIT 1"
        ))
        .bind(sender_email.trim().to_lowercase())
        .bind(subject.trim())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_email).transpose()
    }

    async fn set_ai_response(&self, id: &str, text: &str) -> Result<Option<Email>, StoreError> {
        let result =
            sqlx::query("UPDATE emails SET ai_response = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(text)
                .bind(ts_to_db(&Utc::now()))
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    async fn update_status(
        &self,
        id: &str,
        status: EmailStatus,
    ) -> Result<Option<Email>, StoreError> {
        let result = sqlx::query("UPDATE emails SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status.as_str())
            .bind(ts_to_db(&Utc::now()))
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    async fn bulk_update_status(
        &self,
        ids: &[String],
        status: EmailStatus,
    ) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE emails SET status = ");
        qb.push_bind(status.as_str())
            .push(", updated_at = ")
            .push_bind(ts_to_db(&Utc::now()))
            .push(" WHERE");
        push_id_list(&mut qb, ids);
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn find_recent(&self, hours: u32) -> Result<Vec<Email>, StoreError> {
        let cutoff = Utc::now()
            .checked_sub_signed(Duration::hours(i64::from(hours)))
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
        let mut qb = select();
        qb.push(" WHERE received_at >= ")
            .push_bind(ts_to_db(&cutoff))
            .push(" ORDER BY received_at DESC");
        self.fetch(qb).await
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Email>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = select();
        qb.push(" WHERE");
        push_id_list(&mut qb, ids);
        qb.push(" ORDER BY received_at DESC");
        self.fetch(qb).await
    }
}
