//! Persistence collaborators: the psychiatrist directory and the help request
//! audit log. Both are narrow async traits so the realtime core never talks
//! to sqlx directly.

use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::HelplineError,
    models::{HelpRequest, PsychiatristIdentity, PsychiatristKey, Registration},
};

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn register(&self, registration: &Registration) -> Result<PsychiatristIdentity, HelplineError>;

    async fn find(&self, key: &PsychiatristKey) -> Result<Option<PsychiatristIdentity>, HelplineError>;

    /// Flips the persisted online flag. Unknown keys are `IdentityNotFound`.
    async fn set_online(&self, key: &PsychiatristKey, online: bool) -> Result<PsychiatristIdentity, HelplineError>;

    /// Marks every identity offline, returning how many were flipped.
    async fn reset_presence(&self) -> Result<u64, HelplineError>;
}

#[async_trait]
pub trait HelpRequestStore: Send + Sync {
    async fn record(&self, request: &HelpRequest) -> Result<(), HelplineError>;
}

const SCHEMA: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS psychiatrists (
        key TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        online BOOLEAN NOT NULL DEFAULT FALSE
    )",
    "CREATE TABLE IF NOT EXISTS help_requests (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        contact TEXT NOT NULL,
        description TEXT NOT NULL,
        target_key TEXT,
        created_at TEXT NOT NULL
    )",
];

type IdentityRow = (String, String, String, bool);

fn identity_from_row((key, name, email, online): IdentityRow) -> PsychiatristIdentity {
    PsychiatristIdentity {
        key: PsychiatristKey(key),
        name,
        email,
        online,
    }
}

#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, HelplineError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Self::with_pool(pool).await
    }

    /// A private database living as long as the store. Used by tests.
    pub async fn in_memory() -> Result<Self, HelplineError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> Result<Self, HelplineError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        Ok(Self { pool })
    }

    /// Inserts an identity with a caller-chosen key.
    pub async fn insert(&self, identity: &PsychiatristIdentity) -> Result<(), HelplineError> {
        let result = sqlx::query("INSERT INTO psychiatrists (key,name,email,online) VALUES (?,?,?,?)")
            .bind(identity.key.as_str())
            .bind(&identity.name)
            .bind(&identity.email)
            .bind(identity.online)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(HelplineError::DuplicateIdentity(identity.email.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl IdentityStore for SqliteStore {
    async fn register(&self, registration: &Registration) -> Result<PsychiatristIdentity, HelplineError> {
        registration.validate()?;

        let identity = PsychiatristIdentity {
            key: PsychiatristKey(Uuid::now_v7().to_string()),
            name: registration.name.trim().to_owned(),
            email: registration.email.clone(),
            online: false,
        };
        self.insert(&identity).await?;

        info!(key = %identity.key, name = %identity.name, "registered psychiatrist");
        Ok(identity)
    }

    async fn find(&self, key: &PsychiatristKey) -> Result<Option<PsychiatristIdentity>, HelplineError> {
        let row: Option<IdentityRow> = sqlx::query_as("SELECT key,name,email,online FROM psychiatrists WHERE key=?")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(identity_from_row))
    }

    async fn set_online(&self, key: &PsychiatristKey, online: bool) -> Result<PsychiatristIdentity, HelplineError> {
        let row: Option<IdentityRow> =
            sqlx::query_as("UPDATE psychiatrists SET online=? WHERE key=? RETURNING key,name,email,online")
                .bind(online)
                .bind(key.as_str())
                .fetch_optional(&self.pool)
                .await?;

        row.map(identity_from_row)
            .ok_or_else(|| HelplineError::IdentityNotFound(key.clone()))
    }

    async fn reset_presence(&self) -> Result<u64, HelplineError> {
        let result = sqlx::query("UPDATE psychiatrists SET online=FALSE WHERE online")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl HelpRequestStore for SqliteStore {
    async fn record(&self, request: &HelpRequest) -> Result<(), HelplineError> {
        sqlx::query(
            "INSERT INTO help_requests (id,name,contact,description,target_key,created_at) VALUES (?,?,?,?,?,?)",
        )
        .bind(request.id.to_string())
        .bind(&request.name)
        .bind(&request.contact)
        .bind(&request.description)
        .bind(request.target_key.as_ref().map(PsychiatristKey::as_str))
        .bind(request.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
impl SqliteStore {
    /// Newest first.
    pub(crate) async fn recent(&self, limit: u32) -> Result<Vec<HelpRequest>, HelplineError> {
        type Row = (String, String, String, String, Option<String>, time::OffsetDateTime);

        let rows: Vec<Row> = sqlx::query_as(
            "SELECT id,name,contact,description,target_key,created_at FROM help_requests ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, name, contact, description, target_key, created_at)| -> Result<_, HelplineError> {
                Ok(HelpRequest {
                    id: Uuid::parse_str(&id).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
                    name,
                    contact,
                    description,
                    target_key: target_key.map(PsychiatristKey),
                    created_at,
                })
            })
            .collect()
    }
}
