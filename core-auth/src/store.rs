//! Credential store: DB-backed persistence for streaming-service credentials

use crate::error::Result;
use crate::types::Credential;
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};

/// Credential store interface
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// All stored credentials, in stable order
    async fn all(&self) -> Result<Vec<Credential>>;

    /// The single curator credential used by playlist rotation, if any
    async fn curator(&self) -> Result<Option<Credential>>;

    /// Insert a credential row
    async fn insert(&self, credential: &Credential) -> Result<()>;

    /// Persist refreshed token material for an existing credential
    async fn update_tokens(&self, credential: &Credential) -> Result<()>;

    /// Link a credential to its user row (one-time, after profile fetch)
    async fn link_user(&self, credential_id: &str, user_id: &str) -> Result<()>;
}

/// SQLite implementation of CredentialStore
pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    /// Create a new SqliteCredentialStore
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn all(&self) -> Result<Vec<Credential>> {
        let credentials = query_as::<_, Credential>("SELECT * FROM credentials ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(credentials)
    }

    async fn curator(&self) -> Result<Option<Credential>> {
        let credential =
            query_as::<_, Credential>("SELECT * FROM credentials WHERE is_curator = 1 LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;

        Ok(credential)
    }

    async fn insert(&self, credential: &Credential) -> Result<()> {
        query(
            r#"
            INSERT INTO credentials (id, user_id, access_token, refresh_token, expires_at_ms, is_curator)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&credential.id)
        .bind(&credential.user_id)
        .bind(&credential.access_token)
        .bind(&credential.refresh_token)
        .bind(credential.expires_at_ms)
        .bind(credential.is_curator)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_tokens(&self, credential: &Credential) -> Result<()> {
        query(
            r#"
            UPDATE credentials
            SET access_token = ?, refresh_token = ?, expires_at_ms = ?
            WHERE id = ?
            "#,
        )
        .bind(&credential.access_token)
        .bind(&credential.refresh_token)
        .bind(credential.expires_at_ms)
        .bind(&credential.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn link_user(&self, credential_id: &str, user_id: &str) -> Result<()> {
        query("UPDATE credentials SET user_id = ? WHERE id = ?")
            .bind(user_id)
            .bind(credential_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
