//! Turso (libSQL) pet table

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use libsql::{Builder, Connection, Database, params};
use tracing::{debug, info};

use super::{PetRecord, PetStore};

/// libSQL-backed pet store. A connection is opened per operation and
/// dropped when it completes.
#[derive(Clone)]
pub struct TursoDb {
    db: Arc<Database>,
}

impl TursoDb {
    /// Connect to a Turso database
    pub async fn connect(url: &str, auth_token: Option<&str>) -> Result<Self> {
        let db = if url.starts_with("libsql://") || url.starts_with("https://") {
            // Remote Turso database
            let token = auth_token
                .map(|s| s.to_string())
                .or_else(|| std::env::var("TURSO_AUTH_TOKEN").ok())
                .context("TURSO_AUTH_TOKEN required for remote database")?;

            Builder::new_remote(url.to_string(), token)
                .build()
                .await
                .context("Failed to connect to remote Turso database")?
        } else {
            // Local file database
            let path = url.strip_prefix("file:").unwrap_or(url);
            Builder::new_local(path)
                .build()
                .await
                .context("Failed to open local database")?
        };

        Ok(Self { db: Arc::new(db) })
    }

    fn conn(&self) -> Result<Connection> {
        self.db.connect().context("Failed to get database connection")
    }

    /// Initialize the database schema
    pub async fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS pets (
                pet_name VARCHAR(25) PRIMARY KEY,
                owner_name VARCHAR(25) NOT NULL,
                pet_type VARCHAR(25) NOT NULL,
                channel VARCHAR(25)
            )
            "#,
            (),
        )
        .await?;

        info!("Database schema initialized");
        Ok(())
    }
}

#[async_trait]
impl PetStore for TursoDb {
    async fn load_all(&self) -> Result<Vec<PetRecord>> {
        let conn = self.conn()?;

        let mut rows = conn
            .query(
                "SELECT pet_name, owner_name, pet_type, channel FROM pets ORDER BY pet_name",
                (),
            )
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(PetRecord {
                pet_name: row.get(0)?,
                owner_name: row.get(1)?,
                pet_type: row.get(2)?,
                channel: row.get(3)?,
            });
        }

        debug!("Loaded {} pets", records.len());
        Ok(records)
    }

    async fn insert(&self, record: &PetRecord) -> Result<()> {
        record.check_width()?;
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO pets (pet_name, owner_name, pet_type, channel)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                record.pet_name.clone(),
                record.owner_name.clone(),
                record.pet_type.clone(),
                record.channel.clone(),
            ],
        )
        .await
        .with_context(|| format!("failed to store pet {}", record.pet_name))?;

        debug!("Stored pet {}", record.pet_name);
        Ok(())
    }

    async fn delete(&self, pet_name: &str) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "DELETE FROM pets WHERE pet_name = ?1",
            params![pet_name.to_string()],
        )
        .await
        .with_context(|| format!("failed to delete pet {pet_name}"))?;

        debug!("Deleted pet {}", pet_name);
        Ok(())
    }
}
