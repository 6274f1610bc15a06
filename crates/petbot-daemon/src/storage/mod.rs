//! Pet persistence. Only identity columns are stored; behavioral counters
//! reset whenever a pet is loaded.

mod turso;

pub use turso::TursoDb;

use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{config::StorageConfig, pet::Pet};

/// Column width of every text column in the `pets` table.
pub const COLUMN_WIDTH: usize = 25;

pub type SharedStore = Arc<dyn PetStore>;

/// One row of the `pets` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetRecord {
    pub pet_name: String,
    pub owner_name: String,
    pub pet_type: String,
    pub channel: Option<String>,
}

impl PetRecord {
    pub fn into_pet(self) -> Pet {
        Pet::new(self.pet_name, &self.owner_name, self.pet_type, self.channel)
    }

    /// Fails if any column is wider than the table allows.
    pub fn check_width(&self) -> Result<()> {
        let columns = [
            ("pet_name", Some(self.pet_name.as_str())),
            ("owner_name", Some(self.owner_name.as_str())),
            ("pet_type", Some(self.pet_type.as_str())),
            ("channel", self.channel.as_deref()),
        ];
        for (column, value) in columns {
            if let Some(value) = value.filter(|v| v.chars().count() > COLUMN_WIDTH) {
                bail!("{column} '{value}' exceeds {COLUMN_WIDTH} characters");
            }
        }
        Ok(())
    }
}

impl From<&Pet> for PetRecord {
    fn from(pet: &Pet) -> Self {
        Self {
            pet_name: pet.name.clone(),
            owner_name: pet.owner.clone(),
            pet_type: pet.species.clone(),
            channel: pet.channel.clone(),
        }
    }
}

#[async_trait]
pub trait PetStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<PetRecord>>;

    async fn insert(&self, record: &PetRecord) -> Result<()>;

    async fn delete(&self, pet_name: &str) -> Result<()>;
}

/// Opens the store named by `config.url`. `:memory:` keeps pets in process.
pub async fn connect(config: &StorageConfig) -> Result<SharedStore> {
    if config.url == ":memory:" {
        tracing::warn!("Using in-memory pet storage, pets will not survive a restart");
        return Ok(Arc::new(MemoryStore::default()));
    }
    let token = std::env::var(&config.auth_token_env).ok();
    let db = TursoDb::connect(&config.url, token.as_deref()).await?;
    db.initialize_schema().await?;
    Ok(Arc::new(db))
}

/// Process-local store, also used by tests. Failures can be injected.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<PetRecord>>,
    fail_writes: Mutex<bool>,
}

impl MemoryStore {
    pub fn with_records(records: impl IntoIterator<Item = PetRecord>) -> Self {
        Self {
            rows: Mutex::new(records.into_iter().collect()),
            fail_writes: Mutex::new(false),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }

    pub fn records(&self) -> Vec<PetRecord> {
        self.rows.lock().clone()
    }

    fn check_writable(&self) -> Result<()> {
        if *self.fail_writes.lock() {
            bail!("memory store is read-only");
        }
        Ok(())
    }
}

#[async_trait]
impl PetStore for MemoryStore {
    async fn load_all(&self) -> Result<Vec<PetRecord>> {
        Ok(self.records())
    }

    async fn insert(&self, record: &PetRecord) -> Result<()> {
        self.check_writable()?;
        record.check_width()?;
        let mut rows = self.rows.lock();
        if rows.iter().any(|r| r.pet_name == record.pet_name) {
            bail!("pet {} already stored", record.pet_name);
        }
        rows.push(record.clone());
        Ok(())
    }

    async fn delete(&self, pet_name: &str) -> Result<()> {
        self.check_writable()?;
        self.rows.lock().retain(|r| r.pet_name != pet_name);
        Ok(())
    }
}
