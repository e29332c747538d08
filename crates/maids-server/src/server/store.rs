//! Store selection and table bootstrap.

use crate::server::config::{ServerConfig, StoreKind};
use core::future::ready;
use maids_core::{
    AppId, ConditionalStore, InsertOutcome, MemoryStore, Provision, SqliteStore, StoreError,
    TABLE_NAME,
};

/// The store selected at startup.
#[derive(Debug)]
pub enum Backend {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl Backend {
    /// Connects to the configured backend, retrying with Fibonacci backoff,
    /// then provisions the table.
    ///
    /// With `drop_table_on_init` the table is dropped first and recreated
    /// empty.
    pub async fn connect(config: &ServerConfig) -> Result<Self, StoreError> {
        let backend = match config.store {
            StoreKind::Memory => Self::Memory(MemoryStore::new()),
            StoreKind::Sqlite => {
                let path = &config.database_path;
                let timeout = config.store_timeout;
                let store = config
                    .connect_backoff
                    .retry("sqlite", || ready(SqliteStore::open(path, timeout)))
                    .await?;
                tracing::info!("Connected to sqlite database at {}", path.display());
                Self::Sqlite(store)
            }
        };

        if config.drop_table_on_init {
            tracing::warn!("Dropping table `{TABLE_NAME}` on init");
            backend.drop_table().await?;
        }
        backend.create_table().await?;
        tracing::info!("Table `{TABLE_NAME}` is ready");

        Ok(backend)
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Sqlite(_) => "sqlite",
        }
    }
}

impl ConditionalStore for Backend {
    async fn insert_if_absent(&self, record: &AppId) -> Result<InsertOutcome, StoreError> {
        match self {
            Self::Memory(store) => store.insert_if_absent(record).await,
            Self::Sqlite(store) => store.insert_if_absent(record).await,
        }
    }

    async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        match self {
            Self::Memory(store) => store.exists(id).await,
            Self::Sqlite(store) => store.exists(id).await,
        }
    }
}

impl Provision for Backend {
    async fn create_table(&self) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.create_table().await,
            Self::Sqlite(store) => store.create_table().await,
        }
    }

    async fn drop_table(&self) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.drop_table().await,
            Self::Sqlite(store) => store.drop_table().await,
        }
    }

    async fn truncate(&self) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.truncate().await,
            Self::Sqlite(store) => store.truncate().await,
        }
    }
}
