use crate::model::Model;
use crate::schema::Schema;
use crate::settings::{Settings, StoreBackend};
use crate::store::{KvStore, MemoryStore, RedbStore};
use crate::AppError;
use log::info;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// Owns the store handle and hands out models bound to it.
#[derive(Clone)]
pub struct Orm {
    store: Arc<dyn KvStore>,
    settings: Settings,
}

impl Orm {
    pub fn open(settings: Settings) -> Result<Self, AppError> {
        settings.validate()?;
        let store: Arc<dyn KvStore> = match settings.store.backend {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::Redb => {
                let path = settings.store.db_path.as_deref().ok_or_else(|| AppError::invalid("store.db_path is required for the redb backend"))?;
                if let Some(parent) = PathBuf::from(path).parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
                Arc::new(RedbStore::open(path)?)
            }
        };
        info!("Opened {:?} store, big key limit {}", settings.store.backend, settings.index.big_key_limit);
        Ok(Self { store, settings })
    }

    pub fn with_store(store: Arc<dyn KvStore>, settings: Settings) -> Self {
        Self { store, settings }
    }

    pub fn memory() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), Settings::default())
    }

    /// Redb store under the temp dir. `random` appends a random suffix and clears any leftover file.
    pub fn temp(name: &str, settings: Settings, random: bool) -> Result<Self, AppError> {
        let db_name = if random { format!("{}_{}", name, rand::random::<u64>()) } else { name.to_string() };
        let db_path = env::temp_dir().join("kvorm").join(format!("{}.redb", db_name));
        if random && db_path.exists() {
            fs::remove_file(&db_path)?;
        }
        let mut settings = settings;
        settings.store.backend = StoreBackend::Redb;
        settings.store.db_path = Some(db_path.to_string_lossy().into_owned());
        Self::open(settings)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> Arc<dyn KvStore> {
        self.store.clone()
    }

    pub fn model(&self, schema: Schema) -> Model {
        Model::new(self.store.clone(), Arc::new(schema), self.settings.index.clone())
    }

    /// Wipes every key in the store.
    pub fn flush_all(&self) -> Result<usize, AppError> {
        let deleted = self.store.delete_all()?;
        info!("Flushed {} keys", deleted);
        Ok(deleted)
    }
}
