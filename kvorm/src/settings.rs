use crate::AppError;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redb,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub db_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexSettings {
    /// Live entries per partition bucket before a new bucket is opened.
    pub big_key_limit: u64,
    /// Scan the primary registry when no registered index matches a query.
    pub full_scan_fallback: bool,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self { big_key_limit: 100, full_scan_fallback: false }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub index: IndexSettings,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self { store: StoreSettings::default(), index: IndexSettings::default(), log_level: "info".to_string() }
    }
}

impl Settings {
    /// Loads `path` (TOML, optional) overlaid by `KVORM__SECTION__KEY` environment variables.
    pub fn new(path: &str) -> Result<Self, AppError> {
        let builder =
            Config::builder()
                .add_source(File::with_name(path).required(false))
                .add_source(Environment::with_prefix("KVORM").try_parsing(true).separator("__"));
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, AppError> {
        let settings: Settings =
            Config::builder()
                .add_source(File::from_str(content, FileFormat::Toml))
                .build()?
                .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn with_big_key_limit(mut self, limit: u64) -> Self {
        self.index.big_key_limit = limit;
        self
    }

    pub fn with_full_scan_fallback(mut self, enabled: bool) -> Self {
        self.index.full_scan_fallback = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.index.big_key_limit == 0 {
            return Err(AppError::invalid("index.big_key_limit must be > 0"));
        }
        if self.store.backend == StoreBackend::Redb && self.store.db_path.is_none() {
            return Err(AppError::invalid("store.db_path is required for the redb backend"));
        }
        Ok(())
    }
}
