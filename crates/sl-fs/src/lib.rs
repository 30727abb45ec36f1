//! Filesystem-backed persistence for ShelfLife.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use sl_core::{CoreError, CoreResult, Item, StockStore};

/// Default directory name for the store.
pub const STORE_DIR_NAME: &str = "shelflife";

const ITEMS_FILE_NAME: &str = "items.json";
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Filesystem-backed stock store.
///
/// The whole collection lives in one JSON file: an array of items,
/// read once at open and rewritten in full on every mutation.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a store rooted at the provided directory.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Get the root path of the store.
    pub fn path(&self) -> &std::path::Path {
        &self.root
    }

    /// Resolve the default store path (~/.shelflife).
    pub fn default_path() -> CoreResult<PathBuf> {
        if let Some(dir) = dirs::home_dir() {
            return Ok(dir.join(format!(".{STORE_DIR_NAME}")));
        }
        Err(CoreError::Storage(
            "unable to determine a default store path".into(),
        ))
    }

    /// Check if the store exists at the root path.
    pub fn exists(&self) -> bool {
        self.root.exists()
    }

    /// Initialize the store directory.
    pub fn init(&self) -> CoreResult<()> {
        fs::create_dir_all(&self.root).map_err(|err| CoreError::Storage(err.to_string()))?;
        Ok(())
    }

    fn items_path(&self) -> PathBuf {
        self.root.join(ITEMS_FILE_NAME)
    }
}

impl StockStore for FsStore {
    fn load(&self) -> CoreResult<Vec<Item>> {
        let path = self.items_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents =
            fs::read_to_string(&path).map_err(|err| CoreError::Storage(err.to_string()))?;
        match serde_json::from_str(&contents) {
            Ok(items) => Ok(items),
            Err(err) => {
                // Malformed persisted data is recoverable: start empty.
                tracing::warn!(path = %path.display(), %err, "discarding malformed item store");
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, items: &[Item]) -> CoreResult<()> {
        fs::create_dir_all(&self.root).map_err(|err| CoreError::Storage(err.to_string()))?;
        let contents = serde_json::to_string_pretty(items)
            .map_err(|err| CoreError::Storage(err.to_string()))?;
        fs::write(self.items_path(), contents).map_err(|err| CoreError::Storage(err.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct StoreConfig {
    path: Option<String>,
}

fn config_path() -> CoreResult<PathBuf> {
    if let Some(dir) = dirs::config_dir() {
        return Ok(dir.join(STORE_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    Err(CoreError::Storage(
        "unable to determine config directory".into(),
    ))
}

pub fn load_config() -> CoreResult<StoreConfig> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(StoreConfig::default());
    }
    let contents = fs::read_to_string(&path).map_err(|err| CoreError::Storage(err.to_string()))?;
    serde_yaml::from_str(&contents).map_err(|err| CoreError::Storage(err.to_string()))
}

pub fn save_config(config: &StoreConfig) -> CoreResult<()> {
    let path = config_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| CoreError::Storage(err.to_string()))?;
    }
    let contents =
        serde_yaml::to_string(config).map_err(|err| CoreError::Storage(err.to_string()))?;
    fs::write(path, contents).map_err(|err| CoreError::Storage(err.to_string()))?;
    Ok(())
}

pub fn set_config_path(path: &std::path::Path) -> CoreResult<()> {
    let config = StoreConfig {
        path: Some(path.to_string_lossy().to_string()),
    };
    save_config(&config)
}

pub fn resolve_store_path() -> CoreResult<PathBuf> {
    if let Ok(value) = std::env::var("SHELFLIFE_PATH") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }

    let config = load_config()?;
    if let Some(path) = config.path {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    FsStore::default_path()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use sl_core::ItemFields;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn sample_item(name: &str) -> Item {
        let fields = ItemFields::new(
            "7891234567",
            name,
            NaiveDate::parse_from_str("2024-06-01", "%Y-%m-%d").expect("date"),
            "Groceries",
            4,
            "Shelf B12",
        )
        .expect("fields");
        let created = NaiveDate::parse_from_str("2024-01-01", "%Y-%m-%d")
            .expect("date")
            .and_time(NaiveTime::MIN)
            .and_utc();
        Item::new(Uuid::new_v4(), fields, created)
    }

    #[test]
    fn round_trip_preserves_items_and_order() {
        let temp = TempDir::new().expect("temp dir");
        let store = FsStore::new(temp.path().to_path_buf());
        let items = vec![sample_item("Milk"), sample_item("Eggs"), sample_item("Rice")];

        store.save(&items).expect("save");
        let loaded = store.load().expect("load");
        assert_eq!(loaded, items);
    }

    #[test]
    fn missing_file_loads_empty() {
        let temp = TempDir::new().expect("temp dir");
        let store = FsStore::new(temp.path().join("nowhere"));
        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn malformed_file_loads_empty() {
        let temp = TempDir::new().expect("temp dir");
        let store = FsStore::new(temp.path().to_path_buf());
        fs::create_dir_all(store.path()).expect("dir");
        fs::write(store.path().join("items.json"), "{not json").expect("write");
        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn save_rewrites_the_whole_collection() {
        let temp = TempDir::new().expect("temp dir");
        let store = FsStore::new(temp.path().to_path_buf());

        store.save(&[sample_item("Milk"), sample_item("Eggs")]).expect("save");
        store.save(&[sample_item("Rice")]).expect("save");

        let loaded = store.load().expect("load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].product_name, "Rice");
    }
}
