use crate::error::ToolError;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(test)]
pub fn test_env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Key/value store the persistence mirror writes to.
pub trait StorageBackend: Send {
    fn get_item(&self, key: &str) -> Result<Option<String>, ToolError>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), ToolError>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: BTreeMap<String, String>,
}

impl MemoryStorage {
    pub const fn new() -> Self {
        Self {
            items: BTreeMap::new(),
        }
    }
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, ToolError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), ToolError> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// One `<key>.json` file per record under `dir`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl StorageBackend for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, ToolError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        std::fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| ToolError::storage(format!("read_failed:{e}")))
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), ToolError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| ToolError::storage(format!("mkdir_failed:{e}")))?;
        std::fs::write(self.path_for(key), value)
            .map_err(|e| ToolError::storage(format!("write_failed:{e}")))
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// `window.localStorage`. Every call can fail (private mode, quota, disabled
/// storage), which the mirror turns into a logged warning.
#[cfg(target_arch = "wasm32")]
pub struct BrowserStorage;

#[cfg(target_arch = "wasm32")]
impl BrowserStorage {
    fn storage() -> Result<web_sys::Storage, ToolError> {
        let window = web_sys::window().ok_or_else(|| ToolError::storage("no_window"))?;
        window
            .local_storage()
            .map_err(|_| ToolError::storage("local_storage_denied"))?
            .ok_or_else(|| ToolError::storage("local_storage_missing"))
    }
}

#[cfg(target_arch = "wasm32")]
impl StorageBackend for BrowserStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, ToolError> {
        Self::storage()?
            .get_item(key)
            .map_err(|_| ToolError::storage("get_item_failed"))
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), ToolError> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|_| ToolError::storage("set_item_failed"))
    }

    fn name(&self) -> &'static str {
        "local_storage"
    }
}

/// Backend matching the target: localStorage in the browser, a JSON file in
/// the data directory elsewhere.
pub fn default_backend() -> Box<dyn StorageBackend> {
    #[cfg(target_arch = "wasm32")]
    {
        Box::new(BrowserStorage)
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        Box::new(FileStorage::new(crate::config::data_dir()))
    }
}
