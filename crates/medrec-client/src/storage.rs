//! 本地键值存储
//!
//! 浏览器localStorage的文件形态对应物：进程内缓存加写穿到磁盘的
//! JSON文件。启动时整体读入一次，set/remove即时落盘。

use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use serde_json::{Map, Value};
use tracing::{info, warn};

use medrec_core::{MedrecError, Result};

/// 暗色模式偏好的存储键
pub const DARK_MODE_KEY: &str = "darkMode";

/// 文件背书的键值存储
pub struct LocalStore {
    path: PathBuf,
    entries: RwLock<Map<String, Value>>,
}

impl LocalStore {
    /// 打开存储文件，不存在或损坏时从空映射开始
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(map) => map,
                Err(e) => {
                    warn!(
                        "Local store {} is not valid JSON, starting empty: {}",
                        path.display(),
                        e
                    );
                    Map::new()
                }
            },
            Err(_) => Map::new(),
        };
        info!("Local store opened: {}", path.display());
        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().ok()?.get(key).cloned()
    }

    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        {
            let mut entries = self
                .entries
                .write()
                .map_err(|_| MedrecError::Storage("local store lock poisoned".to_string()))?;
            entries.insert(key.to_string(), value);
        }
        self.flush()
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        {
            let mut entries = self
                .entries
                .write()
                .map_err(|_| MedrecError::Storage("local store lock poisoned".to_string()))?;
            entries.remove(key);
        }
        self.flush()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    pub fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set(key, Value::Bool(value))
    }

    /// 暗色模式偏好
    pub fn dark_mode(&self) -> bool {
        self.get_bool(DARK_MODE_KEY)
    }

    pub fn set_dark_mode(&self, enabled: bool) -> Result<()> {
        self.set_bool(DARK_MODE_KEY, enabled)
    }

    fn flush(&self) -> Result<()> {
        let entries = self
            .entries
            .read()
            .map_err(|_| MedrecError::Storage("local store lock poisoned".to_string()))?;
        let text = serde_json::to_string_pretty(&*entries)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    MedrecError::Storage(format!(
                        "failed to create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }
        fs::write(&self.path, text).map_err(|e| {
            MedrecError::Storage(format!("failed to write {}: {}", self.path.display(), e))
        })
    }
}
