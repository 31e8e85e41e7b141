//! Persisted scalars (best streak, all-time solved, dark mode) behind a tiny key-value port.

use std::{
  collections::BTreeMap,
  fs,
  path::{Path, PathBuf},
  sync::Mutex,
};

use tracing::{error, info};

use crate::error::StoreError;

pub const BEST_STREAK: &str = "bestStreak";
pub const ALL_TIME_SOLVED: &str = "allTimeSolved";
pub const DARK_MODE: &str = "darkMode";

/// Shared by every session, so counters are updated in place rather than overwritten.
pub trait ScalarStore: Send + Sync {
  fn get(&self, key: &str) -> Option<i64>;
  fn set(&self, key: &str, value: i64) -> Result<(), StoreError>;
  /// Add `by` to `key` (missing counts as 0) and return the stored total.
  fn increment(&self, key: &str, by: i64) -> Result<i64, StoreError>;
  /// Raise `key` to `value` if it is lower; returns the stored value.
  fn set_max(&self, key: &str, value: i64) -> Result<i64, StoreError>;
}

/// The scalars a session reads at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PersistedStats {
  pub best_streak: u32,
  pub all_time_solved: u64,
  pub dark_mode: bool,
}

impl PersistedStats {
  pub fn load(store: &dyn ScalarStore) -> Self {
    Self {
      best_streak: store.get(BEST_STREAK).unwrap_or(0).max(0) as u32,
      all_time_solved: store.get(ALL_TIME_SOLVED).unwrap_or(0).max(0) as u64,
      dark_mode: store.get(DARK_MODE).unwrap_or(0) == 1,
    }
  }
}

/// Process-local store; values vanish on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
  values: Mutex<BTreeMap<String, i64>>,
}

impl ScalarStore for MemoryStore {
  fn get(&self, key: &str) -> Option<i64> {
    let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
    values.get(key).copied()
  }

  fn set(&self, key: &str, value: i64) -> Result<(), StoreError> {
    let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
    values.insert(key.to_string(), value);
    Ok(())
  }

  fn increment(&self, key: &str, by: i64) -> Result<i64, StoreError> {
    let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
    let slot = values.entry(key.to_string()).or_insert(0);
    *slot += by;
    Ok(*slot)
  }

  fn set_max(&self, key: &str, value: i64) -> Result<i64, StoreError> {
    let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
    let slot = values.entry(key.to_string()).or_insert(value);
    *slot = (*slot).max(value);
    Ok(*slot)
  }
}

/// JSON object on disk, rewritten on every `set`.
#[derive(Debug)]
pub struct JsonFileStore {
  path: PathBuf,
  values: Mutex<BTreeMap<String, i64>>,
}

impl JsonFileStore {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
    let path = path.as_ref().to_path_buf();
    let values = if path.exists() {
      let contents = fs::read_to_string(&path)?;
      if contents.trim().is_empty() { BTreeMap::new() } else { serde_json::from_str(&contents)? }
    } else {
      BTreeMap::new()
    };
    Ok(Self { path, values: Mutex::new(values) })
  }

  fn flush(&self, values: &BTreeMap<String, i64>) -> Result<(), StoreError> {
    if let Some(parent) = self.path.parent() {
      if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)?;
      }
    }
    let contents = serde_json::to_string_pretty(values)?;
    fs::write(&self.path, contents)?;
    Ok(())
  }
}

impl ScalarStore for JsonFileStore {
  fn get(&self, key: &str) -> Option<i64> {
    let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
    values.get(key).copied()
  }

  fn set(&self, key: &str, value: i64) -> Result<(), StoreError> {
    let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
    values.insert(key.to_string(), value);
    self.flush(&values)
  }

  fn increment(&self, key: &str, by: i64) -> Result<i64, StoreError> {
    let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
    let total = values.get(key).copied().unwrap_or(0) + by;
    values.insert(key.to_string(), total);
    self.flush(&values)?;
    Ok(total)
  }

  fn set_max(&self, key: &str, value: i64) -> Result<i64, StoreError> {
    let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
    match values.get(key).copied() {
      Some(current) if current >= value => Ok(current),
      _ => {
        values.insert(key.to_string(), value);
        self.flush(&values)?;
        Ok(value)
      }
    }
  }
}

/// STATS_PATH selects a JSON file store; otherwise (or if it cannot be read) memory is used.
pub fn store_from_env() -> Box<dyn ScalarStore> {
  match std::env::var("STATS_PATH") {
    Ok(path) => match JsonFileStore::open(&path) {
      Ok(store) => {
        info!(target: "rapidfamat_backend", %path, "Persisting stats to JSON file");
        Box::new(store)
      }
      Err(e) => {
        error!(target: "rapidfamat_backend", %path, error = %e, "Failed to open stats file; using memory store");
        Box::new(MemoryStore::default())
      }
    },
    Err(_) => {
      info!(target: "rapidfamat_backend", "STATS_PATH not set; stats kept in memory");
      Box::new(MemoryStore::default())
    }
  }
}
