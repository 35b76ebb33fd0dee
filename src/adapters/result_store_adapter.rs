//! Backtest result stores.
//!
//! [`JsonFileResultStore`] keeps every result in one JSON array file,
//! rewritten in full on each save and truncated oldest-first to capacity.

use crate::domain::backtest::BacktestResult;
use crate::domain::config_validation::load_results_settings;
use crate::domain::error::SentiquantError;
use crate::ports::config_port::ConfigPort;
use crate::ports::result_store_port::{ResultStore, DEFAULT_RESULT_CAPACITY};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn store_err(reason: String) -> SentiquantError {
    SentiquantError::Store { reason }
}

fn truncate_oldest(results: &mut Vec<BacktestResult>, capacity: usize) {
    if results.len() > capacity {
        let excess = results.len() - capacity;
        results.drain(..excess);
    }
}

fn tail(results: &[BacktestResult], limit: usize) -> Vec<BacktestResult> {
    results[results.len().saturating_sub(limit)..].to_vec()
}

pub struct JsonFileResultStore {
    path: PathBuf,
    capacity: usize,
    // Serialises read-modify-write within a process.
    lock: Mutex<()>,
}

impl JsonFileResultStore {
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity: capacity.max(1),
            lock: Mutex::new(()),
        }
    }

    /// Build from the `[results]` section. Returns `None` when no path is
    /// configured.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Option<Self>, SentiquantError> {
        let settings = load_results_settings(config)?;
        Ok(settings.path.map(|path| Self::new(path, settings.capacity)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn read_all(&self) -> Result<Vec<BacktestResult>, SentiquantError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(store_err(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )))
            }
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content)
            .map_err(|e| store_err(format!("invalid result file {}: {e}", self.path.display())))
    }

    fn write_all(&self, results: &[BacktestResult]) -> Result<(), SentiquantError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| store_err(format!("failed to create {}: {e}", parent.display())))?;
        }
        let json = serde_json::to_string_pretty(results)
            .map_err(|e| store_err(format!("failed to encode results: {e}")))?;
        // Unique per writer so concurrent processes never share a temp file.
        let tmp_path = self.path.with_extension(format!(
            "json.{}.{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp_path, json)
            .map_err(|e| store_err(format!("failed to write {}: {e}", tmp_path.display())))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            store_err(format!("atomic rename failed: {e}"))
        })
    }
}

impl ResultStore for JsonFileResultStore {
    fn save(&self, result: &BacktestResult) -> Result<(), SentiquantError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| store_err("result store lock poisoned".into()))?;
        let mut results = self.read_all()?;
        results.push(result.clone());
        truncate_oldest(&mut results, self.capacity);
        self.write_all(&results)
    }

    fn get_recent(&self, limit: usize) -> Result<Vec<BacktestResult>, SentiquantError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| store_err("result store lock poisoned".into()))?;
        Ok(tail(&self.read_all()?, limit))
    }
}

pub struct MemoryResultStore {
    capacity: usize,
    results: Mutex<Vec<BacktestResult>>,
}

impl MemoryResultStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            results: Mutex::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.results.lock().map_or(0, |r| r.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryResultStore {
    fn default() -> Self {
        Self::new(DEFAULT_RESULT_CAPACITY)
    }
}

impl ResultStore for MemoryResultStore {
    fn save(&self, result: &BacktestResult) -> Result<(), SentiquantError> {
        let mut results = self
            .results
            .lock()
            .map_err(|_| store_err("result store lock poisoned".into()))?;
        results.push(result.clone());
        truncate_oldest(&mut results, self.capacity);
        Ok(())
    }

    fn get_recent(&self, limit: usize) -> Result<Vec<BacktestResult>, SentiquantError> {
        let results = self
            .results
            .lock()
            .map_err(|_| store_err("result store lock poisoned".into()))?;
        Ok(tail(&results, limit))
    }
}
