//! Sentiment cache adapters.
//!
//! [`FileSentimentCache`] keeps one CSV file per key. Writes go to a
//! uniquely named temp file that is then renamed into place, so concurrent
//! writers of the same key never leave a torn file: the last rename wins and
//! every candidate holds the same derived content.

use crate::adapters::csv_adapter::{read_sentiment_csv, write_sentiment_csv};
use crate::domain::error::SentimentError;
use crate::domain::sentiment::SentimentPoint;
use crate::ports::sentiment_cache_port::{CacheKey, SentimentCache};
use std::collections::HashMap;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct FileSentimentCache {
    cache_dir: PathBuf,
}

impl FileSentimentCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// `sentiment_{symbol}_{bucket}.csv`, with `/` in the symbol replaced.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        let name = key.to_string().replace('/', "-");
        self.cache_dir.join(format!("{name}.csv"))
    }
}

fn cache_err(reason: String) -> SentimentError {
    SentimentError::Cache { reason }
}

impl SentimentCache for FileSentimentCache {
    fn load(&self, key: &CacheKey) -> Result<Option<Vec<SentimentPoint>>, SentimentError> {
        let path = self.path_for(key);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(cache_err(format!("failed to open {}: {e}", path.display()))),
        };
        read_sentiment_csv(file)
            .map(Some)
            .map_err(|e| cache_err(format!("{}: {e}", path.display())))
    }

    fn store(&self, key: &CacheKey, series: &[SentimentPoint]) -> Result<(), SentimentError> {
        fs::create_dir_all(&self.cache_dir).map_err(|e| {
            cache_err(format!("failed to create {}: {e}", self.cache_dir.display()))
        })?;

        let path = self.path_for(key);
        let tmp_path = path.with_extension(format!(
            "csv.{}.{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let written = fs::File::create(&tmp_path)
            .map_err(|e| format!("failed to create {}: {e}", tmp_path.display()))
            .and_then(|f| write_sentiment_csv(BufWriter::new(f), series));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(cache_err(e));
        }

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            cache_err(format!("atomic rename failed: {e}"))
        })
    }
}

/// Process-local cache, mainly for tests and embedding.
#[derive(Default)]
pub struct MemorySentimentCache {
    entries: Mutex<HashMap<CacheKey, Vec<SentimentPoint>>>,
}

impl MemorySentimentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |m| m.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SentimentCache for MemorySentimentCache {
    fn load(&self, key: &CacheKey) -> Result<Option<Vec<SentimentPoint>>, SentimentError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| cache_err("cache lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn store(&self, key: &CacheKey, series: &[SentimentPoint]) -> Result<(), SentimentError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| cache_err("cache lock poisoned".into()))?;
        entries.insert(key.clone(), series.to_vec());
        Ok(())
    }
}
