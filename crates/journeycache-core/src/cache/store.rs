use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{JourneyOverview, Stage};

/// Storage key of the single persisted journey record.
pub const CACHE_KEY: &str = "journey_cache";

/// Last-known journey state. Replaced wholesale on every write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub overview: JourneyOverview,
    pub stages: Vec<Stage>,
    #[serde(rename = "lastUpdatedAt", with = "chrono::serde::ts_milliseconds")]
    pub last_updated_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(
        overview: JourneyOverview,
        stages: Vec<Stage>,
        last_updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            overview,
            stages,
            last_updated_at,
        }
    }
}

/// Persistence for the journey cache.
///
/// One instance is created per session and shared with the coordinator.
pub trait CacheStore: Send + Sync {
    /// Last persisted entry, or `None` when absent or unreadable.
    fn load(&self) -> Option<CacheEntry>;

    /// Replace the persisted entry.
    fn save(&self, entry: &CacheEntry) -> Result<()>;

    /// Remove the persisted entry.
    fn clear(&self) -> Result<()>;
}

/// JSON file in a per-user cache directory.
pub struct FileCacheStore {
    cache_dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache directory: {}", cache_dir.display()))?;
        Ok(Self { cache_dir })
    }

    fn cache_path(&self) -> PathBuf {
        self.cache_dir.join(format!("{}.json", CACHE_KEY))
    }

    fn temp_path(&self) -> PathBuf {
        self.cache_dir.join(format!("{}.json.tmp", CACHE_KEY))
    }
}

impl CacheStore for FileCacheStore {
    fn load(&self) -> Option<CacheEntry> {
        let path = self.cache_path();
        if !path.exists() {
            return None;
        }

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to read journey cache, treating as empty"
                );
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Corrupt journey cache, treating as empty"
                );
                None
            }
        }
    }

    fn save(&self, entry: &CacheEntry) -> Result<()> {
        let contents = serde_json::to_string_pretty(entry)?;
        let temp = self.temp_path();
        std::fs::write(&temp, contents)
            .with_context(|| format!("Failed to write cache file: {}", temp.display()))?;
        // Rename so readers never observe a half-written record
        std::fs::rename(&temp, self.cache_path()).context("Failed to replace journey cache")?;
        debug!(stages = entry.stages.len(), "Journey cache saved");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let path = self.cache_path();
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove journey cache")?;
            debug!("Journey cache cleared");
        }
        Ok(())
    }
}

/// In-process store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entry: Mutex<Option<CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<CacheEntry>> {
        self.entry.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&self) -> Option<CacheEntry> {
        self.slot().clone()
    }

    fn save(&self, entry: &CacheEntry) -> Result<()> {
        *self.slot() = Some(entry.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot() = None;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
