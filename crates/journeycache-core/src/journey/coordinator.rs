//! Read-through coordination between the journey cache and the backend.
//!
//! `refresh_data` serves a fresh cache entry without touching the network and
//! otherwise fetches the overview, then the stages, and replaces the cache.
//! `force_refresh` clears the cache and re-fetches with cache-busting
//! timestamps.
//!
//! Concurrent `refresh_data` calls are not coalesced: each checks staleness on
//! its own and may issue its own fetch, and the last write to the store wins.
//! A forced refresh cannot be cancelled once issued.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiError, JourneyApi};
use crate::cache::{is_stale, CacheEntry, CacheStore};
use crate::models::{JourneyOverview, Stage};
use crate::utils::Clock;

use super::detector::JourneyChangeDetector;

#[derive(Error, Debug)]
pub enum JourneyError {
    #[error("Failed to fetch journey overview: {0}")]
    Overview(#[source] ApiError),

    #[error("Failed to fetch journey stages: {0}")]
    Stages(#[source] ApiError),
}

impl JourneyError {
    pub fn api_error(&self) -> &ApiError {
        match self {
            JourneyError::Overview(e) | JourneyError::Stages(e) => e,
        }
    }

    /// True when the session is no longer accepted and the user must log in again.
    pub fn is_auth_error(&self) -> bool {
        self.api_error().is_auth_error()
    }
}

/// Where a snapshot's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Cache,
    Network,
    /// No session token; the overview is the "no journey" sentinel.
    Unauthenticated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JourneySnapshot {
    pub overview: JourneyOverview,
    pub stages: Vec<Stage>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub source: DataSource,
}

impl JourneySnapshot {
    fn from_entry(entry: CacheEntry, source: DataSource) -> Self {
        Self {
            overview: entry.overview,
            stages: entry.stages,
            last_updated_at: Some(entry.last_updated_at),
            source,
        }
    }

    fn unauthenticated() -> Self {
        Self {
            overview: JourneyOverview::no_journey(),
            stages: Vec::new(),
            last_updated_at: None,
            source: DataSource::Unauthenticated,
        }
    }

    pub fn stage(&self, stage_id: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == stage_id)
    }

    /// The stage following `stage_id`, if any.
    pub fn next_stage(&self, stage_id: &str) -> Option<&Stage> {
        let index = self.stages.iter().position(|s| s.id == stage_id)?;
        self.stages.get(index + 1)
    }

    pub fn current_stage(&self) -> Option<&Stage> {
        self.stages.get(self.overview.current_stage_index)
    }
}

/// One per session. Shares the store and API handles it was built with.
pub struct JourneyCoordinator {
    store: Arc<dyn CacheStore>,
    api: Arc<dyn JourneyApi>,
    ttl: Duration,
    clock: Clock,
    detector: JourneyChangeDetector,
}

impl JourneyCoordinator {
    pub fn new(store: Arc<dyn CacheStore>, api: Arc<dyn JourneyApi>, ttl: Duration) -> Self {
        Self {
            store,
            api,
            ttl,
            clock: Clock::default(),
            detector: JourneyChangeDetector::new(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn api(&self) -> &Arc<dyn JourneyApi> {
        &self.api
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached journey if fresh, otherwise fetched from the backend and cached.
    pub async fn refresh_data(&self) -> Result<JourneySnapshot, JourneyError> {
        if !self.api.is_authenticated() {
            debug!("No session token, returning no-journey overview");
            return Ok(JourneySnapshot::unauthenticated());
        }

        if let Some(entry) = self.store.load() {
            if !is_stale(Some(entry.last_updated_at), self.clock.now(), self.ttl) {
                debug!(last_updated_at = %entry.last_updated_at, "Serving journey from cache");
                self.detector.remember(entry.overview.id.as_deref());
                return Ok(JourneySnapshot::from_entry(entry, DataSource::Cache));
            }
            debug!(last_updated_at = %entry.last_updated_at, "Journey cache is stale");
        }

        self.fetch_and_store(false, None).await
    }

    /// Drop the cache and re-fetch with cache-busting timestamps.
    pub async fn force_refresh(&self) -> Result<JourneySnapshot, JourneyError> {
        if !self.api.is_authenticated() {
            debug!("No session token, returning no-journey overview");
            return Ok(JourneySnapshot::unauthenticated());
        }

        let previous = self.store.load().map(|e| e.last_updated_at);
        self.invalidate();
        info!("Force refreshing journey");
        self.fetch_and_store(true, previous).await
    }

    /// Whatever the store holds, fresh or not. For showing stale data after a failed refresh.
    pub fn cached(&self) -> Option<JourneySnapshot> {
        self.store
            .load()
            .map(|entry| JourneySnapshot::from_entry(entry, DataSource::Cache))
    }

    /// Whether the next `refresh_data` would go to the network.
    pub fn is_cache_stale(&self) -> bool {
        let last = self.store.load().map(|e| e.last_updated_at);
        is_stale(last, self.clock.now(), self.ttl)
    }

    /// Remove the cached entry.
    pub fn invalidate(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear journey cache");
        }
    }

    /// Forget everything belonging to the current user.
    pub fn logout(&self) {
        self.invalidate();
        self.detector.reset();
        info!("Journey cache cleared for logout");
    }

    async fn fetch_and_store(
        &self,
        cache_bust: bool,
        floor: Option<DateTime<Utc>>,
    ) -> Result<JourneySnapshot, JourneyError> {
        // Overview first: its journey id drives change detection before stages are fetched
        let overview_bust = cache_bust.then(|| self.clock.now_millis());
        let overview = self
            .api
            .fetch_overview(overview_bust)
            .await
            .map_err(JourneyError::Overview)?;

        if self.detector.observe(overview.id.as_deref()) {
            info!(journey_id = ?overview.id, "New journey detected, clearing cache");
            self.invalidate();
        }

        let stages_bust = cache_bust.then(|| self.clock.now_millis());
        let mut stages = self
            .api
            .fetch_stages(stages_bust)
            .await
            .map_err(JourneyError::Stages)?;

        // Stages of another journey (server switched between the two calls) are never shown
        let before = stages.len();
        stages.retain(|s| s.journey_id.is_none() || s.journey_id == overview.id);
        if stages.len() != before {
            warn!(
                dropped = before - stages.len(),
                journey_id = ?overview.id,
                "Dropped stages belonging to a different journey"
            );
        }

        let now = self.clock.now();
        let last_updated_at = floor.map_or(now, |f| now.max(f));
        let entry = CacheEntry::new(overview, stages, last_updated_at);
        if let Err(e) = self.store.save(&entry) {
            warn!(error = %e, "Failed to write journey cache");
        }

        debug!(
            journey_id = ?entry.overview.id,
            stages = entry.stages.len(),
            cache_bust,
            "Journey fetched from network"
        );
        Ok(JourneySnapshot::from_entry(entry, DataSource::Network))
    }
}

// ============================================================================
// Tests
// ============================================================================
