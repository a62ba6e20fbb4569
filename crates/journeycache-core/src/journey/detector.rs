use std::sync::Mutex;

use tracing::info;

/// Remembers the journey id seen last and reports when the server starts
/// returning a different one. In memory only.
#[derive(Debug, Default)]
pub struct JourneyChangeDetector {
    last_id: Mutex<Option<String>>,
}

impl JourneyChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `new_id` and return true if a different journey was remembered before.
    ///
    /// A missing id (no active journey) counts as a change away from a known journey.
    pub fn observe(&self, new_id: Option<&str>) -> bool {
        let mut last = self.lock();
        let changed = match (last.as_deref(), new_id) {
            (Some(previous), Some(current)) => previous != current,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if changed {
            info!(previous = ?*last, current = ?new_id, "Journey identity changed");
        }
        *last = new_id.map(str::to_string);
        changed
    }

    /// Remember `id` without reporting a change, e.g. when serving from cache.
    pub fn remember(&self, id: Option<&str>) {
        let mut last = self.lock();
        if id.is_some() {
            *last = id.map(str::to_string);
        }
    }

    pub fn last_id(&self) -> Option<String> {
        self.lock().clone()
    }

    pub fn reset(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        // A poisoned lock still holds a valid Option<String>
        self.last_id.lock().unwrap_or_else(|e| e.into_inner())
    }
}
