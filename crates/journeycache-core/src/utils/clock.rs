use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

/// Time source for the coordinator, swappable for deterministic tests.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    #[default]
    System,
    /// A manually driven clock. Clones share the same instant.
    Manual(Arc<Mutex<DateTime<Utc>>>),
}

impl Clock {
    pub fn manual(at: DateTime<Utc>) -> Self {
        Clock::Manual(Arc::new(Mutex::new(at)))
    }

    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Manual(at) => *at.lock().unwrap_or_else(|e| e.into_inner()),
        }
    }

    /// Advance a manual clock. Has no effect on `Clock::System`.
    pub fn advance(&self, delta: Duration) {
        if let Clock::Manual(at) = self {
            let mut at = at.lock().unwrap_or_else(|e| e.into_inner());
            *at += delta;
        }
    }

    /// Current time as epoch milliseconds, used for cache-busting query parameters.
    pub fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let start = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let clock = Clock::manual(start);
        let handle = clock.clone();
        handle.advance(Duration::minutes(3));
        assert_eq!(clock.now(), start + Duration::minutes(3));
        assert_eq!(clock.now_millis(), 1_700_000_180_000);
    }

    #[test]
    fn test_system_clock_ignores_advance() {
        let clock = Clock::System;
        let before = Utc::now();
        clock.advance(Duration::days(1));
        assert!(clock.now() < before + Duration::hours(1));
    }
}
