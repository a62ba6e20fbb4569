use chrono::{DateTime, Duration, Utc};

/// Default time a cached journey stays fresh.
pub const DEFAULT_TTL_MINUTES: i64 = 5;

/// Whether data last written at `last_updated_at` must be re-fetched at `now`.
///
/// Missing timestamps are always stale, as is everything under a zero TTL.
pub fn is_stale(
    last_updated_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    ttl: Duration,
) -> bool {
    match last_updated_at {
        None => true,
        // Zero TTL disables caching: stale even at zero elapsed time, ahead of `now - last > ttl`
        Some(_) if ttl <= Duration::zero() => true,
        Some(last) => now - last > ttl,
    }
}
