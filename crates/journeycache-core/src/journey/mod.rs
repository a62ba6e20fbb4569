//! Journey freshness: status derivation, change detection, read-through
//! coordination and post-mutation reconciliation.

pub mod coordinator;
pub mod detector;
pub mod reconcile;
pub mod status;

pub use coordinator::{DataSource, JourneyCoordinator, JourneyError, JourneySnapshot};
pub use detector::JourneyChangeDetector;
pub use reconcile::{FinalTestVerdict, MutationOutcome, Reconciler};
pub use status::{apply_statuses, derive_status};
