//! Offline-first sync engine.
//!
//! The merge functions are synchronous over fetched snapshots and the local
//! store; only [`RemoteStore`] calls suspend. [`SyncSession`] ties them
//! together for one user.

mod calendar;
mod canonical;
mod fingerprint;
mod guard;
mod merge;
mod metadata;
mod remote;
mod session;
mod settings;
mod timestamp;

pub use calendar::{merge_calendar, CalendarMerge};
pub use canonical::{to_canonical_string, ContentDigest};
pub use fingerprint::{Fingerprint, FingerprintStore, FINGERPRINT_KEY_PREFIX};
pub use guard::{Admission, CycleGuard, CyclePermit};
pub use merge::{merge_collection, merge_entity, resolve_local_only, CollectionMerge, Merged};
pub use metadata::{
    compare_timestamps, ConflictSummary, StrategyEntry, SyncAction, SyncMetadataTracker,
    SyncStrategy, SyncThresholds, TimestampConflict, SYNC_TIMESTAMP_KEY_PREFIX,
};
pub use remote::RemoteStore;
pub use session::{pending_uploads, CycleReport, PushOutcome, PushReport, SyncSession};
pub use settings::{
    macros_document, macros_from_document, merge_macros, merge_settings, MACROS_DOC_ID,
    MACROS_ITEM_TYPE, SETTINGS_DOC_ID, SETTINGS_ITEM_TYPE,
};
pub use timestamp::{
    fields_timestamp, list_timestamp, millis_of, server_millis, timestamp_of, value_timestamp,
    TIMESTAMP_FIELD, UPDATED_AT_FIELD,
};
