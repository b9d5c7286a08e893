//! Data models for memosync

mod calendar;
mod data_type;
mod entity;
mod sync_conflict;

pub use calendar::{validate_date_key, Calendar, SCHEDULES_FIELD};
pub use data_type::{DataShape, DataType};
pub use entity::{Entity, ID_FIELD};
pub use sync_conflict::{Side, SyncConflict};
