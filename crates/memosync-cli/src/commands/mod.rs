pub mod common;
pub mod completions;
pub mod delete;
pub mod local;
pub mod merge;
pub mod metadata;
pub mod pending;
pub mod record;
pub mod status;
pub mod sync;
