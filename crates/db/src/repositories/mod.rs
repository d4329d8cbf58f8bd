//! Repository types, one per table.

pub mod skip_record_repo;

pub use skip_record_repo::SkipRecordRepo;
