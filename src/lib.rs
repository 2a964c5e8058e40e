pub mod api;
pub mod core;
pub mod ingest;
pub mod observability;
pub mod records;
pub mod storage;
