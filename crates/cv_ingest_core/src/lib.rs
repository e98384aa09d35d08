//! Shared CV ingestion domain primitives.
//!
//! This crate owns the deterministic part of ingestion: the relational row
//! model, value cleaning, column remapping, affiliation precedence, and the
//! per-upload report. It intentionally excludes AWS SDK, Lambda runtime, and
//! database driver concerns; those live in `cv_ingest_lambda`.

pub mod affiliation;
pub mod clean;
pub mod column_map;
pub mod memory_sink;
pub mod model;
pub mod object_keys;
pub mod pipeline;
pub mod records;
pub mod report;
