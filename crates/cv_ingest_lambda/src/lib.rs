//! AWS-oriented adapters and handlers for CV upload ingestion.
//!
//! This crate owns runtime integration details (Lambda handlers, object
//! storage, and the PostgreSQL record sink). Domain behavior lives in
//! `cv_ingest_core`.

pub mod adapters;
pub mod config;
pub mod handlers;
