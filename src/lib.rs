//! Forensic evidence analysis pipeline.
//!
//! A thin `main.rs` wires this library's pieces together: [`store`] owns
//! content-addressed persistence, [`analyzers`] turns raw bytes into
//! typed analyses via the [`ai`] port, [`correlation`]/[`pattern`]/[`summary`]
//! build case-level artifacts from those analyses, and [`orchestrator`] is
//! the one place that knows the full ingest → analyze → correlate →
//! summarize stage order.

pub mod ai;
pub mod analyzers;
pub mod config;
pub mod correlation;
pub mod error;
pub mod extract;
pub mod models;
pub mod orchestrator;
pub mod pattern;
pub mod store;
pub mod summary;

pub use config::Config;
pub use error::Error;
pub use store::EvidenceStore;
