//! # Assay
//!
//! An IT asset inventory classification and report-orchestration service.
//!
//! Spreadsheets of hardware and software assets come in with arbitrary
//! column layouts; assay classifies them, reconciles them against
//! reference gap-analysis templates, scores each asset into a tier,
//! renders charts and a multi-section narrative, delegates document
//! rendering to an external service (with a local fallback), uploads the
//! artifacts, and hands the finished assessment to the next service in
//! the chain via webhook.
//!
//! ## Modules
//!
//! - `config` - Environment-derived configuration, loaded once at startup
//! - `templates` - Reference schemas and the tier classification matrix
//! - `ingest` - File retrieval, tabular parsing, and type inference
//! - `enrich` - Template merge, market suggestions, tier scoring
//! - `charts` - Tier/status distribution charts
//! - `narrative` - Section builders and the text-generation adapter
//! - `report` - External renderer client with local fallback
//! - `render` - The local DOCX/PPTX fallback renderer
//! - `storage` - Cloud storage upload adapter
//! - `notify` - Completion webhook and market-gap chaining
//! - `pipeline` - Per-session orchestration
//! - `pool` - Bounded fire-and-forget worker pool
//! - `server` - HTTP front door
pub mod charts;
pub mod config;
pub mod enrich;
pub mod error;
pub mod ingest;
pub mod narrative;
pub mod notify;
pub mod pipeline;
pub mod pool;
pub mod render;
pub mod report;
pub mod retry;
pub mod server;
pub mod session;
pub mod storage;
pub mod table;
pub mod templates;
