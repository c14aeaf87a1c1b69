//! # shelf-ingest
//!
//! Incremental, deduplicating ingestion of PDF books and question/answer
//! datasets into named vector collections.
//!
//! Every run consults the target collection for what it already holds,
//! lists the candidates at a source location, and only transforms and
//! commits the ones that are new. Re-running over an unchanged location
//! adds nothing.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌──────┐   ┌───────────┐   ┌────────┐
//! │ resolve  │──▶│ inventory │──▶│ diff │──▶│ transform │──▶│ commit │
//! │processed │   │candidates │   │      │   │ + enrich  │   │  once  │
//! └──────────┘   └───────────┘   └──────┘   └───────────┘   └────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! shelf init                      # create database
//! shelf sources                   # check configured profiles
//! shelf ingest books              # ingest new PDFs of one profile
//! shelf ingest all --dry-run      # preview every profile
//! shelf collections               # chunk and source counts
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Candidates, pages, chunks, metadata |
//! | [`error`] | Typed component errors |
//! | [`resolve`] | Processed-set resolution |
//! | [`inventory`] | Candidate listing for a source profile |
//! | [`parse`] | Page-level PDF text extraction |
//! | [`chunk`] | Paragraph chunking |
//! | [`transform`] | Per-item transformation with explicit outcomes |
//! | [`metadata`] | Metadata enrichment and per-item overrides |
//! | [`commit`] | Timed commit with transient retry |
//! | [`ingest`] | Run coordinator and report |
//! | [`store`] | Collection backends (SQLite, in-memory) |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`progress`] | Progress reporting on stderr |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod chunk;
pub mod collections;
pub mod commit;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod inventory;
pub mod logging;
pub mod metadata;
pub mod migrate;
pub mod models;
pub mod parse;
pub mod progress;
pub mod resolve;
pub mod sources;
pub mod store;
pub mod transform;
