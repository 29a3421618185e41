//! Ariadne: spreadsheet import pipeline for a cultural-event archive
//!
//! Event catalog exports arrive as `;`-delimited sheets. Some carry a stable
//! `form_record_id` per row, others carry none. This crate merges both into a
//! relational schema of entities (events, people, groups, places,
//! organizations, sources, media, online resources) and event associations,
//! without creating duplicates when the same exports are imported again.
//!
//! 1. **Identified pass** -- Upsert every event by its stable id, snapshot the
//!    `source_record_id -> id` map, then walk each `LinkTo-*` sheet: upsert the
//!    related entity and associate it with its parent event
//! 2. **Seeding pass** -- For sheets without ids, match each row by a trimmed,
//!    case-folded name (plus city or date where relevant) and insert only when
//!    nothing matches
//!
//! Re-running the whole import is the recovery path after a failure: upserts,
//! dedup lookups and `ON CONFLICT DO NOTHING` links make a second run a no-op
//! for data that already landed.
//!
//! # Key Modules
//!
//! - [`reader`] -- Lazy `;`-delimited sheet reader tolerant of missing files
//! - [`mapping`] -- Declarative column-to-field tables per entity kind
//! - [`resolve`] -- Upsert-by-stable-id and link resolution
//! - [`dedup`] -- Name-based identity resolution for rows without ids
//! - [`import`] -- Two-phase orchestration and progress reporting
//! - [`store`] -- Persistence port with PostgreSQL and in-memory adapters
//! - [`views`] -- Totals and graph projection over the stored archive
//! - [`stats`] -- Counters and the completion report
//! - [`models`] -- Entity and association kinds, field values
//! - [`config`] -- Sheet names, column names and connection constants
//!
//! # Example Usage
//!
//! ```bash
//! # Import ./Eventi and ./Eventi-NO_ID into the database in DATABASE_URL
//! ariadne import --data-dir . -v
//!
//! # Row counts and graph projection as JSON
//! ariadne stats
//! ariadne graph --out graph.json
//! ```

pub mod config;
pub mod dedup;
pub mod import;
pub mod mapping;
pub mod models;
pub mod reader;
pub mod resolve;
pub mod stats;
pub mod store;
pub mod views;
