//! Persistence port.
//!
//! Every resolver receives a `&S: Store` explicitly. [`PgStore`] talks to
//! PostgreSQL; [`MemoryStore`] keeps the same uniqueness rules in memory and
//! backs the test suite.

pub mod memory;
pub mod postgres;

pub use memory::{MemoryStore, StoredEntity};
pub use postgres::PgStore;

use crate::models::{AssociationKind, EntityDraft, EntityId, EntityKind};
use anyhow::Result;
use rustc_hash::FxHashMap;

/// Snapshot of `source_record_id -> id` for one entity kind
pub type IdMap = FxHashMap<String, EntityId>;

/// Extra identity field for dedup lookups, compared with
/// `IS NOT DISTINCT FROM` semantics (null equals null).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Secondary<'a> {
    pub field: &'static str,
    pub value: Option<&'a str>,
}

#[allow(async_fn_in_trait)]
pub trait Store {
    /// Creates missing tables and constraints; safe to call on every run
    async fn ensure_schema(&self) -> Result<()>;

    /// Inserts the draft or, when a row with the same `source_record_id`
    /// exists, overwrites all of its mapped fields and refreshes `updated_at`.
    async fn upsert(&self, draft: &EntityDraft, source_record_id: &str)
        -> Result<Option<EntityId>>;

    /// First row whose `name_field` equals `name` after trimming and case
    /// folding, further restricted by `secondary` when given.
    async fn find_match(
        &self,
        kind: EntityKind,
        name_field: &'static str,
        name: &str,
        secondary: Option<Secondary<'_>>,
    ) -> Result<Option<EntityId>>;

    /// Plain insert with a null `source_record_id`
    async fn insert(&self, draft: &EntityDraft) -> Result<Option<EntityId>>;

    /// One bulk read of every keyed row of `kind`
    async fn source_id_map(&self, kind: EntityKind) -> Result<IdMap>;

    /// Insert-if-absent. `Ok(true)` when the pair was new.
    async fn link(
        &self,
        kind: AssociationKind,
        event_id: EntityId,
        related_id: EntityId,
    ) -> Result<bool>;

    async fn count(&self, kind: EntityKind) -> Result<i64>;

    async fn count_links(&self, kind: AssociationKind) -> Result<i64>;

    /// `(id, label_field)` for every row of `kind`, ordered by id
    async fn labels(&self, kind: EntityKind) -> Result<Vec<(EntityId, Option<String>)>>;

    /// `(event_id, related_id)` for every pair of `kind`
    async fn link_pairs(&self, kind: AssociationKind) -> Result<Vec<(EntityId, EntityId)>>;
}
