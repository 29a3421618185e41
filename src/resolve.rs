use crate::mapping::{map_record, stable_id};
use crate::models::{AssociationKind, EntityId, EntityKind};
use crate::reader::Record;
use crate::stats::ImportStats;
use crate::store::Store;
use anyhow::Result;
use tracing::{debug, warn};

/// Upserts one row of an identified sheet, keyed by its `form_record_id`.
///
/// Every mapped field is overwritten, so a column left blank in this export
/// clears the stored value. Rows without a stable id are skipped: there is
/// no key to update them by on the next run.
pub async fn upsert_entity<S: Store>(
    store: &S,
    kind: EntityKind,
    record: &Record,
    stats: &ImportStats,
) -> Result<Option<EntityId>> {
    let Some(key) = stable_id(record) else {
        warn!(%kind, "Row without form_record_id in identified sheet, skipping");
        stats.inc_missing_stable_id();
        return Ok(None);
    };

    let draft = map_record(kind, record);
    let id = store.upsert(&draft, &key).await?;

    match id {
        Some(id) => {
            debug!(%kind, source_record_id = %key, id, "Upserted");
            stats.inc_upserted(kind);
        }
        None => {
            warn!(%kind, source_record_id = %key, "Upsert produced no row");
            stats.inc_unwritten();
        }
    }
    Ok(id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Created,
    Existing,
    /// One endpoint did not resolve; nothing was written
    Skipped,
}

/// Associates an event with a related entity if both ids resolved.
pub async fn link_entities<S: Store>(
    store: &S,
    kind: AssociationKind,
    event_id: Option<EntityId>,
    related_id: Option<EntityId>,
    stats: &ImportStats,
) -> Result<LinkOutcome> {
    let (Some(event_id), Some(related_id)) = (event_id, related_id) else {
        debug!(%kind, ?event_id, ?related_id, "Unresolved endpoint, link skipped");
        stats.inc_links_unresolved();
        return Ok(LinkOutcome::Skipped);
    };

    if store.link(kind, event_id, related_id).await? {
        stats.inc_links_created();
        Ok(LinkOutcome::Created)
    } else {
        stats.inc_links_existing();
        Ok(LinkOutcome::Existing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn record(cells: &[(&str, &str)]) -> Record {
        cells.iter().copied().collect()
    }

    #[tokio::test]
    async fn upsert_twice_keeps_one_row_with_latest_fields() -> Result<()> {
        let store = MemoryStore::new();
        let stats = ImportStats::new();

        let first = record(&[("form_record_id", "1"), ("Titolo", "Concerto"), ("NOTE", "old")]);
        let second = record(&[("form_record_id", "1"), ("Titolo", "Concerto d'estate")]);

        let a = upsert_entity(&store, EntityKind::Event, &first, &stats).await?;
        let b = upsert_entity(&store, EntityKind::Event, &second, &stats).await?;

        assert_eq!(a, b);
        let rows = store.rows(EntityKind::Event);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text("title"), Some("Concerto d'estate"));
        assert_eq!(rows[0].text("notes"), None);
        assert_eq!(stats.upserts(EntityKind::Event), 2);
        Ok(())
    }

    #[tokio::test]
    async fn upsert_without_stable_id_writes_nothing() -> Result<()> {
        let store = MemoryStore::new();
        let stats = ImportStats::new();

        let id = upsert_entity(
            &store,
            EntityKind::Person,
            &record(&[("form_record_id", "  "), ("Nome completo", "Maria Rossi")]),
            &stats,
        )
        .await?;

        assert_eq!(id, None);
        assert!(store.rows(EntityKind::Person).is_empty());
        assert_eq!(stats.report().missing_stable_id, 1);
        Ok(())
    }

    #[tokio::test]
    async fn link_is_idempotent() -> Result<()> {
        let store = MemoryStore::new();
        let stats = ImportStats::new();
        let event = upsert_entity(
            &store,
            EntityKind::Event,
            &record(&[("form_record_id", "1"), ("Titolo", "Concerto")]),
            &stats,
        )
        .await?;
        let group = upsert_entity(
            &store,
            EntityKind::Group,
            &record(&[("form_record_id", "4"), ("Nome", "Banda")]),
            &stats,
        )
        .await?;

        let first = link_entities(&store, AssociationKind::EventGroup, event, group, &stats).await?;
        let second = link_entities(&store, AssociationKind::EventGroup, event, group, &stats).await?;

        assert_eq!(first, LinkOutcome::Created);
        assert_eq!(second, LinkOutcome::Existing);
        assert_eq!(store.pairs(AssociationKind::EventGroup).len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn link_with_missing_endpoint_is_a_no_op() -> Result<()> {
        let store = MemoryStore::new();
        let stats = ImportStats::new();

        let outcome =
            link_entities(&store, AssociationKind::EventMedia, None, Some(3), &stats).await?;
        assert_eq!(outcome, LinkOutcome::Skipped);

        let outcome =
            link_entities(&store, AssociationKind::EventMedia, Some(1), None, &stats).await?;
        assert_eq!(outcome, LinkOutcome::Skipped);

        assert!(store.pairs(AssociationKind::EventMedia).is_empty());
        assert_eq!(stats.report().links_unresolved, 2);
        Ok(())
    }
}
