use super::{IdMap, Secondary, Store};
use crate::mapping::normalize;
use crate::models::{AssociationKind, EntityDraft, EntityId, EntityKind, FieldValue};
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntity {
    pub id: EntityId,
    pub source_record_id: Option<String>,
    pub fields: Vec<(&'static str, FieldValue)>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredEntity {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, value)| value)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }
}

#[derive(Default)]
struct Tables {
    next_ids: BTreeMap<EntityKind, EntityId>,
    entities: BTreeMap<EntityKind, Vec<StoredEntity>>,
    links: BTreeMap<AssociationKind, BTreeSet<(EntityId, EntityId)>>,
}

impl Tables {
    fn push(&mut self, draft: &EntityDraft, source_record_id: Option<&str>) -> EntityId {
        let next = self.next_ids.entry(draft.kind).or_insert(1);
        let id = *next;
        *next += 1;

        let now = Utc::now();
        self.entities
            .entry(draft.kind)
            .or_default()
            .push(StoredEntity {
                id,
                source_record_id: source_record_id.map(str::to_string),
                fields: draft.fields.clone(),
                created_at: now,
                updated_at: now,
            });
        id
    }

    fn exists(&self, kind: EntityKind, id: EntityId) -> bool {
        self.entities
            .get(&kind)
            .is_some_and(|rows| rows.iter().any(|row| row.id == id))
    }
}

/// In-process store with the same keys and constraints as the SQL schema:
/// unique `source_record_id` per kind, unique association pairs, and
/// association endpoints that must exist.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of every row of `kind`, ordered by id
    pub fn rows(&self, kind: EntityKind) -> Vec<StoredEntity> {
        self.tables()
            .entities
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    pub fn pairs(&self, kind: AssociationKind) -> Vec<(EntityId, EntityId)> {
        self.tables()
            .links
            .get(&kind)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl Store for MemoryStore {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert(
        &self,
        draft: &EntityDraft,
        source_record_id: &str,
    ) -> Result<Option<EntityId>> {
        let mut tables = self.tables();
        let existing = tables.entities.get_mut(&draft.kind).and_then(|rows| {
            rows.iter_mut()
                .find(|row| row.source_record_id.as_deref() == Some(source_record_id))
        });

        if let Some(row) = existing {
            row.fields = draft.fields.clone();
            row.updated_at = Utc::now();
            return Ok(Some(row.id));
        }

        Ok(Some(tables.push(draft, Some(source_record_id))))
    }

    async fn find_match(
        &self,
        kind: EntityKind,
        name_field: &'static str,
        name: &str,
        secondary: Option<Secondary<'_>>,
    ) -> Result<Option<EntityId>> {
        let wanted = normalize(name);
        let tables = self.tables();
        let Some(rows) = tables.entities.get(&kind) else {
            return Ok(None);
        };

        let found = rows.iter().find(|row| {
            let name_matches = row
                .text(name_field)
                .is_some_and(|stored| normalize(stored) == wanted);
            let secondary_matches =
                secondary.is_none_or(|s| row.text(s.field) == s.value);
            name_matches && secondary_matches
        });
        Ok(found.map(|row| row.id))
    }

    async fn insert(&self, draft: &EntityDraft) -> Result<Option<EntityId>> {
        Ok(Some(self.tables().push(draft, None)))
    }

    async fn source_id_map(&self, kind: EntityKind) -> Result<IdMap> {
        let tables = self.tables();
        let map = tables
            .entities
            .get(&kind)
            .into_iter()
            .flatten()
            .filter_map(|row| row.source_record_id.clone().map(|key| (key, row.id)))
            .collect();
        Ok(map)
    }

    async fn link(
        &self,
        kind: AssociationKind,
        event_id: EntityId,
        related_id: EntityId,
    ) -> Result<bool> {
        let mut tables = self.tables();
        if !tables.exists(EntityKind::Event, event_id) {
            bail!("{}: event {event_id} does not exist", kind.table());
        }
        if !tables.exists(kind.related(), related_id) {
            bail!(
                "{}: {} {related_id} does not exist",
                kind.table(),
                kind.related()
            );
        }
        Ok(tables
            .links
            .entry(kind)
            .or_default()
            .insert((event_id, related_id)))
    }

    async fn count(&self, kind: EntityKind) -> Result<i64> {
        Ok(self.tables().entities.get(&kind).map_or(0, Vec::len) as i64)
    }

    async fn count_links(&self, kind: AssociationKind) -> Result<i64> {
        Ok(self.tables().links.get(&kind).map_or(0, BTreeSet::len) as i64)
    }

    async fn labels(&self, kind: EntityKind) -> Result<Vec<(EntityId, Option<String>)>> {
        let labels = self
            .rows(kind)
            .into_iter()
            .map(|row| (row.id, row.text(kind.label_field()).map(str::to_string)))
            .collect();
        Ok(labels)
    }

    async fn link_pairs(&self, kind: AssociationKind) -> Result<Vec<(EntityId, EntityId)>> {
        Ok(self.pairs(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::map_record;
    use crate::reader::Record;

    fn place(name: &str, city: Option<&str>) -> EntityDraft {
        let mut cells = vec![("Nome", name)];
        if let Some(city) = city {
            cells.push(("Città", city));
        }
        map_record(EntityKind::Place, &cells.into_iter().collect::<Record>())
    }

    #[tokio::test]
    async fn upsert_overwrites_in_place() -> Result<()> {
        let store = MemoryStore::new();
        let first = store.upsert(&place("Teatro", Some("Roma")), "5").await?;
        let second = store.upsert(&place("Teatro Nuovo", None), "5").await?;

        assert_eq!(first, second);
        let rows = store.rows(EntityKind::Place);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text("name"), Some("Teatro Nuovo"));
        assert_eq!(rows[0].text("city"), None);
        assert!(rows[0].updated_at >= rows[0].created_at);
        Ok(())
    }

    #[tokio::test]
    async fn find_match_treats_null_secondary_as_equal() -> Result<()> {
        let store = MemoryStore::new();
        store.insert(&place("Arena", None)).await?;
        store.insert(&place("Arena", Some("Verona"))).await?;

        let null_city = Secondary {
            field: "city",
            value: None,
        };
        let verona = Secondary {
            field: "city",
            value: Some("Verona"),
        };
        let milano = Secondary {
            field: "city",
            value: Some("Milano"),
        };

        assert_eq!(
            store.find_match(EntityKind::Place, "name", " arena", Some(null_city)).await?,
            Some(1)
        );
        assert_eq!(
            store.find_match(EntityKind::Place, "name", "ARENA", Some(verona)).await?,
            Some(2)
        );
        assert_eq!(
            store.find_match(EntityKind::Place, "name", "arena", Some(milano)).await?,
            None
        );
        Ok(())
    }

    #[tokio::test]
    async fn link_rejects_missing_endpoints() -> Result<()> {
        let store = MemoryStore::new();
        store.insert(&place("Arena", None)).await?;
        assert!(store.link(AssociationKind::EventPlace, 1, 1).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn ids_are_assigned_per_kind() -> Result<()> {
        let store = MemoryStore::new();
        let place_id = store.insert(&place("Arena", None)).await?;
        let group = map_record(
            EntityKind::Group,
            &[("Nome", "Banda")].into_iter().collect::<Record>(),
        );
        let group_id = store.insert(&group).await?;

        assert_eq!(place_id, Some(1));
        assert_eq!(group_id, Some(1));
        assert_eq!(store.count(EntityKind::Place).await?, 1);
        Ok(())
    }
}
