//! Identity resolution for rows that arrive without a stable id.
//!
//! A no-id row is matched against everything already stored for its kind by
//! a trimmed, case-folded name, optionally narrowed by one more field. A match
//! is left untouched; otherwise the row is inserted with a null
//! `source_record_id`.

use crate::mapping::map_record;
use crate::models::{EntityId, EntityKind, FieldValue};
use crate::reader::Record;
use crate::stats::ImportStats;
use crate::store::{Secondary, Store};
use anyhow::Result;
use tracing::debug;

pub struct DedupRule {
    pub kind: EntityKind,
    /// Field holding the identity name; overwritten with the resolved name
    pub name_field: &'static str,
    pub resolve_name: fn(&Record) -> Option<String>,
    /// Also compared, null equal to null
    pub secondary: Option<&'static str>,
}

fn person_name(record: &Record) -> Option<String> {
    record.text("Nome completo").or_else(|| {
        let parts: Vec<String> = [record.text("Nome"), record.text("Cognome")]
            .into_iter()
            .flatten()
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    })
}

fn group_name(record: &Record) -> Option<String> {
    record.text("Nome")
}

// Venues exported without a name are known by their city.
fn place_name(record: &Record) -> Option<String> {
    record.text("Nome").or_else(|| record.text("Città"))
}

fn event_title(record: &Record) -> Option<String> {
    record.text("Titolo")
}

pub const PERSON_RULE: DedupRule = DedupRule {
    kind: EntityKind::Person,
    name_field: "full_name",
    resolve_name: person_name,
    secondary: None,
};

pub const GROUP_RULE: DedupRule = DedupRule {
    kind: EntityKind::Group,
    name_field: "name",
    resolve_name: group_name,
    secondary: None,
};

pub const PLACE_RULE: DedupRule = DedupRule {
    kind: EntityKind::Place,
    name_field: "name",
    resolve_name: place_name,
    secondary: Some("city"),
};

pub const EVENT_RULE: DedupRule = DedupRule {
    kind: EntityKind::Event,
    name_field: "title",
    resolve_name: event_title,
    secondary: Some("event_date"),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Inserted(EntityId),
    Matched(EntityId),
    MissingName,
    Unwritten,
}

/// Inserts the row unless an entity with the same identity already exists.
/// Never updates an existing row.
pub async fn seed_entity<S: Store>(
    store: &S,
    rule: &DedupRule,
    record: &Record,
    stats: &ImportStats,
) -> Result<SeedOutcome> {
    let kind = rule.kind;
    let Some(name) = (rule.resolve_name)(record) else {
        debug!(%kind, "No-id row without a name, skipping");
        stats.inc_missing_name();
        return Ok(SeedOutcome::MissingName);
    };

    let mut draft = map_record(kind, record);
    draft.set(rule.name_field, FieldValue::Text(Some(name.clone())));

    let secondary = rule.secondary.map(|field| Secondary {
        field,
        value: draft.text(field),
    });

    if let Some(id) = store
        .find_match(kind, rule.name_field, &name, secondary)
        .await?
    {
        debug!(%kind, %name, id, "Already present");
        stats.inc_matched(kind);
        return Ok(SeedOutcome::Matched(id));
    }

    match store.insert(&draft).await? {
        Some(id) => {
            debug!(%kind, %name, id, "Seeded");
            stats.inc_seeded(kind);
            Ok(SeedOutcome::Inserted(id))
        }
        None => {
            stats.inc_unwritten();
            Ok(SeedOutcome::Unwritten)
        }
    }
}
