//! Column-to-field tables for every entity kind.
//!
//! Sheets are exported with Italian headers; each table maps a header to the
//! database field it feeds and the transform applied on the way.

use crate::config::{PARENT_ID_COLUMN, STABLE_ID_COLUMN};
use crate::models::{EntityDraft, EntityKind, FieldValue};
use crate::reader::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Trimmed text, blank becomes null
    Text,
    /// Comma-separated list, items trimmed, blank items dropped
    List,
}

impl Transform {
    pub fn apply(self, raw: Option<&str>) -> FieldValue {
        match self {
            Transform::Text => FieldValue::Text(trim_to_null(raw)),
            Transform::List => FieldValue::List(split_list(raw)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub column: &'static str,
    pub field: &'static str,
    pub transform: Transform,
}

const fn text(column: &'static str, field: &'static str) -> FieldSpec {
    FieldSpec {
        column,
        field,
        transform: Transform::Text,
    }
}

const fn list(column: &'static str, field: &'static str) -> FieldSpec {
    FieldSpec {
        column,
        field,
        transform: Transform::List,
    }
}

pub const EVENT_FIELDS: &[FieldSpec] = &[
    text("Titolo", "title"),
    text("Data", "event_date"),
    text("Descrizione", "description"),
    text("Tipo", "type"),
    text("Genere", "genre"),
    text("Evento-Rassegna", "series"),
    list("Tag", "tags"),
    text("Luogo", "place_text"),
    text("Slug", "slug"),
    text("Stato record", "status"),
    text("NOTE", "notes"),
];

pub const PERSON_FIELDS: &[FieldSpec] = &[
    text("Nome completo", "full_name"),
    text("Cognome", "last_name"),
    text("Nome", "first_name"),
    text("Aka", "aka"),
    text("Ruolo", "role"),
    text("Bio", "bio"),
    text("Slug", "slug"),
    text("Stato record", "status"),
];

pub const GROUP_FIELDS: &[FieldSpec] = &[
    text("Nome", "name"),
    text("Tipo", "type"),
    text("Attivo dal...", "active_from"),
    text("fino al...", "active_to"),
    text("Biografia", "bio"),
    text("Stato record", "status"),
];

// Place sheets spell the activity range differently from group sheets.
pub const PLACE_FIELDS: &[FieldSpec] = &[
    text("Nome", "name"),
    text("Città", "city"),
    text("Indirizzo", "address"),
    text("Tipo", "type"),
    text("Attivo dal", "active_from"),
    text("...fino al", "active_to"),
    text("Slug", "slug"),
    text("Stato record", "status"),
];

pub const ORGANIZATION_FIELDS: &[FieldSpec] = &[
    text("Nome", "name"),
    text("Tipo", "type"),
    text("Slug", "slug"),
    text("Stato record", "status"),
];

pub const SOURCE_FIELDS: &[FieldSpec] = &[
    text("Tipo", "type"),
    text("Titolo", "title"),
    text("Stato record", "status"),
];

pub const MEDIA_FIELDS: &[FieldSpec] = &[
    text("Tipo", "type"),
    text("Titolo", "title"),
    text("Slug", "slug"),
    text("Stato record", "status"),
];

pub const ONLINE_RESOURCE_FIELDS: &[FieldSpec] = &[
    text("Tipo", "type"),
    text("Titolo", "title"),
    text("URL", "url"),
    text("Stato record", "status"),
];

pub fn fields(kind: EntityKind) -> &'static [FieldSpec] {
    match kind {
        EntityKind::Event => EVENT_FIELDS,
        EntityKind::Person => PERSON_FIELDS,
        EntityKind::Group => GROUP_FIELDS,
        EntityKind::Place => PLACE_FIELDS,
        EntityKind::Organization => ORGANIZATION_FIELDS,
        EntityKind::Source => SOURCE_FIELDS,
        EntityKind::Media => MEDIA_FIELDS,
        EntityKind::OnlineResource => ONLINE_RESOURCE_FIELDS,
    }
}

/// Maps every field of `kind`; columns missing from the record become null.
pub fn map_record(kind: EntityKind, record: &Record) -> EntityDraft {
    let fields = fields(kind)
        .iter()
        .map(|spec| (spec.field, spec.transform.apply(record.get(spec.column))))
        .collect();
    EntityDraft { kind, fields }
}

/// The row's own stable identifier
pub fn stable_id(record: &Record) -> Option<String> {
    record.text(STABLE_ID_COLUMN)
}

/// The owning event's stable identifier on a link sheet
pub fn parent_id(record: &Record) -> Option<String> {
    record.text(PARENT_ID_COLUMN)
}

pub fn trim_to_null(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn split_list(raw: Option<&str>) -> Option<Vec<String>> {
    let items: Vec<String> = raw?
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

/// Lowercased, trimmed form used for identity comparison
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}
