use crate::mapping::{self, FieldSpec};
use serde::Serialize;
use std::fmt;

/// System-assigned row id
pub type EntityId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Event,
    Person,
    Group,
    Place,
    Organization,
    Source,
    Media,
    OnlineResource,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Event,
        EntityKind::Person,
        EntityKind::Group,
        EntityKind::Place,
        EntityKind::Organization,
        EntityKind::Source,
        EntityKind::Media,
        EntityKind::OnlineResource,
    ];

    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Event => "events",
            EntityKind::Person => "people",
            EntityKind::Group => "groups",
            EntityKind::Place => "places",
            EntityKind::Organization => "organizations",
            EntityKind::Source => "sources",
            EntityKind::Media => "media",
            EntityKind::OnlineResource => "online_resources",
        }
    }

    /// Prefix used for graph node ids and edge types
    pub fn node_type(self) -> &'static str {
        match self {
            EntityKind::Event => "event",
            EntityKind::Person => "person",
            EntityKind::Group => "group",
            EntityKind::Place => "place",
            EntityKind::Organization => "organization",
            EntityKind::Source => "source",
            EntityKind::Media => "media",
            EntityKind::OnlineResource => "online_resource",
        }
    }

    /// Field shown as the human-readable label of a row
    pub fn label_field(self) -> &'static str {
        match self {
            EntityKind::Person => "full_name",
            EntityKind::Group | EntityKind::Place | EntityKind::Organization => "name",
            EntityKind::Event
            | EntityKind::Source
            | EntityKind::Media
            | EntityKind::OnlineResource => "title",
        }
    }

    /// Label used when `label_field` is null
    pub fn fallback_label(self) -> &'static str {
        match self {
            EntityKind::Event => "Untitled event",
            EntityKind::Person => "Unnamed person",
            EntityKind::Group => "Unnamed group",
            EntityKind::Place => "Unnamed place",
            EntityKind::Organization => "Unnamed organization",
            EntityKind::Source => "Untitled source",
            EntityKind::Media => "Untitled media",
            EntityKind::OnlineResource => "Untitled online resource",
        }
    }

    pub fn fields(self) -> &'static [FieldSpec] {
        mapping::fields(self)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.node_type())
    }
}

/// Many-to-many link between an event and one related entity kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    EventPerson,
    EventGroup,
    EventPlace,
    EventOrganization,
    EventSource,
    EventMedia,
    EventOnlineResource,
}

impl AssociationKind {
    pub const ALL: [AssociationKind; 7] = [
        AssociationKind::EventPerson,
        AssociationKind::EventGroup,
        AssociationKind::EventPlace,
        AssociationKind::EventOrganization,
        AssociationKind::EventSource,
        AssociationKind::EventMedia,
        AssociationKind::EventOnlineResource,
    ];

    /// The non-event endpoint; the other endpoint is always an event
    pub fn related(self) -> EntityKind {
        match self {
            AssociationKind::EventPerson => EntityKind::Person,
            AssociationKind::EventGroup => EntityKind::Group,
            AssociationKind::EventPlace => EntityKind::Place,
            AssociationKind::EventOrganization => EntityKind::Organization,
            AssociationKind::EventSource => EntityKind::Source,
            AssociationKind::EventMedia => EntityKind::Media,
            AssociationKind::EventOnlineResource => EntityKind::OnlineResource,
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            AssociationKind::EventPerson => "event_people",
            AssociationKind::EventGroup => "event_groups",
            AssociationKind::EventPlace => "event_places",
            AssociationKind::EventOrganization => "event_organizations",
            AssociationKind::EventSource => "event_sources",
            AssociationKind::EventMedia => "event_media",
            AssociationKind::EventOnlineResource => "event_online_resources",
        }
    }

    pub fn related_column(self) -> &'static str {
        match self {
            AssociationKind::EventPerson => "person_id",
            AssociationKind::EventGroup => "group_id",
            AssociationKind::EventPlace => "place_id",
            AssociationKind::EventOrganization => "organization_id",
            AssociationKind::EventSource => "source_id",
            AssociationKind::EventMedia => "media_id",
            AssociationKind::EventOnlineResource => "online_resource_id",
        }
    }

    pub fn edge_type(self) -> &'static str {
        match self {
            AssociationKind::EventPerson => "event_person",
            AssociationKind::EventGroup => "event_group",
            AssociationKind::EventPlace => "event_place",
            AssociationKind::EventOrganization => "event_organization",
            AssociationKind::EventSource => "event_source",
            AssociationKind::EventMedia => "event_media",
            AssociationKind::EventOnlineResource => "event_online_resource",
        }
    }
}

impl fmt::Display for AssociationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.edge_type())
    }
}

/// A typed column value. Null carries its type so the store can bind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(Option<String>),
    List(Option<Vec<String>>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Text(None) | FieldValue::List(None))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => v.as_deref(),
            FieldValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(v) => v.as_deref(),
            FieldValue::Text(_) => None,
        }
    }
}

/// Every mapped field of one entity, ready to be written.
///
/// `fields` follows the order of the kind's mapping table and always holds
/// one entry per mapped field, so writing a draft overwrites the whole row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDraft {
    pub kind: EntityKind,
    pub fields: Vec<(&'static str, FieldValue)>,
}

impl EntityDraft {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, value)| value)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }

    /// Replaces the value of a mapped field; unknown fields are ignored
    pub fn set(&mut self, field: &str, value: FieldValue) {
        if let Some(slot) = self.fields.iter_mut().find(|(name, _)| *name == field) {
            slot.1 = value;
        }
    }
}
