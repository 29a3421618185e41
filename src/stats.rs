use crate::models::EntityKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

const KINDS: usize = EntityKind::ALL.len();

/// Counters collected while an import runs
#[derive(Default)]
pub struct ImportStats {
    pub rows_read: AtomicU64,
    pub upserted: [AtomicU64; KINDS],
    pub missing_stable_id: AtomicU64,
    pub unwritten: AtomicU64,
    pub links_created: AtomicU64,
    pub links_existing: AtomicU64,
    pub links_unresolved: AtomicU64,
    pub seeded: [AtomicU64; KINDS],
    pub matched: [AtomicU64; KINDS],
    pub missing_name: AtomicU64,
}

impl ImportStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_rows_read(&self) {
        self.rows_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_upserted(&self, kind: EntityKind) {
        self.upserted[kind as usize].fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_missing_stable_id(&self) {
        self.missing_stable_id.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_unwritten(&self) {
        self.unwritten.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_links_created(&self) {
        self.links_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_links_existing(&self) {
        self.links_existing.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_links_unresolved(&self) {
        self.links_unresolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_seeded(&self, kind: EntityKind) {
        self.seeded[kind as usize].fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_matched(&self, kind: EntityKind) {
        self.matched[kind as usize].fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_missing_name(&self) {
        self.missing_name.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rows(&self) -> u64 {
        self.rows_read.load(Ordering::Relaxed)
    }

    pub fn upserts(&self, kind: EntityKind) -> u64 {
        self.upserted[kind as usize].load(Ordering::Relaxed)
    }

    pub fn seeds(&self, kind: EntityKind) -> u64 {
        self.seeded[kind as usize].load(Ordering::Relaxed)
    }

    pub fn matches(&self, kind: EntityKind) -> u64 {
        self.matched[kind as usize].load(Ordering::Relaxed)
    }

    /// Snapshot for the completion report
    pub fn report(&self) -> ImportReport {
        let per_kind = |counters: &[AtomicU64; KINDS]| -> BTreeMap<EntityKind, u64> {
            EntityKind::ALL
                .iter()
                .map(|kind| (*kind, counters[*kind as usize].load(Ordering::Relaxed)))
                .filter(|(_, n)| *n > 0)
                .collect()
        };

        ImportReport {
            rows_read: self.rows(),
            upserted: per_kind(&self.upserted),
            missing_stable_id: self.missing_stable_id.load(Ordering::Relaxed),
            unwritten: self.unwritten.load(Ordering::Relaxed),
            links_created: self.links_created.load(Ordering::Relaxed),
            links_existing: self.links_existing.load(Ordering::Relaxed),
            links_unresolved: self.links_unresolved.load(Ordering::Relaxed),
            seeded: per_kind(&self.seeded),
            matched: per_kind(&self.matched),
            missing_name: self.missing_name.load(Ordering::Relaxed),
        }
    }
}

/// What a finished import did. Kinds with a zero count are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub rows_read: u64,
    pub upserted: BTreeMap<EntityKind, u64>,
    /// Rows of identified sheets that carried no `form_record_id`
    pub missing_stable_id: u64,
    /// Writes that returned no row
    pub unwritten: u64,
    pub links_created: u64,
    pub links_existing: u64,
    /// Link rows dropped because the event or the related entity did not resolve
    pub links_unresolved: u64,
    pub seeded: BTreeMap<EntityKind, u64>,
    pub matched: BTreeMap<EntityKind, u64>,
    /// No-id rows without a usable name
    pub missing_name: u64,
}

impl ImportReport {
    pub fn total_upserted(&self) -> u64 {
        self.upserted.values().sum()
    }

    pub fn total_seeded(&self) -> u64 {
        self.seeded.values().sum()
    }

    pub fn total_matched(&self) -> u64 {
        self.matched.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_zero() {
        let stats = ImportStats::new();
        let report = stats.report();
        assert_eq!(report, ImportReport::default());
        assert_eq!(report.total_upserted(), 0);
    }

    #[test]
    fn per_kind_counters_stay_separate() {
        let stats = ImportStats::new();
        stats.inc_upserted(EntityKind::Event);
        stats.inc_upserted(EntityKind::Event);
        stats.inc_upserted(EntityKind::OnlineResource);
        stats.inc_seeded(EntityKind::Place);
        stats.inc_matched(EntityKind::Person);

        assert_eq!(stats.upserts(EntityKind::Event), 2);
        assert_eq!(stats.upserts(EntityKind::OnlineResource), 1);
        assert_eq!(stats.upserts(EntityKind::Person), 0);
        assert_eq!(stats.seeds(EntityKind::Place), 1);
        assert_eq!(stats.matches(EntityKind::Person), 1);
    }

    #[test]
    fn report_captures_state() {
        let stats = ImportStats::new();
        stats.inc_rows_read();
        stats.inc_rows_read();
        stats.inc_upserted(EntityKind::Media);
        stats.inc_missing_stable_id();
        stats.inc_links_created();
        stats.inc_links_existing();
        stats.inc_links_unresolved();
        stats.inc_links_unresolved();
        stats.inc_missing_name();

        let report = stats.report();
        assert_eq!(report.rows_read, 2);
        assert_eq!(report.upserted.get(&EntityKind::Media), Some(&1));
        assert!(!report.upserted.contains_key(&EntityKind::Event));
        assert_eq!(report.missing_stable_id, 1);
        assert_eq!(report.links_created, 1);
        assert_eq!(report.links_existing, 1);
        assert_eq!(report.links_unresolved, 2);
        assert_eq!(report.missing_name, 1);
    }

    #[test]
    fn report_serializes_kinds_as_keys() {
        let stats = ImportStats::new();
        stats.inc_upserted(EntityKind::OnlineResource);
        let json = serde_json::to_value(stats.report()).unwrap();
        assert_eq!(json["upserted"]["online_resource"], 1);
    }
}
