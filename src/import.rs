use crate::config::{
    EVENTS_DIR, EVENTS_SHEET, GROUPS_LINK_SHEET, MEDIA_LINK_SHEET, NO_ID_DIR, NO_ID_EVENTS_SHEET,
    NO_ID_GROUPS_SHEET, NO_ID_PEOPLE_SHEET, NO_ID_PLACES_SHEET, ONLINE_RESOURCES_LINK_SHEET,
    ORGANIZATIONS_LINK_SHEET, PEOPLE_LINK_SHEET, PLACES_LINK_SHEET, PROGRESS_TICK_MS,
    SOURCES_LINK_SHEET,
};
use crate::dedup::{seed_entity, DedupRule, EVENT_RULE, GROUP_RULE, PERSON_RULE, PLACE_RULE};
use crate::mapping::parent_id;
use crate::models::{AssociationKind, EntityKind};
use crate::reader::Sheet;
use crate::resolve::{link_entities, upsert_entity};
use crate::stats::{ImportReport, ImportStats};
use crate::store::{IdMap, Store};
use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A `LinkTo-*` sheet: related entity rows, each pointing at its event
pub struct LinkSheet {
    pub file: &'static str,
    pub association: AssociationKind,
}

pub const LINK_SHEETS: &[LinkSheet] = &[
    LinkSheet {
        file: PEOPLE_LINK_SHEET,
        association: AssociationKind::EventPerson,
    },
    LinkSheet {
        file: GROUPS_LINK_SHEET,
        association: AssociationKind::EventGroup,
    },
    LinkSheet {
        file: PLACES_LINK_SHEET,
        association: AssociationKind::EventPlace,
    },
    LinkSheet {
        file: ORGANIZATIONS_LINK_SHEET,
        association: AssociationKind::EventOrganization,
    },
    LinkSheet {
        file: SOURCES_LINK_SHEET,
        association: AssociationKind::EventSource,
    },
    LinkSheet {
        file: MEDIA_LINK_SHEET,
        association: AssociationKind::EventMedia,
    },
    LinkSheet {
        file: ONLINE_RESOURCES_LINK_SHEET,
        association: AssociationKind::EventOnlineResource,
    },
];

/// A sheet of rows without stable ids, seeded through dedup
pub struct SeedSheet {
    pub file: &'static str,
    pub rule: &'static DedupRule,
}

pub const SEED_SHEETS: &[SeedSheet] = &[
    SeedSheet {
        file: NO_ID_PEOPLE_SHEET,
        rule: &PERSON_RULE,
    },
    SeedSheet {
        file: NO_ID_GROUPS_SHEET,
        rule: &GROUP_RULE,
    },
    SeedSheet {
        file: NO_ID_PLACES_SHEET,
        rule: &PLACE_RULE,
    },
    SeedSheet {
        file: NO_ID_EVENTS_SHEET,
        rule: &EVENT_RULE,
    },
];

pub struct ImportConfig {
    /// Directory with `Eventi.csv` and the `LinkTo-*` sheets
    pub events_dir: PathBuf,
    /// Directory with the sheets that carry no stable ids
    pub no_id_dir: PathBuf,
    pub show_progress: bool,
}

impl ImportConfig {
    /// Standard export layout: `<data_dir>/Eventi` and `<data_dir>/Eventi-NO_ID`
    pub fn from_data_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            events_dir: data_dir.join(EVENTS_DIR),
            no_id_dir: data_dir.join(NO_ID_DIR),
            show_progress: false,
        }
    }
}

/// Runs both import phases against `store`.
///
/// Phase 1 upserts identified events, snapshots their ids, then walks every
/// link sheet. Phase 2 seeds the no-id sheets. The first error aborts the
/// run; a retry starts over and relies on upserts and dedup being idempotent.
pub async fn run_import<S: Store>(store: &S, config: &ImportConfig) -> Result<ImportReport> {
    let start = Instant::now();
    let stats = ImportStats::new();
    let mp = if config.show_progress {
        MultiProgress::new()
    } else {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    };

    info!(dir = %config.events_dir.display(), "Phase 1: identified sheets");
    let event_ids = import_events(store, config, &stats, &mp).await?;
    info!(events = event_ids.len(), "Event id map built");

    for sheet in LINK_SHEETS {
        import_link_sheet(store, config, sheet, &event_ids, &stats, &mp).await?;
    }

    info!(dir = %config.no_id_dir.display(), "Phase 2: sheets without ids");
    for sheet in SEED_SHEETS {
        seed_sheet(store, config, sheet, &stats, &mp).await?;
    }

    let report = stats.report();
    info!(
        duration_secs = start.elapsed().as_secs_f64(),
        rows = report.rows_read,
        upserted = report.total_upserted(),
        seeded = report.total_seeded(),
        links_created = report.links_created,
        links_unresolved = report.links_unresolved,
        "Import complete"
    );
    Ok(report)
}

async fn import_events<S: Store>(
    store: &S,
    config: &ImportConfig,
    stats: &ImportStats,
    mp: &MultiProgress,
) -> Result<IdMap> {
    let sheet = Sheet::open(config.events_dir.join(EVENTS_SHEET))?;
    let pb = mp.add(make_spinner(EVENTS_SHEET, config.show_progress));

    for record in sheet.records() {
        let record = record?;
        stats.inc_rows_read();
        upsert_entity(store, EntityKind::Event, &record, stats).await?;
        pb.inc(1);
    }
    pb.finish_with_message(format!("{EVENTS_SHEET}: done"));

    // Only now is every event of this run persisted.
    store.source_id_map(EntityKind::Event).await
}

async fn import_link_sheet<S: Store>(
    store: &S,
    config: &ImportConfig,
    link_sheet: &LinkSheet,
    event_ids: &IdMap,
    stats: &ImportStats,
    mp: &MultiProgress,
) -> Result<()> {
    let kind = link_sheet.association;
    let sheet = Sheet::open(config.events_dir.join(link_sheet.file))?;
    if sheet.is_empty() {
        debug!(sheet = link_sheet.file, "Nothing to import");
        return Ok(());
    }

    let pb = mp.add(make_spinner(link_sheet.file, config.show_progress));
    for record in sheet.records() {
        let record = record?;
        stats.inc_rows_read();

        let related_id = upsert_entity(store, kind.related(), &record, stats).await?;
        let parent = parent_id(&record);
        let event_id = parent.as_ref().and_then(|key| event_ids.get(key).copied());
        if event_id.is_none() {
            debug!(%kind, parent = ?parent, "Parent event not found");
        }

        link_entities(store, kind, event_id, related_id, stats).await?;
        pb.inc(1);
    }
    pb.finish_with_message(format!("{}: done", link_sheet.file));
    Ok(())
}

async fn seed_sheet<S: Store>(
    store: &S,
    config: &ImportConfig,
    seed: &SeedSheet,
    stats: &ImportStats,
    mp: &MultiProgress,
) -> Result<()> {
    let sheet = Sheet::open(config.no_id_dir.join(seed.file))?;
    if sheet.is_empty() {
        debug!(sheet = seed.file, "Nothing to seed");
        return Ok(());
    }

    let pb = mp.add(make_spinner(seed.file, config.show_progress));
    for record in sheet.records() {
        let record = record?;
        stats.inc_rows_read();
        seed_entity(store, seed.rule, &record, stats).await?;
        pb.inc(1);
    }
    pb.finish_with_message(format!("{}: done", seed.file));
    Ok(())
}

fn make_spinner(sheet: &str, ticking: bool) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("    {spinner:.cyan} {prefix:<28} {pos} rows {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(sheet.to_string());
    if ticking {
        pb.enable_steady_tick(Duration::from_millis(PROGRESS_TICK_MS));
    }
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn every_association_has_a_link_sheet() {
        let covered: BTreeSet<_> = LINK_SHEETS.iter().map(|s| s.association).collect();
        assert_eq!(covered.len(), AssociationKind::ALL.len());
    }

    #[test]
    fn seed_sheets_cover_the_no_id_kinds() {
        let kinds: Vec<_> = SEED_SHEETS.iter().map(|s| s.rule.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EntityKind::Person,
                EntityKind::Group,
                EntityKind::Place,
                EntityKind::Event
            ]
        );
    }

    #[test]
    fn config_from_data_dir() {
        let config = ImportConfig::from_data_dir("/data");
        assert_eq!(config.events_dir, Path::new("/data/Eventi"));
        assert_eq!(config.no_id_dir, Path::new("/data/Eventi-NO_ID"));
        assert!(!config.show_progress);
    }
}
