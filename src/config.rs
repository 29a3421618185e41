/// Field delimiter used by every spreadsheet export
pub const CSV_DELIMITER: u8 = b';';

/// Column carrying a row's own stable identifier
pub const STABLE_ID_COLUMN: &str = "form_record_id";

/// Column carrying the owning event's stable identifier on link sheets
pub const PARENT_ID_COLUMN: &str = "parent_record_id";

/// Directory (under the data dir) holding the identified sheets
pub const EVENTS_DIR: &str = "Eventi";

/// Directory (under the data dir) holding the sheets without stable ids
pub const NO_ID_DIR: &str = "Eventi-NO_ID";

/// Primary event sheet
pub const EVENTS_SHEET: &str = "Eventi.csv";

pub const PEOPLE_LINK_SHEET: &str = "LinkTo-Personaggi.csv";
pub const GROUPS_LINK_SHEET: &str = "LinkTo-Gruppi.csv";
pub const PLACES_LINK_SHEET: &str = "LinkTo-Sedi-Luoghi.csv";
pub const ORGANIZATIONS_LINK_SHEET: &str = "LinkTo-Organizzazioni.csv";
pub const SOURCES_LINK_SHEET: &str = "LinkTo-Fonti.csv";
pub const MEDIA_LINK_SHEET: &str = "LinkTo-Media.csv";
pub const ONLINE_RESOURCES_LINK_SHEET: &str = "LinkTo-Risorse online.csv";

pub const NO_ID_PEOPLE_SHEET: &str = "Personaggi.csv";
pub const NO_ID_GROUPS_SHEET: &str = "Gruppi.csv";
pub const NO_ID_PLACES_SHEET: &str = "Sedi-Luoghi.csv";
pub const NO_ID_EVENTS_SHEET: &str = "Eventi-no_ID.csv";

/// Connection attempts before giving up on the database
pub const DB_CONNECT_MAX_RETRIES: u32 = 5;

/// Delay between connection attempts
pub const DB_CONNECT_RETRY_DELAY_SECS: u64 = 2;

/// Upper bound on pooled connections (the pipeline itself only uses one at a time)
pub const DB_MAX_CONNECTIONS: u32 = 4;

/// Progress spinner refresh interval
pub const PROGRESS_TICK_MS: u64 = 100;
