/// SQL DDL for the location history database.
pub const PRAGMAS: &str = "PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;";

/// One row per (group, subject): the latest written pair. Coordinates are
/// stored as text so that the empty "no fix" record round-trips unchanged.
pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS location_history (
    group_key TEXT NOT NULL,
    subject_id TEXT NOT NULL,
    lat TEXT NOT NULL,
    lng TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (group_key, subject_id)
);
"#;
