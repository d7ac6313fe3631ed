use async_trait::async_trait;
use chrono::Utc;
use tracing::instrument;

use tether_core::host::LocationHistory;
use tether_core::HostError;

use crate::database::Database;
use crate::error::StoreError;

/// Latest pair recorded for one subject.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryRow {
    pub group_key: String,
    pub subject_id: String,
    pub lat: String,
    pub lng: String,
    pub updated_at: String,
}

/// SQLite-backed location history, keyed by group then subject.
#[derive(Clone)]
pub struct LocationHistoryRepo {
    db: Database,
}

impl LocationHistoryRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Overwrite the pair stored for `(group_key, subject_id)`.
    #[instrument(skip(self, lat, lng))]
    pub fn write(
        &self,
        subject_id: &str,
        group_key: &str,
        lat: &str,
        lng: &str,
    ) -> Result<(), StoreError> {
        if subject_id.trim().is_empty() || group_key.trim().is_empty() {
            return Err(StoreError::InvalidKey(format!(
                "subject_id={subject_id:?} group_key={group_key:?}"
            )));
        }
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            let _ = conn.execute(
                "INSERT INTO location_history (group_key, subject_id, lat, lng, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(group_key, subject_id)
                 DO UPDATE SET lat = excluded.lat, lng = excluded.lng, updated_at = excluded.updated_at",
                rusqlite::params![group_key, subject_id, lat, lng, now],
            )?;
            Ok(())
        })
    }

    /// The pair last written for a subject, if any.
    pub fn latest(&self, group_key: &str, subject_id: &str) -> Result<Option<HistoryRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT group_key, subject_id, lat, lng, updated_at
                 FROM location_history WHERE group_key = ?1 AND subject_id = ?2",
            )?;
            let mut rows = stmt.query_map([group_key, subject_id], read_row)?;
            Ok(rows.next().transpose()?)
        })
    }
}

#[cfg(test)]
impl LocationHistoryRepo {
    fn list_group(&self, group_key: &str) -> Result<Vec<HistoryRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT group_key, subject_id, lat, lng, updated_at
                 FROM location_history WHERE group_key = ?1 ORDER BY subject_id",
            )?;
            let rows = stmt.query_map([group_key], read_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryRow> {
    Ok(HistoryRow {
        group_key: row.get(0)?,
        subject_id: row.get(1)?,
        lat: row.get(2)?,
        lng: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

#[async_trait]
impl LocationHistory for LocationHistoryRepo {
    async fn record(
        &self,
        subject_id: &str,
        group_key: &str,
        lat: &str,
        lng: &str,
    ) -> Result<(), HostError> {
        self.write(subject_id, group_key, lat, lng)
            .map_err(HostError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> LocationHistoryRepo {
        LocationHistoryRepo::new(Database::in_memory().unwrap())
    }

    #[test]
    fn write_then_read() {
        let repo = repo();
        repo.write("u1", "pune", "18.52", "73.85").unwrap();
        let row = repo.latest("pune", "u1").unwrap().unwrap();
        assert_eq!(row.lat, "18.52");
        assert_eq!(row.lng, "73.85");
    }

    #[test]
    fn write_overwrites_previous_pair() {
        let repo = repo();
        repo.write("u1", "pune", "1", "2").unwrap();
        repo.write("u1", "pune", "3", "4").unwrap();
        let rows = repo.list_group("pune").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!((rows[0].lat.as_str(), rows[0].lng.as_str()), ("3", "4"));
    }

    #[test]
    fn empty_coordinates_are_a_valid_record() {
        let repo = repo();
        repo.write("u1", "pune", "", "").unwrap();
        let row = repo.latest("pune", "u1").unwrap().unwrap();
        assert_eq!(row.lat, "");
        assert_eq!(row.lng, "");
    }

    #[test]
    fn keyed_by_group_then_subject() {
        let repo = repo();
        repo.write("u1", "pune", "1", "1").unwrap();
        repo.write("u1", "delhi", "2", "2").unwrap();
        repo.write("u2", "pune", "3", "3").unwrap();
        assert_eq!(repo.list_group("pune").unwrap().len(), 2);
        assert_eq!(repo.latest("delhi", "u1").unwrap().unwrap().lat, "2");
        assert!(repo.latest("delhi", "u2").unwrap().is_none());
    }

    #[test]
    fn empty_keys_rejected() {
        let repo = repo();
        assert!(matches!(
            repo.write("", "pune", "1", "1"),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(
            repo.write("u1", " ", "1", "1"),
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn trait_record_maps_errors() {
        let repo = repo();
        repo.record("u1", "pune", "5", "6").await.unwrap();
        let err = repo.record("", "pune", "5", "6").await.unwrap_err();
        assert!(matches!(err, HostError::Rejected(_)));
    }
}
