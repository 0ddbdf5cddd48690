mod db_migration;
// Database schema - must be kept up to date manually
mod schema;
mod entity;
pub use self::entity::Review;

use std::error::Error;
use std::fmt;

use diesel::prelude::*;
use diesel::sql_query;
use diesel::sqlite::SqliteConnection;

use crate::correlation;
use crate::review_record::ReviewRecord;

#[derive(Debug)]
pub enum ReviewDBError {
    DBMigrationError {
        source: db_migration::MigrationError,
    },
    DBConnectionError {
        source: diesel::result::ConnectionError,
    },
    GenericSQLError {
        source: diesel::result::Error,
    },
    InvalidPayload {
        source: serde_json::Error,
    },
    NotFound,
}
pub type Result<T> = std::result::Result<T, ReviewDBError>;

no_arg_sql_function!(last_insert_rowid, diesel::sql_types::BigInt);

pub struct ReviewDB {
    conn: SqliteConnection,
}

impl ReviewDB {
    /// Opens the review db file located at the given path, performs data migrations to
    /// the current application version if required and backfills correlation keys for
    /// rows written before the key existed.
    pub fn open(path: &str) -> Result<ReviewDB> {
        let result = ReviewDB {
            conn: SqliteConnection::establish(path)?,
        };

        result.default_db_settings()?;
        result.upgrade_db()?;
        result.backfill_correlation_keys()?;

        Ok(result)
    }

    /// Inserts a new review and returns the id the store assigned to it.
    /// The record's own `id` field is ignored; the caller adopts the returned id.
    pub fn add_review(&self, record: &ReviewRecord) -> Result<i64> {
        use self::schema::reviews::dsl::*;

        let record_payload = payload_for_record(record)?;
        Ok(self.conn.transaction::<_, ReviewDBError, _>(|| {
            diesel::insert_into(reviews)
                .values(&entity::InsertFull {
                    product_type: &record.product_type,
                    product_name: record.product_name.as_deref(),
                    cultivars: record.cultivars.as_deref(),
                    breeder: record.breeder.as_deref(),
                    farm: record.farm.as_deref(),
                    date: &record.date,
                    is_private: record.is_private,
                    is_draft: record.is_draft,
                    correlation_key: record.correlation_key.as_deref(),
                    image: record.image.as_deref(),
                    payload: &record_payload,
                })
                .execute(&self.conn)?;

            let new_id = diesel::select(last_insert_rowid).first::<i64>(&self.conn)?;
            Ok(new_id)
        })?)
    }

    /// Overwrites the stored review identified by the record's `id`.
    /// Reports NotFound for an id the store does not know.
    pub fn update_review(&self, record: &ReviewRecord) -> Result<()> {
        use self::schema::reviews::dsl::*;

        let record_id = record.id.ok_or(ReviewDBError::NotFound)?;
        let record_payload = payload_for_record(record)?;

        let affected = diesel::update(reviews.find(record_id))
            .set((
                product_type.eq(record.product_type.as_str()),
                product_name.eq(record.product_name.as_deref()),
                cultivars.eq(record.cultivars.as_deref()),
                breeder.eq(record.breeder.as_deref()),
                farm.eq(record.farm.as_deref()),
                date.eq(record.date.as_str()),
                is_private.eq(record.is_private),
                is_draft.eq(record.is_draft),
                correlation_key.eq(record.correlation_key.as_deref()),
                image.eq(record.image.as_deref()),
                payload.eq(record_payload.as_str()),
            ))
            .execute(&self.conn)?;

        if affected == 0 {
            Err(ReviewDBError::NotFound)
        } else {
            Ok(())
        }
    }

    /// Deletes the review with the given id, reporting whether a row existed.
    pub fn delete_review(&self, review_id: i64) -> Result<bool> {
        use self::schema::reviews::dsl::*;

        let affected = diesel::delete(reviews.find(review_id)).execute(&self.conn)?;
        Ok(affected > 0)
    }

    /// Queries a single review by id.
    pub fn get_review(&self, review_id: i64) -> Result<Option<ReviewRecord>> {
        use self::schema::reviews::dsl::*;

        let row = reviews
            .find(review_id)
            .first::<Review>(&self.conn)
            .optional()?;

        match row {
            Some(row) => Ok(Some(record_from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Loads all stored reviews. The result is unordered,
    /// ordering is the caller's responsibility.
    pub fn get_all_reviews(&self) -> Result<Vec<ReviewRecord>> {
        use self::schema::reviews::dsl::*;

        let rows = reviews.load::<Review>(&self.conn)?;
        rows.into_iter().map(record_from_row).collect()
    }

    /// Computes and persists the correlation key for every row that lacks one.
    ///
    /// Rows written before the correlation key existed must not enter a dedup
    /// pass with an empty key; this one-shot migration runs on open so the
    /// comparison logic never has to special-case them.
    pub fn backfill_correlation_keys(&self) -> Result<usize> {
        use self::schema::reviews::dsl::*;

        Ok(self.conn.transaction::<_, ReviewDBError, _>(|| {
            let legacy_rows = reviews
                .filter(correlation_key.is_null())
                .load::<Review>(&self.conn)?;

            let mut backfilled = 0;
            for row in legacy_rows {
                let row_id = row.id;
                let record = record_from_row(row)?;
                let key = correlation::strict_key(&record);

                diesel::update(reviews.find(row_id))
                    .set(correlation_key.eq(key))
                    .execute(&self.conn)?;
                backfilled += 1;
            }

            Ok(backfilled)
        })?)
    }

    fn upgrade_db(&self) -> db_migration::Result<()> {
        self.conn
            .transaction(|| db_migration::upgrade_db(&self.conn))?;

        Ok(())
    }

    fn default_db_settings(&self) -> Result<()> {
        sql_query("PRAGMA journal_mode = WAL").execute(&self.conn)?;
        sql_query("PRAGMA foreign_keys = 1").execute(&self.conn)?;

        Ok(())
    }
}

fn record_from_row(row: Review) -> Result<ReviewRecord> {
    let parsed: serde_json::Value = serde_json::from_str(&row.payload)?;
    let mut extra = match parsed {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    let totals = extra.remove("totals");

    Ok(ReviewRecord {
        id: Some(row.id),
        product_type: row.product_type,
        product_name: row.product_name,
        cultivars: row.cultivars,
        breeder: row.breeder,
        farm: row.farm,
        date: row.date,
        is_private: row.is_private,
        is_draft: row.is_draft,
        correlation_key: row.correlation_key,
        image: row.image,
        totals,
        extra,
    })
}

fn payload_for_record(record: &ReviewRecord) -> Result<String> {
    let mut map = record.extra.clone();
    if let Some(totals) = &record.totals {
        map.insert("totals".to_string(), totals.clone());
    }

    Ok(serde_json::to_string(&serde_json::Value::Object(map))?)
}

// Error Boilerplate (Error display, conversion and source)
impl fmt::Display for ReviewDBError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error During Review DB Interaction({:?})", self)
    }
}
impl From<db_migration::MigrationError> for ReviewDBError {
    fn from(error: db_migration::MigrationError) -> Self {
        Self::DBMigrationError { source: error }
    }
}
impl From<diesel::result::Error> for ReviewDBError {
    fn from(error: diesel::result::Error) -> Self {
        match error {
            diesel::result::Error::NotFound => Self::NotFound,
            error => Self::GenericSQLError { source: error },
        }
    }
}
impl From<diesel::result::ConnectionError> for ReviewDBError {
    fn from(error: diesel::result::ConnectionError) -> Self {
        Self::DBConnectionError { source: error }
    }
}
impl From<serde_json::Error> for ReviewDBError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidPayload { source: error }
    }
}
impl Error for ReviewDBError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::DBMigrationError { ref source } => Some(source),
            Self::DBConnectionError { ref source } => Some(source),
            Self::GenericSQLError { ref source } => Some(source),
            Self::InvalidPayload { ref source } => Some(source),
            Self::NotFound => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_review_db() -> ReviewDB {
        ReviewDB::open(":memory:").unwrap()
    }

    fn sample_record(name: &str, date_str: &str) -> ReviewRecord {
        let mut record = ReviewRecord::default();
        record.product_type = "Fleur".to_string();
        record.product_name = Some(name.to_string());
        record.date = date_str.to_string();
        record.correlation_key = Some(correlation::strict_key(&record));
        record
    }

    #[test]
    fn add_and_get_review() {
        let db = open_review_db();

        let mut record = sample_record("Amnesia Haze", "2026-01-10T12:00:00Z");
        record.totals = Some(serde_json::json!({"overall": 9}));
        record
            .extra
            .insert("aromas".to_string(), serde_json::json!(["pine", "citrus"]));

        let id = db.add_review(&record).unwrap();
        let loaded = db.get_review(id).unwrap().unwrap();

        assert_eq!(loaded.id, Some(id));
        assert_eq!(loaded.product_name.as_deref(), Some("Amnesia Haze"));
        assert_eq!(loaded.totals, Some(serde_json::json!({"overall": 9})));
        assert_eq!(loaded.extra["aromas"][1], "citrus");
    }

    #[test]
    fn ids_auto_increment() {
        let db = open_review_db();

        let first = db
            .add_review(&sample_record("One", "2026-01-01T00:00:00Z"))
            .unwrap();
        let second = db
            .add_review(&sample_record("Two", "2026-01-02T00:00:00Z"))
            .unwrap();

        assert!(second > first);
        assert_eq!(db.get_all_reviews().unwrap().len(), 2);
    }

    #[test]
    fn update_review_overwrites_fields() {
        let db = open_review_db();

        let id = db
            .add_review(&sample_record("Draft Name", "2026-01-01T00:00:00Z"))
            .unwrap();

        let mut updated = sample_record("Final Name", "2026-02-01T00:00:00Z");
        updated.id = Some(id);
        updated.farm = Some("Vallée Verte".to_string());
        db.update_review(&updated).unwrap();

        let loaded = db.get_review(id).unwrap().unwrap();
        assert_eq!(loaded.product_name.as_deref(), Some("Final Name"));
        assert_eq!(loaded.farm.as_deref(), Some("Vallée Verte"));
        assert_eq!(db.get_all_reviews().unwrap().len(), 1);
    }

    #[test]
    fn update_of_unknown_id_reports_not_found() {
        let db = open_review_db();

        let mut record = sample_record("Ghost", "2026-01-01T00:00:00Z");
        record.id = Some(404);
        assert!(matches!(
            db.update_review(&record),
            Err(ReviewDBError::NotFound)
        ));
    }

    #[test]
    fn delete_review_reports_existence() {
        let db = open_review_db();

        let id = db
            .add_review(&sample_record("To Delete", "2026-01-01T00:00:00Z"))
            .unwrap();

        assert_eq!(db.delete_review(id).unwrap(), true);
        assert_eq!(db.delete_review(id).unwrap(), false);
        assert!(db.get_review(id).unwrap().is_none());
    }

    #[test]
    fn backfills_missing_correlation_keys() {
        let db = open_review_db();

        let mut legacy = sample_record("Légère", "2025-06-01T00:00:00Z");
        legacy.correlation_key = None;
        let id = db.add_review(&legacy).unwrap();

        let backfilled = db.backfill_correlation_keys().unwrap();
        assert_eq!(backfilled, 1);

        let loaded = db.get_review(id).unwrap().unwrap();
        let expected = correlation::strict_key(&loaded);
        assert_eq!(loaded.correlation_key, Some(expected));

        // A second pass finds nothing left to do.
        assert_eq!(db.backfill_correlation_keys().unwrap(), 0);
    }
}
