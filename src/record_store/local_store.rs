use async_trait::async_trait;

use super::PersistenceMode;
use crate::review_db;
use crate::review_db::ReviewDB;
use crate::review_record::ReviewRecord;

/// The embedded store as the arbiter sees it.
///
/// Abstracted behind a trait so tests can count or script calls; the
/// production implementation wraps the SQLite-backed [`ReviewDB`].
#[async_trait(?Send)]
pub trait LocalStore {
    /// Inserts a record. Resolves with `None` (success, nothing stored) while
    /// the store is dormant.
    async fn add(&self, record: &ReviewRecord) -> review_db::Result<Option<i64>>;

    /// Overwrites the record identified by its id. A no-op while dormant.
    async fn update(&self, record: &ReviewRecord) -> review_db::Result<()>;

    /// Removes the record with the given id. Deletion stays live even while
    /// the store is otherwise dormant: a record the user asked to delete must
    /// not survive locally only because a remote service was reachable.
    async fn delete(&self, id: i64) -> review_db::Result<bool>;

    /// Single-record lookup. Stays live while dormant so records created
    /// before remote activation remain readable through the arbiter's
    /// fallback.
    async fn get_by_id(&self, id: i64) -> review_db::Result<Option<ReviewRecord>>;

    /// Full snapshot. Empty while dormant.
    async fn get_all(&self) -> review_db::Result<Vec<ReviewRecord>>;
}

/// Production `LocalStore` over the embedded SQLite database.
///
/// The persistence mode is injected at construction and never changes within
/// a session: while a remote service is authoritative the store is dormant
/// and mutating operations resolve successfully without touching storage, so
/// the two stores can not silently diverge.
pub struct SqliteStore {
    db: ReviewDB,
    mode: PersistenceMode,
}

impl SqliteStore {
    /// Opens (or creates) the database file at `path`.
    /// Failure here means the host denies storage; callers treat that as
    /// non-fatal and degrade to the arbiter's in-memory queue.
    pub fn open(path: &str, mode: PersistenceMode) -> review_db::Result<SqliteStore> {
        Ok(SqliteStore {
            db: ReviewDB::open(path)?,
            mode,
        })
    }

    fn dormant(&self) -> bool {
        self.mode.remote_is_authoritative()
    }
}

#[async_trait(?Send)]
impl LocalStore for SqliteStore {
    async fn add(&self, record: &ReviewRecord) -> review_db::Result<Option<i64>> {
        if self.dormant() {
            return Ok(None);
        }
        self.db.add_review(record).map(Some)
    }

    async fn update(&self, record: &ReviewRecord) -> review_db::Result<()> {
        if self.dormant() {
            return Ok(());
        }
        self.db.update_review(record)
    }

    async fn delete(&self, id: i64) -> review_db::Result<bool> {
        self.db.delete_review(id)
    }

    async fn get_by_id(&self, id: i64) -> review_db::Result<Option<ReviewRecord>> {
        self.db.get_review(id)
    }

    async fn get_all(&self) -> review_db::Result<Vec<ReviewRecord>> {
        if self.dormant() {
            return Ok(Vec::new());
        }
        self.db.get_all_reviews()
    }
}
