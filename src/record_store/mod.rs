use std::collections::VecDeque;
use std::error::Error;
use std::fmt;

use crate::correlation;
use crate::dedup;
use crate::dedup::{DedupPlan, DedupReport};
use crate::image_file::ImageUpload;
use crate::remote_store;
use crate::remote_store::{HttpRemote, RemoteError, RemoteStore};
use crate::review_db;
use crate::review_db::ReviewDBError;
use crate::review_record::ReviewRecord;

mod local_store;
pub use self::local_store::{LocalStore, SqliteStore};

#[derive(Debug)]
pub enum RecordStoreError {
    /// The embedded store could not be opened at all.
    StorageUnavailable { source: ReviewDBError },
    /// The embedded store rejected a transaction.
    StorageWriteFailed { source: ReviewDBError },
    NetworkUnreachable { message: String },
    NetworkTimeout { operation: &'static str },
    RemoteRejected { status: u16, message: String },
}
pub type Result<T> = std::result::Result<T, RecordStoreError>;

/// Which of the two stores is the source of truth for this session.
///
/// Decided once by the liveness probe and never changed afterwards: a later
/// network failure on an individual call is transient and does not demote an
/// authoritative remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceMode {
    LocalOnly,
    RemoteAuthoritative,
}

impl PersistenceMode {
    /// Runs the one-shot liveness probe against the given remote.
    pub async fn detect<R: RemoteStore>(remote: &R) -> PersistenceMode {
        if remote.probe().await {
            PersistenceMode::RemoteAuthoritative
        } else {
            PersistenceMode::LocalOnly
        }
    }

    pub fn remote_is_authoritative(self) -> bool {
        matches!(self, PersistenceMode::RemoteAuthoritative)
    }
}

/// What a save accomplished.
#[derive(Debug)]
pub struct SaveOutcome {
    /// The record is durably persisted in the authoritative store.
    /// `false` means it only survives in the session's in-memory queue
    /// (degraded local storage or transient remote failure) or was rejected.
    pub ok: bool,
    /// The canonical id of the record after the save.
    pub id: Option<i64>,
    /// The structured remote failure, when the remote leg did not succeed.
    pub remote_error: Option<RemoteError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// The caller's own records.
    Mine,
    /// Visibility-filtered records of everyone.
    Public,
}

/// Saves that could not be persisted are kept here for the rest of the
/// session instead of being silently lost.
const PENDING_QUEUE_LIMIT: usize = 64;

/// The facade the application talks to; owns the decision which store
/// is authoritative and fans every operation out accordingly.
pub struct RecordStore<L: LocalStore, R: RemoteStore> {
    local: L,
    remote: R,
    mode: PersistenceMode,

    degraded: bool,
    degraded_notice_shown: bool,
    pending: VecDeque<ReviewRecord>,
}
pub type DefaultRecordStore = RecordStore<SqliteStore, HttpRemote>;

impl<L: LocalStore, R: RemoteStore> RecordStore<L, R> {
    /// Both adapters must have been constructed for the same mode the
    /// arbiter is given (see [`PersistenceMode::detect`]).
    pub fn new(local: L, remote: R, mode: PersistenceMode) -> Self {
        Self {
            local,
            remote,
            mode,
            degraded: false,
            degraded_notice_shown: false,
            pending: VecDeque::new(),
        }
    }

    pub fn mode(&self) -> PersistenceMode {
        self.mode
    }

    /// Whether local storage failed this session and new saves are kept in
    /// the in-memory queue only.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Persists a record in the authoritative store, creating or updating
    /// based on the presence of its id. The correlation key is recomputed and
    /// attached before dispatch, never reused from the cached value.
    pub async fn save(&mut self, record: ReviewRecord) -> Result<SaveOutcome> {
        self.save_with_image(record, None).await
    }

    /// Like [`RecordStore::save`], with a freshly selected image file that a
    /// remote save ships as a multipart upload.
    pub async fn save_with_image(
        &mut self,
        mut record: ReviewRecord,
        fresh_image: Option<&ImageUpload>,
    ) -> Result<SaveOutcome> {
        record.correlation_key = Some(correlation::strict_key(&record));

        if self.mode.remote_is_authoritative() {
            self.save_remote(record, fresh_image).await
        } else {
            Ok(self.save_local(record).await)
        }
    }

    async fn save_remote(
        &mut self,
        record: ReviewRecord,
        fresh_image: Option<&ImageUpload>,
    ) -> Result<SaveOutcome> {
        match self.remote.save(&record, fresh_image).await {
            Ok(saved) => Ok(SaveOutcome {
                ok: true,
                // The id the service assigned becomes the record's canonical id.
                id: saved.id.or(record.id),
                remote_error: None,
            }),
            Err(error @ RemoteError::Rejected { .. }) => Ok(SaveOutcome {
                ok: false,
                id: record.id,
                remote_error: Some(error),
            }),
            Err(transient) => {
                log::warn!("remote save failed, queueing record: {}", transient);
                let id = record.id;
                self.queue_pending(record);
                Ok(SaveOutcome {
                    ok: false,
                    id,
                    remote_error: Some(transient),
                })
            }
        }
    }

    async fn save_local(&mut self, mut record: ReviewRecord) -> SaveOutcome {
        // Once storage failed, later saves go straight to the queue.
        if self.degraded {
            self.queue_pending(record);
            return SaveOutcome {
                ok: false,
                id: None,
                remote_error: None,
            };
        }

        if let Err(error) = self.adopt_matching_draft(&mut record).await {
            log::warn!("draft lookup before save failed: {}", error);
        }

        let result = match record.id {
            Some(id) => match self.local.update(&record).await {
                Ok(()) => Ok(Some(id)),
                // The store no longer knows the id (removed elsewhere in the
                // session); re-insert instead of treating it as degradation.
                Err(ReviewDBError::NotFound) => self.local.add(&record).await,
                Err(error) => Err(error),
            },
            None => self.local.add(&record).await,
        };

        match result {
            Ok(id) => SaveOutcome {
                ok: true,
                id,
                remote_error: None,
            },
            Err(error) => {
                log::warn!("local save failed: {}", error);
                self.note_degraded();
                self.queue_pending(record);
                SaveOutcome {
                    ok: false,
                    id: None,
                    remote_error: None,
                }
            }
        }
    }

    /// Repeated saves of the same logical content must not create siblings.
    ///
    /// A save without an id adopts the id of a stored draft with the same
    /// strict or loose key; a final save additionally removes any other
    /// matching drafts it supersedes.
    async fn adopt_matching_draft(&self, record: &mut ReviewRecord) -> review_db::Result<()> {
        let snapshot = self.local.get_all().await?;
        let strict = correlation::strict_key(record);
        let loose = correlation::loose_key(record);

        let matching: Vec<&ReviewRecord> = snapshot
            .iter()
            .filter(|stored| {
                stored.is_draft
                    && (stored
                        .correlation_key
                        .clone()
                        .unwrap_or_else(|| correlation::strict_key(stored))
                        == strict
                        || correlation::loose_key(stored) == loose)
            })
            .collect();

        if record.id.is_none() {
            if let Some(first) = matching.first() {
                record.id = first.id;
            }
        }

        if !record.is_draft {
            for draft in matching {
                if draft.id != record.id {
                    if let Some(id) = draft.id {
                        self.local.delete(id).await?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Lists records. Offline there is no concept of ownership, both modes
    /// degrade to all local records.
    pub async fn list(&self, mode: ListMode) -> Result<Vec<ReviewRecord>> {
        if self.mode.remote_is_authoritative() {
            match mode {
                ListMode::Mine => Ok(self.remote.list_mine().await?),
                ListMode::Public => Ok(self.remote.list_public().await?),
            }
        } else {
            Ok(self.local.get_all().await?)
        }
    }

    /// Tries the remote first when it is authoritative and falls back to the
    /// local store only when the remote yields nothing, which covers records
    /// created before remote activation.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<ReviewRecord>> {
        if self.mode.remote_is_authoritative() {
            match self.remote.get_by_id(id).await {
                Ok(Some(record)) => return Ok(Some(record)),
                Ok(None) => {}
                Err(error) => log::warn!("remote lookup of {} failed: {}", id, error),
            }
        }

        Ok(self.local.get_by_id(id).await?)
    }

    /// Best-effort remote, always-local deletion.
    ///
    /// The local copy is removed regardless of the remote leg's outcome, so a
    /// record the user asked to delete is never resurrectable because of a
    /// transient network blip. A failed remote leg downgrades the result to a
    /// partial success, not a hard failure.
    pub async fn delete(&mut self, id: i64) -> Result<bool> {
        let mut remote_ok = true;
        if self.mode.remote_is_authoritative() {
            match self.remote.delete(id).await {
                Ok(found) => remote_ok = found,
                Err(error) => {
                    remote_ok = false;
                    log::warn!("deleted locally, server failed for {}: {}", id, error);
                }
            }
        }

        let local_ok = match self.local.delete(id).await {
            Ok(found) => found,
            Err(error) => {
                log::warn!("local delete of {} failed: {}", id, error);
                false
            }
        };

        Ok(local_ok || remote_ok)
    }

    /// Flips a record's visibility on the remote service. With no active
    /// remote there is nothing to toggle: resolves `false` without any
    /// network call.
    pub async fn set_visibility(&self, id: i64, is_private: bool) -> Result<bool> {
        if !self.mode.remote_is_authoritative() {
            return Ok(false);
        }

        Ok(self.remote.set_visibility(id, is_private).await?)
    }

    /// Plans a deduplication over the current snapshot without deleting
    /// anything.
    pub async fn plan_deduplication(&self) -> Result<DedupPlan> {
        let snapshot = self.local.get_all().await?;
        Ok(dedup::plan(&snapshot))
    }

    /// Collapses duplicate records in the local store.
    ///
    /// Destructive and therefore gated: without the explicit opt-in nothing
    /// is removed. A failing pass logs and leaves all records intact.
    pub async fn run_deduplication(&mut self, opt_in: bool) -> Result<DedupReport> {
        if !opt_in {
            return Ok(DedupReport { removed: 0 });
        }

        let snapshot = match self.local.get_all().await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                log::warn!("dedup pass skipped: {}", error);
                return Ok(DedupReport { removed: 0 });
            }
        };

        let plan = dedup::plan(&snapshot);
        let mut removed = 0;
        for id in &plan.deletions {
            match self.local.delete(*id).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(error) => log::warn!("dedup could not remove {}: {}", id, error),
            }
        }

        Ok(DedupReport { removed })
    }

    fn queue_pending(&mut self, record: ReviewRecord) {
        if self.pending.len() == PENDING_QUEUE_LIMIT {
            log::warn!("pending queue full, dropping the oldest queued record");
            self.pending.pop_front();
        }
        self.pending.push_back(record);
    }

    fn note_degraded(&mut self) {
        self.degraded = true;
        // One informational notice per session, repeated identical failures
        // must not spam.
        if !self.degraded_notice_shown {
            self.degraded_notice_shown = true;
            log::warn!("local storage unavailable; keeping new saves in memory for this session");
        }
    }
}

// Error Boilerplate (Error display, conversion and source)
impl fmt::Display for RecordStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error During Record Store Interaction({:?})", self)
    }
}
impl From<ReviewDBError> for RecordStoreError {
    fn from(error: ReviewDBError) -> Self {
        match error {
            ReviewDBError::DBConnectionError { .. } | ReviewDBError::DBMigrationError { .. } => {
                Self::StorageUnavailable { source: error }
            }
            error => Self::StorageWriteFailed { source: error },
        }
    }
}
impl From<RemoteError> for RecordStoreError {
    fn from(error: RemoteError) -> Self {
        match error {
            RemoteError::Unreachable { message } => Self::NetworkUnreachable { message },
            RemoteError::Protocol { message } => Self::NetworkUnreachable { message },
            RemoteError::Timeout { operation } => Self::NetworkTimeout { operation },
            RemoteError::Rejected { status, message } => Self::RemoteRejected { status, message },
        }
    }
}
impl Error for RecordStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StorageUnavailable { ref source } => Some(source),
            Self::StorageWriteFailed { ref source } => Some(source),
            Self::NetworkUnreachable { .. } => None,
            Self::NetworkTimeout { .. } => None,
            Self::RemoteRejected { .. } => None,
        }
    }
}
