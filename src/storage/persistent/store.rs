use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use tracing::{debug, info, warn};

use crate::config::PersistentConfig;
use crate::entity::RecordId;
use crate::error::{ExecutionError, MoocletError, MoocletResult};
use crate::measure::{NewValue, NewVariable, Value, ValueId, Variable, VariableId};
use crate::storage::memory::{lock_err, MeasurementState};
use crate::storage::traits::{MeasurementStore, StorageError};

use super::file_lock::DirectoryLock;
use super::wal::{WalEntryKind, WriteAheadLog};

/// Name of the log file inside the store directory.
pub const WAL_FILE: &str = "measurements.wal";

fn storage_err(message: String) -> MoocletError {
    MoocletError::Execution(ExecutionError::Storage { message })
}

fn io_err(context: &str, err: &std::io::Error) -> StorageError {
    StorageError::Backend(format!("{context}: {err}"))
}

fn apply(state: &mut MeasurementState, kind: WalEntryKind) -> Result<(), StorageError> {
    match kind {
        WalEntryKind::VariableInsert(variable) => state.apply_variable(variable),
        WalEntryKind::ValueInsert(value) => state.apply_value(value),
        WalEntryKind::ValueUpdate { id, value } => state.apply_update(id, value).map(|_| ()),
    }
}

/// Measurement store backed by a write-ahead log in a locked directory.
pub struct PersistentMeasurementStore {
    dir: PathBuf,
    _lock: DirectoryLock,
    wal: WriteAheadLog,
    state: RwLock<MeasurementState>,
    /// In-place updates logged since the last compaction.
    pending_updates: AtomicU64,
    /// Log size right after the last compaction; growth is measured from here.
    compacted_len: AtomicU64,
    compactions: AtomicU64,
    config: PersistentConfig,
}

impl std::fmt::Debug for PersistentMeasurementStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentMeasurementStore")
            .field("dir", &self.dir)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PersistentMeasurementStore {
    /// Opens or creates a store in `dir`.
    ///
    /// # Errors
    /// - the directory cannot be created or another handle holds its lock
    /// - the log header is not a measurement log
    /// - an intact log entry cannot be applied
    pub fn open(dir: impl AsRef<Path>, config: PersistentConfig) -> MoocletResult<Self> {
        config.validate()?;
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .map_err(|e| storage_err(format!("failed to create store directory: {e}")))?;
        let lock = DirectoryLock::acquire(dir)
            .map_err(|e| storage_err(format!("failed to acquire lock: {e}")))?;

        let (wal, replay) = WriteAheadLog::open(&dir.join(WAL_FILE), config.sync_on_write)
            .map_err(|e| storage_err(format!("failed to open WAL: {e}")))?;
        if let Some(tail) = &replay.torn_tail {
            warn!(dir = %dir.display(), valid_len = replay.valid_len, %tail, "skipped damaged WAL tail");
        }

        let mut state = MeasurementState::default();
        let count = replay.entries.len();
        let updates = replay
            .entries
            .iter()
            .filter(|e| matches!(e.kind, WalEntryKind::ValueUpdate { .. }))
            .count() as u64;
        for entry in replay.entries {
            let sequence = entry.sequence;
            apply(&mut state, entry.kind).map_err(|e| {
                storage_err(format!("failed to apply WAL entry {sequence}: {e}"))
            })?;
        }
        if count > 0 {
            info!(dir = %dir.display(), entries = count, "replayed measurement log");
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            _lock: lock,
            wal,
            state: RwLock::new(state),
            pending_updates: AtomicU64::new(updates),
            compacted_len: AtomicU64::new(0),
            compactions: AtomicU64::new(0),
            config,
        })
    }

    /// The store directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of compactions run by this handle.
    #[must_use]
    pub fn compactions(&self) -> u64 {
        self.compactions.load(Ordering::Relaxed)
    }

    /// Rewrites the log as one insert per live row, folding in-place
    /// updates into the rows they changed.
    pub fn compact(&self) -> Result<(), StorageError> {
        let state = self.state.read().map_err(|_| lock_err("persistent.compact"))?;
        self.compact_locked(&state)
    }

    fn compact_locked(&self, state: &MeasurementState) -> Result<(), StorageError> {
        let mut kinds: Vec<WalEntryKind> = state
            .variables()
            .into_iter()
            .map(WalEntryKind::VariableInsert)
            .collect();
        for variable in state.variables() {
            kinds.extend(
                state
                    .values_for_variable(variable.id)
                    .into_iter()
                    .map(WalEntryKind::ValueInsert),
            );
        }
        let entries = kinds.len();
        self.wal
            .rewrite(kinds)
            .map_err(|e| io_err("WAL compaction failed", &e))?;
        let size = self
            .wal
            .size_bytes()
            .map_err(|e| io_err("WAL stat failed", &e))?;
        self.pending_updates.store(0, Ordering::Relaxed);
        self.compacted_len.store(size, Ordering::Relaxed);
        self.compactions.fetch_add(1, Ordering::Relaxed);
        info!(dir = %self.dir.display(), entries, size, "compacted measurement log");
        Ok(())
    }

    fn append(&self, kind: WalEntryKind) -> Result<(), StorageError> {
        self.wal
            .append(kind)
            .map(|_| ())
            .map_err(|e| io_err("WAL append failed", &e))
    }

    /// Compacts once the log has grown `max_wal_size` bytes past its last
    /// compacted size, provided there are updates to fold; a log of pure
    /// inserts cannot shrink.
    fn maybe_compact(&self, state: &MeasurementState) -> Result<(), StorageError> {
        if self.pending_updates.load(Ordering::Relaxed) == 0 {
            return Ok(());
        }
        let size = self
            .wal
            .size_bytes()
            .map_err(|e| io_err("WAL stat failed", &e))?;
        let baseline = self.compacted_len.load(Ordering::Relaxed);
        if size > baseline.saturating_add(self.config.max_wal_size) {
            debug!(size, baseline, max = self.config.max_wal_size, "WAL over size limit");
            self.compact_locked(state)?;
        }
        Ok(())
    }

    /// Runs after a write is already logged and applied, so a failure must
    /// not surface as a failed write.
    fn compact_after_write(&self, state: &MeasurementState) {
        if let Err(e) = self.maybe_compact(state) {
            warn!(dir = %self.dir.display(), error = %e, "WAL compaction failed");
        }
    }
}

impl MeasurementStore for PersistentMeasurementStore {
    fn insert_variable(&self, variable: NewVariable) -> Result<Variable, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("variable.insert"))?;
        let variable = state.prepare_variable(variable)?;
        self.append(WalEntryKind::VariableInsert(variable.clone()))?;
        state.apply_variable(variable.clone())?;
        Ok(variable)
    }

    fn variable_by_name(&self, name: &str) -> Result<Option<Variable>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("variable.by_name"))?;
        Ok(state.variable_by_name(name))
    }

    fn variable(&self, id: VariableId) -> Result<Option<Variable>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("variable.get"))?;
        Ok(state.variable(id))
    }

    fn variables(&self) -> Result<Vec<Variable>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("variable.list"))?;
        Ok(state.variables())
    }

    fn insert_value(&self, value: NewValue) -> Result<Value, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("value.insert"))?;
        let value = state.prepare_value(value)?;
        self.append(WalEntryKind::ValueInsert(value.clone()))?;
        state.apply_value(value.clone())?;
        self.compact_after_write(&state);
        Ok(value)
    }

    fn update_value(&self, id: ValueId, value: f64) -> Result<Value, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("value.update"))?;
        if !state.contains_value(id) {
            return Err(StorageError::NotFound {
                kind: "value".to_string(),
                key: id.to_string(),
            });
        }
        self.append(WalEntryKind::ValueUpdate { id, value })?;
        self.pending_updates.fetch_add(1, Ordering::Relaxed);
        let updated = state.apply_update(id, value)?;
        self.compact_after_write(&state);
        Ok(updated)
    }

    fn values_for_variable(&self, variable: VariableId) -> Result<Vec<Value>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("value.for_variable"))?;
        Ok(state.values_for_variable(variable))
    }

    fn values_for_owner(
        &self,
        variable: VariableId,
        owner: Option<RecordId>,
    ) -> Result<Vec<Value>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("value.for_owner"))?;
        Ok(state.values_for_owner(variable, owner))
    }

    fn count_values(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("value.count"))?;
        Ok(state.count_values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::{RecordMode, VariableSpec};
    use tempfile::tempdir;

    fn config() -> PersistentConfig {
        PersistentConfig {
            sync_on_write: false,
            ..PersistentConfig::default()
        }
    }

    #[test]
    fn update_is_replayed() {
        let dir = tempdir().unwrap();
        let id = {
            let store = PersistentMeasurementStore::open(dir.path(), config()).unwrap();
            let var = store
                .insert_variable(
                    VariableSpec::new("num_students")
                        .mode(RecordMode::Aggregate)
                        .build()
                        .unwrap(),
                )
                .unwrap();
            let value = store
                .insert_value(NewValue {
                    variable_id: var.id,
                    owner_id: Some(3),
                    user_id: None,
                    value: 1.0,
                })
                .unwrap();
            store.update_value(value.id, 4.0).unwrap();
            value.id
        };

        let store = PersistentMeasurementStore::open(dir.path(), config()).unwrap();
        let values = store.values_for_owner(VariableId(1), Some(3)).unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].id, id);
        assert_eq!(values[0].value, 4.0);
    }

    #[test]
    fn compaction_folds_updates() {
        let dir = tempdir().unwrap();
        let store = PersistentMeasurementStore::open(dir.path(), config()).unwrap();
        let var = store
            .insert_variable(VariableSpec::new("explanation_probability").build().unwrap())
            .unwrap();
        let value = store
            .insert_value(NewValue {
                variable_id: var.id,
                owner_id: Some(1),
                user_id: None,
                value: 0.0,
            })
            .unwrap();
        for i in 0..50 {
            store.update_value(value.id, f64::from(i)).unwrap();
        }
        let before = std::fs::metadata(dir.path().join(WAL_FILE)).unwrap().len();
        store.compact().unwrap();
        let after = std::fs::metadata(dir.path().join(WAL_FILE)).unwrap().len();
        assert!(after < before);

        drop(store);
        let store = PersistentMeasurementStore::open(dir.path(), config()).unwrap();
        let values = store.values_for_variable(var.id).unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, 49.0);
    }

    fn small_log() -> PersistentConfig {
        PersistentConfig {
            max_wal_size: 4096,
            ..config()
        }
    }

    /// Inserts enough live rows that the compacted log alone exceeds 4 KiB.
    fn fill(store: &PersistentMeasurementStore) -> Value {
        let var = store
            .insert_variable(
                VariableSpec::new("student_rating")
                    .user_variable(true)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let mut last = None;
        for user in 0..60 {
            last = Some(
                store
                    .insert_value(NewValue {
                        variable_id: var.id,
                        owner_id: Some(1),
                        user_id: Some(user),
                        value: 1.0,
                    })
                    .unwrap(),
            );
        }
        last.unwrap()
    }

    #[test]
    fn compaction_is_not_repeated_once_live_rows_exceed_the_limit() {
        let dir = tempdir().unwrap();
        let store = PersistentMeasurementStore::open(dir.path(), small_log()).unwrap();
        let row = fill(&store);
        assert_eq!(store.compactions(), 0);

        for i in 0..20 {
            store.update_value(row.id, f64::from(i)).unwrap();
        }
        let size = std::fs::metadata(dir.path().join(WAL_FILE)).unwrap().len();
        assert!(size > 4096);
        assert_eq!(store.compactions(), 1);
    }

    #[test]
    fn failed_compaction_does_not_fail_the_write() {
        let dir = tempdir().unwrap();
        let store = PersistentMeasurementStore::open(dir.path(), small_log()).unwrap();
        let row = fill(&store);
        // the rewrite target is a directory, so every compaction fails
        std::fs::create_dir(dir.path().join(WAL_FILE).with_extension("wal.tmp")).unwrap();

        let updated = store.update_value(row.id, 6.0).unwrap();
        assert_eq!(updated.value, 6.0);
        assert_eq!(store.compactions(), 0);
        assert!(store.compact().is_err());

        drop(store);
        let store = PersistentMeasurementStore::open(dir.path(), small_log()).unwrap();
        let values = store.values_for_variable(row.variable_id).unwrap();
        assert_eq!(values.len(), 60);
        assert_eq!(values.iter().find(|v| v.id == row.id).unwrap().value, 6.0);
    }
}
