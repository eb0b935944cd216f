//! JSON state-file store.

use std::ffi::OsString;
use std::fs;
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use occ_core::VersionedStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::lock::FileLock;
use crate::resource::{Object, ObjectKey, ResourceVersion};
use crate::state::{State, StateFile};

/// Versioned store persisted to a single JSON file.
///
/// Every operation re-reads the file under a `flock` on a sibling
/// `<file>.lock`, exclusive for writes and shared for reads. Handles in one
/// process and separate processes therefore serialize on the same lock, and
/// a stale update is always rejected with a conflict. Writes go to a unique
/// temp file in the same directory that is then renamed over the state file.
#[derive(Debug)]
pub struct FileStore<T> {
    path: PathBuf,
    lock_path: PathBuf,
    _spec: PhantomData<fn() -> T>,
}

impl<T> FileStore<T>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq,
{
    /// Open a store at `path`, creating parent directories.
    ///
    /// A missing file is treated as an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let mut lock_name = OsString::from(path.as_os_str());
        lock_name.push(".lock");

        Ok(Self {
            lock_path: PathBuf::from(lock_name),
            path,
            _spec: PhantomData,
        })
    }

    /// Path of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store a new object.
    pub fn create(&self, object: Object<T>) -> Result<Object<T>, StoreError> {
        let created = self.modify(|state| state.create(object))?;
        info!(key = %created.key(), version = %created.version(), "object created");
        Ok(created)
    }

    /// Fetch an object.
    pub fn get(&self, key: &ObjectKey) -> Result<Object<T>, StoreError> {
        self.read(|state| state.get(key))
    }

    /// Write an object if it was not modified since it was read.
    pub fn update(&self, object: Object<T>) -> Result<Object<T>, StoreError> {
        let updated = self.modify(|state| state.update(object))?;
        info!(key = %updated.key(), version = %updated.version(), "object updated");
        Ok(updated)
    }

    /// Remove an object.
    pub fn delete(&self, key: &ObjectKey) -> Result<Object<T>, StoreError> {
        self.modify(|state| state.delete(key))
    }

    /// List objects, optionally limited to one namespace.
    pub fn list(&self, namespace: Option<&str>) -> Result<Vec<Object<T>>, StoreError> {
        self.read(|state| Ok(state.list(namespace)))
    }

    /// Latest revision recorded in the file.
    pub fn revision(&self) -> Result<ResourceVersion, StoreError> {
        self.read(|state| Ok(state.revision()))
    }

    fn read<R>(
        &self,
        op: impl FnOnce(&State<T>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let _lock = FileLock::shared(&self.lock_path)?;
        op(&self.load()?)
    }

    /// Load, apply `op` and save while holding the exclusive lock, so the
    /// version check and the write happen as one step.
    fn modify<R>(
        &self,
        op: impl FnOnce(&mut State<T>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let _lock = FileLock::exclusive(&self.lock_path)?;
        let mut state = self.load()?;
        let result = op(&mut state)?;
        self.save(state)?;
        Ok(result)
    }

    fn load(&self) -> Result<State<T>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(State::default()),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        if content.trim().is_empty() {
            return Ok(State::default());
        }
        let file: StateFile<T> = serde_json::from_str(&content)?;
        Ok(file.into())
    }

    fn save(&self, state: State<T>) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&StateFile::from(state))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
        tmp.write_all(&json)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| StoreError::io(&self.path, e.error))?;

        debug!(path = %self.path.display(), "state file written");
        Ok(())
    }
}

impl<T> VersionedStore for FileStore<T>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq,
{
    type Key = ObjectKey;
    type Resource = Object<T>;
    type Error = StoreError;

    fn get(&self, key: &ObjectKey) -> Result<Object<T>, StoreError> {
        FileStore::get(self, key)
    }

    fn update(&self, resource: Object<T>) -> Result<Object<T>, StoreError> {
        FileStore::update(self, resource)
    }

    fn is_conflict(error: &StoreError) -> bool {
        error.is_conflict()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use occ_core::{ConflictRetrier, RecordingSleeper, RetryPolicy};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        value: u64,
    }

    fn key() -> ObjectKey {
        ObjectKey::new("default", "counter")
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store: FileStore<Counter> = FileStore::open(dir.path().join("state.json")).unwrap();
        assert!(store.get(&key()).unwrap_err().is_not_found());
        assert_eq!(store.list(None).unwrap().len(), 0);
        assert_eq!(store.revision().unwrap(), ResourceVersion::NONE);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("state.json");
        let store: FileStore<Counter> = FileStore::open(&path).unwrap();
        store.create(Object::new(key(), Counter { value: 1 })).unwrap();
        assert!(path.exists());

        let mut leftovers: Vec<String> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        leftovers.sort();
        assert_eq!(leftovers, vec!["state.json", "state.json.lock"]);
    }

    #[test]
    fn test_state_persists_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let first: FileStore<Counter> = FileStore::open(&path).unwrap();
        first.create(Object::new(key(), Counter { value: 1 })).unwrap();

        let second: FileStore<Counter> = FileStore::open(&path).unwrap();
        let object = second.get(&key()).unwrap();
        assert_eq!(object.spec, Counter { value: 1 });
        assert_eq!(object.version(), ResourceVersion(1));
    }

    #[test]
    fn test_stale_write_from_other_handle_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let a: FileStore<Counter> = FileStore::open(&path).unwrap();
        let b: FileStore<Counter> = FileStore::open(&path).unwrap();
        a.create(Object::new(key(), Counter { value: 0 })).unwrap();

        let read_by_a = a.get(&key()).unwrap();
        let read_by_b = b.get(&key()).unwrap();
        b.update(read_by_b.map_spec(|_| Counter { value: 5 })).unwrap();

        let err = a
            .update(read_by_a.map_spec(|_| Counter { value: 9 }))
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(a.get(&key()).unwrap().spec.value, 5);
    }

    #[test]
    fn test_retrier_drives_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store: FileStore<Counter> = FileStore::open(dir.path().join("state.json")).unwrap();
        store.create(Object::new(key(), Counter { value: 1 })).unwrap();
        let retrier = ConflictRetrier::new(RetryPolicy::default())
            .unwrap()
            .with_sleeper(RecordingSleeper::new());

        let updated = retrier
            .update_in(&store, &key(), |object| {
                object.map_spec(|c| Counter { value: c.value + 1 })
            })
            .unwrap();
        assert_eq!(updated.spec.value, 2);
        assert_eq!(store.revision().unwrap(), ResourceVersion(2));
    }

    #[test]
    fn test_corrupt_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        let store: FileStore<Counter> = FileStore::open(&path).unwrap();
        assert!(matches!(
            store.get(&key()),
            Err(StoreError::Serialization(_))
        ));
    }
}
