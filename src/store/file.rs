//! FileStore - one JSON document per flow

use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};
use uuid::Uuid;

use super::{decode, encode, FlowStore};
use crate::dag::{Flow, FlowId};
use crate::error::{FlowError, Result};

const EXTENSION: &str = "json";

/// Directory of `<flow id>.json` files
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: FlowId) -> PathBuf {
        self.root.join(format!("{id}.{EXTENSION}"))
    }
}

impl FlowStore for FileStore {
    #[instrument(skip(self, flow), fields(flow = %flow.name()))]
    fn save(&self, flow: &Flow) -> Result<FlowId> {
        let (id, json) = encode(flow)?;
        let path = self.path_for(id);

        // readers only ever see complete documents
        let staging = path.with_extension(format!("{EXTENSION}.{}.tmp", Uuid::new_v4().simple()));
        fs::write(&staging, json)?;
        if let Err(err) = fs::rename(&staging, &path) {
            let _ = fs::remove_file(&staging);
            return Err(err.into());
        }

        let assigned = flow.assign_id(id);
        if assigned != id {
            // lost the race for the first id
            let _ = fs::remove_file(&path);
        }
        debug!(id = %assigned, path = %self.path_for(assigned).display(), "Saved flow");
        Ok(assigned)
    }

    #[instrument(skip(self))]
    fn load(&self, id: FlowId) -> Result<Flow> {
        let json = match fs::read_to_string(self.path_for(id)) {
            Ok(json) => json,
            Err(err) if err.kind() == IoErrorKind::NotFound => {
                return Err(FlowError::FlowNotFound { id: id.to_string() })
            }
            Err(err) => return Err(err.into()),
        };
        decode(id, &json)
    }

    fn contains(&self, id: FlowId) -> bool {
        self.path_for(id).is_file()
    }

    fn len(&self) -> usize {
        fs::read_dir(&self.root)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .filter(|entry| entry.path().extension().is_some_and(|ext| ext == EXTENSION))
                    .count()
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::Task;
    use tempfile::TempDir;

    #[test]
    fn test_save_writes_one_file_per_flow() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        let flow = Flow::new("etl").unwrap();
        let id = store.save(&flow).unwrap();
        store.save(&flow).unwrap();

        assert!(dir.path().join(format!("{id}.json")).is_file());
        assert_eq!(store.len(), 1);
        assert!(store.contains(id));
    }

    #[test]
    fn test_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("nested")).unwrap();

        let flow = Flow::new("etl").unwrap();
        let task = Task::builder().name("extract").flow(&flow).build().unwrap();
        let id = store.save(&flow).unwrap();

        let loaded = store.load(id).unwrap();
        assert_eq!(loaded.id(), Some(id));
        assert_eq!(loaded.get_task("extract").unwrap().id(), task.id());
    }

    #[test]
    fn test_missing_file_is_flow_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        let err = store.load(FlowId::new()).unwrap_err();
        assert_eq!(err.code(), "FLOW-041");
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_first_saves_keep_one_file() {
        use std::sync::Barrier;
        use std::thread;

        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        for _ in 0..200 {
            let flow = Flow::new("racy").unwrap();
            let barrier = Barrier::new(2);

            let (left, right) = thread::scope(|s| {
                let save = || {
                    barrier.wait();
                    store.save(&flow).unwrap()
                };
                let left = s.spawn(save);
                let right = s.spawn(save);
                (left.join().unwrap(), right.join().unwrap())
            });

            assert_eq!(left, right);
            assert!(store.contains(left));
        }
        assert_eq!(store.len(), 200);
    }

    #[test]
    fn test_document_under_wrong_name_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        let flow = Flow::new("etl").unwrap();
        let id = store.save(&flow).unwrap();
        let other = FlowId::new();
        fs::copy(store.path_for(id), store.path_for(other)).unwrap();

        let err = store.load(other).unwrap_err();
        assert_eq!(err.code(), "FLOW-051");
        assert_eq!(store.load(id).unwrap().id(), Some(id));
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_rename_removes_staging_file() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        let flow = Flow::new("etl").unwrap();
        let id = flow.assign_id(FlowId::new());
        // a non-empty directory cannot be replaced by a file
        let blocker = store.path_for(id);
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("keep"), "x").unwrap();

        assert!(store.save(&flow).is_err());
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_corrupt_file_is_serialization_error() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let id = FlowId::new();
        fs::write(dir.path().join(format!("{id}.json")), "{ broken").unwrap();

        let err = store.load(id).unwrap_err();
        assert_eq!(err.code(), "FLOW-052");
    }
}
