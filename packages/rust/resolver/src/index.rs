//! Index file store.
//!
//! Every hierarchy directory carries a small YAML record (`index.yaml`)
//! pinning its identifier and display name. [`IndexStore::get_or_assign`]
//! is the only way the resolver touches these files: it returns the
//! existing record, or synthesises one with a fresh identifier and
//! persists it immediately.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use courseforge_shared::{CourseError, CourseMeta, Result, new_id};

/// File name written for every index record.
pub const INDEX_FILE: &str = "index.yaml";

/// Accepted alternative, read when `index.yaml` is absent.
pub const INDEX_FILE_ALT: &str = "index.yml";

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// Raw storage for index documents, keyed by the owning directory.
pub trait IndexBackend: Send + Sync {
    /// Load the raw YAML for `dir`, or `None` when no record exists.
    fn load(&self, dir: &Path) -> Result<Option<String>>;

    /// Persist raw YAML for `dir`, replacing any existing record.
    fn store(&self, dir: &Path, yaml: &str) -> Result<()>;
}

/// Index files on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsIndexBackend;

impl IndexBackend for FsIndexBackend {
    fn load(&self, dir: &Path) -> Result<Option<String>> {
        for name in [INDEX_FILE, INDEX_FILE_ALT] {
            let path = dir.join(name);
            match std::fs::read_to_string(&path) {
                Ok(content) => return Ok(Some(content)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(CourseError::io(path, e)),
            }
        }
        Ok(None)
    }

    /// Writes a temporary sibling and renames it over `index.yaml`, so an
    /// interrupted write never leaves a truncated record behind.
    fn store(&self, dir: &Path, yaml: &str) -> Result<()> {
        let path = dir.join(INDEX_FILE);
        let temp = dir.join(format!(".{INDEX_FILE}.tmp"));
        std::fs::write(&temp, yaml).map_err(|e| CourseError::io(&temp, e))?;
        std::fs::rename(&temp, &path).map_err(|e| CourseError::io(path, e))
    }
}

/// Index records held in memory; nothing touches the filesystem.
#[derive(Debug, Default)]
pub struct MemoryIndexBackend {
    records: Mutex<HashMap<PathBuf, String>>,
}

impl MemoryIndexBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw YAML stored for `dir`, if any.
    pub fn get(&self, dir: &Path) -> Option<String> {
        self.records.lock().ok()?.get(dir).cloned()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IndexBackend for MemoryIndexBackend {
    fn load(&self, dir: &Path) -> Result<Option<String>> {
        let records = self
            .records
            .lock()
            .map_err(|_| CourseError::index(dir, "index lock poisoned"))?;
        Ok(records.get(dir).cloned())
    }

    fn store(&self, dir: &Path, yaml: &str) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| CourseError::index(dir, "index lock poisoned"))?;
        records.insert(dir.to_path_buf(), yaml.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A typed index document.
pub trait IndexRecord: Serialize + DeserializeOwned + Default {
    fn url_name(&self) -> &str;
    fn set_url_name(&mut self, id: String);
    fn display_name(&self) -> &str;
    fn set_display_name(&mut self, name: String);
}

macro_rules! impl_index_record {
    ($($ty:ty),+) => {$(
        impl IndexRecord for $ty {
            fn url_name(&self) -> &str {
                &self.url_name
            }
            fn set_url_name(&mut self, id: String) {
                self.url_name = id;
            }
            fn display_name(&self) -> &str {
                &self.display_name
            }
            fn set_display_name(&mut self, name: String) {
                self.display_name = name;
            }
        }
    )+};
}

/// The course root record.
pub type CourseRecord = CourseMeta;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChapterRecord {
    #[serde(default)]
    pub url_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequentialRecord {
    #[serde(default)]
    pub url_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub graded: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub format: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerticalRecord {
    #[serde(default)]
    pub url_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl_index_record!(CourseRecord, ChapterRecord, SequentialRecord, VerticalRecord);

/// What [`IndexStore::get_or_assign`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assigned {
    /// The record existed with an identifier; nothing was written.
    Existing,
    /// The record existed without an identifier; one was added and written.
    Updated,
    /// No record existed; one was synthesised and written.
    Created,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Typed access to index records over a pluggable backend.
#[derive(Clone)]
pub struct IndexStore {
    backend: Arc<dyn IndexBackend>,
}

impl IndexStore {
    pub fn new(backend: Arc<dyn IndexBackend>) -> Self {
        Self { backend }
    }

    /// A store over index files on disk.
    pub fn filesystem() -> Self {
        Self::new(Arc::new(FsIndexBackend))
    }

    /// Read and parse the record for `dir`.
    pub fn read<R: IndexRecord>(&self, dir: &Path) -> Result<Option<R>> {
        let Some(yaml) = self.backend.load(dir)? else {
            return Ok(None);
        };
        if yaml.trim().is_empty() {
            return Ok(Some(R::default()));
        }
        serde_yaml::from_str(&yaml)
            .map(Some)
            .map_err(|e| CourseError::index(dir, format!("invalid index file: {e}")))
    }

    /// Serialize and persist `record` for `dir`.
    pub fn write<R: IndexRecord>(&self, dir: &Path, record: &R) -> Result<()> {
        let yaml = serde_yaml::to_string(record)
            .map_err(|e| CourseError::index(dir, format!("failed to serialize index: {e}")))?;
        self.backend.store(dir, &yaml)
    }

    /// Return the record for `dir`, assigning and persisting an identifier
    /// when it has none. A missing record is synthesised with
    /// `fallback_display_name`, which also fills an empty display name.
    pub fn get_or_assign<R: IndexRecord>(
        &self,
        dir: &Path,
        fallback_display_name: &str,
    ) -> Result<(R, Assigned)> {
        let (mut record, assigned) = match self.read::<R>(dir)? {
            Some(record) if !record.url_name().is_empty() => (record, Assigned::Existing),
            Some(mut record) => {
                record.set_url_name(new_id());
                self.write(dir, &record)?;
                (record, Assigned::Updated)
            }
            None => {
                let mut record = R::default();
                record.set_url_name(new_id());
                record.set_display_name(fallback_display_name.to_string());
                self.write(dir, &record)?;
                (record, Assigned::Created)
            }
        };

        if record.display_name().is_empty() {
            record.set_display_name(fallback_display_name.to_string());
        }

        if assigned != Assigned::Existing {
            debug!(dir = %dir.display(), id = record.url_name(), ?assigned, "pinned identifier");
        }

        Ok((record, assigned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_store() -> (IndexStore, Arc<MemoryIndexBackend>) {
        let backend = Arc::new(MemoryIndexBackend::new());
        (IndexStore::new(backend.clone()), backend)
    }

    #[test]
    fn fs_store_replaces_existing_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(INDEX_FILE), "url_name: old\n").unwrap();

        FsIndexBackend.store(dir.path(), "url_name: new\n").unwrap();
        assert_eq!(
            FsIndexBackend.load(dir.path()).unwrap().as_deref(),
            Some("url_name: new\n")
        );
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![INDEX_FILE.to_string()]);
    }

    #[test]
    fn missing_record_is_created_and_persisted() {
        let (store, backend) = memory_store();
        let dir = Path::new("/course/00_Intro");

        let (rec, assigned) = store.get_or_assign::<ChapterRecord>(dir, "Intro").unwrap();
        assert_eq!(assigned, Assigned::Created);
        assert_eq!(rec.display_name, "Intro");
        assert_eq!(rec.url_name.len(), 32);

        let raw = backend.get(dir).expect("written back");
        assert!(raw.contains(&rec.url_name));
    }

    #[test]
    fn second_call_returns_pinned_id_without_writing() {
        let (store, backend) = memory_store();
        let dir = Path::new("/course/00_Intro");

        let (first, _) = store.get_or_assign::<ChapterRecord>(dir, "Intro").unwrap();
        let raw_before = backend.get(dir);
        let (second, assigned) = store.get_or_assign::<ChapterRecord>(dir, "Other").unwrap();

        assert_eq!(assigned, Assigned::Existing);
        assert_eq!(first.url_name, second.url_name);
        assert_eq!(second.display_name, "Intro");
        assert_eq!(backend.get(dir), raw_before);
    }

    #[test]
    fn record_without_id_is_updated_and_keeps_extra_keys() {
        let (store, backend) = memory_store();
        let dir = Path::new("/course/00_Basics/01_Loops");
        backend
            .store(dir, "display_name: Loops\ngraded: true\nformat: Homework\nweight: 3\n")
            .unwrap();

        let (rec, assigned) = store.get_or_assign::<SequentialRecord>(dir, "x").unwrap();
        assert_eq!(assigned, Assigned::Updated);
        assert!(rec.graded);
        assert_eq!(rec.format, "Homework");
        assert!(!rec.url_name.is_empty());

        let raw = backend.get(dir).unwrap();
        assert!(raw.contains("weight: 3"));
        assert!(raw.contains(&rec.url_name));
    }

    #[test]
    fn empty_display_name_falls_back() {
        let (store, backend) = memory_store();
        let dir = Path::new("/c/v");
        backend.store(dir, "url_name: abc\n").unwrap();
        let (rec, assigned) = store.get_or_assign::<VerticalRecord>(dir, "Fallback").unwrap();
        assert_eq!(assigned, Assigned::Existing);
        assert_eq!(rec.url_name, "abc");
        assert_eq!(rec.display_name, "Fallback");
    }

    #[test]
    fn malformed_yaml_is_index_error() {
        let (store, backend) = memory_store();
        let dir = Path::new("/c/bad");
        backend.store(dir, "url_name: [unclosed\n").unwrap();
        let err = store.read::<ChapterRecord>(dir).unwrap_err();
        assert!(matches!(err, CourseError::Index { .. }));
        assert!(err.is_structural());
    }

    #[test]
    fn filesystem_backend_prefers_yaml_and_falls_back_to_yml() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::filesystem();

        std::fs::write(dir.path().join(INDEX_FILE_ALT), "url_name: from-yml\n").unwrap();
        let rec: ChapterRecord = store.read(dir.path()).unwrap().unwrap();
        assert_eq!(rec.url_name, "from-yml");

        std::fs::write(dir.path().join(INDEX_FILE), "url_name: from-yaml\n").unwrap();
        let rec: ChapterRecord = store.read(dir.path()).unwrap().unwrap();
        assert_eq!(rec.url_name, "from-yaml");
    }

    #[test]
    fn filesystem_backend_writes_index_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::filesystem();
        let (rec, _) = store
            .get_or_assign::<VerticalRecord>(dir.path(), "Card")
            .unwrap();
        let written = std::fs::read_to_string(dir.path().join(INDEX_FILE)).unwrap();
        assert!(written.contains(&rec.url_name));
        assert!(written.contains("display_name: Card"));
    }
}
