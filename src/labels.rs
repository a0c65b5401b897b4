//! Label registry: the ordered list of class names.
//!
//! A label's class id is its position in the list. The list only ever grows
//! by appending, so class ids already stored in annotations keep meaning the
//! same name.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

use log::{debug, info, warn};
use serde::Serialize;

use crate::error::YoloboxError;
use crate::ir::{ClassId, Label};
use crate::store::{read_json, write_json_atomic};

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);
const LOCK_MAX_ATTEMPTS: u32 = 500;
const LOCK_STALE_AFTER: Duration = Duration::from_secs(30);

/// Result of [`LabelRegistry::add`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AddedLabel {
    pub id: ClassId,
    pub name: String,
    /// True when the name was already registered and nothing was written.
    pub existed: bool,
}

/// Handle to the persisted label list (a JSON array of strings).
#[derive(Clone, Debug)]
pub struct LabelRegistry {
    path: PathBuf,
}

impl LabelRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns every label in registry order.
    ///
    /// A missing registry file is created empty.
    pub fn list(&self) -> Result<Vec<Label>, YoloboxError> {
        let names = self.load_or_init()?;
        Ok(names
            .into_iter()
            .enumerate()
            .map(|(index, name)| Label {
                id: ClassId::new(index as u64),
                name,
            })
            .collect())
    }

    /// Returns the label names in registry order.
    pub fn names(&self) -> Result<Vec<String>, YoloboxError> {
        self.load_or_init()
    }

    /// Registers `name`, or returns the id it already has.
    ///
    /// The name is trimmed first; an empty name is rejected. Matching is by
    /// exact string equality.
    pub fn add(&self, name: &str) -> Result<AddedLabel, YoloboxError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(YoloboxError::Validation(
                "label name is required".to_string(),
            ));
        }

        let _lock = RegistryLock::acquire(&self.path)?;
        let mut names = read_json::<Vec<String>>(&self.path)?.unwrap_or_default();

        if let Some(index) = names.iter().position(|existing| existing == name) {
            debug!("label '{}' already registered as {}", name, index);
            return Ok(AddedLabel {
                id: ClassId::new(index as u64),
                name: name.to_string(),
                existed: true,
            });
        }

        names.push(name.to_string());
        write_json_atomic(&self.path, &names)?;

        let id = ClassId::new((names.len() - 1) as u64);
        info!("registered label '{}' as class {}", name, id);
        Ok(AddedLabel {
            id,
            name: name.to_string(),
            existed: false,
        })
    }

    /// Reads the registry, creating it empty if it does not exist yet.
    ///
    /// Creation happens under the lock and re-reads first, so it never
    /// overwrites a list that a concurrent `add` wrote in the meantime.
    fn load_or_init(&self) -> Result<Vec<String>, YoloboxError> {
        if let Some(names) = read_json::<Vec<String>>(&self.path)? {
            return Ok(names);
        }

        let _lock = RegistryLock::acquire(&self.path)?;
        match read_json::<Vec<String>>(&self.path)? {
            Some(names) => Ok(names),
            None => {
                write_json_atomic(&self.path, &Vec::<String>::new())?;
                Ok(Vec::new())
            }
        }
    }
}

/// Exclusive hold on the registry for one read-modify-write.
///
/// Backed by a sibling `<registry>.lock` file created with `create_new`;
/// the file is removed when the guard drops. A lock file older than
/// [`LOCK_STALE_AFTER`] is assumed to belong to a crashed writer.
struct RegistryLock {
    path: PathBuf,
}

impl RegistryLock {
    fn acquire(registry_path: &Path) -> Result<Self, YoloboxError> {
        let mut lock_name = registry_path.as_os_str().to_owned();
        lock_name.push(".lock");
        let path = PathBuf::from(lock_name);

        for _ in 0..LOCK_MAX_ATTEMPTS {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(Self { path });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path) {
                        warn!("removing stale label registry lock {}", path.display());
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(err) => return Err(YoloboxError::Io(err)),
            }
        }

        Err(YoloboxError::RegistryLocked {
            path: registry_path.to_path_buf(),
        })
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!("failed to release lock {}: {}", self.path.display(), err);
        }
    }
}

fn is_stale(lock_path: &Path) -> bool {
    fs::metadata(lock_path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .map(|age| age > LOCK_STALE_AFTER)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn registry_in(dir: &Path) -> LabelRegistry {
        LabelRegistry::new(dir.join("labels.json"))
    }

    #[test]
    fn list_creates_empty_registry() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let registry = registry_in(temp.path());

        assert!(registry.list().expect("list").is_empty());
        let raw = fs::read_to_string(registry.path()).expect("read registry");
        assert_eq!(raw.trim(), "[]");
    }

    #[test]
    fn add_twice_returns_same_id() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let registry = registry_in(temp.path());

        let first = registry.add("car").expect("first add");
        let second = registry.add("car").expect("second add");

        assert_eq!(
            first,
            AddedLabel {
                id: ClassId(0),
                name: "car".into(),
                existed: false
            }
        );
        assert_eq!(
            second,
            AddedLabel {
                id: ClassId(0),
                name: "car".into(),
                existed: true
            }
        );
        assert_eq!(registry.list().expect("list").len(), 1);
    }

    #[test]
    fn add_trims_and_rejects_blank_names() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let registry = registry_in(temp.path());

        let err = registry.add("   ").unwrap_err();
        assert!(matches!(err, YoloboxError::Validation(_)));

        let added = registry.add("  dog ").expect("add dog");
        assert_eq!(added.name, "dog");
        assert!(registry.add("dog").expect("add again").existed);
    }

    #[test]
    fn add_appends_in_order() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let registry = registry_in(temp.path());

        registry.add("car").expect("add car");
        registry.add("person").expect("add person");
        registry.add("Car").expect("add Car");

        let labels = registry.list().expect("list");
        let names: Vec<_> = labels.iter().map(|label| label.name.as_str()).collect();
        assert_eq!(names, vec!["car", "person", "Car"]);
        assert_eq!(labels[2].id, ClassId(2));

        let raw: Vec<String> =
            serde_json::from_str(&fs::read_to_string(registry.path()).expect("read"))
                .expect("parse registry");
        assert_eq!(raw, vec!["car", "person", "Car"]);
    }

    #[test]
    fn concurrent_adds_do_not_lose_labels() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let registry = Arc::new(registry_in(temp.path()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.add(&format!("label-{i}")).expect("add"))
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }

        assert_eq!(registry.list().expect("list").len(), 8);
        assert!(!temp.path().join("labels.json.lock").exists());
    }

    #[test]
    fn first_list_does_not_clobber_concurrent_add() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let registry = Arc::new(registry_in(temp.path()));

        // Hold the lock the way `add` does, so the listing sees no file yet
        // and has to wait before creating one.
        let lock = RegistryLock::acquire(registry.path()).expect("take lock");
        let lister = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.names().expect("list"))
        };
        thread::sleep(Duration::from_millis(50));
        write_json_atomic(registry.path(), &vec!["car".to_string()]).expect("write registry");
        drop(lock);

        assert_eq!(lister.join().expect("join"), vec!["car"]);
        assert_eq!(registry.names().expect("names"), vec!["car"]);
    }

    #[test]
    fn stale_lock_is_broken() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let registry = registry_in(temp.path());
        let lock_path = temp.path().join("labels.json.lock");
        fs::write(&lock_path, "0").expect("write lock");
        let old = SystemTime::now() - Duration::from_secs(120);
        fs::File::options()
            .write(true)
            .open(&lock_path)
            .and_then(|file| file.set_modified(old))
            .expect("age lock");

        registry.add("car").expect("add despite stale lock");
        assert!(!lock_path.exists());
    }
}
