//! File-backed registry store
//!
//! All writes go through [`RegistryStore::update`], which serializes
//! read-modify-write cycles behind a process-wide lock and replaces the file
//! atomically. Readers (the scheduler) never observe a partially written file,
//! and see a mutation at their next reload.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::{LOCAL_SECTION, Registry};
use crate::error::{RegistryError, Result};
use crate::ini::IniDocument;

/// Handle on the central registry file
#[derive(Debug)]
pub struct RegistryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl RegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads a fresh snapshot. A missing file is an empty registry.
    pub fn load(&self) -> Result<Registry> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(source) => {
                return Err(RegistryError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        Registry::parse(self.path.clone(), &text).map_err(|source| RegistryError::Config {
            path: self.path.clone(),
            source,
        })
    }

    /// Loads the registry, writing a default port and secret if missing
    pub fn load_or_init(&self) -> Result<Registry> {
        self.update(|registry| {
            if registry.ensure_defaults() {
                info!("Registry {} updated with missing defaults", self.path.display());
            }
            Ok(registry.clone())
        })
    }

    /// Applies `mutate` to a fresh snapshot and persists the result.
    ///
    /// Nothing is written when `mutate` fails.
    pub fn update<T, F>(&self, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut Registry) -> Result<T>,
    {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut registry = self.load()?;
        let before = registry.render();
        let value = mutate(&mut registry)?;

        let after = registry.render();
        if after != before {
            self.save(&after)?;
        }

        Ok(value)
    }

    fn save(&self, contents: &str) -> Result<()> {
        debug!("Saving registry to {}", self.path.display());
        atomic_write(&self.path, contents.as_bytes()).map_err(|source| {
            RegistryError::Persistence {
                path: self.path.clone(),
                source,
            }
        })
    }
}

/// Writes `data` to a temporary file next to `path` and renames it into place
fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Creates a new `.grony` file with the given `[repo]` settings.
///
/// Fails with a conflict if the file already exists; creation is exclusive so
/// two concurrent calls cannot both succeed.
pub fn create_local_file(path: &Path, settings: &[(&str, &str)]) -> Result<()> {
    let mut document = IniDocument::new();
    let section = document.ensure_section(LOCAL_SECTION);
    for (key, value) in settings {
        section.set(key, *value);
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(RegistryError::Conflict(format!(
                "{} already exists",
                path.display()
            )));
        }
        Err(source) => {
            return Err(RegistryError::Persistence {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    file.write_all(document.render().as_bytes())
        .map_err(|source| RegistryError::Persistence {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = RegistryStore::new(dir.path().join("grony.conf"));
        let registry = store.load().unwrap();
        assert!(registry.is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_load_or_init_persists_defaults_once() {
        let dir = TempDir::new().unwrap();
        let store = RegistryStore::new(dir.path().join("grony.conf"));

        let first = store.load_or_init().unwrap();
        let secret = first.config().secret.clone().unwrap();
        assert!(store.path().exists());

        let second = store.load_or_init().unwrap();
        assert_eq!(second.config().secret.as_deref(), Some(secret.as_str()));
    }

    #[test]
    fn test_update_persists_mutation() {
        let dir = TempDir::new().unwrap();
        let store = RegistryStore::new(dir.path().join("grony.conf"));

        store
            .update(|registry| registry.add_repo("r1", Path::new("/tmp/r1")))
            .unwrap();

        let reloaded = store.load().unwrap();
        assert!(reloaded.has_repo("r1"));
    }

    #[test]
    fn test_failed_update_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = RegistryStore::new(dir.path().join("grony.conf"));

        let result = store.update(|registry| registry.remove_repo("ghost"));
        assert!(matches!(result, Err(RegistryError::Validation(_))));
        assert!(!store.path().exists());
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(RegistryStore::new(dir.path().join("grony.conf")));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .update(|registry| {
                            registry.add_repo(&format!("r{}", i), Path::new("/tmp/x"))
                        })
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.load().unwrap().len(), 8);
    }

    #[test]
    fn test_unparseable_registry_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("grony.conf");
        std::fs::write(&path, "not an ini file\n").unwrap();

        let err = RegistryStore::new(&path).load().unwrap_err();
        assert!(matches!(err, RegistryError::Config { .. }));
    }

    #[test]
    fn test_create_local_file_is_exclusive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".grony");

        create_local_file(&path, &[("pull-on", "@hourly")]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "[repo]\npull-on = @hourly\n");

        let err = create_local_file(&path, &[]).unwrap_err();
        assert!(matches!(err, RegistryError::Conflict(_)));
    }
}
