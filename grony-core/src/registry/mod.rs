//! Repository registry
//!
//! The central registry file holds a `[config]` section and one
//! `[repo '<name>']` section per managed repository. Each repository may also
//! carry a local `.grony` file whose `[repo]` section provides defaults; the
//! central entry always wins field-for-field.
//!
//! A malformed repository entry does not prevent the rest of the registry
//! from loading: it is kept in the document (so it can still be removed) and
//! reported through [`Registry::rejected`].

pub mod config;
pub mod store;

pub use config::{ControlConfig, DEFAULT_IPC_PORT};
pub use store::{RegistryStore, create_local_file};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::domain::repository::{RepositoryDefinition, keys};
use crate::error::{ConfigError, RegistryError, Result};
use crate::ini::IniDocument;
use crate::paths;

/// Section name used inside `.grony` files
pub const LOCAL_SECTION: &str = "repo";

/// An in-memory snapshot of the registry file
#[derive(Debug, Clone)]
pub struct Registry {
    path: PathBuf,
    document: IniDocument,
    config: ControlConfig,
    repositories: BTreeMap<String, RepositoryDefinition>,
    rejected: BTreeMap<String, ConfigError>,
}

impl Registry {
    /// Parses registry text. `path` is the file the text came from.
    pub fn parse(path: impl Into<PathBuf>, text: &str) -> std::result::Result<Self, ConfigError> {
        Self::from_document(path.into(), IniDocument::parse(text)?)
    }

    fn from_document(
        path: PathBuf,
        document: IniDocument,
    ) -> std::result::Result<Self, ConfigError> {
        let config = ControlConfig::from_section(document.section(config::CONFIG_SECTION))?;

        let mut registry = Self {
            path,
            document,
            config,
            repositories: BTreeMap::new(),
            rejected: BTreeMap::new(),
        };

        let names: Vec<String> = registry.repo_names().map(str::to_string).collect();
        for name in names {
            registry.refresh_repo(&name);
        }

        Ok(registry)
    }

    /// Rebuilds the effective definition of one repository
    fn refresh_repo(&mut self, name: &str) {
        self.repositories.remove(name);
        self.rejected.remove(name);

        let Some(section) = self.document.section(&section_name(name)) else {
            return;
        };

        let mut settings = BTreeMap::new();

        if let Some(path) = section.get(keys::PATH) {
            let local_path = paths::local_file(Path::new(&paths::expand_vars(path)));
            match read_local_settings(&local_path) {
                Ok(local) => settings.extend(local),
                Err(e) => {
                    warn!("Repository '{}': {}", name, e);
                    self.rejected.insert(name.to_string(), e);
                    return;
                }
            }
        }

        for (key, value) in section.entries() {
            settings.insert(key.to_string(), value.to_string());
        }

        match RepositoryDefinition::from_settings(name, &settings) {
            Ok(repo) => {
                self.repositories.insert(name.to_string(), repo);
            }
            Err(e) => {
                warn!("Repository '{}' ignored: {}", name, e);
                self.rejected.insert(name.to_string(), e);
            }
        }
    }

    /// File this registry was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    /// All valid repositories, ordered by name
    pub fn repositories(&self) -> impl Iterator<Item = &RepositoryDefinition> {
        self.repositories.values()
    }

    pub fn repository(&self, name: &str) -> Option<&RepositoryDefinition> {
        self.repositories.get(name)
    }

    /// Repositories whose settings failed validation
    pub fn rejected(&self) -> &BTreeMap<String, ConfigError> {
        &self.rejected
    }

    /// Names of every `[repo '<name>']` section, valid or not
    pub fn repo_names(&self) -> impl Iterator<Item = &str> {
        self.document
            .sections()
            .filter_map(|section| parse_section_name(section.name()))
    }

    /// Raw `path` of a repository section, even if the entry was rejected
    pub fn raw_path(&self, name: &str) -> Option<&str> {
        self.document.section(&section_name(name))?.get(keys::PATH)
    }

    pub fn has_repo(&self, name: &str) -> bool {
        self.document.has_section(&section_name(name))
    }

    /// Number of repository sections
    pub fn len(&self) -> usize {
        self.repo_names().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers a repository. `path` must already be absolute.
    pub fn add_repo(&mut self, name: &str, path: &Path) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::Validation(
                "Missing parameter 'name'".to_string(),
            ));
        }
        if !is_valid_name(name) {
            return Err(RegistryError::Validation(format!(
                "Invalid repository name '{}'",
                name.escape_debug()
            )));
        }
        if path.as_os_str().to_string_lossy().chars().any(char::is_control) {
            return Err(RegistryError::Validation(format!(
                "Invalid path '{}'",
                path.display().to_string().escape_debug()
            )));
        }
        if self.has_repo(name) {
            return Err(RegistryError::Conflict(format!(
                "Repository {} already exists in {}.",
                name,
                self.path.display()
            )));
        }

        self.document
            .ensure_section(&section_name(name))
            .set(keys::PATH, path.display().to_string());
        self.refresh_repo(name);
        Ok(())
    }

    pub fn remove_repo(&mut self, name: &str) -> Result<()> {
        if !self.document.remove_section(&section_name(name)) {
            return Err(RegistryError::Validation(format!(
                "Unknown repo '{}'",
                name
            )));
        }
        self.repositories.remove(name);
        self.rejected.remove(name);
        Ok(())
    }

    /// Fills in a missing port or secret. Returns true if anything changed.
    pub fn ensure_defaults(&mut self) -> bool {
        let section = self.document.ensure_section(config::CONFIG_SECTION);
        let mut changed = false;

        if !section.contains_key(config::IPC_PORT_KEY) {
            section.set(config::IPC_PORT_KEY, DEFAULT_IPC_PORT.to_string());
            changed = true;
        }

        if section.get(config::SECRET_KEY).is_none_or(|s| s.trim().is_empty()) {
            section.set(config::SECRET_KEY, uuid::Uuid::new_v4().to_string());
            changed = true;
        }

        if changed {
            // Only values written above can have changed, and both are valid
            if let Ok(config) =
                ControlConfig::from_section(self.document.section(config::CONFIG_SECTION))
            {
                self.config = config;
            }
        }

        changed
    }

    /// Serialized form written back to disk
    pub fn render(&self) -> String {
        self.document.render()
    }
}

/// Section name for a repository
pub fn section_name(name: &str) -> String {
    format!("repo '{}'", name)
}

/// A name must survive a write and re-read of its section header
fn is_valid_name(name: &str) -> bool {
    !name.chars().any(|c| c.is_control() || matches!(c, '\'' | '[' | ']'))
        && parse_section_name(&section_name(name)) == Some(name)
}

/// Extracts the repository name from a `repo '<name>'` section name
fn parse_section_name(section: &str) -> Option<&str> {
    let rest = section.trim().strip_prefix("repo")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let quoted = rest.trim_start();
    let name = quoted.strip_prefix('\'')?.strip_suffix('\'')?;
    if name.is_empty() || name.contains('\'') {
        return None;
    }
    Some(name)
}

/// Reads the `[repo]` section of a `.grony` file. A missing file yields no settings.
fn read_local_settings(path: &Path) -> std::result::Result<BTreeMap<String, String>, ConfigError> {
    if !path.is_file() {
        return Ok(BTreeMap::new());
    }

    let local_error = |reason: String| ConfigError::LocalFile {
        path: path.to_path_buf(),
        reason,
    };

    let text = std::fs::read_to_string(path).map_err(|e| local_error(e.to_string()))?;
    let document = IniDocument::parse(&text).map_err(|e| local_error(e.to_string()))?;

    Ok(document
        .section(LOCAL_SECTION)
        .map(|section| {
            section
                .entries()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .unwrap_or_default())
}
