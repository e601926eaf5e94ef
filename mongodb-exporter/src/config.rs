use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors that could occur while loading the module configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read module configuration from {}: {source}", path.display())]
    Read {
        /// Path the read was attempted from.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The configuration file could not be deserialized.
    #[error("failed to parse module configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Two entries in the `module` sequence share a name.
    #[error("duplicate module name in configuration: {0}")]
    DuplicateModule(String),
}

impl ConfigError {
    /// Whether this error means the configuration file was simply absent or
    /// unreadable, as opposed to present but invalid.
    pub fn is_read(&self) -> bool {
        matches!(self, ConfigError::Read { .. })
    }
}

/// A named credential set, selected by scrape requests to target a specific
/// monitored instance.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct ModuleCredential {
    /// Module name, matched case-sensitively against the `module` query
    /// parameter.
    pub name: String,
    /// Username interpolated into the resolved connection target.
    pub user: String,
    /// Password interpolated into the resolved connection target.
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default, rename = "module")]
    modules: Vec<ModuleCredential>,
}

/// Read-only mapping from module name to credential pair, built once at
/// process start and shared across all concurrent scrapes.
#[derive(Clone, Debug, Default)]
pub struct ModuleRegistry {
    modules: Vec<ModuleCredential>,
}

impl ModuleRegistry {
    /// Builds a registry from an already-deserialized module sequence.
    ///
    /// Module names must be unique: a silently shadowed duplicate would make
    /// credential resolution ambiguous, so duplicates are rejected here
    /// rather than masked by first-match lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if two modules share a name.
    pub fn from_modules(modules: Vec<ModuleCredential>) -> Result<Self, ConfigError> {
        for (i, module) in modules.iter().enumerate() {
            if modules[..i].iter().any(|seen| seen.name == module.name) {
                return Err(ConfigError::DuplicateModule(module.name.clone()));
            }
        }

        Ok(ModuleRegistry { modules })
    }

    /// Loads and validates the module configuration from a YAML file of the
    /// shape `module: [{name, user, password}, ...]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if two
    /// modules share a name.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_owned(), source })?;
        let raw: RawConfig = serde_yaml::from_str(&data)?;

        Self::from_modules(raw.modules)
    }

    /// Looks up a module by name.
    ///
    /// Linear scan returning the first entry whose name equals the input
    /// exactly. No side effects; safe for unbounded concurrent calls.
    pub fn lookup(&self, module_name: &str) -> Option<&ModuleCredential> {
        self.modules.iter().find(|module| module.name == module_name)
    }

    /// Returns the number of configured modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether no modules are configured.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
