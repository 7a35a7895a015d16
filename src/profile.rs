use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_MODEL_NAME: &str = "ibm-granite";
pub const DEFAULT_MODEL_ID: &str = "ibm-granite/granite-3.3-8b-instruct";

/// One model entry in the profile's `models` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    /// Name of the input field the model reads the prompt from.
    #[serde(default = "default_input_key")]
    pub input_key: String,
}

fn default_input_key() -> String {
    "prompt".into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_save_path")]
    pub save_path: PathBuf,
    #[serde(default = "default_active_model")]
    pub active_model: String,
    #[serde(default = "default_models")]
    pub models: BTreeMap<String, ModelConfig>,
}

fn default_username() -> String {
    "anonymous".into()
}
fn default_save_path() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
fn default_active_model() -> String {
    DEFAULT_MODEL_NAME.into()
}
fn default_models() -> BTreeMap<String, ModelConfig> {
    let mut models = BTreeMap::new();
    models.insert(
        DEFAULT_MODEL_NAME.to_string(),
        ModelConfig {
            id: DEFAULT_MODEL_ID.into(),
            input_key: default_input_key(),
        },
    );
    models
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            username: default_username(),
            save_path: default_save_path(),
            active_model: default_active_model(),
            models: default_models(),
        }
    }
}

impl Profile {
    pub fn active_model_config(&self) -> Result<&ModelConfig> {
        self.models.get(&self.active_model).ok_or_else(|| {
            Error::profile(format!(
                "Configuration for active model '{}' not found.",
                self.active_model
            ))
        })
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        if !self.models.contains_key(name) {
            return Err(Error::profile(format!(
                "Error: Model '{name}' not found in configuration."
            )));
        }
        self.active_model = name.to_string();
        Ok(())
    }

    /// Adds or replaces a model entry.
    pub fn add_model(&mut self, name: &str, id: &str, input_key: Option<&str>) -> Result<()> {
        crate::replicate::ModelRef::parse(id)?;
        self.models.insert(
            name.to_string(),
            ModelConfig {
                id: id.trim().to_string(),
                input_key: input_key
                    .map(str::to_string)
                    .unwrap_or_else(default_input_key),
            },
        );
        Ok(())
    }

    pub fn remove_model(&mut self, name: &str) -> Result<ModelConfig> {
        if name == self.active_model {
            return Err(Error::profile(format!(
                "Error: '{name}' is the active model. Switch with /set first."
            )));
        }
        self.models
            .remove(name)
            .ok_or_else(|| Error::profile(format!("Error: Model '{name}' not found in configuration.")))
    }
}

/// Reads and writes the profile JSON file.
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when the file is missing or cannot be parsed; setup runs again in both cases.
    pub fn read(&self) -> Option<Profile> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(path = %self.path.display(), "ignoring unreadable profile: {e}");
                None
            }
        }
    }

    pub fn write(&self, profile: &Profile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(profile)
            .map_err(|e| Error::parse(format!("serialize profile: {e}")))?;
        std::fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), "profile written");
        Ok(())
    }

    /// Succeeds when the file is already gone.
    pub fn delete(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
