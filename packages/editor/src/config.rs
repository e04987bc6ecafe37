use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::EditResult;
use ncd_parser::IdGenerator;

pub const DEFAULT_CONFIG_NAME: &str = "ncd.config.json";

/// What to do with a page whose navigation container cannot be located
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavPolicy {
    /// Leave the page untouched and report it
    #[default]
    Skip,
    /// Abort the whole propagation without modifying anything
    Fail,
}

/// Site editor configuration (`ncd.config.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,

    #[serde(default = "default_id_width")]
    pub id_width: usize,

    /// Key hashed into an id namespace (`ncd-1a2b3c4d-0001`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_namespace: Option<String>,

    /// Stylesheet that scoped style edits target
    #[serde(default = "default_stylesheet")]
    pub stylesheet: String,

    /// Registry and history location, relative to the site root
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    #[serde(default)]
    pub allow_style_on_text: bool,

    #[serde(default)]
    pub navigation_policy: NavPolicy,

    /// Append an empty scoped rule per injected identifier
    #[serde(default = "default_true")]
    pub scoped_css: bool,

    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_id_prefix() -> String {
    "ncd".to_string()
}

fn default_id_width() -> usize {
    4
}

fn default_stylesheet() -> String {
    "styles/main.css".to_string()
}

fn default_state_dir() -> String {
    ".ncd".to_string()
}

fn default_true() -> bool {
    true
}

fn default_history_limit() -> usize {
    50
}

impl EditorConfig {
    /// Load config from a site root, falling back to defaults
    pub fn load(root: &Path) -> EditResult<Self> {
        let config_path = root.join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(EditorConfig::default())
        }
    }

    pub fn state_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.state_dir)
    }

    /// Fresh generator for one generation run
    pub fn generator(&self) -> IdGenerator {
        let generator = IdGenerator::with_prefix(self.id_prefix.clone(), self.id_width);
        match &self.id_namespace {
            Some(key) => generator.namespaced(key),
            None => generator,
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            id_prefix: default_id_prefix(),
            id_width: default_id_width(),
            id_namespace: None,
            stylesheet: default_stylesheet(),
            state_dir: default_state_dir(),
            allow_style_on_text: false,
            navigation_policy: NavPolicy::Skip,
            scoped_css: true,
            history_limit: default_history_limit(),
        }
    }
}
