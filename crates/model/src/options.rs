use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::util::write_atomic;

/// Problems with static configuration detected before any tree is built.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("group choices must contain \"ungrouped\" with max level 0")]
    MissingUngrouped,
    #[error("group \"{0}\" is declared more than once")]
    DuplicateGroup(String),
    #[error("group choices are malformed: {0}")]
    MalformedChoices(String),
    #[error("required option `{0}` is not set")]
    MissingOption(&'static str),
}

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("failed to read layout options {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse layout options {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize layout options {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write layout options {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutOptions {
    #[serde(default)]
    pub collapsed: Vec<String>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub slugify_field_name: Option<String>,
    #[serde(default = "default_indentation")]
    pub indentation: f32,
    #[serde(default)]
    pub label_primary: Option<String>,
    #[serde(default)]
    pub label_secondary: Option<String>,
    #[serde(default)]
    pub meta_collection_name: Option<String>,
    #[serde(default)]
    pub status_indicator: Option<String>,
}

fn default_indentation() -> f32 {
    2.5
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            collapsed: Vec::new(),
            debug: false,
            slugify_field_name: None,
            indentation: default_indentation(),
            label_primary: None,
            label_secondary: None,
            meta_collection_name: None,
            status_indicator: None,
        }
    }
}

/// Options that must be set before a tree can be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredOptions<'a> {
    pub tree_collection: &'a str,
    pub slug_field: &'a str,
}

impl LayoutOptions {
    pub fn sanitize(&mut self) {
        for value in [
            &mut self.slugify_field_name,
            &mut self.label_primary,
            &mut self.label_secondary,
            &mut self.meta_collection_name,
            &mut self.status_indicator,
        ] {
            if value.as_deref().is_some_and(|text| text.trim().is_empty()) {
                *value = None;
            }
        }
        if !self.indentation.is_finite() || self.indentation <= 0.0 {
            self.indentation = default_indentation();
        }
        let mut seen = Vec::with_capacity(self.collapsed.len());
        self.collapsed.retain(|id| {
            if id.is_empty() || seen.contains(id) {
                return false;
            }
            seen.push(id.clone());
            true
        });
    }

    pub fn has_required(&self) -> bool {
        self.require().is_ok()
    }

    pub fn require(&self) -> Result<RequiredOptions<'_>, ConfigError> {
        let tree_collection = self
            .meta_collection_name
            .as_deref()
            .ok_or(ConfigError::MissingOption("metaCollectionName"))?;
        let slug_field = self
            .slugify_field_name
            .as_deref()
            .ok_or(ConfigError::MissingOption("slugifyFieldName"))?;
        Ok(RequiredOptions {
            tree_collection,
            slug_field,
        })
    }

    pub fn is_collapsed(&self, id: &str) -> bool {
        self.collapsed.iter().any(|candidate| candidate == id)
    }
}

/// Layout options persisted as a JSON document.
/// 以 JSON 檔案保存的版面選項。
#[derive(Debug)]
pub struct LayoutOptionsStore {
    path: PathBuf,
    data: LayoutOptions,
}

impl LayoutOptionsStore {
    pub fn new(path: impl Into<PathBuf>, options: LayoutOptions) -> Self {
        Self {
            path: path.into(),
            data: options,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Ok(Self {
                path,
                data: LayoutOptions::default(),
            });
        }
        let data = read_options(&path)?;
        Ok(Self { path, data })
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.data
    }

    pub fn update<F>(&mut self, op: F) -> Result<(), OptionsError>
    where
        F: FnOnce(&mut LayoutOptions),
    {
        op(&mut self.data);
        self.data.sanitize();
        self.save()
    }

    pub fn overwrite(&mut self, options: LayoutOptions) -> Result<(), OptionsError> {
        self.data = options;
        self.data.sanitize();
        self.save()
    }

    pub fn save(&self) -> Result<(), OptionsError> {
        write_options(&self.path, &self.data)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn export_to(&self, path: impl AsRef<Path>) -> Result<(), OptionsError> {
        write_options(path.as_ref(), &self.data)
    }

    pub fn import_from(&mut self, source: impl AsRef<Path>) -> Result<(), OptionsError> {
        self.data = read_options(source.as_ref())?;
        self.save()
    }
}

fn read_options(path: &Path) -> Result<LayoutOptions, OptionsError> {
    let contents = fs::read_to_string(path).map_err(|source| OptionsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut data: LayoutOptions =
        serde_json::from_str(&contents).map_err(|source| OptionsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    data.sanitize();
    Ok(data)
}

fn write_options(path: &Path, data: &LayoutOptions) -> Result<(), OptionsError> {
    let payload = serde_json::to_vec_pretty(data).map_err(|source| OptionsError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, &payload).map_err(|source| OptionsError::Write {
        path: path.to_path_buf(),
        source,
    })
}
