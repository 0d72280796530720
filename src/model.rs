//! Snapshot Model - Collections, Modes, Variables
//!
//! The host owns these; the engine only ever reads a snapshot.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub type CollectionId = String;
pub type VariableId = String;
pub type ModeId = String;

/// Global identity of a variable: (collection id, variable id).
///
/// Ordered by collection id first, then variable id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableKey {
    pub collection_id: CollectionId,
    pub variable_id: VariableId,
}

impl VariableKey {
    pub fn new(collection_id: impl Into<String>, variable_id: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            variable_id: variable_id.into(),
        }
    }
}

impl fmt::Display for VariableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.collection_id, self.variable_id)
    }
}

/// Layer classification. Primitive < Semantic < Theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    #[serde(alias = "Primitive")]
    Primitive,
    #[serde(alias = "Semantic")]
    Semantic,
    #[serde(alias = "Theme")]
    Theme,
}

impl Layer {
    /// The only layer this one may alias into, if any.
    pub fn alias_target(self) -> Option<Layer> {
        match self {
            Layer::Primitive => None,
            Layer::Semantic => Some(Layer::Primitive),
            Layer::Theme => Some(Layer::Semantic),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Layer::Primitive => "Primitive",
            Layer::Semantic => "Semantic",
            Layer::Theme => "Theme",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableMode {
    pub id: ModeId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VariableValue {
    Color {
        value: String,
    },
    Alias {
        #[serde(rename = "collectionId", default, skip_serializing_if = "Option::is_none")]
        collection_id: Option<CollectionId>,
        #[serde(rename = "variableId")]
        variable_id: VariableId,
    },
}

impl VariableValue {
    pub fn color(hex: impl Into<String>) -> Self {
        VariableValue::Color { value: hex.into() }
    }

    pub fn alias(collection_id: impl Into<String>, variable_id: impl Into<String>) -> Self {
        VariableValue::Alias {
            collection_id: Some(collection_id.into()),
            variable_id: variable_id.into(),
        }
    }

    /// Alias into the owning collection.
    pub fn local_alias(variable_id: impl Into<String>) -> Self {
        VariableValue::Alias {
            collection_id: None,
            variable_id: variable_id.into(),
        }
    }

    pub fn is_alias(&self) -> bool {
        matches!(self, VariableValue::Alias { .. })
    }

    /// Resolve an alias to a global key. A missing collection id means the owner.
    pub fn alias_target(&self, owning_collection: &str) -> Option<VariableKey> {
        match self {
            VariableValue::Alias { collection_id, variable_id } => Some(VariableKey::new(
                collection_id.as_deref().unwrap_or(owning_collection),
                variable_id.as_str(),
            )),
            VariableValue::Color { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub id: VariableId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_syntax: Option<String>,
    #[serde(default)]
    pub values_by_mode: BTreeMap<ModeId, VariableValue>,
}

impl Variable {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            scopes: None,
            code_syntax: None,
            values_by_mode: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, mode_id: impl Into<String>, value: VariableValue) -> Self {
        self.values_by_mode.insert(mode_id.into(), value);
        self
    }

    /// Alias values in mode-id order.
    pub fn aliases(&self) -> impl Iterator<Item = (&ModeId, &VariableValue)> {
        self.values_by_mode.iter().filter(|(_, v)| v.is_alias())
    }

    pub fn has_aliases(&self) -> bool {
        self.values_by_mode.values().any(VariableValue::is_alias)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionNode {
    pub id: CollectionId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<Layer>,
    #[serde(default)]
    pub modes: Vec<VariableMode>,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

impl CollectionNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>, layer: Option<Layer>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: None,
            layer,
            modes: vec![],
            variables: vec![],
        }
    }

    pub fn with_mode(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.modes.push(VariableMode { id: id.into(), name: name.into() });
        self
    }

    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn variable(&self, id: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.id == id)
    }

    pub fn key_for(&self, variable: &Variable) -> VariableKey {
        VariableKey::new(self.id.as_str(), variable.id.as_str())
    }
}

/// Look up a variable anywhere in a snapshot.
pub fn find_variable<'a>(
    collections: &'a [CollectionNode],
    key: &VariableKey,
) -> Option<(&'a CollectionNode, &'a Variable)> {
    let collection = collections.iter().find(|c| c.id == key.collection_id)?;
    let variable = collection.variable(&key.variable_id)?;
    Some((collection, variable))
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}

/// On-disk snapshot: either a bare list of collections or a versioned envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Versioned {
        #[serde(rename = "engineMinVersion", default)]
        engine_min_version: Option<String>,
        collections: Vec<CollectionNode>,
    },
    Bare(Vec<CollectionNode>),
}

/// Ordered, read-only snapshot of all collections.
#[derive(Debug, Clone, Default)]
pub struct CollectionSet {
    collections: Vec<CollectionNode>,
    index: HashMap<CollectionId, usize>,
    engine_min_version: Option<String>,
}

impl CollectionSet {
    pub fn new(collections: Vec<CollectionNode>) -> Self {
        let mut set = Self::default();
        for collection in collections {
            set.register(collection);
        }
        set
    }

    pub fn from_json(content: &str) -> Result<Self, SnapshotError> {
        let file: SnapshotFile = serde_json::from_str(content)?;
        Ok(match file {
            SnapshotFile::Versioned { engine_min_version, collections } => {
                let mut set = Self::new(collections);
                set.engine_min_version = engine_min_version;
                set
            }
            SnapshotFile::Bare(collections) => Self::new(collections),
        })
    }

    pub fn load_from_file(path: &Path) -> Result<Self, SnapshotError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// One collection per `*.json` file, read in file-name order.
    pub fn load_from_dir(dir: &Path) -> Result<Self, SnapshotError> {
        let mut set = Self::new(vec![]);
        if !dir.exists() {
            return Ok(set);
        }

        let mut paths = vec![];
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |e| e == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            let parsed = fs::read_to_string(&path)
                .map_err(SnapshotError::from)
                .and_then(|content| Ok(serde_json::from_str::<CollectionNode>(&content)?));
            match parsed {
                Ok(collection) => set.register(collection),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping collection file"),
            }
        }
        Ok(set)
    }

    /// Later registrations replace an earlier collection with the same id in place.
    pub fn register(&mut self, collection: CollectionNode) {
        match self.index.get(&collection.id) {
            Some(&pos) => self.collections[pos] = collection,
            None => {
                self.index.insert(collection.id.clone(), self.collections.len());
                self.collections.push(collection);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&CollectionNode> {
        self.index.get(id).map(|&pos| &self.collections[pos])
    }

    pub fn list(&self) -> Vec<&CollectionNode> {
        self.collections.iter().collect()
    }

    pub fn as_slice(&self) -> &[CollectionNode] {
        &self.collections
    }

    pub fn engine_min_version(&self) -> Option<&str> {
        self.engine_min_version.as_deref()
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}
