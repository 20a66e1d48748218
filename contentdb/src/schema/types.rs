use crate::validation::UnknownKeys;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Top-level configuration parsed from content.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Directory holding one sub-directory per collection.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default)]
    pub validation: ValidationMode,
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionDefinition>,
}

fn default_root() -> PathBuf {
    PathBuf::from("src/content")
}

impl Default for ContentConfig {
    fn default() -> Self {
        ContentConfig {
            root: default_root(),
            validation: ValidationMode::default(),
            collections: BTreeMap::new(),
        }
    }
}

/// What a load does with an entry that fails its schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Abort the whole load on the first invalid entry.
    #[default]
    Strict,
    /// Skip invalid entries and record them in the load report.
    Lenient,
}

/// Content collections carry a slug, a body and can be rendered; data
/// collections are keyed by id only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    #[default]
    Content,
    Data,
}

/// Definition of a single collection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionDefinition {
    #[serde(rename = "type", default)]
    pub kind: CollectionKind,
    /// Field shapes. A collection without a schema keeps its raw data.
    #[serde(default)]
    pub schema: Option<BTreeMap<String, FieldDefinition>>,
    #[serde(default)]
    pub unknown_keys: UnknownKeys,
    /// Directory under the content root, defaults to the collection name.
    #[serde(default)]
    pub directory: Option<String>,
}

/// Definition of a single field in a collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(rename = "enum", default)]
    pub enum_values: Option<Vec<String>>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    /// Target collection of a `reference` field.
    #[serde(default)]
    pub collection: Option<String>,
    /// Item shape of a `list` field.
    #[serde(default)]
    pub items: Option<Box<FieldDefinition>>,
    /// Nested fields of an `object` field.
    #[serde(default)]
    pub fields: Option<BTreeMap<String, FieldDefinition>>,
    #[serde(default)]
    pub unknown_keys: UnknownKeys,
}

/// Field type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Date,
    List,
    Object,
    Reference,
    Any,
}
