use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Collection declared twice: {0}")]
    DuplicateCollection(String),

    #[error("Duplicate identifier '{key}' in collection '{collection}': {first} and {second}")]
    DuplicateIdentifier {
        collection: String,
        key: String,
        first: String,
        second: String,
    },

    #[error("Unresolved reference: {collection}/{key}")]
    ReferenceResolution { collection: String, key: String },

    #[error("Entry {collection}/{id} is a data entry and cannot be rendered")]
    NotRenderable { collection: String, id: String },

    #[error("Frontmatter error in {path}: {message}")]
    Frontmatter { path: String, message: String },

    #[error("Render error: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ContentError>;

/// A single shape mismatch found while validating a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Dotted field path, empty for the root value.
    pub path: String,
    pub expected: String,
    pub actual: String,
}

impl Issue {
    pub fn new(path: &str, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Issue {
            path: path.to_string(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "<root>" } else { &self.path };
        write!(f, "{path}: expected {}, got {}", self.expected, self.actual)
    }
}

/// An entry whose raw data did not match its collection's schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub collection: String,
    pub id: String,
    pub issues: Vec<Issue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Validation failed for {}/{}:",
            self.collection, self.id
        )?;
        for issue in &self.issues {
            write!(f, "\n  - {issue}")?;
        }
        Ok(())
    }
}
