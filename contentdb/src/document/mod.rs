// Document I/O - split markdown frontmatter, parse data files

use crate::error::{ContentError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Source format of a discovered document, taken from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Markdown,
    Mdx,
    Yaml,
    Json,
}

impl SourceFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "md" | "markdown" => Some(SourceFormat::Markdown),
            "mdx" => Some(SourceFormat::Mdx),
            "yaml" | "yml" => Some(SourceFormat::Yaml),
            "json" => Some(SourceFormat::Json),
            _ => None,
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Whether documents of this format carry a body (content collections).
    pub fn has_body(&self) -> bool {
        matches!(self, SourceFormat::Markdown | SourceFormat::Mdx)
    }
}

/// A document as handed over by discovery: path, untyped frontmatter, raw body.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    /// Path relative to the collection directory.
    pub path: String,
    pub format: SourceFormat,
    pub data: serde_json::Value,
    pub body: Option<String>,
}

impl RawDocument {
    pub fn content(path: &str, data: serde_json::Value, body: &str) -> Self {
        let format = SourceFormat::from_path(path).unwrap_or(SourceFormat::Markdown);
        RawDocument {
            path: path.to_string(),
            format,
            data,
            body: Some(body.to_string()),
        }
    }

    pub fn data(path: &str, data: serde_json::Value) -> Self {
        let format = SourceFormat::from_path(path).unwrap_or(SourceFormat::Yaml);
        RawDocument {
            path: path.to_string(),
            format,
            data,
            body: None,
        }
    }
}

/// Split a markdown source into its YAML frontmatter block and body.
///
/// The opening `---` must be the first line; the block ends at the next line
/// consisting solely of `---`. Returns `None` when there is no frontmatter.
pub fn split_frontmatter(source: &str) -> Option<(&str, &str)> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let rest = source
        .strip_prefix("---\r\n")
        .or_else(|| source.strip_prefix("---\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == "---" {
            let frontmatter = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((frontmatter, body));
        }
        offset += line.len();
    }
    None
}

/// Parse the text of a document into a [`RawDocument`].
pub fn parse_document(path: &str, source: &str) -> Result<RawDocument> {
    let format = SourceFormat::from_path(path).ok_or_else(|| ContentError::Frontmatter {
        path: path.to_string(),
        message: "unsupported file extension".into(),
    })?;

    let frontmatter_error = |message: String| ContentError::Frontmatter {
        path: path.to_string(),
        message,
    };

    match format {
        SourceFormat::Markdown | SourceFormat::Mdx => {
            let (data, body) = match split_frontmatter(source) {
                Some((fm, body)) => (parse_yaml_mapping(fm).map_err(frontmatter_error)?, body),
                None => (empty_mapping(), source),
            };
            Ok(RawDocument {
                path: path.to_string(),
                format,
                data,
                body: Some(body.to_string()),
            })
        }
        SourceFormat::Yaml => {
            let data = parse_yaml_mapping(source).map_err(frontmatter_error)?;
            Ok(RawDocument::data(path, data))
        }
        SourceFormat::Json => {
            let data: serde_json::Value =
                serde_json::from_str(source).map_err(|e| frontmatter_error(e.to_string()))?;
            Ok(RawDocument::data(path, data))
        }
    }
}

/// Read a document from disk. `rel_path` is recorded as the document path.
pub fn read_document(abs_path: &Path, rel_path: &str) -> Result<RawDocument> {
    let source = std::fs::read_to_string(abs_path)?;
    parse_document(rel_path, &source)
}

fn parse_yaml_mapping(source: &str) -> std::result::Result<serde_json::Value, String> {
    if source.trim().is_empty() {
        return Ok(empty_mapping());
    }
    let value: serde_json::Value = serde_yaml::from_str(source).map_err(|e| e.to_string())?;
    match value {
        serde_json::Value::Null => Ok(empty_mapping()),
        other => Ok(other),
    }
}

fn empty_mapping() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}
