//! Typed pointers between entries and their lazy resolution.
//!
//! A [`Reference`] is produced while validating a field declared with
//! [`SchemaRegistry::reference`](crate::schema::SchemaRegistry::reference).
//! Only the shape of the slug or id is checked at that point; whether the
//! target exists is answered by [`Snapshot::resolve`].

use crate::error::{ContentError, Issue, Result};
use crate::ident;
use crate::schema::CollectionKind;
use crate::store::{Entry, Snapshot};
use crate::validation::{type_name, Validator};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a reference addresses its target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKey {
    Slug(String),
    Id(String),
}

impl EntryKey {
    pub fn as_str(&self) -> &str {
        match self {
            EntryKey::Slug(s) | EntryKey::Id(s) => s,
        }
    }
}

/// `{collection, slug}` for content collections, `{collection, id}` for data collections.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub collection: String,
    #[serde(flatten)]
    pub key: EntryKey,
}

impl Reference {
    pub fn slug(collection: impl Into<String>, slug: impl Into<String>) -> Self {
        Reference {
            collection: collection.into(),
            key: EntryKey::Slug(slug.into()),
        }
    }

    pub fn id(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Reference {
            collection: collection.into(),
            key: EntryKey::Id(id.into()),
        }
    }

    /// Read a stored reference back out of validated entry data.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    pub fn to_value(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("collection".into(), self.collection.clone().into());
        let (field, key) = match &self.key {
            EntryKey::Slug(s) => ("slug", s),
            EntryKey::Id(i) => ("id", i),
        };
        map.insert(field.into(), key.clone().into());
        serde_json::Value::Object(map)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.key.as_str())
    }
}

/// Builds references into one collection from raw slug or id strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceFactory {
    collection: String,
    kind: CollectionKind,
}

impl ReferenceFactory {
    pub fn new(collection: &str, kind: CollectionKind) -> Self {
        ReferenceFactory {
            collection: collection.to_string(),
            kind,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Wrap `raw` as a reference after checking it is a well-formed identifier.
    /// The target is not looked up.
    pub fn make(&self, raw: &str) -> std::result::Result<Reference, Issue> {
        ident::check_identifier(raw).map_err(|problem| {
            Issue::new(
                "",
                format!("{} identifier", self.collection),
                format!("'{raw}' ({problem})"),
            )
        })?;
        Ok(match self.kind {
            CollectionKind::Content => Reference::slug(&self.collection, raw),
            CollectionKind::Data => Reference::id(&self.collection, raw),
        })
    }

    /// The validator form, for use inside collection schemas.
    ///
    /// Accepts a slug/id string, or an already-formed reference into the same
    /// collection so that validating twice gives the same result.
    pub fn validator(&self) -> Validator {
        let factory = self.clone();
        let expected = format!("reference to {}", self.collection);
        Validator::new(expected.clone(), move |value, path| {
            let reference = match value {
                serde_json::Value::String(raw) => factory.make(raw).map_err(|mut issue| {
                    issue.path = path.to_string();
                    vec![issue]
                })?,
                serde_json::Value::Object(_) => match Reference::from_value(value) {
                    Some(r) if factory.accepts(&r) => r,
                    _ => return Err(vec![Issue::new(path, expected.clone(), "object")]),
                },
                other => return Err(vec![Issue::new(path, expected.clone(), type_name(other))]),
            };
            Ok(reference.to_value())
        })
    }

    fn accepts(&self, reference: &Reference) -> bool {
        let key_matches = matches!(
            (&reference.key, self.kind),
            (EntryKey::Slug(_), CollectionKind::Content) | (EntryKey::Id(_), CollectionKind::Data)
        );
        reference.collection == self.collection
            && key_matches
            && ident::check_identifier(reference.key.as_str()).is_ok()
    }
}

impl Snapshot {
    /// Resolve a reference to its entry: slug lookup for slug keys, id lookup
    /// for id keys.
    pub fn resolve(&self, reference: &Reference) -> Result<&Entry> {
        self.lookup(reference)
            .ok_or_else(|| ContentError::ReferenceResolution {
                collection: reference.collection.clone(),
                key: reference.key.as_str().to_string(),
            })
    }

    /// Resolve every reference in order. Fails as a whole on the first
    /// unresolved reference.
    pub fn resolve_all(&self, references: &[Reference]) -> Result<Vec<&Entry>> {
        references.iter().map(|r| self.resolve(r)).collect()
    }

    pub(crate) fn lookup(&self, reference: &Reference) -> Option<&Entry> {
        match &reference.key {
            EntryKey::Slug(slug) => self.entry_by_slug(&reference.collection, slug),
            EntryKey::Id(id) => self.entry_by_id(&reference.collection, id),
        }
    }
}

impl Entry {
    /// The reference stored in data field `field`, if it holds one.
    pub fn reference(&self, field: &str) -> Option<Reference> {
        self.data.get(field).and_then(Reference::from_value)
    }

    /// The references stored in list field `field`. Non-reference items are skipped.
    pub fn references(&self, field: &str) -> Vec<Reference> {
        self.data
            .get(field)
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(Reference::from_value).collect())
            .unwrap_or_default()
    }
}
