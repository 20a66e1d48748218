use crate::discovery::{Discovery, FsDiscovery};
use crate::document::{RawDocument, SourceFormat};
use crate::error::{ContentError, Issue, Result, ValidationError};
use crate::ident;
use crate::schema::{CollectionKind, ContentConfig, SchemaRegistry, ValidationMode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// One validated document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub id: String,
    /// Present for content collections only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub collection: String,
    pub data: serde_json::Value,
    /// Raw, unrendered body. Present for content collections only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip)]
    pub format: SourceFormat,
    /// Source path relative to the collection directory.
    #[serde(skip)]
    pub path: String,
}

impl Entry {
    pub fn is_content(&self) -> bool {
        self.slug.is_some()
    }

    /// Deserialize the validated data into a concrete type.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// Knobs for [`Snapshot::load`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    pub validation: ValidationMode,
}

/// Outcome of a load: how many entries made it in, which were rejected.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub loaded: BTreeMap<String, usize>,
    #[serde(serialize_with = "serialize_rejected")]
    pub rejected: Vec<ValidationError>,
}

impl LoadReport {
    pub fn total_loaded(&self) -> usize {
        self.loaded.values().sum()
    }

    pub fn total_rejected(&self) -> usize {
        self.rejected.len()
    }
}

fn serialize_rejected<S: serde::Serializer>(
    rejected: &[ValidationError],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let items: Vec<serde_json::Value> = rejected
        .iter()
        .map(|e| {
            serde_json::json!({
                "collection": e.collection,
                "id": e.id,
                "issues": e.issues.iter().map(|i| i.to_string()).collect::<Vec<_>>(),
            })
        })
        .collect();
    items.serialize(serializer)
}

/// Entries of one collection plus its lookup indexes.
#[derive(Debug, Default)]
struct CollectionEntries {
    kind: CollectionKind,
    entries: Vec<Entry>,
    by_id: HashMap<String, usize>,
    by_slug: HashMap<String, usize>,
    /// Source path of every id and slug seen, rejected documents included.
    claimed_ids: HashMap<String, String>,
    claimed_slugs: HashMap<String, String>,
}

/// The immutable, fully loaded and validated state of all collections.
#[derive(Debug)]
pub struct Snapshot {
    registry: SchemaRegistry,
    collections: BTreeMap<String, CollectionEntries>,
    report: LoadReport,
}

impl Snapshot {
    /// Discover, index and validate every declared collection.
    ///
    /// Collections are read in parallel; duplicate detection and validation
    /// then run in order on the calling thread. In lenient mode documents that
    /// fail to parse or validate are left out and reported; every other error
    /// aborts the load. Identifiers of rejected documents still count for
    /// duplicate detection.
    pub fn load(
        registry: SchemaRegistry,
        discovery: &dyn Discovery,
        options: LoadOptions,
    ) -> Result<Self> {
        let descriptors: Vec<_> = registry.collections().cloned().collect();
        let lenient = options.validation == ValidationMode::Lenient;

        let discovered: Vec<Result<Vec<Result<RawDocument>>>> = std::thread::scope(|scope| {
            let handles: Vec<_> = descriptors
                .iter()
                .map(|d| scope.spawn(move || discovery.discover(&d.directory, d.kind)))
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join().unwrap_or_else(|_| {
                        Err(ContentError::Other("discovery thread panicked".into()))
                    })
                })
                .collect()
        });

        let mut collections = BTreeMap::new();
        let mut report = LoadReport::default();

        for (descriptor, documents) in descriptors.iter().zip(discovered) {
            let documents = documents?;
            log::debug!(
                "Discovered {} documents in collection '{}'",
                documents.len(),
                descriptor.name
            );

            let mut index = CollectionEntries {
                kind: descriptor.kind,
                ..Default::default()
            };
            for document in documents {
                let doc = match document {
                    Ok(doc) => doc,
                    Err(ContentError::Frontmatter { path, message }) if lenient => {
                        let (id, slug) = identify(descriptor.kind, &path);
                        index.claim(&descriptor.name, &id, slug.as_deref(), &path)?;
                        let err = ValidationError {
                            collection: descriptor.name.clone(),
                            id,
                            issues: vec![Issue::new("", "parseable document", message)],
                        };
                        log::warn!("{err}");
                        report.rejected.push(err);
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                let (id, slug) = identify(descriptor.kind, &doc.path);
                index.claim(&descriptor.name, &id, slug.as_deref(), &doc.path)?;
                match build_entry(&registry, &descriptor.name, id, slug, doc) {
                    Ok(entry) => index.insert(entry),
                    Err(ContentError::Validation(err)) if lenient => {
                        log::warn!("{err}");
                        report.rejected.push(err);
                    }
                    Err(e) => return Err(e),
                }
            }

            report
                .loaded
                .insert(descriptor.name.clone(), index.entries.len());
            collections.insert(descriptor.name.clone(), index);
        }

        log::info!(
            "Loaded {} entries across {} collections ({} rejected)",
            report.total_loaded(),
            collections.len(),
            report.total_rejected()
        );

        Ok(Snapshot {
            registry,
            collections,
            report,
        })
    }

    /// Load from a parsed content.yaml using filesystem discovery under its root.
    pub fn from_config(config: &ContentConfig) -> Result<Self> {
        let registry = SchemaRegistry::from_config(config)?;
        let discovery = FsDiscovery::new(&config.root);
        Snapshot::load(
            registry,
            &discovery,
            LoadOptions {
                validation: config.validation,
            },
        )
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    /// Collection names in name order.
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn kind(&self, collection: &str) -> Option<CollectionKind> {
        self.collections.get(collection).map(|c| c.kind)
    }

    /// All entries of a collection in discovery order.
    pub fn all_entries(&self, collection: &str) -> Result<&[Entry]> {
        self.collections
            .get(collection)
            .map(|c| c.entries.as_slice())
            .ok_or_else(|| ContentError::UnknownCollection(collection.to_string()))
    }

    pub fn entry_by_id(&self, collection: &str, id: &str) -> Option<&Entry> {
        let c = self.collections.get(collection)?;
        c.by_id.get(id).map(|&i| &c.entries[i])
    }

    pub fn entry_by_slug(&self, collection: &str, slug: &str) -> Option<&Entry> {
        let c = self.collections.get(collection)?;
        c.by_slug.get(slug).map(|&i| &c.entries[i])
    }
}

impl CollectionEntries {
    /// Reserve a document's identifiers, failing on a collision.
    fn claim(&mut self, collection: &str, id: &str, slug: Option<&str>, path: &str) -> Result<()> {
        if let Some(first) = self.claimed_ids.get(id) {
            return Err(duplicate(collection, id, first, path));
        }
        if let Some(slug) = slug {
            if let Some(first) = self.claimed_slugs.get(slug) {
                return Err(duplicate(collection, slug, first, path));
            }
            self.claimed_slugs.insert(slug.to_string(), path.to_string());
        }
        self.claimed_ids.insert(id.to_string(), path.to_string());
        Ok(())
    }

    fn insert(&mut self, entry: Entry) {
        let position = self.entries.len();
        if let Some(slug) = &entry.slug {
            self.by_slug.insert(slug.clone(), position);
        }
        self.by_id.insert(entry.id.clone(), position);
        self.entries.push(entry);
    }
}

fn duplicate(collection: &str, key: &str, first: &str, second: &str) -> ContentError {
    ContentError::DuplicateIdentifier {
        collection: collection.to_string(),
        key: key.to_string(),
        first: first.to_string(),
        second: second.to_string(),
    }
}

/// Id and, for content collections, slug of a document path.
fn identify(kind: CollectionKind, path: &str) -> (String, Option<String>) {
    match kind {
        CollectionKind::Content => {
            let id = ident::content_id(path);
            let slug = ident::derive_slug(&id);
            (id, Some(slug))
        }
        CollectionKind::Data => (ident::data_id(path), None),
    }
}

fn build_entry(
    registry: &SchemaRegistry,
    collection: &str,
    id: String,
    slug: Option<String>,
    doc: RawDocument,
) -> Result<Entry> {
    let data = registry.validate(collection, &id, &doc.data)?;
    let body = slug.as_ref().map(|_| doc.body.unwrap_or_default());

    Ok(Entry {
        id,
        slug,
        collection: collection.to_string(),
        data,
        body,
        format: doc.format,
        path: doc.path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::MemoryDiscovery;
    use crate::validation::{object, string};
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.declare("work", CollectionKind::Content).unwrap();
        registry.declare("authors", CollectionKind::Data).unwrap();
        registry
            .register("work", object([("title", string())]))
            .unwrap();
        registry
    }

    fn work(path: &str, title: serde_json::Value) -> RawDocument {
        RawDocument::content(path, json!({ "title": title }), "Body")
    }

    #[test]
    fn test_load_derives_ids_and_slugs() {
        let mut discovery = MemoryDiscovery::new();
        discovery.add("work", work("belogit.md", json!("Belogit")));
        discovery.add("work", work("ghosthat/index.md", json!("Ghosthat")));
        discovery.add("authors", RawDocument::data("jane.yaml", json!({ "name": "Jane" })));

        let snapshot = Snapshot::load(registry(), &discovery, LoadOptions::default()).unwrap();

        let entries = snapshot.all_entries("work").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "belogit.md");
        assert_eq!(entries[0].slug.as_deref(), Some("belogit"));
        assert_eq!(entries[1].slug.as_deref(), Some("ghosthat"));
        assert_eq!(entries[1].body.as_deref(), Some("Body"));

        let jane = snapshot.entry_by_id("authors", "jane").unwrap();
        assert!(jane.slug.is_none());
        assert!(jane.body.is_none());
        assert!(!jane.is_content());
    }

    #[test]
    fn test_duplicate_id_aborts_load() {
        let mut discovery = MemoryDiscovery::new();
        discovery.add("work", work("belogit.md", json!("One")));
        discovery.add("work", work("./belogit.md", json!("Two")));

        let err = Snapshot::load(registry(), &discovery, LoadOptions::default()).unwrap_err();
        match err {
            ContentError::DuplicateIdentifier { collection, key, .. } => {
                assert_eq!(collection, "work");
                assert_eq!(key, "belogit.md");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_slug_aborts_load() {
        let mut discovery = MemoryDiscovery::new();
        discovery.add("work", work("check.md", json!("One")));
        discovery.add("work", work("check/index.md", json!("Two")));

        let err = Snapshot::load(registry(), &discovery, LoadOptions::default()).unwrap_err();
        assert!(matches!(err, ContentError::DuplicateIdentifier { key, .. } if key == "check"));
    }

    #[test]
    fn test_strict_mode_aborts_on_invalid_entry() {
        let mut discovery = MemoryDiscovery::new();
        discovery.add("work", work("good.md", json!("Good")));
        discovery.add("work", work("bad.md", json!(3)));

        let err = Snapshot::load(registry(), &discovery, LoadOptions::default()).unwrap_err();
        assert!(matches!(err, ContentError::Validation(v) if v.id == "bad.md"));
    }

    #[test]
    fn test_lenient_mode_skips_and_reports() {
        let mut discovery = MemoryDiscovery::new();
        discovery.add("work", work("good.md", json!("Good")));
        discovery.add("work", work("bad.md", json!(3)));

        let options = LoadOptions {
            validation: ValidationMode::Lenient,
        };
        let snapshot = Snapshot::load(registry(), &discovery, options).unwrap();

        assert_eq!(snapshot.all_entries("work").unwrap().len(), 1);
        assert_eq!(snapshot.report().loaded["work"], 1);
        assert_eq!(snapshot.report().total_rejected(), 1);
        assert_eq!(snapshot.report().rejected[0].id, "bad.md");
        assert!(snapshot.entry_by_slug("work", "bad").is_none());
    }

    #[test]
    fn test_lenient_mode_still_rejects_duplicate_of_invalid_entry() {
        let mut discovery = MemoryDiscovery::new();
        discovery.add("work", work("check.md", json!(1)));
        discovery.add("work", work("check/index.md", json!("Check")));

        let options = LoadOptions {
            validation: ValidationMode::Lenient,
        };
        let err = Snapshot::load(registry(), &discovery, options).unwrap_err();
        match err {
            ContentError::DuplicateIdentifier { key, first, second, .. } => {
                assert_eq!(key, "check");
                assert_eq!(first, "check.md");
                assert_eq!(second, "check/index.md");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unparseable_document_policy() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("work");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("good.md"), "---\ntitle: Good\n---\n").unwrap();
        std::fs::write(dir.join("bad.md"), "---\ntitle: [unclosed\n---\n").unwrap();
        let discovery = FsDiscovery::new(tmp.path());

        let err = Snapshot::load(registry(), &discovery, LoadOptions::default()).unwrap_err();
        assert!(matches!(err, ContentError::Frontmatter { path, .. } if path == "bad.md"));

        let options = LoadOptions {
            validation: ValidationMode::Lenient,
        };
        let snapshot = Snapshot::load(registry(), &discovery, options).unwrap();
        assert_eq!(snapshot.all_entries("work").unwrap().len(), 1);
        let rejected = &snapshot.report().rejected;
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].id, "bad.md");
        assert_eq!(rejected[0].issues[0].expected, "parseable document");
    }

    #[test]
    fn test_data_as() {
        #[derive(serde::Deserialize)]
        struct Work {
            title: String,
        }

        let mut discovery = MemoryDiscovery::new();
        discovery.add("work", work("belogit.md", json!("Belogit")));
        let snapshot = Snapshot::load(registry(), &discovery, LoadOptions::default()).unwrap();

        let typed: Work = snapshot
            .entry_by_slug("work", "belogit")
            .unwrap()
            .data_as()
            .unwrap();
        assert_eq!(typed.title, "Belogit");
    }

    #[test]
    fn test_unknown_collection() {
        let snapshot =
            Snapshot::load(registry(), &MemoryDiscovery::new(), LoadOptions::default()).unwrap();
        assert!(matches!(
            snapshot.all_entries("blog"),
            Err(ContentError::UnknownCollection(_))
        ));
        assert!(snapshot.all_entries("authors").unwrap().is_empty());
    }
}
