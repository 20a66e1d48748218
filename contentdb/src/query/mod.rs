//! Read operations over a loaded [`Snapshot`].
//!
//! Two lookup forms exist. The `get_*` operations return `Option` and are
//! meant for keys of unknown provenance (user input, URL segments): a missing
//! entry is a normal outcome. [`Snapshot::require_entry`] and
//! [`Snapshot::get_entries`] are for keys the caller knows to exist, so a
//! missing entry is an error.

use crate::error::Result;
use crate::reference::{Reference, ReferenceFactory};
use crate::store::{Entry, Snapshot};

impl Snapshot {
    /// All entries of `collection`, in discovery order.
    pub fn get_collection(&self, collection: &str) -> Result<Vec<&Entry>> {
        Ok(self.all_entries(collection)?.iter().collect())
    }

    /// Entries of `collection` for which `predicate` holds, in discovery order.
    pub fn get_collection_where<P>(&self, collection: &str, predicate: P) -> Result<Vec<&Entry>>
    where
        P: Fn(&Entry) -> bool,
    {
        Ok(self
            .all_entries(collection)?
            .iter()
            .filter(|e| predicate(e))
            .collect())
    }

    /// Look up an entry by `{collection, slug}` or `{collection, id}`.
    pub fn get_entry(&self, key: &Reference) -> Option<&Entry> {
        self.lookup(key)
    }

    /// Content entry by slug.
    pub fn get_entry_by_slug(&self, collection: &str, slug: &str) -> Option<&Entry> {
        self.entry_by_slug(collection, slug)
    }

    /// Data entry by id.
    pub fn get_data_entry_by_id(&self, collection: &str, id: &str) -> Option<&Entry> {
        self.entry_by_id(collection, id)
    }

    /// Like [`get_entry`](Self::get_entry), for keys known to exist.
    pub fn require_entry(&self, key: &Reference) -> Result<&Entry> {
        self.resolve(key)
    }

    /// Entries for `keys`, in the same order. Fails as a whole if any is missing.
    pub fn get_entries(&self, keys: &[Reference]) -> Result<Vec<&Entry>> {
        self.resolve_all(keys)
    }

    /// The reference constructor for `collection`.
    pub fn reference(&self, collection: &str) -> Result<ReferenceFactory> {
        self.registry().reference_factory(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::MemoryDiscovery;
    use crate::document::RawDocument;
    use crate::error::ContentError;
    use crate::schema::{CollectionKind, SchemaRegistry};
    use crate::store::LoadOptions;
    use crate::validation::{array, boolean, object, string};
    use serde_json::json;

    fn snapshot() -> Snapshot {
        let mut registry = SchemaRegistry::new();
        registry.declare("work", CollectionKind::Content).unwrap();
        registry.declare("blog", CollectionKind::Content).unwrap();
        registry.declare("authors", CollectionKind::Data).unwrap();

        let author = registry.reference("authors").unwrap();
        let related = registry.reference("work").unwrap();
        registry
            .register(
                "blog",
                object([
                    ("title", string()),
                    ("author", author),
                    ("related", array(related).default(json!([]))),
                ]),
            )
            .unwrap();
        registry
            .register(
                "work",
                object([("company", string()), ("current", boolean().default(json!(false)))]),
            )
            .unwrap();

        let mut discovery = MemoryDiscovery::new();
        for (path, company, current) in [
            ("belogit.md", "Belogit", false),
            ("ghosthat.md", "Ghosthat", false),
            ("globant.md", "Globant", false),
            ("urbetrack.md", "Urbetrack", true),
            ("witbor.md", "Witbor", false),
        ] {
            discovery.add(
                "work",
                RawDocument::content(path, json!({ "company": company, "current": current }), ""),
            );
        }
        discovery.add("authors", RawDocument::data("marcos.yaml", json!({ "name": "Marcos" })));
        discovery.add(
            "blog",
            RawDocument::content(
                "offline-first-mobile-apps/index.md",
                json!({
                    "title": "Offline first",
                    "author": "marcos",
                    "related": ["urbetrack", "belogit"],
                }),
                "# Offline first\n",
            ),
        );
        discovery.add(
            "blog",
            RawDocument::content(
                "dangling.md",
                json!({ "title": "Dangling", "author": "nobody", "related": ["belogit", "missing"] }),
                "",
            ),
        );

        Snapshot::load(registry, &discovery, LoadOptions::default()).unwrap()
    }

    fn slugs(entries: &[&Entry]) -> Vec<String> {
        entries.iter().filter_map(|e| e.slug.clone()).collect()
    }

    #[test]
    fn test_get_collection_keeps_discovery_order() {
        let snapshot = snapshot();
        let work = snapshot.get_collection("work").unwrap();
        assert_eq!(
            slugs(&work),
            vec!["belogit", "ghosthat", "globant", "urbetrack", "witbor"]
        );
    }

    #[test]
    fn test_filter_is_a_stable_subsequence() {
        let snapshot = snapshot();
        let all = snapshot.get_collection("work").unwrap();
        let filtered = snapshot
            .get_collection_where("work", |e| e.data["company"].as_str().unwrap() > "G")
            .unwrap();
        let expected: Vec<&Entry> = all
            .iter()
            .copied()
            .filter(|e| e.data["company"].as_str().unwrap() > "G")
            .collect();
        assert_eq!(filtered, expected);
        assert_eq!(slugs(&filtered), vec!["ghosthat", "globant", "urbetrack", "witbor"]);
    }

    #[test]
    fn test_get_entry_matches_bulk_query() {
        let snapshot = snapshot();
        let single = snapshot.get_entry(&Reference::slug("work", "globant")).unwrap();
        let from_bulk = snapshot
            .get_collection_where("work", |e| e.slug.as_deref() == Some("globant"))
            .unwrap();
        assert_eq!(from_bulk, vec![single]);
        assert_eq!(snapshot.get_entry_by_slug("work", "globant"), Some(single));
    }

    #[test]
    fn test_not_found_is_none() {
        let snapshot = snapshot();
        assert!(snapshot.get_entry(&Reference::slug("work", "nonexistent")).is_none());
        assert!(snapshot.get_entry(&Reference::slug("nope", "belogit")).is_none());
        assert!(snapshot.get_data_entry_by_id("authors", "nobody").is_none());
        assert!(snapshot.get_data_entry_by_id("authors", "marcos").is_some());
    }

    #[test]
    fn test_get_entry_by_id_on_content_collection() {
        let snapshot = snapshot();
        let entry = snapshot.get_entry(&Reference::id("work", "witbor.md")).unwrap();
        assert_eq!(entry.slug.as_deref(), Some("witbor"));
    }

    #[test]
    fn test_unknown_collection_is_an_error() {
        let snapshot = snapshot();
        assert!(matches!(
            snapshot.get_collection("projects"),
            Err(ContentError::UnknownCollection(_))
        ));
        assert!(snapshot.reference("projects").is_err());
    }

    #[test]
    fn test_reference_round_trip() {
        let snapshot = snapshot();
        let reference = snapshot.reference("work").unwrap().make("belogit").unwrap();
        let resolved = snapshot.resolve(&reference).unwrap();
        assert_eq!(
            Some(resolved),
            snapshot.get_entry(&Reference::slug("work", "belogit"))
        );
    }

    #[test]
    fn test_stored_references_resolve() {
        let snapshot = snapshot();
        let post = snapshot
            .get_entry_by_slug("blog", "offline-first-mobile-apps")
            .unwrap();

        let author = snapshot.resolve(&post.reference("author").unwrap()).unwrap();
        assert_eq!(author.id, "marcos");

        let related = snapshot.get_entries(&post.references("related")).unwrap();
        assert_eq!(slugs(&related), vec!["urbetrack", "belogit"]);
    }

    #[test]
    fn test_unresolved_reference_is_reported_lazily() {
        // The dangling post loaded fine: existence is only checked on resolve
        let snapshot = snapshot();
        let post = snapshot.get_entry_by_slug("blog", "dangling").unwrap();

        let err = snapshot.resolve(&post.reference("author").unwrap()).unwrap_err();
        assert!(matches!(
            err,
            ContentError::ReferenceResolution { ref collection, ref key }
                if collection == "authors" && key == "nobody"
        ));
    }

    #[test]
    fn test_get_entries_is_all_or_nothing() {
        let snapshot = snapshot();
        let ok = snapshot
            .get_entries(&[
                Reference::slug("work", "witbor"),
                Reference::slug("work", "belogit"),
                Reference::id("authors", "marcos"),
            ])
            .unwrap();
        assert_eq!(ok.len(), 3);
        assert_eq!(ok[0].slug.as_deref(), Some("witbor"));
        assert_eq!(ok[2].id, "marcos");

        let post = snapshot.get_entry_by_slug("blog", "dangling").unwrap();
        assert!(snapshot.get_entries(&post.references("related")).is_err());
        assert!(snapshot
            .require_entry(&Reference::slug("work", "missing"))
            .is_err());
    }
}
