// Discovery - enumerate the raw documents of each collection

use crate::document::{self, RawDocument};
use crate::error::Result;
use crate::schema::CollectionKind;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Supplies the raw documents of a collection, in a stable order.
///
/// The outer error fails the whole collection; an inner error belongs to the
/// one document that could not be read or parsed.
pub trait Discovery: Send + Sync {
    fn discover(&self, directory: &str, kind: CollectionKind) -> Result<Vec<Result<RawDocument>>>;
}

/// File extensions read for each collection flavor.
pub fn extensions(kind: CollectionKind) -> &'static [&'static str] {
    match kind {
        CollectionKind::Content => &["md", "mdx", "markdown"],
        CollectionKind::Data => &["yaml", "yml", "json"],
    }
}

/// Reads collections from `<root>/<directory>/**`.
///
/// Files and directories whose name starts with `_` are skipped.
#[derive(Debug, Clone)]
pub struct FsDiscovery {
    root: PathBuf,
}

impl FsDiscovery {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsDiscovery { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sorted document paths of one collection directory.
    pub fn list_files(&self, directory: &str, kind: CollectionKind) -> Result<Vec<PathBuf>> {
        let base_dir = self.root.join(directory);
        if !base_dir.exists() {
            log::debug!("Collection directory {} does not exist", base_dir.display());
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for ext in extensions(kind) {
            let pattern = format!("{}/**/*.{}", glob::Pattern::escape(&base_dir.to_string_lossy()), ext);
            files.extend(
                glob::glob(&pattern)?
                    .filter_map(|r| r.ok())
                    .filter(|p| p.is_file() && !is_ignored(&base_dir, p)),
            );
        }
        files.sort();
        Ok(files)
    }
}

impl Discovery for FsDiscovery {
    fn discover(&self, directory: &str, kind: CollectionKind) -> Result<Vec<Result<RawDocument>>> {
        let base_dir = self.root.join(directory);
        Ok(self
            .list_files(directory, kind)?
            .iter()
            .map(|path| {
                let rel_path = path
                    .strip_prefix(&base_dir)
                    .unwrap_or(path)
                    .to_string_lossy()
                    .replace('\\', "/");
                document::read_document(path, &rel_path)
            })
            .collect())
    }
}

fn is_ignored(base_dir: &Path, path: &Path) -> bool {
    path.strip_prefix(base_dir)
        .unwrap_or(path)
        .components()
        .any(|c| c.as_os_str().to_string_lossy().starts_with('_'))
}

/// In-memory discovery, for tests and for embedding pre-parsed documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryDiscovery {
    documents: HashMap<String, Vec<RawDocument>>,
}

impl MemoryDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a document to a collection directory. Insertion order is kept.
    pub fn add(&mut self, directory: &str, document: RawDocument) -> &mut Self {
        self.documents
            .entry(directory.to_string())
            .or_default()
            .push(document);
        self
    }
}

impl Discovery for MemoryDiscovery {
    fn discover(&self, directory: &str, kind: CollectionKind) -> Result<Vec<Result<RawDocument>>> {
        Ok(self
            .documents
            .get(directory)
            .map(|docs| {
                docs.iter()
                    .filter(|d| d.format.has_body() == (kind == CollectionKind::Content))
                    .cloned()
                    .map(Ok)
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SourceFormat;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn discover(root: &Path, directory: &str, kind: CollectionKind) -> Vec<RawDocument> {
        FsDiscovery::new(root)
            .discover(directory, kind)
            .unwrap()
            .into_iter()
            .collect::<Result<_>>()
            .unwrap()
    }

    #[test]
    fn test_fs_discovery_sorted_and_relative() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "projects/pass/index.md", "---\ntitle: Pass\n---\n");
        write(tmp.path(), "projects/check/index.md", "---\ntitle: Check\n---\n");
        write(tmp.path(), "projects/driver/index.mdx", "---\ntitle: Driver\n---\n");
        write(tmp.path(), "projects/notes.txt", "ignored");

        let docs = discover(tmp.path(), "projects", CollectionKind::Content);
        let paths: Vec<&str> = docs.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["check/index.md", "driver/index.mdx", "pass/index.md"]);
        assert_eq!(docs[1].format, SourceFormat::Mdx);
        assert_eq!(docs[0].data["title"], "Check");
    }

    #[test]
    fn test_fs_discovery_skips_underscored() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "blog/post.md", "Post");
        write(tmp.path(), "blog/_draft.md", "Draft");
        write(tmp.path(), "blog/_partials/intro.md", "Intro");

        let docs = discover(tmp.path(), "blog", CollectionKind::Content);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].path, "post.md");
    }

    #[test]
    fn test_fs_discovery_data_collection() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "authors/jane.yaml", "name: Jane\n");
        write(tmp.path(), "authors/joe.json", "{\"name\": \"Joe\"}");
        write(tmp.path(), "authors/readme.md", "not data");

        let docs = discover(tmp.path(), "authors", CollectionKind::Data);
        let paths: Vec<&str> = docs.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["jane.yaml", "joe.json"]);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        let docs = discover(tmp.path(), "nothing", CollectionKind::Content);
        assert!(docs.is_empty());
    }

    #[test]
    fn test_unparseable_document_fails_alone() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "blog/bad.md", "---\ntitle: [unclosed\n---\n");
        write(tmp.path(), "blog/good.md", "---\ntitle: Good\n---\n");

        let docs = FsDiscovery::new(tmp.path())
            .discover("blog", CollectionKind::Content)
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].is_err());
        assert_eq!(docs[1].as_ref().unwrap().path, "good.md");
    }
}
