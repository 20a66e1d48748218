pub mod discovery;
pub mod document;
pub mod error;
pub mod ident;
pub mod query;
pub mod reference;
pub mod render;
pub mod schema;
pub mod store;
pub mod validation;
pub mod watcher;

pub use discovery::{Discovery, FsDiscovery, MemoryDiscovery};
pub use document::{RawDocument, SourceFormat};
pub use error::{ContentError, Issue, Result, ValidationError};
pub use reference::{EntryKey, Reference, ReferenceFactory};
pub use render::{CachedRenderer, Heading, MarkdownRenderer, Rendered, Renderer};
pub use schema::{CollectionKind, ContentConfig, SchemaRegistry, ValidationMode};
pub use store::{Entry, LoadOptions, LoadReport, Snapshot};
pub use validation::Validator;
pub use watcher::LiveSnapshot;
