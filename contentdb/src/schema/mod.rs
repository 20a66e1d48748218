mod parser;
mod registry;
mod types;

pub use parser::{parse_config, parse_config_str};
pub use registry::{CollectionDescriptor, SchemaRegistry};
pub use types::{
    CollectionDefinition, CollectionKind, ContentConfig, FieldDefinition, FieldType,
    ValidationMode,
};
