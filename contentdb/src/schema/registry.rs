use super::types::{CollectionKind, ContentConfig, FieldDefinition, FieldType};
use crate::error::{ContentError, Result, ValidationError};
use crate::reference::ReferenceFactory;
use crate::validation::{self, Validator};
use regex::Regex;
use std::collections::BTreeMap;

/// A collection known to the registry: its flavor and optional schema.
#[derive(Debug, Clone)]
pub struct CollectionDescriptor {
    pub name: String,
    pub kind: CollectionKind,
    pub directory: String,
    pub schema: Option<Validator>,
}

/// The closed set of collections and the validators attached to them.
///
/// Collections are declared first, then schemas are registered. Reference
/// validators can only target declared collections.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    collections: BTreeMap<String, CollectionDescriptor>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a collection stored in the directory of the same name.
    pub fn declare(&mut self, name: &str, kind: CollectionKind) -> Result<()> {
        self.declare_in(name, kind, name)
    }

    /// Declare a collection stored in `directory` under the content root.
    pub fn declare_in(&mut self, name: &str, kind: CollectionKind, directory: &str) -> Result<()> {
        if self.collections.contains_key(name) {
            return Err(ContentError::DuplicateCollection(name.to_string()));
        }
        self.collections.insert(
            name.to_string(),
            CollectionDescriptor {
                name: name.to_string(),
                kind,
                directory: directory.to_string(),
                schema: None,
            },
        );
        Ok(())
    }

    /// Attach a schema to a declared collection. A schema is registered once.
    pub fn register(&mut self, name: &str, schema: Validator) -> Result<()> {
        let descriptor = self
            .collections
            .get_mut(name)
            .ok_or_else(|| ContentError::UnknownCollection(name.to_string()))?;
        if descriptor.schema.is_some() {
            return Err(ContentError::Schema(format!(
                "Collection '{name}' already has a schema"
            )));
        }
        descriptor.schema = Some(schema);
        Ok(())
    }

    /// Validate one entry's raw data against its collection's schema.
    /// Collections without a schema return the data unchanged.
    pub fn validate(
        &self,
        name: &str,
        id: &str,
        raw: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let descriptor = self.descriptor(name)?;
        match &descriptor.schema {
            None => Ok(raw.clone()),
            Some(schema) => schema.validate(raw).map_err(|issues| {
                ContentError::Validation(ValidationError {
                    collection: name.to_string(),
                    id: id.to_string(),
                    issues,
                })
            }),
        }
    }

    pub fn descriptor(&self, name: &str) -> Result<&CollectionDescriptor> {
        self.collections
            .get(name)
            .ok_or_else(|| ContentError::UnknownCollection(name.to_string()))
    }

    pub fn kind(&self, name: &str) -> Option<CollectionKind> {
        self.collections.get(name).map(|d| d.kind)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    /// Declared collections in name order.
    pub fn collections(&self) -> impl Iterator<Item = &CollectionDescriptor> {
        self.collections.values()
    }

    /// The reference constructor for `name`.
    pub fn reference_factory(&self, name: &str) -> Result<ReferenceFactory> {
        let descriptor = self.descriptor(name)?;
        Ok(ReferenceFactory::new(&descriptor.name, descriptor.kind))
    }

    /// A validator turning a slug or id string into a reference to `name`.
    pub fn reference(&self, name: &str) -> Result<Validator> {
        Ok(self.reference_factory(name)?.validator())
    }

    /// Build a registry from a parsed content.yaml.
    pub fn from_config(config: &ContentConfig) -> Result<Self> {
        let mut registry = SchemaRegistry::new();
        for (name, def) in &config.collections {
            let directory = def.directory.as_deref().unwrap_or(name);
            registry.declare_in(name, def.kind, directory)?;
        }

        for (name, def) in &config.collections {
            let Some(fields) = &def.schema else {
                continue;
            };
            let mut built = Vec::with_capacity(fields.len());
            for (field_name, field_def) in fields {
                let path = format!("{name}.{field_name}");
                built.push((field_name.clone(), registry.build_field(field_def, &path)?));
            }
            registry.register(name, validation::object_with(built, def.unknown_keys))?;
        }

        Ok(registry)
    }

    fn build_field(&self, def: &FieldDefinition, path: &str) -> Result<Validator> {
        let mut validator = match def.field_type {
            FieldType::String => match &def.enum_values {
                Some(values) => validation::enumeration(values.iter().cloned()),
                None => validation::string(),
            },
            FieldType::Number => validation::number(),
            FieldType::Integer => validation::integer(),
            FieldType::Boolean => validation::boolean(),
            FieldType::Date => validation::date(),
            FieldType::Any => validation::any(),
            FieldType::List => {
                let item = match &def.items {
                    Some(items) => self.build_field(items, &format!("{path}[]"))?,
                    None => validation::any(),
                };
                validation::array(item)
            }
            FieldType::Object => {
                let mut nested = Vec::new();
                for (name, field) in def.fields.iter().flatten() {
                    nested.push((name.clone(), self.build_field(field, &format!("{path}.{name}"))?));
                }
                validation::object_with(nested, def.unknown_keys)
            }
            FieldType::Reference => {
                let target = def.collection.as_deref().ok_or_else(|| {
                    ContentError::Schema(format!("Reference field '{path}' has no target collection"))
                })?;
                self.reference(target).map_err(|_| {
                    ContentError::Schema(format!(
                        "Reference field '{path}' targets unknown collection '{target}'"
                    ))
                })?
            }
        };

        if let Some(pattern) = &def.pattern {
            let regex = Regex::new(pattern).map_err(|e| {
                ContentError::Schema(format!("Invalid pattern for '{path}': {e}"))
            })?;
            validator = validator.pattern(regex);
        }
        if let Some(min) = def.min_length {
            validator = validator.min_length(min);
        }
        if let Some(max) = def.max_length {
            validator = validator.max_length(max);
        }
        if let Some(default) = &def.default {
            validator = validator.default(default.clone());
        }
        if def.optional {
            validator = validator.optional();
        }
        Ok(validator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_config_str;
    use serde_json::json;

    fn test_registry() -> SchemaRegistry {
        let config = parse_config_str(
            r#"
collections:
  work:
    schema:
      title: { type: string }
      company: { type: reference, collection: companies }
      start: { type: date }
      stack: { type: list, items: { type: string }, default: [] }
      role: { type: string, enum: [engineer, lead], default: engineer }
    unknown_keys: reject
  companies:
    type: data
    schema:
      name: { type: string }
      site: { type: string, pattern: "^https://", optional: true }
  notes:
    type: content
"#,
        )
        .unwrap();
        SchemaRegistry::from_config(&config).unwrap()
    }

    #[test]
    fn test_validate_builds_typed_data() {
        let registry = test_registry();
        let data = registry
            .validate(
                "work",
                "belogit.md",
                &json!({ "title": "Backend", "company": "belogit", "start": "2021-03-01" }),
            )
            .unwrap();
        assert_eq!(data["company"], json!({ "collection": "companies", "id": "belogit" }));
        assert_eq!(data["stack"], json!([]));
        assert_eq!(data["role"], "engineer");
    }

    #[test]
    fn test_validation_error_carries_context() {
        let registry = test_registry();
        let err = registry
            .validate("work", "ghosthat.md", &json!({ "title": 1, "start": "2020-01-01", "x": 1 }))
            .unwrap_err();
        match err {
            ContentError::Validation(v) => {
                assert_eq!(v.collection, "work");
                assert_eq!(v.id, "ghosthat.md");
                let paths: Vec<&str> = v.issues.iter().map(|i| i.path.as_str()).collect();
                // Declared fields are checked in name order, unknown keys last
                assert_eq!(paths, vec!["company", "title", "x"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_collection_without_schema_is_identity() {
        let registry = test_registry();
        let raw = json!({ "anything": [1, 2, 3] });
        assert_eq!(registry.validate("notes", "a.md", &raw).unwrap(), raw);
    }

    #[test]
    fn test_pattern_from_config() {
        let registry = test_registry();
        assert!(registry
            .validate("companies", "acme", &json!({ "name": "Acme", "site": "http://acme" }))
            .is_err());
        assert!(registry
            .validate("companies", "acme", &json!({ "name": "Acme", "site": "https://acme" }))
            .is_ok());
    }

    #[test]
    fn test_reference_to_unknown_collection_is_schema_error() {
        let config = parse_config_str(
            "collections:\n  posts:\n    schema:\n      author: { type: reference, collection: people }\n",
        )
        .unwrap();
        let err = SchemaRegistry::from_config(&config).unwrap_err();
        assert!(matches!(err, ContentError::Schema(_)));
    }

    #[test]
    fn test_declare_and_register() {
        let mut registry = SchemaRegistry::new();
        registry.declare("blog", CollectionKind::Content).unwrap();
        assert!(matches!(
            registry.declare("blog", CollectionKind::Data),
            Err(ContentError::DuplicateCollection(_))
        ));
        registry.register("blog", validation::any()).unwrap();
        assert!(registry.register("blog", validation::any()).is_err());
        assert!(matches!(
            registry.register("missing", validation::any()),
            Err(ContentError::UnknownCollection(_))
        ));
    }
}
