//! Composable validators turning untyped frontmatter into schema-checked data.
//!
//! A [`Validator`] is a cheap-to-clone value. Collection authors assemble
//! schemas from the primitives in this module ([`string`], [`number`],
//! [`object`], ...) and from reference validators obtained through
//! [`SchemaRegistry::reference`](crate::schema::SchemaRegistry::reference).

use crate::error::Issue;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Outcome of a validation: the validated value or every issue found.
pub type Outcome = std::result::Result<Value, Vec<Issue>>;

type CheckFn = dyn Fn(&Value, &str) -> Outcome + Send + Sync;

/// How an object validator treats keys it does not declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownKeys {
    /// Drop undeclared keys from the validated value.
    #[default]
    Strip,
    /// Keep undeclared keys unchanged.
    Passthrough,
    /// Report undeclared keys as issues.
    Reject,
}

#[derive(Clone)]
pub struct Validator {
    check: Arc<CheckFn>,
    expected: String,
    optional: bool,
    default: Option<Value>,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("expected", &self.expected)
            .field("optional", &self.optional)
            .field("default", &self.default)
            .finish()
    }
}

impl Validator {
    /// Build a validator from a check function. `expected` names the shape in issues.
    pub fn new<F>(expected: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value, &str) -> Outcome + Send + Sync + 'static,
    {
        Validator {
            check: Arc::new(check),
            expected: expected.into(),
            optional: false,
            default: None,
        }
    }

    /// Human readable description of the accepted shape.
    pub fn expected(&self) -> &str {
        &self.expected
    }

    pub fn is_optional(&self) -> bool {
        self.optional || self.default.is_some()
    }

    /// Validate a root value.
    pub fn validate(&self, value: &Value) -> Outcome {
        self.validate_at(value, "")
    }

    /// Validate a value found at `path`.
    pub fn validate_at(&self, value: &Value, path: &str) -> Outcome {
        (self.check)(value, path)
    }

    /// Validate a possibly absent field. `Ok(None)` means the field is left out.
    pub fn validate_field(
        &self,
        value: Option<&Value>,
        path: &str,
    ) -> std::result::Result<Option<Value>, Vec<Issue>> {
        match value {
            Some(v) if !v.is_null() => self.validate_at(v, path).map(Some),
            _ => {
                if let Some(default) = &self.default {
                    self.validate_at(default, path).map(Some)
                } else if self.optional {
                    Ok(None)
                } else {
                    let actual = if value.is_some() { "null" } else { "missing" };
                    Err(vec![Issue::new(path, self.expected.clone(), actual)])
                }
            }
        }
    }

    /// Allow the value to be missing or null.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Substitute `value` when the field is missing or null.
    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Add a constraint checked after this validator succeeds.
    pub fn refine<P>(self, expected: impl Into<String>, predicate: P) -> Self
    where
        P: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let expected = expected.into();
        let inner = self.check.clone();
        Validator {
            check: Arc::new(move |value, path| {
                let validated = inner(value, path)?;
                if predicate(&validated) {
                    Ok(validated)
                } else {
                    Err(vec![Issue::new(path, expected.clone(), describe(&validated))])
                }
            }),
            ..self
        }
    }

    /// Require string values to match `pattern`.
    pub fn pattern(self, pattern: Regex) -> Self {
        let expected = format!("string matching /{}/", pattern.as_str());
        self.refine(expected, move |v| {
            v.as_str().map(|s| pattern.is_match(s)).unwrap_or(false)
        })
    }

    pub fn min_length(self, min: usize) -> Self {
        self.refine(format!("at least {min} characters"), move |v| {
            v.as_str().map(|s| s.chars().count() >= min).unwrap_or(false)
        })
    }

    pub fn max_length(self, max: usize) -> Self {
        self.refine(format!("at most {max} characters"), move |v| {
            v.as_str().map(|s| s.chars().count() <= max).unwrap_or(false)
        })
    }
}

/// Accept any value unchanged.
pub fn any() -> Validator {
    Validator::new("any value", |value, _| Ok(value.clone()))
}

pub fn string() -> Validator {
    primitive("string", Value::is_string)
}

pub fn number() -> Validator {
    primitive("number", Value::is_number)
}

pub fn integer() -> Validator {
    primitive("integer", |v| v.is_i64() || v.is_u64())
}

pub fn boolean() -> Validator {
    primitive("boolean", Value::is_boolean)
}

/// A calendar date (`YYYY-MM-DD`) or an RFC 3339 timestamp, kept as written.
pub fn date() -> Validator {
    Validator::new("date", |value, path| match value.as_str() {
        Some(s) if is_date(s) => Ok(value.clone()),
        Some(s) => Err(vec![Issue::new(path, "date", format!("'{s}'"))]),
        None => Err(vec![Issue::new(path, "date", type_name(value))]),
    })
}

/// Accept only the given string values.
pub fn enumeration<I, S>(values: I) -> Validator
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let values: Vec<String> = values.into_iter().map(Into::into).collect();
    let expected = format!("one of [{}]", values.join(", "));
    let description = expected.clone();
    Validator::new(expected, move |value, path| match value.as_str() {
        Some(s) if values.iter().any(|v| v == s) => Ok(value.clone()),
        _ => Err(vec![Issue::new(path, description.clone(), describe(value))]),
    })
}

/// Accept exactly `expected`.
pub fn literal(expected: Value) -> Validator {
    let description = format!("literal {expected}");
    let shown = description.clone();
    Validator::new(description, move |value, path| {
        if *value == expected {
            Ok(value.clone())
        } else {
            Err(vec![Issue::new(path, shown.clone(), describe(value))])
        }
    })
}

/// A list whose every item passes `item`.
pub fn array(item: Validator) -> Validator {
    let expected = format!("list of {}", item.expected());
    Validator::new(expected, move |value, path| {
        let Some(items) = value.as_array() else {
            return Err(vec![Issue::new(path, "list", type_name(value))]);
        };
        let mut out = Vec::with_capacity(items.len());
        let mut issues = Vec::new();
        for (i, v) in items.iter().enumerate() {
            match item.validate_at(v, &join_path(path, &i.to_string())) {
                Ok(v) => out.push(v),
                Err(mut errs) => issues.append(&mut errs),
            }
        }
        if issues.is_empty() {
            Ok(Value::Array(out))
        } else {
            Err(issues)
        }
    })
}

/// An object with the given fields, dropping undeclared keys.
pub fn object<I, K>(fields: I) -> Validator
where
    I: IntoIterator<Item = (K, Validator)>,
    K: Into<String>,
{
    object_with(fields, UnknownKeys::Strip)
}

pub fn object_with<I, K>(fields: I, unknown_keys: UnknownKeys) -> Validator
where
    I: IntoIterator<Item = (K, Validator)>,
    K: Into<String>,
{
    let fields: Vec<(String, Validator)> =
        fields.into_iter().map(|(k, v)| (k.into(), v)).collect();

    Validator::new("object", move |value, path| {
        let Some(map) = value.as_object() else {
            return Err(vec![Issue::new(path, "object", type_name(value))]);
        };

        let mut out = Map::new();
        let mut issues = Vec::new();

        for (name, validator) in &fields {
            match validator.validate_field(map.get(name), &join_path(path, name)) {
                Ok(Some(v)) => {
                    out.insert(name.clone(), v);
                }
                Ok(None) => {}
                Err(mut errs) => issues.append(&mut errs),
            }
        }

        for (key, v) in map {
            if fields.iter().any(|(name, _)| name == key) {
                continue;
            }
            match unknown_keys {
                UnknownKeys::Strip => {}
                UnknownKeys::Passthrough => {
                    out.insert(key.clone(), v.clone());
                }
                UnknownKeys::Reject => issues.push(Issue::new(
                    &join_path(path, key),
                    "no such field",
                    type_name(v),
                )),
            }
        }

        if issues.is_empty() {
            Ok(Value::Object(out))
        } else {
            Err(issues)
        }
    })
}

fn primitive(expected: &'static str, accepts: fn(&Value) -> bool) -> Validator {
    Validator::new(expected, move |value, path| {
        if accepts(value) {
            Ok(value.clone())
        } else {
            Err(vec![Issue::new(path, expected, type_name(value))])
        }
    })
}

fn is_date(s: &str) -> bool {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || chrono::DateTime::parse_from_rfc3339(s).is_ok()
        || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
}

pub(crate) fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}.{child}")
    }
}

/// Short JSON type name used in issue reports.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{s}'"),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => type_name(other).to_string(),
    }
}
