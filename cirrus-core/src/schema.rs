//! Schema - Define type schemas for resources
//!
//! Providers define schemas for each resource type, enabling validation of
//! configuration before any API call is made.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::resource::Value;
use crate::timeouts::Timeouts;

/// Validation function attached to a custom attribute type
#[derive(Clone)]
pub struct ValidateFn(Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>);

impl ValidateFn {
    pub fn new(f: impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, value: &Value) -> Result<(), String> {
        (self.0)(value)
    }
}

impl fmt::Debug for ValidateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValidateFn")
    }
}

/// Canonical form of a string attribute, applied to configuration before
/// validation and comparison
#[derive(Clone)]
pub struct NormalizeFn(Arc<dyn Fn(&str) -> String + Send + Sync>);

impl NormalizeFn {
    pub fn new(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, value: &str) -> String {
        (self.0)(value)
    }
}

impl fmt::Debug for NormalizeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NormalizeFn")
    }
}

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Boolean
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Custom type (base type plus a validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: ValidateFn,
    },
    /// List
    List(Box<AttributeType>),
    /// Map with string keys
    Map(Box<AttributeType>),
    /// Nested configuration block, stored as a list of maps
    Block(Box<BlockSchema>),
}

impl AttributeType {
    /// Enum type from string slices
    pub fn enumeration(values: &[&str]) -> Self {
        AttributeType::Enum(values.iter().map(|v| v.to_string()).collect())
    }

    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { base, validate, .. }, v) => {
                base.validate(v)?;
                validate
                    .call(v)
                    .map_err(|message| TypeError::ValidationFailed { message })
            }

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Block(_), Value::List(items))
                if items.iter().all(|i| matches!(i, Value::Map(_))) =>
            {
                Ok(())
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Block(_) => "Block".to_string(),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("Attribute '{name}' is read-only and cannot be set")]
    ReadOnly { name: String },

    #[error("Attribute '{name}': {inner}")]
    Attribute { name: String, inner: Box<TypeError> },

    #[error("Attribute '{name}' must have between {min} and {max} items, got {got}")]
    ItemCount {
        name: String,
        min: usize,
        max: usize,
        got: usize,
    },

    #[error("'{name}' conflicts with '{other}'")]
    Conflict { name: String, other: String },

    #[error("Exactly one of {} must be specified", names.join(", "))]
    ExactlyOneOf { names: Vec<String> },

    #[error("At least one of {} must be specified", names.join(", "))]
    AtLeastOneOf { names: Vec<String> },

    #[error("'{name}' requires '{other}' to be set")]
    RequiredWith { name: String, other: String },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },
}

impl Value {
    fn type_name(&self) -> String {
        match self {
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
        }
    }
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    /// Value may be filled in by the remote side
    pub computed: bool,
    /// Value is only ever set by the remote side
    pub read_only: bool,
    /// Changing the value requires replacing the resource
    pub force_new: bool,
    /// Value must not be displayed
    pub sensitive: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
    pub conflicts_with: Vec<String>,
    pub exactly_one_of: Vec<String>,
    pub at_least_one_of: Vec<String>,
    pub required_with: Vec<String>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub normalize: Option<NormalizeFn>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            computed: false,
            read_only: false,
            force_new: false,
            sensitive: false,
            default: None,
            description: None,
            conflicts_with: Vec::new(),
            exactly_one_of: Vec::new(),
            at_least_one_of: Vec::new(),
            required_with: Vec::new(),
            min_items: None,
            max_items: None,
            normalize: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.computed = true;
        self.read_only = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn conflicts_with(mut self, names: &[&str]) -> Self {
        self.conflicts_with = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn exactly_one_of(mut self, names: &[&str]) -> Self {
        self.exactly_one_of = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn at_least_one_of(mut self, names: &[&str]) -> Self {
        self.at_least_one_of = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn required_with(mut self, names: &[&str]) -> Self {
        self.required_with = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn normalized_with(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.normalize = Some(NormalizeFn::new(f));
        self
    }

    pub fn min_items(mut self, min: usize) -> Self {
        self.min_items = Some(min);
        self
    }

    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }
}

/// Schema of a nested configuration block
#[derive(Debug, Clone, Default)]
pub struct BlockSchema {
    pub attributes: HashMap<String, AttributeSchema>,
}

impl BlockSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    /// Wrap into an attribute type
    pub fn into_type(self) -> AttributeType {
        AttributeType::Block(Box::new(self))
    }
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    /// Version of the persisted attribute layout
    pub version: u32,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
    pub timeouts: Timeouts,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            version: 0,
            attributes: HashMap::new(),
            description: None,
            timeouts: Timeouts::default(),
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Attributes that force replacement when changed
    pub fn force_new_attributes(&self) -> Vec<&str> {
        self.attributes
            .values()
            .filter(|a| a.force_new)
            .map(|a| a.name.as_str())
            .collect()
    }

    /// Validate resource attributes
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let mut errors = Vec::new();
        validate_attributes(&self.attributes, attributes, "", &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Fill in defaults and wrap single-map block values into lists
    pub fn normalize(&self, attributes: &mut HashMap<String, Value>) {
        normalize_attributes(&self.attributes, attributes);
    }
}

fn is_present(values: &HashMap<String, Value>, name: &str) -> bool {
    values.get(name).is_some_and(|v| !v.is_empty())
}

fn normalize_attributes(
    schemas: &HashMap<String, AttributeSchema>,
    values: &mut HashMap<String, Value>,
) {
    for (name, schema) in schemas {
        if !values.contains_key(name)
            && let Some(default) = &schema.default
        {
            values.insert(name.clone(), default.clone());
        }

        if let Some(normalize) = &schema.normalize
            && let Some(Value::String(s)) = values.get_mut(name)
        {
            *s = normalize.call(s);
        }

        if let AttributeType::Block(block) = &schema.attr_type
            && let Some(value) = values.get_mut(name)
        {
            if let Value::Map(map) = value {
                *value = Value::List(vec![Value::Map(std::mem::take(map))]);
            }
            if let Value::List(items) = value {
                for item in items.iter_mut() {
                    if let Value::Map(map) = item {
                        normalize_attributes(&block.attributes, map);
                    }
                }
            }
        }
    }
}

fn validate_attributes(
    schemas: &HashMap<String, AttributeSchema>,
    values: &HashMap<String, Value>,
    path: &str,
    errors: &mut Vec<TypeError>,
) {
    let qualified = |name: &str| format!("{}{}", path, name);

    for (name, schema) in schemas {
        if schema.required && !values.contains_key(name) && schema.default.is_none() {
            errors.push(TypeError::MissingRequired {
                name: qualified(name),
            });
        }
    }

    let mut reported_groups: BTreeSet<Vec<String>> = BTreeSet::new();

    for (name, value) in values {
        let Some(schema) = schemas.get(name) else {
            errors.push(TypeError::UnknownAttribute {
                name: qualified(name),
            });
            continue;
        };

        if schema.read_only {
            errors.push(TypeError::ReadOnly {
                name: qualified(name),
            });
            continue;
        }

        if let Err(e) = schema.attr_type.validate(value) {
            errors.push(TypeError::Attribute {
                name: qualified(name),
                inner: Box::new(e),
            });
            continue;
        }

        if let Value::List(items) = value {
            let min = schema.min_items.unwrap_or(0);
            let max = schema.max_items.unwrap_or(usize::MAX);
            if !items.is_empty() && (items.len() < min || items.len() > max) {
                errors.push(TypeError::ItemCount {
                    name: qualified(name),
                    min,
                    max,
                    got: items.len(),
                });
            }
        }

        if !value.is_empty() {
            for other in &schema.conflicts_with {
                // Report each conflicting pair once
                if is_present(values, other) && name < other {
                    errors.push(TypeError::Conflict {
                        name: qualified(name),
                        other: qualified(other),
                    });
                }
            }

            for other in &schema.required_with {
                if !is_present(values, other) {
                    errors.push(TypeError::RequiredWith {
                        name: qualified(name),
                        other: qualified(other),
                    });
                }
            }
        }

        if let AttributeType::Block(block) = &schema.attr_type
            && let Value::List(items) = value
        {
            for (index, item) in items.iter().enumerate() {
                if let Value::Map(map) = item {
                    let nested = format!("{}{}.{}.", path, name, index);
                    validate_attributes(&block.attributes, map, &nested, errors);
                }
            }
        }
    }

    for schema in schemas.values() {
        if !schema.exactly_one_of.is_empty() {
            let mut group = schema.exactly_one_of.clone();
            group.sort();
            let count = group.iter().filter(|n| is_present(values, n)).count();
            if count != 1 && reported_groups.insert(group.clone()) {
                errors.push(TypeError::ExactlyOneOf {
                    names: group.iter().map(|n| qualified(n)).collect(),
                });
            }
        }

        if !schema.at_least_one_of.is_empty() {
            let mut group = schema.at_least_one_of.clone();
            group.sort();
            let any = group.iter().any(|n| is_present(values, n));
            if !any && reported_groups.insert(group.clone()) {
                errors.push(TypeError::AtLeastOneOf {
                    names: group.iter().map(|n| qualified(n)).collect(),
                });
            }
        }
    }
}

/// Helper functions for common types
pub mod types {
    use super::*;

    /// Positive integer type
    pub fn positive_int() -> AttributeType {
        int_at_least(1)
    }

    /// Integer within an inclusive range
    pub fn int_between(min: i64, max: i64) -> AttributeType {
        AttributeType::Custom {
            name: format!("Int({}..={})", min, max),
            base: Box::new(AttributeType::Int),
            validate: ValidateFn::new(move |value| match value {
                Value::Int(n) if (min..=max).contains(n) => Ok(()),
                Value::Int(n) => Err(format!(
                    "expected value to be in the range ({} - {}), got {}",
                    min, max, n
                )),
                _ => Err("Expected integer".to_string()),
            }),
        }
    }

    /// Integer with a lower bound
    pub fn int_at_least(min: i64) -> AttributeType {
        AttributeType::Custom {
            name: format!("Int(>={})", min),
            base: Box::new(AttributeType::Int),
            validate: ValidateFn::new(move |value| match value {
                Value::Int(n) if *n >= min => Ok(()),
                Value::Int(n) => Err(format!(
                    "expected value to be at least ({}), got {}",
                    min, n
                )),
                _ => Err("Expected integer".to_string()),
            }),
        }
    }

    /// Integer in a range that is also a multiple of `divisor`
    pub fn int_between_divisible_by(min: i64, max: i64, divisor: i64) -> AttributeType {
        AttributeType::Custom {
            name: format!("Int({}..={}, %{})", min, max, divisor),
            base: Box::new(AttributeType::Int),
            validate: ValidateFn::new(move |value| match value {
                Value::Int(n) if !(min..=max).contains(n) => Err(format!(
                    "expected value to be in the range ({} - {}), got {}",
                    min, max, n
                )),
                Value::Int(n) if n % divisor != 0 => {
                    Err(format!("expected value to be divisible by {}, got {}", divisor, n))
                }
                Value::Int(_) => Ok(()),
                _ => Err("Expected integer".to_string()),
            }),
        }
    }

    /// Non-empty string
    pub fn string_not_empty() -> AttributeType {
        AttributeType::Custom {
            name: "NonEmptyString".to_string(),
            base: Box::new(AttributeType::String),
            validate: ValidateFn::new(|value| match value {
                Value::String(s) if s.trim().is_empty() => {
                    Err("expected a non-empty string".to_string())
                }
                Value::String(_) => Ok(()),
                _ => Err("Expected string".to_string()),
            }),
        }
    }

    /// String matching a regular expression
    pub fn string_matches(name: &str, pattern: &str, message: &str) -> AttributeType {
        let regex = regex::Regex::new(pattern);
        let message = message.to_string();
        AttributeType::Custom {
            name: name.to_string(),
            base: Box::new(AttributeType::String),
            validate: ValidateFn::new(move |value| {
                let Value::String(s) = value else {
                    return Err("Expected string".to_string());
                };
                match &regex {
                    Ok(re) if re.is_match(s) => Ok(()),
                    Ok(_) => Err(format!("{}, got {:?}", message, s)),
                    Err(e) => Err(format!("invalid pattern: {}", e)),
                }
            }),
        }
    }

    /// String checked by a plain validation function
    pub fn string_with(
        name: &str,
        validate: impl Fn(&str) -> Result<(), String> + Send + Sync + 'static,
    ) -> AttributeType {
        AttributeType::Custom {
            name: name.to_string(),
            base: Box::new(AttributeType::String),
            validate: ValidateFn::new(move |value| match value {
                Value::String(s) => validate(s),
                _ => Err("Expected string".to_string()),
            }),
        }
    }

    /// UUID string (tenant and client IDs)
    pub fn uuid() -> AttributeType {
        string_matches(
            "Uuid",
            r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
            "expected a UUID",
        )
    }

    /// String restricted to a fixed set of values
    pub fn string_in_slice(values: &[&str]) -> AttributeType {
        AttributeType::enumeration(values)
    }

    /// Type that must satisfy every one of `validators` in order
    pub fn all_of(name: &str, validators: Vec<AttributeType>) -> AttributeType {
        let base = validators
            .first()
            .map(base_of)
            .unwrap_or(AttributeType::String);
        AttributeType::Custom {
            name: name.to_string(),
            base: Box::new(base),
            validate: ValidateFn::new(move |value| {
                for v in &validators {
                    v.validate(value).map_err(|e| e.to_string())?;
                }
                Ok(())
            }),
        }
    }

    fn base_of(t: &AttributeType) -> AttributeType {
        match t {
            AttributeType::Custom { base, .. } => base_of(base),
            AttributeType::Enum(_) => AttributeType::String,
            other => other.clone(),
        }
    }

    /// Map of string tags
    pub fn tags() -> AttributeType {
        AttributeType::Map(Box::new(AttributeType::String))
    }
}
