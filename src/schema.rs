//! Resolved, version-free schemas.
//!
//! These are produced fresh for every `(query, version)` resolution and are
//! never mutated afterwards. References to other declarations stay by name;
//! the declarations themselves are reported to the resolver's collectors.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::DiscriminatorError;
use crate::name::{Name, QualifiedTypeName};
use crate::types::{Optionality, Primitive, QueryType, TokenScope};

/// A concrete type at a use site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaType {
    Primitive(Primitive),
    Array {
        elements: Box<SchemaType>,
        nullable_elements: bool,
    },
    Map {
        keys: Box<SchemaType>,
        values: Box<SchemaType>,
        nullable_values: bool,
    },
    Alias(QualifiedTypeName),
    Reference(QualifiedTypeName),
}

impl SchemaType {
    pub fn array(elements: SchemaType) -> Self {
        SchemaType::Array {
            elements: Box::new(elements),
            nullable_elements: false,
        }
    }

    /// The declaration or alias this type names, if any.
    pub fn referenced_name(&self) -> Option<&QualifiedTypeName> {
        match self {
            SchemaType::Alias(name) | SchemaType::Reference(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaProperty {
    pub name: Name,
    #[serde(rename = "type")]
    pub ty: SchemaType,
    pub serial_name: String,
    pub description: String,
    pub optionality: Optionality,
    pub is_deprecated: bool,
    pub is_inline: bool,
    pub is_lenient: bool,
    pub is_localized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaAlias {
    pub name: QualifiedTypeName,
    pub primitive: Primitive,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaEnumValue {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaEnum {
    pub name: QualifiedTypeName,
    pub underlying: Primitive,
    pub values: Vec<SchemaEnumValue>,
    pub description: String,
}

/// An object whose properties are keyed by serial name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaRecord {
    pub name: QualifiedTypeName,
    pub properties: BTreeMap<String, SchemaProperty>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaTupleElement {
    pub name: Name,
    #[serde(rename = "type")]
    pub ty: SchemaType,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaTuple {
    pub name: QualifiedTypeName,
    pub elements: Vec<SchemaTupleElement>,
    pub description: String,
}

/// One arm of a [`SchemaConditional`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaInterpretation {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nest_property: Option<String>,
    #[serde(rename = "type")]
    pub ty: SchemaType,
    pub is_deprecated: bool,
    pub description: String,
}

/// A discriminated union.
///
/// The discriminator named by `selector` is read either from the object
/// itself or, when `selector_in_side_property` is set, from a sibling
/// property of the object that contains it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaConditional {
    pub name: QualifiedTypeName,
    pub selector: String,
    pub selector_in_side_property: bool,
    pub interpretation_in_nested_property: bool,
    pub shared_properties: BTreeMap<String, SchemaProperty>,
    pub interpretations: BTreeMap<String, SchemaInterpretation>,
    pub description: String,
}

impl SchemaConditional {
    /// Pick the interpretation that applies to `payload`.
    ///
    /// `side_value` is the discriminator read from the sibling property and
    /// is only consulted when `selector_in_side_property` is set.
    ///
    /// # Errors
    ///
    /// Returns `DiscriminatorError::Missing` if the discriminator cannot be
    /// read, or `DiscriminatorError::Unknown` if no interpretation matches.
    pub fn select_interpretation(
        &self,
        payload: &Value,
        side_value: Option<&str>,
    ) -> Result<&SchemaInterpretation, DiscriminatorError> {
        let value = if self.selector_in_side_property {
            side_value.map(str::to_string)
        } else {
            payload.get(&self.selector).and_then(selector_string)
        };

        let Some(value) = value else {
            return Err(DiscriminatorError::Missing {
                conditional: self.name.clone(),
                selector: self.selector.clone(),
            });
        };

        self.interpretations
            .get(&value)
            .ok_or_else(|| DiscriminatorError::Unknown {
                conditional: self.name.clone(),
                selector: self.selector.clone(),
                value,
            })
    }

    /// The part of `payload` described by `interpretation`.
    ///
    /// For nested conditionals this is the property named by the
    /// interpretation's nest property (or its key); otherwise the payload
    /// itself.
    pub fn interpretation_payload<'a>(
        &self,
        interpretation: &SchemaInterpretation,
        payload: &'a Value,
    ) -> Option<&'a Value> {
        if self.interpretation_in_nested_property {
            let key = interpretation
                .nest_property
                .as_deref()
                .unwrap_or(&interpretation.key);
            payload.get(key)
        } else {
            Some(payload)
        }
    }
}

fn selector_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A resolved declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApiType {
    Alias(SchemaAlias),
    Enum(SchemaEnum),
    Record(SchemaRecord),
    Tuple(SchemaTuple),
    Conditional(SchemaConditional),
}

impl ApiType {
    pub fn name(&self) -> &QualifiedTypeName {
        match self {
            ApiType::Alias(t) => &t.name,
            ApiType::Enum(t) => &t.name,
            ApiType::Record(t) => &t.name,
            ApiType::Tuple(t) => &t.name,
            ApiType::Conditional(t) => &t.name,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            ApiType::Alias(t) => &t.description,
            ApiType::Enum(t) => &t.description,
            ApiType::Record(t) => &t.description,
            ApiType::Tuple(t) => &t.description,
            ApiType::Conditional(t) => &t.description,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiPathParameter {
    pub key: String,
    #[serde(rename = "type")]
    pub ty: SchemaType,
    pub name: Name,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiQueryParameter {
    pub key: String,
    #[serde(rename = "type")]
    pub ty: SchemaType,
    pub name: Name,
    pub description: String,
    pub is_optional: bool,
}

/// Why an index query variant differs from its base query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiQueryDetails {
    pub query_type: QueryType,
    pub id_type: SchemaType,
}

/// A single endpoint call at one schema version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiQuery {
    pub path: String,
    pub endpoint: String,
    pub summary: String,
    pub path_parameters: BTreeMap<String, ApiPathParameter>,
    pub query_parameters: BTreeMap<String, ApiQueryParameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_suffix: Option<String>,
    #[serde(
        rename = "cache_seconds",
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_cache"
    )]
    pub cache: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ApiQueryDetails>,
    pub security: BTreeSet<TokenScope>,
    pub is_localized: bool,
    pub schema: SchemaType,
}

fn serialize_cache<S: Serializer>(cache: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match cache {
        Some(duration) => serializer.serialize_some(&duration.as_secs()),
        None => serializer.serialize_none(),
    }
}
