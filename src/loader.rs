//! Catalogue loading.
//!
//! A catalogue is a JSON document describing aliases, type declarations and
//! endpoints. Type references inside it are strings (a primitive keyword, an
//! alias name, or a dotted declaration path) or array/map objects.
//! Declaration paths are looked up from the innermost enclosing declaration
//! outward, so a nested type can be referenced by its short name from within
//! its parent.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::api::ApiDefinition;
use crate::builder::{
    element, interpretation, property, DeclarationScope, InterpretationModifier, PropertyModifier,
    Selector,
};
use crate::error::{DefinitionError, LoadError};
use crate::ir::{IrEnumValue, IrProperty, IrTypeUse};
use crate::name::{Name, QualifiedTypeName};
use crate::query::Endpoint;
use crate::registry::TypeRegistry;
use crate::types::{Language, Primitive, QueryType, TokenScope};
use crate::version::SchemaVersion;

#[derive(Debug, Deserialize)]
struct Catalogue {
    #[serde(default)]
    languages: Option<BTreeSet<Language>>,
    #[serde(default)]
    aliases: IndexMap<String, AliasDef>,
    #[serde(default)]
    types: IndexMap<String, TypeDef>,
    #[serde(default)]
    endpoints: Vec<EndpointDef>,
    #[serde(default)]
    auxiliary: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AliasDef {
    #[serde(rename = "type")]
    primitive: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum TypeDef {
    Record {
        #[serde(default)]
        description: String,
        #[serde(default)]
        properties: IndexMap<String, OneOrMany<PropertyDef>>,
        #[serde(default)]
        nested: IndexMap<String, TypeDef>,
    },
    Conditional {
        #[serde(default)]
        description: String,
        selector: String,
        #[serde(default)]
        side_property: bool,
        #[serde(default)]
        nested_interpretations: bool,
        #[serde(default)]
        shared: IndexMap<String, OneOrMany<PropertyDef>>,
        interpretations: IndexMap<String, OneOrMany<InterpretationDef>>,
        #[serde(default)]
        nested: IndexMap<String, TypeDef>,
    },
    Enum {
        #[serde(default)]
        description: String,
        #[serde(rename = "type", default = "default_enum_type")]
        underlying: String,
        values: Vec<EnumValueDef>,
    },
    Tuple {
        #[serde(default)]
        description: String,
        elements: Vec<ElementDef>,
    },
}

fn default_enum_type() -> String {
    "string".to_string()
}

/// One definition, or several with disjoint version windows.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            OneOrMany::Many(items) => items.iter(),
            OneOrMany::One(item) => std::slice::from_ref(item).iter(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PropertyDef {
    #[serde(rename = "type")]
    ty: TypeRef,
    /// Display name; defaults to the serial name.
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    mandated_by: Option<TokenScope>,
    #[serde(default)]
    deprecated: bool,
    #[serde(default)]
    inline: bool,
    #[serde(default)]
    lenient: bool,
    #[serde(default)]
    localized: bool,
    #[serde(default)]
    since: Option<SchemaVersion>,
    #[serde(default)]
    until: Option<SchemaVersion>,
}

#[derive(Debug, Deserialize)]
struct InterpretationDef {
    #[serde(rename = "type")]
    ty: TypeRef,
    #[serde(default)]
    description: String,
    #[serde(default)]
    nest_property: Option<String>,
    #[serde(default)]
    deprecated: bool,
    #[serde(default)]
    since: Option<SchemaVersion>,
    #[serde(default)]
    until: Option<SchemaVersion>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EnumValueDef {
    Plain(String),
    Described { value: String, description: String },
}

#[derive(Debug, Deserialize)]
struct ElementDef {
    name: String,
    #[serde(rename = "type")]
    ty: TypeRef,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TypeRef {
    Named(String),
    Array {
        array: Box<TypeRef>,
        #[serde(default)]
        nullable: bool,
    },
    Map {
        keys: Box<TypeRef>,
        values: Box<TypeRef>,
        #[serde(default)]
        nullable: bool,
    },
}

#[derive(Debug, Deserialize)]
struct EndpointDef {
    name: String,
    path: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    cache_seconds: Option<u64>,
    #[serde(default)]
    security: Vec<TokenScope>,
    #[serde(default)]
    localized: bool,
    #[serde(default)]
    since: Option<SchemaVersion>,
    #[serde(default)]
    until: Option<SchemaVersion>,
    #[serde(default)]
    path_parameters: IndexMap<String, ParameterDef>,
    #[serde(default)]
    query_parameters: IndexMap<String, ParameterDef>,
    #[serde(default)]
    schema: Option<TypeRef>,
    #[serde(default)]
    schemas: Vec<SchemaOverrideDef>,
    #[serde(default)]
    index: Option<IndexDef>,
}

#[derive(Debug, Deserialize)]
struct ParameterDef {
    #[serde(rename = "type")]
    ty: TypeRef,
    #[serde(default)]
    description: String,
    #[serde(default)]
    optional: bool,
}

#[derive(Debug, Deserialize)]
struct SchemaOverrideDef {
    since: SchemaVersion,
    #[serde(rename = "type")]
    ty: TypeRef,
}

#[derive(Debug, Deserialize)]
struct IndexDef {
    #[serde(default = "default_id_key")]
    id_key: String,
    queries: Vec<QueryType>,
}

fn default_id_key() -> String {
    "id".to_string()
}

/// Load a catalogue from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// `LoadError::InvalidJson` if it isn't a valid catalogue, or
/// `LoadError::Definition` if its declarations are inconsistent.
pub fn load_definition(path: &Path) -> Result<ApiDefinition, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(path = %path.display(), "loading catalogue");
    load_definition_str(&content)
}

/// Load a catalogue from a JSON string.
///
/// # Errors
///
/// As [`load_definition`], without the IO cases.
pub fn load_definition_str(content: &str) -> Result<ApiDefinition, LoadError> {
    let catalogue: Catalogue =
        serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })?;
    Ok(build_definition(catalogue)?)
}

/// Names a catalogue declares, for resolving references.
struct Names {
    aliases: BTreeSet<String>,
    declarations: BTreeSet<QualifiedTypeName>,
}

impl Names {
    fn collect(catalogue: &Catalogue) -> Self {
        let mut declarations = BTreeSet::new();
        collect_declarations(&[], &catalogue.types, &mut declarations);
        Self {
            aliases: catalogue.aliases.keys().cloned().collect(),
            declarations,
        }
    }

    /// Resolve `reference` as seen from inside the declaration at `scope`.
    fn resolve(&self, reference: &TypeRef, scope: &[String]) -> Result<IrTypeUse, DefinitionError> {
        match reference {
            TypeRef::Named(name) => self.resolve_named(name, scope),
            TypeRef::Array { array, nullable } => Ok(IrTypeUse::Array {
                elements: Box::new(self.resolve(array, scope)?),
                nullable_elements: *nullable,
            }),
            TypeRef::Map {
                keys,
                values,
                nullable,
            } => Ok(IrTypeUse::Map {
                keys: Box::new(self.resolve(keys, scope)?),
                values: Box::new(self.resolve(values, scope)?),
                nullable_values: *nullable,
            }),
        }
    }

    fn resolve_named(&self, reference: &str, scope: &[String]) -> Result<IrTypeUse, DefinitionError> {
        if let Some(primitive) = Primitive::parse(reference) {
            return Ok(IrTypeUse::Primitive(primitive));
        }
        if self.aliases.contains(reference) {
            return Ok(IrTypeUse::Alias(QualifiedTypeName::alias(Name::derive(reference))));
        }

        let segments: Vec<&str> = reference.split('.').collect();
        for depth in (0..=scope.len()).rev() {
            let path = scope[..depth].iter().map(String::as_str).chain(segments.iter().copied());
            let candidate = qualified(path);
            if self.declarations.contains(&candidate) {
                return Ok(IrTypeUse::Declaration(candidate));
            }
        }

        Err(DefinitionError::UnknownType {
            reference: reference.to_string(),
            scope: if scope.is_empty() {
                "catalogue".to_string()
            } else {
                scope.join(".")
            },
        })
    }
}

fn qualified<'s>(path: impl Iterator<Item = &'s str>) -> QualifiedTypeName {
    let mut names: Vec<Name> = path.map(Name::derive).collect();
    let name = names.pop().unwrap_or_else(|| Name::derive(""));
    QualifiedTypeName::nested(names, name)
}

fn collect_declarations(
    scope: &[String],
    types: &IndexMap<String, TypeDef>,
    declarations: &mut BTreeSet<QualifiedTypeName>,
) {
    for (name, def) in types {
        declarations.insert(qualified(
            scope.iter().map(String::as_str).chain(std::iter::once(name.as_str())),
        ));
        if let TypeDef::Record { nested, .. } | TypeDef::Conditional { nested, .. } = def {
            let mut inner = scope.to_vec();
            inner.push(name.clone());
            collect_declarations(&inner, nested, declarations);
        }
    }
}

fn build_definition(catalogue: Catalogue) -> Result<ApiDefinition, DefinitionError> {
    let names = Names::collect(&catalogue);
    let mut registry = TypeRegistry::new();

    {
        let mut scope = DeclarationScope::new(&mut registry);
        for (name, def) in &catalogue.aliases {
            let primitive = Primitive::parse(&def.primitive).ok_or_else(|| {
                DefinitionError::UnknownType {
                    reference: def.primitive.clone(),
                    scope: name.clone(),
                }
            })?;
            scope.alias(name, primitive, &def.description)?;
        }
        for (name, def) in &catalogue.types {
            build_type(&mut scope, &[], name, def, &names)?;
        }
    }

    for name in &catalogue.auxiliary {
        match names.resolve_named(name, &[])? {
            IrTypeUse::Alias(name) | IrTypeUse::Declaration(name) => registry.mark_auxiliary(name)?,
            _ => {
                return Err(DefinitionError::UnknownType {
                    reference: name.clone(),
                    scope: "auxiliary".to_string(),
                })
            }
        }
    }

    let mut definition = ApiDefinition::new(registry);
    if let Some(languages) = catalogue.languages {
        definition.languages = languages;
    }
    for def in &catalogue.endpoints {
        definition.endpoints.push(build_endpoint(def, &names)?);
    }

    tracing::debug!(
        types = definition.registry.len(),
        endpoints = definition.endpoints.len(),
        "built definition"
    );
    Ok(definition)
}

fn build_type(
    scope: &mut DeclarationScope<'_>,
    parent: &[String],
    name: &str,
    def: &TypeDef,
    names: &Names,
) -> Result<(), DefinitionError> {
    let mut path = parent.to_vec();
    path.push(name.to_string());

    match def {
        TypeDef::Record {
            description,
            properties,
            nested,
        } => {
            build_nested(scope, &path, name, nested, names)?;
            let properties = build_properties(properties, &path, names)?;
            scope.record(name, properties, description)?;
        }
        TypeDef::Conditional {
            description,
            selector,
            side_property,
            nested_interpretations,
            shared,
            interpretations,
            nested,
        } => {
            build_nested(scope, &path, name, nested, names)?;
            let shared = build_properties(shared, &path, names)?;
            let mut arms = Vec::new();
            for (key, defs) in interpretations {
                for def in defs.iter() {
                    let mut arm = interpretation(key, names.resolve(&def.ty, &path)?, &def.description);
                    let modifiers = [
                        def.deprecated.then_some(InterpretationModifier::Deprecated),
                        def.nest_property.clone().map(InterpretationModifier::NestProperty),
                        def.since.map(InterpretationModifier::Since),
                        def.until.map(InterpretationModifier::Until),
                    ];
                    for modifier in modifiers.into_iter().flatten() {
                        arm = arm.with(modifier);
                    }
                    arms.push(arm);
                }
            }
            let selector = Selector::new(selector.as_str())
                .side_property(*side_property)
                .nested_interpretations(*nested_interpretations);
            scope.conditional(name, selector, shared, arms, description)?;
        }
        TypeDef::Enum {
            description,
            underlying,
            values,
        } => {
            let underlying = Primitive::parse(underlying).ok_or_else(|| DefinitionError::UnknownType {
                reference: underlying.clone(),
                scope: path.join("."),
            })?;
            let values = values
                .iter()
                .map(|value| match value {
                    EnumValueDef::Plain(value) => IrEnumValue {
                        value: value.clone(),
                        description: None,
                    },
                    EnumValueDef::Described { value, description } => IrEnumValue {
                        value: value.clone(),
                        description: Some(description.clone()),
                    },
                })
                .collect();
            scope.enumeration(name, underlying, values, description)?;
        }
        TypeDef::Tuple {
            description,
            elements,
        } => {
            let elements = elements
                .iter()
                .map(|e| Ok(element(&e.name, names.resolve(&e.ty, &path)?, &e.description)))
                .collect::<Result<Vec<_>, DefinitionError>>()?;
            scope.tuple(name, elements, description)?;
        }
    }
    Ok(())
}

fn build_nested(
    scope: &mut DeclarationScope<'_>,
    path: &[String],
    name: &str,
    nested: &IndexMap<String, TypeDef>,
    names: &Names,
) -> Result<(), DefinitionError> {
    if nested.is_empty() {
        return Ok(());
    }
    let mut inner = scope.nested(name);
    for (child, def) in nested {
        build_type(&mut inner, path, child, def, names)?;
    }
    Ok(())
}

fn build_properties(
    properties: &IndexMap<String, OneOrMany<PropertyDef>>,
    scope: &[String],
    names: &Names,
) -> Result<Vec<IrProperty>, DefinitionError> {
    let mut built = Vec::new();
    for (serial_name, defs) in properties {
        for def in defs.iter() {
            let display_name = def.name.as_deref().unwrap_or(serial_name);
            let mut p = property(display_name, names.resolve(&def.ty, scope)?, &def.description)
                .with(PropertyModifier::SerialName(serial_name.clone()));
            let modifiers = [
                def.optional.then_some(PropertyModifier::Optional),
                def.mandated_by.map(PropertyModifier::MandatedBy),
                def.deprecated.then_some(PropertyModifier::Deprecated),
                def.inline.then_some(PropertyModifier::Inline),
                def.lenient.then_some(PropertyModifier::Lenient),
                def.localized.then_some(PropertyModifier::Localized),
                def.since.map(PropertyModifier::Since),
                def.until.map(PropertyModifier::Until),
            ];
            for modifier in modifiers.into_iter().flatten() {
                p = p.with(modifier);
            }
            built.push(p);
        }
    }
    Ok(built)
}

fn build_endpoint(def: &EndpointDef, names: &Names) -> Result<Endpoint, DefinitionError> {
    let mut endpoint = Endpoint::new(def.name.as_str(), def.path.as_str())
        .summary(def.summary.as_str())
        .localized(def.localized);
    if let Some(seconds) = def.cache_seconds {
        endpoint = endpoint.cache(Duration::from_secs(seconds));
    }
    for scope in &def.security {
        endpoint = endpoint.security(*scope);
    }
    if let Some(since) = def.since {
        endpoint = endpoint.since(since);
    }
    if let Some(until) = def.until {
        endpoint = endpoint.until(until);
    }
    for (key, parameter) in &def.path_parameters {
        endpoint = endpoint.path_parameter(key, names.resolve(&parameter.ty, &[])?, &parameter.description);
    }
    for (key, parameter) in &def.query_parameters {
        endpoint = endpoint.query_parameter(
            key,
            names.resolve(&parameter.ty, &[])?,
            &parameter.description,
            parameter.optional,
        );
    }
    if let Some(schema) = &def.schema {
        endpoint = endpoint.schema(names.resolve(schema, &[])?);
    }
    for schema in &def.schemas {
        endpoint = endpoint.schema_since(schema.since, names.resolve(&schema.ty, &[])?);
    }
    if let Some(index) = &def.index {
        endpoint = endpoint.index(index.id_key.as_str(), index.queries.clone());
    }
    Ok(endpoint)
}
