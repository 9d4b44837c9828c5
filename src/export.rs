//! JSON Schema export of resolved API versions.
//!
//! Every supported type of an [`ApiVersion`] becomes an entry under `$defs`;
//! references between types become `$ref`s into it. The exported documents
//! use draft 2020-12.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::api::ApiVersion;
use crate::error::ExportError;
use crate::name::QualifiedTypeName;
use crate::schema::{ApiQuery, ApiType, SchemaConditional, SchemaInterpretation, SchemaProperty, SchemaType};
use crate::types::{IdentifierBase, Primitive};

pub const JSON_SCHEMA_DIALECT: &str = "https://json-schema.org/draft/2020-12/schema";

/// A JSON Schema document for the type named `name` (its display name, e.g.
/// `"Item.Details"`).
///
/// # Errors
///
/// Returns `ExportError::UnknownType` if the type is not part of `api`.
pub fn type_json_schema(api: &ApiVersion, name: &str) -> Result<Value, ExportError> {
    let qualified = api
        .supported_types
        .keys()
        .find(|qualified| qualified.to_string() == name)
        .ok_or_else(|| ExportError::UnknownType {
            name: name.to_string(),
            version: api.schema_version,
        })?;
    Ok(document(api, json!({ "$ref": def_ref(qualified) })))
}

/// A JSON Schema document for the response of `query`.
pub fn query_json_schema(api: &ApiVersion, query: &ApiQuery) -> Value {
    document(api, type_use(&query.schema))
}

fn document(api: &ApiVersion, root: Value) -> Value {
    let mut doc = Map::new();
    doc.insert("$schema".into(), json!(JSON_SCHEMA_DIALECT));
    if let Value::Object(root) = root {
        doc.extend(root);
    }
    let defs: Map<String, Value> = api
        .supported_types
        .iter()
        .map(|(name, ty)| (name.to_string(), declaration(ty)))
        .collect();
    doc.insert("$defs".into(), Value::Object(defs));
    Value::Object(doc)
}

fn def_ref(name: &QualifiedTypeName) -> String {
    format!("#/$defs/{}", name)
}

fn primitive(primitive: Primitive) -> Value {
    match primitive {
        Primitive::Boolean => json!({ "type": "boolean" }),
        Primitive::Integer
        | Primitive::Bitfield
        | Primitive::Identifier(IdentifierBase::Integer) => json!({ "type": "integer" }),
        Primitive::Decimal => json!({ "type": "number" }),
        Primitive::String | Primitive::Identifier(IdentifierBase::String) => {
            json!({ "type": "string" })
        }
    }
}

fn nullable(schema: Value) -> Value {
    json!({ "anyOf": [schema, { "type": "null" }] })
}

fn type_use(ty: &SchemaType) -> Value {
    match ty {
        SchemaType::Primitive(p) => primitive(*p),
        SchemaType::Array {
            elements,
            nullable_elements,
        } => {
            let items = type_use(elements);
            let items = if *nullable_elements { nullable(items) } else { items };
            json!({ "type": "array", "items": items })
        }
        SchemaType::Map {
            keys,
            values,
            nullable_values,
        } => {
            let values = type_use(values);
            let values = if *nullable_values { nullable(values) } else { values };
            let mut schema = json!({ "type": "object", "additionalProperties": values });
            if matches!(
                **keys,
                SchemaType::Primitive(Primitive::Integer)
                    | SchemaType::Primitive(Primitive::Identifier(IdentifierBase::Integer))
            ) {
                schema["propertyNames"] = json!({ "pattern": "^-?[0-9]+$" });
            }
            schema
        }
        SchemaType::Alias(name) | SchemaType::Reference(name) => json!({ "$ref": def_ref(name) }),
    }
}

fn annotate(schema: &mut Value, description: &str, deprecated: bool) {
    if let Value::Object(map) = schema {
        if !description.is_empty() {
            map.insert("description".into(), json!(description));
        }
        if deprecated {
            map.insert("deprecated".into(), json!(true));
        }
    }
}

fn declaration(ty: &ApiType) -> Value {
    let mut schema = match ty {
        ApiType::Alias(alias) => primitive(alias.primitive),
        ApiType::Enum(enumeration) => {
            let values: Vec<Value> = enumeration
                .values
                .iter()
                .map(|v| match enumeration.underlying {
                    Primitive::Integer | Primitive::Identifier(IdentifierBase::Integer) => v
                        .value
                        .parse::<i64>()
                        .map_or_else(|_| json!(v.value), |n| json!(n)),
                    _ => json!(v.value),
                })
                .collect();
            let mut schema = primitive(enumeration.underlying);
            schema["enum"] = Value::Array(values);
            schema
        }
        ApiType::Record(record) => object(&record.properties),
        ApiType::Tuple(tuple) => {
            let items: Vec<Value> = tuple
                .elements
                .iter()
                .map(|e| {
                    let mut item = type_use(&e.ty);
                    annotate(&mut item, &e.description, false);
                    item
                })
                .collect();
            json!({
                "type": "array",
                "prefixItems": items,
                "minItems": items.len(),
                "maxItems": items.len()
            })
        }
        ApiType::Conditional(conditional) => conditional_schema(conditional),
    };
    annotate(&mut schema, ty.description(), false);
    schema
}

/// An object schema. Inline properties contribute their type through
/// `allOf`; lenient properties also accept `null`.
fn object(properties: &BTreeMap<String, SchemaProperty>) -> Value {
    let mut schemas = Map::new();
    let mut required = Vec::new();
    let mut inline = Vec::new();

    for (serial_name, property) in properties {
        if property.is_inline {
            inline.push(type_use(&property.ty));
            continue;
        }
        let mut schema = type_use(&property.ty);
        if property.is_lenient {
            schema = nullable(schema);
        }
        annotate(&mut schema, &property.description, property.is_deprecated);
        schemas.insert(serial_name.clone(), schema);
        if property.optionality.is_required() {
            required.push(json!(serial_name));
        }
    }

    let mut schema = json!({ "type": "object", "properties": schemas });
    if !required.is_empty() {
        schema["required"] = Value::Array(required);
    }
    if !inline.is_empty() {
        schema["allOf"] = Value::Array(inline);
    }
    schema
}

fn conditional_schema(conditional: &SchemaConditional) -> Value {
    let arms: Vec<Value> = conditional
        .interpretations
        .values()
        .map(|i| arm(conditional, i))
        .collect();
    // A selector in a side property cannot be checked from the object alone
    let choice = if conditional.selector_in_side_property {
        json!({ "anyOf": arms })
    } else {
        json!({ "oneOf": arms })
    };

    let mut schema = object(&conditional.shared_properties);
    match schema.get_mut("allOf") {
        Some(Value::Array(all_of)) => all_of.push(choice),
        _ => schema["allOf"] = json!([choice]),
    }
    schema
}

fn arm(conditional: &SchemaConditional, interpretation: &SchemaInterpretation) -> Value {
    let mut body = if conditional.interpretation_in_nested_property {
        let key = interpretation
            .nest_property
            .as_deref()
            .unwrap_or(&interpretation.key);
        json!({ "properties": { key: type_use(&interpretation.ty) }, "required": [key] })
    } else {
        type_use(&interpretation.ty)
    };
    annotate(&mut body, &interpretation.description, interpretation.is_deprecated);

    if conditional.selector_in_side_property {
        return body;
    }
    let selector = &conditional.selector;
    json!({
        "allOf": [
            { "properties": { selector: { "const": interpretation.key } }, "required": [selector] },
            body
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{build_api_version, ApiDefinition, ApiVersionConfig};
    use crate::builder::{element, interpretation, property, DeclarationScope, PropertyModifier, Selector};
    use crate::ir::IrTypeUse;
    use crate::query::Endpoint;
    use crate::registry::TypeRegistry;
    use crate::version::SchemaVersion;

    fn api() -> ApiVersion {
        let mut registry = TypeRegistry::new();
        let root = {
            let mut scope = DeclarationScope::new(&mut registry);
            let item_id = scope.alias("ItemId", Primitive::Integer, "").unwrap();
            let point = scope
                .tuple(
                    "Point",
                    vec![
                        element("x", IrTypeUse::Primitive(Primitive::Decimal), ""),
                        element("y", IrTypeUse::Primitive(Primitive::Decimal), ""),
                    ],
                    "",
                )
                .unwrap();
            let (armor, weapon) = {
                let mut nested = scope.nested("Details");
                let armor = nested
                    .record("Armor", vec![property("defense", IrTypeUse::Primitive(Primitive::Integer), "")], "")
                    .unwrap();
                let weapon = nested
                    .record("Weapon", vec![property("damage", IrTypeUse::Primitive(Primitive::Integer), "")], "")
                    .unwrap();
                (armor, weapon)
            };
            let details = scope
                .conditional(
                    "Details",
                    Selector::new("type"),
                    vec![],
                    vec![interpretation("Armor", armor, ""), interpretation("Weapon", weapon, "")],
                    "",
                )
                .unwrap();
            scope
                .record(
                    "Item",
                    vec![
                        property("id", item_id, "The item ID."),
                        property("name", IrTypeUse::Primitive(Primitive::String), "")
                            .with(PropertyModifier::Optional),
                        property("position", point, "").with(PropertyModifier::Optional),
                        property("details", details, "").with(PropertyModifier::Optional),
                    ],
                    "An item.",
                )
                .unwrap()
        };

        let definition =
            ApiDefinition::new(registry).endpoint(Endpoint::new("Items", "/v2/items").schema(IrTypeUse::array(root)));
        build_api_version(&definition, &ApiVersionConfig::new(SchemaVersion::latest())).unwrap()
    }

    fn validator(schema: &Value) -> jsonschema::Validator {
        jsonschema::validator_for(schema).unwrap()
    }

    #[test]
    fn record_schema_validates_payloads() {
        let api = api();
        let schema = type_json_schema(&api, "Item").unwrap();
        let validator = validator(&schema);

        assert_eq!(schema["$schema"], JSON_SCHEMA_DIALECT);
        assert!(validator.is_valid(&json!({ "id": 1, "name": "Sword" })));
        assert!(!validator.is_valid(&json!({ "name": "Sword" })));
        assert!(!validator.is_valid(&json!({ "id": "one" })));
    }

    #[test]
    fn conditional_schema_checks_selector() {
        let api = api();
        let validator = validator(&type_json_schema(&api, "Details").unwrap());

        assert!(validator.is_valid(&json!({ "type": "Armor", "defense": 12 })));
        assert!(!validator.is_valid(&json!({ "type": "Armor", "defense": "high" })));
        assert!(!validator.is_valid(&json!({ "type": "Trinket" })));
        assert!(!validator.is_valid(&json!({ "defense": 12 })));
    }

    #[test]
    fn tuple_schema_fixes_length() {
        let api = api();
        let validator = validator(&type_json_schema(&api, "Point").unwrap());

        assert!(validator.is_valid(&json!([1.5, 2.0])));
        assert!(!validator.is_valid(&json!([1.5])));
        assert!(!validator.is_valid(&json!([1.5, 2.0, 3.0])));
    }

    #[test]
    fn query_schema_wraps_response() {
        let api = api();
        let validator = validator(&query_json_schema(&api, &api.supported_queries[0]));

        assert!(validator.is_valid(&json!([{ "id": 1 }, { "id": 2, "position": [0, 0] }])));
        assert!(!validator.is_valid(&json!({ "id": 1 })));
    }

    #[test]
    fn unknown_type_errors() {
        let api = api();
        assert_eq!(
            type_json_schema(&api, "Nope").unwrap_err(),
            ExportError::UnknownType {
                name: "Nope".into(),
                version: SchemaVersion::latest()
            }
        );
    }
}
