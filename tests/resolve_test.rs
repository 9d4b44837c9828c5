//! Integration tests for schema resolution.

use api_schema::{
    build_api_version, interpretation, property, ApiDefinition, ApiType, ApiVersion,
    ApiVersionConfig, Blueprint, DeclarationScope, DiscriminatorError, Endpoint, IrTypeUse,
    Primitive, PropertyModifier, QueryType, ResolveError, ResolverContext, SchemaType,
    SchemaVersion, Selector, TypeCollector, TypeRegistry, VersionConstrainedBuilder,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use SchemaVersion::*;

const V1: SchemaVersion = V2019_02_21;
const V2: SchemaVersion = V2019_03_22;
const V3: SchemaVersion = V2019_05_16;
const V4: SchemaVersion = V2019_05_21;
const V5: SchemaVersion = V2019_05_22;

fn integer() -> IrTypeUse {
    IrTypeUse::Primitive(Primitive::Integer)
}

fn string() -> IrTypeUse {
    IrTypeUse::Primitive(Primitive::String)
}

fn build(definition: &ApiDefinition, version: SchemaVersion) -> ApiVersion {
    build_api_version(definition, &ApiVersionConfig::new(version)).unwrap()
}

fn record<'a>(api: &'a ApiVersion, name: &str) -> &'a api_schema::SchemaRecord {
    match api.find_type(name) {
        Some(ApiType::Record(record)) => record,
        other => panic!("expected record {name}, got {other:?}"),
    }
}

// === Version-Constrained Container ===

mod version_constrained {
    use super::*;
    use pretty_assertions::assert_eq;

    fn container() -> api_schema::VersionConstrained<&'static str> {
        let mut builder = VersionConstrainedBuilder::new();
        builder.add("a", Classic, Some(V2)).unwrap();
        builder.add("b", V2, None).unwrap();
        builder.add("c", V4, None).unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn entries_never_overlap() {
        let container = container();
        let entries = container.entries();

        for (i, a) in entries.iter().enumerate() {
            for b in &entries[i + 1..] {
                assert!(!a.constraint().overlaps(&b.constraint()), "{a:?} / {b:?}");
            }
        }
        assert_eq!(entries.iter().filter(|e| e.until.is_none()).count(), 1);
        // The open "b" entry was closed where "c" starts
        assert_eq!(entries[1].until, Some(V4));
    }

    #[test]
    fn every_supported_version_has_an_entry_containing_it() {
        let container = container();
        for version in container.versions() {
            let entry = container.get(version).unwrap();
            assert!(entry.contains(version), "{version}");
        }
        assert_eq!(container.versions().count(), SchemaVersion::ALL.len());
    }

    #[test]
    fn overlapping_closed_windows_are_rejected() {
        let mut builder = VersionConstrainedBuilder::new();
        builder.add(1, V1, Some(V3)).unwrap();
        assert!(builder.add(2, V2, Some(V4)).is_err());
    }

    #[test]
    fn readjust_is_idempotent() {
        let once = container().readjust_constraints(V1, Some(V5)).unwrap();
        let twice = once.clone().readjust_constraints(V1, Some(V5)).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.constraint().since(), V1);
        assert_eq!(once.constraint().until(), Some(V5));
    }

    #[test]
    fn map_data_commutes_with_get() {
        let container = container();
        let mapped = container.map_data(|s| s.len() + s.as_bytes()[0] as usize);

        for version in container.versions() {
            let original = container.at(version).unwrap();
            assert_eq!(
                mapped.at(version).copied(),
                Some(original.len() + original.as_bytes()[0] as usize)
            );
        }
    }
}

// === Versioned Records ===

mod versioned_records {
    use super::*;
    use pretty_assertions::assert_eq;

    /// `age` is an integer in `[V1, V3)` and a string from V3 on.
    fn definition() -> ApiDefinition {
        let mut registry = TypeRegistry::new();
        let person = DeclarationScope::new(&mut registry)
            .record(
                "Person",
                vec![
                    property("age", integer(), "")
                        .with(PropertyModifier::Since(V1))
                        .with(PropertyModifier::Until(V3)),
                    property("age", string(), "").with(PropertyModifier::Since(V3)),
                ],
                "",
            )
            .unwrap();
        ApiDefinition::new(registry).endpoint(Endpoint::new("People", "/v2/people").since(V1).schema(person))
    }

    #[test]
    fn two_significant_versions() {
        let definition = definition();
        let name = api_schema::QualifiedTypeName::declaration(api_schema::Name::derive("Person"));
        let Some(Blueprint::Versioned(container)) = definition.registry.get(&name) else {
            panic!("expected a versioned blueprint");
        };
        assert_eq!(container.significant_versions().into_iter().collect::<Vec<_>>(), [V1, V3]);
    }

    #[test]
    fn each_version_sees_its_property() {
        let definition = definition();

        let at_v2 = build(&definition, V2);
        assert_eq!(record(&at_v2, "Person").properties["age"].ty, SchemaType::Primitive(Primitive::Integer));

        let at_v4 = build(&definition, V4);
        assert_eq!(record(&at_v4, "Person").properties["age"].ty, SchemaType::Primitive(Primitive::String));
    }

    #[test]
    fn unavailable_before_first_member() {
        let definition = definition();
        let mut aliases = TypeCollector::new();
        let mut references = TypeCollector::new();
        let mut ctx = ResolverContext::new(&definition.registry, &mut aliases, &mut references);

        let name = api_schema::QualifiedTypeName::declaration(api_schema::Name::derive("Person"));
        assert!(matches!(
            ctx.resolve_declaration(&name, Classic),
            Err(ResolveError::UnavailableDeclaration { version: Classic, .. })
        ));
    }

    #[test]
    fn duplicate_member_at_a_version_is_rejected() {
        let mut registry = TypeRegistry::new();
        let result = DeclarationScope::new(&mut registry).record(
            "Broken",
            vec![
                property("age", integer(), "").with(PropertyModifier::Until(V3)),
                property("age", string(), "").with(PropertyModifier::Since(V2)),
            ],
            "",
        );
        assert!(matches!(
            result,
            Err(api_schema::DefinitionError::DuplicateMember { .. })
        ));
    }
}

// === Query Variants ===

mod query_variants {
    use super::*;
    use pretty_assertions::assert_eq;

    fn definition(query_types: Vec<QueryType>) -> ApiDefinition {
        let mut registry = TypeRegistry::new();
        let item = DeclarationScope::new(&mut registry)
            .record(
                "Item",
                vec![property("id", integer(), ""), property("name", string(), "")],
                "",
            )
            .unwrap();
        ApiDefinition::new(registry).endpoint(Endpoint::new("Items", "/v2/items").schema(item).index("id", query_types))
    }

    fn item() -> SchemaType {
        SchemaType::Reference(api_schema::QualifiedTypeName::declaration(api_schema::Name::derive("Item")))
    }

    #[test]
    fn by_ids_wraps_response_and_requires_ids() {
        let definition = definition(vec![QueryType::ByIds { supports_all: false }]);
        let api = build(&definition, SchemaVersion::latest());

        assert_eq!(api.supported_queries.len(), 1);
        let query = &api.supported_queries[0];
        assert_eq!(query.schema, SchemaType::array(item()));
        assert_eq!(query.query_suffix.as_deref(), Some("ByIDs"));

        assert_eq!(query.query_parameters.len(), 1);
        let ids = &query.query_parameters["ids"];
        assert_eq!(ids.ty, SchemaType::array(SchemaType::Primitive(Primitive::Integer)));
        assert!(!ids.is_optional);
    }

    #[test]
    fn every_variant() {
        let definition = definition(vec![
            QueryType::Ids,
            QueryType::ById,
            QueryType::ByIds { supports_all: true },
            QueryType::ByPage,
        ]);
        let api = build(&definition, SchemaVersion::latest());

        let suffixes: Vec<_> = api
            .supported_queries
            .iter()
            .map(|q| q.query_suffix.clone().unwrap_or_default())
            .collect();
        assert_eq!(suffixes, ["IDs", "ByID", "ByIDs", "ByPage"]);

        let [ids, by_id, by_ids, by_page] = &api.supported_queries[..] else {
            panic!("expected four queries");
        };
        assert_eq!(ids.schema, SchemaType::array(SchemaType::Primitive(Primitive::Integer)));
        assert_eq!(by_id.schema, item());
        assert!(by_ids.query_parameters["ids"].description.contains("\"all\""));
        assert_eq!(by_page.schema, SchemaType::array(item()));
        assert!(!by_page.query_parameters["page"].is_optional);
        assert!(by_page.query_parameters["page_size"].is_optional);
    }

    #[test]
    fn missing_id_property_is_a_definition_error() {
        let mut registry = TypeRegistry::new();
        let item = DeclarationScope::new(&mut registry)
            .record("Item", vec![property("name", string(), "")], "")
            .unwrap();
        let definition = ApiDefinition::new(registry)
            .endpoint(Endpoint::new("Items", "/v2/items").schema(item).index("id", vec![QueryType::ById]));

        assert!(matches!(
            build_api_version(&definition, &ApiVersionConfig::new(Classic)),
            Err(api_schema::ApiError::Definition(
                api_schema::DefinitionError::MissingIdProperty { .. }
            ))
        ));
    }
}

// === Query Windows ===

mod query_windows {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn query_outside_window_is_omitted() {
        let definition = ApiDefinition::new(TypeRegistry::new())
            .endpoint(Endpoint::new("Build", "/v2/build").since(V2).until(V5).schema(integer()));

        assert!(build(&definition, V1).supported_queries.is_empty());
        assert_eq!(build(&definition, V3).supported_queries.len(), 1);
        assert!(build(&definition, V5).supported_queries.is_empty());
    }

    #[test]
    fn schema_override_applies_from_its_version() {
        let definition = ApiDefinition::new(TypeRegistry::new()).endpoint(
            Endpoint::new("Build", "/v2/build")
                .schema(integer())
                .schema_since(V3, string()),
        );

        assert_eq!(
            build(&definition, V2).supported_queries[0].schema,
            SchemaType::Primitive(Primitive::Integer)
        );
        assert_eq!(
            build(&definition, V3).supported_queries[0].schema,
            SchemaType::Primitive(Primitive::String)
        );
    }
}

// === Conditionals ===

mod conditionals {
    use super::*;
    use pretty_assertions::assert_eq;

    fn details(side_property: bool) -> ApiVersion {
        let mut registry = TypeRegistry::new();
        let details = {
            let mut scope = DeclarationScope::new(&mut registry);
            let (armor, weapon) = {
                let mut nested = scope.nested("Details");
                let armor = nested
                    .record("Armor", vec![property("defense", integer(), "")], "")
                    .unwrap();
                let weapon = nested
                    .record("Weapon", vec![property("damage", integer(), "")], "")
                    .unwrap();
                (armor, weapon)
            };
            scope
                .conditional(
                    "Details",
                    Selector::new("type").side_property(side_property),
                    vec![],
                    vec![interpretation("Armor", armor, ""), interpretation("Weapon", weapon, "")],
                    "",
                )
                .unwrap()
        };
        let definition =
            ApiDefinition::new(registry).endpoint(Endpoint::new("Details", "/v2/details").schema(details));
        build(&definition, SchemaVersion::latest())
    }

    fn conditional(api: &ApiVersion) -> &api_schema::SchemaConditional {
        match api.find_type("Details") {
            Some(ApiType::Conditional(conditional)) => conditional,
            other => panic!("expected conditional, got {other:?}"),
        }
    }

    #[test]
    fn missing_side_property_is_reported() {
        let api = details(true);
        let conditional = conditional(&api);

        // The selector in the payload itself is ignored
        let payload = json!({ "type": "Armor", "defense": 3 });
        assert!(matches!(
            conditional.select_interpretation(&payload, None),
            Err(DiscriminatorError::Missing { .. })
        ));
        assert_eq!(
            conditional
                .select_interpretation(&payload, Some("Weapon"))
                .unwrap()
                .key,
            "Weapon"
        );
    }

    #[test]
    fn inline_selector_picks_arm() {
        let api = details(false);
        let conditional = conditional(&api);

        let armor = conditional
            .select_interpretation(&json!({ "type": "Armor" }), None)
            .unwrap();
        assert_eq!(armor.key, "Armor");
        assert!(matches!(
            conditional.select_interpretation(&json!({ "type": "Trinket" }), None),
            Err(DiscriminatorError::Unknown { value, .. }) if value == "Trinket"
        ));
    }

    #[test]
    fn interpretations_are_reachable() {
        let api = details(false);
        let names: Vec<_> = api.supported_types.keys().map(|n| n.to_string()).collect();
        assert_eq!(names, ["Details", "Details.Armor", "Details.Weapon"]);
    }
}

// === Consistent Declarations ===

mod consistency {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn consistent_declaration_is_identical_at_every_version() {
        let mut registry = TypeRegistry::new();
        let coin = {
            let mut scope = DeclarationScope::new(&mut registry);
            let id = scope.alias("CoinId", Primitive::Integer, "").unwrap();
            scope
                .record(
                    "Coin",
                    vec![property("id", id, ""), property("value", integer(), "")],
                    "",
                )
                .unwrap()
        };
        let definition = ApiDefinition::new(registry).endpoint(Endpoint::new("Coins", "/v2/coins").schema(coin));

        let classic = build(&definition, Classic);
        for &version in SchemaVersion::ALL {
            let api = build(&definition, version);
            assert_eq!(api.supported_types, classic.supported_types, "{version}");
            assert_eq!(api.supported_queries[0].schema, classic.supported_queries[0].schema);
        }
    }
}
