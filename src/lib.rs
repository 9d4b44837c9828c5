//! API Schema
//!
//! Version-aware schema definitions for a remote API whose response shapes
//! change across dated schema versions.
//!
//! Declarations (records, tuples, enums, conditionals and aliases) are
//! written once with per-member validity windows. Resolving them at a
//! [`SchemaVersion`] yields a concrete, version-free schema tree together
//! with the queries that return it, keeping only the declarations those
//! queries actually reach.
//!
//! # Example
//!
//! ```
//! use api_schema::{
//!     build_api_version, property, ApiDefinition, ApiType, ApiVersionConfig, DeclarationScope,
//!     Endpoint, IrTypeUse, Primitive, PropertyModifier, QueryType, SchemaVersion,
//!     TypeRegistry,
//! };
//!
//! let mut registry = TypeRegistry::new();
//! let color = DeclarationScope::new(&mut registry)
//!     .record(
//!         "Color",
//!         vec![
//!             property("id", IrTypeUse::Primitive(Primitive::Integer), "The color ID."),
//!             property("name", IrTypeUse::Primitive(Primitive::String), "The color name.")
//!                 .with(PropertyModifier::Since(SchemaVersion::V2019_05_16)),
//!         ],
//!         "A dye color.",
//!     )
//!     .unwrap();
//!
//! let definition = ApiDefinition::new(registry).endpoint(
//!     Endpoint::new("Colors", "/v2/colors")
//!         .schema(color)
//!         .index("id", vec![QueryType::Ids, QueryType::ById]),
//! );
//!
//! let classic = build_api_version(&definition, &ApiVersionConfig::new(SchemaVersion::Classic))
//!     .unwrap();
//! let Some(ApiType::Record(record)) = classic.find_type("Color") else {
//!     panic!("expected a record");
//! };
//! // "name" only appears from 2019-05-16 on
//! assert_eq!(record.properties.len(), 1);
//! assert_eq!(classic.supported_queries.len(), 2);
//! ```
//!
//! # Version windows
//!
//! | Window | Meaning |
//! |--------|---------|
//! | `since` only | Present from that version on |
//! | `until` only | Present before that version (exclusive) |
//! | both | Present in `[since, until)` |
//! | neither | Present in every version |

mod api;
mod builder;
mod check;
mod constrained;
mod error;
mod export;
mod ir;
mod loader;
mod name;
mod query;
mod registry;
mod resolver;
mod schema;
mod types;
mod version;

pub use api::{build_api_version, materialize_queries, ApiDefinition, ApiVersion, ApiVersionConfig};
pub use builder::{
    element, interpretation, property, DeclarationScope, InterpretationModifier,
    PropertyModifier, Selector,
};
pub use check::{check_definition, CheckResult, CheckStatus, Diagnostic, EndpointResult, Severity};
pub use constrained::{VersionConstrained, VersionConstrainedBuilder, VersionConstrainedEntry};
pub use error::{
    ApiError, DefinitionError, DiscriminatorError, ExportError, LoadError, ResolveError,
    VersionError,
};
pub use export::{query_json_schema, type_json_schema, JSON_SCHEMA_DIALECT};
pub use ir::{
    IrAlias, IrConditional, IrEnum, IrEnumValue, IrInterpretation, IrProperty, IrRecord, IrTuple,
    IrTupleElement, IrTypeDeclaration, IrTypeUse,
};
pub use loader::{load_definition, load_definition_str};
pub use name::{Name, QualifiedTypeName};
pub use query::{Endpoint, IrApiQuery, PathParameter, QueryDetails, QueryParameter};
pub use registry::{Blueprint, TypeRegistry};
pub use resolver::{AliasCollector, ReferenceCollector, ResolverContext, TypeCollector};
pub use schema::{
    ApiPathParameter, ApiQuery, ApiQueryDetails, ApiQueryParameter, ApiType, SchemaAlias,
    SchemaConditional, SchemaEnum, SchemaEnumValue, SchemaInterpretation, SchemaProperty,
    SchemaRecord, SchemaTuple, SchemaTupleElement, SchemaType,
};
pub use types::{
    IdentifierBase, Language, Optionality, Primitive, QueryType, TokenScope, ALL_IDS_SENTINEL,
};
pub use version::{SchemaVersion, VersionConstraint};
