//! Endpoint definitions and the queries they produce.
//!
//! An [`Endpoint`] describes one remote resource. Plain endpoints produce a
//! single [`IrApiQuery`]. Index endpoints produce one query per
//! [`QueryType`], each derived from the same base schema.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::constrained::{VersionConstrained, VersionConstrainedBuilder};
use crate::error::{DefinitionError, ResolveError, VersionError};
use crate::ir::{IrTypeDeclaration, IrTypeUse};
use crate::name::Name;
use crate::registry::TypeRegistry;
use crate::resolver::ResolverContext;
use crate::schema::{ApiPathParameter, ApiQuery, ApiQueryDetails, ApiQueryParameter};
use crate::types::{Primitive, QueryType, TokenScope, ALL_IDS_SENTINEL};
use crate::version::{SchemaVersion, VersionConstraint};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathParameter {
    pub key: String,
    pub ty: IrTypeUse,
    pub name: Name,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryParameter {
    pub key: String,
    pub ty: IrTypeUse,
    pub name: Name,
    pub description: String,
    pub is_optional: bool,
}

impl QueryParameter {
    fn new(key: &str, ty: IrTypeUse, description: impl Into<String>, is_optional: bool) -> Self {
        Self {
            key: key.to_string(),
            ty,
            name: Name::derive(key),
            description: description.into(),
            is_optional,
        }
    }
}

/// Marks an index query variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryDetails {
    pub query_type: QueryType,
    pub id_type: IrTypeUse,
}

/// A query before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IrApiQuery {
    pub path: String,
    pub endpoint: String,
    pub summary: String,
    pub path_parameters: BTreeMap<String, PathParameter>,
    pub query_parameters: BTreeMap<String, QueryParameter>,
    pub query_suffix: Option<String>,
    pub cache: Option<Duration>,
    pub security: BTreeSet<TokenScope>,
    pub is_localized: bool,
    /// Versions at which the query exists.
    pub window: VersionConstraint,
    pub schema: VersionConstrained<IrTypeUse>,
    pub details: Option<QueryDetails>,
}

impl IrApiQuery {
    /// Resolve this query at `version`.
    ///
    /// Returns `Ok(None)` if the query does not exist at `version`.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError` if a referenced type cannot be resolved.
    pub fn resolve(
        &self,
        version: SchemaVersion,
        ctx: &mut ResolverContext<'_>,
    ) -> Result<Option<ApiQuery>, ResolveError> {
        let schema = match self.schema.at(version) {
            Some(schema) if self.window.contains(version) => schema,
            _ => {
                tracing::debug!(path = %self.path, %version, window = %self.window, "query outside its window");
                return Ok(None);
            }
        };

        let mut path_parameters = BTreeMap::new();
        for (key, parameter) in &self.path_parameters {
            path_parameters.insert(
                key.clone(),
                ApiPathParameter {
                    key: parameter.key.clone(),
                    ty: parameter.ty.resolve(version, ctx)?,
                    name: parameter.name.clone(),
                    description: parameter.description.clone(),
                },
            );
        }

        let mut query_parameters = BTreeMap::new();
        for (key, parameter) in &self.query_parameters {
            query_parameters.insert(
                key.clone(),
                ApiQueryParameter {
                    key: parameter.key.clone(),
                    ty: parameter.ty.resolve(version, ctx)?,
                    name: parameter.name.clone(),
                    description: parameter.description.clone(),
                    is_optional: parameter.is_optional,
                },
            );
        }

        let details = match &self.details {
            Some(details) => Some(ApiQueryDetails {
                query_type: details.query_type,
                id_type: details.id_type.resolve(version, ctx)?,
            }),
            None => None,
        };

        Ok(Some(ApiQuery {
            path: self.path.clone(),
            endpoint: self.endpoint.clone(),
            summary: self.summary.clone(),
            path_parameters,
            query_parameters,
            query_suffix: self.query_suffix.clone(),
            cache: self.cache,
            details,
            security: self.security.clone(),
            is_localized: self.is_localized,
            schema: schema.resolve(version, ctx)?,
        }))
    }
}

/// Builder for one remote resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    name: String,
    path: String,
    summary: String,
    cache: Option<Duration>,
    security: BTreeSet<TokenScope>,
    is_localized: bool,
    since: SchemaVersion,
    until: Option<SchemaVersion>,
    path_parameters: Vec<PathParameter>,
    query_parameters: Vec<QueryParameter>,
    schemas: Vec<(SchemaVersion, IrTypeUse)>,
    index: Option<(String, Vec<QueryType>)>,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            summary: String::new(),
            cache: None,
            security: BTreeSet::new(),
            is_localized: false,
            since: SchemaVersion::Classic,
            until: None,
            path_parameters: Vec::new(),
            query_parameters: Vec::new(),
            schemas: Vec::new(),
            index: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn cache(mut self, cache: Duration) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn security(mut self, scope: TokenScope) -> Self {
        self.security.insert(scope);
        self
    }

    pub fn localized(mut self, is_localized: bool) -> Self {
        self.is_localized = is_localized;
        self
    }

    pub fn since(mut self, since: SchemaVersion) -> Self {
        self.since = since;
        self
    }

    pub fn until(mut self, until: SchemaVersion) -> Self {
        self.until = Some(until);
        self
    }

    pub fn path_parameter(mut self, key: &str, ty: IrTypeUse, description: &str) -> Self {
        self.path_parameters.push(PathParameter {
            key: key.to_string(),
            ty,
            name: Name::derive(key),
            description: description.to_string(),
        });
        self
    }

    pub fn query_parameter(
        mut self,
        key: &str,
        ty: IrTypeUse,
        description: &str,
        is_optional: bool,
    ) -> Self {
        self.query_parameters
            .push(QueryParameter::new(key, ty, description, is_optional));
        self
    }

    /// The response schema for every version.
    pub fn schema(self, ty: IrTypeUse) -> Self {
        self.schema_since(SchemaVersion::Classic, ty)
    }

    /// A response schema valid from `since` until the next override.
    pub fn schema_since(mut self, since: SchemaVersion, ty: IrTypeUse) -> Self {
        self.schemas.push((since, ty));
        self
    }

    /// Make this an index endpoint whose elements are identified by the
    /// property with serial name `id_type_key`.
    pub fn index(mut self, id_type_key: impl Into<String>, query_types: Vec<QueryType>) -> Self {
        self.index = Some((id_type_key.into(), query_types));
        self
    }

    /// Materialize the queries of this endpoint.
    ///
    /// # Errors
    ///
    /// Returns a version error for a malformed window or duplicate schema
    /// override, and `MissingIdProperty`, `InvalidIdType` or
    /// `InvalidIdSchema` if the ID type of an index endpoint cannot be
    /// determined.
    pub fn queries(&self, registry: &TypeRegistry) -> Result<Vec<IrApiQuery>, DefinitionError> {
        let window = VersionConstraint::new(self.since, self.until)?;
        let schema = self.schema_container(window)?;

        let base = IrApiQuery {
            path: self.path.clone(),
            endpoint: self.name.clone(),
            summary: self.summary.clone(),
            path_parameters: self
                .path_parameters
                .iter()
                .map(|p| (p.key.clone(), p.clone()))
                .collect(),
            query_parameters: self
                .query_parameters
                .iter()
                .map(|p| (p.key.clone(), p.clone()))
                .collect(),
            query_suffix: None,
            cache: self.cache,
            security: self.security.clone(),
            is_localized: self.is_localized,
            window,
            schema,
            details: None,
        };

        let Some((id_type_key, query_types)) = &self.index else {
            return Ok(vec![base]);
        };

        let id_type = extract_id_type(registry, &base, id_type_key)?;
        tracing::debug!(endpoint = %self.name, id_type = ?id_type, "building index queries");
        Ok(query_types
            .iter()
            .map(|query_type| variant(&base, *query_type, &id_type))
            .collect())
    }

    fn schema_container(
        &self,
        window: VersionConstraint,
    ) -> Result<VersionConstrained<IrTypeUse>, DefinitionError> {
        let mut overrides = self.schemas.clone();
        overrides.sort_by_key(|(since, _)| *since);
        if let Some(pair) = overrides.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(VersionError::DuplicateSince { since: pair[1].0 }.into());
        }

        let mut builder = VersionConstrainedBuilder::new();
        for (since, ty) in overrides {
            builder.add(ty, since, None)?;
        }
        Ok(builder.build()?.restrict(window)?)
    }
}

/// The type of the ID property of the base schema.
///
/// The schema entry at [`SchemaVersion::Classic`] is the canonical one; if the
/// query starts later, its earliest entry is used instead.
fn extract_id_type(
    registry: &TypeRegistry,
    base: &IrApiQuery,
    key: &str,
) -> Result<IrTypeUse, DefinitionError> {
    let schema = base
        .schema
        .at(SchemaVersion::Classic)
        .unwrap_or(&base.schema.first().data);

    let IrTypeUse::Declaration(name) = schema else {
        return Err(DefinitionError::InvalidIdSchema {
            path: base.path.clone(),
            actual: describe(schema).to_string(),
        });
    };
    let blueprint = registry
        .get(name)
        .ok_or_else(|| DefinitionError::MissingDeclaration { name: name.clone() })?;
    let declaration = blueprint
        .at(SchemaVersion::Classic)
        .unwrap_or_else(|| blueprint.first());
    let properties = declaration
        .properties()
        .ok_or_else(|| DefinitionError::InvalidIdSchema {
            path: base.path.clone(),
            actual: declaration.kind().to_string(),
        })?;
    let property = properties
        .get(key)
        .ok_or_else(|| DefinitionError::MissingIdProperty {
            path: base.path.clone(),
            key: key.to_string(),
        })?;

    let invalid = |actual: String| DefinitionError::InvalidIdType {
        path: base.path.clone(),
        key: key.to_string(),
        actual,
    };
    match &property.ty {
        IrTypeUse::Primitive(primitive) if primitive.is_identifier() => Ok(property.ty.clone()),
        IrTypeUse::Primitive(primitive) => Err(invalid(primitive.to_string())),
        IrTypeUse::Alias(alias) => match registry.get(alias).map(|b| b.first()) {
            Some(IrTypeDeclaration::Alias(decl)) if decl.primitive.is_identifier() => {
                Ok(property.ty.clone())
            }
            Some(IrTypeDeclaration::Alias(decl)) => {
                Err(invalid(format!("alias {} of {}", alias, decl.primitive)))
            }
            _ => Err(DefinitionError::MissingDeclaration {
                name: alias.clone(),
            }),
        },
        other => Err(invalid(describe(other).to_string())),
    }
}

fn describe(ty: &IrTypeUse) -> &'static str {
    match ty {
        IrTypeUse::Primitive(_) => "primitive",
        IrTypeUse::Array { .. } => "array",
        IrTypeUse::Map { .. } => "map",
        IrTypeUse::Alias(_) => "alias",
        IrTypeUse::Declaration(_) => "declaration",
    }
}

fn variant(base: &IrApiQuery, query_type: QueryType, id_type: &IrTypeUse) -> IrApiQuery {
    let mut query = base.clone();
    query.query_suffix = Some(query_type.suffix().to_string());
    query.details = Some(QueryDetails {
        query_type,
        id_type: id_type.clone(),
    });

    let mut add = |parameter: QueryParameter| {
        query.query_parameters.insert(parameter.key.clone(), parameter);
    };
    match query_type {
        QueryType::Ids => {}
        QueryType::ById => add(QueryParameter::new(
            "id",
            id_type.clone(),
            "The ID of the requested element.",
            false,
        )),
        QueryType::ByIds { supports_all } => {
            let description = if supports_all {
                format!(
                    "The IDs of the requested elements, or \"{}\" to request every element.",
                    ALL_IDS_SENTINEL
                )
            } else {
                "The IDs of the requested elements.".to_string()
            };
            add(QueryParameter::new(
                "ids",
                IrTypeUse::array(id_type.clone()),
                description,
                false,
            ));
        }
        QueryType::ByPage => {
            add(QueryParameter::new(
                "page",
                IrTypeUse::Primitive(Primitive::Integer),
                "The index of the requested page.",
                false,
            ));
            add(QueryParameter::new(
                "page_size",
                IrTypeUse::Primitive(Primitive::Integer),
                "The size of the requested page.",
                true,
            ));
        }
    }

    query.schema = match query_type {
        QueryType::Ids => base.schema.map_data(|_| IrTypeUse::array(id_type.clone())),
        QueryType::ById => base.schema.clone(),
        QueryType::ByIds { .. } | QueryType::ByPage => base.schema.map_data(|s| IrTypeUse::array(s.clone())),
    };
    query
}
