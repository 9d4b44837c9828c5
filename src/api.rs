//! Assembly of complete API versions.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexSet;
use serde::Serialize;

use crate::error::ApiError;
use crate::name::QualifiedTypeName;
use crate::query::{Endpoint, IrApiQuery};
use crate::registry::TypeRegistry;
use crate::resolver::{ResolverContext, TypeCollector};
use crate::schema::{ApiQuery, ApiType};
use crate::types::Language;
use crate::version::SchemaVersion;

/// Everything needed to build any API version: the declarations and the
/// endpoints that reference them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiDefinition {
    pub registry: TypeRegistry,
    pub endpoints: Vec<Endpoint>,
    pub languages: BTreeSet<Language>,
}

impl ApiDefinition {
    /// A definition supporting every language.
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            registry,
            endpoints: Vec::new(),
            languages: Language::ALL.iter().copied().collect(),
        }
    }

    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    pub fn find_endpoint(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.name() == name)
    }
}

/// Which API version to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVersionConfig {
    version: SchemaVersion,
    endpoints: Option<BTreeSet<String>>,
    include_auxiliary: bool,
}

impl ApiVersionConfig {
    /// Every endpoint at `version`, without auxiliary declarations.
    pub fn new(version: SchemaVersion) -> Self {
        Self {
            version,
            endpoints: None,
            include_auxiliary: false,
        }
    }

    /// Restrict the build to the named endpoints.
    pub fn endpoints<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Also resolve the registry's auxiliary roots.
    pub fn include_auxiliary(mut self, include: bool) -> Self {
        self.include_auxiliary = include;
        self
    }

    pub fn version(&self) -> SchemaVersion {
        self.version
    }
}

/// A fully resolved API at one schema version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiVersion {
    pub schema_version: SchemaVersion,
    pub supported_languages: BTreeSet<Language>,
    pub supported_queries: Vec<ApiQuery>,
    pub supported_types: BTreeMap<QualifiedTypeName, ApiType>,
}

impl ApiVersion {
    /// Look a type up by its display name, e.g. `"Item.Details"`.
    pub fn find_type(&self, display_name: &str) -> Option<&ApiType> {
        self.supported_types
            .iter()
            .find(|(name, _)| name.to_string() == display_name)
            .map(|(_, ty)| ty)
    }
}

/// Materialize the queries of the selected endpoints, deduplicated and in
/// endpoint order.
///
/// # Errors
///
/// Returns `ApiError::UnknownEndpoint` for a selected name with no endpoint,
/// or the endpoint's `DefinitionError`.
pub fn materialize_queries(
    definition: &ApiDefinition,
    config: &ApiVersionConfig,
) -> Result<IndexSet<IrApiQuery>, ApiError> {
    if let Some(selected) = &config.endpoints {
        if let Some(name) = selected
            .iter()
            .find(|name| definition.find_endpoint(name).is_none())
        {
            return Err(ApiError::UnknownEndpoint { name: name.clone() });
        }
    }

    let mut queries = IndexSet::new();
    for endpoint in &definition.endpoints {
        let selected = config
            .endpoints
            .as_ref()
            .map_or(true, |names| names.contains(endpoint.name()));
        if selected {
            queries.extend(endpoint.queries(&definition.registry)?);
        }
    }
    Ok(queries)
}

/// Resolve the API described by `definition` at the configured version.
///
/// Queries outside their window are dropped. Only declarations reached from
/// a resolved query, or from an auxiliary root when requested, are kept.
///
/// # Errors
///
/// Returns `ApiError` if a query cannot be built or resolved.
pub fn build_api_version(
    definition: &ApiDefinition,
    config: &ApiVersionConfig,
) -> Result<ApiVersion, ApiError> {
    let version = config.version;
    let queries = materialize_queries(definition, config)?;
    let registry = &definition.registry;

    let mut aliases = TypeCollector::new();
    let mut references = TypeCollector::new();
    let mut supported_queries = Vec::new();
    {
        let mut ctx = ResolverContext::new(registry, &mut aliases, &mut references);
        for query in &queries {
            if let Some(resolved) = query.resolve(version, &mut ctx)? {
                supported_queries.push(resolved);
            }
        }

        if config.include_auxiliary {
            for name in registry.auxiliary() {
                let available = registry.get(name).and_then(|b| b.at(version)).is_some();
                if !available {
                    tracing::debug!(%name, %version, "auxiliary declaration unavailable");
                    continue;
                }
                if name.is_alias() {
                    ctx.resolve_alias(name, version)?;
                } else {
                    ctx.resolve_declaration(name, version)?;
                }
            }
        }
    }

    let collected = TypeCollector {
        aliases: aliases.aliases,
        declarations: references.declarations,
    };
    let supported_types = collected.into_types();
    tracing::info!(
        %version,
        queries = supported_queries.len(),
        types = supported_types.len(),
        "assembled API version"
    );

    Ok(ApiVersion {
        schema_version: version,
        supported_languages: definition.languages.clone(),
        supported_queries,
        supported_types,
    })
}
