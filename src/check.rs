//! Definition checking - static analysis of API definitions.
//!
//! Checks every endpoint for:
//! - Queries that cannot be built (E001)
//! - Queries that fail to resolve at some schema version (E002)
//!
//! and warns about declarations no query reaches at any version (W001).
//! In strict mode those warnings are reported as errors.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::api::ApiDefinition;
use crate::error::ResolveError;
use crate::name::QualifiedTypeName;
use crate::query::{Endpoint, IrApiQuery};
use crate::registry::TypeRegistry;
use crate::resolver::{ResolverContext, TypeCollector};
use crate::version::SchemaVersion;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// A single diagnostic message from checking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    /// Query path or declaration name the diagnostic is about
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<SchemaVersion>,
    pub message: String,
}

impl Diagnostic {
    fn error(code: &str, location: String, version: Option<SchemaVersion>, message: String) -> Self {
        Self {
            severity: Severity::Error,
            code: code.to_string(),
            location,
            version,
            message,
        }
    }

    fn warning(code: &str, location: String, message: String, strict: bool) -> Self {
        Self {
            severity: if strict {
                Severity::Error
            } else {
                Severity::Warning
            },
            code: code.to_string(),
            location,
            version: None,
            message,
        }
    }
}

/// Status of a checked endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Error,
}

/// Result of checking a single endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointResult {
    pub endpoint: String,
    pub status: CheckStatus,
    pub queries: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Result of checking a whole definition.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub endpoints_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<EndpointResult>,
    /// Diagnostics about declarations rather than endpoints.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub declarations: Vec<Diagnostic>,
}

impl CheckResult {
    /// Returns true if nothing failed (no errors).
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Check every endpoint and declaration of `definition`.
///
/// If `strict` is true, warnings are reported with error severity, so any
/// unreachable declaration fails the check.
pub fn check_definition(definition: &ApiDefinition, strict: bool) -> CheckResult {
    let registry = &definition.registry;
    let mut reached = BTreeSet::new();

    let results: Vec<EndpointResult> = definition
        .endpoints
        .iter()
        .map(|endpoint| check_endpoint(registry, endpoint, &mut reached))
        .collect();

    let mut declarations = Vec::new();
    for name in registry.auxiliary() {
        let Some(blueprint) = registry.get(name) else {
            continue;
        };
        for &version in SchemaVersion::ALL {
            if blueprint.at(version).is_none() {
                continue;
            }
            let outcome = reach(registry, |ctx| {
                if name.is_alias() {
                    ctx.resolve_alias(name, version)
                } else {
                    ctx.resolve_declaration(name, version)
                }
            });
            match outcome {
                Ok(names) => reached.extend(names),
                Err(e) => {
                    declarations.push(Diagnostic::error(
                        "E002",
                        name.to_string(),
                        Some(version),
                        e.to_string(),
                    ));
                    break;
                }
            }
        }
    }

    for (name, _) in registry.iter() {
        if !reached.contains(name) {
            declarations.push(Diagnostic::warning(
                "W001",
                name.to_string(),
                "not reachable from any query at any schema version".to_string(),
                strict,
            ));
        }
    }

    let count = |severity: Severity| {
        results
            .iter()
            .flat_map(|r| &r.diagnostics)
            .chain(&declarations)
            .filter(|d| d.severity == severity)
            .count()
    };
    let errors = count(Severity::Error);
    let warnings = count(Severity::Warning);

    let failed = results
        .iter()
        .filter(|r| r.status == CheckStatus::Error)
        .count();

    tracing::debug!(endpoints = results.len(), errors, warnings, "checked definition");

    CheckResult {
        endpoints_checked: results.len(),
        passed: results.len() - failed,
        failed,
        errors,
        warnings,
        results,
        declarations,
    }
}

fn check_endpoint(
    registry: &TypeRegistry,
    endpoint: &Endpoint,
    reached: &mut BTreeSet<QualifiedTypeName>,
) -> EndpointResult {
    let mut diagnostics = Vec::new();
    let mut queries = 0;

    match endpoint.queries(registry) {
        Err(e) => diagnostics.push(Diagnostic::error(
            "E001",
            endpoint.path().to_string(),
            None,
            e.to_string(),
        )),
        Ok(built) => {
            queries = built.len();
            for query in &built {
                // Report only the first failing version of each query
                let mut reported = false;
                for &version in SchemaVersion::ALL {
                    match reach(registry, |ctx| query.resolve(version, ctx).map(|_| ())) {
                        Ok(names) => reached.extend(names),
                        Err(_) if reported => {}
                        Err(e) => {
                            diagnostics.push(Diagnostic::error(
                                "E002",
                                query_location(query),
                                Some(version),
                                e.to_string(),
                            ));
                            reported = true;
                        }
                    }
                }
            }
        }
    }

    let status = if diagnostics.is_empty() {
        CheckStatus::Ok
    } else {
        CheckStatus::Error
    };

    EndpointResult {
        endpoint: endpoint.name().to_string(),
        status,
        queries,
        diagnostics,
    }
}

fn query_location(query: &IrApiQuery) -> String {
    match &query.query_suffix {
        Some(suffix) => format!("{} ({})", query.path, suffix),
        None => query.path.clone(),
    }
}

/// Run one resolution and return the names it reached.
fn reach(
    registry: &TypeRegistry,
    resolve: impl FnOnce(&mut ResolverContext<'_>) -> Result<(), ResolveError>,
) -> Result<Vec<QualifiedTypeName>, ResolveError> {
    let mut aliases = TypeCollector::new();
    let mut references = TypeCollector::new();
    {
        let mut ctx = ResolverContext::new(registry, &mut aliases, &mut references);
        resolve(&mut ctx)?;
    }
    Ok(aliases
        .aliases
        .into_keys()
        .chain(references.declarations.into_keys())
        .collect())
}
