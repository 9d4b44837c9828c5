//! Resolution of IR against a schema version.
//!
//! Resolving a type use or declaration reports every alias and declaration
//! it reaches to the context's collectors. Whatever no root resolution
//! reaches is left out of the resolved API version, so a declaration can be
//! present at one version and pruned at another.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::ResolveError;
use crate::ir::{resolve_alias, IrTypeDeclaration, IrTypeUse};
use crate::name::QualifiedTypeName;
use crate::registry::TypeRegistry;
use crate::schema::{ApiType, SchemaAlias, SchemaType};
use crate::version::SchemaVersion;

/// Receives every alias reached during resolution.
pub trait AliasCollector {
    fn collect_alias(&mut self, name: &QualifiedTypeName, alias: &SchemaAlias);
}

/// Receives every declaration reached during resolution.
pub trait ReferenceCollector {
    fn collect_reference(&mut self, name: &QualifiedTypeName, declaration: &ApiType);
}

impl<F> AliasCollector for F
where
    F: FnMut(&QualifiedTypeName, &SchemaAlias),
{
    fn collect_alias(&mut self, name: &QualifiedTypeName, alias: &SchemaAlias) {
        self(name, alias)
    }
}

impl<F> ReferenceCollector for F
where
    F: FnMut(&QualifiedTypeName, &ApiType),
{
    fn collect_reference(&mut self, name: &QualifiedTypeName, declaration: &ApiType) {
        self(name, declaration)
    }
}

/// Keeps every collected alias and declaration, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeCollector {
    pub aliases: BTreeMap<QualifiedTypeName, SchemaAlias>,
    pub declarations: BTreeMap<QualifiedTypeName, ApiType>,
}

impl TypeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &QualifiedTypeName) -> bool {
        self.aliases.contains_key(name) || self.declarations.contains_key(name)
    }

    /// Every collected type as a resolved declaration.
    pub fn into_types(self) -> BTreeMap<QualifiedTypeName, ApiType> {
        let mut types = self.declarations;
        types.extend(
            self.aliases
                .into_iter()
                .map(|(name, alias)| (name, ApiType::Alias(alias))),
        );
        types
    }
}

impl AliasCollector for TypeCollector {
    fn collect_alias(&mut self, name: &QualifiedTypeName, alias: &SchemaAlias) {
        self.aliases.insert(name.clone(), alias.clone());
    }
}

impl ReferenceCollector for TypeCollector {
    fn collect_reference(&mut self, name: &QualifiedTypeName, declaration: &ApiType) {
        self.declarations.insert(name.clone(), declaration.clone());
    }
}

/// State for one resolution pass: the registry to look names up in, the two
/// collectors, and the references already resolved.
pub struct ResolverContext<'a> {
    registry: &'a TypeRegistry,
    aliases: &'a mut dyn AliasCollector,
    references: &'a mut dyn ReferenceCollector,
    visited: BTreeSet<(QualifiedTypeName, SchemaVersion)>,
}

impl<'a> ResolverContext<'a> {
    pub fn new(
        registry: &'a TypeRegistry,
        aliases: &'a mut dyn AliasCollector,
        references: &'a mut dyn ReferenceCollector,
    ) -> Self {
        Self {
            registry,
            aliases,
            references,
            visited: BTreeSet::new(),
        }
    }

    pub fn registry(&self) -> &'a TypeRegistry {
        self.registry
    }

    /// Resolve a type use at `version`.
    pub fn resolve(
        &mut self,
        ty: &IrTypeUse,
        version: SchemaVersion,
    ) -> Result<SchemaType, ResolveError> {
        ty.resolve(version, self)
    }

    /// Look up `name` at `version` and report its resolved form.
    ///
    /// Each `(name, version)` pair is resolved at most once per context, so
    /// self-referential declarations terminate.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::MissingDeclaration` if `name` was never
    /// registered, or `ResolveError::UnavailableDeclaration` if it does not
    /// exist at `version`.
    pub fn resolve_declaration(
        &mut self,
        name: &QualifiedTypeName,
        version: SchemaVersion,
    ) -> Result<(), ResolveError> {
        if !self.visited.insert((name.clone(), version)) {
            return Ok(());
        }

        let declaration = self.lookup(name, version)?;
        if let IrTypeDeclaration::Alias(alias) = declaration {
            self.aliases.collect_alias(name, &resolve_alias(alias));
            return Ok(());
        }

        tracing::trace!(%name, %version, "resolving declaration");
        let resolved = declaration.resolve(version, self)?;
        self.references.collect_reference(name, &resolved);
        Ok(())
    }

    /// Look up the alias `name` and report its resolved form.
    ///
    /// # Errors
    ///
    /// As [`resolve_declaration`](Self::resolve_declaration), plus
    /// `ResolveError::KindMismatch` if `name` is not an alias.
    pub fn resolve_alias(
        &mut self,
        name: &QualifiedTypeName,
        version: SchemaVersion,
    ) -> Result<(), ResolveError> {
        if self.visited.contains(&(name.clone(), version)) {
            return Ok(());
        }

        let declaration = self.lookup(name, version)?;
        let IrTypeDeclaration::Alias(alias) = declaration else {
            return Err(ResolveError::KindMismatch {
                name: name.clone(),
                expected: "alias",
                actual: declaration.kind(),
            });
        };

        self.visited.insert((name.clone(), version));
        self.aliases.collect_alias(name, &resolve_alias(alias));
        Ok(())
    }

    fn lookup(
        &self,
        name: &QualifiedTypeName,
        version: SchemaVersion,
    ) -> Result<&'a IrTypeDeclaration, ResolveError> {
        let registry = self.registry;
        let blueprint = registry
            .get(name)
            .ok_or_else(|| ResolveError::MissingDeclaration { name: name.clone() })?;
        blueprint
            .at(version)
            .ok_or_else(|| ResolveError::UnavailableDeclaration {
                name: name.clone(),
                version,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constrained::VersionConstrainedBuilder;
    use crate::ir::{IrAlias, IrProperty, IrRecord};
    use crate::name::Name;
    use crate::registry::Blueprint;
    use crate::types::{Optionality, Primitive};
    use crate::version::SchemaVersion::*;

    fn property(name: &str, ty: IrTypeUse) -> IrProperty {
        IrProperty {
            name: Name::derive(name),
            ty,
            serial_name: name.to_string(),
            description: String::new(),
            optionality: Optionality::Required,
            is_deprecated: false,
            is_inline: false,
            is_lenient: false,
            is_localized: false,
            since: None,
            until: None,
        }
    }

    fn record(name: &QualifiedTypeName, properties: Vec<IrProperty>) -> IrTypeDeclaration {
        IrTypeDeclaration::Record(IrRecord {
            name: name.clone(),
            properties: properties
                .into_iter()
                .map(|p| (p.serial_name.clone(), p))
                .collect(),
            description: String::new(),
        })
    }

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();

        let item_id = QualifiedTypeName::alias(Name::derive("ItemId"));
        registry
            .insert(
                item_id.clone(),
                Blueprint::Consistent(IrTypeDeclaration::Alias(IrAlias {
                    name: item_id.clone(),
                    primitive: Primitive::Integer,
                    description: String::new(),
                })),
            )
            .unwrap();

        // A self-referential record
        let node = QualifiedTypeName::declaration(Name::derive("Node"));
        registry
            .insert(
                node.clone(),
                Blueprint::Consistent(record(
                    &node,
                    vec![
                        property("id", IrTypeUse::Alias(item_id)),
                        property("children", IrTypeUse::array(IrTypeUse::Declaration(node.clone()))),
                    ],
                )),
            )
            .unwrap();

        let late = QualifiedTypeName::declaration(Name::derive("Late"));
        let mut builder = VersionConstrainedBuilder::new();
        builder.add(record(&late, vec![]), V2019_12_19, None).unwrap();
        registry
            .insert(late, Blueprint::from_container(builder.build().unwrap()))
            .unwrap();

        registry
    }

    fn resolve(
        registry: &TypeRegistry,
        ty: &IrTypeUse,
        version: SchemaVersion,
    ) -> (Result<SchemaType, ResolveError>, TypeCollector) {
        let mut aliases = TypeCollector::new();
        let mut references = TypeCollector::new();
        let result = {
            let mut ctx = ResolverContext::new(registry, &mut aliases, &mut references);
            ctx.resolve(ty, version)
        };
        references.aliases = aliases.aliases;
        (result, references)
    }

    #[test]
    fn recursive_declaration_terminates() {
        let registry = registry();
        let node = QualifiedTypeName::declaration(Name::derive("Node"));

        let (result, collected) = resolve(&registry, &IrTypeUse::Declaration(node.clone()), Classic);

        assert_eq!(result.unwrap(), SchemaType::Reference(node.clone()));
        assert!(collected.declarations.contains_key(&node));
        assert!(collected
            .aliases
            .contains_key(&QualifiedTypeName::alias(Name::derive("ItemId"))));
    }

    #[test]
    fn primitives_collect_nothing() {
        let registry = registry();
        let ty = IrTypeUse::map(
            IrTypeUse::Primitive(Primitive::String),
            IrTypeUse::Primitive(Primitive::Decimal),
        );

        let (result, collected) = resolve(&registry, &ty, Classic);

        assert!(matches!(result.unwrap(), SchemaType::Map { .. }));
        assert_eq!(collected, TypeCollector::new());
    }

    #[test]
    fn missing_declaration_is_an_error() {
        let registry = registry();
        let ghost = QualifiedTypeName::declaration(Name::derive("Ghost"));

        let (result, _) = resolve(&registry, &IrTypeUse::Declaration(ghost.clone()), Classic);
        assert_eq!(result.unwrap_err(), ResolveError::MissingDeclaration { name: ghost });
    }

    #[test]
    fn unavailable_declaration_is_an_error() {
        let registry = registry();
        let late = QualifiedTypeName::declaration(Name::derive("Late"));

        let (result, _) = resolve(&registry, &IrTypeUse::Declaration(late.clone()), V2019_05_16);
        assert_eq!(
            result.unwrap_err(),
            ResolveError::UnavailableDeclaration {
                name: late.clone(),
                version: V2019_05_16
            }
        );

        let (result, _) = resolve(&registry, &IrTypeUse::Declaration(late), V2021_04_06);
        assert!(result.is_ok());
    }

    #[test]
    fn alias_use_of_record_is_a_kind_mismatch() {
        let registry = registry();
        let node = QualifiedTypeName::declaration(Name::derive("Node"));

        let (result, _) = resolve(&registry, &IrTypeUse::Alias(node), Classic);
        assert!(matches!(
            result,
            Err(ResolveError::KindMismatch { expected: "alias", actual: "record", .. })
        ));
    }

    #[test]
    fn closures_are_collectors() {
        let registry = registry();
        let node = QualifiedTypeName::declaration(Name::derive("Node"));
        let mut alias_names = Vec::new();
        let mut reference_names = Vec::new();

        {
            let mut on_alias = |name: &QualifiedTypeName, _: &SchemaAlias| alias_names.push(name.to_string());
            let mut on_reference =
                |name: &QualifiedTypeName, _: &ApiType| reference_names.push(name.to_string());
            let mut ctx = ResolverContext::new(&registry, &mut on_alias, &mut on_reference);
            ctx.resolve(&IrTypeUse::Declaration(node), Classic).unwrap();
        }

        assert_eq!(alias_names, ["ItemId"]);
        assert_eq!(reference_names, ["Node"]);
    }
}
