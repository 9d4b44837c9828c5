//! The owner of every IR declaration.

use std::collections::{BTreeMap, BTreeSet};

use crate::constrained::VersionConstrained;
use crate::error::DefinitionError;
use crate::ir::IrTypeDeclaration;
use crate::name::QualifiedTypeName;
use crate::version::SchemaVersion;

/// A registered declaration, either one shape for all versions or one shape
/// per version interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Blueprint {
    Consistent(IrTypeDeclaration),
    Versioned(VersionConstrained<IrTypeDeclaration>),
}

impl Blueprint {
    /// Collapse a container spanning every version into `Consistent`.
    pub fn from_container(container: VersionConstrained<IrTypeDeclaration>) -> Self {
        if container.is_consistent() {
            Blueprint::Consistent(container.into_first().data)
        } else {
            Blueprint::Versioned(container)
        }
    }

    /// The declaration shape at `version`, if it exists there.
    pub fn at(&self, version: SchemaVersion) -> Option<&IrTypeDeclaration> {
        match self {
            Blueprint::Consistent(declaration) => Some(declaration),
            Blueprint::Versioned(container) => container.at(version),
        }
    }

    /// The earliest shape.
    pub fn first(&self) -> &IrTypeDeclaration {
        match self {
            Blueprint::Consistent(declaration) => declaration,
            Blueprint::Versioned(container) => &container.first().data,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.first().kind()
    }

    pub fn is_consistent(&self) -> bool {
        matches!(self, Blueprint::Consistent(_))
    }
}

/// Declarations keyed by qualified name, plus the auxiliary roots that are
/// resolved even when no query references them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeRegistry {
    blueprints: BTreeMap<QualifiedTypeName, Blueprint>,
    auxiliary: BTreeSet<QualifiedTypeName>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `blueprint` under `name`.
    ///
    /// # Errors
    ///
    /// Returns `DefinitionError::DuplicateDeclaration` if the name is taken,
    /// including by an alias and a top-level declaration that share a display
    /// name.
    pub fn insert(
        &mut self,
        name: QualifiedTypeName,
        blueprint: Blueprint,
    ) -> Result<(), DefinitionError> {
        let taken = self.blueprints.contains_key(&name)
            || same_display_name(&name).is_some_and(|other| self.blueprints.contains_key(&other));
        if taken {
            return Err(DefinitionError::DuplicateDeclaration { name });
        }
        tracing::trace!(%name, kind = blueprint.kind(), "registered declaration");
        self.blueprints.insert(name, blueprint);
        Ok(())
    }

    pub fn get(&self, name: &QualifiedTypeName) -> Option<&Blueprint> {
        self.blueprints.get(name)
    }

    pub fn contains(&self, name: &QualifiedTypeName) -> bool {
        self.blueprints.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QualifiedTypeName, &Blueprint)> {
        self.blueprints.iter()
    }

    pub fn len(&self) -> usize {
        self.blueprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blueprints.is_empty()
    }

    /// Mark a registered declaration as an auxiliary root.
    ///
    /// # Errors
    ///
    /// Returns `DefinitionError::MissingDeclaration` if `name` is not
    /// registered.
    pub fn mark_auxiliary(&mut self, name: QualifiedTypeName) -> Result<(), DefinitionError> {
        if !self.contains(&name) {
            return Err(DefinitionError::MissingDeclaration { name });
        }
        self.auxiliary.insert(name);
        Ok(())
    }

    pub fn auxiliary(&self) -> &BTreeSet<QualifiedTypeName> {
        &self.auxiliary
    }
}

/// The name of the other kind that renders the same way as `name`.
fn same_display_name(name: &QualifiedTypeName) -> Option<QualifiedTypeName> {
    match name {
        QualifiedTypeName::Alias { name } => Some(QualifiedTypeName::declaration(name.clone())),
        QualifiedTypeName::Declaration { nest, name } if nest.is_empty() => {
            Some(QualifiedTypeName::alias(name.clone()))
        }
        QualifiedTypeName::Declaration { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constrained::VersionConstrainedBuilder;
    use crate::ir::IrAlias;
    use crate::name::Name;
    use crate::types::Primitive;
    use crate::version::SchemaVersion::*;

    fn alias(name: &str, primitive: Primitive) -> IrTypeDeclaration {
        IrTypeDeclaration::Alias(IrAlias {
            name: QualifiedTypeName::alias(Name::derive(name)),
            primitive,
            description: String::new(),
        })
    }

    #[test]
    fn insert_rejects_duplicates() {
        let mut registry = TypeRegistry::new();
        let name = QualifiedTypeName::alias(Name::derive("ItemId"));
        registry
            .insert(name.clone(), Blueprint::Consistent(alias("ItemId", Primitive::Integer)))
            .unwrap();

        let err = registry
            .insert(name.clone(), Blueprint::Consistent(alias("ItemId", Primitive::String)))
            .unwrap_err();
        assert_eq!(err, DefinitionError::DuplicateDeclaration { name });
    }

    #[test]
    fn insert_rejects_alias_and_declaration_sharing_a_name() {
        let mut registry = TypeRegistry::new();
        registry
            .insert(
                QualifiedTypeName::alias(Name::derive("Color")),
                Blueprint::Consistent(alias("Color", Primitive::String)),
            )
            .unwrap();

        let declaration = QualifiedTypeName::declaration(Name::derive("Color"));
        let err = registry
            .insert(declaration.clone(), Blueprint::Consistent(alias("Color", Primitive::String)))
            .unwrap_err();
        assert_eq!(err, DefinitionError::DuplicateDeclaration { name: declaration });

        // Nested names render with their parents and never clash
        registry
            .insert(
                QualifiedTypeName::nested(vec![Name::derive("Item")], Name::derive("Color")),
                Blueprint::Consistent(alias("Color", Primitive::String)),
            )
            .unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn from_container_collapses_consistent() {
        let container = VersionConstrained::consistent(alias("ItemId", Primitive::Integer));
        assert!(Blueprint::from_container(container).is_consistent());

        let mut builder = VersionConstrainedBuilder::new();
        builder.add(alias("ItemId", Primitive::Integer), Classic, None).unwrap();
        builder.add(alias("ItemId", Primitive::String), V2019_05_16, None).unwrap();
        let blueprint = Blueprint::from_container(builder.build().unwrap());

        assert!(!blueprint.is_consistent());
        assert_eq!(blueprint.at(Classic), Some(&alias("ItemId", Primitive::Integer)));
        assert_eq!(blueprint.at(V2022_03_23), Some(&alias("ItemId", Primitive::String)));
    }

    #[test]
    fn mark_auxiliary_requires_registration() {
        let mut registry = TypeRegistry::new();
        let name = QualifiedTypeName::declaration(Name::derive("Color"));
        assert!(matches!(
            registry.mark_auxiliary(name),
            Err(DefinitionError::MissingDeclaration { .. })
        ));
    }
}
