//! Declaration builders.
//!
//! A [`DeclarationScope`] borrows the registry mutably and registers every
//! declaration it builds under its qualified name. Records and conditionals
//! take members with individual version windows and are cut into one
//! snapshot per interval in which the live member set stays the same.

use std::collections::BTreeMap;

use crate::constrained::VersionConstrainedBuilder;
use crate::error::DefinitionError;
use crate::ir::{
    IrAlias, IrConditional, IrEnum, IrEnumValue, IrInterpretation, IrProperty, IrRecord, IrTuple,
    IrTupleElement, IrTypeDeclaration, IrTypeUse,
};
use crate::name::{Name, QualifiedTypeName};
use crate::registry::{Blueprint, TypeRegistry};
use crate::types::{Optionality, Primitive, TokenScope};
use crate::version::{SchemaVersion, VersionConstraint};

/// Adjusts one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyModifier {
    Deprecated,
    Inline,
    Lenient,
    Localized,
    Optional,
    MandatedBy(TokenScope),
    SerialName(String),
    Since(SchemaVersion),
    Until(SchemaVersion),
}

impl PropertyModifier {
    pub fn apply(self, property: &mut IrProperty) {
        match self {
            PropertyModifier::Deprecated => property.is_deprecated = true,
            PropertyModifier::Inline => property.is_inline = true,
            PropertyModifier::Lenient => property.is_lenient = true,
            PropertyModifier::Localized => property.is_localized = true,
            PropertyModifier::Optional => property.optionality = Optionality::Optional,
            PropertyModifier::MandatedBy(scope) => {
                property.optionality = Optionality::MandatedBy(scope)
            }
            PropertyModifier::SerialName(serial_name) => property.serial_name = serial_name,
            PropertyModifier::Since(version) => property.since = Some(version),
            PropertyModifier::Until(version) => property.until = Some(version),
        }
    }
}

/// Adjusts one interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterpretationModifier {
    Deprecated,
    NestProperty(String),
    Since(SchemaVersion),
    Until(SchemaVersion),
}

impl InterpretationModifier {
    pub fn apply(self, interpretation: &mut IrInterpretation) {
        match self {
            InterpretationModifier::Deprecated => interpretation.is_deprecated = true,
            InterpretationModifier::NestProperty(key) => interpretation.nest_property = Some(key),
            InterpretationModifier::Since(version) => interpretation.since = Some(version),
            InterpretationModifier::Until(version) => interpretation.until = Some(version),
        }
    }
}

/// A required property whose serial name is the snake_case form of `name`.
pub fn property(name: &str, ty: IrTypeUse, description: &str) -> IrProperty {
    let name = Name::derive(name);
    IrProperty {
        serial_name: name.snake_case(),
        name,
        ty,
        description: description.to_string(),
        optionality: Optionality::Required,
        is_deprecated: false,
        is_inline: false,
        is_lenient: false,
        is_localized: false,
        since: None,
        until: None,
    }
}

impl IrProperty {
    pub fn with(mut self, modifier: PropertyModifier) -> Self {
        modifier.apply(&mut self);
        self
    }
}

/// An interpretation selected by the discriminator value `key`.
pub fn interpretation(key: &str, ty: IrTypeUse, description: &str) -> IrInterpretation {
    IrInterpretation {
        key: key.to_string(),
        nest_property: None,
        ty,
        description: description.to_string(),
        is_deprecated: false,
        since: None,
        until: None,
    }
}

impl IrInterpretation {
    pub fn with(mut self, modifier: InterpretationModifier) -> Self {
        modifier.apply(&mut self);
        self
    }
}

pub fn element(name: &str, ty: IrTypeUse, description: &str) -> IrTupleElement {
    IrTupleElement {
        name: Name::derive(name),
        ty,
        description: description.to_string(),
    }
}

/// Where a conditional reads its discriminator from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    key: String,
    in_side_property: bool,
    nested_interpretations: bool,
}

impl Selector {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            in_side_property: false,
            nested_interpretations: false,
        }
    }

    /// Read the discriminator from a sibling property of the containing
    /// object instead of the object itself.
    pub fn side_property(mut self, enabled: bool) -> Self {
        self.in_side_property = enabled;
        self
    }

    /// Each interpretation lives in a nested property of the object.
    pub fn nested_interpretations(mut self, enabled: bool) -> Self {
        self.nested_interpretations = enabled;
        self
    }
}

/// Builds declarations into a registry under a nesting path.
#[derive(Debug)]
pub struct DeclarationScope<'r> {
    registry: &'r mut TypeRegistry,
    nest: Vec<Name>,
}

impl<'r> DeclarationScope<'r> {
    /// A top-level scope.
    pub fn new(registry: &'r mut TypeRegistry) -> Self {
        Self {
            registry,
            nest: Vec::new(),
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &*self.registry
    }

    /// The qualified name `name` gets in this scope.
    pub fn qualify(&self, name: &str) -> QualifiedTypeName {
        QualifiedTypeName::nested(self.nest.clone(), Name::derive(name))
    }

    /// A child scope for declarations nested under `parent`.
    pub fn nested(&mut self, parent: &str) -> DeclarationScope<'_> {
        let mut nest = self.nest.clone();
        nest.push(Name::derive(parent));
        DeclarationScope {
            registry: &mut *self.registry,
            nest,
        }
    }

    /// Register a flat alias of `primitive`. Aliases ignore the nesting path.
    pub fn alias(
        &mut self,
        name: &str,
        primitive: Primitive,
        description: &str,
    ) -> Result<IrTypeUse, DefinitionError> {
        let name = QualifiedTypeName::alias(Name::derive(name));
        let declaration = IrTypeDeclaration::Alias(IrAlias {
            name: name.clone(),
            primitive,
            description: description.to_string(),
        });
        self.registry
            .insert(name.clone(), Blueprint::Consistent(declaration))?;
        Ok(IrTypeUse::Alias(name))
    }

    pub fn enumeration(
        &mut self,
        name: &str,
        underlying: Primitive,
        values: Vec<IrEnumValue>,
        description: &str,
    ) -> Result<IrTypeUse, DefinitionError> {
        let name = self.qualify(name);
        let declaration = IrTypeDeclaration::Enum(IrEnum {
            name: name.clone(),
            underlying,
            values,
            description: description.to_string(),
        });
        self.register(name, Blueprint::Consistent(declaration))
    }

    pub fn tuple(
        &mut self,
        name: &str,
        elements: Vec<IrTupleElement>,
        description: &str,
    ) -> Result<IrTypeUse, DefinitionError> {
        let name = self.qualify(name);
        let declaration = IrTypeDeclaration::Tuple(IrTuple {
            name: name.clone(),
            elements,
            description: description.to_string(),
        });
        self.register(name, Blueprint::Consistent(declaration))
    }

    /// Build a record from individually versioned properties.
    ///
    /// # Errors
    ///
    /// Returns `DefinitionError::DuplicateMember` if two properties with the
    /// same serial name are live at the same version, a version error for a
    /// malformed property window, or `DuplicateDeclaration`.
    pub fn record(
        &mut self,
        name: &str,
        properties: Vec<IrProperty>,
        description: &str,
    ) -> Result<IrTypeUse, DefinitionError> {
        let name = self.qualify(name);
        let windows = properties
            .iter()
            .map(IrProperty::constraint)
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = VersionConstrainedBuilder::new();
        for (window, live) in live_runs(&windows) {
            let snapshot = IrTypeDeclaration::Record(IrRecord {
                name: name.clone(),
                properties: keyed_snapshot(
                    &name,
                    window,
                    live.iter().map(|&i| &properties[i]),
                    |p| (p.serial_name.clone(), p.copy_for_version()),
                )?,
                description: description.to_string(),
            });
            builder.add(snapshot, window.since(), window.until())?;
        }

        let blueprint = Blueprint::from_container(builder.build()?);
        self.register(name, blueprint)
    }

    /// Build a conditional from individually versioned shared properties and
    /// interpretations.
    ///
    /// # Errors
    ///
    /// As [`record`](Self::record), with interpretation keys checked like
    /// serial names.
    pub fn conditional(
        &mut self,
        name: &str,
        selector: Selector,
        shared_properties: Vec<IrProperty>,
        interpretations: Vec<IrInterpretation>,
        description: &str,
    ) -> Result<IrTypeUse, DefinitionError> {
        let name = self.qualify(name);
        let property_windows = shared_properties
            .iter()
            .map(IrProperty::constraint);
        let interpretation_windows = interpretations
            .iter()
            .map(IrInterpretation::constraint);
        let windows = property_windows
            .chain(interpretation_windows)
            .collect::<Result<Vec<_>, _>>()?;
        let split = shared_properties.len();

        let mut builder = VersionConstrainedBuilder::new();
        for (window, live) in live_runs(&windows) {
            let (live_properties, live_interpretations): (Vec<usize>, Vec<usize>) =
                live.iter().partition(|&&i| i < split);

            let shared = keyed_snapshot(
                &name,
                window,
                live_properties.iter().map(|&i| &shared_properties[i]),
                |p| (p.serial_name.clone(), p.copy_for_version()),
            )?;
            let arms = keyed_snapshot(
                &name,
                window,
                live_interpretations.iter().map(|&i| &interpretations[i - split]),
                |i| (i.key.clone(), i.copy_for_version()),
            )?;

            let snapshot = IrTypeDeclaration::Conditional(IrConditional {
                name: name.clone(),
                selector: selector.key.clone(),
                selector_in_side_property: selector.in_side_property,
                interpretation_in_nested_property: selector.nested_interpretations,
                shared_properties: shared,
                interpretations: arms,
                description: description.to_string(),
            });
            builder.add(snapshot, window.since(), window.until())?;
        }

        let blueprint = Blueprint::from_container(builder.build()?);
        self.register(name, blueprint)
    }

    fn register(
        &mut self,
        name: QualifiedTypeName,
        blueprint: Blueprint,
    ) -> Result<IrTypeUse, DefinitionError> {
        self.registry.insert(name.clone(), blueprint)?;
        Ok(IrTypeUse::Declaration(name))
    }
}

/// Intervals over which the set of live members stays the same, each with
/// the indices of its members.
///
/// Versions where no member is live are skipped. Without members there is a
/// single unbounded interval with no members.
fn live_runs(windows: &[VersionConstraint]) -> Vec<(VersionConstraint, Vec<usize>)> {
    if windows.is_empty() {
        return vec![(VersionConstraint::unbounded(), Vec::new())];
    }

    let mut runs = Vec::new();
    let mut current: Option<(SchemaVersion, Vec<usize>)> = None;

    for &version in SchemaVersion::ALL {
        let live: Vec<usize> = windows
            .iter()
            .enumerate()
            .filter(|(_, w)| w.contains(version))
            .map(|(i, _)| i)
            .collect();

        if current.as_ref().is_some_and(|(_, members)| *members == live) {
            continue;
        }
        if let Some((since, members)) = current.take() {
            runs.push((since, Some(version), members));
        }
        if !live.is_empty() {
            current = Some((version, live));
        }
    }
    if let Some((since, members)) = current {
        runs.push((since, None, members));
    }

    runs.into_iter()
        .filter_map(|(since, until, members)| {
            VersionConstraint::new(since, until)
                .ok()
                .map(|window| (window, members))
        })
        .collect()
}

fn keyed_snapshot<'m, M: 'm, V>(
    declaration: &QualifiedTypeName,
    window: VersionConstraint,
    members: impl Iterator<Item = &'m M>,
    key: impl Fn(&M) -> (String, V),
) -> Result<BTreeMap<String, V>, DefinitionError> {
    let mut snapshot = BTreeMap::new();
    for member in members {
        let (serial_name, value) = key(member);
        if snapshot.contains_key(&serial_name) {
            return Err(DefinitionError::DuplicateMember {
                declaration: declaration.clone(),
                member: serial_name,
                version: window.since(),
            });
        }
        snapshot.insert(serial_name, value);
    }
    Ok(snapshot)
}
