//! Version-agnostic intermediate representation of types.
//!
//! IR declarations are built once and never mutated. Use sites refer to
//! declarations by [`QualifiedTypeName`]; the [`TypeRegistry`] owns them.
//! Every node resolves against a target [`SchemaVersion`] into the concrete
//! types of [`crate::schema`].
//!
//! [`TypeRegistry`]: crate::registry::TypeRegistry

use std::collections::BTreeMap;

use crate::error::{ResolveError, VersionError};
use crate::name::{Name, QualifiedTypeName};
use crate::resolver::ResolverContext;
use crate::schema::{
    ApiType, SchemaAlias, SchemaConditional, SchemaEnum, SchemaEnumValue, SchemaInterpretation,
    SchemaProperty, SchemaRecord, SchemaTuple, SchemaTupleElement, SchemaType,
};
use crate::types::{Optionality, Primitive};
use crate::version::{SchemaVersion, VersionConstraint};

/// A type at a use site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IrTypeUse {
    Primitive(Primitive),
    Array {
        elements: Box<IrTypeUse>,
        nullable_elements: bool,
    },
    Map {
        keys: Box<IrTypeUse>,
        values: Box<IrTypeUse>,
        nullable_values: bool,
    },
    Alias(QualifiedTypeName),
    Declaration(QualifiedTypeName),
}

impl IrTypeUse {
    pub fn array(elements: IrTypeUse) -> Self {
        IrTypeUse::Array {
            elements: Box::new(elements),
            nullable_elements: false,
        }
    }

    pub fn map(keys: IrTypeUse, values: IrTypeUse) -> Self {
        IrTypeUse::Map {
            keys: Box::new(keys),
            values: Box::new(values),
            nullable_values: false,
        }
    }

    /// Resolve this use for `version`, reporting every reference reached.
    pub fn resolve(
        &self,
        version: SchemaVersion,
        ctx: &mut ResolverContext<'_>,
    ) -> Result<SchemaType, ResolveError> {
        match self {
            IrTypeUse::Primitive(primitive) => Ok(SchemaType::Primitive(*primitive)),
            IrTypeUse::Array {
                elements,
                nullable_elements,
            } => Ok(SchemaType::Array {
                elements: Box::new(elements.resolve(version, ctx)?),
                nullable_elements: *nullable_elements,
            }),
            IrTypeUse::Map {
                keys,
                values,
                nullable_values,
            } => Ok(SchemaType::Map {
                keys: Box::new(keys.resolve(version, ctx)?),
                values: Box::new(values.resolve(version, ctx)?),
                nullable_values: *nullable_values,
            }),
            IrTypeUse::Alias(name) => {
                ctx.resolve_alias(name, version)?;
                Ok(SchemaType::Alias(name.clone()))
            }
            IrTypeUse::Declaration(name) => {
                ctx.resolve_declaration(name, version)?;
                Ok(SchemaType::Reference(name.clone()))
            }
        }
    }
}

/// A record property or a conditional's shared property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IrProperty {
    pub name: Name,
    pub ty: IrTypeUse,
    pub serial_name: String,
    pub description: String,
    pub optionality: Optionality,
    pub is_deprecated: bool,
    pub is_inline: bool,
    pub is_lenient: bool,
    pub is_localized: bool,
    pub since: Option<SchemaVersion>,
    pub until: Option<SchemaVersion>,
}

impl IrProperty {
    /// The window this property is declared for.
    ///
    /// # Errors
    ///
    /// Returns `VersionError::MalformedRange` if `since >= until`.
    pub fn constraint(&self) -> Result<VersionConstraint, VersionError> {
        VersionConstraint::new(self.since.unwrap_or(SchemaVersion::Classic), self.until)
    }

    /// A copy without its own window, for use inside a versioned snapshot.
    pub fn copy_for_version(&self) -> Self {
        Self {
            since: None,
            until: None,
            ..self.clone()
        }
    }

    fn resolve(
        &self,
        version: SchemaVersion,
        ctx: &mut ResolverContext<'_>,
    ) -> Result<SchemaProperty, ResolveError> {
        Ok(SchemaProperty {
            name: self.name.clone(),
            ty: self.ty.resolve(version, ctx)?,
            serial_name: self.serial_name.clone(),
            description: self.description.clone(),
            optionality: self.optionality,
            is_deprecated: self.is_deprecated,
            is_inline: self.is_inline,
            is_lenient: self.is_lenient,
            is_localized: self.is_localized,
        })
    }
}

/// One arm of an [`IrConditional`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IrInterpretation {
    /// Discriminator value selecting this arm.
    pub key: String,
    pub nest_property: Option<String>,
    pub ty: IrTypeUse,
    pub description: String,
    pub is_deprecated: bool,
    pub since: Option<SchemaVersion>,
    pub until: Option<SchemaVersion>,
}

impl IrInterpretation {
    /// As [`IrProperty::constraint`].
    pub fn constraint(&self) -> Result<VersionConstraint, VersionError> {
        VersionConstraint::new(self.since.unwrap_or(SchemaVersion::Classic), self.until)
    }

    pub fn copy_for_version(&self) -> Self {
        Self {
            since: None,
            until: None,
            ..self.clone()
        }
    }

    fn resolve(
        &self,
        version: SchemaVersion,
        ctx: &mut ResolverContext<'_>,
    ) -> Result<SchemaInterpretation, ResolveError> {
        Ok(SchemaInterpretation {
            key: self.key.clone(),
            nest_property: self.nest_property.clone(),
            ty: self.ty.resolve(version, ctx)?,
            is_deprecated: self.is_deprecated,
            description: self.description.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IrAlias {
    pub name: QualifiedTypeName,
    pub primitive: Primitive,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IrEnumValue {
    pub value: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IrEnum {
    pub name: QualifiedTypeName,
    pub underlying: Primitive,
    pub values: Vec<IrEnumValue>,
    pub description: String,
}

/// A record snapshot; properties are keyed by serial name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IrRecord {
    pub name: QualifiedTypeName,
    pub properties: BTreeMap<String, IrProperty>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IrTupleElement {
    pub name: Name,
    pub ty: IrTypeUse,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IrTuple {
    pub name: QualifiedTypeName,
    pub elements: Vec<IrTupleElement>,
    pub description: String,
}

/// A conditional snapshot; interpretations are keyed by discriminator value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IrConditional {
    pub name: QualifiedTypeName,
    pub selector: String,
    pub selector_in_side_property: bool,
    pub interpretation_in_nested_property: bool,
    pub shared_properties: BTreeMap<String, IrProperty>,
    pub interpretations: BTreeMap<String, IrInterpretation>,
    pub description: String,
}

/// A named, registrable type definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IrTypeDeclaration {
    Alias(IrAlias),
    Enum(IrEnum),
    Record(IrRecord),
    Tuple(IrTuple),
    Conditional(IrConditional),
}

impl IrTypeDeclaration {
    pub fn name(&self) -> &QualifiedTypeName {
        match self {
            IrTypeDeclaration::Alias(d) => &d.name,
            IrTypeDeclaration::Enum(d) => &d.name,
            IrTypeDeclaration::Record(d) => &d.name,
            IrTypeDeclaration::Tuple(d) => &d.name,
            IrTypeDeclaration::Conditional(d) => &d.name,
        }
    }

    /// Human-readable kind for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            IrTypeDeclaration::Alias(_) => "alias",
            IrTypeDeclaration::Enum(_) => "enum",
            IrTypeDeclaration::Record(_) => "record",
            IrTypeDeclaration::Tuple(_) => "tuple",
            IrTypeDeclaration::Conditional(_) => "conditional",
        }
    }

    /// Properties addressable by serial name: a record's properties or a
    /// conditional's shared properties.
    pub fn properties(&self) -> Option<&BTreeMap<String, IrProperty>> {
        match self {
            IrTypeDeclaration::Record(record) => Some(&record.properties),
            IrTypeDeclaration::Conditional(conditional) => Some(&conditional.shared_properties),
            _ => None,
        }
    }

    /// Resolve this declaration for `version`. Children resolve first.
    pub fn resolve(
        &self,
        version: SchemaVersion,
        ctx: &mut ResolverContext<'_>,
    ) -> Result<ApiType, ResolveError> {
        match self {
            IrTypeDeclaration::Alias(alias) => Ok(ApiType::Alias(resolve_alias(alias))),
            IrTypeDeclaration::Enum(enumeration) => Ok(ApiType::Enum(SchemaEnum {
                name: enumeration.name.clone(),
                underlying: enumeration.underlying,
                values: enumeration
                    .values
                    .iter()
                    .map(|v| SchemaEnumValue {
                        value: v.value.clone(),
                        description: v.description.clone(),
                    })
                    .collect(),
                description: enumeration.description.clone(),
            })),
            IrTypeDeclaration::Record(record) => Ok(ApiType::Record(SchemaRecord {
                name: record.name.clone(),
                properties: resolve_properties(&record.properties, version, ctx)?,
                description: record.description.clone(),
            })),
            IrTypeDeclaration::Tuple(tuple) => {
                let elements = tuple
                    .elements
                    .iter()
                    .map(|element| {
                        Ok(SchemaTupleElement {
                            name: element.name.clone(),
                            ty: element.ty.resolve(version, ctx)?,
                            description: element.description.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>, ResolveError>>()?;
                Ok(ApiType::Tuple(SchemaTuple {
                    name: tuple.name.clone(),
                    elements,
                    description: tuple.description.clone(),
                }))
            }
            IrTypeDeclaration::Conditional(conditional) => {
                let shared_properties =
                    resolve_properties(&conditional.shared_properties, version, ctx)?;
                let mut interpretations = BTreeMap::new();
                for (key, interpretation) in &conditional.interpretations {
                    interpretations.insert(key.clone(), interpretation.resolve(version, ctx)?);
                }
                Ok(ApiType::Conditional(SchemaConditional {
                    name: conditional.name.clone(),
                    selector: conditional.selector.clone(),
                    selector_in_side_property: conditional.selector_in_side_property,
                    interpretation_in_nested_property: conditional
                        .interpretation_in_nested_property,
                    shared_properties,
                    interpretations,
                    description: conditional.description.clone(),
                }))
            }
        }
    }
}

pub(crate) fn resolve_alias(alias: &IrAlias) -> SchemaAlias {
    SchemaAlias {
        name: alias.name.clone(),
        primitive: alias.primitive,
        description: alias.description.clone(),
    }
}

fn resolve_properties(
    properties: &BTreeMap<String, IrProperty>,
    version: SchemaVersion,
    ctx: &mut ResolverContext<'_>,
) -> Result<BTreeMap<String, SchemaProperty>, ResolveError> {
    let mut resolved = BTreeMap::new();
    for (serial_name, property) in properties {
        resolved.insert(serial_name.clone(), property.resolve(version, ctx)?);
    }
    Ok(resolved)
}
