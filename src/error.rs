//! Error types for schema definition, resolution and loading.

use std::path::PathBuf;
use thiserror::Error;

use crate::name::QualifiedTypeName;
use crate::version::{SchemaVersion, VersionConstraint};

/// Errors raised by version ranges and version-constrained containers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("malformed version range: since {since} must precede until {until}")]
    MalformedRange {
        since: SchemaVersion,
        until: SchemaVersion,
    },

    #[error("version range {constraint} overlaps existing entry {existing}")]
    Overlapping {
        constraint: VersionConstraint,
        existing: VersionConstraint,
    },

    #[error("more than one schema declared since {since}")]
    DuplicateSince { since: SchemaVersion },

    #[error("version-constrained container has no entries")]
    Empty,

    #[error("value differs between {first} and {second}")]
    Inconsistent {
        first: VersionConstraint,
        second: VersionConstraint,
    },

    #[error("unknown schema version \"{value}\"")]
    UnknownVersion { value: String },
}

/// Authoring errors found while building declarations and queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error(transparent)]
    Version(#[from] VersionError),

    #[error("type {name} is declared more than once")]
    DuplicateDeclaration { name: QualifiedTypeName },

    #[error("{declaration} has more than one member \"{member}\" at {version}")]
    DuplicateMember {
        declaration: QualifiedTypeName,
        member: String,
        version: SchemaVersion,
    },

    #[error("type {name} is not declared")]
    MissingDeclaration { name: QualifiedTypeName },

    #[error("query {path}: no ID property \"{key}\" in the response schema")]
    MissingIdProperty { path: String, key: String },

    #[error("query {path}: ID property \"{key}\" is not an identifier ({actual})")]
    InvalidIdType {
        path: String,
        key: String,
        actual: String,
    },

    #[error("query {path}: index queries need a record or conditional schema, got {actual}")]
    InvalidIdSchema { path: String, actual: String },

    #[error("unknown type reference \"{reference}\" in {scope}")]
    UnknownType { reference: String, scope: String },
}

/// Errors during resolution of IR against a schema version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("type {name} is not registered")]
    MissingDeclaration { name: QualifiedTypeName },

    #[error("type {name} does not exist at schema version {version}")]
    UnavailableDeclaration {
        name: QualifiedTypeName,
        version: SchemaVersion,
    },

    #[error("type {name} is a {actual}, expected {expected}")]
    KindMismatch {
        name: QualifiedTypeName,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Errors while picking the interpretation of a conditional for a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscriminatorError {
    #[error("{conditional}: discriminator \"{selector}\" is missing")]
    Missing {
        conditional: QualifiedTypeName,
        selector: String,
    },

    #[error("{conditional}: no interpretation for {selector} = \"{value}\"")]
    Unknown {
        conditional: QualifiedTypeName,
        selector: String,
        value: String,
    },
}

/// Errors while assembling an API version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("no endpoint named \"{name}\"")]
    UnknownEndpoint { name: String },
}

/// Errors while exporting JSON Schemas.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    #[error("type {name} is not part of schema version {version}")]
    UnknownType {
        name: String,
        version: SchemaVersion,
    },
}

impl ExportError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Errors while loading a catalogue.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid definition: {0}")]
    Definition(#[from] DefinitionError),
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            _ => 2,
        }
    }
}

impl ApiError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::Name;

    #[test]
    fn load_error_exit_codes() {
        let err = LoadError::FileNotFound {
            path: PathBuf::from("catalogue.json"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = LoadError::Definition(DefinitionError::UnknownType {
            reference: "Nope".into(),
            scope: "Item".into(),
        });
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn version_error_display() {
        let err = VersionError::MalformedRange {
            since: SchemaVersion::V2019_12_19,
            until: SchemaVersion::V2019_02_21,
        };
        assert_eq!(
            err.to_string(),
            "malformed version range: since 2019-12-19T00:00:00.000Z must precede until 2019-02-21T00:00:00Z"
        );
    }

    #[test]
    fn discriminator_error_display() {
        let err = DiscriminatorError::Missing {
            conditional: QualifiedTypeName::declaration(Name::derive("ItemDetails")),
            selector: "type".into(),
        };
        assert_eq!(err.to_string(), "ItemDetails: discriminator \"type\" is missing");
    }
}
