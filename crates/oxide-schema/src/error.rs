//! Error types for the schema builder.

use crate::builder::{ObjectId, ObjectKind};

/// Errors raised by builder mutations and plan generation.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The name slot is already occupied in the target namespace.
    #[error("{kind} '{name}' conflicts with an existing object in {container}")]
    NameConflict {
        /// Kind of the object being created or renamed.
        kind: ObjectKind,
        /// The conflicting name.
        name: String,
        /// Full name of the namespace owner.
        container: String,
    },

    /// The change would orphan a reference held by another object.
    #[error("Cannot change '{object}': {reason}")]
    ReferentialViolation {
        /// Full name of the object being changed.
        object: String,
        /// Human readable description of the blocking reference.
        reason: String,
    },

    /// An expression reads outside the scope it is allowed to read.
    #[error("Expression out of scope:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    InvalidExpressionScope(Vec<String>),

    /// A mutation was attempted on a removed object.
    #[error("{kind} '{name}' has been removed")]
    AlreadyRemoved {
        /// Kind of the removed object.
        kind: ObjectKind,
        /// Name of the removed object.
        name: String,
    },

    /// A name resolved to an object of a different kind than requested.
    #[error("'{name}' is a {actual}, not a {expected}")]
    TypeMismatch {
        /// The looked-up name.
        name: String,
        /// The requested kind.
        expected: ObjectKind,
        /// The kind actually stored under that name.
        actual: ObjectKind,
    },

    /// No object with that name exists in the namespace.
    #[error("{kind} '{name}' not found in {container}")]
    NotFound {
        /// The requested kind.
        kind: ObjectKind,
        /// The looked-up name.
        name: String,
        /// Full name of the namespace owner.
        container: String,
    },

    /// The handle does not belong to this database.
    #[error("Unknown object id {0}")]
    UnknownObject(ObjectId),

    /// The operation is structurally invalid.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Multiple errors occurred.
    #[error("Multiple errors occurred:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<SchemaError>),
}

impl SchemaError {
    /// Folds a list of collected violations into a single result.
    ///
    /// A single violation is returned as-is; several are wrapped in
    /// [`SchemaError::Multiple`].
    pub fn collect(mut errors: Vec<SchemaError>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Multiple(errors)),
        }
    }

    /// Returns true if this error, or every error it wraps, is a
    /// referential violation.
    #[must_use]
    pub fn is_referential(&self) -> bool {
        match self {
            Self::ReferentialViolation { .. } => true,
            Self::Multiple(errors) => errors.iter().all(Self::is_referential),
            _ => false,
        }
    }

    /// Number of violations carried by this error.
    #[must_use]
    pub fn violation_count(&self) -> usize {
        match self {
            Self::Multiple(errors) => errors.len(),
            Self::InvalidExpressionScope(errors) => errors.len(),
            _ => 1,
        }
    }

    pub(crate) fn referential(object: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ReferentialViolation {
            object: object.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for schema builder operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
