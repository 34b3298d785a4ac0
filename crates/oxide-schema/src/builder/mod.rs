//! The builder object graph.
//!
//! Every schema object is an arena entry owned by the [`Database`]
//! root and addressed by a stable [`ObjectId`]. Objects never hold
//! pointers to each other: ownership is expressed through
//! [`NamedCollection`]s keyed by case-insensitive name, and reverse
//! edges through [`ReferenceSet`]s keyed by id. Names mutate, ids don't.
//!
//! [`Database`]: crate::Database

mod collection;
mod column;
mod constraint;
mod index;
mod references;
mod schema;
mod table;
mod view;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};

pub use collection::NamedCollection;
pub use column::{ColumnBuilder, ColumnDefinition};
pub use constraint::{CheckBuilder, ForeignKeyBuilder, ForeignKeyDefinition, PrimaryKeyBuilder};
pub use index::{IndexBuilder, IndexColumn, IndexDefinition};
pub use references::ReferenceSet;
pub use schema::SchemaBuilder;
pub use table::TableBuilder;
pub use view::{SelectItem, ViewBuilder, ViewQuery};

/// Identity of a builder object, unique and never reused within one
/// database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(u64);

impl ObjectId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Type tag of a builder object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Schema (namespace).
    Schema,
    /// Table.
    Table,
    /// View.
    View,
    /// Table column.
    Column,
    /// Index.
    Index,
    /// Primary key constraint.
    PrimaryKey,
    /// Foreign key constraint.
    ForeignKey,
    /// Check constraint.
    Check,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Schema => "schema",
            Self::Table => "table",
            Self::View => "view",
            Self::Column => "column",
            Self::Index => "index",
            Self::PrimaryKey => "primary key",
            Self::ForeignKey => "foreign key",
            Self::Check => "check constraint",
        };
        f.write_str(name)
    }
}

/// A handle to a builder object of a known kind.
pub trait TypedId: Copy + Into<ObjectId> {
    /// The kind of object this handle addresses.
    const KIND: ObjectKind;

    #[doc(hidden)]
    fn from_object_id(id: ObjectId) -> Self;
}

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(ObjectId);

        impl $name {
            /// Returns the untyped object id.
            #[must_use]
            pub const fn id(self) -> ObjectId {
                self.0
            }
        }

        impl From<$name> for ObjectId {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl TypedId for $name {
            const KIND: ObjectKind = ObjectKind::$kind;

            fn from_object_id(id: ObjectId) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

typed_id!(
    /// Handle to a schema.
    SchemaId => Schema
);
typed_id!(
    /// Handle to a table.
    TableId => Table
);
typed_id!(
    /// Handle to a view.
    ViewId => View
);
typed_id!(
    /// Handle to a column.
    ColumnId => Column
);
typed_id!(
    /// Handle to an index.
    IndexId => Index
);
typed_id!(
    /// Handle to a primary key.
    PrimaryKeyId => PrimaryKey
);
typed_id!(
    /// Handle to a foreign key.
    ForeignKeyId => ForeignKey
);
typed_id!(
    /// Handle to a check constraint.
    CheckId => Check
);

/// Identity and lifecycle state shared by every builder.
#[derive(Debug, Clone)]
pub struct ObjectBuilder {
    id: ObjectId,
    name: String,
    kind: ObjectKind,
    removed: bool,
    parent: Option<ObjectId>,
}

impl ObjectBuilder {
    pub(crate) fn new(
        id: ObjectId,
        name: impl Into<String>,
        kind: ObjectKind,
        parent: Option<ObjectId>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            removed: false,
            parent,
        }
    }

    /// Object id.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Current name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type tag.
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Whether the object has been removed from the graph.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// The owning object: the schema for tables and views, the table for
    /// columns, indexes and constraints, `None` for schemas.
    #[must_use]
    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    /// Fails with [`SchemaError::AlreadyRemoved`] if the object is removed.
    pub fn ensure_live(&self) -> Result<()> {
        if self.removed {
            return Err(SchemaError::AlreadyRemoved {
                kind: self.kind,
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub(crate) fn mark_removed(&mut self) {
        self.removed = true;
    }
}

/// An arena entry: one builder of any kind.
#[derive(Debug, Clone)]
pub enum Builder {
    /// Schema builder.
    Schema(SchemaBuilder),
    /// Table builder.
    Table(TableBuilder),
    /// View builder.
    View(ViewBuilder),
    /// Column builder.
    Column(ColumnBuilder),
    /// Index builder.
    Index(IndexBuilder),
    /// Primary key builder.
    PrimaryKey(PrimaryKeyBuilder),
    /// Foreign key builder.
    ForeignKey(ForeignKeyBuilder),
    /// Check constraint builder.
    Check(CheckBuilder),
}

impl Builder {
    /// Shared identity header.
    #[must_use]
    pub fn base(&self) -> &ObjectBuilder {
        match self {
            Self::Schema(b) => &b.base,
            Self::Table(b) => &b.base,
            Self::View(b) => &b.base,
            Self::Column(b) => &b.base,
            Self::Index(b) => &b.base,
            Self::PrimaryKey(b) => &b.base,
            Self::ForeignKey(b) => &b.base,
            Self::Check(b) => &b.base,
        }
    }

    pub(crate) fn base_mut(&mut self) -> &mut ObjectBuilder {
        match self {
            Self::Schema(b) => &mut b.base,
            Self::Table(b) => &mut b.base,
            Self::View(b) => &mut b.base,
            Self::Column(b) => &mut b.base,
            Self::Index(b) => &mut b.base,
            Self::PrimaryKey(b) => &mut b.base,
            Self::ForeignKey(b) => &mut b.base,
            Self::Check(b) => &mut b.base,
        }
    }

    /// Type tag.
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        self.base().kind()
    }
}

/// Lowercased lookup key for case-insensitive namespaces.
pub(crate) fn name_key(name: &str) -> String {
    name.to_lowercase()
}

pub(crate) fn validate_name(kind: ObjectKind, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(SchemaError::InvalidOperation(format!(
            "{kind} name must not be empty"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_builder_lifecycle() {
        let mut base = ObjectBuilder::new(ObjectId::new(7), "users", ObjectKind::Table, None);
        assert_eq!(base.id().get(), 7);
        assert!(base.ensure_live().is_ok());

        base.mark_removed();
        assert!(base.is_removed());
        assert!(matches!(
            base.ensure_live(),
            Err(SchemaError::AlreadyRemoved {
                kind: ObjectKind::Table,
                ..
            })
        ));
    }

    #[test]
    fn test_typed_id_conversion() {
        let id = TableId::from_object_id(ObjectId::new(3));
        let raw: ObjectId = id.into();
        assert_eq!(raw, ObjectId::new(3));
        assert_eq!(TableId::KIND, ObjectKind::Table);
        assert_eq!(id.to_string(), "#3");
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name(ObjectKind::Column, "a").is_ok());
        assert!(validate_name(ObjectKind::Column, "  ").is_err());
    }
}
