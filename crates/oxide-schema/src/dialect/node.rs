//! Statement nodes handed to dialect interpreters.
//!
//! Nodes carry resolved names only. The plan compiler looks every
//! builder up once and produces nodes that can be rendered without
//! access to the database.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::expr::{Expr, ResolvedColumn};
use crate::types::{DataType, ForeignKeyAction, SortOrder};

/// An expression whose column references are resolved to names.
pub type ResolvedExpr = Expr<ResolvedColumn>;

/// A possibly schema-qualified object name.
///
/// `schema` is `None` for objects in the default schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    /// Schema name.
    pub schema: Option<String>,
    /// Object name.
    pub name: String,
}

impl QualifiedName {
    /// Creates an unqualified name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// Creates a schema-qualified name.
    #[must_use]
    pub fn in_schema(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Returns the same schema with another object name.
    #[must_use]
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            schema: self.schema.clone(),
            name: name.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A column in CREATE TABLE or ADD COLUMN.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnNode {
    /// Column name.
    pub name: String,
    /// Column type.
    pub data_type: DataType,
    /// Whether NULL is accepted.
    pub nullable: bool,
    /// Default expression.
    pub default: Option<ResolvedExpr>,
}

/// A primary key constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryKeyNode {
    /// Constraint name.
    pub name: String,
    /// Key columns.
    pub columns: Vec<String>,
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyNode {
    /// Constraint name.
    pub name: String,
    /// Referencing columns.
    pub columns: Vec<String>,
    /// Referenced table.
    pub referenced_table: QualifiedName,
    /// Referenced columns.
    pub referenced_columns: Vec<String>,
    /// ON DELETE behavior.
    pub on_delete: ForeignKeyAction,
    /// ON UPDATE behavior.
    pub on_update: ForeignKeyAction,
}

/// A check constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckNode {
    /// Constraint name.
    pub name: String,
    /// Boolean condition.
    pub condition: ResolvedExpr,
}

/// A table-level constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintNode {
    /// PRIMARY KEY.
    PrimaryKey(PrimaryKeyNode),
    /// FOREIGN KEY.
    ForeignKey(ForeignKeyNode),
    /// CHECK.
    Check(CheckNode),
}

impl ConstraintNode {
    /// Constraint name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::PrimaryKey(pk) => &pk.name,
            Self::ForeignKey(fk) => &fk.name,
            Self::Check(check) => &check.name,
        }
    }
}

/// CREATE TABLE.
#[derive(Debug, Clone, PartialEq)]
pub struct TableNode {
    /// Table name.
    pub name: QualifiedName,
    /// Columns in order.
    pub columns: Vec<ColumnNode>,
    /// Table constraints.
    pub constraints: Vec<ConstraintNode>,
}

/// CREATE INDEX.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexNode {
    /// Index name, qualified by the table's schema.
    pub name: QualifiedName,
    /// Indexed table.
    pub table: QualifiedName,
    /// Indexed columns with direction.
    pub columns: Vec<(String, SortOrder)>,
    /// UNIQUE index.
    pub unique: bool,
    /// Partial index filter.
    pub filter: Option<ResolvedExpr>,
}

/// One projection of a view query.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectNode {
    /// `*`
    Wildcard,
    /// `source.*`
    SourceWildcard(QualifiedName),
    /// `expr [AS alias]`
    Expr {
        /// Projected expression.
        expr: ResolvedExpr,
        /// Output column name.
        alias: Option<String>,
    },
}

/// The SELECT behind a view.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryNode {
    /// Tables and views in the FROM list.
    pub sources: Vec<QualifiedName>,
    /// Projections.
    pub items: Vec<SelectNode>,
    /// WHERE condition.
    pub filter: Option<ResolvedExpr>,
}

/// CREATE VIEW.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewNode {
    /// View name.
    pub name: QualifiedName,
    /// View query.
    pub query: QueryNode,
}

/// An in-place column alteration.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnChange {
    /// Change the column type.
    SetDataType(DataType),
    /// Make the column NOT NULL.
    SetNotNull,
    /// Make the column nullable.
    DropNotNull,
    /// Set the default expression.
    SetDefault(ResolvedExpr),
    /// Remove the default expression.
    DropDefault,
}

/// A single logical DDL or DML step.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// CREATE SCHEMA.
    CreateSchema(String),
    /// DROP SCHEMA.
    DropSchema(String),
    /// Rename a schema.
    RenameSchema {
        /// Current name.
        from: String,
        /// New name.
        to: String,
    },
    /// CREATE TABLE.
    CreateTable(TableNode),
    /// DROP TABLE.
    DropTable(QualifiedName),
    /// Rename or move a table.
    RenameTable {
        /// Current name.
        from: QualifiedName,
        /// New name.
        to: QualifiedName,
    },
    /// ADD COLUMN.
    AddColumn {
        /// Altered table.
        table: QualifiedName,
        /// New column.
        column: ColumnNode,
    },
    /// DROP COLUMN.
    DropColumn {
        /// Altered table.
        table: QualifiedName,
        /// Dropped column.
        column: String,
    },
    /// RENAME COLUMN.
    RenameColumn {
        /// Altered table.
        table: QualifiedName,
        /// Current name.
        from: String,
        /// New name.
        to: String,
    },
    /// ALTER COLUMN.
    AlterColumn {
        /// Altered table.
        table: QualifiedName,
        /// Altered column.
        column: String,
        /// The alteration.
        change: ColumnChange,
    },
    /// `UPDATE table SET column = value WHERE column IS NULL`.
    BackfillNulls {
        /// Updated table.
        table: QualifiedName,
        /// Filled column.
        column: String,
        /// Fill value.
        value: ResolvedExpr,
    },
    /// ADD CONSTRAINT.
    AddConstraint {
        /// Altered table.
        table: QualifiedName,
        /// New constraint.
        constraint: ConstraintNode,
    },
    /// DROP CONSTRAINT.
    DropConstraint {
        /// Altered table.
        table: QualifiedName,
        /// Constraint name.
        name: String,
    },
    /// RENAME CONSTRAINT.
    RenameConstraint {
        /// Altered table.
        table: QualifiedName,
        /// Current name.
        from: String,
        /// New name.
        to: String,
    },
    /// CREATE INDEX.
    CreateIndex(IndexNode),
    /// Rename an index inside its schema.
    RenameIndex {
        /// Current name.
        from: QualifiedName,
        /// New name.
        to: String,
    },
    /// DROP INDEX.
    DropIndex(QualifiedName),
    /// CREATE VIEW.
    CreateView(ViewNode),
    /// DROP VIEW.
    DropView(QualifiedName),
    /// `INSERT INTO target (columns) SELECT values FROM source`.
    InsertSelect {
        /// Target table.
        target: QualifiedName,
        /// Target columns.
        columns: Vec<String>,
        /// Source table.
        source: QualifiedName,
        /// One selected expression per target column.
        values: Vec<ResolvedExpr>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_name_display() {
        assert_eq!(QualifiedName::new("t").to_string(), "t");
        let name = QualifiedName::in_schema("s", "t");
        assert_eq!(name.to_string(), "s.t");
        assert_eq!(name.with_name("u"), QualifiedName::in_schema("s", "u"));
    }
}
