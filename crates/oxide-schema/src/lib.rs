//! # oxide-schema
//!
//! An in-memory, mutable model of a relational schema that records every
//! change and compiles pending changes into ordered DDL for a target
//! engine.
//!
//! - **Builders** - schemas, tables, views, columns, indexes and
//!   constraints live in an id-keyed arena owned by [`Database`].
//!   Objects reference each other by id, so renames never break links.
//! - **Change tracking** - every mutation records the value it replaced;
//!   the first value seen in a batch is the one the plan diffs against.
//! - **Plan compilation** - [`Database::flush`] turns the batch into
//!   statements, using in-place `ALTER` where the dialect allows it and
//!   table reconstruction where it does not.
//! - **Dialects** - [`SqliteInterpreter`] and [`PostgresInterpreter`]
//!   render the statements; custom engines implement [`SqlInterpreter`].
//!
//! ## Example
//!
//! ```rust
//! use oxide_schema::prelude::*;
//!
//! let mut db = Database::sqlite();
//! let main = db.default_schema();
//! let users = db.create_table(main, "users")?;
//! let id = db.create_column(users, ColumnDefinition::new("id", DataType::Bigint).not_null())?;
//! db.create_column(users, ColumnDefinition::new("email", DataType::Text))?;
//! db.create_primary_key(users, "pk_users", &[id])?;
//! db.flush()?;
//!
//! assert!(db.pending_actions()[0].starts_with("CREATE TABLE \"users\""));
//! # Ok::<(), oxide_schema::SchemaError>(())
//! ```

pub mod builder;
pub mod database;
pub mod dialect;
pub mod error;
pub mod expr;
pub mod options;
pub mod scratch;
pub mod tracking;
pub mod types;

pub use builder::{
    CheckId, ColumnId, ForeignKeyId, IndexId, ObjectId, ObjectKind, PrimaryKeyId, SchemaId,
    TableId, TypedId, ViewId,
};
pub use database::Database;
pub use dialect::{AlterCapabilities, PostgresInterpreter, SqlInterpreter, SqliteInterpreter};
pub use error::{Result, SchemaError};
pub use options::DatabaseOptions;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::builder::{
        CheckId, ColumnDefinition, ColumnId, ForeignKeyDefinition, ForeignKeyId, IndexColumn,
        IndexDefinition, IndexId, ObjectId, ObjectKind, PrimaryKeyId, SchemaId, TableId, TypedId,
        ViewId, ViewQuery,
    };
    pub use crate::database::Database;
    pub use crate::dialect::{
        AlterCapabilities, PostgresInterpreter, SqlInterpreter, SqliteInterpreter, Statement,
    };
    pub use crate::error::{Result, SchemaError};
    pub use crate::expr::{col, lit, Expr};
    pub use crate::options::DatabaseOptions;
    pub use crate::tracking::{ChangeSummary, Descriptor, TrackedValue};
    pub use crate::types::{DataType, ForeignKeyAction, SortOrder, SqlValue};
}
