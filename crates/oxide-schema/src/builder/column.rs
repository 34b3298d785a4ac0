use super::{Builder, ColumnId, ObjectBuilder, ObjectKind, ReferenceSet, TableId, TypedId};
use crate::database::Database;
use crate::error::{Result, SchemaError};
use crate::expr::Expr;
use crate::tracking::{Descriptor, TrackedValue};
use crate::types::{DataType, SqlTyped};

/// Parameters of a new column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    /// Column name.
    pub name: String,
    /// Column type.
    pub data_type: DataType,
    /// Whether NULL is accepted.
    pub nullable: bool,
    /// Default expression; may not read columns.
    pub default: Option<Expr>,
}

impl ColumnDefinition {
    /// Creates a nullable column definition without a default.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            default: None,
        }
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the default expression.
    #[must_use]
    pub fn default(mut self, expr: Expr) -> Self {
        self.default = Some(expr);
        self
    }
}

/// A table column.
#[derive(Debug, Clone)]
pub struct ColumnBuilder {
    pub(crate) base: ObjectBuilder,
    pub(crate) data_type: DataType,
    pub(crate) nullable: bool,
    pub(crate) default: Option<Expr>,
    pub(crate) indexes: ReferenceSet,
    pub(crate) filter_indexes: ReferenceSet,
    pub(crate) views: ReferenceSet,
    pub(crate) checks: ReferenceSet,
}

impl ColumnBuilder {
    /// Column handle.
    #[must_use]
    pub fn id(&self) -> ColumnId {
        ColumnId::from_object_id(self.base.id())
    }

    /// Identity header.
    #[must_use]
    pub fn base(&self) -> &ObjectBuilder {
        &self.base
    }

    /// Current name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.base.name()
    }

    /// Owning table.
    #[must_use]
    pub fn table(&self) -> TableId {
        TableId::from_object_id(self.base.parent().unwrap_or(self.base.id()))
    }

    /// Column type.
    #[must_use]
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Whether NULL is accepted.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Default expression.
    #[must_use]
    pub fn default(&self) -> Option<&Expr> {
        self.default.as_ref()
    }

    /// Indexes listing this column.
    #[must_use]
    pub fn indexes(&self) -> &ReferenceSet {
        &self.indexes
    }

    /// Indexes whose filter reads this column.
    #[must_use]
    pub fn filter_indexes(&self) -> &ReferenceSet {
        &self.filter_indexes
    }

    /// Views reading this column.
    #[must_use]
    pub fn views(&self) -> &ReferenceSet {
        &self.views
    }

    /// Check constraints reading this column.
    #[must_use]
    pub fn checks(&self) -> &ReferenceSet {
        &self.checks
    }

    /// Returns true if nothing references the column.
    #[must_use]
    pub fn is_unreferenced(&self) -> bool {
        self.indexes.is_empty()
            && self.filter_indexes.is_empty()
            && self.views.is_empty()
            && self.checks.is_empty()
    }
}

impl Database {
    /// Builds a column definition for values of the Rust type `T`.
    #[must_use]
    pub fn column_for<T: SqlTyped>(&self, name: &str) -> ColumnDefinition {
        let mut definition = ColumnDefinition::new(name, self.type_provider().data_type(T::KIND));
        definition.nullable = T::NULLABLE;
        definition
    }

    /// Appends a column to `table`.
    pub fn create_column(&mut self, table: TableId, definition: ColumnDefinition) -> Result<ColumnId> {
        self.table(table)?.base.ensure_live()?;
        if let Some(default) = &definition.default {
            self.validate_constant_scope(default, "column default")?;
        }
        self.ensure_name_free(Some(table.id()), ObjectKind::Column, &definition.name)?;

        let id = self.allocate_id();
        self.register_name(Some(table.id()), ObjectKind::Column, &definition.name, id)?;
        self.insert_builder(Builder::Column(ColumnBuilder {
            base: ObjectBuilder::new(id, definition.name, ObjectKind::Column, Some(table.id())),
            data_type: definition.data_type,
            nullable: definition.nullable,
            default: definition.default,
            indexes: ReferenceSet::new(),
            filter_indexes: ReferenceSet::new(),
            views: ReferenceSet::new(),
            checks: ReferenceSet::new(),
        }));
        self.record_created(id)?;
        Ok(ColumnId::from_object_id(id))
    }

    /// Changes the column type.
    pub fn set_data_type(&mut self, column: ColumnId, data_type: DataType) -> Result<()> {
        let builder = self.column(column)?;
        builder.base.ensure_live()?;
        if builder.data_type == data_type {
            return Ok(());
        }
        let before = std::mem::replace(&mut self.column_mut(column)?.data_type, data_type.clone());
        self.record_change(
            column.id(),
            Descriptor::DataType,
            TrackedValue::DataType(before),
            TrackedValue::DataType(data_type),
        )
    }

    /// Changes whether the column accepts NULL.
    pub fn set_nullable(&mut self, column: ColumnId, nullable: bool) -> Result<()> {
        let builder = self.column(column)?;
        builder.base.ensure_live()?;
        if builder.nullable == nullable {
            return Ok(());
        }
        if nullable && self.is_primary_key_column(column)? {
            return Err(SchemaError::InvalidOperation(format!(
                "primary key column '{}' cannot be nullable",
                self.display_name(column)
            )));
        }
        self.column_mut(column)?.nullable = nullable;
        self.record_change(
            column.id(),
            Descriptor::IsNullable,
            TrackedValue::Flag(!nullable),
            TrackedValue::Flag(nullable),
        )
    }

    /// Sets or clears the default expression.
    pub fn set_default(&mut self, column: ColumnId, default: Option<Expr>) -> Result<()> {
        let builder = self.column(column)?;
        builder.base.ensure_live()?;
        if builder.default == default {
            return Ok(());
        }
        if let Some(expr) = &default {
            self.validate_constant_scope(expr, "column default")?;
        }
        let before = std::mem::replace(&mut self.column_mut(column)?.default, default.clone());
        self.record_change(
            column.id(),
            Descriptor::DefaultValue,
            TrackedValue::Expr(before),
            TrackedValue::Expr(default),
        )
    }

    pub(crate) fn is_primary_key_column(&self, column: ColumnId) -> Result<bool> {
        let table = self.table(self.column(column)?.table())?;
        let Some(pk) = table.primary_key else {
            return Ok(false);
        };
        let index = self.index(self.primary_key(pk)?.index)?;
        Ok(index.columns.iter().any(|c| c.column == column))
    }

    /// Removes a column that no index, filter, view or check reads.
    pub(crate) fn remove_column(&mut self, column: ColumnId) -> Result<()> {
        let builder = self.column(column)?;
        let name = self.display_name(column);
        let mut errors = Vec::new();
        for (references, what) in [
            (&builder.indexes, "index"),
            (&builder.filter_indexes, "filter of index"),
            (&builder.views, "view"),
            (&builder.checks, "check constraint"),
        ] {
            for id in references.ids() {
                errors.push(SchemaError::referential(
                    name.clone(),
                    format!("still referenced by {what} '{}'", self.display_name(id)),
                ));
            }
        }
        SchemaError::collect(errors)?;
        self.detach_column(column)
    }

    pub(crate) fn detach_column(&mut self, column: ColumnId) -> Result<()> {
        if self.column(column)?.base.is_removed() {
            return Ok(());
        }
        self.mark_removed(column.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::IndexDefinition;
    use crate::expr::{col, lit};

    fn setup() -> (Database, TableId) {
        let mut db = Database::sqlite();
        let main = db.default_schema();
        let t = db.create_table(main, "t").unwrap();
        (db, t)
    }

    #[test]
    fn test_column_for_runtime_types() {
        let db = Database::sqlite();
        let id = db.column_for::<i64>("id");
        assert_eq!(id.data_type, DataType::Bigint);
        assert!(!id.nullable);

        let note = db.column_for::<Option<String>>("note");
        assert_eq!(note.data_type, DataType::Text);
        assert!(note.nullable);

        let at = db.column_for::<chrono::NaiveDateTime>("created_at");
        assert_eq!(at.data_type, DataType::Timestamp);
    }

    #[test]
    fn test_default_cannot_read_columns() {
        let (mut db, t) = setup();
        let a = db
            .create_column(t, ColumnDefinition::new("a", DataType::Integer))
            .unwrap();
        let err = db
            .create_column(
                t,
                ColumnDefinition::new("b", DataType::Integer).default(col(a)),
            )
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidExpressionScope(_)));
        assert!(!db.contains::<ColumnId>(t, "b"));

        assert!(db.set_default(a, Some(col(a))).is_err());
        db.set_default(a, Some(lit(3))).unwrap();
        assert_eq!(db.column(a).unwrap().default(), Some(&lit(3)));
    }

    #[test]
    fn test_remove_reports_every_reference() {
        let (mut db, t) = setup();
        let a = db
            .create_column(t, ColumnDefinition::new("a", DataType::Integer))
            .unwrap();
        db.create_index(t, IndexDefinition::new("ix_a").column(a))
            .unwrap();
        db.create_check(t, "ck_a", col(a).gt(lit(0))).unwrap();

        let err = db.remove(a).unwrap_err();
        assert_eq!(err.violation_count(), 2);
        assert!(err.is_referential());
        assert!(!db.is_removed(a).unwrap());
        assert!(db.contains::<ColumnId>(t, "a"));
    }

    #[test]
    fn test_mutation_after_removal() {
        let (mut db, t) = setup();
        let a = db
            .create_column(t, ColumnDefinition::new("a", DataType::Integer))
            .unwrap();
        db.remove(a).unwrap();
        assert!(!db.contains::<ColumnId>(t, "a"));
        assert!(matches!(
            db.set_nullable(a, false),
            Err(SchemaError::AlreadyRemoved { .. })
        ));
        assert!(db.remove(a).is_ok());
    }
}
