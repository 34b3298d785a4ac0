use serde::{Deserialize, Serialize};

use super::{
    Builder, ColumnId, IndexId, ObjectBuilder, ObjectKind, PrimaryKeyId, ReferenceSet, TableId,
    TypedId,
};
use crate::database::Database;
use crate::error::{Result, SchemaError};
use crate::expr::Expr;
use crate::tracking::{Descriptor, TrackedValue};
use crate::types::SortOrder;

/// One indexed column with its direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexColumn {
    /// Indexed column.
    pub column: ColumnId,
    /// Sort direction.
    pub order: SortOrder,
}

impl IndexColumn {
    /// An ascending index column.
    #[must_use]
    pub fn asc(column: ColumnId) -> Self {
        Self {
            column,
            order: SortOrder::Asc,
        }
    }

    /// A descending index column.
    #[must_use]
    pub fn desc(column: ColumnId) -> Self {
        Self {
            column,
            order: SortOrder::Desc,
        }
    }
}

/// Parameters of a new index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    /// Index name, unique in the schema.
    pub name: String,
    /// Indexed columns.
    pub columns: Vec<IndexColumn>,
    /// UNIQUE index.
    pub unique: bool,
    /// Partial index filter; may only read the indexed table.
    pub filter: Option<Expr>,
}

impl IndexDefinition {
    /// Creates a non-unique index definition without columns.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            unique: false,
            filter: None,
        }
    }

    /// Appends an ascending column.
    #[must_use]
    pub fn column(mut self, column: ColumnId) -> Self {
        self.columns.push(IndexColumn::asc(column));
        self
    }

    /// Appends a descending column.
    #[must_use]
    pub fn column_desc(mut self, column: ColumnId) -> Self {
        self.columns.push(IndexColumn::desc(column));
        self
    }

    /// Makes the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets the partial index filter.
    #[must_use]
    pub fn filter(mut self, filter: Expr) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// An index on one table.
///
/// An index backing a primary key is virtual: it is rendered as the
/// table's PRIMARY KEY constraint rather than a CREATE INDEX.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    pub(crate) base: ObjectBuilder,
    pub(crate) columns: Vec<IndexColumn>,
    pub(crate) unique: bool,
    pub(crate) filter: Option<Expr>,
    pub(crate) filter_columns: Vec<ColumnId>,
    pub(crate) primary_key: Option<PrimaryKeyId>,
    pub(crate) originating_keys: ReferenceSet,
    pub(crate) referencing_keys: ReferenceSet,
}

impl IndexBuilder {
    /// Index handle.
    #[must_use]
    pub fn id(&self) -> IndexId {
        IndexId::from_object_id(self.base.id())
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

    /// Indexed table.
    #[must_use]
    pub fn table(&self) -> TableId {
        TableId::from_object_id(self.base.parent().unwrap_or(self.base.id()))
    }

    /// Indexed columns.
    #[must_use]
    pub fn columns(&self) -> &[IndexColumn] {
        &self.columns
    }

    /// UNIQUE index.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Partial index filter.
    #[must_use]
    pub fn filter(&self) -> Option<&Expr> {
        self.filter.as_ref()
    }

    /// The primary key backed by this index.
    #[must_use]
    pub fn primary_key(&self) -> Option<PrimaryKeyId> {
        self.primary_key
    }

    /// Returns true if the index backs a primary key.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.primary_key.is_some()
    }

    /// Foreign keys whose columns this index lists.
    #[must_use]
    pub fn originating_keys(&self) -> &ReferenceSet {
        &self.originating_keys
    }

    /// Foreign keys pointing at this index.
    #[must_use]
    pub fn referencing_keys(&self) -> &ReferenceSet {
        &self.referencing_keys
    }
}

impl Database {
    /// Creates an index on `table`. The name is unique across the
    /// table's schema.
    pub fn create_index(&mut self, table: TableId, definition: IndexDefinition) -> Result<IndexId> {
        self.table(table)?.base.ensure_live()?;
        self.validate_index_columns(table, &definition.columns)?;
        let filter_columns = match &definition.filter {
            Some(filter) => self.validate_table_scope(table, filter, "index filter")?,
            None => Vec::new(),
        };
        let schema = self.schema_of(table)?;
        self.ensure_name_free(Some(schema.id()), ObjectKind::Index, &definition.name)?;

        let id = self.allocate_id();
        self.register_name(Some(schema.id()), ObjectKind::Index, &definition.name, id)?;
        for column in &definition.columns {
            self.column_mut(column.column)?
                .indexes
                .add(id, ObjectKind::Index);
        }
        for column in &filter_columns {
            self.column_mut(*column)?
                .filter_indexes
                .add(id, ObjectKind::Index);
        }
        self.table_mut(table)?
            .indexes
            .push(IndexId::from_object_id(id));
        self.insert_builder(Builder::Index(IndexBuilder {
            base: ObjectBuilder::new(id, definition.name, ObjectKind::Index, Some(table.id())),
            columns: definition.columns,
            unique: definition.unique,
            filter: definition.filter,
            filter_columns,
            primary_key: None,
            originating_keys: ReferenceSet::new(),
            referencing_keys: ReferenceSet::new(),
        }));
        self.record_created(id)?;
        Ok(IndexId::from_object_id(id))
    }

    fn validate_index_columns(&self, table: TableId, columns: &[IndexColumn]) -> Result<()> {
        if columns.is_empty() {
            return Err(SchemaError::InvalidOperation(String::from(
                "an index needs at least one column",
            )));
        }
        let mut errors = Vec::new();
        for (i, entry) in columns.iter().enumerate() {
            let column = self.column(entry.column)?;
            if column.base.is_removed() {
                errors.push(format!("index lists removed column '{}'", column.name()));
            } else if column.table() != table {
                errors.push(format!(
                    "index lists column '{}' outside table '{}'",
                    self.display_name(entry.column),
                    self.display_name(table)
                ));
            } else if columns[..i].iter().any(|c| c.column == entry.column) {
                errors.push(format!("index lists column '{}' twice", column.name()));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::InvalidExpressionScope(errors))
        }
    }

    fn foreign_key_dependency_violations(&self, index: &IndexBuilder, reason: &str) -> Vec<SchemaError> {
        index
            .referencing_keys
            .ids()
            .map(|fk| {
                SchemaError::referential(
                    self.display_name(index.base.id()),
                    format!("{reason} due to foreign key '{}'", self.display_name(fk)),
                )
            })
            .collect()
    }

    /// Changes uniqueness. An index referenced by a foreign key or
    /// backing a primary key must stay unique.
    pub fn set_unique(&mut self, index: IndexId, unique: bool) -> Result<()> {
        let builder = self.index(index)?;
        builder.base.ensure_live()?;
        if builder.unique == unique {
            return Ok(());
        }
        if !unique {
            let mut errors = self.foreign_key_dependency_violations(builder, "index must remain unique");
            if builder.is_virtual() {
                errors.push(SchemaError::referential(
                    self.display_name(index),
                    "index must remain unique due to primary key",
                ));
            }
            SchemaError::collect(errors)?;
        }
        self.index_mut(index)?.unique = unique;
        self.record_change(
            index.id(),
            Descriptor::IsUnique,
            TrackedValue::Flag(!unique),
            TrackedValue::Flag(unique),
        )
    }

    /// Sets or clears the partial index filter.
    pub fn set_filter(&mut self, index: IndexId, filter: Option<Expr>) -> Result<()> {
        let builder = self.index(index)?;
        builder.base.ensure_live()?;
        if builder.filter == filter {
            return Ok(());
        }
        let table = builder.table();
        let filter_columns = match &filter {
            Some(expr) => {
                let mut errors =
                    self.foreign_key_dependency_violations(builder, "index must remain non-partial");
                if builder.is_virtual() {
                    errors.push(SchemaError::referential(
                        self.display_name(index),
                        "index must remain non-partial due to primary key",
                    ));
                }
                SchemaError::collect(errors)?;
                self.validate_table_scope(table, expr, "index filter")?
            }
            None => Vec::new(),
        };

        let old_columns = std::mem::take(&mut self.index_mut(index)?.filter_columns);
        for column in old_columns {
            self.column_mut(column)?.filter_indexes.remove(index.id());
        }
        for column in &filter_columns {
            self.column_mut(*column)?
                .filter_indexes
                .add(index.id(), ObjectKind::Index);
        }
        let builder = self.index_mut(index)?;
        builder.filter_columns = filter_columns;
        let before = std::mem::replace(&mut builder.filter, filter.clone());
        self.record_change(
            index.id(),
            Descriptor::Filter,
            TrackedValue::Expr(before),
            TrackedValue::Expr(filter),
        )
    }

    /// Replaces the indexed column list.
    ///
    /// Foreign keys through this index pin the column count.
    pub fn set_index_columns(&mut self, index: IndexId, columns: Vec<IndexColumn>) -> Result<()> {
        let builder = self.index(index)?;
        builder.base.ensure_live()?;
        if builder.columns == columns {
            return Ok(());
        }
        self.validate_index_columns(builder.table(), &columns)?;
        if builder.columns.len() != columns.len() {
            let errors: Vec<SchemaError> = builder
                .originating_keys
                .ids()
                .chain(builder.referencing_keys.ids())
                .map(|fk| {
                    SchemaError::referential(
                        self.display_name(index),
                        format!(
                            "column count must match foreign key '{}'",
                            self.display_name(fk)
                        ),
                    )
                })
                .collect();
            SchemaError::collect(errors)?;
        }

        let before = std::mem::replace(&mut self.index_mut(index)?.columns, columns.clone());
        for entry in &before {
            self.column_mut(entry.column)?.indexes.remove(index.id());
        }
        for entry in &columns {
            self.column_mut(entry.column)?
                .indexes
                .add(index.id(), ObjectKind::Index);
        }
        self.record_change(
            index.id(),
            Descriptor::IndexColumns,
            TrackedValue::Columns(before),
            TrackedValue::Columns(columns),
        )
    }

    /// Removes an index no foreign key depends on. Removing the index of
    /// a primary key removes the key too.
    pub(crate) fn remove_index(&mut self, index: IndexId) -> Result<()> {
        let builder = self.index(index)?;
        let errors: Vec<SchemaError> = builder
            .originating_keys
            .ids()
            .chain(builder.referencing_keys.ids())
            .map(|fk| {
                SchemaError::referential(
                    self.display_name(index),
                    format!("still referenced by foreign key '{}'", self.display_name(fk)),
                )
            })
            .collect();
        SchemaError::collect(errors)?;
        self.detach_index(index)
    }

    pub(crate) fn detach_index(&mut self, index: IndexId) -> Result<()> {
        let builder = self.index(index)?;
        if builder.base.is_removed() {
            return Ok(());
        }
        let primary_key = builder.primary_key;
        if let Some(pk) = primary_key {
            self.detach_primary_key(pk)?;
        }

        let builder = self.index(index)?;
        let table = builder.table();
        let columns: Vec<ColumnId> = builder.columns.iter().map(|c| c.column).collect();
        let filter_columns = builder.filter_columns.clone();
        for column in columns {
            self.column_mut(column)?.indexes.remove(index.id());
        }
        for column in filter_columns {
            self.column_mut(column)?.filter_indexes.remove(index.id());
        }
        self.table_mut(table)?.indexes.retain(|i| *i != index);
        self.mark_removed(index.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ColumnDefinition;
    use crate::expr::{col, lit};
    use crate::types::DataType;

    fn setup() -> (Database, TableId, ColumnId, ColumnId) {
        let mut db = Database::sqlite();
        let main = db.default_schema();
        let t = db.create_table(main, "t").unwrap();
        let a = db
            .create_column(t, ColumnDefinition::new("a", DataType::Integer))
            .unwrap();
        let b = db
            .create_column(t, ColumnDefinition::new("b", DataType::Integer))
            .unwrap();
        (db, t, a, b)
    }

    #[test]
    fn test_index_names_are_schema_wide() {
        let (mut db, t, a, _) = setup();
        let main = db.default_schema();
        let u = db.create_table(main, "u").unwrap();
        let x = db
            .create_column(u, ColumnDefinition::new("x", DataType::Integer))
            .unwrap();
        let ix = db.create_index(t, IndexDefinition::new("ix").column(a)).unwrap();
        assert!(matches!(
            db.create_index(u, IndexDefinition::new("IX").column(x)),
            Err(SchemaError::NameConflict { .. })
        ));
        assert_eq!(db.get::<IndexId>(main, "ix").unwrap(), ix);
    }

    #[test]
    fn test_filter_scope_is_own_table() {
        let (mut db, t, a, _) = setup();
        let main = db.default_schema();
        let u = db.create_table(main, "u").unwrap();
        let x = db
            .create_column(u, ColumnDefinition::new("x", DataType::Integer))
            .unwrap();

        let err = db
            .create_index(
                t,
                IndexDefinition::new("ix").column(a).filter(col(x).gt(lit(0))),
            )
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidExpressionScope(ref e) if e.len() == 1));
        assert!(db.column(a).unwrap().indexes().is_empty());
    }

    #[test]
    fn test_filter_back_references_follow_changes() {
        let (mut db, t, a, b) = setup();
        let ix = db
            .create_index(t, IndexDefinition::new("ix").column(a).filter(col(b).is_not_null()))
            .unwrap();
        assert!(db.column(b).unwrap().filter_indexes().contains(ix.id()));

        db.set_filter(ix, Some(col(a).gt(lit(1)))).unwrap();
        assert!(db.column(b).unwrap().filter_indexes().is_empty());
        assert!(db.column(a).unwrap().filter_indexes().contains(ix.id()));

        db.set_filter(ix, None).unwrap();
        assert!(db.column(a).unwrap().filter_indexes().is_empty());
    }

    #[test]
    fn test_remove_index_releases_columns() {
        let (mut db, t, a, b) = setup();
        let ix = db
            .create_index(t, IndexDefinition::new("ix").column(a).column_desc(b))
            .unwrap();
        db.remove(ix).unwrap();
        assert!(db.column(a).unwrap().is_unreferenced());
        assert!(db.indexes(t).unwrap().is_empty());
        assert!(!db.contains::<IndexId>(db.default_schema(), "ix"));
        db.remove(a).unwrap();
    }

    #[test]
    fn test_duplicate_index_column() {
        let (mut db, t, a, _) = setup();
        assert!(db
            .create_index(t, IndexDefinition::new("ix").column(a).column(a))
            .is_err());
        assert!(db.create_index(t, IndexDefinition::new("ix")).is_err());
    }
}
