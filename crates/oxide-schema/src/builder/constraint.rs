//! Primary key, foreign key and check constraints.

use super::{
    Builder, CheckId, ColumnId, ForeignKeyId, IndexColumn, IndexDefinition, IndexId,
    ObjectBuilder, ObjectKind, PrimaryKeyId, TableId, TypedId,
};
use crate::database::Database;
use crate::error::{Result, SchemaError};
use crate::expr::Expr;
use crate::tracking::{Descriptor, TrackedValue};
use crate::types::ForeignKeyAction;

/// A primary key, backed 1:1 by a unique index.
#[derive(Debug, Clone)]
pub struct PrimaryKeyBuilder {
    pub(crate) base: ObjectBuilder,
    pub(crate) index: IndexId,
}

impl PrimaryKeyBuilder {
    /// Key handle.
    #[must_use]
    pub fn id(&self) -> PrimaryKeyId {
        PrimaryKeyId::from_object_id(self.base.id())
    }

    /// Current name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.base.name()
    }

    /// The backing index.
    #[must_use]
    pub fn index(&self) -> IndexId {
        self.index
    }
}

/// Parameters of a new foreign key.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyDefinition {
    /// Constraint name, unique among the table's constraints.
    pub name: String,
    /// Index listing the referencing columns.
    pub origin: IndexId,
    /// Unique index listing the referenced columns.
    pub referenced: Option<IndexId>,
    /// ON DELETE behavior.
    pub on_delete: ForeignKeyAction,
    /// ON UPDATE behavior.
    pub on_update: ForeignKeyAction,
}

impl ForeignKeyDefinition {
    /// Creates a definition whose columns are those of `origin`.
    #[must_use]
    pub fn new(name: impl Into<String>, origin: IndexId) -> Self {
        Self {
            name: name.into(),
            origin,
            referenced: None,
            on_delete: ForeignKeyAction::default(),
            on_update: ForeignKeyAction::default(),
        }
    }

    /// Sets the referenced index.
    #[must_use]
    pub fn references(mut self, index: IndexId) -> Self {
        self.referenced = Some(index);
        self
    }

    /// Sets the ON DELETE behavior.
    #[must_use]
    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = action;
        self
    }

    /// Sets the ON UPDATE behavior.
    #[must_use]
    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        self.on_update = action;
        self
    }
}

/// A foreign key between two indexes.
#[derive(Debug, Clone)]
pub struct ForeignKeyBuilder {
    pub(crate) base: ObjectBuilder,
    pub(crate) origin: IndexId,
    pub(crate) referenced: IndexId,
    pub(crate) on_delete: ForeignKeyAction,
    pub(crate) on_update: ForeignKeyAction,
}

impl ForeignKeyBuilder {
    /// Key handle.
    #[must_use]
    pub fn id(&self) -> ForeignKeyId {
        ForeignKeyId::from_object_id(self.base.id())
    }

    /// Current name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.base.name()
    }

    /// Index of the referencing columns.
    #[must_use]
    pub fn origin(&self) -> IndexId {
        self.origin
    }

    /// Index of the referenced columns.
    #[must_use]
    pub fn referenced(&self) -> IndexId {
        self.referenced
    }

    /// ON DELETE behavior.
    #[must_use]
    pub fn on_delete(&self) -> ForeignKeyAction {
        self.on_delete
    }

    /// ON UPDATE behavior.
    #[must_use]
    pub fn on_update(&self) -> ForeignKeyAction {
        self.on_update
    }
}

/// A check constraint.
#[derive(Debug, Clone)]
pub struct CheckBuilder {
    pub(crate) base: ObjectBuilder,
    pub(crate) condition: Expr,
    pub(crate) columns: Vec<ColumnId>,
}

impl CheckBuilder {
    /// Check handle.
    #[must_use]
    pub fn id(&self) -> CheckId {
        CheckId::from_object_id(self.base.id())
    }

    /// Current name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.base.name()
    }

    /// Boolean condition.
    #[must_use]
    pub fn condition(&self) -> &Expr {
        &self.condition
    }

    /// Columns read by the condition.
    #[must_use]
    pub fn columns(&self) -> &[ColumnId] {
        &self.columns
    }
}

impl Database {
    // ================================================================
    // Primary keys
    // ================================================================

    /// Creates the primary key of `table` over `columns`, together with
    /// its backing unique index. Both are named `name`.
    pub fn create_primary_key(
        &mut self,
        table: TableId,
        name: &str,
        columns: &[ColumnId],
    ) -> Result<PrimaryKeyId> {
        let builder = self.table(table)?;
        builder.base.ensure_live()?;
        if let Some(existing) = builder.primary_key {
            return Err(SchemaError::InvalidOperation(format!(
                "table '{}' already has primary key '{}'",
                self.display_name(table),
                self.name(existing)?
            )));
        }
        let nullable: Vec<String> = columns
            .iter()
            .filter_map(|c| self.column(*c).ok())
            .filter(|c| c.nullable)
            .map(|c| format!("primary key column '{}' must be NOT NULL", c.name()))
            .collect();
        if !nullable.is_empty() {
            return Err(SchemaError::InvalidExpressionScope(nullable));
        }
        self.ensure_name_free(Some(table.id()), ObjectKind::PrimaryKey, name)?;

        let mut definition = IndexDefinition::new(name).unique();
        definition.columns = columns.iter().copied().map(IndexColumn::asc).collect();
        let index = self.create_index(table, definition)?;

        let id = self.allocate_id();
        self.register_name(Some(table.id()), ObjectKind::PrimaryKey, name, id)?;
        self.insert_builder(Builder::PrimaryKey(PrimaryKeyBuilder {
            base: ObjectBuilder::new(id, name, ObjectKind::PrimaryKey, Some(table.id())),
            index,
        }));
        let pk = PrimaryKeyId::from_object_id(id);
        self.index_mut(index)?.primary_key = Some(pk);
        self.table_mut(table)?.primary_key = Some(pk);
        self.record_created(id)?;
        self.record_change(
            table.id(),
            Descriptor::PrimaryKey,
            TrackedValue::Object(None),
            TrackedValue::Object(Some(id)),
        )?;
        Ok(pk)
    }

    pub(crate) fn remove_primary_key(&mut self, pk: PrimaryKeyId) -> Result<()> {
        self.detach_primary_key(pk)
    }

    /// Drops the key; the backing index stays as a plain unique index.
    pub(crate) fn detach_primary_key(&mut self, pk: PrimaryKeyId) -> Result<()> {
        let builder = self.primary_key(pk)?;
        if builder.base.is_removed() {
            return Ok(());
        }
        let index = builder.index;
        let table = self.index(index)?.table();
        self.index_mut(index)?.primary_key = None;
        self.table_mut(table)?.primary_key = None;
        self.mark_removed(pk.id())?;
        self.record_change(
            table.id(),
            Descriptor::PrimaryKey,
            TrackedValue::Object(Some(pk.id())),
            TrackedValue::Object(None),
        )
    }

    // ================================================================
    // Foreign keys
    // ================================================================

    /// Creates a foreign key from `definition.origin` to
    /// `definition.referenced`, which must be unique and non-partial.
    pub fn create_foreign_key(&mut self, definition: ForeignKeyDefinition) -> Result<ForeignKeyId> {
        let referenced = definition.referenced.ok_or_else(|| {
            SchemaError::InvalidOperation(format!(
                "foreign key '{}' has no referenced index",
                definition.name
            ))
        })?;
        let origin = self.index(definition.origin)?;
        origin.base.ensure_live()?;
        let target = self.index(referenced)?;
        target.base.ensure_live()?;

        let mut errors = Vec::new();
        if !target.unique {
            errors.push(SchemaError::referential(
                self.display_name(referenced),
                format!(
                    "referenced index must be unique for foreign key '{}'",
                    definition.name
                ),
            ));
        }
        if target.filter.is_some() {
            errors.push(SchemaError::referential(
                self.display_name(referenced),
                format!(
                    "referenced index must be non-partial for foreign key '{}'",
                    definition.name
                ),
            ));
        }
        if origin.columns.len() != target.columns.len() {
            errors.push(SchemaError::InvalidOperation(format!(
                "foreign key '{}' maps {} columns onto {}",
                definition.name,
                origin.columns.len(),
                target.columns.len()
            )));
        }
        SchemaError::collect(errors)?;

        let table = origin.table();
        self.ensure_name_free(Some(table.id()), ObjectKind::ForeignKey, &definition.name)?;
        let id = self.allocate_id();
        self.register_name(Some(table.id()), ObjectKind::ForeignKey, &definition.name, id)?;
        self.index_mut(definition.origin)?
            .originating_keys
            .add(id, ObjectKind::ForeignKey);
        self.index_mut(referenced)?
            .referencing_keys
            .add(id, ObjectKind::ForeignKey);
        self.insert_builder(Builder::ForeignKey(ForeignKeyBuilder {
            base: ObjectBuilder::new(id, definition.name, ObjectKind::ForeignKey, Some(table.id())),
            origin: definition.origin,
            referenced,
            on_delete: definition.on_delete,
            on_update: definition.on_update,
        }));
        self.record_created(id)?;
        Ok(ForeignKeyId::from_object_id(id))
    }

    /// Creates a foreign key referencing the primary key of `table`.
    pub fn create_foreign_key_to_table(
        &mut self,
        definition: ForeignKeyDefinition,
        table: TableId,
    ) -> Result<ForeignKeyId> {
        let pk = self
            .table(table)?
            .primary_key
            .ok_or_else(|| SchemaError::referential(self.display_name(table), "primary key missing"))?;
        let index = self.primary_key(pk)?.index;
        self.create_foreign_key(definition.references(index))
    }

    /// Changes the ON DELETE behavior.
    pub fn set_on_delete(&mut self, fk: ForeignKeyId, action: ForeignKeyAction) -> Result<()> {
        let builder = self.foreign_key(fk)?;
        builder.base.ensure_live()?;
        if builder.on_delete == action {
            return Ok(());
        }
        let before = std::mem::replace(&mut self.foreign_key_mut(fk)?.on_delete, action);
        self.record_change(
            fk.id(),
            Descriptor::OnDeleteBehavior,
            TrackedValue::Action(before),
            TrackedValue::Action(action),
        )
    }

    /// Changes the ON UPDATE behavior.
    pub fn set_on_update(&mut self, fk: ForeignKeyId, action: ForeignKeyAction) -> Result<()> {
        let builder = self.foreign_key(fk)?;
        builder.base.ensure_live()?;
        if builder.on_update == action {
            return Ok(());
        }
        let before = std::mem::replace(&mut self.foreign_key_mut(fk)?.on_update, action);
        self.record_change(
            fk.id(),
            Descriptor::OnUpdateBehavior,
            TrackedValue::Action(before),
            TrackedValue::Action(action),
        )
    }

    pub(crate) fn remove_foreign_key(&mut self, fk: ForeignKeyId) -> Result<()> {
        self.detach_foreign_key(fk)
    }

    pub(crate) fn detach_foreign_key(&mut self, fk: ForeignKeyId) -> Result<()> {
        let builder = self.foreign_key(fk)?;
        if builder.base.is_removed() {
            return Ok(());
        }
        let (origin, referenced) = (builder.origin, builder.referenced);
        self.index_mut(origin)?.originating_keys.remove(fk.id());
        self.index_mut(referenced)?.referencing_keys.remove(fk.id());
        self.mark_removed(fk.id())
    }

    // ================================================================
    // Checks
    // ================================================================

    /// Creates a check constraint; the condition may only read columns
    /// of `table`.
    pub fn create_check(&mut self, table: TableId, name: &str, condition: Expr) -> Result<CheckId> {
        self.table(table)?.base.ensure_live()?;
        let columns = self.validate_table_scope(table, &condition, "check constraint")?;
        self.ensure_name_free(Some(table.id()), ObjectKind::Check, name)?;

        let id = self.allocate_id();
        self.register_name(Some(table.id()), ObjectKind::Check, name, id)?;
        for column in &columns {
            self.column_mut(*column)?
                .checks
                .add(id, ObjectKind::Check);
        }
        self.insert_builder(Builder::Check(CheckBuilder {
            base: ObjectBuilder::new(id, name, ObjectKind::Check, Some(table.id())),
            condition,
            columns,
        }));
        self.record_created(id)?;
        Ok(CheckId::from_object_id(id))
    }

    /// Replaces the check condition.
    pub fn set_condition(&mut self, check: CheckId, condition: Expr) -> Result<()> {
        let builder = self.check(check)?;
        builder.base.ensure_live()?;
        if builder.condition == condition {
            return Ok(());
        }
        let table = self.table_of(check)?;
        let columns = self.validate_table_scope(table, &condition, "check constraint")?;

        let old_columns = std::mem::take(&mut self.check_mut(check)?.columns);
        for column in old_columns {
            self.column_mut(column)?.checks.remove(check.id());
        }
        for column in &columns {
            self.column_mut(*column)?
                .checks
                .add(check.id(), ObjectKind::Check);
        }
        let builder = self.check_mut(check)?;
        builder.columns = columns;
        let before = std::mem::replace(&mut builder.condition, condition.clone());
        self.record_change(
            check.id(),
            Descriptor::Condition,
            TrackedValue::Expr(Some(before)),
            TrackedValue::Expr(Some(condition)),
        )
    }

    pub(crate) fn remove_check(&mut self, check: CheckId) -> Result<()> {
        self.detach_check(check)
    }

    pub(crate) fn detach_check(&mut self, check: CheckId) -> Result<()> {
        let builder = self.check(check)?;
        if builder.base.is_removed() {
            return Ok(());
        }
        let columns = builder.columns.clone();
        for column in columns {
            self.column_mut(column)?.checks.remove(check.id());
        }
        self.mark_removed(check.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ColumnDefinition;
    use crate::expr::{col, lit};
    use crate::types::DataType;

    struct Fixture {
        db: Database,
        users: TableId,
        user_pk_index: IndexId,
        orders: TableId,
        owner_index: IndexId,
    }

    fn fixture() -> Fixture {
        let mut db = Database::sqlite();
        let main = db.default_schema();
        let users = db.create_table(main, "users").unwrap();
        let id = db
            .create_column(users, ColumnDefinition::new("id", DataType::Bigint).not_null())
            .unwrap();
        let pk = db.create_primary_key(users, "pk_users", &[id]).unwrap();
        let user_pk_index = db.primary_key(pk).unwrap().index();

        let orders = db.create_table(main, "orders").unwrap();
        let owner = db
            .create_column(orders, ColumnDefinition::new("user_id", DataType::Bigint))
            .unwrap();
        let owner_index = db
            .create_index(orders, IndexDefinition::new("ix_orders_user").column(owner))
            .unwrap();
        Fixture {
            db,
            users,
            user_pk_index,
            orders,
            owner_index,
        }
    }

    #[test]
    fn test_primary_key_creates_virtual_index() {
        let f = fixture();
        let index = f.db.index(f.user_pk_index).unwrap();
        assert!(index.is_virtual());
        assert!(index.is_unique());
        assert_eq!(index.name(), "pk_users");
        assert!(f.db.table(f.users).unwrap().primary_key().is_some());
    }

    #[test]
    fn test_primary_key_requires_not_null() {
        let mut f = fixture();
        let note = f
            .db
            .create_column(f.orders, ColumnDefinition::new("note", DataType::Text))
            .unwrap();
        assert!(f.db.create_primary_key(f.orders, "pk_orders", &[note]).is_err());
        assert!(f.db.table(f.orders).unwrap().primary_key().is_none());
    }

    #[test]
    fn test_removing_primary_key_keeps_index() {
        let mut f = fixture();
        let pk = f.db.table(f.users).unwrap().primary_key().unwrap();
        f.db.remove(pk).unwrap();
        let index = f.db.index(f.user_pk_index).unwrap();
        assert!(!index.base().is_removed());
        assert!(!index.is_virtual());
        assert!(f.db.table(f.users).unwrap().primary_key().is_none());
    }

    #[test]
    fn test_foreign_key_requires_unique_target() {
        let mut f = fixture();
        let err = f
            .db
            .create_foreign_key(
                ForeignKeyDefinition::new("fk_self", f.owner_index).references(f.owner_index),
            )
            .unwrap_err();
        assert!(err.is_referential());
        assert!(f.db.foreign_keys(f.orders).unwrap().is_empty());
    }

    #[test]
    fn test_foreign_key_pins_referenced_index() {
        let mut f = fixture();
        let fk = f
            .db
            .create_foreign_key_to_table(
                ForeignKeyDefinition::new("fk_orders_user", f.owner_index)
                    .on_delete(ForeignKeyAction::Cascade),
                f.users,
            )
            .unwrap();
        assert_eq!(f.db.foreign_key(fk).unwrap().referenced(), f.user_pk_index);

        // The key outlives the primary key constraint itself.
        let pk = f.db.table(f.users).unwrap().primary_key().unwrap();
        f.db.remove(pk).unwrap();

        let err = f.db.set_unique(f.user_pk_index, false).unwrap_err();
        assert!(matches!(err, SchemaError::ReferentialViolation { .. }));
        assert!(f.db.index(f.user_pk_index).unwrap().is_unique());

        let err = f.db.remove(f.user_pk_index).unwrap_err();
        assert!(err.is_referential());
        assert!(!f.db.is_removed(f.user_pk_index).unwrap());

        let users_id = f.db.get::<ColumnId>(f.users, "id").unwrap();
        assert!(f
            .db
            .set_filter(f.user_pk_index, Some(col(users_id).gt(lit(0))))
            .is_err());
    }

    #[test]
    fn test_foreign_key_to_table_without_primary_key() {
        let mut f = fixture();
        let err = f
            .db
            .create_foreign_key_to_table(
                ForeignKeyDefinition::new("fk_loop", f.owner_index),
                f.orders,
            )
            .unwrap_err();
        assert!(err.to_string().contains("primary key missing"));
    }

    #[test]
    fn test_check_scope_and_back_references() {
        let mut f = fixture();
        let owner = f.db.get::<ColumnId>(f.orders, "user_id").unwrap();
        let users_id = f.db.get::<ColumnId>(f.users, "id").unwrap();

        assert!(matches!(
            f.db.create_check(f.orders, "ck_bad", col(users_id).gt(lit(0))),
            Err(SchemaError::InvalidExpressionScope(_))
        ));

        let ck = f
            .db
            .create_check(f.orders, "ck_owner", col(owner).gt(lit(0)))
            .unwrap();
        assert!(f.db.column(owner).unwrap().checks().contains(ck.id()));
        f.db.remove(ck).unwrap();
        assert!(f.db.column(owner).unwrap().checks().is_empty());
        assert!(!f.db.contains::<CheckId>(f.orders, "ck_owner"));
    }
}
