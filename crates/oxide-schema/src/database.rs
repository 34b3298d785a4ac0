//! The database aggregate root.
//!
//! [`Database`] owns every builder in an id-keyed arena, allocates ids,
//! holds the schema collection and the change tracker, and compiles
//! tracked changes into DDL through its dialect interpreter.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info};

use crate::builder::{
    validate_name, Builder, CheckBuilder, CheckId, ColumnBuilder, ColumnId, ForeignKeyBuilder,
    ForeignKeyId, IndexBuilder, IndexId, NamedCollection, ObjectBuilder, ObjectId, ObjectKind,
    PrimaryKeyBuilder, PrimaryKeyId, SchemaBuilder, SchemaId, TableBuilder, TableId, TypedId,
    ViewBuilder, ViewId,
};
use crate::dialect::{PostgresInterpreter, QualifiedName, SqlInterpreter, SqliteInterpreter};
use crate::error::{Result, SchemaError};
use crate::expr::Expr;
use crate::options::DatabaseOptions;
use crate::scratch::ScratchPool;
use crate::tracking::{ChangeTracker, Descriptor, PlanCompiler, TrackedValue};
use crate::types::{DefaultTypeProvider, TypeProvider};

/// In-memory model of a database schema and its pending changes.
pub struct Database {
    options: DatabaseOptions,
    dialect: Box<dyn SqlInterpreter>,
    types: Box<dyn TypeProvider>,
    next_id: u64,
    objects: HashMap<ObjectId, Builder>,
    schemas: NamedCollection,
    default_schema: SchemaId,
    pub(crate) tracker: ChangeTracker,
    pending_actions: Vec<String>,
    pub(crate) scratch: ScratchPool,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("dialect", &self.dialect.name())
            .field("objects", &self.objects.len())
            .field("pending_actions", &self.pending_actions.len())
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Creates a database builder rendering SQL through `dialect`.
    #[must_use]
    pub fn new(dialect: impl SqlInterpreter + 'static) -> Self {
        Self::with_options(dialect, DatabaseOptions::default())
    }

    /// Creates a database builder with explicit options.
    #[must_use]
    pub fn with_options(dialect: impl SqlInterpreter + 'static, options: DatabaseOptions) -> Self {
        let default_name = options
            .default_schema
            .clone()
            .unwrap_or_else(|| dialect.default_schema_name().to_string());
        let scratch = ScratchPool::new(options.scratch_pool_size);
        let mut db = Self {
            options,
            dialect: Box::new(dialect),
            types: Box::new(DefaultTypeProvider),
            next_id: 0,
            objects: HashMap::new(),
            schemas: NamedCollection::new(),
            default_schema: SchemaId::from_object_id(ObjectId::new(0)),
            tracker: ChangeTracker::new(),
            pending_actions: Vec::new(),
            scratch,
        };
        let id = db.allocate_id();
        db.objects.insert(
            id,
            Builder::Schema(SchemaBuilder::new(ObjectBuilder::new(
                id,
                default_name.as_str(),
                ObjectKind::Schema,
                None,
            ))),
        );
        // The collection is empty, so the insert cannot conflict.
        let _ = db.schemas.insert(&default_name, id);
        db.default_schema = SchemaId::from_object_id(id);
        db
    }

    /// Creates a SQLite database builder.
    #[must_use]
    pub fn sqlite() -> Self {
        Self::new(SqliteInterpreter::new())
    }

    /// Creates a PostgreSQL database builder.
    #[must_use]
    pub fn postgres() -> Self {
        Self::new(PostgresInterpreter::new())
    }

    /// Replaces the runtime-type mapping provider.
    #[must_use]
    pub fn with_type_provider(mut self, provider: impl TypeProvider + 'static) -> Self {
        self.types = Box::new(provider);
        self
    }

    /// Builder options.
    #[must_use]
    pub fn options(&self) -> &DatabaseOptions {
        &self.options
    }

    /// The dialect interpreter.
    #[must_use]
    pub fn dialect(&self) -> &dyn SqlInterpreter {
        self.dialect.as_ref()
    }

    /// The runtime-type mapping provider.
    #[must_use]
    pub fn type_provider(&self) -> &dyn TypeProvider {
        self.types.as_ref()
    }

    /// The schema that cannot be removed.
    #[must_use]
    pub fn default_schema(&self) -> SchemaId {
        self.default_schema
    }

    pub(crate) fn allocate_id(&mut self) -> ObjectId {
        self.next_id += 1;
        ObjectId::new(self.next_id)
    }

    pub(crate) fn insert_builder(&mut self, builder: Builder) {
        self.objects.insert(builder.base().id(), builder);
    }

    // ================================================================
    // Arena access
    // ================================================================

    /// Returns the builder behind `id`, whatever its kind.
    pub fn builder(&self, id: impl Into<ObjectId>) -> Result<&Builder> {
        let id = id.into();
        self.objects.get(&id).ok_or(SchemaError::UnknownObject(id))
    }

    pub(crate) fn builder_mut(&mut self, id: impl Into<ObjectId>) -> Result<&mut Builder> {
        let id = id.into();
        self.objects
            .get_mut(&id)
            .ok_or(SchemaError::UnknownObject(id))
    }

    /// Returns the identity header of `id`.
    pub fn base(&self, id: impl Into<ObjectId>) -> Result<&ObjectBuilder> {
        Ok(self.builder(id)?.base())
    }

    /// Returns the current name of `id`.
    pub fn name(&self, id: impl Into<ObjectId>) -> Result<&str> {
        Ok(self.builder(id)?.base().name())
    }

    /// Returns whether `id` has been removed.
    pub fn is_removed(&self, id: impl Into<ObjectId>) -> Result<bool> {
        Ok(self.builder(id)?.base().is_removed())
    }

    /// Fails with [`SchemaError::AlreadyRemoved`] if `id` is removed.
    pub fn ensure_live(&self, id: impl Into<ObjectId>) -> Result<()> {
        self.base(id)?.ensure_live()
    }

    /// All schemas that have not been removed, in creation order.
    #[must_use]
    pub fn schemas(&self) -> Vec<SchemaId> {
        self.schemas.ids().map(SchemaId::from_object_id).collect()
    }

    /// Looks up a schema by name, ignoring case.
    pub fn schema_by_name(&self, name: &str) -> Result<SchemaId> {
        self.schemas
            .get(name)
            .map(SchemaId::from_object_id)
            .ok_or_else(|| SchemaError::NotFound {
                kind: ObjectKind::Schema,
                name: name.to_string(),
                container: String::from("database"),
            })
    }

    // ================================================================
    // Names
    // ================================================================

    /// Schema-qualified, dot-separated name of `id`.
    pub fn full_name(&self, id: impl Into<ObjectId>) -> Result<String> {
        let base = self.base(id)?;
        match base.kind() {
            ObjectKind::Schema => Ok(base.name().to_string()),
            ObjectKind::Index => {
                let table = self.parent_of(base)?;
                let schema = self.parent_of(self.base(table)?)?;
                Ok(format!("{}.{}", self.name(schema)?, base.name()))
            }
            _ => {
                let parent = self.parent_of(base)?;
                Ok(format!("{}.{}", self.full_name(parent)?, base.name()))
            }
        }
    }

    pub(crate) fn display_name(&self, id: impl Into<ObjectId>) -> String {
        let id = id.into();
        self.full_name(id).unwrap_or_else(|_| id.to_string())
    }

    fn parent_of(&self, base: &ObjectBuilder) -> Result<ObjectId> {
        base.parent().ok_or_else(|| {
            SchemaError::InvalidOperation(format!("{} '{}' has no owner", base.kind(), base.name()))
        })
    }

    /// The schema containing `id`.
    pub fn schema_of(&self, id: impl Into<ObjectId>) -> Result<SchemaId> {
        let base = self.base(id)?;
        match base.kind() {
            ObjectKind::Schema => Ok(SchemaId::from_object_id(base.id())),
            ObjectKind::Table | ObjectKind::View => {
                Ok(SchemaId::from_object_id(self.parent_of(base)?))
            }
            _ => self.schema_of(self.parent_of(base)?),
        }
    }

    /// The table owning a column, index or constraint, or the table
    /// itself.
    pub fn table_of(&self, id: impl Into<ObjectId>) -> Result<TableId> {
        let base = self.base(id)?;
        match base.kind() {
            ObjectKind::Table => Ok(TableId::from_object_id(base.id())),
            ObjectKind::Column
            | ObjectKind::Index
            | ObjectKind::PrimaryKey
            | ObjectKind::ForeignKey
            | ObjectKind::Check => Ok(TableId::from_object_id(self.parent_of(base)?)),
            kind => Err(SchemaError::InvalidOperation(format!(
                "a {kind} does not belong to a table"
            ))),
        }
    }

    /// Name of `id` qualified by its schema for rendering; the default
    /// schema is left implicit.
    pub(crate) fn qualified_name(&self, id: impl Into<ObjectId>) -> Result<QualifiedName> {
        let id = id.into();
        let schema = self.schema_of(id)?;
        Ok(self.qualify(schema, self.name(id)?))
    }

    pub(crate) fn qualify(&self, schema: SchemaId, name: &str) -> QualifiedName {
        self.qualify_in(schema, self.name(schema).unwrap_or_default(), name)
    }

    pub(crate) fn qualify_in(&self, schema: SchemaId, schema_name: &str, name: &str) -> QualifiedName {
        if schema == self.default_schema {
            QualifiedName::new(name)
        } else {
            QualifiedName::in_schema(schema_name, name)
        }
    }

    // ================================================================
    // Typed retrieval
    // ================================================================

    fn namespace(&self, owner: Option<ObjectId>, kind: ObjectKind) -> Result<&NamedCollection> {
        let Some(owner) = owner else {
            return match kind {
                ObjectKind::Schema => Ok(&self.schemas),
                _ => Err(SchemaError::InvalidOperation(format!(
                    "a {kind} must be looked up inside a schema or table"
                ))),
            };
        };
        match (self.builder(owner)?, kind) {
            (Builder::Schema(s), ObjectKind::Table | ObjectKind::View | ObjectKind::Index) => {
                Ok(&s.objects)
            }
            (Builder::Table(t), ObjectKind::Column) => Ok(&t.columns),
            (
                Builder::Table(t),
                ObjectKind::PrimaryKey | ObjectKind::ForeignKey | ObjectKind::Check,
            ) => Ok(&t.constraints),
            (other, kind) => Err(SchemaError::InvalidOperation(format!(
                "a {} does not hold {kind} objects",
                other.kind()
            ))),
        }
    }

    fn namespace_mut(
        &mut self,
        owner: Option<ObjectId>,
        kind: ObjectKind,
    ) -> Result<&mut NamedCollection> {
        let Some(owner) = owner else {
            return Ok(&mut self.schemas);
        };
        match (self.builder_mut(owner)?, kind) {
            (Builder::Schema(s), _) => Ok(&mut s.objects),
            (Builder::Table(t), ObjectKind::Column) => Ok(&mut t.columns),
            (Builder::Table(t), _) => Ok(&mut t.constraints),
            (other, kind) => Err(SchemaError::InvalidOperation(format!(
                "a {} does not hold {kind} objects",
                other.kind()
            ))),
        }
    }

    /// The object owning the namespace `id` is named in; `None` for
    /// schemas, which live in the database namespace.
    pub(crate) fn namespace_owner(&self, id: impl Into<ObjectId>) -> Result<Option<ObjectId>> {
        let base = self.base(id)?;
        Ok(match base.kind() {
            ObjectKind::Schema => None,
            ObjectKind::Index => Some(self.schema_of(base.id())?.id()),
            _ => Some(self.parent_of(base)?),
        })
    }

    fn owner_display(&self, owner: Option<ObjectId>) -> String {
        owner.map_or_else(|| String::from("database"), |o| self.display_name(o))
    }

    /// Registers a freshly created object under its name.
    pub(crate) fn register_name(
        &mut self,
        owner: Option<ObjectId>,
        kind: ObjectKind,
        name: &str,
        id: ObjectId,
    ) -> Result<()> {
        validate_name(kind, name)?;
        let container = self.owner_display(owner);
        self.namespace_mut(owner, kind)?
            .insert(name, id)
            .map_err(|_| SchemaError::NameConflict {
                kind,
                name: name.to_string(),
                container,
            })
    }

    /// Fails with [`SchemaError::NameConflict`] if `name` is taken in
    /// the namespace of `owner`.
    pub(crate) fn ensure_name_free(
        &self,
        owner: Option<ObjectId>,
        kind: ObjectKind,
        name: &str,
    ) -> Result<()> {
        validate_name(kind, name)?;
        if self.namespace(owner, kind)?.contains(name) {
            return Err(SchemaError::NameConflict {
                kind,
                name: name.to_string(),
                container: self.owner_display(owner),
            });
        }
        Ok(())
    }

    pub(crate) fn unregister_name(&mut self, id: ObjectId) -> Result<()> {
        let owner = self.namespace_owner(id)?;
        let base = self.base(id)?;
        let (kind, name) = (base.kind(), base.name().to_string());
        self.namespace_mut(owner, kind)?.remove(&name);
        Ok(())
    }

    /// Resolves `name` inside `container` to an object of kind `T`.
    ///
    /// Schemas hold tables, views and indexes; tables hold columns and
    /// constraints. Fails with [`SchemaError::TypeMismatch`] if the name
    /// belongs to another kind and [`SchemaError::NotFound`] if it is
    /// free.
    pub fn get<T: TypedId>(&self, container: impl Into<ObjectId>, name: &str) -> Result<T> {
        let container = container.into();
        self.try_get(container, name)?
            .ok_or_else(|| SchemaError::NotFound {
                kind: T::KIND,
                name: name.to_string(),
                container: self.display_name(container),
            })
    }

    /// Like [`Database::get`], but returns `None` if the name is free.
    pub fn try_get<T: TypedId>(
        &self,
        container: impl Into<ObjectId>,
        name: &str,
    ) -> Result<Option<T>> {
        let Some(id) = self.namespace(Some(container.into()), T::KIND)?.get(name) else {
            return Ok(None);
        };
        let builder = self.builder(id)?;
        if builder.kind() != T::KIND {
            return Err(SchemaError::TypeMismatch {
                name: name.to_string(),
                expected: T::KIND,
                actual: builder.kind(),
            });
        }
        Ok(Some(T::from_object_id(id)))
    }

    /// Returns true if `name` is taken in the namespace of `container`
    /// that holds objects of kind `T`.
    #[must_use]
    pub fn contains<T: TypedId>(&self, container: impl Into<ObjectId>, name: &str) -> bool {
        self.namespace(Some(container.into()), T::KIND)
            .is_ok_and(|ns| ns.contains(name))
    }

    // ================================================================
    // Rename and remove
    // ================================================================

    /// Renames any object.
    ///
    /// The owning namespace is re-keyed and the tracker keeps the name
    /// observed before the current batch. Renaming a schema that owns
    /// objects flushes earlier pending changes first.
    pub fn rename(&mut self, id: impl Into<ObjectId>, new_name: &str) -> Result<()> {
        let id = id.into();
        let base = self.base(id)?;
        base.ensure_live()?;
        let kind = base.kind();
        let old_name = base.name().to_string();
        validate_name(kind, new_name)?;
        if old_name == new_name {
            return Ok(());
        }

        let owner = self.namespace_owner(id)?;
        let container = self.owner_display(owner);
        if self.namespace(owner, kind)?.get(new_name).is_some_and(|o| o != id) {
            return Err(SchemaError::NameConflict {
                kind,
                name: new_name.to_string(),
                container,
            });
        }
        if kind == ObjectKind::Schema {
            self.prepare_schema_rename(SchemaId::from_object_id(id))?;
        }

        self.namespace_mut(owner, kind)?
            .rekey(&old_name, new_name)
            .map_err(|_| SchemaError::NameConflict {
                kind,
                name: new_name.to_string(),
                container,
            })?;
        self.builder_mut(id)?.base_mut().set_name(new_name);
        self.record_change(
            id,
            Descriptor::Name,
            TrackedValue::Name(old_name),
            TrackedValue::Name(new_name.to_string()),
        )
    }

    /// Removes any object, cascading to the objects it owns.
    ///
    /// Removing an already removed object is a no-op. Blocking
    /// references are reported together and leave the graph untouched.
    pub fn remove(&mut self, id: impl Into<ObjectId>) -> Result<()> {
        let id = id.into();
        let builder = self.builder(id)?;
        if builder.base().is_removed() {
            return Ok(());
        }
        match builder.kind() {
            ObjectKind::Schema => self.remove_schema(SchemaId::from_object_id(id)),
            ObjectKind::Table => self.remove_table(TableId::from_object_id(id)),
            ObjectKind::View => self.remove_view(ViewId::from_object_id(id)),
            ObjectKind::Column => self.remove_column(ColumnId::from_object_id(id)),
            ObjectKind::Index => self.remove_index(IndexId::from_object_id(id)),
            ObjectKind::PrimaryKey => self.remove_primary_key(PrimaryKeyId::from_object_id(id)),
            ObjectKind::ForeignKey => self.remove_foreign_key(ForeignKeyId::from_object_id(id)),
            ObjectKind::Check => self.remove_check(CheckId::from_object_id(id)),
        }
    }

    pub(crate) fn mark_removed(&mut self, id: ObjectId) -> Result<()> {
        self.unregister_name(id)?;
        self.builder_mut(id)?.base_mut().mark_removed();
        self.record_removed(id)
    }

    // ================================================================
    // Expression scope
    // ================================================================

    /// Checks that `expr` only reads live columns of `table`, returning
    /// the columns it reads.
    pub(crate) fn validate_table_scope(
        &self,
        table: TableId,
        expr: &Expr,
        what: &str,
    ) -> Result<Vec<ColumnId>> {
        let columns = expr.referenced_columns();
        let mut errors = Vec::new();
        for column in &columns {
            match self.column(*column) {
                Ok(c) if c.base.is_removed() => {
                    errors.push(format!("{what} reads removed column '{}'", c.base.name()));
                }
                Ok(c) if c.table() != table => errors.push(format!(
                    "{what} reads column '{}' outside table '{}'",
                    self.display_name(*column),
                    self.display_name(table)
                )),
                Ok(_) => {}
                Err(_) => errors.push(format!("{what} reads unknown column {column}")),
            }
        }
        if errors.is_empty() {
            Ok(columns)
        } else {
            Err(SchemaError::InvalidExpressionScope(errors))
        }
    }

    /// Checks that `expr` reads no columns at all.
    pub(crate) fn validate_constant_scope(&self, expr: &Expr, what: &str) -> Result<()> {
        let errors: Vec<String> = expr
            .referenced_columns()
            .into_iter()
            .map(|c| format!("{what} may not read column '{}'", self.display_name(c)))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::InvalidExpressionScope(errors))
        }
    }

    // ================================================================
    // Change tracking
    // ================================================================

    /// The change tracker.
    #[must_use]
    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    /// Value of `descriptor` on `id` before the current batch, if it
    /// changed.
    #[must_use]
    pub fn original_value(
        &self,
        id: impl Into<ObjectId>,
        descriptor: Descriptor,
    ) -> Option<&TrackedValue> {
        self.tracker.original_value(id.into(), descriptor)
    }

    /// Returns true if there are changes that have not been flushed.
    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        self.tracker.has_pending_changes()
    }

    /// Treats the current graph as the live database state, dropping
    /// every tracked change without emitting SQL.
    pub fn accept_changes(&mut self) {
        self.tracker.reset();
    }

    fn container_of(&self, id: ObjectId) -> Result<ObjectId> {
        let base = self.base(id)?;
        Ok(match base.kind() {
            ObjectKind::Schema | ObjectKind::Table | ObjectKind::View => id,
            _ => self.parent_of(base)?,
        })
    }

    pub(crate) fn record_change(
        &mut self,
        id: ObjectId,
        descriptor: Descriptor,
        before: TrackedValue,
        after: TrackedValue,
    ) -> Result<()> {
        let container = self.container_of(id)?;
        self.tracker
            .record_change(id, container, descriptor, before, after);
        Ok(())
    }

    pub(crate) fn record_created(&mut self, id: ObjectId) -> Result<()> {
        let container = self.container_of(id)?;
        self.tracker.record_created(id, container);
        Ok(())
    }

    pub(crate) fn record_removed(&mut self, id: ObjectId) -> Result<()> {
        let container = self.container_of(id)?;
        self.tracker.record_removed(id, container);
        Ok(())
    }

    // ================================================================
    // Flush
    // ================================================================

    /// Compiles every pending change into SQL and appends the statements
    /// to the action log.
    pub fn flush(&mut self) -> Result<()> {
        if !self.tracker.has_pending_changes() {
            return Ok(());
        }
        self.validate_before_generation()?;

        let statements = PlanCompiler::new(self).compile()?;
        let terminator = self.dialect.terminator();
        let mut actions = Vec::new();
        for statement in &statements {
            for sql in self.dialect.interpret(statement) {
                let sql = format!("{sql}{terminator}");
                debug!(sql = %sql, "Emitting DDL action");
                actions.push(sql);
            }
        }

        info!(actions = actions.len(), "Flushed pending schema changes");
        self.pending_actions.extend(actions);
        self.tracker.reset();
        Ok(())
    }

    /// Committed SQL statements in execution order.
    #[must_use]
    pub fn pending_actions(&self) -> &[String] {
        &self.pending_actions
    }

    /// Drains the action log.
    pub fn take_pending_actions(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending_actions)
    }

    fn validate_before_generation(&self) -> Result<()> {
        let mut errors = Vec::new();
        for schema in self.schemas.ids() {
            let Ok(Builder::Schema(s)) = self.builder(schema) else {
                continue;
            };
            for id in s.objects.ids() {
                let Ok(Builder::Table(table)) = self.builder(id) else {
                    continue;
                };
                if self.options.require_primary_key && table.primary_key().is_none() {
                    errors.push(SchemaError::referential(
                        self.display_name(id),
                        "primary key missing",
                    ));
                }
                if table.columns.is_empty() {
                    errors.push(SchemaError::InvalidOperation(format!(
                        "table '{}' has no columns",
                        self.display_name(id)
                    )));
                }
            }
        }
        SchemaError::collect(errors)
    }
}

macro_rules! typed_getters {
    ($($get:ident: $id:ty => $variant:ident($builder:ty);)+) => {
        impl Database {
            $(
                #[doc = concat!("Returns the builder behind a `", stringify!($id), "`.")]
                pub fn $get(&self, id: $id) -> Result<&$builder> {
                    match self.objects.get(&id.id()) {
                        Some(Builder::$variant(b)) => Ok(b),
                        Some(other) => Err(SchemaError::TypeMismatch {
                            name: other.base().name().to_string(),
                            expected: <$id as TypedId>::KIND,
                            actual: other.kind(),
                        }),
                        None => Err(SchemaError::UnknownObject(id.id())),
                    }
                }
            )+
        }
    };
}

macro_rules! typed_getters_mut {
    ($($get_mut:ident: $id:ty => $variant:ident($builder:ty);)+) => {
        impl Database {
            $(
                pub(crate) fn $get_mut(&mut self, id: $id) -> Result<&mut $builder> {
                    match self.objects.get_mut(&id.id()) {
                        Some(Builder::$variant(b)) => Ok(b),
                        Some(other) => Err(SchemaError::TypeMismatch {
                            name: other.base().name().to_string(),
                            expected: <$id as TypedId>::KIND,
                            actual: other.kind(),
                        }),
                        None => Err(SchemaError::UnknownObject(id.id())),
                    }
                }
            )+
        }
    };
}

typed_getters! {
    schema: SchemaId => Schema(SchemaBuilder);
    table: TableId => Table(TableBuilder);
    view: ViewId => View(ViewBuilder);
    column: ColumnId => Column(ColumnBuilder);
    index: IndexId => Index(IndexBuilder);
    primary_key: PrimaryKeyId => PrimaryKey(PrimaryKeyBuilder);
    foreign_key: ForeignKeyId => ForeignKey(ForeignKeyBuilder);
    check: CheckId => Check(CheckBuilder);
}

// Schemas and primary keys change only through the objects they own.
typed_getters_mut! {
    table_mut: TableId => Table(TableBuilder);
    view_mut: ViewId => View(ViewBuilder);
    column_mut: ColumnId => Column(ColumnBuilder);
    index_mut: IndexId => Index(IndexBuilder);
    foreign_key_mut: ForeignKeyId => ForeignKey(ForeignKeyBuilder);
    check_mut: CheckId => Check(CheckBuilder);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ColumnDefinition;
    use crate::types::DataType;

    #[test]
    fn test_default_schema_exists() {
        let db = Database::sqlite();
        let main = db.schema_by_name("MAIN").unwrap();
        assert_eq!(main, db.default_schema());
        assert_eq!(db.full_name(main).unwrap(), "main");
    }

    #[test]
    fn test_default_schema_from_options() {
        let db = Database::with_options(
            SqliteInterpreter::new(),
            DatabaseOptions::new().with_default_schema("app"),
        );
        assert_eq!(db.name(db.default_schema()).unwrap(), "app");
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut db = Database::sqlite();
        let main = db.default_schema();
        let a = db.create_table(main, "a").unwrap();
        let b = db.create_table(main, "b").unwrap();
        assert!(b.id() > a.id());
        db.remove(a).unwrap();
        let c = db.create_table(main, "c").unwrap();
        assert!(c.id() > b.id());
    }

    #[test]
    fn test_get_type_mismatch() {
        let mut db = Database::sqlite();
        let main = db.default_schema();
        db.create_table(main, "users").unwrap();

        let err = db.get::<ViewId>(main, "users").unwrap_err();
        assert!(matches!(
            err,
            SchemaError::TypeMismatch {
                expected: ObjectKind::View,
                actual: ObjectKind::Table,
                ..
            }
        ));
        assert!(db.try_get::<TableId>(main, "missing").unwrap().is_none());
        assert!(matches!(
            db.get::<TableId>(main, "missing"),
            Err(SchemaError::NotFound { .. })
        ));
    }

    #[test]
    fn test_full_names() {
        let mut db = Database::sqlite();
        let sales = db.create_schema("sales").unwrap();
        let orders = db.create_table(sales, "orders").unwrap();
        let id = db
            .create_column(orders, ColumnDefinition::new("id", DataType::Bigint))
            .unwrap();
        assert_eq!(db.full_name(orders).unwrap(), "sales.orders");
        assert_eq!(db.full_name(id).unwrap(), "sales.orders.id");

        db.rename(orders, "purchases").unwrap();
        assert_eq!(db.full_name(id).unwrap(), "sales.purchases.id");
    }

    #[test]
    fn test_rename_conflict_leaves_name() {
        let mut db = Database::sqlite();
        let main = db.default_schema();
        let a = db.create_table(main, "a").unwrap();
        db.create_table(main, "b").unwrap();

        assert!(matches!(
            db.rename(a, "B"),
            Err(SchemaError::NameConflict { .. })
        ));
        assert_eq!(db.name(a).unwrap(), "a");
        assert!(db.contains::<TableId>(main, "a"));
    }

    #[test]
    fn test_case_only_rename() {
        let mut db = Database::sqlite();
        let main = db.default_schema();
        let a = db.create_table(main, "users").unwrap();
        db.rename(a, "Users").unwrap();
        assert_eq!(db.get::<TableId>(main, "USERS").unwrap(), a);
        assert_eq!(db.name(a).unwrap(), "Users");
    }

    #[test]
    fn test_require_primary_key() {
        let mut db = Database::with_options(
            SqliteInterpreter::new(),
            DatabaseOptions::new().with_required_primary_keys(),
        );
        let main = db.default_schema();
        let t = db.create_table(main, "t").unwrap();
        db.create_column(t, ColumnDefinition::new("a", DataType::Integer))
            .unwrap();
        let u = db.create_table(main, "u").unwrap();
        db.create_column(u, ColumnDefinition::new("a", DataType::Integer))
            .unwrap();

        let err = db.flush().unwrap_err();
        assert_eq!(err.violation_count(), 2);
        assert!(err.to_string().contains("primary key missing"));
        assert!(db.pending_actions().is_empty());
    }

    #[test]
    fn test_flush_without_changes_is_noop() {
        let mut db = Database::sqlite();
        db.flush().unwrap();
        assert!(db.pending_actions().is_empty());
    }
}
