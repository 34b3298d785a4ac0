use tracing::warn;

use super::{
    Builder, NamedCollection, ObjectBuilder, ObjectId, ObjectKind, SchemaId, TableId, TypedId,
    ViewId,
};
use crate::database::Database;
use crate::error::{Result, SchemaError};

/// A schema: the namespace of tables, views and indexes.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    pub(crate) base: ObjectBuilder,
    pub(crate) objects: NamedCollection,
}

impl SchemaBuilder {
    pub(crate) fn new(base: ObjectBuilder) -> Self {
        Self {
            base,
            objects: NamedCollection::new(),
        }
    }

    /// Schema handle.
    #[must_use]
    pub fn id(&self) -> SchemaId {
        SchemaId::from_object_id(self.base.id())
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

    /// Tables, views and indexes in creation order.
    #[must_use]
    pub fn objects(&self) -> &NamedCollection {
        &self.objects
    }
}

impl Database {
    /// Creates a schema.
    pub fn create_schema(&mut self, name: &str) -> Result<SchemaId> {
        self.ensure_name_free(None, ObjectKind::Schema, name)?;
        let id = self.allocate_id();
        self.register_name(None, ObjectKind::Schema, name, id)?;
        self.insert_builder(Builder::Schema(SchemaBuilder::new(ObjectBuilder::new(
            id,
            name,
            ObjectKind::Schema,
            None,
        ))));
        self.record_created(id)?;
        Ok(SchemaId::from_object_id(id))
    }

    /// Tables of `schema` in creation order.
    pub fn tables(&self, schema: SchemaId) -> Result<Vec<TableId>> {
        Ok(self.members_of_kind(schema, ObjectKind::Table)?
            .into_iter()
            .map(TableId::from_object_id)
            .collect())
    }

    /// Views of `schema` in creation order.
    pub fn views(&self, schema: SchemaId) -> Result<Vec<ViewId>> {
        Ok(self.members_of_kind(schema, ObjectKind::View)?
            .into_iter()
            .map(ViewId::from_object_id)
            .collect())
    }

    fn members_of_kind(&self, schema: SchemaId, kind: ObjectKind) -> Result<Vec<ObjectId>> {
        let schema = self.schema(schema)?;
        Ok(schema
            .objects
            .ids()
            .filter(|id| self.builder(*id).is_ok_and(|b| b.kind() == kind))
            .collect())
    }

    /// A schema rename re-qualifies every object the schema owns. Earlier
    /// pending changes were planned against the old qualification, so
    /// they are flushed first.
    pub(crate) fn prepare_schema_rename(&mut self, schema: SchemaId) -> Result<()> {
        if self.schema(schema)?.objects.is_empty() || !self.has_pending_changes() {
            return Ok(());
        }
        if self.tracker.is_created(schema.id()) {
            return Ok(());
        }
        warn!(
            schema = %self.display_name(schema),
            "Schema rename with pending changes, flushing first"
        );
        self.flush()
    }

    /// Removes a schema and everything it owns.
    ///
    /// Fails with one violation per reference held from outside the
    /// schema. The default schema cannot be removed.
    pub(crate) fn remove_schema(&mut self, schema: SchemaId) -> Result<()> {
        if schema == self.default_schema() {
            return Err(SchemaError::InvalidOperation(format!(
                "the default schema '{}' cannot be removed",
                self.name(schema)?
            )));
        }
        SchemaError::collect(self.schema_removal_violations(schema)?)?;

        let mut staged = self.scratch.rent();
        let result = self.detach_schema_members(schema, &mut staged);
        self.scratch.release(staged);
        result?;

        self.mark_removed(schema.id())
    }

    fn schema_removal_violations(&self, schema: SchemaId) -> Result<Vec<SchemaError>> {
        let mut errors = Vec::new();
        let outside = |id: ObjectId| self.schema_of(id).map_or(true, |s| s != schema);

        for table in self.tables(schema)? {
            let builder = self.table(table)?;
            for view in builder.referencing_views.ids().filter(|v| outside(*v)) {
                errors.push(SchemaError::referential(
                    self.display_name(table),
                    format!("still referenced by view '{}'", self.display_name(view)),
                ));
            }
            for column in builder.columns.ids() {
                let column = self.column(super::ColumnId::from_object_id(column))?;
                for view in column.views.ids().filter(|v| outside(*v)) {
                    errors.push(SchemaError::referential(
                        self.display_name(column.base.id()),
                        format!("still referenced by view '{}'", self.display_name(view)),
                    ));
                }
            }
            for index in &builder.indexes {
                let index = self.index(*index)?;
                for fk in index.referencing_keys.ids().filter(|k| outside(*k)) {
                    errors.push(SchemaError::referential(
                        self.display_name(index.base.id()),
                        format!("still referenced by foreign key '{}'", self.display_name(fk)),
                    ));
                }
            }
        }
        for view in self.views(schema)? {
            let builder = self.view(view)?;
            for dependent in builder.referencing_views.ids().filter(|v| outside(*v)) {
                errors.push(SchemaError::referential(
                    self.display_name(view),
                    format!("still referenced by view '{}'", self.display_name(dependent)),
                ));
            }
        }
        Ok(errors)
    }

    fn detach_schema_members(&mut self, schema: SchemaId, staged: &mut Vec<ObjectId>) -> Result<()> {
        // Dependents go first so the removal order can be replayed as
        // DROP VIEW statements.
        staged.extend(self.views(schema)?.into_iter().map(ViewId::id));
        while !staged.is_empty() {
            let mut next = None;
            for (position, id) in staged.iter().enumerate() {
                if self.view(ViewId::from_object_id(*id))?.referencing_views.is_empty() {
                    next = Some(position);
                    break;
                }
            }
            let Some(position) = next else {
                return Err(SchemaError::InvalidOperation(format!(
                    "views of schema '{}' depend on each other in a cycle",
                    self.display_name(schema)
                )));
            };
            let view = staged.remove(position);
            self.detach_view(ViewId::from_object_id(view))?;
        }

        let tables = self.tables(schema)?;
        // Foreign keys may cross between tables of the schema in any
        // direction, so all of them go before any table.
        for table in &tables {
            staged.extend(self.foreign_keys(*table)?.into_iter().map(|fk| fk.id()));
        }
        for fk in staged.drain(..) {
            self.detach_foreign_key(super::ForeignKeyId::from_object_id(fk))?;
        }
        for table in tables {
            self.detach_table(table)?;
        }
        Ok(())
    }
}
