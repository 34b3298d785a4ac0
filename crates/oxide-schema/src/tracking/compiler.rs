//! Compiles a batch of tracked changes into an ordered statement plan.
//!
//! Statements are emitted in dependency order:
//!
//! 1. views that are removed or must be rebuilt are dropped, dependents
//!    first, under their pre-batch names, followed by every removed or
//!    redefined foreign key of a surviving table;
//! 2. removed tables are dropped, referencing tables first;
//! 3. schemas are created and renamed;
//! 4. renamed tables take their new names;
//! 5. created tables are created, referenced tables first, with their
//!    indexes;
//! 6. every other changed table is altered in place or reconstructed;
//! 7. created and rebuilt views are created, referenced views first;
//! 8. removed schemas are dropped.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::builder::{
    CheckId, ColumnId, ForeignKeyId, IndexId, ObjectId, ObjectKind, SchemaId, SelectItem,
    TableId, TypedId, ViewId,
};
use crate::database::Database;
use crate::dialect::{
    AlterCapabilities, CheckNode, ColumnChange, ColumnNode, ConstraintNode, ForeignKeyNode,
    IndexNode, PrimaryKeyNode, QualifiedName, QueryNode, ResolvedExpr, SelectNode, Statement,
    TableNode, ViewNode,
};
use crate::error::{Result, SchemaError};
use crate::expr::{Expr, ResolvedColumn};
use crate::tracking::{
    ChangeAggregator, ChangeTracker, ColumnDelta, ColumnState, Descriptor, PendingRename,
    RenameResolver, TableChanges,
};

/// Turns the pending batch of a [`Database`] into [`Statement`]s.
pub struct PlanCompiler<'a> {
    db: &'a Database,
    tracker: &'a ChangeTracker,
    capabilities: AlterCapabilities,
    statements: Vec<Statement>,
}

impl<'a> PlanCompiler<'a> {
    /// Creates a compiler for the pending batch of `db`.
    #[must_use]
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            tracker: db.tracker(),
            capabilities: db.dialect().capabilities(),
            statements: Vec::new(),
        }
    }

    /// Produces the statement plan.
    pub fn compile(mut self) -> Result<Vec<Statement>> {
        let plans = self.table_plans()?;
        let reconstructed: HashSet<TableId> = plans
            .iter()
            .filter(|p| p.requires_reconstruction(self.db, &self.capabilities))
            .map(|p| p.table)
            .collect();
        let rebuilt_views = self.views_to_rebuild(&plans, &reconstructed)?;

        self.drop_views(&rebuilt_views)?;
        self.drop_foreign_keys(&plans)?;
        self.drop_removed_tables()?;
        self.apply_schema_changes()?;
        self.rename_tables()?;
        self.create_tables()?;
        for plan in &plans {
            if reconstructed.contains(&plan.table) {
                self.reconstruct_table(plan)?;
            } else {
                self.alter_table(plan)?;
            }
        }
        self.create_views(&rebuilt_views)?;
        self.drop_removed_schemas()?;

        debug!(statements = self.statements.len(), "Compiled schema change plan");
        Ok(self.statements)
    }

    fn emit(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    // ================================================================
    // Names
    // ================================================================

    fn kind_of(&self, id: ObjectId) -> Result<ObjectKind> {
        Ok(self.db.builder(id)?.kind())
    }

    fn original_name(&self, id: impl Into<ObjectId>) -> Result<String> {
        let id = id.into();
        match self.tracker.original_name(id) {
            Some(name) => Ok(name.to_string()),
            None => Ok(self.db.name(id)?.to_string()),
        }
    }

    /// Name of `id` as it was before the batch, schema included.
    fn original_qualified(&self, id: impl Into<ObjectId>) -> Result<QualifiedName> {
        let id = id.into();
        let schema = self.db.schema_of(id)?;
        let schema_name = self.original_name(schema)?;
        Ok(self
            .db
            .qualify_in(schema, &schema_name, &self.original_name(id)?))
    }

    /// Pre-batch object name inside the current schema name.
    fn relocated(&self, schema: SchemaId, name: &str) -> QualifiedName {
        self.db.qualify(schema, name)
    }

    fn current(&self, id: impl Into<ObjectId>) -> Result<QualifiedName> {
        self.db.qualified_name(id)
    }

    fn of_kind(&self, ids: impl Iterator<Item = ObjectId>, kind: ObjectKind) -> Result<Vec<ObjectId>> {
        let mut selected = Vec::new();
        for id in ids {
            if self.kind_of(id)? == kind {
                selected.push(id);
            }
        }
        Ok(selected)
    }

    // ================================================================
    // Analysis
    // ================================================================

    /// Changes of every pre-existing live table touched in the batch.
    fn table_plans(&self) -> Result<Vec<TableChanges>> {
        let aggregator = ChangeAggregator::new(self.db);
        let mut plans = Vec::new();
        for id in self.of_kind(self.tracker.touched(), ObjectKind::Table)? {
            if self.tracker.is_created(id) || self.db.is_removed(id)? {
                continue;
            }
            plans.push(aggregator.aggregate(TableId::from_object_id(id))?);
        }
        Ok(plans)
    }

    /// Pre-existing views whose stored definition no longer matches the
    /// graph, closed over the views that read them.
    fn views_to_rebuild(
        &self,
        plans: &[TableChanges],
        reconstructed: &HashSet<TableId>,
    ) -> Result<Vec<ViewId>> {
        let mut stack = Vec::new();
        for schema in self.db.schemas() {
            for view in self.db.views(schema)? {
                if !self.tracker.is_created(view.id())
                    && self.view_is_stale(view, plans, reconstructed)?
                {
                    stack.push(view);
                }
            }
        }

        let mut selected = HashSet::new();
        let mut ordered = Vec::new();
        while let Some(view) = stack.pop() {
            if !selected.insert(view) {
                continue;
            }
            ordered.push(view);
            for dependent in self.db.referencing_views(view)? {
                if !self.tracker.is_created(dependent.id()) {
                    stack.push(dependent);
                }
            }
        }
        ordered.sort_unstable();
        Ok(ordered)
    }

    fn view_is_stale(
        &self,
        view: ViewId,
        plans: &[TableChanges],
        reconstructed: &HashSet<TableId>,
    ) -> Result<bool> {
        let builder = self.db.view(view)?;
        if self.tracker.has_changed(view.id(), Descriptor::Query)
            || self.tracker.has_changed(view.id(), Descriptor::Name)
            || self.schema_renamed(builder.schema())
        {
            return Ok(true);
        }

        let query = builder.query();
        for id in builder.referenced() {
            let stale = match self.kind_of(*id)? {
                ObjectKind::Table => {
                    let table = TableId::from_object_id(*id);
                    let wildcard = query.items().iter().any(|item| match item {
                        SelectItem::Wildcard => true,
                        SelectItem::SourceWildcard(source) => source == id,
                        SelectItem::Expr { .. } => false,
                    });
                    self.tracker.has_changed(*id, Descriptor::Name)
                        || reconstructed.contains(&table)
                        || self.schema_renamed(self.db.schema_of(table)?)
                        || (wildcard && column_set_changed(plans, table))
                }
                ObjectKind::View => {
                    self.tracker.has_changed(*id, Descriptor::Name)
                        || self.schema_renamed(self.db.schema_of(*id)?)
                }
                ObjectKind::Column => {
                    self.tracker.has_changed(*id, Descriptor::Name)
                        || self.tracker.has_changed(*id, Descriptor::DataType)
                }
                _ => false,
            };
            if stale {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn schema_renamed(&self, schema: SchemaId) -> bool {
        !self.tracker.is_created(schema.id()) && self.tracker.has_changed(schema.id(), Descriptor::Name)
    }

    // ================================================================
    // Drops
    // ================================================================

    fn drop_views(&mut self, rebuilt: &[ViewId]) -> Result<()> {
        // Removal order already puts dependents first.
        for view in self.of_kind(self.tracker.removed(), ObjectKind::View)? {
            let name = self.original_qualified(view)?;
            self.emit(Statement::DropView(name));
        }

        let ids: Vec<ObjectId> = rebuilt.iter().map(|v| v.id()).collect();
        let members: HashSet<ObjectId> = ids.iter().copied().collect();
        let mut ordered = dependencies_first(&ids, |id| self.referenced_views(id, &members))?;
        ordered.reverse();
        for view in ordered {
            let name = self.original_qualified(view)?;
            self.emit(Statement::DropView(name));
        }
        Ok(())
    }

    fn referenced_views(&self, view: ObjectId, members: &HashSet<ObjectId>) -> Result<Vec<ObjectId>> {
        let builder = self.db.view(ViewId::from_object_id(view))?;
        Ok(builder
            .referenced()
            .iter()
            .copied()
            .filter(|id| members.contains(id))
            .collect())
    }

    /// Foreign keys go before the tables, indexes and keys they point at.
    /// An engine without constraint DDL rebuilds the origin table instead.
    fn drop_foreign_keys(&mut self, plans: &[TableChanges]) -> Result<()> {
        if !self.capabilities.alter_constraints {
            return Ok(());
        }
        for plan in plans {
            let dropped: Vec<&str> = plan
                .constraints
                .iter()
                .filter(|c| c.kind == ObjectKind::ForeignKey && c.drop)
                .map(|c| c.original_name.as_str())
                .collect();
            if dropped.is_empty() {
                continue;
            }
            let table = self.original_qualified(plan.table)?;
            for name in dropped {
                self.emit(Statement::DropConstraint {
                    table: table.clone(),
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    fn drop_removed_tables(&mut self) -> Result<()> {
        let tables = self.of_kind(self.tracker.removed(), ObjectKind::Table)?;
        if tables.is_empty() {
            return Ok(());
        }
        let members: HashSet<ObjectId> = tables.iter().copied().collect();

        // Removed keys still remember both ends.
        let mut edges: Vec<(ObjectId, ObjectId)> = Vec::new();
        for fk in self.of_kind(self.tracker.removed(), ObjectKind::ForeignKey)? {
            let builder = self.db.foreign_key(ForeignKeyId::from_object_id(fk))?;
            let origin = self.db.table_of(fk)?.id();
            let target = self.db.table_of(builder.referenced())?.id();
            if origin != target && members.contains(&origin) && members.contains(&target) {
                edges.push((origin, target));
            }
        }

        let mut ordered = dependencies_first(&tables, |id| {
            Ok(edges
                .iter()
                .filter(|(origin, _)| *origin == id)
                .map(|(_, target)| *target)
                .collect())
        })?;
        ordered.reverse();
        for table in ordered {
            let name = self.original_qualified(table)?;
            self.emit(Statement::DropTable(name));
        }
        Ok(())
    }

    fn drop_removed_schemas(&mut self) -> Result<()> {
        for schema in self.of_kind(self.tracker.removed(), ObjectKind::Schema)? {
            let name = self.original_name(schema)?;
            self.emit(Statement::DropSchema(name));
        }
        if !self.capabilities.rename_schema {
            for schema in self.db.schemas() {
                if self.schema_renamed(schema) {
                    let name = self.original_name(schema)?;
                    self.emit(Statement::DropSchema(name));
                }
            }
        }
        Ok(())
    }

    // ================================================================
    // Schemas and table names
    // ================================================================

    fn apply_schema_changes(&mut self) -> Result<()> {
        for schema in self.of_kind(self.tracker.created(), ObjectKind::Schema)? {
            let name = self.db.name(schema)?.to_string();
            self.emit(Statement::CreateSchema(name));
        }

        for schema in self.db.schemas() {
            if !self.schema_renamed(schema) {
                continue;
            }
            let from = self.original_name(schema)?;
            if self.capabilities.rename_schema {
                let to = self.db.name(schema)?.to_string();
                self.emit(Statement::RenameSchema { from, to });
                continue;
            }
            // Without schema renames every table moves on its own into a
            // fresh schema; the old one is dropped once empty.
            let to = self.db.name(schema)?.to_string();
            self.emit(Statement::CreateSchema(to));
            for table in self.db.tables(schema)? {
                if self.tracker.is_created(table.id()) {
                    continue;
                }
                let name = self.original_name(table)?;
                let old = self.db.qualify_in(schema, &from, &name);
                let new = self.relocated(schema, &name);
                if old != new {
                    self.emit(Statement::RenameTable { from: old, to: new });
                }
            }
        }
        Ok(())
    }

    fn rename_tables(&mut self) -> Result<()> {
        for schema in self.db.schemas() {
            let mut renames = Vec::new();
            let mut fixed = Vec::new();
            for table in self.db.tables(schema)? {
                if self.tracker.is_created(table.id()) {
                    continue;
                }
                let original = self.original_name(table)?;
                if self.tracker.has_changed(table.id(), Descriptor::Name) {
                    renames.push(PendingRename::new(original, self.db.name(table)?));
                } else {
                    fixed.push(original);
                }
            }
            if renames.is_empty() {
                continue;
            }
            let steps =
                RenameResolver::new(renames, fixed, &self.db.options().temp_table_prefix).resolve()?;
            for step in steps {
                let from = self.relocated(schema, &step.from);
                let to = self.relocated(schema, &step.to);
                self.emit(Statement::RenameTable { from, to });
            }
        }
        Ok(())
    }

    // ================================================================
    // Created tables
    // ================================================================

    fn create_tables(&mut self) -> Result<()> {
        let tables = self.of_kind(self.tracker.created(), ObjectKind::Table)?;
        let members: HashSet<ObjectId> = tables.iter().copied().collect();
        let ordered = dependencies_first(&tables, |id| {
            let table = TableId::from_object_id(id);
            let mut targets = Vec::new();
            for fk in self.db.foreign_keys(table)? {
                let target = self.db.table_of(self.db.foreign_key(fk)?.referenced())?.id();
                if target != id && members.contains(&target) {
                    targets.push(target);
                }
            }
            Ok(targets)
        })?;

        for id in ordered {
            let table = TableId::from_object_id(id);
            let node = self.table_node(table, self.current(table)?)?;
            self.emit(Statement::CreateTable(node));
            for index in self.db.indexes(table)? {
                if !self.db.index(index)?.is_virtual() {
                    let node = self.index_node(index)?;
                    self.emit(Statement::CreateIndex(node));
                }
            }
        }
        Ok(())
    }

    // ================================================================
    // In-place alteration
    // ================================================================

    fn alter_table(&mut self, plan: &TableChanges) -> Result<()> {
        if !plan.has_structural_changes() {
            return Ok(());
        }
        let table = self.current(plan.table)?;
        let schema = self.db.schema_of(plan.table)?;

        for transition in plan.indexes.iter().filter(|i| i.needs_drop()) {
            let name = self.relocated(schema, &transition.original_name);
            self.emit(Statement::DropIndex(name));
        }
        // Foreign keys were dropped ahead of the other tables.
        for delta in plan
            .constraints
            .iter()
            .filter(|c| c.drop && c.kind != ObjectKind::ForeignKey)
        {
            self.emit(Statement::DropConstraint {
                table: table.clone(),
                name: delta.original_name.clone(),
            });
        }
        if plan.primary_key_replaced {
            if let Some(pk) = plan.original_primary_key {
                let name = self.original_name(pk)?;
                self.emit(Statement::DropConstraint {
                    table: table.clone(),
                    name,
                });
            }
        }
        self.rename_keys_and_indexes(plan, &table)?;

        for delta in plan.columns_in(ColumnState::Removed) {
            self.emit(Statement::DropColumn {
                table: table.clone(),
                column: delta.original_name.clone(),
            });
        }
        self.rename_columns(plan, &table)?;
        for delta in plan.columns.iter().filter(|c| c.state == ColumnState::Modified) {
            self.alter_column(&table, delta)?;
        }
        for delta in plan.columns_in(ColumnState::Created) {
            self.add_column(&table, delta.column)?;
        }

        if plan.primary_key_replaced {
            if let Some(node) = self.primary_key_node(plan.table)? {
                self.emit(Statement::AddConstraint {
                    table: table.clone(),
                    constraint: ConstraintNode::PrimaryKey(node),
                });
            }
        }
        for delta in plan.constraints.iter().filter(|c| c.add) {
            let constraint = match delta.kind {
                ObjectKind::ForeignKey => ConstraintNode::ForeignKey(
                    self.foreign_key_node(ForeignKeyId::from_object_id(delta.constraint))?,
                ),
                _ => ConstraintNode::Check(
                    self.check_node(CheckId::from_object_id(delta.constraint))?,
                ),
            };
            self.emit(Statement::AddConstraint {
                table: table.clone(),
                constraint,
            });
        }
        for transition in plan.indexes.iter().filter(|i| i.needs_create()) {
            let node = self.index_node(transition.index)?;
            self.emit(Statement::CreateIndex(node));
        }
        Ok(())
    }

    fn rename_keys_and_indexes(&mut self, plan: &TableChanges, table: &QualifiedName) -> Result<()> {
        let schema = self.db.schema_of(plan.table)?;
        for transition in plan.indexes.iter().filter(|i| i.needs_rename()) {
            let from = self.relocated(schema, &transition.original_name);
            let to = self.db.name(transition.index)?.to_string();
            self.emit(Statement::RenameIndex { from, to });
        }
        if plan.primary_key_renamed {
            if let Some(pk) = self.db.table(plan.table)?.primary_key() {
                let from = self.original_name(pk)?;
                let to = self.db.name(pk)?.to_string();
                self.emit(Statement::RenameConstraint {
                    table: table.clone(),
                    from,
                    to,
                });
            }
        }
        for delta in plan.constraints.iter().filter(|c| c.rename) {
            let to = self.db.name(delta.constraint)?.to_string();
            self.emit(Statement::RenameConstraint {
                table: table.clone(),
                from: delta.original_name.clone(),
                to,
            });
        }
        Ok(())
    }

    fn rename_columns(&mut self, plan: &TableChanges, table: &QualifiedName) -> Result<()> {
        let mut renames = Vec::new();
        let mut fixed = Vec::new();
        for delta in plan.columns.iter().filter(|c| c.is_surviving()) {
            if delta.renamed {
                renames.push(PendingRename::new(&delta.original_name, &delta.name));
            } else {
                fixed.push(delta.original_name.as_str());
            }
        }
        if renames.is_empty() {
            return Ok(());
        }
        let steps =
            RenameResolver::new(renames, fixed, &self.db.options().temp_column_prefix).resolve()?;
        for step in steps {
            self.emit(Statement::RenameColumn {
                table: table.clone(),
                from: step.from,
                to: step.to,
            });
        }
        Ok(())
    }

    fn alter_column(&mut self, table: &QualifiedName, delta: &ColumnDelta) -> Result<()> {
        let column = self.db.column(delta.column)?;
        let alter = |change| Statement::AlterColumn {
            table: table.clone(),
            column: delta.name.clone(),
            change,
        };

        let mut statements = Vec::new();
        if delta.type_changed {
            statements.push(alter(ColumnChange::SetDataType(column.data_type().clone())));
        }
        if delta.default_changed {
            statements.push(alter(match column.default() {
                Some(default) => ColumnChange::SetDefault(self.resolve_bare(default)?),
                None => ColumnChange::DropDefault,
            }));
        }
        if delta.nullability_changed {
            if column.is_nullable() {
                statements.push(alter(ColumnChange::DropNotNull));
            } else {
                statements.push(Statement::BackfillNulls {
                    table: table.clone(),
                    column: delta.name.clone(),
                    value: self.fill_value(delta.column)?,
                });
                statements.push(alter(ColumnChange::SetNotNull));
            }
        }
        self.statements.extend(statements);
        Ok(())
    }

    fn add_column(&mut self, table: &QualifiedName, column: ColumnId) -> Result<()> {
        let node = self.column_node(column)?;
        if node.nullable || node.default.is_some() {
            self.emit(Statement::AddColumn {
                table: table.clone(),
                column: node,
            });
            return Ok(());
        }
        // Existing rows need a value before NOT NULL can hold.
        let name = node.name.clone();
        self.emit(Statement::AddColumn {
            table: table.clone(),
            column: ColumnNode {
                nullable: true,
                ..node
            },
        });
        self.emit(Statement::BackfillNulls {
            table: table.clone(),
            column: name.clone(),
            value: self.fill_value(column)?,
        });
        self.emit(Statement::AlterColumn {
            table: table.clone(),
            column: name,
            change: ColumnChange::SetNotNull,
        });
        Ok(())
    }

    // ================================================================
    // Reconstruction
    // ================================================================

    /// Rebuilds a table: create a copy with the final shape, move the
    /// rows across, drop the original and rename the copy into place.
    fn reconstruct_table(&mut self, plan: &TableChanges) -> Result<()> {
        info!(table = %self.db.display_name(plan.table), "Reconstructing table");
        let table = self.current(plan.table)?;
        let schema = self.db.schema_of(plan.table)?;

        for transition in plan.indexes.iter().filter(|i| i.existed && !i.was_virtual) {
            let name = self.relocated(schema, &transition.original_name);
            self.emit(Statement::DropIndex(name));
        }

        let temp = self.relocated(schema, &self.temp_table_name(plan)?);
        let node = self.table_node(plan.table, temp.clone())?;
        self.emit(Statement::CreateTable(node));

        let mut columns = Vec::new();
        let mut values = Vec::new();
        for delta in plan.columns.iter().filter(|c| c.state != ColumnState::Removed) {
            columns.push(delta.name.clone());
            values.push(self.copied_value(delta)?);
        }
        if !columns.is_empty() {
            self.emit(Statement::InsertSelect {
                target: temp.clone(),
                columns,
                source: table.clone(),
                values,
            });
        }

        self.emit(Statement::DropTable(table.clone()));
        self.emit(Statement::RenameTable {
            from: temp,
            to: table,
        });
        for index in self.db.indexes(plan.table)? {
            if !self.db.index(index)?.is_virtual() {
                let node = self.index_node(index)?;
                self.emit(Statement::CreateIndex(node));
            }
        }
        Ok(())
    }

    fn temp_table_name(&self, plan: &TableChanges) -> Result<String> {
        let schema = self.db.schema_of(plan.table)?;
        let base = format!(
            "{}{}",
            self.db.options().temp_table_prefix,
            self.db.name(plan.table)?
        );
        let mut candidate = base.clone();
        let mut counter = 0;
        while self.db.contains::<TableId>(schema, &candidate) {
            counter += 1;
            candidate = format!("{base}_{counter}");
        }
        Ok(candidate)
    }

    /// The value a rebuilt table receives for one column of the old rows.
    fn copied_value(&self, delta: &ColumnDelta) -> Result<ResolvedExpr> {
        let column = self.db.column(delta.column)?;
        if delta.state == ColumnState::Created {
            return match column.default() {
                Some(default) => self.resolve_bare(default),
                None if !column.is_nullable() => self.fill_value(delta.column),
                None => Ok(Expr::null()),
            };
        }

        let mut value = Expr::Column(ResolvedColumn::bare(&delta.original_name));
        if delta.type_changed {
            value = value.cast(column.data_type().clone());
        }
        if delta.original_nullable && !column.is_nullable() {
            value = Expr::Coalesce(vec![value, self.fill_value(delta.column)?]);
        }
        Ok(value)
    }

    /// Replacement for NULLs in a column that must not hold them.
    fn fill_value(&self, column: ColumnId) -> Result<ResolvedExpr> {
        let builder = self.db.column(column)?;
        match builder.default() {
            Some(default) => self.resolve_bare(default),
            None => Ok(Expr::Literal(
                self.db.type_provider().backfill_value(builder.data_type()),
            )),
        }
    }

    // ================================================================
    // Views
    // ================================================================

    fn create_views(&mut self, rebuilt: &[ViewId]) -> Result<()> {
        let mut ids: Vec<ObjectId> = rebuilt.iter().map(|v| v.id()).collect();
        ids.extend(self.of_kind(self.tracker.created(), ObjectKind::View)?);
        let members: HashSet<ObjectId> = ids.iter().copied().collect();
        let ordered = dependencies_first(&ids, |id| self.referenced_views(id, &members))?;
        for view in ordered {
            let node = self.view_node(ViewId::from_object_id(view))?;
            self.emit(Statement::CreateView(node));
        }
        Ok(())
    }

    fn view_node(&self, view: ViewId) -> Result<ViewNode> {
        let builder = self.db.view(view)?;
        let query = builder.query();
        let qualify_columns = query.sources().len() > 1;
        let resolve = |expr: &Expr| -> Result<ResolvedExpr> {
            expr.try_map_columns(&mut |column: &ColumnId| {
                let name = self.db.name(*column)?;
                if qualify_columns {
                    let table = self.current(self.db.table_of(*column)?)?;
                    Ok(ResolvedColumn::qualified(table, name))
                } else {
                    Ok::<_, SchemaError>(ResolvedColumn::bare(name))
                }
            })
        };

        let mut sources = Vec::new();
        for source in query.sources() {
            sources.push(self.current(*source)?);
        }
        let mut items = Vec::new();
        for item in query.items() {
            items.push(match item {
                SelectItem::Wildcard => SelectNode::Wildcard,
                SelectItem::SourceWildcard(source) => {
                    SelectNode::SourceWildcard(self.current(*source)?)
                }
                SelectItem::Expr { expr, alias } => SelectNode::Expr {
                    expr: resolve(expr)?,
                    alias: alias.clone(),
                },
            });
        }
        let filter = query.where_clause().map(&resolve).transpose()?;

        Ok(ViewNode {
            name: self.current(view)?,
            query: QueryNode {
                sources,
                items,
                filter,
            },
        })
    }

    // ================================================================
    // Nodes
    // ================================================================

    fn resolve_bare(&self, expr: &Expr) -> Result<ResolvedExpr> {
        expr.try_map_columns(&mut |column: &ColumnId| {
            Ok::<_, SchemaError>(ResolvedColumn::bare(self.db.name(*column)?))
        })
    }

    fn column_node(&self, column: ColumnId) -> Result<ColumnNode> {
        let builder = self.db.column(column)?;
        Ok(ColumnNode {
            name: builder.name().to_string(),
            data_type: builder.data_type().clone(),
            nullable: builder.is_nullable(),
            default: builder.default().map(|d| self.resolve_bare(d)).transpose()?,
        })
    }

    fn index_column_names(&self, index: IndexId) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for column in self.db.index(index)?.columns() {
            names.push(self.db.name(column.column)?.to_string());
        }
        Ok(names)
    }

    fn primary_key_node(&self, table: TableId) -> Result<Option<PrimaryKeyNode>> {
        let Some(pk) = self.db.table(table)?.primary_key() else {
            return Ok(None);
        };
        let builder = self.db.primary_key(pk)?;
        Ok(Some(PrimaryKeyNode {
            name: builder.name().to_string(),
            columns: self.index_column_names(builder.index())?,
        }))
    }

    fn foreign_key_node(&self, fk: ForeignKeyId) -> Result<ForeignKeyNode> {
        let builder = self.db.foreign_key(fk)?;
        Ok(ForeignKeyNode {
            name: builder.name().to_string(),
            columns: self.index_column_names(builder.origin())?,
            referenced_table: self.current(self.db.table_of(builder.referenced())?)?,
            referenced_columns: self.index_column_names(builder.referenced())?,
            on_delete: builder.on_delete(),
            on_update: builder.on_update(),
        })
    }

    fn check_node(&self, check: CheckId) -> Result<CheckNode> {
        let builder = self.db.check(check)?;
        Ok(CheckNode {
            name: builder.name().to_string(),
            condition: self.resolve_bare(builder.condition())?,
        })
    }

    fn table_node(&self, table: TableId, name: QualifiedName) -> Result<TableNode> {
        let mut columns = Vec::new();
        for column in self.db.columns(table)? {
            columns.push(self.column_node(column)?);
        }
        let mut constraints = Vec::new();
        if let Some(pk) = self.primary_key_node(table)? {
            constraints.push(ConstraintNode::PrimaryKey(pk));
        }
        for fk in self.db.foreign_keys(table)? {
            constraints.push(ConstraintNode::ForeignKey(self.foreign_key_node(fk)?));
        }
        for check in self.db.checks(table)? {
            constraints.push(ConstraintNode::Check(self.check_node(check)?));
        }
        Ok(TableNode {
            name,
            columns,
            constraints,
        })
    }

    fn index_node(&self, index: IndexId) -> Result<IndexNode> {
        let builder = self.db.index(index)?;
        let mut columns = Vec::new();
        for column in builder.columns() {
            columns.push((self.db.name(column.column)?.to_string(), column.order));
        }
        Ok(IndexNode {
            name: self.current(index)?,
            table: self.current(builder.table())?,
            columns,
            unique: builder.is_unique(),
            filter: builder.filter().map(|f| self.resolve_bare(f)).transpose()?,
        })
    }
}

fn column_set_changed(plans: &[TableChanges], table: TableId) -> bool {
    plans.iter().any(|plan| {
        plan.table == table
            && plan
                .columns
                .iter()
                .any(|c| matches!(c.state, ColumnState::Created | ColumnState::Removed))
    })
}

/// Orders `ids` so that every id comes after the members it depends on.
///
/// Dependencies outside `ids` are ignored; cycles are broken at the
/// first id revisited.
fn dependencies_first<F>(ids: &[ObjectId], mut dependencies: F) -> Result<Vec<ObjectId>>
where
    F: FnMut(ObjectId) -> Result<Vec<ObjectId>>,
{
    let members: HashSet<ObjectId> = ids.iter().copied().collect();
    let mut visited = HashSet::new();
    let mut ordered = Vec::with_capacity(ids.len());

    for &root in ids {
        if !visited.insert(root) {
            continue;
        }
        let mut stack = vec![(root, dependencies(root)?, 0usize)];
        loop {
            let Some(frame) = stack.last_mut() else {
                break;
            };
            let next = frame.1.get(frame.2).copied();
            frame.2 += 1;
            match next {
                Some(child) => {
                    if members.contains(&child) && visited.insert(child) {
                        let grandchildren = dependencies(child)?;
                        stack.push((child, grandchildren, 0));
                    }
                }
                None => {
                    if let Some((id, _, _)) = stack.pop() {
                        ordered.push(id);
                    }
                }
            }
        }
    }
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> ObjectId {
        ObjectId::new(raw)
    }

    #[test]
    fn test_dependencies_first() {
        // 1 -> 2 -> 3, 4 independent
        let edges = [(id(1), id(2)), (id(2), id(3))];
        let ordered = dependencies_first(&[id(1), id(4), id(3), id(2)], |node| {
            Ok(edges
                .iter()
                .filter(|(from, _)| *from == node)
                .map(|(_, to)| *to)
                .collect())
        })
        .unwrap();
        assert_eq!(ordered, vec![id(3), id(2), id(1), id(4)]);
    }

    #[test]
    fn test_dependencies_first_breaks_cycles() {
        let ordered = dependencies_first(&[id(1), id(2)], |node| {
            Ok(vec![if node == id(1) { id(2) } else { id(1) }])
        })
        .unwrap();
        assert_eq!(ordered, vec![id(2), id(1)]);
    }

    #[test]
    fn test_outside_dependencies_are_ignored() {
        let ordered = dependencies_first(&[id(1)], |_| Ok(vec![id(9)])).unwrap();
        assert_eq!(ordered, vec![id(1)]);
    }
}
