use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{
    Builder, ColumnId, ObjectBuilder, ObjectId, ObjectKind, ReferenceSet, SchemaId, TypedId,
    ViewId,
};
use crate::database::Database;
use crate::error::{Result, SchemaError};
use crate::expr::Expr;
use crate::tracking::{Descriptor, TrackedValue};

/// One projection of a view query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectItem {
    /// `*`
    Wildcard,
    /// `source.*`
    SourceWildcard(ObjectId),
    /// `expr [AS alias]`
    Expr {
        /// Projected expression.
        expr: Expr,
        /// Output column name.
        alias: Option<String>,
    },
}

/// The SELECT behind a view, over tables and views of the same database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewQuery {
    sources: Vec<ObjectId>,
    items: Vec<SelectItem>,
    filter: Option<Expr>,
}

impl ViewQuery {
    /// Starts a query reading `source`.
    #[must_use]
    pub fn select_from(source: impl Into<ObjectId>) -> Self {
        Self {
            sources: vec![source.into()],
            items: Vec::new(),
            filter: None,
        }
    }

    /// Adds another source to the FROM list.
    #[must_use]
    pub fn join(mut self, source: impl Into<ObjectId>) -> Self {
        self.sources.push(source.into());
        self
    }

    /// Projects `*`.
    #[must_use]
    pub fn all(mut self) -> Self {
        self.items.push(SelectItem::Wildcard);
        self
    }

    /// Projects `source.*`.
    #[must_use]
    pub fn all_from(mut self, source: impl Into<ObjectId>) -> Self {
        self.items.push(SelectItem::SourceWildcard(source.into()));
        self
    }

    /// Projects a column under its own name.
    #[must_use]
    pub fn column(mut self, column: ColumnId) -> Self {
        self.items.push(SelectItem::Expr {
            expr: Expr::Column(column),
            alias: None,
        });
        self
    }

    /// Projects an expression under `alias`.
    #[must_use]
    pub fn expr_as(mut self, expr: Expr, alias: impl Into<String>) -> Self {
        self.items.push(SelectItem::Expr {
            expr,
            alias: Some(alias.into()),
        });
        self
    }

    /// Sets the WHERE condition.
    #[must_use]
    pub fn filter(mut self, filter: Expr) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Tables and views read by the query.
    #[must_use]
    pub fn sources(&self) -> &[ObjectId] {
        &self.sources
    }

    /// Projections.
    #[must_use]
    pub fn items(&self) -> &[SelectItem] {
        &self.items
    }

    /// WHERE condition.
    #[must_use]
    pub fn where_clause(&self) -> Option<&Expr> {
        self.filter.as_ref()
    }

    fn expressions(&self) -> impl Iterator<Item = &Expr> {
        self.items
            .iter()
            .filter_map(|item| match item {
                SelectItem::Expr { expr, .. } => Some(expr),
                _ => None,
            })
            .chain(self.filter.iter())
    }
}

/// A view.
#[derive(Debug, Clone)]
pub struct ViewBuilder {
    pub(crate) base: ObjectBuilder,
    pub(crate) query: ViewQuery,
    pub(crate) referenced: Vec<ObjectId>,
    pub(crate) referencing_views: ReferenceSet,
}

impl ViewBuilder {
    /// View handle.
    #[must_use]
    pub fn id(&self) -> ViewId {
        ViewId::from_object_id(self.base.id())
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

    /// Owning schema.
    #[must_use]
    pub fn schema(&self) -> SchemaId {
        SchemaId::from_object_id(self.base.parent().unwrap_or(self.base.id()))
    }

    /// The view query.
    #[must_use]
    pub fn query(&self) -> &ViewQuery {
        &self.query
    }

    /// Tables, views and columns the query reads.
    #[must_use]
    pub fn referenced(&self) -> &[ObjectId] {
        &self.referenced
    }

    /// Views selecting from this view.
    #[must_use]
    pub fn referencing_views(&self) -> &ReferenceSet {
        &self.referencing_views
    }
}

impl Database {
    /// Creates a view in `schema`.
    pub fn create_view(&mut self, schema: SchemaId, name: &str, query: ViewQuery) -> Result<ViewId> {
        self.schema(schema)?.base.ensure_live()?;
        let referenced = self.analyze_query(&query, None)?;
        self.ensure_name_free(Some(schema.id()), ObjectKind::View, name)?;

        let id = self.allocate_id();
        self.register_name(Some(schema.id()), ObjectKind::View, name, id)?;
        self.insert_builder(Builder::View(ViewBuilder {
            base: ObjectBuilder::new(id, name, ObjectKind::View, Some(schema.id())),
            query,
            referenced: Vec::new(),
            referencing_views: ReferenceSet::new(),
        }));
        let view = ViewId::from_object_id(id);
        self.attach_view_references(view, referenced)?;
        self.record_created(id)?;
        Ok(view)
    }

    /// Replaces the view query.
    pub fn set_query(&mut self, view: ViewId, query: ViewQuery) -> Result<()> {
        let builder = self.view(view)?;
        builder.base.ensure_live()?;
        if builder.query == query {
            return Ok(());
        }
        let referenced = self.analyze_query(&query, Some(view))?;
        self.detach_view_references(view)?;
        self.attach_view_references(view, referenced)?;
        let before = std::mem::replace(&mut self.view_mut(view)?.query, query.clone());
        self.record_change(
            view.id(),
            Descriptor::Query,
            TrackedValue::Query(before),
            TrackedValue::Query(query),
        )
    }

    /// Checks the query against the graph and returns everything it
    /// reads: sources first, then columns in first-use order.
    fn analyze_query(&self, query: &ViewQuery, this: Option<ViewId>) -> Result<Vec<ObjectId>> {
        if query.sources.is_empty() {
            return Err(SchemaError::InvalidOperation(String::from(
                "a view query needs at least one source",
            )));
        }
        let mut errors = Vec::new();
        for source in &query.sources {
            let base = self.base(*source)?;
            if base.is_removed() {
                errors.push(format!("view reads removed {} '{}'", base.kind(), base.name()));
            } else if !matches!(base.kind(), ObjectKind::Table | ObjectKind::View) {
                errors.push(format!("view cannot read from {} '{}'", base.kind(), base.name()));
            }
        }
        for item in &query.items {
            if let SelectItem::SourceWildcard(source) = item {
                if !query.sources.contains(source) {
                    errors.push(format!(
                        "wildcard source '{}' is not in the FROM list",
                        self.display_name(*source)
                    ));
                }
            }
        }

        let mut referenced = query.sources.clone();
        for expr in query.expressions() {
            for column in expr.referenced_columns() {
                match self.column(column) {
                    Ok(c) if c.base.is_removed() => {
                        errors.push(format!("view reads removed column '{}'", c.name()));
                    }
                    Ok(c) if !query.sources.contains(&c.table().id()) => errors.push(format!(
                        "view reads column '{}' outside its sources",
                        self.display_name(column)
                    )),
                    Ok(_) => {
                        if !referenced.contains(&column.id()) {
                            referenced.push(column.id());
                        }
                    }
                    Err(_) => errors.push(format!("view reads unknown column {column}")),
                }
            }
        }
        if !errors.is_empty() {
            return Err(SchemaError::InvalidExpressionScope(errors));
        }

        if let Some(this) = this {
            for source in &query.sources {
                let source_view = ViewId::from_object_id(*source);
                if self.builder(*source)?.kind() == ObjectKind::View
                    && (source_view == this || self.view_depends_on(source_view, this)?)
                {
                    return Err(SchemaError::InvalidOperation(format!(
                        "view '{}' would depend on itself through '{}'",
                        self.display_name(this),
                        self.display_name(*source)
                    )));
                }
            }
        }
        Ok(referenced)
    }

    /// Returns true if `view` reads `target`, directly or through other
    /// views.
    pub(crate) fn view_depends_on(&self, view: ViewId, target: ViewId) -> Result<bool> {
        let mut stack = vec![view];
        let mut visited = HashSet::new();
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            for id in &self.view(current)?.referenced {
                if self.builder(*id)?.kind() != ObjectKind::View {
                    continue;
                }
                let next = ViewId::from_object_id(*id);
                if next == target {
                    return Ok(true);
                }
                stack.push(next);
            }
        }
        Ok(false)
    }

    fn attach_view_references(&mut self, view: ViewId, referenced: Vec<ObjectId>) -> Result<()> {
        for id in &referenced {
            match self.builder_mut(*id)? {
                Builder::Table(t) => t.referencing_views.add(view.id(), ObjectKind::View),
                Builder::View(v) => v.referencing_views.add(view.id(), ObjectKind::View),
                Builder::Column(c) => c.views.add(view.id(), ObjectKind::View),
                _ => {}
            }
        }
        self.view_mut(view)?.referenced = referenced;
        Ok(())
    }

    fn detach_view_references(&mut self, view: ViewId) -> Result<()> {
        let referenced = std::mem::take(&mut self.view_mut(view)?.referenced);
        for id in referenced {
            match self.builder_mut(id)? {
                Builder::Table(t) => {
                    t.referencing_views.remove(view.id());
                }
                Builder::View(v) => {
                    v.referencing_views.remove(view.id());
                }
                Builder::Column(c) => {
                    c.views.remove(view.id());
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Removes a view no other view reads.
    pub(crate) fn remove_view(&mut self, view: ViewId) -> Result<()> {
        let errors: Vec<SchemaError> = self
            .view(view)?
            .referencing_views
            .ids()
            .map(|dependent| {
                SchemaError::referential(
                    self.display_name(view),
                    format!("still referenced by view '{}'", self.display_name(dependent)),
                )
            })
            .collect();
        SchemaError::collect(errors)?;
        self.detach_view(view)
    }

    pub(crate) fn detach_view(&mut self, view: ViewId) -> Result<()> {
        if self.view(view)?.base.is_removed() {
            return Ok(());
        }
        self.detach_view_references(view)?;
        self.mark_removed(view.id())
    }

    /// Views that read `id` directly: a table, view or column.
    pub fn referencing_views(&self, id: impl Into<ObjectId>) -> Result<Vec<ViewId>> {
        let references = match self.builder(id)? {
            Builder::Table(t) => &t.referencing_views,
            Builder::View(v) => &v.referencing_views,
            Builder::Column(c) => &c.views,
            _ => return Ok(Vec::new()),
        };
        Ok(references.ids().map(ViewId::from_object_id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{ColumnDefinition, TableId};
    use crate::expr::{col, lit};
    use crate::types::DataType;

    fn setup() -> (Database, TableId, ColumnId) {
        let mut db = Database::postgres();
        let public = db.default_schema();
        let t = db.create_table(public, "t").unwrap();
        let a = db
            .create_column(t, ColumnDefinition::new("a", DataType::Integer))
            .unwrap();
        (db, t, a)
    }

    #[test]
    fn test_view_registers_back_references() {
        let (mut db, t, a) = setup();
        let public = db.default_schema();
        let v = db
            .create_view(public, "v", ViewQuery::select_from(t).column(a))
            .unwrap();
        assert!(db.table(t).unwrap().referencing_views().contains(v.id()));
        assert!(db.column(a).unwrap().views().contains(v.id()));
        assert_eq!(db.referencing_views(a).unwrap(), vec![v]);

        assert!(db.remove(a).is_err());
        assert!(db.remove(t).is_err());
        db.remove(v).unwrap();
        assert!(db.table(t).unwrap().referencing_views().is_empty());
        db.remove(t).unwrap();
    }

    #[test]
    fn test_view_scope() {
        let (mut db, t, _) = setup();
        let public = db.default_schema();
        let u = db.create_table(public, "u").unwrap();
        let x = db
            .create_column(u, ColumnDefinition::new("x", DataType::Integer))
            .unwrap();
        let err = db
            .create_view(public, "v", ViewQuery::select_from(t).all().filter(col(x).gt(lit(1))))
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidExpressionScope(_)));
        assert!(!db.contains::<ViewId>(public, "v"));
    }

    #[test]
    fn test_view_cycle_rejected() {
        let (mut db, t, _) = setup();
        let public = db.default_schema();
        let v1 = db
            .create_view(public, "v1", ViewQuery::select_from(t).all())
            .unwrap();
        let v2 = db
            .create_view(public, "v2", ViewQuery::select_from(v1).all())
            .unwrap();
        let err = db
            .set_query(v1, ViewQuery::select_from(v2).all())
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidOperation(_)));
        assert_eq!(db.view(v1).unwrap().query().sources(), &[t.id()]);
    }

    #[test]
    fn test_set_query_moves_references() {
        let (mut db, t, a) = setup();
        let public = db.default_schema();
        let u = db.create_table(public, "u").unwrap();
        let v = db
            .create_view(public, "v", ViewQuery::select_from(t).column(a))
            .unwrap();
        db.set_query(v, ViewQuery::select_from(u).all()).unwrap();
        assert!(db.column(a).unwrap().views().is_empty());
        assert!(db.table(u).unwrap().referencing_views().contains(v.id()));
        db.remove(a).unwrap();
    }
}
