//! Dialect-specific SQL rendering.
//!
//! The plan compiler emits engine-neutral [`Statement`] nodes. A
//! [`SqlInterpreter`] turns each node into zero or more SQL strings and
//! advertises, through [`AlterCapabilities`], which changes the engine
//! can apply in place. Anything outside those capabilities is planned as
//! a table reconstruction.

mod node;
mod postgres;
mod sqlite;

pub use node::{
    CheckNode, ColumnChange, ColumnNode, ConstraintNode, ForeignKeyNode, IndexNode,
    PrimaryKeyNode, QualifiedName, QueryNode, ResolvedExpr, SelectNode, Statement, TableNode,
    ViewNode,
};
pub use postgres::PostgresInterpreter;
pub use sqlite::SqliteInterpreter;

use crate::expr::{Expr, UnaryOp};
use crate::types::{DataType, ForeignKeyAction, SortOrder, SqlValue};

/// In-place ALTER support of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlterCapabilities {
    /// `ALTER COLUMN ... TYPE`.
    pub alter_column_type: bool,
    /// `ALTER COLUMN ... SET/DROP NOT NULL`.
    pub alter_column_nullability: bool,
    /// `ALTER COLUMN ... SET/DROP DEFAULT`.
    pub alter_column_default: bool,
    /// `ADD COLUMN` with a non-constant default.
    pub add_column_expression_default: bool,
    /// `DROP COLUMN`.
    pub drop_column: bool,
    /// `RENAME COLUMN`.
    pub rename_column: bool,
    /// `ADD CONSTRAINT` / `DROP CONSTRAINT` on an existing table.
    pub alter_constraints: bool,
    /// `ALTER SCHEMA ... RENAME TO`.
    pub rename_schema: bool,
    /// `ALTER INDEX ... RENAME TO`.
    pub rename_index: bool,
    /// `ALTER TABLE ... RENAME CONSTRAINT`.
    pub rename_constraint: bool,
}

impl AlterCapabilities {
    /// Table rename, column rename and plain ADD COLUMN only.
    #[must_use]
    pub const fn restrictive() -> Self {
        Self {
            alter_column_type: false,
            alter_column_nullability: false,
            alter_column_default: false,
            add_column_expression_default: false,
            drop_column: false,
            rename_column: true,
            alter_constraints: false,
            rename_schema: false,
            rename_index: false,
            rename_constraint: false,
        }
    }

    /// Every change can be applied in place.
    #[must_use]
    pub const fn full() -> Self {
        Self {
            alter_column_type: true,
            alter_column_nullability: true,
            alter_column_default: true,
            add_column_expression_default: true,
            drop_column: true,
            rename_column: true,
            alter_constraints: true,
            rename_schema: true,
            rename_index: true,
            rename_constraint: true,
        }
    }
}

/// Renders statement nodes into engine-specific SQL.
pub trait SqlInterpreter: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Name of the schema objects live in when none is given.
    fn default_schema_name(&self) -> &'static str;

    /// What the engine can alter in place.
    fn capabilities(&self) -> AlterCapabilities;

    /// Maps a `DataType` to the engine's type name.
    fn type_name(&self, data_type: &DataType) -> String;

    /// Appended to every emitted statement.
    fn terminator(&self) -> &'static str {
        ";"
    }

    /// Quotes an identifier.
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Quotes a possibly schema-qualified name.
    fn quote_qualified(&self, name: &QualifiedName) -> String {
        match &name.schema {
            Some(schema) => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(&name.name)
            ),
            None => self.quote_identifier(&name.name),
        }
    }

    /// Renders a boolean literal.
    fn render_bool(&self, value: bool) -> String {
        String::from(if value { "TRUE" } else { "FALSE" })
    }

    /// Renders a literal value.
    fn render_value(&self, value: &SqlValue) -> String {
        match value {
            SqlValue::Null => String::from("NULL"),
            SqlValue::Bool(b) => self.render_bool(*b),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            SqlValue::Blob(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
                format!("X'{hex}'")
            }
        }
    }

    /// Renders an expression.
    fn render_expr(&self, expr: &ResolvedExpr) -> String {
        match expr {
            Expr::Column(column) => match &column.qualifier {
                Some(table) => format!(
                    "{}.{}",
                    self.quote_qualified(table),
                    self.quote_identifier(&column.name)
                ),
                None => self.quote_identifier(&column.name),
            },
            Expr::Literal(value) => self.render_value(value),
            Expr::Keyword(keyword) => keyword.clone(),
            Expr::Binary { op, left, right } => format!(
                "{} {} {}",
                self.render_operand(left),
                op.as_str(),
                self.render_operand(right)
            ),
            Expr::Unary { op, operand } => match op {
                UnaryOp::Not => format!("NOT {}", self.render_operand(operand)),
                UnaryOp::Neg => format!("-{}", self.render_operand(operand)),
            },
            Expr::IsNull { expr, negated } => format!(
                "{} IS {}NULL",
                self.render_operand(expr),
                if *negated { "NOT " } else { "" }
            ),
            Expr::Function { name, args } => format!("{name}({})", self.render_list(args)),
            Expr::Cast { expr, data_type } => format!(
                "CAST({} AS {})",
                self.render_expr(expr),
                self.type_name(data_type)
            ),
            Expr::Coalesce(args) => format!("COALESCE({})", self.render_list(args)),
        }
    }

    /// Renders a nested operand, parenthesizing compound expressions.
    fn render_operand(&self, expr: &ResolvedExpr) -> String {
        match expr {
            Expr::Binary { .. } | Expr::Unary { .. } | Expr::IsNull { .. } => {
                format!("({})", self.render_expr(expr))
            }
            _ => self.render_expr(expr),
        }
    }

    /// Renders a comma-separated expression list.
    fn render_list(&self, exprs: &[ResolvedExpr]) -> String {
        exprs
            .iter()
            .map(|e| self.render_expr(e))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Renders a comma-separated identifier list.
    fn render_identifiers(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|n| self.quote_identifier(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Renders one column definition.
    fn column_definition(&self, column: &ColumnNode) -> String {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            self.type_name(&column.data_type)
        );
        if !column.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&self.render_default(default));
        }
        sql
    }

    /// Renders a default expression.
    fn render_default(&self, default: &ResolvedExpr) -> String {
        match default {
            Expr::Literal(_) | Expr::Keyword(_) => self.render_expr(default),
            _ => format!("({})", self.render_expr(default)),
        }
    }

    /// Renders the table a foreign key points at.
    fn foreign_key_target(&self, table: &QualifiedName) -> String {
        self.quote_qualified(table)
    }

    /// Renders one table constraint.
    fn constraint_definition(&self, constraint: &ConstraintNode) -> String {
        let body = match constraint {
            ConstraintNode::PrimaryKey(pk) => {
                format!("PRIMARY KEY ({})", self.render_identifiers(&pk.columns))
            }
            ConstraintNode::ForeignKey(fk) => {
                let mut sql = format!(
                    "FOREIGN KEY ({}) REFERENCES {} ({})",
                    self.render_identifiers(&fk.columns),
                    self.foreign_key_target(&fk.referenced_table),
                    self.render_identifiers(&fk.referenced_columns)
                );
                if fk.on_delete != ForeignKeyAction::NoAction {
                    sql.push_str(" ON DELETE ");
                    sql.push_str(fk.on_delete.to_sql());
                }
                if fk.on_update != ForeignKeyAction::NoAction {
                    sql.push_str(" ON UPDATE ");
                    sql.push_str(fk.on_update.to_sql());
                }
                sql
            }
            ConstraintNode::Check(check) => {
                format!("CHECK ({})", self.render_expr(&check.condition))
            }
        };
        format!(
            "CONSTRAINT {} {body}",
            self.quote_identifier(constraint.name())
        )
    }

    /// Renders the SELECT behind a view.
    fn render_query(&self, query: &QueryNode) -> String {
        let items: Vec<String> = query
            .items
            .iter()
            .map(|item| match item {
                SelectNode::Wildcard => String::from("*"),
                SelectNode::SourceWildcard(source) => {
                    format!("{}.*", self.quote_qualified(source))
                }
                SelectNode::Expr { expr, alias } => match alias {
                    Some(alias) => {
                        format!("{} AS {}", self.render_expr(expr), self.quote_identifier(alias))
                    }
                    None => self.render_expr(expr),
                },
            })
            .collect();
        let sources: Vec<String> = query
            .sources
            .iter()
            .map(|s| self.quote_qualified(s))
            .collect();
        let mut sql = format!("SELECT {} FROM {}", items.join(", "), sources.join(", "));
        if let Some(filter) = &query.filter {
            sql.push_str(" WHERE ");
            sql.push_str(&self.render_expr(filter));
        }
        sql
    }

    /// Renders a statement node. Nodes the engine has no syntax for
    /// render to nothing.
    fn interpret(&self, statement: &Statement) -> Vec<String> {
        match statement {
            Statement::CreateSchema(name) => self.create_schema(name),
            Statement::DropSchema(name) => self.drop_schema(name),
            Statement::RenameSchema { from, to } => self.rename_schema(from, to),
            Statement::CreateTable(table) => vec![self.create_table(table)],
            Statement::DropTable(name) => vec![format!("DROP TABLE {}", self.quote_qualified(name))],
            Statement::RenameTable { from, to } => self.rename_table(from, to),
            Statement::AddColumn { table, column } => vec![format!(
                "ALTER TABLE {} ADD COLUMN {}",
                self.quote_qualified(table),
                self.column_definition(column)
            )],
            Statement::DropColumn { table, column } => vec![format!(
                "ALTER TABLE {} DROP COLUMN {}",
                self.quote_qualified(table),
                self.quote_identifier(column)
            )],
            Statement::RenameColumn { table, from, to } => vec![format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                self.quote_qualified(table),
                self.quote_identifier(from),
                self.quote_identifier(to)
            )],
            Statement::AlterColumn {
                table,
                column,
                change,
            } => vec![self.alter_column(table, column, change)],
            Statement::BackfillNulls {
                table,
                column,
                value,
            } => {
                let column = self.quote_identifier(column);
                vec![format!(
                    "UPDATE {} SET {column} = {} WHERE {column} IS NULL",
                    self.quote_qualified(table),
                    self.render_expr(value)
                )]
            }
            Statement::AddConstraint { table, constraint } => vec![format!(
                "ALTER TABLE {} ADD {}",
                self.quote_qualified(table),
                self.constraint_definition(constraint)
            )],
            Statement::DropConstraint { table, name } => vec![format!(
                "ALTER TABLE {} DROP CONSTRAINT {}",
                self.quote_qualified(table),
                self.quote_identifier(name)
            )],
            Statement::RenameConstraint { table, from, to } => vec![format!(
                "ALTER TABLE {} RENAME CONSTRAINT {} TO {}",
                self.quote_qualified(table),
                self.quote_identifier(from),
                self.quote_identifier(to)
            )],
            Statement::CreateIndex(index) => vec![self.create_index(index)],
            Statement::RenameIndex { from, to } => vec![format!(
                "ALTER INDEX {} RENAME TO {}",
                self.quote_qualified(from),
                self.quote_identifier(to)
            )],
            Statement::DropIndex(name) => vec![format!("DROP INDEX {}", self.quote_qualified(name))],
            Statement::CreateView(view) => vec![format!(
                "CREATE VIEW {} AS {}",
                self.quote_qualified(&view.name),
                self.render_query(&view.query)
            )],
            Statement::DropView(name) => vec![format!("DROP VIEW {}", self.quote_qualified(name))],
            Statement::InsertSelect {
                target,
                columns,
                source,
                values,
            } => {
                let selected: Vec<String> = values
                    .iter()
                    .zip(columns)
                    .map(|(value, column)| {
                        format!("{} AS {}", self.render_expr(value), self.quote_identifier(column))
                    })
                    .collect();
                vec![format!(
                    "INSERT INTO {} ({}) SELECT {} FROM {}",
                    self.quote_qualified(target),
                    self.render_identifiers(columns),
                    selected.join(", "),
                    self.quote_qualified(source)
                )]
            }
        }
    }

    /// Generates SQL for CREATE SCHEMA.
    fn create_schema(&self, name: &str) -> Vec<String> {
        vec![format!("CREATE SCHEMA {}", self.quote_identifier(name))]
    }

    /// Generates SQL for DROP SCHEMA.
    fn drop_schema(&self, name: &str) -> Vec<String> {
        vec![format!("DROP SCHEMA {}", self.quote_identifier(name))]
    }

    /// Generates SQL for a schema rename.
    fn rename_schema(&self, from: &str, to: &str) -> Vec<String> {
        vec![format!(
            "ALTER SCHEMA {} RENAME TO {}",
            self.quote_identifier(from),
            self.quote_identifier(to)
        )]
    }

    /// Generates SQL for CREATE TABLE.
    fn create_table(&self, table: &TableNode) -> String {
        let mut lines: Vec<String> = table
            .columns
            .iter()
            .map(|c| format!("    {}", self.column_definition(c)))
            .collect();
        lines.extend(
            table
                .constraints
                .iter()
                .map(|c| format!("    {}", self.constraint_definition(c))),
        );
        format!(
            "CREATE TABLE {} (\n{}\n)",
            self.quote_qualified(&table.name),
            lines.join(",\n")
        )
    }

    /// Generates SQL for a table rename.
    fn rename_table(&self, from: &QualifiedName, to: &QualifiedName) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_qualified(from),
            self.quote_identifier(&to.name)
        )]
    }

    /// Generates SQL for ALTER COLUMN.
    fn alter_column(&self, table: &QualifiedName, column: &str, change: &ColumnChange) -> String {
        let action = match change {
            ColumnChange::SetDataType(data_type) => format!("TYPE {}", self.type_name(data_type)),
            ColumnChange::SetNotNull => String::from("SET NOT NULL"),
            ColumnChange::DropNotNull => String::from("DROP NOT NULL"),
            ColumnChange::SetDefault(default) => {
                format!("SET DEFAULT {}", self.render_default(default))
            }
            ColumnChange::DropDefault => String::from("DROP DEFAULT"),
        };
        format!(
            "ALTER TABLE {} ALTER COLUMN {} {action}",
            self.quote_qualified(table),
            self.quote_identifier(column)
        )
    }

    /// Generates SQL for CREATE INDEX.
    fn create_index(&self, index: &IndexNode) -> String {
        let mut sql = String::from("CREATE ");
        if index.unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        sql.push_str(&self.quote_identifier(&index.name.name));
        sql.push_str(" ON ");
        sql.push_str(&self.quote_qualified(&index.table));
        sql.push_str(" (");
        sql.push_str(&self.index_columns(&index.columns));
        sql.push(')');
        if let Some(filter) = &index.filter {
            sql.push_str(" WHERE ");
            sql.push_str(&self.render_expr(filter));
        }
        sql
    }

    /// Renders the column list of an index.
    fn index_columns(&self, columns: &[(String, SortOrder)]) -> String {
        columns
            .iter()
            .map(|(name, order)| match order {
                SortOrder::Asc => self.quote_identifier(name),
                SortOrder::Desc => format!("{} DESC", self.quote_identifier(name)),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
