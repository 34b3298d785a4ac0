//! SQLite interpreter.

use super::{AlterCapabilities, IndexNode, QualifiedName, SqlInterpreter};
use crate::types::DataType;

/// SQLite SQL generation.
///
/// SQLite cannot alter column types, nullability, defaults or
/// constraints in place, so those changes are planned as table
/// reconstructions. Schemas are attached databases and have no DDL.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteInterpreter;

impl SqliteInterpreter {
    /// Creates a new SQLite interpreter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SqlInterpreter for SqliteInterpreter {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn default_schema_name(&self) -> &'static str {
        "main"
    }

    fn capabilities(&self) -> AlterCapabilities {
        AlterCapabilities::restrictive()
    }

    fn type_name(&self, data_type: &DataType) -> String {
        // Type affinity rather than strict types
        match data_type {
            DataType::Smallint | DataType::Integer | DataType::Bigint => "INTEGER".to_string(),
            DataType::Real | DataType::Double | DataType::Decimal { .. } => "REAL".to_string(),
            DataType::Char(_)
            | DataType::Varchar(_)
            | DataType::Text
            | DataType::Json
            | DataType::Uuid => "TEXT".to_string(),
            DataType::Blob => "BLOB".to_string(),
            DataType::Date | DataType::Time | DataType::Timestamp => "TEXT".to_string(),
            DataType::Boolean => "INTEGER".to_string(),
            DataType::Custom(name) => name.clone(),
        }
    }

    fn render_bool(&self, value: bool) -> String {
        String::from(if value { "1" } else { "0" })
    }

    fn create_schema(&self, _name: &str) -> Vec<String> {
        Vec::new()
    }

    fn drop_schema(&self, _name: &str) -> Vec<String> {
        Vec::new()
    }

    fn rename_schema(&self, _from: &str, _to: &str) -> Vec<String> {
        Vec::new()
    }

    fn foreign_key_target(&self, table: &QualifiedName) -> String {
        // Foreign keys can only point into the same database
        self.quote_identifier(&table.name)
    }

    fn create_index(&self, index: &IndexNode) -> String {
        let mut sql = String::from("CREATE ");
        if index.unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        sql.push_str(&self.quote_qualified(&index.name));
        sql.push_str(" ON ");
        sql.push_str(&self.quote_identifier(&index.table.name));
        sql.push_str(" (");
        sql.push_str(&self.index_columns(&index.columns));
        sql.push(')');
        if let Some(filter) = &index.filter {
            sql.push_str(" WHERE ");
            sql.push_str(&self.render_expr(filter));
        }
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{
        ColumnNode, ConstraintNode, ForeignKeyNode, PrimaryKeyNode, Statement, TableNode,
    };
    use crate::expr::{Expr, ResolvedColumn};
    use crate::types::{ForeignKeyAction, SortOrder};

    #[test]
    fn test_create_table() {
        let dialect = SqliteInterpreter::new();
        let table = TableNode {
            name: QualifiedName::new("orders"),
            columns: vec![
                ColumnNode {
                    name: String::from("id"),
                    data_type: DataType::Bigint,
                    nullable: false,
                    default: None,
                },
                ColumnNode {
                    name: String::from("paid"),
                    data_type: DataType::Boolean,
                    nullable: false,
                    default: Some(Expr::value(false)),
                },
                ColumnNode {
                    name: String::from("user_id"),
                    data_type: DataType::Bigint,
                    nullable: true,
                    default: None,
                },
            ],
            constraints: vec![
                ConstraintNode::PrimaryKey(PrimaryKeyNode {
                    name: String::from("pk_orders"),
                    columns: vec![String::from("id")],
                }),
                ConstraintNode::ForeignKey(ForeignKeyNode {
                    name: String::from("fk_orders_user"),
                    columns: vec![String::from("user_id")],
                    referenced_table: QualifiedName::in_schema("auth", "users"),
                    referenced_columns: vec![String::from("id")],
                    on_delete: ForeignKeyAction::Cascade,
                    on_update: ForeignKeyAction::NoAction,
                }),
            ],
        };
        let sql = dialect.interpret(&Statement::CreateTable(table));
        assert_eq!(
            sql[0],
            "CREATE TABLE \"orders\" (\n    \"id\" INTEGER NOT NULL,\n    \"paid\" INTEGER NOT NULL DEFAULT 0,\n    \"user_id\" INTEGER,\n    CONSTRAINT \"pk_orders\" PRIMARY KEY (\"id\"),\n    CONSTRAINT \"fk_orders_user\" FOREIGN KEY (\"user_id\") REFERENCES \"users\" (\"id\") ON DELETE CASCADE\n)"
        );
    }

    #[test]
    fn test_create_index_in_schema() {
        let dialect = SqliteInterpreter::new();
        let sql = dialect.create_index(&IndexNode {
            name: QualifiedName::in_schema("aux", "ix_t_a"),
            table: QualifiedName::in_schema("aux", "t"),
            columns: vec![
                (String::from("a"), SortOrder::Asc),
                (String::from("b"), SortOrder::Desc),
            ],
            unique: true,
            filter: Some(Expr::column(ResolvedColumn::bare("a")).is_not_null()),
        });
        assert_eq!(
            sql,
            r#"CREATE UNIQUE INDEX "aux"."ix_t_a" ON "t" ("a", "b" DESC) WHERE "a" IS NOT NULL"#
        );
    }

    #[test]
    fn test_schema_statements_render_nothing() {
        let dialect = SqliteInterpreter::new();
        assert!(dialect
            .interpret(&Statement::CreateSchema(String::from("aux")))
            .is_empty());
        assert!(dialect
            .interpret(&Statement::RenameSchema {
                from: String::from("a"),
                to: String::from("b"),
            })
            .is_empty());
    }

    #[test]
    fn test_rename_table() {
        let dialect = SqliteInterpreter::new();
        let sql = dialect.interpret(&Statement::RenameTable {
            from: QualifiedName::new("__temp__t"),
            to: QualifiedName::new("t"),
        });
        assert_eq!(sql, vec![r#"ALTER TABLE "__temp__t" RENAME TO "t""#]);
    }
}
