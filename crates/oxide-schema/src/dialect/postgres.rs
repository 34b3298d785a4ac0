//! PostgreSQL interpreter.

use super::{AlterCapabilities, ColumnChange, QualifiedName, SqlInterpreter};
use crate::types::DataType;

/// PostgreSQL SQL generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresInterpreter;

impl PostgresInterpreter {
    /// Creates a new PostgreSQL interpreter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SqlInterpreter for PostgresInterpreter {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn default_schema_name(&self) -> &'static str {
        "public"
    }

    fn capabilities(&self) -> AlterCapabilities {
        AlterCapabilities::full()
    }

    fn type_name(&self, data_type: &DataType) -> String {
        match data_type {
            DataType::Smallint => "SMALLINT".to_string(),
            DataType::Integer => "INTEGER".to_string(),
            DataType::Bigint => "BIGINT".to_string(),
            DataType::Real => "REAL".to_string(),
            DataType::Double => "DOUBLE PRECISION".to_string(),
            DataType::Decimal { precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => format!("DECIMAL({p}, {s})"),
                (Some(p), None) => format!("DECIMAL({p})"),
                _ => "DECIMAL".to_string(),
            },
            DataType::Char(len) => match len {
                Some(n) => format!("CHAR({n})"),
                None => "CHAR".to_string(),
            },
            DataType::Varchar(len) => match len {
                Some(n) => format!("VARCHAR({n})"),
                None => "VARCHAR".to_string(),
            },
            DataType::Text => "TEXT".to_string(),
            DataType::Blob => "BYTEA".to_string(),
            DataType::Date => "DATE".to_string(),
            DataType::Time => "TIME".to_string(),
            DataType::Timestamp => "TIMESTAMP".to_string(),
            DataType::Boolean => "BOOLEAN".to_string(),
            DataType::Json => "JSONB".to_string(),
            DataType::Uuid => "UUID".to_string(),
            DataType::Custom(name) => name.clone(),
        }
    }

    fn rename_table(&self, from: &QualifiedName, to: &QualifiedName) -> Vec<String> {
        let mut statements = Vec::new();
        let mut current = from.clone();
        if from.schema != to.schema {
            let schema = to
                .schema
                .as_deref()
                .unwrap_or_else(|| self.default_schema_name());
            statements.push(format!(
                "ALTER TABLE {} SET SCHEMA {}",
                self.quote_qualified(from),
                self.quote_identifier(schema)
            ));
            current = to.with_name(from.name.clone());
        }
        if current.name != to.name {
            statements.push(format!(
                "ALTER TABLE {} RENAME TO {}",
                self.quote_qualified(&current),
                self.quote_identifier(&to.name)
            ));
        }
        statements
    }

    fn alter_column(&self, table: &QualifiedName, column: &str, change: &ColumnChange) -> String {
        let quoted = self.quote_identifier(column);
        let action = match change {
            ColumnChange::SetDataType(data_type) => {
                let type_name = self.type_name(data_type);
                format!("TYPE {type_name} USING {quoted}::{type_name}")
            }
            ColumnChange::SetNotNull => String::from("SET NOT NULL"),
            ColumnChange::DropNotNull => String::from("DROP NOT NULL"),
            ColumnChange::SetDefault(default) => {
                format!("SET DEFAULT {}", self.render_default(default))
            }
            ColumnChange::DropDefault => String::from("DROP DEFAULT"),
        };
        format!(
            "ALTER TABLE {} ALTER COLUMN {quoted} {action}",
            self.quote_qualified(table)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Statement;

    #[test]
    fn test_move_table_between_schemas() {
        let dialect = PostgresInterpreter::new();
        let sql = dialect.interpret(&Statement::RenameTable {
            from: QualifiedName::in_schema("s", "t"),
            to: QualifiedName::in_schema("s2", "u"),
        });
        assert_eq!(
            sql,
            vec![
                r#"ALTER TABLE "s"."t" SET SCHEMA "s2""#,
                r#"ALTER TABLE "s2"."t" RENAME TO "u""#,
            ]
        );
    }

    #[test]
    fn test_alter_column_type() {
        let dialect = PostgresInterpreter::new();
        let sql = dialect.interpret(&Statement::AlterColumn {
            table: QualifiedName::new("t"),
            column: String::from("b"),
            change: ColumnChange::SetDataType(DataType::Integer),
        });
        assert_eq!(
            sql,
            vec![r#"ALTER TABLE "t" ALTER COLUMN "b" TYPE INTEGER USING "b"::INTEGER"#]
        );
    }

    #[test]
    fn test_rename_schema() {
        let dialect = PostgresInterpreter::new();
        let sql = dialect.interpret(&Statement::RenameSchema {
            from: String::from("s"),
            to: String::from("s2"),
        });
        assert_eq!(sql, vec![r#"ALTER SCHEMA "s" RENAME TO "s2""#]);
    }
}
