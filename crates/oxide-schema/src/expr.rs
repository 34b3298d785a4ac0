//! Expression and condition trees.
//!
//! Builders store expressions whose column references are [`ColumnId`]
//! handles, so renaming a column never invalidates a stored filter,
//! check or view. At plan time the compiler maps those handles to
//! [`ResolvedColumn`] names and hands the result to a dialect
//! interpreter for rendering.

use serde::{Deserialize, Serialize};

use crate::builder::ColumnId;
use crate::dialect::QualifiedName;
use crate::types::{DataType, SqlValue, ToSqlValue};

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    /// `=`
    Eq,
    /// `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `AND`
    And,
    /// `OR`
    Or,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `||`
    Concat,
    /// `LIKE`
    Like,
}

impl BinaryOp {
    /// Returns the SQL operator token.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Concat => "||",
            Self::Like => "LIKE",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `NOT`
    Not,
    /// `-`
    Neg,
}

/// A column reference that has been resolved to names for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedColumn {
    /// Optional table qualifier.
    pub qualifier: Option<QualifiedName>,
    /// Column name.
    pub name: String,
}

impl ResolvedColumn {
    /// Creates an unqualified column reference.
    #[must_use]
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            qualifier: None,
            name: name.into(),
        }
    }

    /// Creates a qualified column reference.
    #[must_use]
    pub fn qualified(table: QualifiedName, name: impl Into<String>) -> Self {
        Self {
            qualifier: Some(table),
            name: name.into(),
        }
    }
}

/// An expression tree generic over its column reference type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr<C = ColumnId> {
    /// Column reference.
    Column(C),
    /// Literal value.
    Literal(SqlValue),
    /// Bare SQL keyword such as `CURRENT_TIMESTAMP`.
    Keyword(String),
    /// Binary operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr<C>>,
        /// Right operand.
        right: Box<Expr<C>>,
    },
    /// Unary operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr<C>>,
    },
    /// `IS [NOT] NULL` test.
    IsNull {
        /// Tested expression.
        expr: Box<Expr<C>>,
        /// True for `IS NOT NULL`.
        negated: bool,
    },
    /// Function call.
    Function {
        /// Function name.
        name: String,
        /// Arguments.
        args: Vec<Expr<C>>,
    },
    /// `CAST(expr AS type)`.
    Cast {
        /// Converted expression.
        expr: Box<Expr<C>>,
        /// Target type.
        data_type: DataType,
    },
    /// `COALESCE(a, b, ...)`.
    Coalesce(Vec<Expr<C>>),
}

impl<C> Expr<C> {
    /// Creates a column reference.
    #[must_use]
    pub fn column(column: C) -> Self {
        Self::Column(column)
    }

    /// Creates a literal.
    #[must_use]
    pub fn value<T: ToSqlValue>(value: T) -> Self {
        Self::Literal(value.to_sql_value())
    }

    /// Creates the NULL literal.
    #[must_use]
    pub fn null() -> Self {
        Self::Literal(SqlValue::Null)
    }

    /// Creates a keyword expression.
    #[must_use]
    pub fn keyword(keyword: impl Into<String>) -> Self {
        Self::Keyword(keyword.into())
    }

    /// Creates a function call.
    #[must_use]
    pub fn function(name: impl Into<String>, args: Vec<Expr<C>>) -> Self {
        Self::Function {
            name: name.into(),
            args,
        }
    }

    fn binary(self, op: BinaryOp, right: Expr<C>) -> Self {
        Self::Binary {
            op,
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    /// Creates an equality expression.
    #[must_use]
    pub fn eq(self, right: Expr<C>) -> Self {
        self.binary(BinaryOp::Eq, right)
    }

    /// Creates an inequality expression.
    #[must_use]
    pub fn not_eq(self, right: Expr<C>) -> Self {
        self.binary(BinaryOp::NotEq, right)
    }

    /// Creates a less-than expression.
    #[must_use]
    pub fn lt(self, right: Expr<C>) -> Self {
        self.binary(BinaryOp::Lt, right)
    }

    /// Creates a greater-than expression.
    #[must_use]
    pub fn gt(self, right: Expr<C>) -> Self {
        self.binary(BinaryOp::Gt, right)
    }

    /// Creates a greater-than-or-equal expression.
    #[must_use]
    pub fn gt_eq(self, right: Expr<C>) -> Self {
        self.binary(BinaryOp::GtEq, right)
    }

    /// Creates a conjunction.
    #[must_use]
    pub fn and(self, right: Expr<C>) -> Self {
        self.binary(BinaryOp::And, right)
    }

    /// Creates a disjunction.
    #[must_use]
    pub fn or(self, right: Expr<C>) -> Self {
        self.binary(BinaryOp::Or, right)
    }

    /// Creates a negation.
    #[must_use]
    pub fn not(self) -> Self {
        Self::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self),
        }
    }

    /// Creates an IS NULL test.
    #[must_use]
    pub fn is_null(self) -> Self {
        Self::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    /// Creates an IS NOT NULL test.
    #[must_use]
    pub fn is_not_null(self) -> Self {
        Self::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    /// Creates a CAST.
    #[must_use]
    pub fn cast(self, data_type: DataType) -> Self {
        Self::Cast {
            expr: Box::new(self),
            data_type,
        }
    }

    /// Visits every column reference in evaluation order.
    pub fn visit_columns<F: FnMut(&C)>(&self, f: &mut F) {
        match self {
            Self::Column(c) => f(c),
            Self::Literal(_) | Self::Keyword(_) => {}
            Self::Binary { left, right, .. } => {
                left.visit_columns(f);
                right.visit_columns(f);
            }
            Self::Unary { operand, .. } => operand.visit_columns(f),
            Self::IsNull { expr, .. } | Self::Cast { expr, .. } => expr.visit_columns(f),
            Self::Function { args, .. } | Self::Coalesce(args) => {
                for arg in args {
                    arg.visit_columns(f);
                }
            }
        }
    }

    /// Returns true if the expression reads no columns and calls no
    /// functions or keywords, so its value is fixed at DDL time.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        match self {
            Self::Literal(_) => true,
            Self::Column(_) | Self::Keyword(_) | Self::Function { .. } => false,
            Self::Binary { left, right, .. } => left.is_constant() && right.is_constant(),
            Self::Unary { operand, .. } => operand.is_constant(),
            Self::IsNull { expr, .. } | Self::Cast { expr, .. } => expr.is_constant(),
            Self::Coalesce(args) => args.iter().all(Self::is_constant),
        }
    }

    /// Rebuilds the tree with every column reference mapped through `f`.
    pub fn try_map_columns<D, E, F>(&self, f: &mut F) -> Result<Expr<D>, E>
    where
        F: FnMut(&C) -> Result<D, E>,
    {
        Ok(match self {
            Self::Column(c) => Expr::Column(f(c)?),
            Self::Literal(v) => Expr::Literal(v.clone()),
            Self::Keyword(k) => Expr::Keyword(k.clone()),
            Self::Binary { op, left, right } => Expr::Binary {
                op: *op,
                left: Box::new(left.try_map_columns(f)?),
                right: Box::new(right.try_map_columns(f)?),
            },
            Self::Unary { op, operand } => Expr::Unary {
                op: *op,
                operand: Box::new(operand.try_map_columns(f)?),
            },
            Self::IsNull { expr, negated } => Expr::IsNull {
                expr: Box::new(expr.try_map_columns(f)?),
                negated: *negated,
            },
            Self::Function { name, args } => Expr::Function {
                name: name.clone(),
                args: args
                    .iter()
                    .map(|a| a.try_map_columns(f))
                    .collect::<Result<_, _>>()?,
            },
            Self::Cast { expr, data_type } => Expr::Cast {
                expr: Box::new(expr.try_map_columns(f)?),
                data_type: data_type.clone(),
            },
            Self::Coalesce(args) => Expr::Coalesce(
                args.iter()
                    .map(|a| a.try_map_columns(f))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

impl<C: Clone + PartialEq> Expr<C> {
    /// Returns the distinct columns read by the expression, in first-use
    /// order.
    #[must_use]
    pub fn referenced_columns(&self) -> Vec<C> {
        let mut columns: Vec<C> = Vec::new();
        self.visit_columns(&mut |c| {
            if !columns.contains(c) {
                columns.push(c.clone());
            }
        });
        columns
    }
}

/// Shorthand for a column reference expression.
#[must_use]
pub fn col(column: ColumnId) -> Expr {
    Expr::Column(column)
}

/// Shorthand for a literal expression.
#[must_use]
pub fn lit<T: ToSqlValue>(value: T) -> Expr {
    Expr::value(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referenced_columns_are_distinct() {
        let expr: Expr<&str> = Expr::column("a")
            .gt(Expr::value(1))
            .and(Expr::column("b").is_not_null())
            .or(Expr::column("a").eq(Expr::value(5)));
        assert_eq!(expr.referenced_columns(), vec!["a", "b"]);
    }

    #[test]
    fn test_is_constant() {
        let constant: Expr<&str> = Expr::value(1).gt(Expr::value(0));
        assert!(constant.is_constant());
        assert!(!Expr::<&str>::keyword("CURRENT_TIMESTAMP").is_constant());
        assert!(!Expr::column("a").is_constant());
        assert!(!Expr::<&str>::function("random", vec![]).is_constant());
    }

    #[test]
    fn test_try_map_columns() {
        let expr: Expr<&str> = Expr::Coalesce(vec![Expr::column("a"), Expr::value(0)]);
        let mapped: Expr<String> = expr
            .try_map_columns(&mut |c| Ok::<_, ()>(c.to_uppercase()))
            .unwrap();
        assert_eq!(
            mapped,
            Expr::Coalesce(vec![Expr::Column(String::from("A")), Expr::value(0)])
        );

        let failed: Result<Expr<String>, &str> =
            Expr::column("a").try_map_columns(&mut |_| Err("missing"));
        assert_eq!(failed, Err("missing"));
    }
}
