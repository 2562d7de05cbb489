//! AST of the expression subset.
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Decimal(Decimal),
    Double(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// Comma-separated sequence; `()` is the empty one.
    Sequence(Vec<Expr>),
    ContextItem,
    VarRef(QName),
    Negate(Box<Expr>),
    FunctionCall { name: QName, args: Vec<Expr> },
}
