//! Syntax tree for parsed DQL statements.

use crate::CollectionName;
use serde_json::Value;

/// A dotted field path such as `meta.priority`.
pub type Path = Vec<String>;

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Evict(Evict),
    AlterSystem { name: String, value: Value },
}

impl Statement {
    /// True if executing the statement can change stored documents.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Statement::Insert(_) | Statement::Update(_) | Statement::Evict(_)
        )
    }

    /// The collection the statement targets, if any.
    pub fn collection(&self) -> Option<&str> {
        match self {
            Statement::Select(s) => Some(&s.collection),
            Statement::Insert(s) => Some(&s.collection),
            Statement::Update(s) => Some(&s.collection),
            Statement::Evict(s) => Some(&s.collection),
            Statement::AlterSystem { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub collection: CollectionName,
    pub filter: Option<Expr>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub path: Path,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub collection: CollectionName,
    pub documents: Vec<Expr>,
    pub on_conflict: ConflictPolicy,
}

/// What `INSERT` does when a document with the same `_id` exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    #[default]
    Fail,
    DoNothing,
    Update,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub collection: CollectionName,
    pub assignments: Vec<(Path, Expr)>,
    pub filter: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evict {
    pub collection: CollectionName,
    pub filter: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Param(String),
    Path(Path),
    Object(Vec<(String, Expr)>),
    Array(Vec<Expr>),
    Not(Box<Expr>),
    Negate(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Contains,
    StartsWith,
    EndsWith,
    Lower,
    Upper,
    Length,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "contains" => Some(Function::Contains),
            "starts_with" => Some(Function::StartsWith),
            "ends_with" => Some(Function::EndsWith),
            "lower" => Some(Function::Lower),
            "upper" => Some(Function::Upper),
            "length" => Some(Function::Length),
            _ => None,
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Function::Contains | Function::StartsWith | Function::EndsWith => 2,
            Function::Lower | Function::Upper | Function::Length => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Contains => "contains",
            Function::StartsWith => "starts_with",
            Function::EndsWith => "ends_with",
            Function::Lower => "lower",
            Function::Upper => "upper",
            Function::Length => "length",
        }
    }
}
