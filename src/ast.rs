use crate::error::Position;
use crate::lexer::{FormatSpec, Operator};
use crate::types::{Field, Type};

/// A whole compilation unit: struct declarations, function declarations and
/// the single mandatory run block.
#[derive(Debug, PartialEq)]
pub struct Program {
    pub structs: Vec<StructDecl>,
    pub functions: Vec<FunctionDecl>,
    pub run: RunBlock,
}

#[derive(Debug, PartialEq)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<Field>,
    pub pos: Position,
}

#[derive(Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Type,
    pub body: Block,
    pub pos: Position,
}

#[derive(Debug, PartialEq)]
pub struct Param {
    pub ty: Type,
    pub name: String,
    pub constant: bool,
}

/// The program entry point.
#[derive(Debug, PartialEq)]
pub struct RunBlock {
    pub body: Block,
    pub pos: Position,
}

#[derive(Debug, PartialEq, Default)]
pub struct Block(pub Vec<Statement>);

#[derive(Debug, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub pos: Position,
}

#[derive(Debug, PartialEq)]
pub enum StatementKind {
    Declare {
        ty: Type,
        name: String,
        init: Option<Expr>,
        constant: bool,
        /// Filled by the analyzer when the initializer folds at compile
        /// time; such bindings never get a stack slot.
        comptime: Option<ConstValue>,
    },
    Assign {
        name: String,
        value: Expr,
    },
    AssignIndex {
        array: Expr,
        index: Expr,
        value: Expr,
    },
    AssignMember {
        object: Expr,
        field: String,
        value: Expr,
    },
    If {
        /// The `if` arm followed by any `or` arms, in source order.
        arms: Vec<(Expr, Block)>,
        otherwise: Option<Block>,
    },
    For {
        init: Box<Statement>,
        condition: Expr,
        increment: Box<Statement>,
        body: Block,
    },
    Try {
        body: Block,
        catch_name: String,
        catch_body: Block,
        finally_body: Option<Block>,
    },
    Repeat {
        selector: Expr,
        cases: Vec<(Expr, Block)>,
        fixed: Option<Block>,
    },
    Return(Option<Expr>),
    Expr(Expr),
    Block(Block),
}

/// A folded compile-time constant, retained on the declaration node.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Num(i64),
    Text(String),
    Char(u8),
    Bool(bool),
}

#[derive(Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Position,
    /// None until the semantic pass runs; Some for every node afterwards.
    pub ty: Option<Type>,
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Position) -> Self {
        Self {
            kind,
            pos,
            ty: None,
        }
    }

    /// The checked type. Valid only after semantic analysis.
    pub fn checked_ty(&self) -> &Type {
        self.ty
            .as_ref()
            .expect("expression was not visited by the semantic pass")
    }
}

#[derive(Debug, PartialEq)]
pub enum ExprKind {
    Number {
        value: f64,
        integer: bool,
    },
    Text(String),
    Char(u8),
    Bool(bool),
    Null,
    Identifier(String),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// `@callee[args...]`; the dotted read builtins keep their dotted name
    /// (`num.read`, `text.read`, `char.read`, `bool.read`).
    Call {
        callee: String,
        args: Vec<Expr>,
    },
    /// `parts.len() == exprs.len() + 1` and `formats.len() == exprs.len()`.
    Interpolation {
        parts: Vec<String>,
        exprs: Vec<Expr>,
        formats: Vec<Option<FormatSpec>>,
    },
    Concat {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    ArrayLiteral(Vec<Expr>),
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Member {
        target: Box<Expr>,
        field: String,
    },
    StructLiteral {
        name: String,
        fields: Vec<(String, Expr)>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equals,
    NotEquals,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    LogicAnd,
    LogicOr,
}

impl BinaryOp {
    pub const fn from_operator(op: Operator) -> Option<Self> {
        Some(match op {
            Operator::Plus => Self::Add,
            Operator::Minus => Self::Subtract,
            Operator::Star => Self::Multiply,
            Operator::Slash => Self::Divide,
            Operator::Percent => Self::Modulo,
            Operator::Equals => Self::Equals,
            Operator::NotEquals => Self::NotEquals,
            Operator::Less => Self::Less,
            Operator::LessEqual => Self::LessEqual,
            Operator::Greater => Self::Greater,
            Operator::GreaterEqual => Self::GreaterEqual,
            Operator::And => Self::LogicAnd,
            Operator::Or => Self::LogicOr,
            Operator::Not | Operator::Assign | Operator::Concat => return None,
        })
    }

    pub const fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::Modulo
        )
    }

    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Equals
                | Self::NotEquals
                | Self::Less
                | Self::LessEqual
                | Self::Greater
                | Self::GreaterEqual
        )
    }

    pub const fn is_logical(self) -> bool {
        matches!(self, Self::LogicAnd | Self::LogicOr)
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Equals => "==",
            Self::NotEquals => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::LogicAnd => "&&",
            Self::LogicOr => "||",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Plus,
    Not,
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(match self {
            Self::Negate => "-",
            Self::Plus => "+",
            Self::Not => "!!",
        })
    }
}

impl UnaryOp {
    pub const fn from_operator(op: Operator) -> Option<Self> {
        Some(match op {
            Operator::Minus => Self::Negate,
            Operator::Plus => Self::Plus,
            Operator::Not => Self::Not,
            _ => return None,
        })
    }
}

/// Binding power for the precedence climb, lowest first. `+>>` sits at the
/// additive level but builds a concatenation node rather than a binary op.
pub const fn binary_precedence(op: Operator) -> Option<u8> {
    Some(match op {
        Operator::Or => 1,
        Operator::And => 2,
        Operator::Equals | Operator::NotEquals => 3,
        Operator::Less
        | Operator::LessEqual
        | Operator::Greater
        | Operator::GreaterEqual => 4,
        Operator::Plus | Operator::Minus | Operator::Concat => 5,
        Operator::Star | Operator::Slash | Operator::Percent => 6,
        Operator::Not | Operator::Assign => return None,
    })
}
