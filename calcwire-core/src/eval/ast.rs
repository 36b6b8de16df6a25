//! Closed syntax tree for the arithmetic grammar.
//!
//! Every node kind the evaluator can execute is listed here. Identifiers are
//! resolved to [`Constant`] or [`Function`] while parsing, so a tree that
//! exists is already known to reference nothing outside the whitelist.

use std::fmt;

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal.
    Literal(f64),
    /// Named constant.
    Constant(Constant),
    /// Unary operator applied to an operand.
    Unary(UnaryOp, Box<Expr>),
    /// Binary operator applied to two operands.
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// Whitelisted function applied to arguments.
    Call(Function, Vec<Expr>),
}

/// Named constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    /// π
    Pi,
    /// Base of the natural logarithm.
    E,
}

impl Constant {
    /// Resolve an identifier to a constant.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pi" => Some(Self::Pi),
            "e" => Some(Self::E),
            _ => None,
        }
    }

    /// Exact `f64` value.
    #[must_use]
    pub fn value(self) -> f64 {
        match self {
            Self::Pi => std::f64::consts::PI,
            Self::E => std::f64::consts::E,
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `+x`
    Pos,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `//`
    FloorDiv,
    /// `%`
    Mod,
    /// `**`
    Pow,
}

/// The complete set of callable functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// Sine (radians).
    Sin,
    /// Cosine (radians).
    Cos,
    /// Tangent (radians).
    Tan,
    /// Square root.
    Sqrt,
    /// Natural logarithm, or `log(x, base)`.
    Log,
    /// `e**x`
    Exp,
    /// Largest argument.
    Max,
    /// Smallest argument.
    Min,
    /// Absolute value.
    Abs,
}

/// Accepted argument counts for a [`Function`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    /// Minimum number of arguments.
    pub min: usize,
    /// Maximum number of arguments, `None` when unbounded.
    pub max: Option<usize>,
}

impl Arity {
    /// Whether `n` arguments are acceptable.
    #[must_use]
    pub fn accepts(self, n: usize) -> bool {
        n >= self.min && self.max.is_none_or(|max| n <= max)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "exactly {max}"),
            Some(max) => write!(f, "{} to {max}", self.min),
            None => write!(f, "at least {}", self.min),
        }
    }
}

impl Function {
    /// Resolve an identifier to a whitelisted function.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            "sqrt" => Self::Sqrt,
            "log" => Self::Log,
            "exp" => Self::Exp,
            "max" => Self::Max,
            "min" => Self::Min,
            "abs" => Self::Abs,
            _ => return None,
        })
    }

    /// Source-level name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Sqrt => "sqrt",
            Self::Log => "log",
            Self::Exp => "exp",
            Self::Max => "max",
            Self::Min => "min",
            Self::Abs => "abs",
        }
    }

    /// Argument counts this function accepts.
    #[must_use]
    pub fn arity(self) -> Arity {
        match self {
            Self::Log => Arity { min: 1, max: Some(2) },
            Self::Max | Self::Min => Arity { min: 1, max: None },
            _ => Arity { min: 1, max: Some(1) },
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
