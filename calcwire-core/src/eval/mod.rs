//! Restricted arithmetic evaluator.
//!
//! Untrusted expressions are parsed into a closed [`Expr`] tree and then
//! evaluated post-order. There is no name lookup at evaluation time: the only
//! names that can appear in a tree are the constants `pi`, `e` and the nine
//! functions `sin cos tan sqrt log exp max min abs`, all resolved by the
//! parser. Anything else is rejected before evaluation begins.
//!
//! All arithmetic is `f64`. Division by zero, domain errors, and results
//! that leave the finite range are reported as [`EvalError`]s; a successful
//! evaluation always yields a finite number.

pub mod ast;
pub mod lexer;
pub mod parser;

use thiserror::Error;

pub use ast::{BinaryOp, Constant, Expr, Function, UnaryOp};
pub use parser::parse;

/// Why an expression could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// The input is not well-formed.
    #[error("syntax error at offset {pos}: {msg}")]
    Syntax {
        /// Byte offset of the offending token.
        pos: usize,
        /// What went wrong.
        msg: String,
    },

    /// The input uses a construct outside the permitted grammar.
    #[error("illegal expression: {0}")]
    Illegal(String),

    /// A function was called with the wrong number of arguments.
    #[error("{func}() takes {expected} argument(s), got {got}")]
    Arity {
        /// Function name.
        func: &'static str,
        /// Accepted argument counts.
        expected: String,
        /// Arguments supplied.
        got: usize,
    },

    /// Division, floor division, modulo, or a negative power of zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Argument outside a function's domain, or an undefined result.
    #[error("math domain error in {0}")]
    Domain(&'static str),

    /// Result too large to represent.
    #[error("numeric result out of range")]
    Overflow,
}

/// Parse and evaluate `src`.
///
/// Pure: the same input always yields the same value or the same error.
///
/// # Errors
/// Any [`EvalError`] from parsing or evaluation.
pub fn evaluate(src: &str) -> Result<f64, EvalError> {
    parse(src)?.eval()
}

impl Expr {
    /// Evaluate this tree, operands before operators.
    ///
    /// # Errors
    /// Returns an [`EvalError`] on division by zero, domain errors, or
    /// non-finite results.
    pub fn eval(&self) -> Result<f64, EvalError> {
        match self {
            Expr::Literal(v) => finite(*v, "literal"),
            Expr::Constant(c) => Ok(c.value()),
            Expr::Unary(op, operand) => {
                let v = operand.eval()?;
                Ok(match op {
                    UnaryOp::Neg => -v,
                    UnaryOp::Pos => v,
                })
            }
            Expr::Binary(op, lhs, rhs) => {
                let a = lhs.eval()?;
                let b = rhs.eval()?;
                apply_binary(*op, a, b)
            }
            Expr::Call(func, args) => {
                let values = args.iter().map(Expr::eval).collect::<Result<Vec<_>, _>>()?;
                apply_function(*func, &values)
            }
        }
    }
}

fn apply_binary(op: BinaryOp, a: f64, b: f64) -> Result<f64, EvalError> {
    let (value, context) = match op {
        BinaryOp::Add => (a + b, "addition"),
        BinaryOp::Sub => (a - b, "subtraction"),
        BinaryOp::Mul => (a * b, "multiplication"),
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            (a / b, "division")
        }
        BinaryOp::FloorDiv => (floor_divmod(a, b)?.0, "floor division"),
        BinaryOp::Mod => (floor_divmod(a, b)?.1, "modulo"),
        BinaryOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            (a.powf(b), "power")
        }
    };
    finite(value, context)
}

/// Floor division and modulo where the remainder takes the sign of the
/// divisor, rounded the same way for both so `a == q * b + r` holds.
fn floor_divmod(a: f64, b: f64) -> Result<(f64, f64), EvalError> {
    if b == 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    let mut rem = a % b;
    let mut div = (a - rem) / b;
    if rem != 0.0 {
        if (b < 0.0) != (rem < 0.0) {
            rem += b;
            div -= 1.0;
        }
    } else {
        rem = 0.0_f64.copysign(b);
    }
    let quot = if div != 0.0 {
        let floored = div.floor();
        if div - floored > 0.5 { floored + 1.0 } else { floored }
    } else {
        0.0_f64.copysign(a / b)
    };
    Ok((quot, rem))
}

fn apply_function(func: Function, args: &[f64]) -> Result<f64, EvalError> {
    let arity = func.arity();
    if !arity.accepts(args.len()) {
        return Err(EvalError::Arity { func: func.name(), expected: arity.to_string(), got: args.len() });
    }
    let x = args[0];
    let value = match func {
        Function::Sin => x.sin(),
        Function::Cos => x.cos(),
        Function::Tan => x.tan(),
        Function::Sqrt => {
            if x < 0.0 {
                return Err(EvalError::Domain("sqrt"));
            }
            x.sqrt()
        }
        Function::Log => {
            if x <= 0.0 {
                return Err(EvalError::Domain("log"));
            }
            match args.get(1) {
                None => x.ln(),
                Some(&base) if base <= 0.0 => return Err(EvalError::Domain("log")),
                Some(&base) if base == 1.0 => return Err(EvalError::DivisionByZero),
                Some(&base) => x.ln() / base.ln(),
            }
        }
        Function::Exp => x.exp(),
        Function::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        Function::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
        Function::Abs => x.abs(),
    };
    finite(value, func.name())
}

fn finite(value: f64, context: &'static str) -> Result<f64, EvalError> {
    if value.is_nan() {
        Err(EvalError::Domain(context))
    } else if value.is_infinite() {
        Err(EvalError::Overflow)
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(src: &str, expected: f64) {
        let got = evaluate(src).unwrap_or_else(|e| panic!("{src}: {e}"));
        assert!((got - expected).abs() < 1e-9, "{src}: expected {expected}, got {got}");
    }

    #[test]
    fn reference_expressions() {
        approx("2 * (4 + 6) / 5", 4.0);
        approx("sqrt(9) + tan(0)", 3.0);
        approx("2**10", 1024.0);
        approx("5**2 + 3 * log(e)", 28.0);
    }

    #[test]
    fn constants_and_functions() {
        approx("sin(pi / 2)", 1.0);
        approx("cos(0)", 1.0);
        approx("exp(0)", 1.0);
        approx("abs(-3.5)", 3.5);
        approx("max(1, 7, 3)", 7.0);
        approx("min(4)", 4.0);
        approx("log(8, 2)", 3.0);
    }

    #[test]
    fn unary_and_power_interaction() {
        approx("-2**2", -4.0);
        approx("2**-1", 0.5);
        approx("+-+3", -3.0);
        approx("2**3**2", 512.0);
    }

    #[test]
    fn floor_division_and_modulo_follow_divisor_sign() {
        approx("7 // 2", 3.0);
        approx("-7 // 2", -4.0);
        approx("7 % 3", 1.0);
        approx("-7 % 3", 2.0);
        approx("7 % -3", -2.0);
        approx("5.5 % 2", 1.5);
        approx("1 // 0.1", 9.0);
    }

    #[test]
    fn division_by_zero_is_reported() {
        assert_eq!(evaluate("1 / 0"), Err(EvalError::DivisionByZero));
        assert_eq!(evaluate("1 // 0"), Err(EvalError::DivisionByZero));
        assert_eq!(evaluate("1 % 0"), Err(EvalError::DivisionByZero));
        assert_eq!(evaluate("0 ** -1"), Err(EvalError::DivisionByZero));
        assert_eq!(evaluate("log(2, 1)"), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn domain_and_range_errors_are_reported() {
        assert_eq!(evaluate("sqrt(-1)"), Err(EvalError::Domain("sqrt")));
        assert_eq!(evaluate("log(0)"), Err(EvalError::Domain("log")));
        assert_eq!(evaluate("log(4, -2)"), Err(EvalError::Domain("log")));
        assert_eq!(evaluate("(-8) ** (1/3)"), Err(EvalError::Domain("power")));
        assert_eq!(evaluate("exp(1000)"), Err(EvalError::Overflow));
        assert_eq!(evaluate("10.0 ** 400"), Err(EvalError::Overflow));
        assert_eq!(evaluate("1e999"), Err(EvalError::Overflow));
    }

    #[test]
    fn evaluation_is_deterministic() {
        for src in ["sin(1) * cos(2)", "x", "1 / 0", "2 ** 0.5"] {
            assert_eq!(evaluate(src), evaluate(src));
        }
    }

    #[test]
    fn error_messages_carry_classification() {
        assert_eq!(
            evaluate("os").expect_err("unknown name").to_string(),
            "illegal expression: unknown symbol os"
        );
        assert_eq!(
            evaluate("sqrt(1, 2)").expect_err("bad arity").to_string(),
            "sqrt() takes exactly 1 argument(s), got 2"
        );
    }
}
