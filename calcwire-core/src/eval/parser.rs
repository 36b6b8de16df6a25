//! Recursive-descent parser producing the closed [`Expr`] tree.
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/' | '//' | '%') unary)*
//! unary   := ('+' | '-') unary | power
//! power   := primary ('**' unary)?
//! primary := NUMBER | CONST | FUNC '(' expr (',' expr)* ')' | '(' expr ')'
//! ```
//!
//! `**` is right-associative and binds tighter than a unary operator on its
//! left, so `-2**2` is `-(2**2)` while `2**-1` is `2**(-1)`.

use super::ast::{BinaryOp, Constant, Expr, Function, UnaryOp};
use super::lexer::{Token, TokenKind, tokenize};
use super::EvalError;

/// Maximum height of a parsed tree, and maximum nesting of parentheses.
///
/// Every operator counts, including each link of a flat `1+1+1` chain, so
/// evaluating or dropping any accepted tree stays within a small stack.
pub const MAX_DEPTH: usize = 256;

/// A parsed subtree and its height.
type Node = (Expr, usize);

/// Parse `src` into an expression tree.
///
/// # Errors
/// Returns [`EvalError::Illegal`] for constructs outside the grammar
/// (unknown names, non-whitelisted calls, attribute access, subscripts,
/// strings, foreign operators) and [`EvalError::Syntax`] for malformed input.
pub fn parse(src: &str) -> Result<Expr, EvalError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens, cursor: 0, depth: 0 };
    let (expr, _height) = parser.expr()?;
    match parser.peek().kind {
        TokenKind::Eof => Ok(expr),
        _ => Err(parser.unexpected()),
    }
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // `tokenize` always ends the stream with Eof and the cursor never
        // moves past it.
        &self.tokens[self.cursor.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.cursor += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn enter(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(EvalError::Syntax {
                pos: self.peek().pos,
                msg: format!("expression nested deeper than {MAX_DEPTH} levels"),
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Height of a node whose tallest child is `child` levels high.
    fn grow(&self, child: usize) -> Result<usize, EvalError> {
        let height = child + 1;
        if height > MAX_DEPTH {
            return Err(EvalError::Syntax {
                pos: self.peek().pos,
                msg: format!("expression nested deeper than {MAX_DEPTH} levels"),
            });
        }
        Ok(height)
    }

    fn expr(&mut self) -> Result<Node, EvalError> {
        let (mut lhs, mut height) = self.term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok((lhs, height)),
            };
            self.advance();
            let (rhs, rhs_height) = self.term()?;
            height = self.grow(height.max(rhs_height))?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn term(&mut self) -> Result<Node, EvalError> {
        let (mut lhs, mut height) = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::DoubleSlash => BinaryOp::FloorDiv,
                TokenKind::Percent => BinaryOp::Mod,
                _ => return Ok((lhs, height)),
            };
            self.advance();
            let (rhs, rhs_height) = self.unary()?;
            height = self.grow(height.max(rhs_height))?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Node, EvalError> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            _ => return self.power(),
        };
        self.advance();
        self.enter()?;
        let operand = self.unary();
        self.leave();
        let (operand, height) = operand?;
        Ok((Expr::Unary(op, Box::new(operand)), self.grow(height)?))
    }

    fn power(&mut self) -> Result<Node, EvalError> {
        let (base, base_height) = self.primary()?;
        self.reject_postfix()?;
        if !self.eat(&TokenKind::DoubleStar) {
            return Ok((base, base_height));
        }
        self.enter()?;
        let exponent = self.unary();
        self.leave();
        let (exponent, exponent_height) = exponent?;
        let height = self.grow(base_height.max(exponent_height))?;
        Ok((Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)), height))
    }

    /// Attribute access and subscripts are recognised only to be refused.
    fn reject_postfix(&self) -> Result<(), EvalError> {
        match self.peek().kind {
            TokenKind::Dot => Err(EvalError::Illegal("attribute access".into())),
            TokenKind::LBracket => Err(EvalError::Illegal("subscript".into())),
            _ => Ok(()),
        }
    }

    fn primary(&mut self) -> Result<Node, EvalError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Number(value) => Ok((Expr::Literal(value), 1)),
            TokenKind::Ident(name) => self.identifier(&name),
            TokenKind::LParen => {
                self.enter()?;
                let inner = self.expr();
                self.leave();
                let inner = inner?;
                self.expect_close()?;
                Ok(inner)
            }
            TokenKind::Str => Err(EvalError::Illegal("illegal constant type".into())),
            TokenKind::Eof => Err(EvalError::Syntax {
                pos: token.pos,
                msg: "unexpected end of expression".into(),
            }),
            _ => Err(Self::unexpected_token(&token)),
        }
    }

    fn identifier(&mut self, name: &str) -> Result<Node, EvalError> {
        if self.peek().kind != TokenKind::LParen {
            return Constant::from_name(name)
                .map(|c| (Expr::Constant(c), 1))
                .ok_or_else(|| EvalError::Illegal(format!("unknown symbol {name}")));
        }
        let func = Function::from_name(name)
            .ok_or_else(|| EvalError::Illegal("illegal function call".into()))?;
        self.advance();

        self.enter()?;
        let args = self.arguments();
        self.leave();
        let (args, tallest) = args?;

        let arity = func.arity();
        if !arity.accepts(args.len()) {
            return Err(EvalError::Arity { func: func.name(), expected: arity.to_string(), got: args.len() });
        }
        Ok((Expr::Call(func, args), self.grow(tallest)?))
    }

    /// Call arguments and the height of the tallest one.
    fn arguments(&mut self) -> Result<(Vec<Expr>, usize), EvalError> {
        let mut args = Vec::new();
        let mut tallest = 0;
        if self.eat(&TokenKind::RParen) {
            return Ok((args, tallest));
        }
        loop {
            let (arg, height) = self.expr()?;
            tallest = tallest.max(height);
            args.push(arg);
            if self.eat(&TokenKind::Comma) {
                // Trailing comma before ')' is accepted.
                if self.eat(&TokenKind::RParen) {
                    return Ok((args, tallest));
                }
                continue;
            }
            self.expect_close()?;
            return Ok((args, tallest));
        }
    }

    fn expect_close(&mut self) -> Result<(), EvalError> {
        if self.eat(&TokenKind::RParen) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> EvalError {
        Self::unexpected_token(self.peek())
    }

    fn unexpected_token(token: &Token) -> EvalError {
        match &token.kind {
            TokenKind::Dot => EvalError::Illegal("attribute access".into()),
            TokenKind::LBracket => EvalError::Illegal("subscript".into()),
            TokenKind::Str => EvalError::Illegal("illegal constant type".into()),
            TokenKind::Other(c) => EvalError::Illegal(format!("unsupported operator '{c}'")),
            TokenKind::Eof => EvalError::Syntax {
                pos: token.pos,
                msg: "unexpected end of expression".into(),
            },
            kind => EvalError::Syntax {
                pos: token.pos,
                msg: format!("unexpected token {kind:?}"),
            },
        }
    }
}
