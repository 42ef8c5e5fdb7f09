//! Expression parsing and evaluation.
//!
//! Expressions are parsed straight off the interpreter's token stream.
//! Operands are resolved as soon as they are read (variables looked up,
//! functions called) so side effects happen left to right.  The operators
//! form a small tree that is evaluated once the expression ends; both sides
//! of `&&` and `||` are always evaluated.
//!
//! Operator precedence (lowest → highest), all left-associative:
//!   `||`  →  `&&`  →  `== != < <= > >=`  →  `+ -`  →  `* / %`  →  unary `- !`

use std::fmt;

use smallvec::SmallVec;
use thiserror::Error;

use crate::source::LineCursor;
use super::{
    error::ErrorKind,
    host::Args,
    interp::{Exec, Interpreter},
    lexer::Token,
    value::{OpError, Value},
};

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinOp {
    pub fn from_token(tok: &Token) -> Option<BinOp> {
        Some(match tok {
            Token::Or => BinOp::Or,
            Token::And => BinOp::And,
            Token::Eq => BinOp::Eq,
            Token::Ne => BinOp::Ne,
            Token::Lt => BinOp::Lt,
            Token::Le => BinOp::Le,
            Token::Gt => BinOp::Gt,
            Token::Ge => BinOp::Ge,
            Token::Plus => BinOp::Add,
            Token::Minus => BinOp::Sub,
            Token::Star => BinOp::Mul,
            Token::Slash => BinOp::Div,
            Token::Percent => BinOp::Rem,
            _ => return None,
        })
    }

    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 1,
            BinOp::And => 2,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 5,
            BinOp::Add | BinOp::Sub => 10,
            BinOp::Mul | BinOp::Div | BinOp::Rem => 20,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Or => "||",
            BinOp::And => "&&",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
        }
    }

    pub fn apply(self, l: &Value, r: &Value) -> Result<Value, OpError> {
        match self {
            BinOp::Or => l.logic_or(r),
            BinOp::And => l.logic_and(r),
            BinOp::Eq => l.cmp_eq(r),
            BinOp::Ne => l.cmp_ne(r),
            BinOp::Lt => l.cmp_lt(r),
            BinOp::Le => l.cmp_le(r),
            BinOp::Gt => l.cmp_gt(r),
            BinOp::Ge => l.cmp_ge(r),
            BinOp::Add => l.arith_add(r),
            BinOp::Sub => l.arith_sub(r),
            BinOp::Mul => l.arith_mul(r),
            BinOp::Div => l.arith_div(r),
            BinOp::Rem => l.arith_rem(r),
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    fn apply(self, v: &Value) -> Result<Value, OpError> {
        match self {
            UnaryOp::Neg => v.arith_neg(),
            UnaryOp::Not => v.logic_not(),
        }
    }
}

/// One node of an expression tree.  `Value(None)` is an operand that
/// produced nothing, such as a call to a host function with no result.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    Value(Option<Value>),
    Op(BinOp, Box<ExprNode>, Box<ExprNode>),
}

impl ExprNode {
    /// Evaluate the tree bottom-up.
    pub fn eval(self) -> Result<Option<Value>, EvalError> {
        match self {
            ExprNode::Value(v) => Ok(v),
            ExprNode::Op(op, l, r) => {
                let l = l.eval()?;
                let r = r.eval()?;
                match (l, r) {
                    (Some(l), Some(r)) => op.apply(&l, &r).map(Some).map_err(EvalError::Op),
                    _ => Err(EvalError::MissingOperand(op)),
                }
            }
        }
    }
}

/// Failure while evaluating an [`ExprNode`] tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Op(#[from] OpError),
    #[error("Operator {0} applied to an expression without a value")]
    MissingOperand(BinOp),
}

/// `true` for tokens that begin an operand.
fn starts_operand(tok: &Token) -> bool {
    matches!(
        tok,
        Token::Int(_)
            | Token::Double(_)
            | Token::Str(_)
            | Token::Null
            | Token::Ident(_)
            | Token::Call(_)
            | Token::Array(_)
            | Token::LParen
    )
}

// ── Parser ────────────────────────────────────────────────────────────────────

impl<C: LineCursor> Interpreter<C> {
    /// Parse and evaluate the expression starting at the current token.
    ///
    /// Stops at the first token that cannot continue the expression and
    /// leaves it as the current token.
    pub(super) fn parse_expression(&mut self) -> Exec<Option<Value>> {
        let tree = self.parse_binary(1)?;
        tree.eval()
            .map_err(|e| self.fail(ErrorKind::Semantic, e.to_string()))
    }

    /// Parse an expression that must produce a value.
    pub(super) fn parse_value(&mut self, what: &str) -> Exec<Value> {
        match self.parse_expression()? {
            Some(v) => Ok(v),
            None => Err(self.fail(ErrorKind::Semantic, format!("{what} has no value"))),
        }
    }

    fn parse_binary(&mut self, min_prec: u8) -> Exec<ExprNode> {
        let mut left = self.parse_unary()?;
        loop {
            if starts_operand(&self.tok) {
                return Err(self.fail(ErrorKind::Syntax, "Expected operator"));
            }
            let Some(op) = BinOp::from_token(&self.tok) else {
                break;
            };
            if op.precedence() < min_prec {
                break;
            }
            self.advance()?;
            let right = self.parse_binary(op.precedence() + 1)?;
            left = ExprNode::Op(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// Prefix operators followed by one operand.
    fn parse_unary(&mut self) -> Exec<ExprNode> {
        let mut prefix: SmallVec<[UnaryOp; 2]> = SmallVec::new();
        loop {
            match self.tok {
                Token::Minus => prefix.push(UnaryOp::Neg),
                Token::Bang => prefix.push(UnaryOp::Not),
                _ => break,
            }
            self.advance()?;
        }
        if BinOp::from_token(&self.tok).is_some() {
            return Err(self.fail(ErrorKind::Syntax, "Expected expression"));
        }
        if !starts_operand(&self.tok) {
            return Err(self.fail(ErrorKind::Syntax, "Missing expression"));
        }

        let mut value = self.parse_operand()?;
        for op in prefix.iter().rev() {
            let Some(v) = value else {
                return Err(self.fail(
                    ErrorKind::Semantic,
                    "Unary operator applied to an expression without a value",
                ));
            };
            value = Some(
                op.apply(&v)
                    .map_err(|e| self.fail(ErrorKind::Semantic, e.to_string()))?,
            );
        }
        Ok(ExprNode::Value(value))
    }

    fn parse_operand(&mut self) -> Exec<Option<Value>> {
        let value = match self.tok.clone() {
            Token::Int(n) => Some(Value::Int(n)),
            Token::Double(x) => Some(Value::Double(x)),
            Token::Str(s) => Some(Value::Str(s)),
            Token::Null => Some(Value::null()),
            Token::Ident(name) => Some(self.read_var(&name)?),
            Token::Call(name) => {
                self.advance()?;
                let args = self.call_arguments()?;
                self.call(&name, args)?
            }
            Token::Array(name) => {
                let index = self.index_expression()?;
                Some(self.read_index(&name, &index)?)
            }
            Token::LParen => {
                self.advance()?;
                let v = self.parse_expression()?;
                if self.tok != Token::RParen {
                    return Err(self.fail(ErrorKind::Syntax, "Expected ')'"));
                }
                v
            }
            _ => return Err(self.fail(ErrorKind::Syntax, "Missing expression")),
        };
        self.advance()?;
        Ok(value)
    }

    /// Evaluate call arguments.  Expects the current token to be `(` and
    /// leaves it on the closing `)`.
    pub(super) fn call_arguments(&mut self) -> Exec<Args> {
        self.advance()?;
        let mut args = Args::new();
        if self.tok == Token::RParen {
            return Ok(args);
        }
        loop {
            args.push(self.parse_value("Function argument")?);
            match self.tok {
                Token::Comma => self.advance()?,
                Token::RParen => return Ok(args),
                _ => return Err(self.fail(ErrorKind::Syntax, "Expected ',' or ')'")),
            }
        }
    }

    /// Evaluate `[expr]` after an array name.  Expects the current token to be
    /// the name and leaves it on the closing `]`.
    pub(super) fn index_expression(&mut self) -> Exec<Value> {
        self.advance()?;
        self.advance()?;
        let index = self.parse_value("Array index")?;
        if self.tok != Token::RBracket {
            return Err(self.fail(ErrorKind::Syntax, "Expected ']'"));
        }
        Ok(index)
    }

    /// Evaluate an `if`/`while` condition.
    pub(super) fn condition(&mut self, what: &str) -> Exec<bool> {
        let value = self.parse_expression()?;
        match value.as_ref().and_then(Value::truth) {
            Some(b) => Ok(b),
            None => Err(self.fail(
                ErrorKind::Semantic,
                format!("{what} condition needs to be integer"),
            )),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
