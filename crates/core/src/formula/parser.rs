//! Recursive-descent parser for admin pricing formulas.
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('+' | '-') unary | primary
//! primary := number | variable | '(' expr ')'
//! ```
//!
//! Identifiers are resolved against the whitelist of the formula kind while
//! parsing, so an unknown name never reaches evaluation.
//!
//! Parsing and evaluation both recurse over the tree, so its height is capped:
//! nesting through `(` or unary signs stops at [`MAX_NESTING`], and operator
//! chains are bounded by [`MAX_TOKENS`].

use super::lexer::{Token, TokenKind};
use super::{FormulaError, FormulaKind, Variable};

pub const MAX_NESTING: usize = 64;
pub const MAX_TOKENS: usize = 512;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(Variable),
    Negate(Box<Expr>),
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
}

impl Expr {
    pub fn visit_variables(&self, visit: &mut impl FnMut(Variable)) {
        match self {
            Self::Number(_) => {}
            Self::Variable(variable) => visit(*variable),
            Self::Negate(inner) => inner.visit_variables(visit),
            Self::Binary { left, right, .. } => {
                left.visit_variables(visit);
                right.visit_variables(visit);
            }
        }
    }
}

pub fn parse(tokens: &[Token], kind: FormulaKind) -> Result<Expr, FormulaError> {
    if tokens.is_empty() {
        return Err(FormulaError::Empty);
    }
    if tokens.len() > MAX_TOKENS {
        return Err(FormulaError::TooLong { tokens: tokens.len(), limit: MAX_TOKENS });
    }

    let mut parser = Parser { tokens, cursor: 0, depth: 0, kind };
    let expr = parser.expression()?;

    if let Some(token) = parser.peek() {
        return Err(FormulaError::UnexpectedToken {
            found: token.kind.describe(),
            expected: "an operator or end of formula",
            position: token.position,
        });
    }

    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Token],
    cursor: usize,
    depth: usize,
    kind: FormulaKind,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.cursor)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.cursor);
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    /// Runs `parse_nested` one level deeper, refusing past [`MAX_NESTING`].
    fn nested(
        &mut self,
        position: usize,
        parse_nested: impl FnOnce(&mut Self) -> Result<Expr, FormulaError>,
    ) -> Result<Expr, FormulaError> {
        if self.depth >= MAX_NESTING {
            return Err(FormulaError::TooDeeplyNested { position, limit: MAX_NESTING });
        }
        self.depth += 1;
        let result = parse_nested(self);
        self.depth -= 1;
        result
    }

    fn expression(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.term()?;

        while let Some(token) = self.peek() {
            let op = match token.kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.cursor += 1;
            let right = self.term()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }

        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.unary()?;

        while let Some(token) = self.peek() {
            let op = match token.kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => break,
            };
            self.cursor += 1;
            let right = self.unary()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }

        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        let Some(token) = self.peek() else {
            return self.primary();
        };

        match token.kind {
            TokenKind::Minus => {
                self.cursor += 1;
                let inner = self.nested(token.position, Self::unary)?;
                Ok(Expr::Negate(Box::new(inner)))
            }
            TokenKind::Plus => {
                self.cursor += 1;
                self.nested(token.position, Self::unary)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        let Some(token) = self.advance() else {
            return Err(FormulaError::UnexpectedEnd { expected: "a number, variable or `(`" });
        };

        match &token.kind {
            TokenKind::Number(value) => Ok(Expr::Number(*value)),
            TokenKind::Identifier(name) => {
                let variable = Variable::from_name(name)
                    .filter(|variable| self.kind.allows(*variable))
                    .ok_or_else(|| FormulaError::UnknownVariable {
                        name: name.clone(),
                        position: token.position,
                    })?;
                Ok(Expr::Variable(variable))
            }
            TokenKind::LeftParen => {
                let inner = self.nested(token.position, Self::expression)?;
                match self.advance() {
                    Some(Token { kind: TokenKind::RightParen, .. }) => Ok(inner),
                    Some(other) => Err(FormulaError::UnexpectedToken {
                        found: other.kind.describe(),
                        expected: "`)`",
                        position: other.position,
                    }),
                    None => Err(FormulaError::UnexpectedEnd { expected: "`)`" }),
                }
            }
            other => Err(FormulaError::UnexpectedToken {
                found: other.describe(),
                expected: "a number, variable or `(`",
                position: token.position,
            }),
        }
    }
}
