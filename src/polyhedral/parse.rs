//! Reader for affine expressions and constraints.
//!
//! Parses the constraint part of the textual grammar: linear expressions
//! over declared dimensions and parameters, chained comparisons
//! (`0 <= i < N`), and `=`/`==` equalities.  Tuple and delimiter
//! structure is handled by the text layer; this module only sees the
//! pieces between `and`s.

use crate::utils::errors::{ParseError, ParseErrorKind, PolyResult};

use super::constraint::Constraint;
use super::expr::AffineExpr;

/// Name environment a constraint is read under.
pub(crate) struct VarEnv<'a> {
    /// Dimension names in variable-index order (map layout: inputs then
    /// outputs).  Empty names never match an identifier.
    pub dims: &'a [String],
    pub params: &'a [String],
}

impl<'a> VarEnv<'a> {
    fn n_dim(&self) -> usize {
        self.dims.len()
    }

    fn n_param(&self) -> usize {
        self.params.len()
    }

    fn lookup(&self, name: &str) -> Option<AffineExpr> {
        if let Some(i) = self.dims.iter().position(|d| !d.is_empty() && d == name) {
            return Some(AffineExpr::var(i, self.n_dim(), self.n_param()));
        }
        if let Some(i) = self.params.iter().position(|p| p == name) {
            return Some(AffineExpr::param(i, self.n_dim(), self.n_param()));
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Int(i64),
    Plus,
    Minus,
    Star,
    LParen,
    RParen,
    Le,
    Lt,
    Ge,
    Gt,
    Eq,
}

fn tokenize(src: &str) -> PolyResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let bytes = src.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    i += 2;
                } else {
                    i += 1;
                }
                tokens.push(Token::Eq);
            }
            '0'..='9' => {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let text = &src[start..i];
                let value = text.parse::<i64>().map_err(|_| {
                    ParseError::new(ParseErrorKind::UnexpectedToken, "integer overflow", src)
                })?;
                tokens.push(Token::Int(value));
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                tokens.push(Token::Ident(src[start..i].to_string()));
            }
            _ => {
                return Err(ParseError::new(
                    ParseErrorKind::UnexpectedToken,
                    format!("unexpected character `{}`", c),
                    src,
                )
                .into())
            }
        }
    }
    Ok(tokens)
}

struct ExprParser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    env: &'a VarEnv<'a>,
    input: &'a str,
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn err(&self, kind: ParseErrorKind, message: impl Into<String>) -> crate::utils::PolyschedError {
        ParseError::new(kind, message, self.input).into()
    }

    fn expr(&mut self) -> PolyResult<AffineExpr> {
        let mut acc = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    acc = acc.add(&self.term()?);
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    acc = acc.sub(&self.term()?);
                }
                _ => return Ok(acc),
            }
        }
    }

    fn term(&mut self) -> PolyResult<AffineExpr> {
        let mut acc = self.factor()?;
        while self.peek() == Some(&Token::Star) {
            self.pos += 1;
            let rhs = self.factor()?;
            acc = if let Some(c) = acc.as_constant() {
                rhs.scale(c)
            } else if let Some(c) = rhs.as_constant() {
                acc.scale(c)
            } else {
                return Err(self.err(
                    ParseErrorKind::NonAffine,
                    "product of two non-constant expressions",
                ));
            };
        }
        Ok(acc)
    }

    fn factor(&mut self) -> PolyResult<AffineExpr> {
        match self.bump() {
            Some(Token::Int(v)) => Ok(AffineExpr::constant(
                v,
                self.env.n_dim(),
                self.env.n_param(),
            )),
            Some(Token::Ident(name)) => self.env.lookup(&name).ok_or_else(|| {
                self.err(
                    ParseErrorKind::UnknownIdentifier,
                    format!("`{}` is neither a dimension nor a parameter", name),
                )
            }),
            Some(Token::Minus) => Ok(self.factor()?.neg()),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.err(ParseErrorKind::MissingDelimiter, "missing `)`")),
                }
            }
            Some(t) => Err(self.err(
                ParseErrorKind::UnexpectedToken,
                format!("unexpected token {:?}", t),
            )),
            None => Err(self.err(ParseErrorKind::Empty, "expected an expression")),
        }
    }
}

/// Parse a standalone affine expression (no comparison operator).
pub(crate) fn parse_expr(src: &str, env: &VarEnv) -> PolyResult<AffineExpr> {
    let mut p = ExprParser {
        tokens: tokenize(src)?,
        pos: 0,
        env,
        input: src,
    };
    let e = p.expr()?;
    if p.pos != p.tokens.len() {
        return Err(p.err(ParseErrorKind::UnexpectedToken, "trailing input"));
    }
    Ok(e)
}

/// Parse one (possibly chained) comparison, e.g. `0 <= i < N`, appending
/// one constraint per operator.
pub(crate) fn parse_constraint(
    src: &str,
    env: &VarEnv,
    out: &mut Vec<Constraint>,
) -> PolyResult<()> {
    let mut p = ExprParser {
        tokens: tokenize(src)?,
        pos: 0,
        env,
        input: src,
    };
    let mut lhs = p.expr()?;
    let mut n_ops = 0;
    while let Some(tok) = p.peek().cloned() {
        let rhs = match tok {
            Token::Le | Token::Lt | Token::Ge | Token::Gt | Token::Eq => {
                p.pos += 1;
                p.expr()?
            }
            _ => {
                return Err(p.err(
                    ParseErrorKind::UnexpectedToken,
                    "expected a comparison operator",
                ))
            }
        };
        // a <= b  ->  b - a >= 0; strict forms tighten by one.
        let c = match tok {
            Token::Le => Constraint::ge_zero(rhs.sub(&lhs)),
            Token::Lt => {
                let mut e = rhs.sub(&lhs);
                e.constant -= 1;
                Constraint::ge_zero(e)
            }
            Token::Ge => Constraint::ge_zero(lhs.sub(&rhs)),
            Token::Gt => {
                let mut e = lhs.sub(&rhs);
                e.constant -= 1;
                Constraint::ge_zero(e)
            }
            Token::Eq => Constraint::eq_zero(lhs.sub(&rhs)),
            _ => unreachable!(),
        };
        out.push(c);
        n_ops += 1;
        lhs = rhs;
    }
    if n_ops == 0 {
        return Err(p.err(
            ParseErrorKind::UnexpectedToken,
            "constraint without a comparison operator",
        ));
    }
    Ok(())
}

/// True when `src` is a bare identifier.
pub(crate) fn is_identifier(src: &str) -> bool {
    let src = src.trim();
    let mut chars = src.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
