//! Expression parsing and structural equivalence.
//!
//! Expressions are parsed into a small AST and normalized into a canonical
//! sum-of-products form: products are distributed over sums, like terms are
//! collected, factors are sorted, and small natural-number powers are
//! expanded. Two expressions are equivalent iff their canonical forms agree,
//! which makes the comparison insensitive to operand order, grouping, and
//! implicit multiplication.

use std::collections::{BTreeMap, BTreeSet};
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("unexpected character '{found}' at position {pos}")]
    UnexpectedChar { found: char, pos: usize },
    #[error("invalid numeric literal '{literal}'")]
    InvalidNumber { literal: String },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected token at position {pos}")]
    UnexpectedToken { pos: usize },
    #[error("unbalanced parenthesis at position {pos}")]
    UnbalancedParen { pos: usize },
    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },
    #[error(
        "parameters do not match expression symbols (missing: {missing:?}, extra: {extra:?})"
    )]
    ParameterMismatch {
        missing: Vec<String>,
        extra: Vec<String>,
    },
}

const KNOWN_FUNCTIONS: [&str; 3] = ["cos", "sin", "exp"];

/// Parsed expression tree. Subtraction is `Add` with a negated operand and
/// division is `Mul` with a `-1` power, so the canonicalizer only ever sees
/// four node shapes plus leaves.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Sym(String),
    Add(Vec<Expr>),
    Mul(Vec<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Call(String, Box<Expr>),
}

impl Expr {
    pub fn parse(input: &str) -> Result<Expr, ExprError> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_sum()?;
        match parser.peek() {
            None => Ok(expr),
            Some(tok) => Err(ExprError::UnexpectedToken { pos: tok.pos }),
        }
    }

    /// All symbol names occurring in the expression.
    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Num(_) => {}
            Expr::Sym(s) => {
                out.insert(s.clone());
            }
            Expr::Add(es) | Expr::Mul(es) => {
                for e in es {
                    e.collect_symbols(out);
                }
            }
            Expr::Pow(b, e) => {
                b.collect_symbols(out);
                e.collect_symbols(out);
            }
            Expr::Call(_, a) => a.collect_symbols(out),
        }
    }

    pub fn canonical(&self) -> CanonExpr {
        canon(self)
    }

    /// Algebraic identity: the difference of the two expressions simplifies
    /// to zero.
    pub fn equivalent(&self, other: &Expr) -> bool {
        self.canonical().approx_eq(&other.canonical())
    }
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    DoubleStar,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => {
                tokens.push(Token { kind: TokenKind::Plus, pos: i });
                i += 1;
            }
            '-' => {
                tokens.push(Token { kind: TokenKind::Minus, pos: i });
                i += 1;
            }
            '*' => {
                if i + 1 < chars.len() && chars[i + 1] == '*' {
                    tokens.push(Token { kind: TokenKind::DoubleStar, pos: i });
                    i += 2;
                } else {
                    tokens.push(Token { kind: TokenKind::Star, pos: i });
                    i += 1;
                }
            }
            '/' => {
                tokens.push(Token { kind: TokenKind::Slash, pos: i });
                i += 1;
            }
            '(' => {
                tokens.push(Token { kind: TokenKind::LParen, pos: i });
                i += 1;
            }
            ')' => {
                tokens.push(Token { kind: TokenKind::RParen, pos: i });
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // An exponent part only counts if a digit actually follows,
                // so `4epsilon` stays a literal times a symbol.
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| ExprError::InvalidNumber { literal: literal.clone() })?;
                tokens.push(Token { kind: TokenKind::Num(value), pos: start });
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                tokens.push(Token { kind: TokenKind::Ident(name), pos: start });
            }
            other => return Err(ExprError::UnexpectedChar { found: other, pos: i }),
        }
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser (precedence climbing; juxtaposition is implicit multiplication)
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn parse_sum(&mut self) -> Result<Expr, ExprError> {
        let mut terms = vec![self.parse_product()?];
        while let Some(tok) = self.peek() {
            match tok.kind {
                TokenKind::Plus => {
                    self.bump();
                    terms.push(self.parse_product()?);
                }
                TokenKind::Minus => {
                    self.bump();
                    let rhs = self.parse_product()?;
                    terms.push(Expr::Mul(vec![Expr::Num(-1.0), rhs]));
                }
                _ => break,
            }
        }
        if terms.len() == 1 {
            Ok(terms.pop().unwrap())
        } else {
            Ok(Expr::Add(terms))
        }
    }

    fn parse_product(&mut self) -> Result<Expr, ExprError> {
        let mut factors = vec![self.parse_unary()?];
        loop {
            match self.peek().map(|t| t.kind.clone()) {
                Some(TokenKind::Star) => {
                    self.bump();
                    factors.push(self.parse_unary()?);
                }
                Some(TokenKind::Slash) => {
                    self.bump();
                    let rhs = self.parse_unary()?;
                    factors.push(Expr::Pow(Box::new(rhs), Box::new(Expr::Num(-1.0))));
                }
                // Implicit multiplication: `2 epsilon`, `2(x + 1)`.
                Some(TokenKind::Num(_)) | Some(TokenKind::Ident(_)) | Some(TokenKind::LParen) => {
                    factors.push(self.parse_unary()?);
                }
                _ => break,
            }
        }
        if factors.len() == 1 {
            Ok(factors.pop().unwrap())
        } else {
            Ok(Expr::Mul(factors))
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if let Some(tok) = self.peek() {
            if tok.kind == TokenKind::Minus {
                self.bump();
                let inner = self.parse_unary()?;
                return Ok(Expr::Mul(vec![Expr::Num(-1.0), inner]));
            }
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, ExprError> {
        let base = self.parse_primary()?;
        if let Some(tok) = self.peek() {
            if tok.kind == TokenKind::DoubleStar {
                self.bump();
                // Right-associative; the exponent may carry a unary minus.
                let exponent = self.parse_unary()?;
                return Ok(Expr::Pow(Box::new(base), Box::new(exponent)));
            }
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let tok = self.bump().ok_or(ExprError::UnexpectedEnd)?;
        match tok.kind {
            TokenKind::Num(v) => Ok(Expr::Num(v)),
            TokenKind::Ident(name) => {
                if let Some(next) = self.peek() {
                    if next.kind == TokenKind::LParen {
                        if !KNOWN_FUNCTIONS.contains(&name.as_str()) {
                            return Err(ExprError::UnknownFunction { name });
                        }
                        let lparen_pos = self.bump().map(|t| t.pos).unwrap_or(tok.pos);
                        let arg = self.parse_sum()?;
                        match self.bump() {
                            Some(Token { kind: TokenKind::RParen, .. }) => {
                                return Ok(Expr::Call(name, Box::new(arg)));
                            }
                            _ => return Err(ExprError::UnbalancedParen { pos: lparen_pos }),
                        }
                    }
                }
                Ok(Expr::Sym(name))
            }
            TokenKind::LParen => {
                let inner = self.parse_sum()?;
                match self.bump() {
                    Some(Token { kind: TokenKind::RParen, .. }) => Ok(inner),
                    _ => Err(ExprError::UnbalancedParen { pos: tok.pos }),
                }
            }
            _ => Err(ExprError::UnexpectedToken { pos: tok.pos }),
        }
    }
}

// ---------------------------------------------------------------------------
// Canonical form
// ---------------------------------------------------------------------------

/// Maximum exponent for which a multi-term base is fully expanded.
const MAX_EXPANSION_POWER: i64 = 16;

/// A multiplicative atom inside a canonical term.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Factor {
    Sym(String),
    Call(String, CanonExpr),
    /// An unexpandable power: multi-term base with a non-natural or symbolic
    /// exponent.
    Pow(CanonExpr, CanonExpr),
}

/// coefficient * product(factor^exponent)
#[derive(Debug, Clone)]
pub struct Term {
    coeff: f64,
    factors: BTreeMap<Factor, i64>,
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.coeff.total_cmp(&other.coeff) == Ordering::Equal && self.factors == other.factors
    }
}

impl Eq for Term {}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Term {
    fn cmp(&self, other: &Self) -> Ordering {
        self.factors
            .cmp(&other.factors)
            .then_with(|| self.coeff.total_cmp(&other.coeff))
    }
}

/// Sum of canonical terms, sorted by factor set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CanonExpr {
    terms: Vec<Term>,
}

impl CanonExpr {
    fn constant(v: f64) -> CanonExpr {
        if v == 0.0 {
            CanonExpr { terms: Vec::new() }
        } else {
            CanonExpr {
                terms: vec![Term { coeff: v, factors: BTreeMap::new() }],
            }
        }
    }

    fn single_factor(f: Factor) -> CanonExpr {
        let mut factors = BTreeMap::new();
        factors.insert(f, 1);
        CanonExpr {
            terms: vec![Term { coeff: 1.0, factors }],
        }
    }

    fn sum(parts: Vec<CanonExpr>) -> CanonExpr {
        let mut acc: BTreeMap<BTreeMap<Factor, i64>, f64> = BTreeMap::new();
        for part in parts {
            for term in part.terms {
                *acc.entry(term.factors).or_insert(0.0) += term.coeff;
            }
        }
        let mut terms: Vec<Term> = acc
            .into_iter()
            .filter(|(_, coeff)| *coeff != 0.0)
            .map(|(factors, coeff)| Term { coeff, factors })
            .collect();
        terms.sort();
        CanonExpr { terms }
    }

    fn product(parts: Vec<CanonExpr>) -> CanonExpr {
        let mut acc = CanonExpr::constant(1.0);
        for part in parts {
            let mut next: Vec<Term> = Vec::new();
            for a in &acc.terms {
                for b in &part.terms {
                    let mut factors = a.factors.clone();
                    for (f, exp) in &b.factors {
                        let slot = factors.entry(f.clone()).or_insert(0);
                        *slot += exp;
                        if *slot == 0 {
                            factors.remove(f);
                        }
                    }
                    next.push(Term { coeff: a.coeff * b.coeff, factors });
                }
            }
            acc = CanonExpr::sum(vec![CanonExpr { terms: next }]);
        }
        acc
    }

    fn powi(&self, n: i64) -> CanonExpr {
        if n == 0 {
            return CanonExpr::constant(1.0);
        }
        if self.terms.len() == 1 {
            // A single term distributes the exponent over its coefficient
            // and factor exponents, including negative exponents.
            let term = &self.terms[0];
            let coeff = term.coeff.powi(n as i32);
            let factors: BTreeMap<Factor, i64> = term
                .factors
                .iter()
                .map(|(f, exp)| (f.clone(), exp * n))
                .collect();
            return CanonExpr {
                terms: vec![Term { coeff, factors }],
            };
        }
        if n > 0 && n <= MAX_EXPANSION_POWER {
            let mut acc = CanonExpr::constant(1.0);
            for _ in 0..n {
                acc = CanonExpr::product(vec![acc, self.clone()]);
            }
            return acc;
        }
        CanonExpr::single_factor(Factor::Pow(
            self.clone(),
            CanonExpr::constant(n as f64),
        ))
    }

    fn as_integer_constant(&self) -> Option<i64> {
        if self.terms.is_empty() {
            return Some(0);
        }
        if self.terms.len() != 1 {
            return None;
        }
        let term = &self.terms[0];
        if !term.factors.is_empty() {
            return None;
        }
        let rounded = term.coeff.round();
        if (term.coeff - rounded).abs() < 1e-12 {
            Some(rounded as i64)
        } else {
            None
        }
    }

    /// Structural equality with a small per-coefficient tolerance, so that
    /// coefficient arithmetic performed during normalization never makes two
    /// identical forms compare unequal.
    pub fn approx_eq(&self, other: &CanonExpr) -> bool {
        if self.terms.len() != other.terms.len() {
            return false;
        }
        self.terms.iter().zip(other.terms.iter()).all(|(a, b)| {
            a.factors == b.factors && {
                let scale = a.coeff.abs().max(b.coeff.abs()).max(1.0);
                (a.coeff - b.coeff).abs() <= 1e-9 * scale
            }
        })
    }
}

fn canon(e: &Expr) -> CanonExpr {
    match e {
        Expr::Num(v) => CanonExpr::constant(*v),
        Expr::Sym(s) => CanonExpr::single_factor(Factor::Sym(s.clone())),
        Expr::Add(es) => CanonExpr::sum(es.iter().map(canon).collect()),
        Expr::Mul(es) => CanonExpr::product(es.iter().map(canon).collect()),
        Expr::Call(name, arg) => CanonExpr::single_factor(Factor::Call(name.clone(), canon(arg))),
        Expr::Pow(base, exponent) => {
            let base = canon(base);
            let exponent = canon(exponent);
            match exponent.as_integer_constant() {
                Some(n) => base.powi(n),
                None => CanonExpr::single_factor(Factor::Pow(base, exponent)),
            }
        }
    }
}
