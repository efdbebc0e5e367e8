//! Restricted rate-law expressions.
//!
//! Rate laws are parsed with a fixed grammar and evaluated by walking the
//! resulting tree. Nothing in the input can trigger anything other than
//! arithmetic on concentrations and numeric constants.
//!
//! # Grammar
//!
//! ```text
//! expr    = term (('+' | '-') term)*
//! term    = unary (('*' | '/') unary)*
//! unary   = ('+' | '-') unary | power
//! power   = atom (('**' | '^') unary)?
//! atom    = number | symbol | func '(' expr ')' | '(' expr ')'
//! func    = 'exp' | 'ln' | 'log' | 'sqrt'
//! ```
//!
//! `**` binds tighter than unary minus, so `-A**2` is `-(A**2)`, and it is
//! right associative: `2**3**2` is `2**9`.

use crate::error::{KineticsError, KineticsResult};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Lookup of species concentrations by name.
pub trait Concentrations {
    fn concentration(&self, species: &str) -> Option<f64>;
}

impl Concentrations for HashMap<String, f64> {
    fn concentration(&self, species: &str) -> Option<f64> {
        self.get(species).copied()
    }
}

impl Concentrations for BTreeMap<String, f64> {
    fn concentration(&self, species: &str) -> Option<f64> {
        self.get(species).copied()
    }
}

impl Concentrations for [(&str, f64)] {
    fn concentration(&self, species: &str) -> Option<f64> {
        self.iter()
            .find(|(name, _)| *name == species)
            .map(|(_, value)| *value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Pow => pow(a, b),
        }
    }
}

/// Integer exponents go through `powi` so negative bases stay defined.
fn pow(base: f64, exponent: f64) -> f64 {
    if exponent.fract() == 0.0 && exponent.abs() <= f64::from(i32::MAX) {
        base.powi(exponent as i32)
    } else {
        base.powf(exponent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Exp,
    Ln,
    Sqrt,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        match name {
            "exp" => Some(Function::Exp),
            "ln" | "log" => Some(Function::Ln),
            "sqrt" => Some(Function::Sqrt),
            _ => None,
        }
    }

    fn apply(self, x: f64) -> f64 {
        match self {
            Function::Exp => x.exp(),
            Function::Ln => x.ln(),
            Function::Sqrt => x.sqrt(),
        }
    }
}

/// Expression tree, generic over how symbols are referenced
/// (by name after parsing, by species index once bound).
#[derive(Debug, Clone, PartialEq)]
enum Node<S> {
    Number(f64),
    Symbol(S),
    Neg(Box<Node<S>>),
    Binary(BinaryOp, Box<Node<S>>, Box<Node<S>>),
    Call(Function, Box<Node<S>>),
}

impl<S> Node<S> {
    fn eval<F>(&self, lookup: &F) -> f64
    where
        F: Fn(&S) -> f64,
    {
        match self {
            Node::Number(v) => *v,
            Node::Symbol(s) => lookup(s),
            Node::Neg(inner) => -inner.eval(lookup),
            Node::Binary(op, lhs, rhs) => op.apply(lhs.eval(lookup), rhs.eval(lookup)),
            Node::Call(func, arg) => func.apply(arg.eval(lookup)),
        }
    }

    fn map_symbols<T, F>(&self, f: &F) -> KineticsResult<Node<T>>
    where
        F: Fn(&S) -> KineticsResult<T>,
    {
        Ok(match self {
            Node::Number(v) => Node::Number(*v),
            Node::Symbol(s) => Node::Symbol(f(s)?),
            Node::Neg(inner) => Node::Neg(Box::new(inner.map_symbols(f)?)),
            Node::Binary(op, lhs, rhs) => Node::Binary(
                *op,
                Box::new(lhs.map_symbols(f)?),
                Box::new(rhs.map_symbols(f)?),
            ),
            Node::Call(func, arg) => Node::Call(*func, Box::new(arg.map_symbols(f)?)),
        })
    }

    fn visit_symbols<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a S),
    {
        match self {
            Node::Number(_) => {}
            Node::Symbol(s) => f(s),
            Node::Neg(inner) | Node::Call(_, inner) => inner.visit_symbols(f),
            Node::Binary(_, lhs, rhs) => {
                lhs.visit_symbols(f);
                rhs.visit_symbols(f);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Pow,
    LParen,
    RParen,
}

/// Tokens paired with their 1-based column.
fn tokenize(input: &str) -> KineticsResult<Vec<(usize, Token)>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        let column = pos + 1;
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => pos += 1,
            b'+' => {
                tokens.push((column, Token::Plus));
                pos += 1;
            }
            b'-' => {
                tokens.push((column, Token::Minus));
                pos += 1;
            }
            b'*' if bytes.get(pos + 1) == Some(&b'*') => {
                tokens.push((column, Token::Pow));
                pos += 2;
            }
            b'*' => {
                tokens.push((column, Token::Star));
                pos += 1;
            }
            b'^' => {
                tokens.push((column, Token::Pow));
                pos += 1;
            }
            b'/' => {
                tokens.push((column, Token::Slash));
                pos += 1;
            }
            b'(' => {
                tokens.push((column, Token::LParen));
                pos += 1;
            }
            b')' => {
                tokens.push((column, Token::RParen));
                pos += 1;
            }
            b'0'..=b'9' | b'.' => {
                let (value, next) = lex_number(input, pos)?;
                tokens.push((column, Token::Number(value)));
                pos = next;
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let start = pos;
                while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_')
                {
                    pos += 1;
                }
                tokens.push((column, Token::Ident(input[start..pos].to_string())));
            }
            _ => {
                let ch = input[pos..].chars().next().unwrap_or('?');
                return Err(KineticsError::Parse {
                    position: column,
                    what: format!("unexpected character '{ch}'"),
                });
            }
        }
    }

    Ok(tokens)
}

fn lex_number(input: &str, start: usize) -> KineticsResult<(f64, usize)> {
    let bytes = input.as_bytes();
    let mut pos = start;
    let digits = |pos: &mut usize| {
        while *pos < bytes.len() && bytes[*pos].is_ascii_digit() {
            *pos += 1;
        }
    };

    digits(&mut pos);
    if pos < bytes.len() && bytes[pos] == b'.' {
        pos += 1;
        digits(&mut pos);
    }
    // Exponent only if digits follow, so `2e` is left as `2` then `e`.
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut probe = pos + 1;
        if probe < bytes.len() && (bytes[probe] == b'+' || bytes[probe] == b'-') {
            probe += 1;
        }
        if probe < bytes.len() && bytes[probe].is_ascii_digit() {
            pos = probe;
            digits(&mut pos);
        }
    }

    let text = &input[start..pos];
    text.parse::<f64>()
        .map(|value| (value, pos))
        .map_err(|_| KineticsError::Parse {
            position: start + 1,
            what: format!("invalid number '{text}'"),
        })
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Limit on syntax tree depth, counting groups, signs and operator chains.
const MAX_DEPTH: usize = 256;

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end_column: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn column(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(c, _)| *c)
            .unwrap_or(self.end_column)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error<T>(&self, what: impl Into<String>) -> KineticsResult<T> {
        Err(KineticsError::Parse {
            position: self.column(),
            what: what.into(),
        })
    }

    fn descend(&mut self) -> KineticsResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return self.error("expression nested too deeply");
        }
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    fn parse_expr(&mut self) -> KineticsResult<Node<String>> {
        let mut lhs = self.parse_term()?;
        let mut chained = 0;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            self.descend()?;
            chained += 1;
            let rhs = self.parse_term()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth -= chained;
        Ok(lhs)
    }

    fn parse_term(&mut self) -> KineticsResult<Node<String>> {
        let mut lhs = self.parse_unary()?;
        let mut chained = 0;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.pos += 1;
            self.descend()?;
            chained += 1;
            let rhs = self.parse_unary()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth -= chained;
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> KineticsResult<Node<String>> {
        self.descend()?;
        let node = self.parse_signed();
        self.ascend();
        node
    }

    fn parse_signed(&mut self) -> KineticsResult<Node<String>> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Node::Neg(Box::new(self.parse_unary()?)))
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> KineticsResult<Node<String>> {
        let base = self.parse_atom()?;
        if self.peek() == Some(&Token::Pow) {
            self.pos += 1;
            let exponent = self.parse_unary()?;
            return Ok(Node::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> KineticsResult<Node<String>> {
        let column = self.column();
        match self.next() {
            Some(Token::Number(v)) => Ok(Node::Number(v)),
            Some(Token::Ident(name)) => {
                if self.peek() != Some(&Token::LParen) {
                    return Ok(Node::Symbol(name));
                }
                let Some(func) = Function::lookup(&name) else {
                    return Err(KineticsError::Parse {
                        position: column,
                        what: format!("unknown function '{name}'"),
                    });
                };
                self.pos += 1;
                let arg = self.parse_group()?;
                Ok(Node::Call(func, Box::new(arg)))
            }
            Some(Token::LParen) => self.parse_group(),
            Some(token) => Err(KineticsError::Parse {
                position: column,
                what: format!("unexpected token {token:?}"),
            }),
            None => self.error("unexpected end of expression"),
        }
    }

    /// Expression after an opening parenthesis, through its closing one.
    fn parse_group(&mut self) -> KineticsResult<Node<String>> {
        self.descend()?;
        let inner = self.parse_expr();
        self.ascend();
        let inner = inner?;
        self.expect_close()?;
        Ok(inner)
    }

    fn expect_close(&mut self) -> KineticsResult<()> {
        match self.peek() {
            Some(Token::RParen) => {
                self.pos += 1;
                Ok(())
            }
            _ => self.error("missing closing parenthesis"),
        }
    }
}

fn parse(source: &str) -> KineticsResult<Node<String>> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(KineticsError::Parse {
            position: 1,
            what: "empty rate law".to_string(),
        });
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end_column: source.len() + 1,
        depth: 0,
    };
    let root = parser.parse_expr()?;
    if let Some(token) = parser.peek() {
        let token = token.clone();
        return parser.error(format!("unexpected trailing token {token:?}"));
    }
    Ok(root)
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A validated rate law over a fixed set of allowed symbols.
#[derive(Debug, Clone, PartialEq)]
pub struct RateExpression {
    source: String,
    root: Node<String>,
    allowed: BTreeSet<String>,
}

impl RateExpression {
    /// Parse `source` and check that every symbol it references is in `allowed`.
    pub fn new<I, S>(source: &str, allowed: I) -> KineticsResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let source = source.trim();
        let root = parse(source)?;
        let allowed: BTreeSet<String> = allowed.into_iter().map(Into::into).collect();

        let mut unknown = BTreeSet::new();
        root.visit_symbols(&mut |s| {
            if !allowed.contains(s) {
                unknown.insert(s.clone());
            }
        });
        if let Some(symbol) = unknown.into_iter().next() {
            return Err(KineticsError::UnknownSymbol {
                symbol,
                expression: source.to_string(),
            });
        }

        Ok(Self {
            source: source.to_string(),
            root,
            allowed,
        })
    }

    /// The rate law as written (trimmed).
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn allowed_symbols(&self) -> &BTreeSet<String> {
        &self.allowed
    }

    /// Symbols actually referenced by the expression.
    pub fn free_symbols(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.root.visit_symbols(&mut |s| {
            out.insert(String::as_str(s));
        });
        out
    }

    /// Evaluate against named concentrations.
    ///
    /// Every allowed symbol must be present; extra entries are ignored.
    pub fn evaluate<C>(&self, concentrations: &C) -> KineticsResult<f64>
    where
        C: Concentrations + ?Sized,
    {
        for species in &self.allowed {
            if concentrations.concentration(species).is_none() {
                return Err(KineticsError::MissingSpecies {
                    species: species.clone(),
                    what: "concentration".to_string(),
                });
            }
        }
        Ok(self
            .root
            .eval(&|s: &String| concentrations.concentration(s).unwrap_or(f64::NAN)))
    }

    /// Resolve symbols to positions in `species` for index-based evaluation.
    pub fn bind(&self, species: &[String]) -> KineticsResult<BoundRate> {
        let root = self.root.map_symbols(&|s: &String| {
            species
                .iter()
                .position(|name| name == s)
                .ok_or_else(|| KineticsError::MissingSpecies {
                    species: s.clone(),
                    what: "network entry".to_string(),
                })
        })?;
        Ok(BoundRate { root })
    }
}

impl fmt::Display for RateExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// A rate law whose symbols are indices into a concentration slice.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundRate {
    root: Node<usize>,
}

impl BoundRate {
    pub fn evaluate(&self, concentrations: &[f64]) -> f64 {
        self.root
            .eval(&|i: &usize| concentrations.get(*i).copied().unwrap_or(f64::NAN))
    }
}
