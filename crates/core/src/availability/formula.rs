//! Restricted arithmetic formulas over stock quantities.
//!
//! A formula combines the three stock inputs with `+ - * /`, parentheses,
//! unary minus and non-negative decimal literals:
//!
//! ```rust
//! # use stockline_core::{Formula, Inputs};
//! # use rust_decimal::Decimal;
//! let formula: Formula = "(on_hand + incoming) - committed".parse()?;
//! let inputs = Inputs::new(10, 5, 3);
//! assert_eq!(formula.evaluate(&inputs)?, Decimal::from(12));
//! # Ok::<(), stockline_core::FormulaError>(())
//! ```
//!
//! Formulas are parsed once into an expression tree and evaluated with checked
//! decimal arithmetic. There are no function calls and no other identifiers.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Longest accepted formula source, in bytes.
pub const MAX_FORMULA_LEN: usize = 256;

/// Deepest accepted nesting of parentheses and unary minus.
pub const MAX_DEPTH: usize = 32;

/// Errors from parsing or evaluating a formula.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    #[error("formula is empty")]
    Empty,
    #[error("formula is {len} bytes long (limit {max})")]
    TooLong { len: usize, max: usize },
    #[error("unexpected character '{ch}' at position {position}")]
    UnexpectedCharacter { ch: char, position: usize },
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("unknown variable '{0}' (expected on_hand, incoming or committed)")]
    UnknownVariable(String),
    #[error("unexpected token at position {position}")]
    UnexpectedToken { position: usize },
    #[error("unexpected end of formula")]
    UnexpectedEnd,
    #[error("unclosed parenthesis opened at position {position}")]
    UnclosedParen { position: usize },
    #[error("formula nests deeper than {max} levels")]
    TooDeep { max: usize },
    #[error("division by zero")]
    DivisionByZero,
    #[error("arithmetic overflow")]
    Overflow,
}

impl FormulaError {
    /// Whether the error happened while evaluating rather than parsing.
    ///
    /// Evaluation errors depend on the inputs; a formula that parsed once is
    /// still valid when these occur.
    #[must_use]
    pub const fn is_evaluation(&self) -> bool {
        matches!(self, Self::DivisionByZero | Self::Overflow)
    }
}

// =============================================================================
// Inputs
// =============================================================================

/// A named formula input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    OnHand,
    Incoming,
    Committed,
}

impl Variable {
    /// All variables, in canonical order.
    pub const ALL: [Self; 3] = [Self::OnHand, Self::Incoming, Self::Committed];

    /// Name as written in formulas.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OnHand => "on_hand",
            Self::Incoming => "incoming",
            Self::Committed => "committed",
        }
    }

    /// Look up a variable by name, ignoring ASCII case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stock quantities for a single SKU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Inputs {
    /// Units physically in the warehouse.
    #[serde(default)]
    pub on_hand: i64,
    /// Units on open purchase orders.
    #[serde(default)]
    pub incoming: i64,
    /// Units already promised to orders.
    #[serde(default)]
    pub committed: i64,
}

impl Inputs {
    #[must_use]
    pub const fn new(on_hand: i64, incoming: i64, committed: i64) -> Self {
        Self {
            on_hand,
            incoming,
            committed,
        }
    }

    /// Value of a single variable.
    #[must_use]
    pub const fn get(&self, variable: Variable) -> i64 {
        match variable {
            Variable::OnHand => self.on_hand,
            Variable::Incoming => self.incoming,
            Variable::Committed => self.committed,
        }
    }
}

// =============================================================================
// Expression tree
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Number(Decimal),
    Var(Variable),
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    fn evaluate(&self, inputs: &Inputs) -> Result<Decimal, FormulaError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Var(v) => Ok(Decimal::from(inputs.get(*v))),
            Self::Neg(inner) => Ok(-inner.evaluate(inputs)?),
            Self::Binary { op, lhs, rhs } => {
                let l = lhs.evaluate(inputs)?;
                let r = rhs.evaluate(inputs)?;
                match op {
                    BinOp::Add => l.checked_add(r).ok_or(FormulaError::Overflow),
                    BinOp::Sub => l.checked_sub(r).ok_or(FormulaError::Overflow),
                    BinOp::Mul => l.checked_mul(r).ok_or(FormulaError::Overflow),
                    BinOp::Div => {
                        if r.is_zero() {
                            return Err(FormulaError::DivisionByZero);
                        }
                        l.checked_div(r).ok_or(FormulaError::Overflow)
                    }
                }
            }
        }
    }

    fn collect_variables(&self, out: &mut BTreeSet<Variable>) {
        match self {
            Self::Number(_) => {}
            Self::Var(v) => {
                out.insert(*v);
            }
            Self::Neg(inner) => inner.collect_variables(out),
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
        }
    }
}

// =============================================================================
// Lexer
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Number(Decimal),
    Var(Variable),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    position: usize,
}

fn tokenize(source: &str) -> Result<Vec<Spanned>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(position, ch)) = chars.peek() {
        let token = match ch {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '(' => Token::LParen,
            ')' => Token::RParen,
            c if c.is_ascii_digit() => {
                let end = scan_while(&mut chars, |c| c.is_ascii_digit() || c == '.');
                let text = source.get(position..end).unwrap_or_default();
                let value = Decimal::from_str(text)
                    .map_err(|_| FormulaError::InvalidNumber(text.to_string()))?;
                tokens.push(Spanned {
                    token: Token::Number(value),
                    position,
                });
                continue;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let end = scan_while(&mut chars, |c| c.is_ascii_alphanumeric() || c == '_');
                let name = source.get(position..end).unwrap_or_default();
                let variable = Variable::from_name(name)
                    .ok_or_else(|| FormulaError::UnknownVariable(name.to_string()))?;
                tokens.push(Spanned {
                    token: Token::Var(variable),
                    position,
                });
                continue;
            }
            other => {
                return Err(FormulaError::UnexpectedCharacter {
                    ch: other,
                    position,
                });
            }
        };
        chars.next();
        tokens.push(Spanned { token, position });
    }

    Ok(tokens)
}

/// Advance while `pred` holds and return the byte offset just past the run.
fn scan_while(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    pred: impl Fn(char) -> bool,
) -> usize {
    let mut end = 0;
    while let Some(&(i, c)) = chars.peek() {
        if !pred(c) {
            return i;
        }
        end = i + c.len_utf8();
        chars.next();
    }
    end
}

// =============================================================================
// Parser
// =============================================================================

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    const fn new(tokens: &'a [Spanned]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<&'a Spanned> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Spanned> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn enter(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FormulaError::TooDeep { max: MAX_DEPTH });
        }
        Ok(())
    }

    const fn leave(&mut self) {
        self.depth -= 1;
    }

    fn parse(mut self) -> Result<Expr, FormulaError> {
        let expr = self.expression()?;
        match self.peek() {
            None => Ok(expr),
            Some(extra) => Err(FormulaError::UnexpectedToken {
                position: extra.position,
            }),
        }
    }

    // expression := term (('+' | '-') term)*
    fn expression(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek().map(|s| &s.token) {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    // term := unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek().map(|s| &s.token) {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    // unary := '-' unary | primary
    fn unary(&mut self) -> Result<Expr, FormulaError> {
        if matches!(self.peek().map(|s| &s.token), Some(Token::Minus)) {
            self.advance();
            self.enter()?;
            let inner = self.unary()?;
            self.leave();
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.primary()
    }

    // primary := number | variable | '(' expression ')'
    fn primary(&mut self) -> Result<Expr, FormulaError> {
        let Some(spanned) = self.advance() else {
            return Err(FormulaError::UnexpectedEnd);
        };
        match &spanned.token {
            Token::Number(n) => Ok(Expr::Number(*n)),
            Token::Var(v) => Ok(Expr::Var(*v)),
            Token::LParen => {
                self.enter()?;
                let inner = self.expression()?;
                match self.advance() {
                    Some(Spanned {
                        token: Token::RParen,
                        ..
                    }) => {
                        self.leave();
                        Ok(inner)
                    }
                    Some(other) => Err(FormulaError::UnexpectedToken {
                        position: other.position,
                    }),
                    None => Err(FormulaError::UnclosedParen {
                        position: spanned.position,
                    }),
                }
            }
            _ => Err(FormulaError::UnexpectedToken {
                position: spanned.position,
            }),
        }
    }
}

// =============================================================================
// Formula
// =============================================================================

/// A compiled availability formula.
///
/// Displays and serializes as its (trimmed) source text. Deserializing parses,
/// so a `Formula` value is always well-formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    /// Parse and compile a formula.
    ///
    /// # Errors
    ///
    /// Returns `FormulaError` if the source is empty, too long, or not a
    /// well-formed expression over the known variables.
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(FormulaError::Empty);
        }
        if source.len() > MAX_FORMULA_LEN {
            return Err(FormulaError::TooLong {
                len: source.len(),
                max: MAX_FORMULA_LEN,
            });
        }

        let tokens = tokenize(source)?;
        let expr = Parser::new(&tokens).parse()?;

        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// Build `lhs - rhs` without going through the parser.
    #[must_use]
    pub fn difference(lhs: Variable, rhs: Variable) -> Self {
        Self {
            source: format!("{lhs} - {rhs}"),
            expr: Expr::Binary {
                op: BinOp::Sub,
                lhs: Box::new(Expr::Var(lhs)),
                rhs: Box::new(Expr::Var(rhs)),
            },
        }
    }

    /// Evaluate against a set of stock inputs.
    ///
    /// # Errors
    ///
    /// Returns `FormulaError::DivisionByZero` or `FormulaError::Overflow`.
    pub fn evaluate(&self, inputs: &Inputs) -> Result<Decimal, FormulaError> {
        self.expr.evaluate(inputs)
    }

    /// The source text this formula was parsed from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Variables referenced by the formula.
    #[must_use]
    pub fn variables(&self) -> BTreeSet<Variable> {
        let mut out = BTreeSet::new();
        self.expr.collect_variables(&mut out);
        out
    }
}

impl FromStr for Formula {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for Formula {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for Formula {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Self::parse(&source).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn eval(source: &str, inputs: Inputs) -> Result<Decimal, FormulaError> {
        Formula::parse(source)?.evaluate(&inputs)
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    const STOCK: Inputs = Inputs::new(100, 40, 25);

    #[test]
    fn test_single_variables() {
        assert_eq!(eval("on_hand", STOCK).unwrap(), Decimal::from(100));
        assert_eq!(eval("incoming", STOCK).unwrap(), Decimal::from(40));
        assert_eq!(eval("committed", STOCK).unwrap(), Decimal::from(25));
    }

    #[test]
    fn test_precedence() {
        // * binds tighter than +
        assert_eq!(
            eval("on_hand + incoming * 2", STOCK).unwrap(),
            Decimal::from(180)
        );
        assert_eq!(
            eval("(on_hand + incoming) * 2", STOCK).unwrap(),
            Decimal::from(280)
        );
    }

    #[test]
    fn test_left_associativity() {
        // (100 - 40) - 25, not 100 - (40 - 25)
        assert_eq!(
            eval("on_hand - incoming - committed", STOCK).unwrap(),
            Decimal::from(35)
        );
        // (100 / 4) / 5
        assert_eq!(eval("on_hand / 4 / 5", STOCK).unwrap(), Decimal::from(5));
    }

    #[test]
    fn test_unary_minus_and_literals() {
        assert_eq!(eval("-committed + on_hand", STOCK).unwrap(), Decimal::from(75));
        assert_eq!(eval("on_hand * 0.9", STOCK).unwrap(), dec("90.0"));
        assert_eq!(eval("--on_hand", STOCK).unwrap(), Decimal::from(100));
    }

    #[test]
    fn test_identifiers_are_case_insensitive() {
        assert_eq!(eval("ON_HAND - Committed", STOCK).unwrap(), Decimal::from(75));
    }

    #[test]
    fn test_whitespace_is_ignored() {
        assert_eq!(
            eval("  (on_hand+incoming)-committed\t", STOCK).unwrap(),
            Decimal::from(115)
        );
        assert_eq!(
            Formula::parse("  on_hand ").unwrap().to_string(),
            "on_hand"
        );
    }

    #[test]
    fn test_division_by_zero() {
        let err = eval("on_hand / committed", Inputs::new(10, 0, 0)).unwrap_err();
        assert_eq!(err, FormulaError::DivisionByZero);
        assert!(err.is_evaluation());
    }

    #[test]
    fn test_overflow() {
        let inputs = Inputs::new(i64::MAX, i64::MAX, i64::MAX);
        let err = eval("on_hand * incoming * committed * on_hand", inputs).unwrap_err();
        assert_eq!(err, FormulaError::Overflow);
    }

    #[test]
    fn test_rejects_unknown_variables() {
        assert_eq!(
            Formula::parse("on_hand - reserved").unwrap_err(),
            FormulaError::UnknownVariable("reserved".to_string())
        );
    }

    #[test]
    fn test_rejects_function_calls() {
        // `max` is not a variable; calls never get as far as the parser.
        assert!(matches!(
            Formula::parse("max(on_hand, 0)").unwrap_err(),
            FormulaError::UnknownVariable(_)
        ));
    }

    #[test]
    fn test_rejects_malformed_expressions() {
        assert_eq!(Formula::parse("").unwrap_err(), FormulaError::Empty);
        assert_eq!(Formula::parse("   ").unwrap_err(), FormulaError::Empty);
        assert_eq!(
            Formula::parse("on_hand +").unwrap_err(),
            FormulaError::UnexpectedEnd
        );
        assert_eq!(
            Formula::parse("on_hand incoming").unwrap_err(),
            FormulaError::UnexpectedToken { position: 8 }
        );
        assert_eq!(
            Formula::parse("(on_hand - committed").unwrap_err(),
            FormulaError::UnclosedParen { position: 0 }
        );
        assert_eq!(
            Formula::parse("on_hand)").unwrap_err(),
            FormulaError::UnexpectedToken { position: 7 }
        );
        assert_eq!(
            Formula::parse("on_hand % 2").unwrap_err(),
            FormulaError::UnexpectedCharacter {
                ch: '%',
                position: 8
            }
        );
        assert_eq!(
            Formula::parse("1.2.3").unwrap_err(),
            FormulaError::InvalidNumber("1.2.3".to_string())
        );
    }

    #[test]
    fn test_length_and_depth_limits() {
        let long = format!("on_hand{}", " + 1".repeat(MAX_FORMULA_LEN));
        assert!(matches!(
            Formula::parse(&long).unwrap_err(),
            FormulaError::TooLong { .. }
        ));

        let deep = format!("{}on_hand{}", "(".repeat(40), ")".repeat(40));
        assert_eq!(
            Formula::parse(&deep).unwrap_err(),
            FormulaError::TooDeep { max: MAX_DEPTH }
        );

        let fine = format!("{}on_hand{}", "(".repeat(10), ")".repeat(10));
        assert!(Formula::parse(&fine).is_ok());
    }

    #[test]
    fn test_limits_are_inclusive() {
        // "on_hand" + padding + "+ 1" is 10 bytes plus the padding.
        let at_limit = format!("on_hand{}+ 1", " ".repeat(MAX_FORMULA_LEN - 10));
        assert_eq!(at_limit.len(), MAX_FORMULA_LEN);
        assert!(Formula::parse(&at_limit).is_ok());

        let over_limit = format!("on_hand{}+ 1", " ".repeat(MAX_FORMULA_LEN - 9));
        assert_eq!(
            Formula::parse(&over_limit).unwrap_err(),
            FormulaError::TooLong {
                len: MAX_FORMULA_LEN + 1,
                max: MAX_FORMULA_LEN
            }
        );

        let nested = |depth: usize| format!("{}on_hand{}", "(".repeat(depth), ")".repeat(depth));
        assert!(Formula::parse(&nested(MAX_DEPTH)).is_ok());
        assert_eq!(
            Formula::parse(&nested(MAX_DEPTH + 1)).unwrap_err(),
            FormulaError::TooDeep { max: MAX_DEPTH }
        );
    }

    #[test]
    fn test_variables() {
        let formula = Formula::parse("(incoming - committed) * 2").unwrap();
        let vars: Vec<Variable> = formula.variables().into_iter().collect();
        assert_eq!(vars, vec![Variable::Incoming, Variable::Committed]);
        assert!(Formula::parse("42").unwrap().variables().is_empty());
    }

    #[test]
    fn test_difference_matches_parsed_formula() {
        let built = Formula::difference(Variable::OnHand, Variable::Committed);
        let parsed = Formula::parse("on_hand - committed").unwrap();
        assert_eq!(built, parsed);
    }

    #[test]
    fn test_serde_validates_on_deserialize() {
        let formula: Formula = serde_json::from_str("\"on_hand - committed\"").unwrap();
        assert_eq!(
            serde_json::to_string(&formula).unwrap(),
            "\"on_hand - committed\""
        );
        assert!(serde_json::from_str::<Formula>("\"on_hand - stock\"").is_err());
    }
}
