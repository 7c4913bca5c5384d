//! A small CQL2-text parser and evaluator.
//!
//! Supported: comparisons (`=`, `<>`, `<`, `<=`, `>`, `>=`), `LIKE`, `IN`,
//! `BETWEEN`, `IS [NOT] NULL`, `AND`, `OR`, `NOT` and parentheses. Literals
//! are single-quoted strings (`''` escapes a quote), numbers and booleans.
//! Property names are bare identifiers or double-quoted. Keywords are
//! case-insensitive. Spatial and temporal operators are not supported.

use std::cmp::Ordering;

use serde_json::{Number, Value};

use super::value::{compare_scalars, loose_eq};
use crate::ProviderError;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// Parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Both sides hold.
    And(Box<Expr>, Box<Expr>),
    /// Either side holds.
    Or(Box<Expr>, Box<Expr>),
    /// Negation.
    Not(Box<Expr>),
    /// `property op literal`.
    Compare {
        /// Property name.
        property: String,
        /// Operator.
        op: CompareOp,
        /// Right-hand literal.
        value: Value,
    },
    /// `property [NOT] LIKE 'pattern'`.
    Like {
        /// Property name.
        property: String,
        /// Pattern using `%` and `_` wildcards.
        pattern: String,
        /// Whether `NOT` preceded `LIKE`.
        negated: bool,
    },
    /// `property [NOT] IN (a, b, ...)`.
    In {
        /// Property name.
        property: String,
        /// Candidate literals.
        values: Vec<Value>,
        /// Whether `NOT` preceded `IN`.
        negated: bool,
    },
    /// `property [NOT] BETWEEN low AND high`, bounds inclusive.
    Between {
        /// Property name.
        property: String,
        /// Lower bound.
        low: Value,
        /// Upper bound.
        high: Value,
        /// Whether `NOT` preceded `BETWEEN`.
        negated: bool,
    },
    /// `property IS [NOT] NULL`.
    IsNull {
        /// Property name.
        property: String,
        /// Whether the test was `IS NOT NULL`.
        negated: bool,
    },
}

impl Expr {
    /// Evaluate against a feature, using `resolve` to look up property values.
    ///
    /// Predicates over a missing or null property are false, except
    /// `IS NULL`.
    pub fn evaluate<F>(&self, resolve: &F) -> bool
    where
        F: Fn(&str) -> Option<Value>,
    {
        match self {
            Self::And(left, right) => left.evaluate(resolve) && right.evaluate(resolve),
            Self::Or(left, right) => left.evaluate(resolve) || right.evaluate(resolve),
            Self::Not(inner) => !inner.evaluate(resolve),
            Self::Compare { property, op, value } => {
                present(resolve, property).is_some_and(|actual| compare(&actual, *op, value))
            }
            Self::Like {
                property,
                pattern,
                negated,
            } => present(resolve, property)
                .and_then(|actual| actual.as_str().map(|text| like(text, pattern)))
                .is_some_and(|matched| matched != *negated),
            Self::In {
                property,
                values,
                negated,
            } => present(resolve, property)
                .map(|actual| values.iter().any(|candidate| loose_eq(&actual, candidate)))
                .is_some_and(|found| found != *negated),
            Self::Between {
                property,
                low,
                high,
                negated,
            } => present(resolve, property)
                .map(|actual| {
                    compare(&actual, CompareOp::Ge, low) && compare(&actual, CompareOp::Le, high)
                })
                .is_some_and(|inside| inside != *negated),
            Self::IsNull { property, negated } => {
                present(resolve, property).is_none() != *negated
            }
        }
    }
}

fn present<F>(resolve: &F, property: &str) -> Option<Value>
where
    F: Fn(&str) -> Option<Value>,
{
    resolve(property).filter(|value| !value.is_null())
}

fn compare(actual: &Value, op: CompareOp, expected: &Value) -> bool {
    match op {
        CompareOp::Eq => loose_eq(actual, expected),
        CompareOp::Ne => !loose_eq(actual, expected) && compare_scalars(actual, expected).is_some(),
        CompareOp::Lt => compare_scalars(actual, expected) == Some(Ordering::Less),
        CompareOp::Le => matches!(
            compare_scalars(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        CompareOp::Gt => compare_scalars(actual, expected) == Some(Ordering::Greater),
        CompareOp::Ge => matches!(
            compare_scalars(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
    }
}

/// SQL `LIKE` matching with `%` (any run) and `_` (one character).
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0_usize, 0_usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '_' || text.get(t) == Some(&c) => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    pattern.get(p..).is_some_and(|rest| rest.iter().all(|&c| c == '%'))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    QuotedIdent(String),
    Str(String),
    Num(Number),
    LParen,
    RParen,
    Comma,
    Op(CompareOp),
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    offset: usize,
}

fn syntax_error(offset: usize, message: impl Into<String>) -> ProviderError {
    ProviderError::InvalidFilterSyntax {
        offset,
        message: message.into(),
    }
}

fn lex(input: &str) -> Result<Vec<Spanned>, ProviderError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        let token = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '(' => single(&mut chars, Token::LParen),
            ')' => single(&mut chars, Token::RParen),
            ',' => single(&mut chars, Token::Comma),
            '=' => single(&mut chars, Token::Op(CompareOp::Eq)),
            '<' | '>' => lex_operator(&mut chars, c),
            '\'' => Token::Str(lex_quoted(&mut chars, '\'', offset)?),
            '"' => Token::QuotedIdent(lex_quoted(&mut chars, '"', offset)?),
            c if c.is_ascii_digit() || c == '-' || c == '.' => lex_number(&mut chars, offset)?,
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&(_, next)) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' || next == '.' || next == ':' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                Token::Ident(word)
            }
            other => return Err(syntax_error(offset, format!("unexpected character `{other}`"))),
        };
        tokens.push(Spanned { token, offset });
    }
    Ok(tokens)
}

type CharStream<'a> = std::iter::Peekable<std::str::CharIndices<'a>>;

fn single(chars: &mut CharStream<'_>, token: Token) -> Token {
    chars.next();
    token
}

fn lex_operator(chars: &mut CharStream<'_>, first: char) -> Token {
    chars.next();
    let next = chars.peek().map(|&(_, c)| c);
    let (op, consumed) = match (first, next) {
        ('<', Some('=')) => (CompareOp::Le, true),
        ('<', Some('>')) => (CompareOp::Ne, true),
        ('<', _) => (CompareOp::Lt, false),
        (_, Some('=')) => (CompareOp::Ge, true),
        _ => (CompareOp::Gt, false),
    };
    if consumed {
        chars.next();
    }
    Token::Op(op)
}

fn lex_quoted(
    chars: &mut CharStream<'_>,
    quote: char,
    start: usize,
) -> Result<String, ProviderError> {
    chars.next();
    let mut text = String::new();
    loop {
        match chars.next() {
            Some((_, c)) if c == quote => {
                if chars.peek().is_some_and(|&(_, next)| next == quote) {
                    chars.next();
                    text.push(quote);
                } else {
                    return Ok(text);
                }
            }
            Some((_, c)) => text.push(c),
            None => return Err(syntax_error(start, "unterminated quoted text")),
        }
    }
}

fn lex_number(chars: &mut CharStream<'_>, start: usize) -> Result<Token, ProviderError> {
    let mut text = String::new();
    while let Some(&(_, c)) = chars.peek() {
        let exponent_sign = (c == '-' || c == '+') && text.ends_with(['e', 'E']);
        let leading_minus = c == '-' && text.is_empty();
        if c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E') || exponent_sign || leading_minus {
            text.push(c);
            chars.next();
        } else {
            break;
        }
    }
    parse_number(&text)
        .map(Token::Num)
        .ok_or_else(|| syntax_error(start, format!("invalid number `{text}`")))
}

fn parse_number(text: &str) -> Option<Number> {
    if let Ok(integer) = text.parse::<i64>() {
        return Some(Number::from(integer));
    }
    text.parse::<f64>().ok().and_then(Number::from_f64)
}

/// Parse a CQL2-text expression.
///
/// # Examples
///
/// ```
/// use geoprovider_core::query::cql::parse;
/// use serde_json::{Value, json};
///
/// let expr = parse("name LIKE 'Dinagat%' AND pop > 1000")?;
/// let props = json!({"name": "Dinagat Islands", "pop": 127152});
/// assert!(expr.evaluate(&|name: &str| props.get(name).cloned()));
/// assert!(parse("name = ").is_err());
/// # Ok::<(), geoprovider_core::ProviderError>(())
/// ```
pub fn parse(input: &str) -> Result<Expr, ProviderError> {
    let tokens = lex(input)?;
    let mut parser = Parser {
        tokens,
        position: 0,
        end: input.len(),
    };
    if parser.tokens.is_empty() {
        return Err(syntax_error(0, "empty filter expression"));
    }
    let expr = parser.or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(spanned) => Err(syntax_error(spanned.offset, "unexpected trailing input")),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    position: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.position)
    }

    fn offset(&self) -> usize {
        self.peek().map_or(self.end, |spanned| spanned.offset)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let spanned = self.tokens.get(self.position).cloned();
        if spanned.is_some() {
            self.position += 1;
        }
        spanned
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(
            self.peek(),
            Some(Spanned { token: Token::Ident(word), .. }) if word.eq_ignore_ascii_case(keyword)
        )
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let found = self.at_keyword(keyword);
        if found {
            self.position += 1;
        }
        found
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ProviderError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(syntax_error(self.offset(), format!("expected `{keyword}`")))
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), ProviderError> {
        match self.peek() {
            Some(spanned) if spanned.token == *expected => {
                self.position += 1;
                Ok(())
            }
            _ => Err(syntax_error(self.offset(), format!("expected {what}"))),
        }
    }

    fn or(&mut self) -> Result<Expr, ProviderError> {
        let mut expr = self.and()?;
        while self.eat_keyword("OR") {
            expr = Expr::Or(Box::new(expr), Box::new(self.and()?));
        }
        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr, ProviderError> {
        let mut expr = self.not()?;
        while self.eat_keyword("AND") {
            expr = Expr::And(Box::new(expr), Box::new(self.not()?));
        }
        Ok(expr)
    }

    fn not(&mut self) -> Result<Expr, ProviderError> {
        if self.eat_keyword("NOT") {
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ProviderError> {
        if matches!(self.peek(), Some(Spanned { token: Token::LParen, .. })) {
            self.position += 1;
            let expr = self.or()?;
            self.expect(&Token::RParen, "`)`")?;
            return Ok(expr);
        }
        let property = self.property()?;
        self.predicate(property)
    }

    fn property(&mut self) -> Result<String, ProviderError> {
        let offset = self.offset();
        match self.advance().map(|spanned| spanned.token) {
            Some(Token::QuotedIdent(name)) => Ok(name),
            Some(Token::Ident(name)) if !is_reserved(&name) => Ok(name),
            _ => Err(syntax_error(offset, "expected a property name")),
        }
    }

    fn predicate(&mut self, property: String) -> Result<Expr, ProviderError> {
        if let Some(Spanned { token: Token::Op(op), .. }) = self.peek() {
            let op = *op;
            self.position += 1;
            let value = self.literal()?;
            return Ok(Expr::Compare { property, op, value });
        }
        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            return Ok(Expr::IsNull { property, negated });
        }
        let negated = self.eat_keyword("NOT");
        if self.eat_keyword("LIKE") {
            let offset = self.offset();
            return match self.literal()? {
                Value::String(pattern) => Ok(Expr::Like {
                    property,
                    pattern,
                    negated,
                }),
                _ => Err(syntax_error(offset, "LIKE requires a string pattern")),
            };
        }
        if self.eat_keyword("IN") {
            return Ok(Expr::In {
                property,
                values: self.literal_list()?,
                negated,
            });
        }
        if self.eat_keyword("BETWEEN") {
            let low = self.literal()?;
            self.expect_keyword("AND")?;
            let high = self.literal()?;
            return Ok(Expr::Between {
                property,
                low,
                high,
                negated,
            });
        }
        Err(syntax_error(self.offset(), "expected a comparison operator"))
    }

    fn literal_list(&mut self) -> Result<Vec<Value>, ProviderError> {
        self.expect(&Token::LParen, "`(`")?;
        let mut values = vec![self.literal()?];
        while matches!(self.peek(), Some(Spanned { token: Token::Comma, .. })) {
            self.position += 1;
            values.push(self.literal()?);
        }
        self.expect(&Token::RParen, "`)`")?;
        Ok(values)
    }

    fn literal(&mut self) -> Result<Value, ProviderError> {
        let offset = self.offset();
        match self.advance().map(|spanned| spanned.token) {
            Some(Token::Str(text)) => Ok(Value::String(text)),
            Some(Token::Num(number)) => Ok(Value::Number(number)),
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("TRUE") => Ok(Value::Bool(true)),
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("FALSE") => {
                Ok(Value::Bool(false))
            }
            _ => Err(syntax_error(offset, "expected a literal value")),
        }
    }
}

const RESERVED: [&str; 11] = [
    "AND", "OR", "NOT", "LIKE", "IN", "IS", "NULL", "BETWEEN", "TRUE", "FALSE", "ILIKE",
];

fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|keyword| word.eq_ignore_ascii_case(keyword))
}
