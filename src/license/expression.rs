use serde::{Serialize, Serializer};

use crate::license::table::{risk_of, LicenseRisk};

/// A canonical license, or a compound of canonical licenses.
///
/// Every leaf holds a canonical identifier; an expression with an
/// unresolvable leaf is never constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseExpr {
    License(String),
    And(Box<LicenseExpr>, Box<LicenseExpr>),
    Or(Box<LicenseExpr>, Box<LicenseExpr>),
}

impl LicenseExpr {
    pub fn license(id: impl Into<String>) -> Self {
        LicenseExpr::License(id.into())
    }

    /// Whether the expression can be satisfied using only licenses accepted by `allowed`.
    ///
    /// `OR` needs one side, `AND` needs both.
    pub fn is_satisfied_by(&self, allowed: &dyn Fn(&str) -> bool) -> bool {
        match self {
            LicenseExpr::License(id) => allowed(id),
            LicenseExpr::And(lhs, rhs) => lhs.is_satisfied_by(allowed) && rhs.is_satisfied_by(allowed),
            LicenseExpr::Or(lhs, rhs) => lhs.is_satisfied_by(allowed) || rhs.is_satisfied_by(allowed),
        }
    }

    /// Leaf identifiers, left to right.
    pub fn licenses(&self) -> Vec<&str> {
        match self {
            LicenseExpr::License(id) => vec![id.as_str()],
            LicenseExpr::And(lhs, rhs) | LicenseExpr::Or(lhs, rhs) => {
                let mut ids = lhs.licenses();
                ids.extend(rhs.licenses());
                ids
            }
        }
    }

    /// `OR` takes the most permissive side, `AND` the most restrictive.
    pub fn risk(&self) -> LicenseRisk {
        match self {
            LicenseExpr::License(id) => risk_of(id),
            LicenseExpr::Or(lhs, rhs) => lhs.risk().min(rhs.risk()),
            LicenseExpr::And(lhs, rhs) => {
                let (a, b) = (lhs.risk(), rhs.risk());
                if a == LicenseRisk::Unknown || b == LicenseRisk::Unknown {
                    LicenseRisk::Unknown
                } else {
                    a.max(b)
                }
            }
        }
    }
}

impl std::fmt::Display for LicenseExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LicenseExpr::License(id) => write!(f, "{id}"),
            LicenseExpr::Or(lhs, rhs) => write!(f, "{lhs} OR {rhs}"),
            LicenseExpr::And(lhs, rhs) => {
                for (i, side) in [lhs, rhs].into_iter().enumerate() {
                    if i > 0 {
                        write!(f, " AND ")?;
                    }
                    match side.as_ref() {
                        LicenseExpr::Or(..) => write!(f, "({side})")?,
                        _ => write!(f, "{side}")?,
                    }
                }
                Ok(())
            }
        }
    }
}

impl Serialize for LicenseExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, PartialEq, Clone)]
enum Token {
    Term(String),
    And,
    Or,
    With,
    LParen,
    RParen,
}

/// Split a raw declaration into tokens.
///
/// Operators are matched case-insensitively as whole words; `/`, `,` and
/// `;` are `OR` shorthands. Consecutive plain words form a single multi-word term, so
/// `Apache License 2.0 OR MIT` yields two terms.
fn tokenize(expr: &str) -> Vec<Token> {
    let spaced = expr
        .replace('(', " ( ")
        .replace(')', " ) ")
        .replace(['/', ',', ';'], " OR ");

    let mut tokens = Vec::new();
    let mut words: Vec<&str> = Vec::new();

    fn flush(words: &mut Vec<&str>, tokens: &mut Vec<Token>) {
        if !words.is_empty() {
            tokens.push(Token::Term(words.join(" ")));
            words.clear();
        }
    }

    for word in spaced.split_whitespace() {
        let token = match word.to_ascii_uppercase().as_str() {
            "(" => Token::LParen,
            ")" => Token::RParen,
            "AND" => Token::And,
            "OR" => Token::Or,
            "WITH" => Token::With,
            _ => {
                words.push(word);
                continue;
            }
        };
        flush(&mut words, &mut tokens);
        tokens.push(token);
    }
    flush(&mut words, &mut tokens);

    tokens
}

/// Whether `raw` uses any expression syntax worth parsing.
pub fn has_operators(raw: &str) -> bool {
    tokenize(raw)
        .iter()
        .any(|t| matches!(t, Token::And | Token::Or | Token::With))
}

/// Whether `raw` joins terms with `AND` or attaches a `WITH` exception.
pub fn has_conjunction(raw: &str) -> bool {
    tokenize(raw)
        .iter()
        .any(|t| matches!(t, Token::And | Token::With))
}

/// Recursive descent parser over [`Token`]s.
///
/// Grammar (AND binds tighter than OR):
/// ```text
/// expr     := or_expr
/// or_expr  := and_expr ( "OR" and_expr )*
/// and_expr := atom ( "AND" atom )*
/// atom     := "(" expr ")" | term ( "WITH" term )?
/// ```
/// Any malformed input or unresolvable term aborts the whole parse.
struct ExprParser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    resolve: &'a dyn Fn(&str) -> Option<String>,
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn parse_or(&mut self) -> Option<LicenseExpr> {
        let mut result = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.consume();
            let rhs = self.parse_and()?;
            result = LicenseExpr::Or(Box::new(result), Box::new(rhs));
        }
        Some(result)
    }

    fn parse_and(&mut self) -> Option<LicenseExpr> {
        let mut result = self.parse_atom()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.consume();
            let rhs = self.parse_atom()?;
            result = LicenseExpr::And(Box::new(result), Box::new(rhs));
        }
        Some(result)
    }

    fn parse_atom(&mut self) -> Option<LicenseExpr> {
        match self.consume()? {
            Token::LParen => {
                let inner = self.parse_or()?;
                match self.consume()? {
                    Token::RParen => Some(inner),
                    _ => None,
                }
            }
            Token::Term(term) => {
                let id = (self.resolve)(&term)?;
                // Exceptions narrow the base license; the base is what policy sees.
                if matches!(self.peek(), Some(Token::With)) {
                    self.consume();
                    match self.consume()? {
                        Token::Term(_) => {}
                        _ => return None,
                    }
                }
                Some(LicenseExpr::License(id))
            }
            _ => None,
        }
    }
}

/// Parse `raw` as a compound expression, resolving each term with `resolve`.
///
/// Returns `None` when the syntax is malformed or any term is unresolvable.
pub fn parse(raw: &str, resolve: &dyn Fn(&str) -> Option<String>) -> Option<LicenseExpr> {
    let tokens = tokenize(raw);
    let mut parser = ExprParser {
        tokens,
        pos: 0,
        resolve,
    };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return None;
    }
    Some(expr)
}
