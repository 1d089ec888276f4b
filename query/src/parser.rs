//! Query text to [`SearchExpression`].
//!
//! The top-level scan switches between clause readers whenever it meets one
//! of the section keywords `SELECT`, `FROM`, `WHERE` and `ORDER_BY` (any
//! case, unbracketed); every other token goes to the active reader.
//!
//! The WHERE reader keeps an explicit stack of open groups and a pending
//! boolean operator. `(` opens a group tagged with the pending operator,
//! `)` closes it into its parent, and every three buffered tokens
//! (field, comparator, literal) become one condition.
//!
//! [`Parser::strict`] (the default) rejects anything malformed.
//! [`Parser::lenient`] silently drops malformed fragments instead, for
//! compatibility with queries stored by older clients.
//!
//! # Examples
//!
//! ```
//! use catalog_query::*;
//!
//! let expr = SearchExpression::parse(r#"SELECT * FROM SI WHERE NCTN = "2""#).unwrap();
//! assert_eq!(expr.source, "SI");
//! assert_eq!(
//!     expr.where_clause.conditions(),
//!     vec![&Condition::new("NCTN", Comparator::Equal, "2")]
//! );
//!
//! let broken = r#"SELECT * FROM SI WHERE A = "x" AND B ="#;
//! assert!(SearchExpression::parse(broken).is_err());
//! let expr = Parser::lenient().parse(broken).unwrap();
//! assert_eq!(expr.where_clause.children.len(), 1);
//! ```

use std::str::FromStr;

use tracing::debug;

use crate::ast::{
    BooleanOperator, Condition, ConditionGroup, OrderingTerm, SearchExpression,
};
use crate::error::ParseError;
use crate::lexer::{QueryLexer, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    Select,
    From,
    Where,
    OrderBy,
}

impl Clause {
    fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "SELECT" => Some(Self::Select),
            "FROM" => Some(Self::From),
            "WHERE" => Some(Self::Where),
            "ORDER_BY" => Some(Self::OrderBy),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::From => "FROM",
            Self::Where => "WHERE",
            Self::OrderBy => "ORDER_BY",
        }
    }
}

fn unexpected(token: &Token, expected: &'static str) -> ParseError {
    ParseError::UnexpectedToken {
        token: token.kind.to_string(),
        offset: token.offset,
        expected,
    }
}

/// Query parser, strict or lenient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Parser {
    lenient: bool,
}

impl Parser {
    pub fn strict() -> Self {
        Self { lenient: false }
    }

    pub fn lenient() -> Self {
        Self { lenient: true }
    }

    pub fn is_lenient(&self) -> bool {
        self.lenient
    }

    /// Parses `text` into an expression.
    ///
    /// # Errors
    ///
    /// Only in strict mode: a [`ParseError`] describing the first problem.
    pub fn parse(&self, text: &str) -> Result<SearchExpression, ParseError> {
        let strict = !self.lenient;
        let tokens = QueryLexer::tokenize(text, strict)?;

        let mut expr = SearchExpression {
            select: Vec::new(),
            ..SearchExpression::default()
        };
        let mut clause: Option<Clause> = None;
        let mut seen: Vec<Clause> = Vec::new();
        let mut source_read = false;
        let mut where_reader = WhereReader::new(self.lenient);
        let mut order_reader = OrderByReader::new(self.lenient);

        for token in tokens {
            if let Some(next) = token.keyword().and_then(|k| Clause::from_keyword(&k)) {
                if seen.contains(&next) && strict {
                    return Err(ParseError::DuplicateClause(next.name()));
                }
                if strict && seen.is_empty() && next != Clause::Select {
                    return Err(unexpected(&token, "SELECT"));
                }
                seen.push(next);
                clause = Some(next);
                continue;
            }

            match clause {
                None => {
                    if strict {
                        return Err(unexpected(&token, "SELECT"));
                    }
                }
                Some(Clause::Select) => match token.kind {
                    TokenKind::Star => expr.select.push("*".to_string()),
                    TokenKind::Ident { name, .. } => expr.select.push(name),
                    _ if strict => return Err(unexpected(&token, "field reference or '*'")),
                    _ => {}
                },
                Some(Clause::From) => match token.kind {
                    TokenKind::Ident { name, .. } if !(strict && source_read) => {
                        expr.source = name;
                        source_read = true;
                    }
                    _ if strict => return Err(unexpected(&token, "end of FROM clause")),
                    _ => {}
                },
                Some(Clause::Where) => where_reader.read(token)?,
                Some(Clause::OrderBy) => order_reader.read(token)?,
            }
        }

        if strict && expr.source.is_empty() {
            return Err(ParseError::MissingSource);
        }
        expr.where_clause = where_reader.finish()?;
        expr.order_by = order_reader.terms;

        debug!(
            source = %expr.source,
            conditions = expr.where_clause.conditions().len(),
            lenient = self.lenient,
            "Parsed query"
        );
        Ok(expr)
    }
}

/// Builds the WHERE tree from a token stream.
struct WhereReader {
    lenient: bool,
    stack: Vec<ConditionGroup>,
    pending: Option<BooleanOperator>,
    buffer: Vec<Token>,
    group_offsets: Vec<usize>,
}

impl WhereReader {
    fn new(lenient: bool) -> Self {
        Self {
            lenient,
            stack: vec![ConditionGroup::new()],
            pending: None,
            buffer: Vec::new(),
            group_offsets: Vec::new(),
        }
    }

    fn current(&mut self) -> &mut ConditionGroup {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn buffered_text(&self) -> String {
        self.buffer
            .iter()
            .map(|t| t.kind.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Fails in strict mode if a condition is half-read.
    fn ensure_no_fragment(&mut self) -> Result<(), ParseError> {
        if !self.buffer.is_empty() {
            if !self.lenient {
                return Err(ParseError::IncompleteCondition(self.buffered_text()));
            }
            self.buffer.clear();
        }
        Ok(())
    }

    fn ensure_no_pending(&mut self) -> Result<(), ParseError> {
        if let Some(op) = self.pending {
            if !self.lenient {
                return Err(ParseError::DanglingOperator(op.to_string()));
            }
            self.pending = None;
        }
        Ok(())
    }

    fn read(&mut self, token: Token) -> Result<(), ParseError> {
        match token.keyword().as_deref() {
            Some(word @ ("AND" | "OR")) => {
                if !self.lenient && (self.pending.is_some() || !self.buffer.is_empty()) {
                    return Err(unexpected(&token, "condition"));
                }
                self.pending = Some(if word == "AND" {
                    BooleanOperator::And
                } else {
                    BooleanOperator::Or
                });
                return Ok(());
            }
            Some("NOT") => {
                if !self.lenient && !self.buffer.is_empty() {
                    return Err(unexpected(&token, "condition"));
                }
                self.pending = BooleanOperator::negated(self.pending);
                return Ok(());
            }
            _ => {}
        }

        match token.kind {
            TokenKind::LParen => {
                self.ensure_no_fragment()?;
                let group = ConditionGroup {
                    combinator: self.pending.take(),
                    children: Vec::new(),
                };
                self.stack.push(group);
                self.group_offsets.push(token.offset);
            }
            TokenKind::RParen => {
                self.ensure_no_fragment()?;
                self.ensure_no_pending()?;
                if self.stack.len() == 1 {
                    if self.lenient {
                        return Ok(());
                    }
                    return Err(ParseError::UnmatchedClose(token.offset));
                }
                let group = self.stack.pop().unwrap_or_default();
                let opened_at = self.group_offsets.pop().unwrap_or(token.offset);
                if group.is_empty() && !self.lenient {
                    return Err(ParseError::EmptyGroup(opened_at));
                }
                self.current().push(group);
            }
            _ => {
                if !self.lenient {
                    let expected = match self.buffer.len() {
                        0 => matches!(token.kind, TokenKind::Ident { .. })
                            .then_some(())
                            .ok_or("field reference"),
                        1 => matches!(token.kind, TokenKind::Comparator(_))
                            .then_some(())
                            .ok_or("comparator"),
                        _ => matches!(token.kind, TokenKind::Str(_))
                            .then_some(())
                            .ok_or("quoted literal"),
                    };
                    if let Err(expected) = expected {
                        return Err(unexpected(&token, expected));
                    }
                }
                self.buffer.push(token);
                if self.buffer.len() == 3 {
                    let tokens = std::mem::take(&mut self.buffer);
                    let combinator = self.pending.take();
                    if let Some(mut condition) = assemble(tokens) {
                        condition.combinator = combinator;
                        self.current().push(condition);
                    }
                }
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<ConditionGroup, ParseError> {
        self.ensure_no_fragment()?;
        self.ensure_no_pending()?;
        if self.stack.len() > 1 && !self.lenient {
            return Err(ParseError::UnclosedGroup(self.stack.len() - 1));
        }
        Ok(self.stack.into_iter().next().unwrap_or_default())
    }
}

/// Turns `field comparator literal` into a condition, or `None` if the
/// tokens do not have that shape.
fn assemble(tokens: Vec<Token>) -> Option<Condition> {
    let mut kinds = tokens.into_iter().map(|t| t.kind);
    let (Some(field), Some(comparator), Some(literal)) = (kinds.next(), kinds.next(), kinds.next())
    else {
        return None;
    };
    let TokenKind::Ident { name: field, .. } = field else {
        return None;
    };
    let TokenKind::Comparator(comparator) = comparator else {
        return None;
    };
    let literal = match literal {
        TokenKind::Str(text) => text,
        TokenKind::Ident {
            name,
            bracketed: false,
        } => name,
        _ => return None,
    };
    Some(Condition {
        combinator: None,
        field,
        comparator,
        literal,
    })
}

/// Reads `field [ASC|DESC]` entries.
struct OrderByReader {
    lenient: bool,
    terms: Vec<OrderingTerm>,
    direction_set: bool,
}

impl OrderByReader {
    fn new(lenient: bool) -> Self {
        Self {
            lenient,
            terms: Vec::new(),
            direction_set: true,
        }
    }

    fn read(&mut self, token: Token) -> Result<(), ParseError> {
        let direction = match token.keyword().as_deref() {
            Some("ASC") => Some(true),
            Some("DESC") => Some(false),
            _ => None,
        };
        if let Some(ascending) = direction {
            match self.terms.last_mut() {
                Some(term) if !self.direction_set => {
                    term.ascending = ascending;
                    self.direction_set = true;
                }
                _ if !self.lenient => return Err(unexpected(&token, "field reference")),
                _ => {}
            }
            return Ok(());
        }

        match token.kind {
            TokenKind::Ident { name, .. } => {
                self.terms.push(OrderingTerm::ascending(&name));
                self.direction_set = false;
            }
            _ if !self.lenient => return Err(unexpected(&token, "field reference")),
            _ => {}
        }
        Ok(())
    }
}

impl SearchExpression {
    /// Parses query text strictly.
    ///
    /// See [`Parser::lenient`] for the forgiving variant.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        Parser::strict().parse(text)
    }
}

impl FromStr for SearchExpression {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
