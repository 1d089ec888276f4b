//! Tokenizer for query text.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::ast::{Comparator, escape_literal};
use crate::error::ParseError;

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:[^\\"]|\\.)*"|<=|>=|<|>|=|\[[^\]]*\]|[\w.]+|\*|\(|\)"#)
        .expect("static regex must compile")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Double-quoted literal, already unescaped.
    Str(String),
    Comparator(Comparator),
    /// A bare word (keyword or field reference) or a `[bracketed]` one.
    Ident { name: String, bracketed: bool },
    Star,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset in the query text.
    pub offset: usize,
}

impl Token {
    /// Upper-cased word if this is an unbracketed identifier.
    ///
    /// Keywords are only recognized unbracketed, so `[ORDER_BY]` stays a
    /// field reference.
    pub fn keyword(&self) -> Option<String> {
        match &self.kind {
            TokenKind::Ident {
                name,
                bracketed: false,
            } => Some(name.to_ascii_uppercase()),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "\"{}\"", escape_literal(s)),
            Self::Comparator(c) => write!(f, "{c}"),
            Self::Ident {
                name,
                bracketed: true,
            } => write!(f, "[{name}]"),
            Self::Ident { name, .. } => f.write_str(name),
            Self::Star => f.write_str("*"),
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
        }
    }
}

fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn classify(text: &str) -> TokenKind {
    if let Some(inner) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        return TokenKind::Str(unescape(inner));
    }
    if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        return TokenKind::Ident {
            name: inner.trim().to_string(),
            bracketed: true,
        };
    }
    match text {
        "*" => TokenKind::Star,
        "(" => TokenKind::LParen,
        ")" => TokenKind::RParen,
        _ => match Comparator::from_symbol(text) {
            Some(comparator) => TokenKind::Comparator(comparator),
            None => TokenKind::Ident {
                name: text.to_string(),
                bracketed: false,
            },
        },
    }
}

pub struct QueryLexer;

impl QueryLexer {
    /// Splits query text into tokens.
    ///
    /// Whitespace and commas separate tokens. Any other unrecognized
    /// character is an error when `strict`, and skipped otherwise.
    pub fn tokenize(input: &str, strict: bool) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        let mut last_end = 0;

        for m in TOKEN_PATTERN.find_iter(input) {
            if strict {
                check_gap(input, last_end, m.start())?;
            }
            tokens.push(Token {
                kind: classify(m.as_str()),
                offset: m.start(),
            });
            last_end = m.end();
        }
        if strict {
            check_gap(input, last_end, input.len())?;
        }
        Ok(tokens)
    }
}

fn check_gap(input: &str, start: usize, end: usize) -> Result<(), ParseError> {
    match input[start..end]
        .char_indices()
        .find(|(_, c)| !c.is_whitespace() && *c != ',')
    {
        Some((i, found)) => Err(ParseError::UnexpectedCharacter {
            offset: start + i,
            found,
        }),
        None => Ok(()),
    }
}
