// ABOUTME: Token and TokenKind produced by the scanner

use crate::datum::Symbol;
use crate::number::Number;
use crate::span::Span;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TokenKind {
    Literal(LiteralValue),
    Symbol(Symbol),
    VectorOpen,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LCurly,
    RCurly,
    Quote,
    BackQuote,
    Period,
    Comma,
    Splice,
    DatumComment,
    Eof,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LiteralValue {
    Null,
    Bool(bool),
    Char(char),
    String(String),
    Number(Number),
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Token { kind, span }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}
