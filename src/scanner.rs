// ABOUTME: Tokenizer: turns a SourceReader into a stream of Tokens (spec §4.B)

use crate::datum::Symbol;
use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use crate::number::{self, Exactness, Number, Radix};
use crate::reader::{SourceReader, NUL};
use crate::span::{Position, Span};
use crate::token::{LiteralValue, Token, TokenKind};

const DELIMITERS: &str = " \t\r\n()[]{}\"`',";

fn is_delimiter(c: char) -> bool {
    c == NUL || DELIMITERS.contains(c)
}

/// Character names recognized after `#\` (spec §4.B item 3).
fn char_name_to_char(name: &str) -> Option<char> {
    Some(match name.to_ascii_lowercase().as_str() {
        "space" => ' ',
        "lf" | "linefeed" | "newline" => '\n',
        "cr" | "return" => '\r',
        "tab" => '\t',
        "bs" | "backspace" => '\u{8}',
        "esc" => '\u{1B}',
        "del" | "delete" => '\u{7F}',
        "nul" => '\u{0}',
        "alarm" => '\u{7}',
        "vtab" => '\u{B}',
        "ff" | "page" => '\u{C}',
        _ => return None,
    })
}

fn code_point_to_char(cp: u32) -> Option<char> {
    if cp > 0x10FFFF || (0xD800..=0xDFFF).contains(&cp) {
        None
    } else {
        char::from_u32(cp)
    }
}

pub struct Scanner {
    reader: SourceReader,
}

impl Scanner {
    pub fn new(reader: SourceReader) -> Self {
        Scanner { reader }
    }

    fn pos(&self) -> Position {
        self.reader.position()
    }

    fn span(&self, start: Position) -> Span {
        Span::new(self.reader.source_name().to_string(), start, self.pos())
    }

    fn advance(&mut self) -> char {
        let c = self.reader.current_char();
        self.reader.advance();
        c
    }

    /// Reads a delimiter-terminated run of characters (spec §4.B item 8).
    fn read_atom(&mut self) -> String {
        let mut s = String::new();
        while !is_delimiter(self.reader.current_char()) {
            s.push(self.advance());
        }
        s
    }

    /// Extracts the maximal-munch lexeme starting at the current position
    /// that `number::scan_number` can consume, without assuming a
    /// `Clone`-able reader: advances over a delimiter-terminated run via
    /// save/restore, hands the text to the numeric grammar, then restores
    /// and re-advances by the number of characters actually consumed.
    fn try_scan_number(&mut self, radix: Radix, exactness: Exactness) -> Result<Option<Number>, number::NumberError> {
        self.reader.save();
        let mut text = String::new();
        while !is_delimiter(self.reader.current_char()) {
            text.push(self.reader.current_char());
            self.reader.advance();
        }
        self.reader.restore();

        match number::scan_number(&text, radix, exactness) {
            Ok(Some((value, rest))) => {
                let consumed = text.chars().count() - rest.chars().count();
                for _ in 0..consumed {
                    self.reader.advance();
                }
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                // Consume the whole probed lexeme so the caller makes
                // forward progress even though no valid number resulted.
                for _ in 0..text.chars().count() {
                    self.reader.advance();
                }
                Err(e)
            }
        }
    }

    fn read_string_literal(&mut self, diagnostics: &mut DiagnosticSink, start: Position) -> String {
        let mut s = String::new();
        loop {
            let c = self.reader.current_char();
            if c == NUL {
                diagnostics.push(Diagnostic::error(
                    DiagnosticCode::UnterminatedStringLiteral,
                    "unterminated string literal",
                    self.span(start),
                ));
                break;
            }
            if c == '"' {
                self.advance();
                break;
            }
            if c == '\\' {
                self.advance();
                self.read_string_escape(&mut s, diagnostics, start);
                continue;
            }
            s.push(self.advance());
        }
        s
    }

    fn read_string_escape(&mut self, out: &mut String, diagnostics: &mut DiagnosticSink, string_start: Position) {
        let c = self.advance();
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'a' => out.push('\u{7}'),
            'f' => out.push('\u{C}'),
            'v' => out.push('\u{B}'),
            'e' => out.push('\u{1B}'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            'x' => {
                if let Some(ch) = self.read_hex_escape(diagnostics, string_start) {
                    out.push(ch);
                }
            }
            '\n' | '\u{0085}' | '\u{2028}' => {
                // line continuation: swallow the newline, already consumed
            }
            ' ' | '\t' => {
                // whitespace before a line continuation
                let mut lookahead = String::new();
                lookahead.push(c);
                while matches!(self.reader.current_char(), ' ' | '\t') {
                    lookahead.push(self.advance());
                }
                if matches!(self.reader.current_char(), '\n' | '\u{0085}' | '\u{2028}') {
                    self.advance();
                } else {
                    diagnostics.push(Diagnostic::error(
                        DiagnosticCode::UnknownEscapeCharacter,
                        format!("unknown escape character '\\{c}'"),
                        self.span(string_start),
                    ));
                    out.push('?');
                }
            }
            other => {
                diagnostics.push(Diagnostic::error(
                    DiagnosticCode::UnknownEscapeCharacter,
                    format!("unknown escape character '\\{other}'"),
                    self.span(string_start),
                ));
                out.push('?');
            }
        }
    }

    fn read_hex_escape(&mut self, diagnostics: &mut DiagnosticSink, start: Position) -> Option<char> {
        let mut hex = String::new();
        while self.reader.current_char().is_ascii_hexdigit() {
            hex.push(self.advance());
        }
        if self.reader.current_char() == ';' {
            self.advance();
        } else {
            diagnostics.push(Diagnostic::error(DiagnosticCode::InvalidHexEscape, "expected ';' to close hex escape", self.span(start)));
            return None;
        }
        if hex.is_empty() {
            diagnostics.push(Diagnostic::error(DiagnosticCode::InvalidHexEscape, "empty hex escape", self.span(start)));
            return None;
        }
        match u32::from_str_radix(&hex, 16).ok().and_then(code_point_to_char) {
            Some(ch) => Some(ch),
            None => {
                diagnostics.push(Diagnostic::error(DiagnosticCode::InvalidHexEscape, format!("invalid hex escape \\x{hex};"), self.span(start)));
                None
            }
        }
    }

    fn skip_block_comment(&mut self, diagnostics: &mut DiagnosticSink, start: Position) {
        let mut depth = 1usize;
        loop {
            match self.reader.current_char() {
                NUL => {
                    diagnostics.push(Diagnostic::error(DiagnosticCode::UnterminatedComment, "unterminated block comment", self.span(start)));
                    return;
                }
                '#' => {
                    self.advance();
                    if self.reader.current_char() == '|' {
                        self.advance();
                        depth += 1;
                    }
                }
                '|' => {
                    self.advance();
                    if self.reader.current_char() == '#' {
                        self.advance();
                        depth -= 1;
                        if depth == 0 {
                            return;
                        }
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn read_char_literal(&mut self, diagnostics: &mut DiagnosticSink, start: Position) -> char {
        let first = self.advance();
        if !is_delimiter(self.reader.current_char()) && (first.is_ascii_alphabetic()) {
            let mut name = String::new();
            name.push(first);
            while !is_delimiter(self.reader.current_char()) {
                name.push(self.advance());
            }
            if (first == 'x' || first == 'X') && name.len() > 1 && name[1..].chars().all(|c| c.is_ascii_hexdigit()) {
                if let Some(cp) = u32::from_str_radix(&name[1..], 16).ok().and_then(code_point_to_char) {
                    return cp;
                }
                diagnostics.push(Diagnostic::error(DiagnosticCode::InvalidHexCharacter, format!("invalid character code #\\{name}"), self.span(start)));
                return '\u{FFFD}';
            }
            if let Some(ch) = char_name_to_char(&name) {
                return ch;
            }
            diagnostics.push(Diagnostic::error(DiagnosticCode::UnknownCharacterName, format!("unknown character name '{name}'"), self.span(start)));
            '\u{FFFD}'
        } else {
            first
        }
    }

    /// Produces the next token, or an EOF token once every source is
    /// exhausted (spec §4.B item 7).
    pub fn next_token(&mut self, diagnostics: &mut DiagnosticSink) -> Token {
        loop {
            self.reader.skip_whitespace();

            if self.reader.current_char() == NUL {
                if self.reader.advance_source() {
                    continue;
                }
                let p = self.pos();
                return Token::new(TokenKind::Eof, Span::new(self.reader.source_name().to_string(), p, p));
            }

            let start = self.pos();
            let c = self.reader.current_char();

            if c == ';' {
                while !matches!(self.reader.current_char(), '\n' | NUL) {
                    self.advance();
                }
                continue;
            }

            if c == '#' {
                if let Some(tok) = self.scan_hash(diagnostics, start) {
                    return tok;
                }
                continue;
            }

            if c == '"' {
                self.advance();
                let s = self.read_string_literal(diagnostics, start);
                return Token::new(TokenKind::Literal(LiteralValue::String(s)), self.span(start));
            }

            if c.is_ascii_digit() || ((c == '.' || c == '-' || c == '+') && self.looks_like_number_start()) {
                match self.try_scan_number(Radix::Decimal, Exactness::Unspecified) {
                    Ok(Some(n)) => return Token::new(TokenKind::Literal(LiteralValue::Number(n)), self.span(start)),
                    Ok(None) => {}
                    Err(e) => {
                        diagnostics.push(Diagnostic::error(DiagnosticCode::DivisionByZero, e.to_string(), self.span(start)));
                        return Token::new(TokenKind::Literal(LiteralValue::Number(Number::Double(f64::NAN))), self.span(start));
                    }
                }
            }

            match c {
                '(' => {
                    self.advance();
                    return Token::new(TokenKind::LParen, self.span(start));
                }
                ')' => {
                    self.advance();
                    return Token::new(TokenKind::RParen, self.span(start));
                }
                '[' => {
                    self.advance();
                    return Token::new(TokenKind::LBracket, self.span(start));
                }
                ']' => {
                    self.advance();
                    return Token::new(TokenKind::RBracket, self.span(start));
                }
                '{' => {
                    self.advance();
                    return Token::new(TokenKind::LCurly, self.span(start));
                }
                '}' => {
                    self.advance();
                    return Token::new(TokenKind::RCurly, self.span(start));
                }
                '\'' => {
                    self.advance();
                    return Token::new(TokenKind::Quote, self.span(start));
                }
                '`' => {
                    self.advance();
                    return Token::new(TokenKind::BackQuote, self.span(start));
                }
                ',' => {
                    self.advance();
                    if self.reader.current_char() == '@' {
                        self.advance();
                        return Token::new(TokenKind::Splice, self.span(start));
                    }
                    return Token::new(TokenKind::Comma, self.span(start));
                }
                '.' if is_delimiter(self.peek_after_dot()) => {
                    self.advance();
                    return Token::new(TokenKind::Period, self.span(start));
                }
                _ => {}
            }

            let atom = self.read_atom();
            if atom.is_empty() {
                // current char is something we don't otherwise recognize;
                // consume it to guarantee forward progress.
                self.advance();
                diagnostics.push(Diagnostic::error(DiagnosticCode::UnexpectedToken, format!("unexpected character '{c}'"), self.span(start)));
                continue;
            }
            if atom == "nil" {
                return Token::new(TokenKind::Literal(LiteralValue::Null), self.span(start));
            }
            return Token::new(TokenKind::Symbol(Symbol::intern(&atom)), self.span(start));
        }
    }

    fn peek_after_dot(&mut self) -> char {
        self.reader.save();
        self.reader.advance();
        let c = self.reader.current_char();
        self.reader.restore();
        c
    }

    /// A `.`/`-`/`+` only starts a number if followed by a digit or `.`
    /// (otherwise it is the dot token or a symbol like `-` or `+`).
    fn looks_like_number_start(&mut self) -> bool {
        self.reader.save();
        self.reader.advance();
        let c = self.reader.current_char();
        self.reader.restore();
        c.is_ascii_digit() || c == '.'
    }

    fn scan_hash(&mut self, diagnostics: &mut DiagnosticSink, start: Position) -> Option<Token> {
        self.advance(); // consume '#'
        match self.reader.current_char() {
            't' | 'T' => {
                self.read_atom();
                Some(Token::new(TokenKind::Literal(LiteralValue::Bool(true)), self.span(start)))
            }
            'f' | 'F' => {
                self.read_atom();
                Some(Token::new(TokenKind::Literal(LiteralValue::Bool(false)), self.span(start)))
            }
            '\\' => {
                self.advance();
                let ch = self.read_char_literal(diagnostics, start);
                Some(Token::new(TokenKind::Literal(LiteralValue::Char(ch)), self.span(start)))
            }
            '%' => {
                self.advance();
                let name = self.read_atom();
                Some(Token::new(TokenKind::Symbol(Symbol::intern(&format!("#%{name}"))), self.span(start)))
            }
            '"' | '\'' => {
                let delim = self.advance();
                let mut s = String::new();
                loop {
                    match self.reader.current_char() {
                        NUL => {
                            diagnostics.push(Diagnostic::error(DiagnosticCode::UnterminatedStringLiteral, "unterminated literal string", self.span(start)));
                            break;
                        }
                        c if c == delim => {
                            self.advance();
                            if self.reader.current_char() == delim {
                                s.push(self.advance());
                                continue;
                            }
                            break;
                        }
                        _ => s.push(self.advance()),
                    }
                }
                Some(Token::new(TokenKind::Literal(LiteralValue::String(s)), self.span(start)))
            }
            '(' => {
                self.advance();
                Some(Token::new(TokenKind::VectorOpen, self.span(start)))
            }
            '|' => {
                self.advance();
                self.skip_block_comment(diagnostics, start);
                None
            }
            ';' => {
                self.advance();
                Some(Token::new(TokenKind::DatumComment, self.span(start)))
            }
            '<' => {
                while !matches!(self.reader.current_char(), '>' | NUL) {
                    self.advance();
                }
                if self.reader.current_char() == '>' {
                    self.advance();
                }
                diagnostics.push(Diagnostic::error(DiagnosticCode::UnreadableForm, "unreadable #<...> form", self.span(start)));
                None
            }
            flag if number::radix_from_flag(flag).is_some() || number::exactness_from_flag(flag).is_some() => {
                self.scan_flagged_number(diagnostics, start)
            }
            other => {
                diagnostics.push(Diagnostic::error(DiagnosticCode::UnknownNotation, format!("unknown '#' notation '#{other}'"), self.span(start)));
                self.advance();
                None
            }
        }
    }

    fn scan_flagged_number(&mut self, diagnostics: &mut DiagnosticSink, start: Position) -> Option<Token> {
        let mut radix = None;
        let mut exactness = None;
        loop {
            let c = self.reader.current_char();
            if let Some(r) = number::radix_from_flag(c) {
                if radix.is_some() {
                    diagnostics.push(Diagnostic::error(DiagnosticCode::MultipleRadixFlags, "multiple radix flags", self.span(start)));
                }
                radix = Some(r);
                self.advance();
            } else if let Some(e) = number::exactness_from_flag(c) {
                if exactness.is_some() {
                    diagnostics.push(Diagnostic::error(DiagnosticCode::MultipleExactnessFlags, "multiple exactness flags", self.span(start)));
                }
                exactness = Some(e);
                self.advance();
            } else if c == '#' {
                self.advance();
            } else {
                break;
            }
        }
        let radix = radix.unwrap_or(Radix::Decimal);
        let exactness = exactness.unwrap_or(Exactness::Unspecified);
        match self.try_scan_number(radix, exactness) {
            Ok(Some(n)) => Some(Token::new(TokenKind::Literal(LiteralValue::Number(n)), self.span(start))),
            Ok(None) => {
                diagnostics.push(Diagnostic::error(DiagnosticCode::ExpectedNumber, "expected a number after radix/exactness flags", self.span(start)));
                None
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error(DiagnosticCode::DivisionByZero, e.to_string(), self.span(start)));
                None
            }
        }
    }
}

/// Single-token-lookahead view over a [`Scanner`], used by the datum
/// parser (spec §4.C needs one token of lookahead to distinguish forms).
pub struct TokenStream {
    scanner: Scanner,
    lookahead: Option<Token>,
}

impl TokenStream {
    pub fn new(scanner: Scanner) -> Self {
        TokenStream { scanner, lookahead: None }
    }

    pub fn peek(&mut self, diagnostics: &mut DiagnosticSink) -> &Token {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.scanner.next_token(diagnostics));
        }
        self.lookahead.as_ref().unwrap()
    }

    pub fn next(&mut self, diagnostics: &mut DiagnosticSink) -> Token {
        if let Some(tok) = self.lookahead.take() {
            return tok;
        }
        self.scanner.next_token(diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> (Vec<Token>, DiagnosticSink) {
        let mut scanner = Scanner::new(SourceReader::single("t", src));
        let mut sink = DiagnosticSink::new();
        let mut out = Vec::new();
        loop {
            let tok = scanner.next_token(&mut sink);
            let is_eof = tok.is_eof();
            out.push(tok);
            if is_eof {
                break;
            }
        }
        (out, sink)
    }

    #[test]
    fn scans_parens_and_symbol() {
        let (toks, sink) = tokens("(foo)");
        assert!(sink.is_empty());
        assert!(matches!(toks[0].kind, TokenKind::LParen));
        assert!(matches!(toks[1].kind, TokenKind::Symbol(_)));
        assert!(matches!(toks[2].kind, TokenKind::RParen));
    }

    #[test]
    fn scans_bool_and_number() {
        let (toks, _) = tokens("#t 42");
        assert!(matches!(toks[0].kind, TokenKind::Literal(LiteralValue::Bool(true))));
        assert!(matches!(toks[1].kind, TokenKind::Literal(LiteralValue::Number(Number::SmallInt(42)))));
    }

    #[test]
    fn scans_string_with_hex_escape() {
        let (toks, sink) = tokens("\"\\x41bc;\"");
        assert!(sink.is_empty());
        match &toks[0].kind {
            TokenKind::Literal(LiteralValue::String(s)) => assert_eq!(s, "\u{41bc}"),
            other => panic!("expected string literal, got {other:?}"),
        }
    }

    #[test]
    fn bad_hex_escape_reports_nl506() {
        let (_, sink) = tokens("\"\\x;\"");
        assert!(sink.has_errors());
        assert_eq!(sink.iter().next().unwrap().code, DiagnosticCode::InvalidHexEscape);
    }

    #[test]
    fn nestable_block_comment_is_skipped() {
        let (toks, sink) = tokens("#| outer #| inner |# still-outer |# 7");
        assert!(sink.is_empty());
        assert!(matches!(toks[0].kind, TokenKind::Literal(LiteralValue::Number(Number::SmallInt(7)))));
    }

    #[test]
    fn unterminated_block_comment_reports_diagnostic() {
        let (_, sink) = tokens("#| oops");
        assert!(sink.has_errors());
    }

    #[test]
    fn datum_comment_token_is_emitted() {
        let (toks, sink) = tokens("#;(ignored) 42");
        assert!(sink.is_empty());
        assert!(matches!(toks[0].kind, TokenKind::DatumComment));
    }

    #[test]
    fn char_literal_by_hex_code_point() {
        let (toks, sink) = tokens("#\\x03bb");
        assert!(sink.is_empty());
        assert!(matches!(toks[0].kind, TokenKind::Literal(LiteralValue::Char('\u{3bb}'))));
    }

    #[test]
    fn char_literal_too_large_reports_nl505() {
        let (_, sink) = tokens("#\\x110000");
        assert_eq!(sink.iter().next().unwrap().code, DiagnosticCode::InvalidHexCharacter);
    }

    #[test]
    fn quote_and_splice_tokens() {
        let (toks, _) = tokens("',@x");
        assert!(matches!(toks[0].kind, TokenKind::Quote));
        assert!(matches!(toks[1].kind, TokenKind::Splice));
        assert!(matches!(toks[2].kind, TokenKind::Symbol(_)));
    }

    #[test]
    fn nil_atom_is_literal_null() {
        let (toks, _) = tokens("nil");
        assert!(matches!(toks[0].kind, TokenKind::Literal(LiteralValue::Null)));
    }

    #[test]
    fn unreadable_hash_angle_reports_nl503() {
        let (_, sink) = tokens("#<procedure>");
        assert_eq!(sink.iter().next().unwrap().code, DiagnosticCode::UnreadableForm);
    }
}
