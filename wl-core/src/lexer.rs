//! Lexer for WL source files.
//!
//! The lexer turns a byte buffer into tokens on demand. Newlines are
//! significant (they terminate statements and definitions) and are
//! produced as `Newline` tokens; all other ASCII whitespace is
//! skipped. Scanning past the end keeps returning `Eof`.

use crate::diagnostic::{Diagnostic, codes};
use crate::source::{FileId, Position};

/// Kind of a token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Special
    Eof,
    Newline,

    // Identifiers and literals
    Ident,
    Int,
    Float,
    Str,

    // Punctuation
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    LParen,       // (
    RParen,       // )
    LBrace,       // {
    RBrace,       // }
    Equal,        // =
    EqualEqual,   // ==
    BangEqual,    // !=
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=
    Amp,          // &
    Comma,        // ,
    Colon,        // :
    ColonColon,   // ::
    ColonEqual,   // :=
    Dot,          // .

    // Keywords
    KwVar,
    KwFun,
    KwImport,
    KwStruct,
    KwReturn,
    KwExtern,
    KwTrue,
    KwFalse,
    KwIf,
    KwElse,
    KwAs,
    KwWhile,
    KwBreak,
    KwContinue,
    KwTypealias,
    KwMut,
}

impl TokenKind {
    /// Human-readable description used in parse error messages.
    pub fn describe(self) -> &'static str {
        use TokenKind::*;
        match self {
            Eof => "end of file",
            Newline => "newline",
            Ident => "identifier",
            Int => "integer literal",
            Float => "float literal",
            Str => "string literal",
            Plus => "`+`",
            Minus => "`-`",
            Star => "`*`",
            Slash => "`/`",
            LParen => "`(`",
            RParen => "`)`",
            LBrace => "`{`",
            RBrace => "`}`",
            Equal => "`=`",
            EqualEqual => "`==`",
            BangEqual => "`!=`",
            Less => "`<`",
            LessEqual => "`<=`",
            Greater => "`>`",
            GreaterEqual => "`>=`",
            Amp => "`&`",
            Comma => "`,`",
            Colon => "`:`",
            ColonColon => "`::`",
            ColonEqual => "`:=`",
            Dot => "`.`",
            KwVar => "`var`",
            KwFun => "`fun`",
            KwImport => "`import`",
            KwStruct => "`struct`",
            KwReturn => "`return`",
            KwExtern => "`extern`",
            KwTrue => "`true`",
            KwFalse => "`false`",
            KwIf => "`if`",
            KwElse => "`else`",
            KwAs => "`as`",
            KwWhile => "`while`",
            KwBreak => "`break`",
            KwContinue => "`continue`",
            KwTypealias => "`typealias`",
            KwMut => "`mut`",
        }
    }
}

/// A single token: kind, decoded content, and source position.
///
/// For string literals the content is the decoded text with the
/// quotes stripped; for everything else it is the raw lexeme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub content: String,
    pub position: Position,
}

/// Lex a whole source buffer into tokens ending in exactly one Eof.
pub fn lex(file: FileId, source: &str) -> Result<Vec<Token>, Diagnostic> {
    let mut lexer = Lexer::new(file, source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.scan()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

/// On-demand scanner over a byte buffer.
pub struct Lexer<'src> {
    file: FileId,
    source: &'src str,
    bytes: &'src [u8],
    index: usize,
    line: u32,
}

impl<'src> Lexer<'src> {
    pub fn new(file: FileId, source: &'src str) -> Lexer<'src> {
        Lexer {
            file,
            source,
            bytes: source.as_bytes(),
            index: 0,
            line: 1,
        }
    }

    fn position(&self) -> Position {
        Position::new(self.file, self.line)
    }

    /// Scan the next token. Returns `Eof` forever once the buffer is
    /// exhausted.
    pub fn scan(&mut self) -> Result<Token, Diagnostic> {
        self.skip_trivia();

        let Some(ch) = self.peek() else {
            return Ok(self.simple(TokenKind::Eof, ""));
        };

        let start = self.index;
        match ch {
            b'\n' => {
                let token = self.simple(TokenKind::Newline, "\n");
                self.consume();
                self.line += 1;
                Ok(token)
            }
            b'+' => Ok(self.punct(TokenKind::Plus)),
            b'-' => Ok(self.punct(TokenKind::Minus)),
            b'*' => Ok(self.punct(TokenKind::Star)),
            b'/' => Ok(self.punct(TokenKind::Slash)),
            b'(' => Ok(self.punct(TokenKind::LParen)),
            b')' => Ok(self.punct(TokenKind::RParen)),
            b'{' => Ok(self.punct(TokenKind::LBrace)),
            b'}' => Ok(self.punct(TokenKind::RBrace)),
            b',' => Ok(self.punct(TokenKind::Comma)),
            b'.' => Ok(self.punct(TokenKind::Dot)),
            b'&' => Ok(self.punct(TokenKind::Amp)),
            b'=' => {
                self.consume();
                if self.peek() == Some(b'=') {
                    self.consume();
                    Ok(self.simple(TokenKind::EqualEqual, "=="))
                } else {
                    Ok(self.simple(TokenKind::Equal, "="))
                }
            }
            b'!' => {
                if self.peek_next() == Some(b'=') {
                    self.consume();
                    self.consume();
                    Ok(self.simple(TokenKind::BangEqual, "!="))
                } else {
                    self.consume();
                    Err(self.unexpected_character('!'))
                }
            }
            b'<' => {
                self.consume();
                if self.peek() == Some(b'=') {
                    self.consume();
                    Ok(self.simple(TokenKind::LessEqual, "<="))
                } else {
                    Ok(self.simple(TokenKind::Less, "<"))
                }
            }
            b'>' => {
                self.consume();
                if self.peek() == Some(b'=') {
                    self.consume();
                    Ok(self.simple(TokenKind::GreaterEqual, ">="))
                } else {
                    Ok(self.simple(TokenKind::Greater, ">"))
                }
            }
            b':' => {
                self.consume();
                match self.peek() {
                    Some(b':') => {
                        self.consume();
                        Ok(self.simple(TokenKind::ColonColon, "::"))
                    }
                    Some(b'=') => {
                        self.consume();
                        Ok(self.simple(TokenKind::ColonEqual, ":="))
                    }
                    _ => Ok(self.simple(TokenKind::Colon, ":")),
                }
            }
            b'"' => self.lex_string(),
            b'0'..=b'9' => Ok(self.lex_number(start)),
            _ => {
                if is_ident_start(ch) {
                    Ok(self.lex_ident_or_keyword(start))
                } else {
                    self.consume();
                    Err(self.unexpected_character(ch as char))
                }
            }
        }
    }

    /// Skip whitespace (other than newline) and comments. A block
    /// comment left open at end of file is tolerated.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') => {
                    self.consume();
                }
                Some(b'/') if self.peek_next() == Some(b'/') => {
                    while let Some(ch) = self.peek() {
                        if ch == b'\n' {
                            break;
                        }
                        self.consume();
                    }
                }
                Some(b'/') if self.peek_next() == Some(b'*') => {
                    self.consume();
                    self.consume();
                    loop {
                        match self.peek() {
                            None => break,
                            Some(b'*') if self.peek_next() == Some(b'/') => {
                                self.consume();
                                self.consume();
                                break;
                            }
                            Some(b'\n') => {
                                self.consume();
                                self.line += 1;
                            }
                            Some(_) => self.consume(),
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn punct(&mut self, kind: TokenKind) -> Token {
        let start = self.index;
        self.consume();
        let content = self.source[start..self.index].to_string();
        Token {
            kind,
            content,
            position: self.position(),
        }
    }

    fn simple(&self, kind: TokenKind, content: &str) -> Token {
        Token {
            kind,
            content: content.to_string(),
            position: self.position(),
        }
    }

    fn unexpected_character(&self, ch: char) -> Diagnostic {
        Diagnostic::error(format!("unexpected character `{ch}`"), self.position())
            .with_code(codes::UNEXPECTED_CHARACTER)
    }

    fn lex_string(&mut self) -> Result<Token, Diagnostic> {
        // The error position for an unterminated string is the line
        // of the opening quote, not wherever scanning stopped.
        let open = self.position();
        self.consume();

        let mut content = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(Diagnostic::error("unterminated string literal", open)
                        .with_code(codes::UNTERMINATED_STRING));
                }
                Some(b'"') => {
                    self.consume();
                    return Ok(Token {
                        kind: TokenKind::Str,
                        content,
                        position: open,
                    });
                }
                Some(b'\\') => {
                    self.consume();
                    match self.peek() {
                        None => {
                            return Err(Diagnostic::error("unterminated string literal", open)
                                .with_code(codes::UNTERMINATED_STRING));
                        }
                        Some(esc) => {
                            if esc == b'\n' {
                                self.line += 1;
                            }
                            content.push(decode_escape(esc));
                            self.consume();
                        }
                    }
                }
                Some(b'\n') => {
                    self.line += 1;
                    content.push('\n');
                    self.consume();
                }
                Some(ch) if ch.is_ascii() => {
                    content.push(ch as char);
                    self.consume();
                }
                Some(_) => {
                    // multi-byte UTF-8; keep the whole character intact
                    for ch in self.source[self.index..].chars().take(1) {
                        content.push(ch);
                        self.index += ch.len_utf8();
                    }
                }
            }
        }
    }

    fn lex_number(&mut self, start: usize) -> Token {
        let position = self.position();
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.consume();
        }
        let mut kind = TokenKind::Int;
        if self.peek() == Some(b'.') {
            // A trailing `.` without digits still makes a float.
            kind = TokenKind::Float;
            self.consume();
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.consume();
            }
        }
        Token {
            kind,
            content: self.source[start..self.index].to_string(),
            position,
        }
    }

    fn lex_ident_or_keyword(&mut self, start: usize) -> Token {
        let position = self.position();
        while let Some(ch) = self.peek() {
            if is_ident_continue(ch) {
                self.consume();
            } else {
                break;
            }
        }
        let text = &self.source[start..self.index];
        let kind = keyword_kind(text).unwrap_or(TokenKind::Ident);
        Token {
            kind,
            content: text.to_string(),
            position,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.bytes.get(self.index + 1).copied()
    }

    fn consume(&mut self) {
        if self.index < self.bytes.len() {
            self.index += 1;
        }
    }
}

/// Keyword table applied after an identifier lexeme is formed.
fn keyword_kind(text: &str) -> Option<TokenKind> {
    let kind = match text {
        "var" => TokenKind::KwVar,
        "fun" => TokenKind::KwFun,
        "import" => TokenKind::KwImport,
        "struct" => TokenKind::KwStruct,
        "return" => TokenKind::KwReturn,
        "extern" => TokenKind::KwExtern,
        "true" => TokenKind::KwTrue,
        "false" => TokenKind::KwFalse,
        "if" => TokenKind::KwIf,
        "else" => TokenKind::KwElse,
        "as" => TokenKind::KwAs,
        "while" => TokenKind::KwWhile,
        "break" => TokenKind::KwBreak,
        "continue" => TokenKind::KwContinue,
        "typealias" => TokenKind::KwTypealias,
        "mut" => TokenKind::KwMut,
        _ => return None,
    };
    Some(kind)
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

fn decode_escape(ch: u8) -> char {
    match ch {
        b'a' => '\x07',
        b'b' => '\x08',
        b'f' => '\x0c',
        b'n' => '\n',
        b'r' => '\r',
        b't' => '\t',
        b'v' => '\x0b',
        b'\\' => '\\',
        b'"' => '"',
        other => other as char,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(FileId(0), source)
            .expect("lex")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn empty_source_produces_only_eof() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn eof_is_idempotent() {
        let mut lexer = Lexer::new(FileId(0), "x");
        assert_eq!(lexer.scan().unwrap().kind, TokenKind::Ident);
        assert_eq!(lexer.scan().unwrap().kind, TokenKind::Eof);
        assert_eq!(lexer.scan().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn recognizes_keywords_after_lexeme() {
        assert_eq!(kinds("var"), vec![TokenKind::KwVar, TokenKind::Eof]);
        assert_eq!(kinds("varx"), vec![TokenKind::Ident, TokenKind::Eof]);
        assert_eq!(kinds("mut"), vec![TokenKind::KwMut, TokenKind::Eof]);
    }

    #[test]
    fn two_char_operators_are_greedy() {
        assert_eq!(
            kinds("== = <= < :: := : !="),
            vec![
                TokenKind::EqualEqual,
                TokenKind::Equal,
                TokenKind::LessEqual,
                TokenKind::Less,
                TokenKind::ColonColon,
                TokenKind::ColonEqual,
                TokenKind::Colon,
                TokenKind::BangEqual,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn newlines_are_tokens_and_advance_lines() {
        let tokens = lex(FileId(0), "a\nb").expect("lex");
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::Ident,
                TokenKind::Newline,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
        assert_eq!(tokens[0].position.line, 1);
        assert_eq!(tokens[2].position.line, 2);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("a // trailing\nb /* block\nstill */ c"),
            vec![
                TokenKind::Ident,
                TokenKind::Newline,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn unterminated_block_comment_is_tolerated() {
        assert_eq!(kinds("a /* never closed"), vec![TokenKind::Ident, TokenKind::Eof]);
    }

    #[test]
    fn block_comment_newlines_advance_line_counter() {
        let tokens = lex(FileId(0), "/* one\ntwo */ x").expect("lex");
        assert_eq!(tokens[0].position.line, 2);
    }

    #[test]
    fn string_content_is_decoded() {
        let tokens = lex(FileId(0), r#""a\tb\"c\\""#).expect("lex");
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].content, "a\tb\"c\\");
    }

    #[test]
    fn string_content_keeps_non_ascii_text() {
        let tokens = lex(FileId(0), "\"caf\u{e9} \u{3053}\u{3093}\"").expect("lex");
        assert_eq!(tokens[0].content, "caf\u{e9} \u{3053}\u{3093}");
    }

    #[test]
    fn string_newlines_advance_line_counter() {
        let tokens = lex(FileId(0), "\"one\ntwo\" x").expect("lex");
        assert_eq!(tokens[0].content, "one\ntwo");
        assert_eq!(tokens[1].position.line, 2);
    }

    #[test]
    fn unterminated_string_reports_opening_line() {
        let err = lex(FileId(0), "\n\n\"oops").unwrap_err();
        assert_eq!(err.code, Some(codes::UNTERMINATED_STRING));
        assert_eq!(err.position.line, 3);
    }

    #[test]
    fn numbers_with_and_without_fraction() {
        let tokens = lex(FileId(0), "12 3.5 7.").expect("lex");
        assert_eq!(tokens[0].kind, TokenKind::Int);
        assert_eq!(tokens[1].kind, TokenKind::Float);
        assert_eq!(tokens[2].kind, TokenKind::Float);
        assert_eq!(tokens[2].content, "7.");
    }

    #[test]
    fn unknown_character_is_an_error() {
        let err = lex(FileId(0), "a $ b").unwrap_err();
        assert_eq!(err.code, Some(codes::UNEXPECTED_CHARACTER));
    }
}
