//! Token definitions and the script lexer.
//!
//! Raw lexemes are recognised by a logos-derived automaton. Words are then
//! lower-cased (the language is case-insensitive) and classified as reserved
//! words, colorspace names, or constants, in that order. Anything the
//! automaton cannot match is reported as a diagnostic and skipped, so a
//! single bad character does not end the scan.

use std::fmt;
use std::rc::Rc;

use logos::Logos;

use crate::error::{MapError, Result};

use super::diagnostic::{Diagnostic, Diagnostics};
use super::span::{LineIndex, Span};

/// Raw lexemes recognised by the automaton, before keyword classification.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum Lexeme {
    #[regex(r"[0-9]+(\.[0-9]+)?|\.[0-9]+", |lex| lex.slice().parse::<f32>().ok())]
    Number(f32),

    #[regex(r#"'([^'\\\n]|\\[^\n])*'"#)]
    #[regex(r#""([^"\\\n]|\\[^\n])*""#)]
    Str,

    #[regex(r#"'([^'\\\n]|\\[^\n])*"#)]
    #[regex(r#""([^"\\\n]|\\[^\n])*"#)]
    UnterminatedStr,

    #[regex(r"\$[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice()[1..].to_string())]
    ScalarVar(String),

    #[regex(r"\$\$[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice()[2..].to_string())]
    VectorVar(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Word,

    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token("==")]
    Eq,
    #[token("!=")]
    #[token("<>")]
    Ne,

    #[token("&")]
    And,
    #[token("|")]
    Or,
    #[token("^")]
    Xor,
    #[token("~")]
    Tilde,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("..")]
    DotDot,
    #[token("+-")]
    PlusMinus,

    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,

    #[token("=")]
    Assign,
    #[token("*=")]
    MulAssign,
    #[token("/=")]
    DivAssign,
    #[token("+=")]
    AddAssign,
    #[token("-=")]
    SubAssign,
}

/// Reserved words of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Alpha,
    Require,
    Allow,
    Forbid,
    As,
    Do,
    End,
    On,
    Pixels,
    Having,
    Using,
    In,
}

impl Keyword {
    fn lookup(word: &str) -> Option<Self> {
        let keyword = match word {
            "alpha" => Keyword::Alpha,
            "require" => Keyword::Require,
            "allow" => Keyword::Allow,
            "forbid" => Keyword::Forbid,
            "as" => Keyword::As,
            "do" => Keyword::Do,
            "end" => Keyword::End,
            "on" => Keyword::On,
            "pixels" => Keyword::Pixels,
            "having" => Keyword::Having,
            "using" => Keyword::Using,
            "in" => Keyword::In,
            _ => return None,
        };
        Some(keyword)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Alpha => "alpha",
            Keyword::Require => "require",
            Keyword::Allow => "allow",
            Keyword::Forbid => "forbid",
            Keyword::As => "as",
            Keyword::Do => "do",
            Keyword::End => "end",
            Keyword::On => "on",
            Keyword::Pixels => "pixels",
            Keyword::Having => "having",
            Keyword::Using => "using",
            Keyword::In => "in",
        }
    }
}

/// Colorspace names the lexer recognises as `Space` tokens.
pub const SPACE_NAMES: [&str; 6] = ["rgb", "hsv", "xyz", "lab", "luv", "hed"];

/// Classified token kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f32),
    Str(String),
    ScalarVar(String),
    VectorVar(String),
    Keyword(Keyword),
    Space(String),
    Boolean(bool),
    None,

    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
    And,
    Or,
    Xor,
    Tilde,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    LBracket,
    RBracket,
    DotDot,
    PlusMinus,
    Colon,
    Semicolon,
    Comma,
    Dot,
    Assign,
    MulAssign,
    DivAssign,
    AddAssign,
    SubAssign,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            TokenKind::Number(n) => return write!(f, "{}", n),
            TokenKind::Str(s) => return write!(f, "{:?}", s),
            TokenKind::ScalarVar(name) => return write!(f, "${}", name),
            TokenKind::VectorVar(name) => return write!(f, "$${}", name),
            TokenKind::Keyword(k) => k.as_str(),
            TokenKind::Space(name) => return write!(f, "{}", name),
            TokenKind::Boolean(b) => return write!(f, "{}", b),
            TokenKind::None => "none",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Eq => "==",
            TokenKind::Ne => "!=",
            TokenKind::And => "&",
            TokenKind::Or => "|",
            TokenKind::Xor => "^",
            TokenKind::Tilde => "~",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::DotDot => "..",
            TokenKind::PlusMinus => "+-",
            TokenKind::Colon => ":",
            TokenKind::Semicolon => ";",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Assign => "=",
            TokenKind::MulAssign => "*=",
            TokenKind::DivAssign => "/=",
            TokenKind::AddAssign => "+=",
            TokenKind::SubAssign => "-=",
        };
        f.write_str(symbol)
    }
}

/// A token with its position in the script.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Lazy token iterator over a script.
///
/// Cloning a lexer yields an independent cursor at the same position, so a
/// scan can be restarted or forked at any point.
#[derive(Clone)]
pub struct Lexer<'a> {
    lines: Rc<LineIndex<'a>>,
    inner: logos::Lexer<'a, Lexeme>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            lines: Rc::new(LineIndex::new(source)),
            inner: Lexeme::lexer(source),
        }
    }

    fn classify(&self, lexeme: Lexeme, span: Span) -> std::result::Result<TokenKind, Diagnostic> {
        let kind = match lexeme {
            Lexeme::Number(n) => TokenKind::Number(n),
            Lexeme::Str => TokenKind::Str(unescape(self.inner.slice())),
            Lexeme::UnterminatedStr => {
                return Err(Diagnostic::error(
                    "colormap::lex::malformed-string",
                    format!("Malformed string literal: {}", self.inner.slice()),
                    span,
                )
                .with_help("Close the string with its opening quote on the same line"));
            }
            Lexeme::ScalarVar(name) => TokenKind::ScalarVar(name),
            Lexeme::VectorVar(name) => TokenKind::VectorVar(name),
            Lexeme::Word => return classify_word(self.inner.slice(), span),
            Lexeme::Gt => TokenKind::Gt,
            Lexeme::Ge => TokenKind::Ge,
            Lexeme::Lt => TokenKind::Lt,
            Lexeme::Le => TokenKind::Le,
            Lexeme::Eq => TokenKind::Eq,
            Lexeme::Ne => TokenKind::Ne,
            Lexeme::And => TokenKind::And,
            Lexeme::Or => TokenKind::Or,
            Lexeme::Xor => TokenKind::Xor,
            Lexeme::Tilde => TokenKind::Tilde,
            Lexeme::Plus => TokenKind::Plus,
            Lexeme::Minus => TokenKind::Minus,
            Lexeme::Star => TokenKind::Star,
            Lexeme::Slash => TokenKind::Slash,
            Lexeme::Percent => TokenKind::Percent,
            Lexeme::LParen => TokenKind::LParen,
            Lexeme::RParen => TokenKind::RParen,
            Lexeme::LBracket => TokenKind::LBracket,
            Lexeme::RBracket => TokenKind::RBracket,
            Lexeme::DotDot => TokenKind::DotDot,
            Lexeme::PlusMinus => TokenKind::PlusMinus,
            Lexeme::Colon => TokenKind::Colon,
            Lexeme::Semicolon => TokenKind::Semicolon,
            Lexeme::Comma => TokenKind::Comma,
            Lexeme::Dot => TokenKind::Dot,
            Lexeme::Assign => TokenKind::Assign,
            Lexeme::MulAssign => TokenKind::MulAssign,
            Lexeme::DivAssign => TokenKind::DivAssign,
            Lexeme::AddAssign => TokenKind::AddAssign,
            Lexeme::SubAssign => TokenKind::SubAssign,
        };
        Ok(kind)
    }
}

impl Iterator for Lexer<'_> {
    type Item = std::result::Result<Token, Diagnostic>;

    fn next(&mut self) -> Option<Self::Item> {
        let lexeme = self.inner.next()?;
        let span = self.lines.span(self.inner.span());

        let item = match lexeme {
            Ok(lexeme) => self.classify(lexeme, span).map(|kind| Token::new(kind, span)),
            Err(()) => Err(Diagnostic::error(
                "colormap::lex::illegal-character",
                format!("Illegal character '{}'", self.inner.slice()),
                span,
            )),
        };
        Some(item)
    }
}

/// Result of a non-fatal scan.
#[derive(Debug, Clone, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub diagnostics: Diagnostics,
}

/// Tokenize a script, skipping and recording anything illegal.
pub fn tokenize(source: &str) -> Lexed {
    let mut lexed = Lexed::default();

    for item in Lexer::new(source) {
        match item {
            Ok(token) => lexed.tokens.push(token),
            Err(diagnostic) => lexed.diagnostics.push(diagnostic),
        }
    }

    lexed
}

/// Tokenize a script, failing on the first lexical error.
pub fn tokenize_strict(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source)
        .map(|item| item.map_err(lex_error))
        .collect()
}

/// Convert a lexical diagnostic into a fatal error.
pub(crate) fn lex_error(diagnostic: Diagnostic) -> MapError {
    MapError::Lex {
        message: diagnostic.message,
        location: diagnostic.span.start,
        help: diagnostic.help,
    }
}

fn classify_word(text: &str, span: Span) -> std::result::Result<TokenKind, Diagnostic> {
    let word = text.to_lowercase();

    if let Some(keyword) = Keyword::lookup(&word) {
        return Ok(TokenKind::Keyword(keyword));
    }

    if SPACE_NAMES.contains(&word.as_str()) {
        return Ok(TokenKind::Space(word));
    }

    match word.as_str() {
        "true" => Ok(TokenKind::Boolean(true)),
        "false" => Ok(TokenKind::Boolean(false)),
        "none" => Ok(TokenKind::None),
        _ => Err(Diagnostic::error(
            "colormap::lex::unknown-word",
            format!("Illegal constant or keyword: {}", text),
            span,
        )
        .with_help("Variables are written $name (numbers) or $$name (vectors)")),
    }
}

/// Strip the quotes from a string literal and resolve backslash escapes.
fn unescape(literal: &str) -> String {
    let inner = &literal[1..literal.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(
            kinds("> < <> != >= <= =="),
            vec![
                TokenKind::Gt,
                TokenKind::Lt,
                TokenKind::Ne,
                TokenKind::Ne,
                TokenKind::Ge,
                TokenKind::Le,
                TokenKind::Eq,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("12.5 .5 7"),
            vec![
                TokenKind::Number(12.5),
                TokenKind::Number(0.5),
                TokenKind::Number(7.0),
            ]
        );
    }

    #[test]
    fn test_range_between_numbers() {
        assert_eq!(
            kinds("0..1"),
            vec![TokenKind::Number(0.0), TokenKind::DotDot, TokenKind::Number(1.0)]
        );
    }

    #[test]
    fn test_plus_minus_longest_match() {
        assert_eq!(
            kinds("0.5 +- 0.25"),
            vec![
                TokenKind::Number(0.5),
                TokenKind::PlusMinus,
                TokenKind::Number(0.25),
            ]
        );
    }

    #[test]
    fn test_variables() {
        assert_eq!(
            kinds("$aaa $$bbb"),
            vec![
                TokenKind::ScalarVar("aaa".to_string()),
                TokenKind::VectorVar("bbb".to_string()),
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            kinds("ON Pixels HAVING do End in"),
            vec![
                TokenKind::Keyword(Keyword::On),
                TokenKind::Keyword(Keyword::Pixels),
                TokenKind::Keyword(Keyword::Having),
                TokenKind::Keyword(Keyword::Do),
                TokenKind::Keyword(Keyword::End),
                TokenKind::Keyword(Keyword::In),
            ]
        );
    }

    #[test]
    fn test_spaces_and_constants() {
        assert_eq!(
            kinds("rgb HSV luv true FALSE none"),
            vec![
                TokenKind::Space("rgb".to_string()),
                TokenKind::Space("hsv".to_string()),
                TokenKind::Space("luv".to_string()),
                TokenKind::Boolean(true),
                TokenKind::Boolean(false),
                TokenKind::None,
            ]
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            kinds(r#""a\"b" 'it\'s'"#),
            vec![
                TokenKind::Str("a\"b".to_string()),
                TokenKind::Str("it's".to_string()),
            ]
        );
    }

    #[test]
    fn test_unterminated_string_is_reported() {
        let lexed = tokenize("$a = 'oops;");
        assert!(lexed.diagnostics.has_errors());
        assert_eq!(
            lexed.diagnostics.first_error().map(|d| d.code),
            Some("colormap::lex::malformed-string")
        );
    }

    #[test]
    fn test_illegal_character_is_skipped() {
        let lexed = tokenize("$a = 1 @ 2;");
        let kinds: Vec<_> = lexed.tokens.iter().map(|t| t.kind.clone()).collect();

        assert_eq!(
            kinds,
            vec![
                TokenKind::ScalarVar("a".to_string()),
                TokenKind::Assign,
                TokenKind::Number(1.0),
                TokenKind::Number(2.0),
                TokenKind::Semicolon,
            ]
        );
        assert_eq!(lexed.diagnostics.error_count(), 1);
        let error = lexed.diagnostics.first_error().unwrap();
        assert_eq!(error.span.start.column, 8);
    }

    #[test]
    fn test_unknown_word_is_reported() {
        let lexed = tokenize("$a = banana;");
        assert_eq!(lexed.diagnostics.error_count(), 1);
        assert_eq!(lexed.tokens.len(), 3);
    }

    #[test]
    fn test_strict_mode_fails() {
        let err = tokenize_strict("$a = 1 # 2;").unwrap_err();
        assert!(matches!(err, MapError::Lex { .. }));
    }

    #[test]
    fn test_compound_assignments() {
        assert_eq!(
            kinds("*= /= += -= ="),
            vec![
                TokenKind::MulAssign,
                TokenKind::DivAssign,
                TokenKind::AddAssign,
                TokenKind::SubAssign,
                TokenKind::Assign,
            ]
        );
    }

    #[test]
    fn test_lexer_can_be_restarted() {
        let mut lexer = Lexer::new("$a = 1;");
        let _ = lexer.next();
        let fork = lexer.clone();

        let rest: Vec<_> = lexer.filter_map(|t| t.ok()).map(|t| t.kind).collect();
        let forked: Vec<_> = fork.filter_map(|t| t.ok()).map(|t| t.kind).collect();
        assert_eq!(rest, forked);
        assert_eq!(rest.len(), 3);
    }

    #[test]
    fn test_token_positions() {
        let tokens = tokenize("$a =\n  1;").tokens;
        assert_eq!(tokens[2].span.start.line, 2);
        assert_eq!(tokens[2].span.start.column, 3);
    }
}
