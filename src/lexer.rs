use logos::Logos;
use std::fmt;

use crate::Span;
use crate::types::Value;

#[derive(Logos, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n\f]+")] // Skip whitespace, line tracking happens in `tokenize`
#[logos(skip r";[^\n]*")] // Skip line comments
#[logos(skip r"``([^`]|`[^`])*``")] // Skip block comments
pub enum TokenKind {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("//")]
    SlashSlash,
    #[token("%")]
    Percent,

    #[token("equal?")]
    EqualTo,
    #[token("nequal?")]
    NotEqualTo,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,

    #[token("not")]
    Not,
    #[token("true?")]
    TrueQ,
    #[token("and")]
    And,
    #[token("or")]
    Or,

    #[token("let")]
    Let,
    #[token("print")]
    Print,
    #[token("println")]
    Println,
    #[token("if")]
    If,
    #[token("then")]
    Then,
    #[token("else")]
    Else,
    #[token("cond")]
    Cond,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    #[regex(r"[a-zA-Z_$][a-zA-Z_$0-9?-]*")]
    Identifier,
    #[regex(r"[0-9]+(\.[0-9]+)?")]
    Number,

    // Never produced by logos directly, `tokenize` builds these.
    Unidentified,
    Eof,
}

/// Every reserved word of the language, used by the REPL for completion.
pub const KEYWORDS: &[&str] = &[
    "equal?", "nequal?", "not", "true?", "and", "or", "let", "print", "println", "if", "then",
    "else", "cond", "true", "false", "null",
];

impl TokenKind {
    /// True for the tokens that may directly follow `(` to open a compound form.
    pub fn opens_form(self) -> bool {
        matches!(
            self,
            TokenKind::Let
                | TokenKind::Print
                | TokenKind::Println
                | TokenKind::If
                | TokenKind::Cond
                | TokenKind::And
                | TokenKind::Or
                | TokenKind::EqualTo
                | TokenKind::NotEqualTo
                | TokenKind::Greater
                | TokenKind::GreaterEqual
                | TokenKind::Less
                | TokenKind::LessEqual
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::SlashSlash
                | TokenKind::Percent
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::SlashSlash => "//",
            TokenKind::Percent => "%",
            TokenKind::EqualTo => "equal?",
            TokenKind::NotEqualTo => "nequal?",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Not => "not",
            TokenKind::TrueQ => "true?",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Let => "let",
            TokenKind::Print => "print",
            TokenKind::Println => "println",
            TokenKind::If => "if",
            TokenKind::Then => "then",
            TokenKind::Else => "else",
            TokenKind::Cond => "cond",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::Identifier => "identifier",
            TokenKind::Number => "number",
            TokenKind::Unidentified => "unidentified character",
            TokenKind::Eof => "end of input",
        };
        write!(f, "{}", text)
    }
}

/// A single lexical unit. Built once by `tokenize` and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    /// Resolved value for `NUMBER`, `true`, `false` and `null`.
    pub literal: Option<Value>,
    /// 1-based.
    pub line: usize,
    /// 1-based, counted in characters.
    pub column: usize,
    pub span: Span,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "end of input"),
            _ => write!(f, "'{}'", self.lexeme),
        }
    }
}

// Walks the source once, turning byte offsets into line/column pairs.
struct Cursor<'src> {
    source: &'src str,
    offset: usize,
    line: usize,
    column: usize,
}

impl<'src> Cursor<'src> {
    fn new(source: &'src str) -> Self {
        Cursor {
            source,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    fn advance_to(&mut self, target: usize) -> (usize, usize) {
        for c in self.source[self.offset..target].chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.offset = target;
        (self.line, self.column)
    }
}

fn literal_for(kind: TokenKind, lexeme: &str) -> Option<Value> {
    match kind {
        TokenKind::Number => lexeme.parse::<f64>().ok().map(Value::Number),
        TokenKind::True => Some(Value::Boolean(true)),
        TokenKind::False => Some(Value::Boolean(false)),
        TokenKind::Null => Some(Value::Null),
        _ => None,
    }
}

/// Converts source text into tokens, always terminated by exactly one `Eof`.
///
/// Lexing never fails: a character that cannot start a token becomes a
/// one-character `Unidentified` token and the parser reports it.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut cursor = Cursor::new(source);
    let mut push = |kind: TokenKind, start: usize, end: usize| {
        let (line, column) = cursor.advance_to(start);
        let lexeme = &source[start..end];
        tokens.push(Token {
            kind,
            lexeme: lexeme.to_string(),
            literal: literal_for(kind, lexeme),
            line,
            column,
            span: Span::new(start, end),
        });
    };

    let mut base = 0;
    let mut lexer = TokenKind::lexer(source);
    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let (start, end) = (base + range.start, base + range.end);
        match result {
            Ok(kind) => push(kind, start, end),
            Err(()) => {
                let width = source[start..].chars().next().map_or(1, char::len_utf8);
                push(TokenKind::Unidentified, start, start + width);
                // A failed partial match (e.g. an unterminated block comment) can
                // swallow more than one character; restart right after the first.
                if end > start + width {
                    base = start + width;
                    lexer = TokenKind::lexer(&source[base..]);
                }
            }
        }
    }
    push(TokenKind::Eof, source.len(), source.len());
    tokens
}
