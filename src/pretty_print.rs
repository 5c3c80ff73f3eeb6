use crate::lexer::{Token, TokenKind};
use crate::{Error, ParseError, RuntimeError};
use ariadne::{Color, Config, IndexType, Label, Report, ReportKind, Source};
use std::io::{self, Write};
use std::ops::Range;

// Labels need at least one character to underline; an empty span (end of
// input) is widened to the character before it.
fn label_range(token: &Token, input: &str) -> Range<usize> {
    let span = token.span;
    if !span.is_empty() {
        return span.to_range();
    }
    let start = span.start.min(input.len());
    if let Some(c) = input[start..].chars().next() {
        return start..start + c.len_utf8();
    }
    match input[..start].char_indices().last() {
        Some((i, c)) => i..i + c.len_utf8(),
        None => span.to_range(),
    }
}

fn write_report<W: Write>(
    name: &str,
    input: &str,
    token: &Token,
    message: &str,
    label: String,
    color: bool,
    out: W,
) -> io::Result<()> {
    let range = label_range(token, input);
    let config = Config::default()
        .with_color(color)
        .with_index_type(IndexType::Byte);
    Report::build(ReportKind::Error, (name, range.clone()))
        .with_config(config)
        .with_message(message)
        .with_label(
            Label::new((name, range))
                .with_message(label)
                .with_color(Color::Red),
        )
        .finish()
        .write((name, Source::from(input)), out)
}

impl ParseError {
    /// Renders the error against `input`, the text it was parsed from.
    pub fn pretty_print<W: Write>(
        &self,
        name: &str,
        input: &str,
        color: bool,
        out: W,
    ) -> io::Result<()> {
        let label = match self.token.kind {
            TokenKind::Eof => "input ends here".to_string(),
            TokenKind::Unidentified => "not part of the language".to_string(),
            _ => format!("found {}", self.token),
        };
        let message = format!("{}: {}", self.kind_name(), self.message);
        write_report(name, input, &self.token, &message, label, color, out)
    }
}

impl RuntimeError {
    pub fn pretty_print<W: Write>(
        &self,
        name: &str,
        input: &str,
        color: bool,
        out: W,
    ) -> io::Result<()> {
        let label = match self.token.kind {
            TokenKind::Identifier => format!("{} is not bound here", self.token),
            _ => format!("while evaluating {}", self.token),
        };
        let message = format!("{}: {}", self.kind_name(), self.message);
        write_report(name, input, &self.token, &message, label, color, out)
    }
}

impl Error {
    /// Renders every contained error, one report after another.
    pub fn pretty_print<W: Write>(
        &self,
        name: &str,
        input: &str,
        color: bool,
        mut out: W,
    ) -> io::Result<()> {
        match self {
            Error::Parse(err) => err.pretty_print(name, input, color, &mut out),
            Error::Runtime(errors) => {
                for err in errors {
                    err.pretty_print(name, input, color, &mut out)?;
                }
                Ok(())
            }
        }
    }
}
