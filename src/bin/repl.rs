use std::borrow::Cow;
use std::io::{self, IsTerminal, Write};

use chameleon::{Error, Interpreter, KEYWORDS, Token, TokenKind, parse_str, tokenize};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};

const HISTORY_FILE: &str = "chameleon_history.txt";

// Completes keywords and identifiers already typed in the current input
struct ChameleonCompleter;

impl rustyline::completion::Completer for ChameleonCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let tokens = tokenize(&line[..pos]);
        let prefix = match tokens.iter().rev().nth(1) {
            // The token right before Eof, if it touches the cursor
            Some(t) if t.span.end == pos && is_word(t.kind) => t,
            _ => return Ok((pos, vec![])),
        };

        let mut words: Vec<&str> = KEYWORDS.to_vec();
        words.extend(
            tokenize(line)
                .iter()
                .filter(|t| t.kind == TokenKind::Identifier && t.span != prefix.span)
                .map(|t| &line[t.span.to_range()]),
        );
        words.sort_unstable();
        words.dedup();

        let candidates = words
            .into_iter()
            .filter(|word| word.len() > prefix.lexeme.len() && word.starts_with(&prefix.lexeme))
            .map(|word| word.to_string())
            .collect();
        Ok((prefix.span.start, candidates))
    }
}

fn is_word(kind: TokenKind) -> bool {
    kind == TokenKind::Identifier || KEYWORDS.contains(&kind.to_string().as_str())
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct InputValidator {
    #[rustyline(Validator)]
    validator: ChameleonValidator,
    #[rustyline(Highlighter)]
    highlighter: ChameleonHighlighter,
    #[rustyline(Completer)]
    completer: ChameleonCompleter,
}

fn closes(open: TokenKind, close: TokenKind) -> bool {
    matches!(
        (open, close),
        (TokenKind::LParen, TokenKind::RParen) | (TokenKind::LBracket, TokenKind::RBracket)
    )
}

// Pairs up brackets by token, so brackets inside comments are ignored.
// Returns the matched pairs and the index of every unmatched bracket token.
fn match_brackets(tokens: &[Token]) -> (Vec<(usize, usize)>, Vec<usize>) {
    let mut stack: Vec<usize> = Vec::new();
    let mut pairs = Vec::new();
    let mut unmatched = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LParen | TokenKind::LBracket => stack.push(i),
            TokenKind::RParen | TokenKind::RBracket => match stack.pop() {
                Some(open) if closes(tokens[open].kind, token.kind) => pairs.push((open, i)),
                Some(open) => {
                    unmatched.push(open);
                    unmatched.push(i);
                }
                None => unmatched.push(i),
            },
            _ => {}
        }
    }
    unmatched.extend(stack);
    (pairs, unmatched)
}

struct ChameleonValidator;

impl Validator for ChameleonValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let tokens = tokenize(ctx.input());
        let mut stack = Vec::new();
        for token in &tokens {
            match token.kind {
                TokenKind::LParen | TokenKind::LBracket => stack.push(token.kind),
                TokenKind::RParen | TokenKind::RBracket => match stack.pop() {
                    Some(open) if closes(open, token.kind) => {}
                    _ => {
                        return Ok(ValidationResult::Invalid(Some(format!(
                            "  - Unmatched '{}' at line {}, column {}",
                            token.lexeme, token.line, token.column
                        ))));
                    }
                },
                _ => {}
            }
        }
        if stack.is_empty() {
            Ok(ValidationResult::Valid(None))
        } else {
            Ok(ValidationResult::Incomplete)
        }
    }
}

struct ChameleonHighlighter;

impl Highlighter for ChameleonHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        let tokens = tokenize(line);
        let (pairs, unmatched) = match_brackets(&tokens);

        // Brackets next to the cursor light up together with their partner
        let at_cursor = |i: usize| {
            let span = tokens[i].span;
            span.start == pos || span.end == pos
        };
        let active: Vec<usize> = pairs
            .iter()
            .filter(|(open, close)| at_cursor(*open) || at_cursor(*close))
            .flat_map(|(open, close)| [*open, *close])
            .collect();

        let mut highlighted = String::with_capacity(line.len());
        let mut last = 0;
        for (i, token) in tokens.iter().enumerate() {
            let range = token.span.to_range();
            highlighted.push_str(&line[last..range.start]); // whitespace and comments
            let text = &line[range.clone()];
            let style = if unmatched.contains(&i) || token.kind == TokenKind::Unidentified {
                Some("1;31") // Red for unmatched brackets and stray characters
            } else if active.contains(&i) {
                Some("1;34") // Blue for the matching pair
            } else if token.kind == TokenKind::Number {
                Some("33")
            } else if token.kind != TokenKind::Identifier && is_word(token.kind) {
                Some("35") // Keywords
            } else {
                None
            };
            match style {
                Some(code) => highlighted.push_str(&format!("\x1b[{}m{}\x1b[0m", code, text)),
                None => highlighted.push_str(text),
            }
            last = range.end;
        }
        highlighted.push_str(&line[last..]);

        Cow::Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

// Runs one input against the shared interpreter and echoes its value
fn eval_line(interpreter: &mut Interpreter<Vec<u8>>, input: &str) {
    let color = io::stderr().is_terminal();
    let result = parse_str(input)
        .map_err(Error::from)
        .and_then(|program| interpreter.interpret(&program).map_err(Error::Runtime));

    let printed = std::mem::take(interpreter.output_mut());
    let mut stdout = io::stdout().lock();
    let _ = stdout.write_all(&printed);
    if !printed.is_empty() && !printed.ends_with(b"\n") {
        let _ = writeln!(stdout);
    }
    let _ = stdout.flush();

    match result {
        Ok(value) => println!("=> {}", value),
        Err(err) => {
            if err.pretty_print("repl", input, color, io::stderr()).is_err() {
                eprintln!("{}", err);
            }
        }
    }
}

fn main() -> rustyline::Result<()> {
    println!("Chameleon REPL v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl-D to quit.");

    let h = InputValidator {
        highlighter: ChameleonHighlighter,
        validator: ChameleonValidator,
        completer: ChameleonCompleter,
    };
    let config = rustyline::config::Config::builder()
        .edit_mode(rustyline::EditMode::Vi)
        .build();
    let mut rl = Editor::with_config(config)?;
    rl.set_helper(Some(h));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if rl.load_history(HISTORY_FILE).is_err() {
        println!("No previous history.");
    }

    let mut interpreter = Interpreter::new(Vec::new());
    loop {
        match rl.readline("chameleon> ") {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input.eq_ignore_ascii_case("exit") {
                    break;
                }
                eval_line(&mut interpreter, input);
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C
                println!("Interrupted. Type 'exit' or Ctrl-D to quit.");
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D
                println!("\nExiting.");
                break;
            }
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history(HISTORY_FILE)
}
