use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use chameleon::{Error, ErrorPolicy, Interpreter, tokenize};
use clap::Parser;

// sysexits.h
const EX_USAGE: u8 = 64;
const EX_DATAERR: u8 = 65;
const EX_NOINPUT: u8 = 66;
const EX_SOFTWARE: u8 = 70;

/// Runs a chameleon program.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Keep running the remaining top-level expressions after a runtime error.
    #[arg(long = "continue")]
    keep_going: bool,

    /// Print the token stream before running.
    #[arg(long)]
    tokens: bool,

    /// Print the parsed program before running.
    #[arg(long)]
    ast: bool,

    /// Program file, or `-` for stdin.
    file: PathBuf,
}

impl Args {
    fn policy(&self) -> ErrorPolicy {
        if self.keep_going {
            ErrorPolicy::Continue
        } else {
            ErrorPolicy::Halt
        }
    }

    fn read_source(&self) -> io::Result<String> {
        if self.file.as_os_str() == "-" {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source)?;
            Ok(source)
        } else {
            std::fs::read_to_string(&self.file)
        }
    }
}

fn report(err: &Error, name: &str, source: &str) {
    let color = io::stderr().is_terminal();
    if err.pretty_print(name, source, color, io::stderr()).is_err() {
        // Fall back to the one-line form
        eprintln!("{}", err);
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        // --help and --version are not failures
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(EX_USAGE);
        }
    };

    let name = args.file.display().to_string();
    let source = match args.read_source() {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Could not read {}: {}", name, e);
            return ExitCode::from(EX_NOINPUT);
        }
    };

    let tokens = tokenize(&source);
    if args.tokens {
        for token in &tokens {
            println!(
                "{:>4}:{:<4} {:<12} {:?}",
                token.line,
                token.column,
                token.kind.to_string(),
                token.lexeme
            );
        }
    }

    let program = match chameleon::Parser::new(tokens).parse() {
        Ok(program) => program,
        Err(e) => {
            report(&Error::Parse(e), &name, &source);
            return ExitCode::from(EX_DATAERR);
        }
    };
    if args.ast {
        for expr in &program {
            println!("{:#?}", expr);
        }
    }

    let mut interpreter = Interpreter::with_policy(io::stdout().lock(), args.policy());
    match interpreter.interpret(&program) {
        Ok(_) => ExitCode::SUCCESS,
        Err(errors) => {
            report(&Error::Runtime(errors), &name, &source);
            ExitCode::from(EX_SOFTWARE)
        }
    }
}
