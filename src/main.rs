use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::info;
use memmap2::Mmap;

use rlox::ast_printer::AstPrinter;
use rlox::interpreter::Interpreter;
use rlox::parser::Parser;
use rlox::resolver::Resolver;
use rlox::scanner::Scanner;
use rlox::token::Token;

// sysexits.h conventions: usage, data, software
const EXIT_USAGE: u8 = 64;
const EXIT_STATIC_ERROR: u8 = 65;
const EXIT_RUNTIME_ERROR: u8 = 70;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a file and print each token
    Tokenize { filename: PathBuf },

    /// Parse a file as a single expression and print its AST
    Parse { filename: PathBuf },

    /// Run a file as a program, or start the interactive prompt
    Run { filename: Option<PathBuf> },
}

fn main() -> Result<ExitCode> {
    let args = match Cli::try_parse() {
        Ok(args) => args,

        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit();
        }

        Err(e) => {
            eprint!("{}", e);
            return Ok(ExitCode::from(EXIT_USAGE));
        }
    };

    if args.log {
        init_logger()?;
    } else {
        Builder::new().filter_level(log::LevelFilter::Off).init();
    }

    info!("cli arguments: {:?}", args);

    match args.command {
        Command::Tokenize { filename } => tokenize(filename),
        Command::Parse { filename } => parse(filename),
        Command::Run { filename: Some(f) } => run_file(f),
        Command::Run { filename: None } => run_prompt(),
    }
}

/// Map the script file instead of reading it into a buffer; tokens borrow
/// their lexemes straight out of the mapping.
fn map_file(path: &PathBuf) -> Result<Mmap> {
    let file = File::open(path).context(format!("Failed to open file {:?}", path))?;
    let mmap = unsafe { Mmap::map(&file) }.context(format!("Failed to map file {:?}", path))?;

    info!("mapped {} bytes from {:?}", mmap.len(), path);

    Ok(mmap)
}

/// Scan the whole buffer, reporting lexical errors to stderr as they occur.
/// Returns the token list (always EOF-terminated) and whether any error
/// was seen.
fn scan_all(source: &[u8]) -> (Vec<Token<'_>>, bool) {
    let mut tokens = Vec::new();
    let mut had_error = false;

    for item in Scanner::new(source) {
        match item {
            Ok(token) => tokens.push(token),

            Err(e) => {
                had_error = true;
                eprintln!("{}", e);
            }
        }
    }

    (tokens, had_error)
}

fn tokenize(filename: PathBuf) -> Result<ExitCode> {
    let mmap = map_file(&filename)?;

    let mut had_error = false;

    for item in Scanner::new(&mmap) {
        match item {
            Ok(token) => println!("{}", token),

            Err(e) => {
                had_error = true;
                eprintln!("{}", e);
            }
        }
    }

    if had_error {
        return Ok(ExitCode::from(EXIT_STATIC_ERROR));
    }

    Ok(ExitCode::SUCCESS)
}

fn parse(filename: PathBuf) -> Result<ExitCode> {
    let mmap = map_file(&filename)?;

    let (tokens, had_error) = scan_all(&mmap);
    if had_error {
        return Ok(ExitCode::from(EXIT_STATIC_ERROR));
    }

    let mut parser = Parser::new(&tokens);

    match parser.parse_expression() {
        Ok(expr) => {
            println!("{}", AstPrinter::print(&expr));
            Ok(ExitCode::SUCCESS)
        }

        Err(e) => {
            eprintln!("{}", e);
            Ok(ExitCode::from(EXIT_STATIC_ERROR))
        }
    }
}

fn run_file(filename: PathBuf) -> Result<ExitCode> {
    let mmap = map_file(&filename)?;

    let (tokens, mut had_static_error) = scan_all(&mmap);

    let mut parser = Parser::new(&tokens);
    let statements = parser.parse();

    for e in parser.take_errors() {
        had_static_error = true;
        eprintln!("{}", e);
    }

    let mut interpreter = Interpreter::new();

    for e in Resolver::new(&mut interpreter).resolve(&statements) {
        had_static_error = true;
        eprintln!("{}", e);
    }

    // Any static error suppresses interpretation of the whole run.
    if had_static_error {
        return Ok(ExitCode::from(EXIT_STATIC_ERROR));
    }

    if let Err(e) = interpreter.interpret(&statements) {
        eprintln!("{}", e);
        return Ok(ExitCode::from(EXIT_RUNTIME_ERROR));
    }

    Ok(ExitCode::SUCCESS)
}

/// Interactive prompt.  Globals (and closures) persist across lines, so
/// each line's source and token buffers are leaked: values created on one
/// line may be referenced for the rest of the session.  Error flags reset
/// per line — a bad line never poisons the next one.
fn run_prompt() -> Result<ExitCode> {
    let mut interpreter: Interpreter<'static> = Interpreter::new();
    let mut base_id: usize = 0;

    let stdin = io::stdin();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF ends the session
        }

        let source: &'static [u8] = Vec::leak(line.into_bytes());

        let (tokens, mut had_static_error) = scan_all(source);
        let tokens: &'static [Token<'static>] = Vec::leak(tokens);

        let mut parser = Parser::with_base_id(tokens, base_id);
        let statements = parser.parse();
        base_id = parser.expr_id_mark();

        for e in parser.take_errors() {
            had_static_error = true;
            eprintln!("{}", e);
        }

        for e in Resolver::new(&mut interpreter).resolve(&statements) {
            had_static_error = true;
            eprintln!("{}", e);
        }

        if had_static_error {
            continue;
        }

        if let Err(e) = interpreter.interpret(&statements) {
            // Runtime errors halt this line only; the session continues.
            eprintln!("{}", e);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rlox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));

            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .init();

    info!("logger initialized, writing to app.log");

    Ok(())
}
