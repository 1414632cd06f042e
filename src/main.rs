//! `adlc`: compile and check ADL argument definition files.

use std::path::PathBuf;
use std::process::ExitCode;

use adl_compiler::{Colors, Diagnostics, Options};
use tracing_subscriber::EnvFilter;

/// Parsed command line.
enum Command {
    Help,
    Usage,
    Compile { path: PathBuf, options: Options },
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let mut options = Options::default();
    let mut path = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(name) = arg.strip_prefix("-D").filter(|name| !name.is_empty()) {
            options.defines.push(name.to_string());
            continue;
        }
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "-D" | "--define" => match iter.next() {
                Some(name) => options.defines.push(name.clone()),
                None => return Err(format!("'{arg}' expects a name")),
            },
            "--symbols" => options.print_symbols = true,
            "--ast" => options.print_ast = true,
            _ if arg.starts_with('-') => return Err(format!("unknown option '{arg}'")),
            _ if path.is_some() => return Err(format!("unexpected argument '{arg}'")),
            _ => path = Some(PathBuf::from(arg)),
        }
    }
    Ok(match path {
        Some(path) => Command::Compile { path, options },
        None => Command::Usage,
    })
}

fn print_usage(program: &str) {
    eprintln!("Usage: {program} <file_to_compile>");
}

fn print_help(program: &str) {
    print_usage(program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -D, --define NAME  Define NAME for #ifdef and #ifndef");
    eprintln!("      --symbols      Print the root symbol table");
    eprintln!("      --ast          Print the checked file in canonical form");
    eprintln!("  -h, --help         Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RUST_LOG  Log filter (default: warn)");
    eprintln!("  NO_COLOR  Disable colored diagnostics");
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map_or("adlc", String::as_str);

    let (path, options) = match parse_args(args.get(1..).unwrap_or_default()) {
        Ok(Command::Compile { path, options }) => (path, options),
        Ok(Command::Usage) => {
            print_usage(program);
            return ExitCode::SUCCESS;
        }
        Ok(Command::Help) => {
            print_help(program);
            return ExitCode::SUCCESS;
        }
        Err(message) => {
            eprintln!("Error: {message}");
            print_usage(program);
            return ExitCode::from(2);
        }
    };

    let mut diagnostics = Diagnostics::new();
    let result = adl_compiler::compile(&path, &options, &mut diagnostics);
    eprint!("{}", diagnostics.render(&Colors::detect()));

    match result {
        Ok(ast) => {
            if options.print_symbols {
                print!("{}", ast.table().render(&ast));
            }
            if options.print_ast {
                print!("{}", adl_compiler::format(&ast));
            }
            ExitCode::SUCCESS
        }
        Err(phase) => {
            tracing::debug!(%phase, "compilation stopped");
            ExitCode::FAILURE
        }
    }
}
