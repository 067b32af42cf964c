#![warn(clippy::all)]

use weft::diagnostic::{Diagnostic, ErrorFormat, Reporter};
use weft::{Engine, Value};

/// Pull the error-format flags out of the argument list; everything else is
/// positional. A render has exactly one stderr, so a second format flag is a
/// contradiction rather than an override.
fn parse_format_flags(
    raw: impl Iterator<Item = String>,
) -> Result<(Option<ErrorFormat>, Vec<String>), String> {
    let mut format = None;
    let mut positionals = Vec::new();
    for arg in raw {
        match ErrorFormat::from_flag(&arg) {
            Some(flag) => {
                if format.replace(flag).is_some() {
                    return Err("--json, --text, and --ansi are mutually exclusive".to_string());
                }
            }
            None => positionals.push(arg),
        }
    }
    Ok((format, positionals))
}

/// A template argument naming an existing file is read from disk; anything
/// else is inline template text.
fn load_template(arg: &str) -> String {
    if std::path::Path::new(arg).is_file() {
        match std::fs::read_to_string(arg) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("error reading {arg}: {e}");
                std::process::exit(1);
            }
        }
    } else if arg.is_empty() {
        eprintln!("error: empty template");
        std::process::exit(1);
    } else {
        arg.to_string()
    }
}

fn load_context(path: &str) -> Value {
    let raw = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("error reading {path}: {e}");
            std::process::exit(1);
        }
    };
    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(json) => Value::from(json),
        Err(e) => {
            eprintln!("error parsing {path}: {e}");
            std::process::exit(1);
        }
    }
}

fn demo_context() -> Value {
    Value::from(serde_json::json!({
        "name": "World",
        "items": ["apple", "banana", "cherry"],
    }))
}

fn usage() {
    eprintln!("Usage: weft <template-or-file> [context.json]");
    eprintln!("       weft --help           Show usage and examples");
    eprintln!("       weft --version");
}

fn print_help() {
    println!("weft — a small bytecode-compiled text-template engine\n");
    println!("Usage:");
    println!("  weft <template> [context.json]    Render inline template text");
    println!("  weft <file> [context.json]        Render a template file");
    println!("\nWithout a context file the demonstration context is used:");
    println!("  {{\"name\": \"World\", \"items\": [\"apple\", \"banana\", \"cherry\"]}}");
    println!("\nOutput format (errors):");
    println!("  --ansi / -a   Force ANSI colour output (default when stderr is a TTY)");
    println!("  --text / -t   Force plain text output (no colour)");
    println!("  --json / -j   Force JSON output (default when stderr is not a TTY)");
    println!("  NO_COLOR=1    Disable colour (same as --text)");
    println!("\nExamples:");
    println!("  weft 'Hello, {{{{ .name }}}}!'");
    println!("  weft '{{{{range .items}}}}{{{{.}}}} {{{{end}}}}'");
    println!("  weft page.tmpl data.json");
}

fn main() {
    let (chosen, args) = match parse_format_flags(std::env::args().skip(1)) {
        Ok(parsed) => parsed,
        Err(message) => {
            eprintln!("error: {message}");
            std::process::exit(1);
        }
    };
    let reporter = Reporter::new(chosen.unwrap_or_else(ErrorFormat::detect));

    if args.is_empty() {
        usage();
        std::process::exit(1);
    }

    match args[0].as_str() {
        "--version" | "-V" => {
            println!("weft {}", env!("CARGO_PKG_VERSION"));
            return;
        }
        "--help" | "-h" | "help" => {
            print_help();
            return;
        }
        _ => {}
    }

    let source = load_template(&args[0]);
    let context = match args.get(1) {
        Some(path) => load_context(path),
        None => demo_context(),
    };

    let engine = Engine::builder().cache(true).build();
    match engine.execute(&source, &context) {
        Ok(output) => println!("{output}"),
        Err(e) => {
            reporter.report(&Diagnostic::from(&e).with_source(source));
            std::process::exit(1);
        }
    }
}
