mod debug_report;

use shapeparse::grammars::{arithmetic, statements};
use shapeparse::{Options, ParseError, TokenGrammar};
use std::io::{self, BufRead, IsTerminal};

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    let palette = debug_report::Palette::new(config.color);
    let result = match config.input.clone() {
        Some(text) => run(&config, text.as_bytes(), &palette),
        None => run(&config, io::stdin().lock(), &palette),
    };
    if let Err(err) = result {
        debug_report::print_error(&err, &palette);
        std::process::exit(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GrammarChoice {
    Statements,
    Arithmetic,
}

impl GrammarChoice {
    fn parse(name: &str) -> Result<Self, String> {
        match name {
            "statements" => Ok(Self::Statements),
            "arithmetic" => Ok(Self::Arithmetic),
            _ => Err(format!("error: unknown grammar '{name}' (expected statements or arithmetic)")),
        }
    }

    fn default_root(self) -> &'static str {
        match self {
            Self::Statements => "Script",
            Self::Arithmetic => arithmetic::ROOT,
        }
    }
}

struct CliConfig {
    grammar: GrammarChoice,
    root: Option<String>,
    input: Option<String>,
    source: String,
    color: bool,
}

fn run<R: BufRead>(config: &CliConfig, reader: R, palette: &debug_report::Palette) -> Result<(), ParseError> {
    let root = config.root.as_deref().unwrap_or(config.grammar.default_root());
    let options = Options { source: config.source.clone() };

    match config.grammar {
        GrammarChoice::Statements => {
            let parser = TokenGrammar::new(statements::with_variables()?, root)?.with_options(options);
            let mut variables = statements::Variables::new();
            let outcome = parser.parse_verbose(reader, &mut variables)?;
            debug_report::print_tree(root, &outcome, palette);
            debug_report::print_variables(&variables, palette);
            debug_report::print_metrics(&outcome, palette);
        }
        GrammarChoice::Arithmetic => {
            let parser = TokenGrammar::new(arithmetic::grammar()?, root)?.with_options(options);
            let outcome = parser.parse_verbose(reader, &mut ())?;
            debug_report::print_tree(root, &outcome, palette);
            if let Some(result) = arithmetic::evaluate(&outcome.value) {
                debug_report::print_result(&arithmetic::render(&outcome.value), result, palette);
            }
            debug_report::print_metrics(&outcome, palette);
        }
    }
    Ok(())
}

fn parse_args() -> Result<CliConfig, String> {
    let mut grammar = GrammarChoice::Statements;
    let mut root: Option<String> = None;
    let mut input: Option<String> = None;
    let mut source: Option<String> = None;
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("shapeparse {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--grammar" | "-g" => {
                let value = args.next().ok_or_else(|| "error: --grammar expects a value".to_string())?;
                grammar = GrammarChoice::parse(&value)?;
            }
            "--root" | "-r" => {
                root = Some(args.next().ok_or_else(|| "error: --root expects a value".to_string())?);
            }
            "--source" => {
                source = Some(args.next().ok_or_else(|| "error: --source expects a value".to_string())?);
            }
            "--input" | "-i" => {
                let value = args.next().ok_or_else(|| "error: --input expects a value".to_string())?;
                if input.is_some() {
                    return Err("error: input provided multiple times".to_string());
                }
                input = Some(value);
            }
            "--" => {
                let rest = args.by_ref().collect::<Vec<_>>().join(" ");
                if !rest.is_empty() {
                    if input.is_some() {
                        return Err("error: input provided multiple times".to_string());
                    }
                    input = Some(rest);
                }
                break;
            }
            _ if arg.starts_with("--grammar=") => {
                grammar = GrammarChoice::parse(arg.trim_start_matches("--grammar="))?;
            }
            _ if arg.starts_with("--root=") => root = Some(arg.trim_start_matches("--root=").to_string()),
            _ if arg.starts_with("--source=") => source = Some(arg.trim_start_matches("--source=").to_string()),
            _ if arg.starts_with("--input=") => {
                if input.is_some() {
                    return Err("error: input provided multiple times".to_string());
                }
                input = Some(arg.trim_start_matches("--input=").to_string());
            }
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => {
                let rest = std::iter::once(arg).chain(args.by_ref()).collect::<Vec<_>>().join(" ");
                if input.is_some() {
                    return Err("error: input provided multiple times".to_string());
                }
                input = Some(rest);
                break;
            }
        }
    }

    if input.is_none() && io::stdin().is_terminal() {
        return Err(format!("error: no input provided\n\n{}", help_text()));
    }
    let source = source.unwrap_or_else(|| if input.is_some() { "<args>" } else { "<stdin>" }.to_string());

    Ok(CliConfig { grammar, root, input, source, color })
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "shapeparse {version}

Parse input with one of the bundled record-shaped grammars and print the
resulting tree, run metrics and timing.

Usage:
  shapeparse [OPTIONS] [--] <input...>
  shapeparse [OPTIONS] --input <text>
  shapeparse [OPTIONS] < file

Options:
  -g, --grammar <name>       statements (default) or arithmetic.
  -r, --root <record>        Record type to parse. Default: Script for
                             statements, {arithmetic_root} for arithmetic.
  -i, --input <text>         Input text to parse. If omitted, reads remaining
                             args or stdin when no args are provided.
  --source <name>            Name used for the input in locations.
  --color                    Force ANSI color output.
  --no-color                 Disable ANSI color output.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Exit codes:
  0  Success.
  1  The input did not parse.
  2  Invalid arguments or missing input.
",
        version = env!("CARGO_PKG_VERSION"),
        arithmetic_root = arithmetic::ROOT
    )
}
