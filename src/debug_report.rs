use shapeparse::{ParseError, ParseOutcome, Value};
use std::collections::HashMap;

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

pub use ansi::Palette;

pub fn print_tree(root: &str, outcome: &ParseOutcome, palette: &Palette) {
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Parsed {root}"), ansi::CYAN)));
    println!("\n{}", palette.paint("━━━ Tree ━━━", ansi::GRAY));
    print_value(None, &outcome.value, 1, palette);
    println!(
        "\n  {} {}  {} {}",
        palette.dim("consumed:"),
        palette.paint(format!("{} bytes", outcome.consumed), ansi::YELLOW),
        palette.dim("│ ends at"),
        palette.paint(outcome.end.to_string(), ansi::YELLOW),
    );
}

fn print_value(name: Option<&str>, value: &Value, depth: usize, palette: &Palette) {
    let indent = "  ".repeat(depth);
    let label = name.map(|n| format!("{} ", palette.dim(format!("{n}:")))).unwrap_or_default();
    match value {
        Value::Record(record) => {
            println!("{indent}{label}{}", palette.bold(palette.paint(&record.type_name, ansi::BLUE)));
            for (field, child) in &record.fields {
                print_value(Some(field), child, depth + 1, palette);
            }
        }
        Value::List(items) => {
            println!("{indent}{label}{}", palette.paint(format!("[{} items]", items.len()), ansi::GRAY));
            for (idx, item) in items.iter().enumerate() {
                print_value(Some(&idx.to_string()), item, depth + 1, palette);
            }
        }
        Value::Null => println!("{indent}{label}{}", palette.dim("null")),
        other => println!("{indent}{label}{}", palette.paint(other.to_string(), ansi::GREEN)),
    }
}

pub fn print_variables(variables: &HashMap<String, String>, palette: &Palette) {
    if variables.is_empty() {
        return;
    }
    println!("\n{}", palette.paint("━━━ Variables ━━━", ansi::GRAY));
    let mut names: Vec<&String> = variables.keys().collect();
    names.sort();
    for name in names {
        println!("  {} = {}", palette.paint(name, ansi::CYAN), palette.paint(&variables[name], ansi::GREEN));
    }
}

pub fn print_result(rendered: &str, result: f64, palette: &Palette) {
    println!("\n{}", palette.paint("━━━ Result ━━━", ansi::GRAY));
    println!("  {}  {} {}", palette.paint(rendered, ansi::BLUE), palette.dim("="), palette.bold(result.to_string()));
}

pub fn print_metrics(outcome: &ParseOutcome, palette: &Palette) {
    let m = &outcome.metrics;
    println!("\n{}", palette.paint("━━━ Metrics ━━━", ansi::GRAY));
    println!(
        "  {} {}  │  {} {}  │  {} {}  │  {} {}",
        palette.dim("steps:"),
        palette.paint(m.steps.to_string(), ansi::YELLOW),
        palette.dim("matcher calls:"),
        palette.paint(m.matcher_calls.to_string(), ansi::YELLOW),
        palette.dim("backtracks:"),
        palette.paint(m.backtracks.to_string(), ansi::YELLOW),
        palette.dim("max depth:"),
        palette.paint(m.max_depth.to_string(), ansi::YELLOW),
    );
    println!(
        "  {} {}  │  {} {}  │  {} {}",
        palette.dim("rotations:"),
        palette.paint(m.rotations.to_string(), ansi::BLUE),
        palette.dim("unrotations:"),
        palette.paint(m.unrotations.to_string(), ansi::BLUE),
        palette.dim("tokens:"),
        palette.paint(m.tokens_created.to_string(), ansi::BLUE),
    );

    println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    println!(
        "  Tokenize: {}  │  Resolve: {}",
        palette.paint(format!("{:?}", m.total), ansi::GREEN),
        palette.dim(format!("{:?}", m.resolve)),
    );
    println!();
}

pub fn print_error(err: &ParseError, palette: &Palette) {
    eprintln!("\n{}", palette.bold(palette.paint(format!("✗ {err}"), ansi::RED)));
    match err {
        ParseError::Syntax(syntax) if !syntax.trail.is_empty() => {
            eprintln!("\n{}", palette.paint("Open tokens at the furthest failure:", ansi::YELLOW));
            for (depth, token) in syntax.trail.iter().enumerate() {
                eprintln!("  {}{}", "  ".repeat(depth), palette.paint(token, ansi::BLUE));
            }
        }
        ParseError::TrailingInput { .. } => {
            eprintln!("\n{}", palette.dim("  Tip: pick a root that spans the whole input with --root"));
        }
        _ => {}
    }
    eprintln!();
}
