//! nu2ms - NUnit 3.x to MSTest V2 test source converter
//!
//! # Usage
//!
//! ```bash
//! # Print the converted file to stdout
//! nu2ms FooTests.cs
//!
//! # Convert attributes and assertion calls, writing files in place
//! nu2ms --asserts --write FooTests.cs BarTests.cs
//!
//! # Only report what would change
//! nu2ms --check FooTests.cs
//! ```
//!
//! Diagnostics go to stderr; converted source goes to stdout unless
//! `--write` is given.

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser as ClapParser;
use log::info;

use diagnostics::{DiagnosticFormatter, SourceMap};
use parser::{parse_error_to_diagnostic, parse_file};
use rewriter::FileOracle;

#[derive(ClapParser)]
#[command(name = "nu2ms")]
#[command(version = "0.1.0")]
#[command(about = "Convert NUnit 3.x test sources to MSTest V2", long_about = None)]
struct Cli {
    /// C# source files to convert
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Also rewrite assertion calls (Assert.That and friends)
    #[arg(long)]
    asserts: bool,

    /// Write converted files in place instead of printing to stdout
    #[arg(short, long)]
    write: bool,

    /// Report diagnostics without printing or writing any output
    #[arg(long, conflicts_with = "write")]
    check: bool,
}

fn main() {
    rewriter::logging::init_from_env();
    let cli = Cli::parse();

    let mut failed = false;
    for path in &cli.files {
        if let Err(e) = convert_file(path, &cli) {
            eprintln!("Error: {}: {}", path.display(), e);
            failed = true;
        }
    }

    if failed {
        process::exit(1);
    }
}

fn convert_file(path: &PathBuf, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let src = fs::read_to_string(path)?;

    let mut source_map = SourceMap::new();
    let file_id = source_map.add_file(path.display().to_string(), src.clone());
    let formatter = DiagnosticFormatter::new();

    let file = match parse_file(&src) {
        Ok(file) => file,
        Err(error) => {
            let diagnostic = parse_error_to_diagnostic(&error, &source_map, file_id);
            eprint!("{}", formatter.format(&diagnostic, &source_map));
            return Err(format!("could not parse {}", path.display()).into());
        }
    };

    let oracle = FileOracle::new(&file);
    let result = rewriter::rewrite(&file, &src, &oracle, &source_map, file_id, cli.asserts)?;

    eprint!("{}", formatter.format_all(&result.diagnostics, &source_map));
    info!(
        "{}: changed={}, {} diagnostic(s)",
        path.display(),
        result.changed,
        result.diagnostics.len()
    );

    if cli.check {
        return Ok(());
    }
    if cli.write {
        if result.changed {
            fs::write(path, &result.text)?;
        }
    } else {
        print!("{}", result.text);
    }
    Ok(())
}
