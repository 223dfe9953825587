//! Command-line interface for xsd-automaton

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use std::process::ExitCode;

#[cfg(feature = "cli")]
use xsd_automaton::Schema;

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "xsd-automaton")]
#[command(author, version, about = "Validate XML documents against an XSD schema", long_about = None)]
struct Cli {
    /// Path to the XSD schema file
    #[arg(value_name = "SCHEMA")]
    schema: PathBuf,

    /// Paths of the XML files to validate
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,

    /// Print only the per-file verdicts, not the diagnostics
    #[arg(short, long)]
    quiet: bool,
}

#[cfg(feature = "cli")]
fn main() -> ExitCode {
    let cli = Cli::parse();

    let schema = match Schema::from_file(&cli.schema) {
        Ok(schema) => schema,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };

    let mut validator = schema.validator();
    let mut failed = false;
    for file in &cli.files {
        let xml = match std::fs::read_to_string(file) {
            Ok(xml) => xml,
            Err(e) => {
                eprintln!("error: {}: {}", file.display(), e);
                return ExitCode::from(2);
            }
        };
        let diagnostics = match xsd_automaton::check_document(&xml, &mut validator) {
            Ok(diagnostics) => diagnostics,
            Err(e) => {
                eprintln!("error: {}: {}", file.display(), e);
                return ExitCode::from(2);
            }
        };
        if diagnostics.is_empty() {
            println!("{}: valid", file.display());
        } else {
            failed = true;
            println!("{}: {} problem(s)", file.display(), diagnostics.len());
            if !cli.quiet {
                for diagnostic in &diagnostics {
                    println!("  {}", diagnostic);
                }
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("This binary requires the 'cli' feature. Rebuild with: cargo build --features cli");
}
