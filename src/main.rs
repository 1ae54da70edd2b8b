mod compare;
mod evaluator;
mod executor;
mod loader;
mod schema;

use clap::Parser;
use evaluator::{Filter, RunOptions};
use executor::{CommandLine, Platform};
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "clicheck")]
#[command(about = "Run a command-line program against declared cases and check its output")]
#[command(version)]
struct Cli {
    /// Case file, or a directory containing clicheck.{yaml,yml,toml,json}
    #[arg(default_value = ".")]
    path: PathBuf,
    /// Echo each command before running it
    #[arg(short, long)]
    debug: bool,
    /// Only run cases whose name contains this (case-insensitive)
    #[arg(short, long, value_name = "SUBSTRING")]
    filter: Option<String>,
    /// Skip cases whose name contains this (case-insensitive). Short form: -fo
    #[arg(long = "filter-out", value_name = "SUBSTRING")]
    filter_out: Option<String>,
    /// Load and check the cases without running them
    #[arg(long)]
    validate: bool,
    /// Print the case file JSON schema and exit
    #[arg(long, conflicts_with = "validate")]
    schema: bool,
}

/// Rewrite the two-letter `-fo` switch, which clap would read as `-f o`.
fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            if arg == "-fo" {
                OsString::from("--filter-out")
            } else {
                arg
            }
        })
        .collect()
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse_from(normalize_args(std::env::args_os()));

    if cli.schema {
        let schema = schema::generate_schema();
        match serde_json::to_string_pretty(&schema) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing schema: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    let case_path = match loader::find_case_file(&cli.path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error finding cases: {e}");
            std::process::exit(1);
        }
    };

    let file = match loader::load_cases(&case_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("✗ Failed to load {}: {e}", case_path.display());
            std::process::exit(1);
        }
    };

    if cli.validate {
        validate(&file, &case_path);
        return;
    }

    let options = RunOptions {
        filter: Filter::new(cli.filter.as_deref(), cli.filter_out.as_deref()),
        debug: cli.debug,
        platform: Platform::current(),
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let summary = match evaluator::run_cases(&file, &options, &mut out) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Error writing report: {e}");
            std::process::exit(1);
        }
    };

    if !summary.succeeded() {
        std::process::exit(1);
    }
}

/// Check that every command line resolves for this platform.
fn validate(file: &schema::CaseFile, path: &std::path::Path) {
    let platform = Platform::current();
    let mut errors = 0;
    for case in &file.cases {
        let command = CommandLine {
            executable: file.executable.as_deref(),
            shell: case.shell,
            no_translate: case.no_translate,
            ..CommandLine::new(&case.command)
        };
        match command.resolve(platform) {
            Ok(_) => println!("✓ {}", case.name),
            Err(e) => {
                eprintln!("✗ {}: {e}", case.name);
                errors += 1;
            }
        }
    }

    if errors > 0 {
        eprintln!("\n{errors} case(s) failed validation");
        std::process::exit(1);
    }
    println!("\nAll {} case(s) in {} valid", file.cases.len(), path.display());
}
