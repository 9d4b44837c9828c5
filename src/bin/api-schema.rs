//! API Schema CLI
//!
//! Command-line interface for resolving, exporting and checking API
//! catalogues.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use api_schema::{
    build_api_version, check_definition, load_definition, type_json_schema, ApiDefinition,
    ApiVersionConfig, CheckStatus, SchemaVersion, Severity,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "api-schema")]
#[command(about = "Resolve versioned API catalogues into concrete schemas")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the API described by a catalogue at one schema version
    Resolve {
        /// Catalogue file
        catalogue: PathBuf,

        /// Schema version: "classic" or a version timestamp
        #[arg(long, short = 's', default_value_t = SchemaVersion::latest())]
        schema_version: SchemaVersion,

        /// Only resolve the named endpoint (repeatable)
        #[arg(long, short)]
        endpoint: Vec<String>,

        /// Also resolve the catalogue's auxiliary declarations
        #[arg(long)]
        auxiliary: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Export a JSON Schema for one resolved type
    Export {
        /// Catalogue file
        catalogue: PathBuf,

        /// Schema version: "classic" or a version timestamp
        #[arg(long, short = 's', default_value_t = SchemaVersion::latest())]
        schema_version: SchemaVersion,

        /// Type to export, by display name (e.g. Item.Details)
        #[arg(long = "type", short = 't')]
        type_name: String,

        /// Also resolve the catalogue's auxiliary declarations
        #[arg(long)]
        auxiliary: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Check a catalogue for queries that fail to build or resolve
    Check {
        /// Catalogue file
        catalogue: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },

    /// List the known schema versions, oldest first
    Versions,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Resolve {
            catalogue,
            schema_version,
            endpoint,
            auxiliary,
            output,
            pretty,
        } => {
            let config = ApiVersionConfig::new(schema_version).include_auxiliary(auxiliary);
            let config = if endpoint.is_empty() {
                config
            } else {
                config.endpoints(endpoint)
            };
            run_resolve(&catalogue, &config, output, pretty)
        }

        Commands::Export {
            catalogue,
            schema_version,
            type_name,
            auxiliary,
            output,
            pretty,
        } => {
            let config = ApiVersionConfig::new(schema_version).include_auxiliary(auxiliary);
            run_export(&catalogue, &config, &type_name, output, pretty)
        }

        Commands::Check {
            catalogue,
            format,
            strict,
            quiet,
        } => run_check(&catalogue, &format, strict, quiet),

        Commands::Versions => {
            for version in SchemaVersion::ALL {
                println!("{}", version);
            }
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// Log to stderr; `RUST_LOG` overrides the verbosity flag.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn load(catalogue: &Path) -> Result<ApiDefinition, u8> {
    load_definition(catalogue).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn run_resolve(
    catalogue: &Path,
    config: &ApiVersionConfig,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let definition = load(catalogue)?;
    let api = build_api_version(&definition, config).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    write_json(&api, output, pretty)
}

fn run_export(
    catalogue: &Path,
    config: &ApiVersionConfig,
    type_name: &str,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let definition = load(catalogue)?;
    let api = build_api_version(&definition, config).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    let schema = type_json_schema(&api, type_name).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    write_json(&schema, output, pretty)
}

fn write_json<T: Serialize>(value: &T, output: Option<PathBuf>, pretty: bool) -> Result<(), u8> {
    let json_output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

fn run_check(catalogue: &Path, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    let definition = load(catalogue)?;
    let result = check_definition(&definition, strict);

    if format == "json" {
        write_json(&result, None, true)?;
    } else {
        if !quiet {
            println!("Checking {} ...\n", catalogue.display());
        }

        for endpoint in &result.results {
            let status_icon = match endpoint.status {
                CheckStatus::Ok => "\x1b[32m✓\x1b[0m",
                CheckStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || endpoint.status != CheckStatus::Ok {
                println!(
                    "  {} {} ({} queries)",
                    status_icon, endpoint.endpoint, endpoint.queries
                );
            }

            for diag in &endpoint.diagnostics {
                print_diagnostic(diag, quiet);
            }
        }

        for diag in &result.declarations {
            print_diagnostic(diag, quiet);
        }

        println!();
        if result.is_ok() {
            println!(
                "\x1b[32m✓ {} endpoints checked, all passed\x1b[0m",
                result.endpoints_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} endpoints checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.endpoints_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if result.is_ok() {
        Ok(())
    } else {
        Err(1)
    }
}

fn print_diagnostic(diag: &api_schema::Diagnostic, quiet: bool) {
    if quiet && diag.severity != Severity::Error {
        return;
    }
    let color = match diag.severity {
        Severity::Error => "\x1b[31m",
        Severity::Warning => "\x1b[33m",
    };
    let at = diag
        .version
        .map(|v| format!(" @ {}", v))
        .unwrap_or_default();
    println!(
        "    {}{}[{}]\x1b[0m: {}{} - {}",
        color, diag.severity, diag.code, diag.location, at, diag.message
    );
}
