//! # jnitramp CLI
//!
//! Generates JNI trampoline headers for the Zygote launch methods, lists the
//! variant catalog, checks generated headers for staleness and dry-runs
//! variant selection against a simulated process.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;

use jnitramp_config::{init_logging, log_cli_info, Config, LogLevel, OutputFormat, PROJECT_CONFIG_PATH};
use jnitramp_core::{emit, generate, FamilyKind};

mod catalog;
mod check;
mod simulate;

/// jnitramp - JNI trampoline generator for Zygote process-launch hooks
#[derive(Parser)]
#[command(name = "jnitramp")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the trampoline header (or JSON manifest)
    Generate {
        /// Output path, `-` for stdout [default: output.path from config]
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Artifact format: c or json
        #[arg(long)]
        format: Option<OutputFormat>,

        /// Extra catalog file to merge (repeatable)
        #[arg(long = "catalog", value_name = "FILE")]
        catalogs: Vec<PathBuf>,
    },

    /// List catalog variants in matching order
    List {
        /// Only show one family, e.g. nativeForkSystemServer
        #[arg(long)]
        family: Option<String>,

        #[arg(long = "catalog", value_name = "FILE")]
        catalogs: Vec<PathBuf>,
    },

    /// Check a generated header against the current catalog
    Check {
        #[arg(value_name = "HEADER")]
        header: PathBuf,

        #[arg(long = "catalog", value_name = "FILE")]
        catalogs: Vec<PathBuf>,
    },

    /// Run variant selection against a simulated set of live methods
    Simulate {
        /// Live method as NAME:SIGNATURE (repeatable)
        #[arg(long = "live", value_name = "NAME:SIG", required = true)]
        live: Vec<String>,

        /// Print the selected hook list as JSON
        #[arg(long)]
        json: bool,

        #[arg(long = "catalog", value_name = "FILE")]
        catalogs: Vec<PathBuf>,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file locations
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(LogLevel::from_verbosity(cli.verbose));

    let config = Config::load().context("Failed to load configuration")?;

    match cli.command {
        Commands::Generate {
            output,
            format,
            catalogs,
        } => cmd_generate(config, output, format, &catalogs),
        Commands::List { family, catalogs } => cmd_list(&config, family.as_deref(), &catalogs),
        Commands::Check { header, catalogs } => check::cmd_check(&config, &header, &catalogs),
        Commands::Simulate {
            live,
            json,
            catalogs,
        } => simulate::cmd_simulate(&config, &live, json, &catalogs),
        Commands::Config { command } => match command {
            ConfigCommands::Show => cmd_config_show(&config),
            ConfigCommands::Path => cmd_config_path(),
        },
    }
}

fn cmd_generate(
    mut config: Config,
    output: Option<PathBuf>,
    format: Option<OutputFormat>,
    catalogs: &[PathBuf],
) -> Result<()> {
    if let Some(format) = format {
        config.output.format = format;
    }

    let catalog = catalog::effective_catalog(&config, catalogs)?;
    let bundle = generate(&catalog, &config.runtime).context("Catalog validation failed")?;
    let text = emit::render(&bundle, &config.output).context("Failed to render artifact")?;

    let path = output.unwrap_or_else(|| config.output.path.clone());
    if path == Path::new("-") {
        let mut stdout = io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()?;
        return Ok(());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&path, &text).with_context(|| format!("Failed to write {}", path.display()))?;

    let variants = bundle.entries().count();
    log_cli_info!(
        "Artifact written",
        path = path.display().to_string(),
        families = bundle.families.len(),
        variants = variants
    );
    println!(
        "{} {} ({} families, {} variants)",
        style("Generated").green().bold(),
        path.display(),
        bundle.families.len(),
        variants
    );
    Ok(())
}

fn cmd_list(config: &Config, family: Option<&str>, catalogs: &[PathBuf]) -> Result<()> {
    let only = family.map(FamilyKind::from_name).transpose()?;
    let catalog = catalog::effective_catalog(config, catalogs)?;

    for (kind, variants) in catalog.families() {
        if only.is_some_and(|only| only != kind) {
            continue;
        }
        println!("{} ({})", style(kind.name()).bold(), variants.len());
        for (index, variant) in variants.iter().enumerate() {
            println!(
                "  {:>2}. {:<40} {}",
                index + 1,
                variant.name(),
                style(variant.wire_signature()).dim()
            );
        }
    }
    Ok(())
}

fn cmd_config_show(config: &Config) -> Result<()> {
    let text = toml::to_string_pretty(config).context("Failed to render configuration")?;
    print!("{text}");
    Ok(())
}

fn cmd_config_path() -> Result<()> {
    let marker = |path: &Path| {
        if path.exists() {
            style("(found)").green()
        } else {
            style("(not found)").dim()
        }
    };

    match Config::global_config_path() {
        Some(global) => println!("global:  {} {}", global.display(), marker(&global)),
        None => println!("global:  {}", style("(no home directory)").dim()),
    }
    let project = Path::new(PROJECT_CONFIG_PATH);
    println!("project: {} {}", project.display(), marker(project));
    Ok(())
}
