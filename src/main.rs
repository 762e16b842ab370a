//! Cliconf - grammar-driven network CLI configuration
//!
//! Compiles a YAML device grammar and drives it in both directions: extract
//! facts from `show running-config` text, or synthesize the commands that
//! move a device from its current configuration to a wanted one.
//!
//! This is the main entry point for the Cliconf CLI.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cliconf::device::{render_diff, DeviceConfig};
use cliconf::error::Error;
use cliconf::grammar::Grammar;
use cliconf::state::State;
use cliconf::tree::compile::compile;
use cliconf::{commands, facts};

#[derive(Debug, Parser)]
#[command(name = "cliconf", author, version, about, long_about = None)]
struct Cli {
    /// Increase output verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract facts from device configuration text
    Facts {
        /// Path to the YAML grammar
        #[arg(short, long)]
        grammar: PathBuf,

        /// Path to `show running-config` output
        #[arg(short, long)]
        config: PathBuf,

        /// Pretty-print the fact document
        #[arg(long)]
        pretty: bool,
    },
    /// Synthesize commands from a wanted fact document
    Commands {
        /// Path to the YAML grammar
        #[arg(short, long)]
        grammar: PathBuf,

        /// Path to the wanted facts (JSON or YAML)
        #[arg(short, long)]
        want: PathBuf,

        /// Path to the device's `show running-config` output
        #[arg(short = 'c', long)]
        config: PathBuf,

        /// Target state: merged, deleted, replaced or overridden
        #[arg(short, long, default_value = "merged")]
        state: String,

        /// Print a unified diff of the device text instead of commands
        #[arg(long)]
        show_diff: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(error) = run(&cli) {
        eprintln!("error: {error:#}");
        let code = error
            .downcast_ref::<Error>()
            .map(Error::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Facts {
            grammar,
            config,
            pretty,
        } => {
            let tree = load_tree(grammar)?;
            let device = DeviceConfig::parse(&read(config)?);
            let facts = facts::extract(&tree, &device)?;
            let rendered = if *pretty {
                serde_json::to_string_pretty(&facts)?
            } else {
                serde_json::to_string(&facts)?
            };
            println!("{rendered}");
        }
        Commands::Commands {
            grammar,
            want,
            config,
            state,
            show_diff,
        } => {
            let tree = load_tree(grammar)?;
            let state = State::from_str(state)?;
            let device_text = read(config)?;
            let device = DeviceConfig::parse(&device_text);
            let have = facts::extract(&tree, &device)?;
            let want: serde_json::Value = load_facts(want)?;

            let out = commands::synthesize(&tree, &want, &have, state)?;
            if *show_diff {
                let after = out.join("\n");
                print!("{}", render_diff(device_text.trim_end(), &after));
            } else {
                for command in out {
                    println!("{command}");
                }
            }
        }
    }
    Ok(())
}

fn load_tree(path: &Path) -> anyhow::Result<cliconf::tree::Tree> {
    let grammar = Grammar::from_path(path)?;
    Ok(compile(&grammar)?)
}

/// Loads a fact document, accepting JSON and YAML spellings.
fn load_facts(path: &Path) -> anyhow::Result<serde_json::Value> {
    let text = read(path)?;
    if text.trim_start().starts_with(['{', '[']) {
        Ok(serde_json::from_str(&text)
            .with_context(|| format!("parsing facts from {}", path.display()))?)
    } else {
        Ok(serde_yaml::from_str(&text)
            .with_context(|| format!("parsing facts from {}", path.display()))?)
    }
}

fn read(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(verbosity >= 3).with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}
