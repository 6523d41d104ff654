mod commands;
mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{convert, quote, wrap, ConvertArgs, QuoteArgs, WrapArgs};
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Letterpress - mail body conversion, wrapping and quoting
#[derive(Parser, Debug)]
#[command(name = "letterpress")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to ./letterpress.config.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert an HTML body to plain text or clean HTML
    Convert(ConvertArgs),

    /// Quote an HTML message as a plain text reply
    Quote(QuoteArgs),

    /// Wrap the paragraphs of a plain text file
    Wrap(WrapArgs),
}

/// Filter from `-v` flags, then `LETTERPRESS_LOG`, then the config file.
fn log_filter(verbose: u8, config: &Config) -> EnvFilter {
    let level = match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    };
    if let Some(level) = level {
        return EnvFilter::new(level);
    }
    EnvFilter::try_from_env("LETTERPRESS_LOG")
        .ok()
        .or_else(|| config.log.as_deref().and_then(|log| EnvFilter::try_new(log).ok()))
        .unwrap_or_else(|| EnvFilter::new("warn"))
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("Cannot get current directory")?;
    let config = Config::load(cli.config.as_deref(), &cwd)?;

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, &config))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Convert(args) => convert(args, &config),
        Command::Quote(args) => quote(args, &config),
        Command::Wrap(args) => wrap(args, &config),
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
