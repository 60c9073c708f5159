//! veilmark - invisible watermarks for images, URLs and emoji
//!
//! A CLI over the veilmark library: hides (optionally encrypted) messages in
//! image pixels, URL query parameters, or zero-width markers between emoji.

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use commands::{
    CapacityCommand, CliContext, CommandExecutor, EmojiCommand, ImageCommand, KeygenCommand,
    KeysCommand, UrlCommand, VAULT_SECRET_ENV,
};
use veilmark::settings::Settings;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "VEILMARK_LOG";

/// veilmark - invisible watermarks for images, URLs and emoji
///
/// Messages are framed with a checksum so extraction either returns exactly
/// what was embedded, reports that nothing is there, or reports corruption.
#[derive(Parser)]
#[command(name = "veilmark")]
#[command(version)]
#[command(about = "Steganographic watermarking for images, URLs and emoji")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Vault file (defaults to ~/.veilmark/vault.bin or the config file's vault_path)
    #[arg(long, global = true)]
    vault: Option<PathBuf>,

    /// Secret that unlocks the vault
    #[arg(long, global = true, env = VAULT_SECRET_ENV, hide_env_values = true)]
    vault_secret: Option<String>,

    /// Settings file (defaults to ~/.veilmark/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new key in the vault
    Keygen(KeygenCommand),

    /// List, delete or recover vault keys
    Keys(KeysCommand),

    /// Hide or extract a message in an image
    Image(ImageCommand),

    /// Hide or extract a message in a URL
    Url(UrlCommand),

    /// Hide or extract a message between emoji
    Emoji(EmojiCommand),

    /// Show how much a carrier can hold
    Capacity(CapacityCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("Failed to load settings")?;

    let vault_path = match cli.vault {
        Some(path) => path,
        None => settings
            .resolve_vault_path()
            .context("Failed to locate vault")?,
    };
    let ctx = CliContext::new(settings, vault_path, cli.vault_secret);

    match &cli.command {
        Commands::Keygen(cmd) => cmd.execute(&ctx),
        Commands::Keys(cmd) => cmd.execute(&ctx),
        Commands::Image(cmd) => cmd.execute(&ctx),
        Commands::Url(cmd) => cmd.execute(&ctx),
        Commands::Emoji(cmd) => cmd.execute(&ctx),
        Commands::Capacity(cmd) => cmd.execute(&ctx),
    }
}

/// Logs to stderr. `VEILMARK_LOG` sets the filter; `-v` forces debug.
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to initialize logging")
}
