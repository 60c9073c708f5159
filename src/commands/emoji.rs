//! Emoji command - hide and extract messages with zero-width markers.

use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use veilmark::StegoEngine;

use super::{report_extraction, resolve_key, CliContext, CommandExecutor, MessageArgs};

/// Hide or extract a message as invisible markers between emoji (or any text).
///
/// Every grapheme cluster of the cover carries one bit, so the cover needs
/// at least 8 clusters per byte plus 96 for the header.
#[derive(Args, Debug)]
pub struct EmojiCommand {
    #[command(subcommand)]
    pub action: EmojiAction,
}

#[derive(Subcommand, Debug)]
pub enum EmojiAction {
    /// Hide a message in a cover text
    Embed(EmojiEmbedArgs),

    /// Extract a hidden message from a text
    Extract(EmojiExtractArgs),
}

#[derive(Args, Debug)]
pub struct EmojiEmbedArgs {
    /// File holding the cover text
    #[arg(short, long)]
    pub cover: PathBuf,

    /// Where to write the marked text (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub message: MessageArgs,
}

#[derive(Args, Debug)]
pub struct EmojiExtractArgs {
    /// File holding the marked text (stdin if omitted)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Label of the vault key to decrypt with
    #[arg(short, long)]
    pub key: Option<String>,

    /// Write the message to this file instead of printing it
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl CommandExecutor for EmojiCommand {
    fn execute(&self, ctx: &CliContext) -> Result<()> {
        match &self.action {
            EmojiAction::Embed(args) => embed(ctx, args),
            EmojiAction::Extract(args) => extract(ctx, args),
        }
    }
}

fn embed(ctx: &CliContext, args: &EmojiEmbedArgs) -> Result<()> {
    let cover = std::fs::read_to_string(&args.cover)
        .with_context(|| format!("Failed to read cover {}", args.cover.display()))?;
    let message = args.message.read()?;

    let vault = ctx.load_vault_if(args.message.key.as_deref())?;
    let key = resolve_key(&vault, args.message.key.as_deref())?;
    let engine = StegoEngine::with_config(&vault, ctx.settings.stego.clone());

    let result = engine
        .embed_emoji(&cover, &message, key.as_ref())
        .context("Failed to embed message")?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &result.carrier)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Marked text written to {}", path.display());
        }
        None => print!("{}", result.carrier),
    }
    Ok(())
}

fn extract(ctx: &CliContext, args: &EmojiExtractArgs) -> Result<()> {
    let text = match &args.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read text from stdin")?;
            buffer
        }
    };

    let vault = ctx.load_vault_if(args.key.as_deref())?;
    let key = resolve_key(&vault, args.key.as_deref())?;
    let engine = StegoEngine::with_config(&vault, ctx.settings.stego.clone());

    let result = engine
        .extract_emoji(&text, key.as_ref())
        .context("Failed to extract message")?;
    report_extraction(result, args.output.as_deref())
}
