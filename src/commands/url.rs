//! URL command - hide and extract messages in a URL query parameter.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use veilmark::StegoEngine;

use super::{report_extraction, resolve_key, CliContext, CommandExecutor, MessageArgs};

/// Hide or extract a message in a URL query parameter.
#[derive(Args, Debug)]
pub struct UrlCommand {
    #[command(subcommand)]
    pub action: UrlAction,
}

#[derive(Subcommand, Debug)]
pub enum UrlAction {
    /// Hide a message in a URL
    Embed(UrlEmbedArgs),

    /// Extract a hidden message from a URL
    Extract(UrlExtractArgs),
}

#[derive(Args, Debug)]
pub struct UrlEmbedArgs {
    /// Cover URL
    pub url: String,

    #[command(flatten)]
    pub message: MessageArgs,
}

#[derive(Args, Debug)]
pub struct UrlExtractArgs {
    /// URL to inspect
    pub url: String,

    /// Label of the vault key to decrypt with
    #[arg(short, long)]
    pub key: Option<String>,

    /// Write the message to this file instead of printing it
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl CommandExecutor for UrlCommand {
    fn execute(&self, ctx: &CliContext) -> Result<()> {
        match &self.action {
            UrlAction::Embed(args) => {
                let message = args.message.read()?;
                let vault = ctx.load_vault_if(args.message.key.as_deref())?;
                let key = resolve_key(&vault, args.message.key.as_deref())?;
                let engine = StegoEngine::with_config(&vault, ctx.settings.stego.clone());

                let result = engine
                    .embed_url(&args.url, &message, key.as_ref())
                    .context("Failed to embed message")?;
                println!("{}", result.carrier);
                Ok(())
            }
            UrlAction::Extract(args) => {
                let vault = ctx.load_vault_if(args.key.as_deref())?;
                let key = resolve_key(&vault, args.key.as_deref())?;
                let engine = StegoEngine::with_config(&vault, ctx.settings.stego.clone());

                let result = engine
                    .extract_url(&args.url, key.as_ref())
                    .context("Failed to extract message")?;
                report_extraction(result, args.output.as_deref())
            }
        }
    }
}
