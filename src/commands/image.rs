//! Image command - hide and extract messages in image pixels.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use veilmark::stego::image::{load_image, save_image};
use veilmark::StegoEngine;

use super::{report_extraction, resolve_key, CliContext, CommandExecutor, MessageArgs};

/// Hide or extract a message in the least significant bits of an image.
///
/// Output images must use a lossless format (PNG, BMP, TIFF, PNM, QOI);
/// saving to JPEG would destroy the hidden bits and is refused.
#[derive(Args, Debug)]
pub struct ImageCommand {
    #[command(subcommand)]
    pub action: ImageAction,
}

#[derive(Subcommand, Debug)]
pub enum ImageAction {
    /// Hide a message in an image
    Embed(ImageEmbedArgs),

    /// Extract a hidden message from an image
    Extract(ImageExtractArgs),
}

#[derive(Args, Debug)]
pub struct ImageEmbedArgs {
    /// Cover image
    #[arg(short, long)]
    pub input: PathBuf,

    /// Where to write the watermarked image (PNG recommended)
    #[arg(short, long)]
    pub output: PathBuf,

    #[command(flatten)]
    pub message: MessageArgs,

    /// Also use the alpha channel
    #[arg(long)]
    pub alpha: bool,
}

#[derive(Args, Debug)]
pub struct ImageExtractArgs {
    /// Image to inspect
    #[arg(short, long)]
    pub input: PathBuf,

    /// Label of the vault key to decrypt with
    #[arg(short, long)]
    pub key: Option<String>,

    /// Write the message to this file instead of printing it
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// The message was embedded with --alpha
    #[arg(long)]
    pub alpha: bool,
}

impl CommandExecutor for ImageCommand {
    fn execute(&self, ctx: &CliContext) -> Result<()> {
        match &self.action {
            ImageAction::Embed(args) => embed(ctx, args),
            ImageAction::Extract(args) => extract(ctx, args),
        }
    }
}

fn embed(ctx: &CliContext, args: &ImageEmbedArgs) -> Result<()> {
    let message = args.message.read()?;
    let cover = load_image(&args.input)
        .with_context(|| format!("Failed to load image {}", args.input.display()))?;

    let vault = ctx.load_vault_if(args.message.key.as_deref())?;
    let key = resolve_key(&vault, args.message.key.as_deref())?;
    let config = ctx.settings.stego.clone().with_alpha(ctx.settings.stego.include_alpha || args.alpha);
    let engine = StegoEngine::with_config(&vault, config);

    let result = engine
        .embed_image(&cover, &message, key.as_ref())
        .context("Failed to embed message")?;
    save_image(&result.carrier, &args.output)
        .with_context(|| format!("Failed to save image {}", args.output.display()))?;

    eprintln!(
        "Embedded {} bytes ({} of {} bits) into {}",
        message.len(),
        result.used_bits,
        result.available_bits,
        args.output.display()
    );
    if !result.lossless {
        eprintln!("WARNING: the image was converted to 8-bit samples to hold the message.");
    }
    Ok(())
}

fn extract(ctx: &CliContext, args: &ImageExtractArgs) -> Result<()> {
    let image = load_image(&args.input)
        .with_context(|| format!("Failed to load image {}", args.input.display()))?;

    let vault = ctx.load_vault_if(args.key.as_deref())?;
    let key = resolve_key(&vault, args.key.as_deref())?;
    let config = ctx.settings.stego.clone().with_alpha(ctx.settings.stego.include_alpha || args.alpha);
    let engine = StegoEngine::with_config(&vault, config);

    let result = engine
        .extract_image(&image, key.as_ref())
        .context("Failed to extract message")?;
    report_extraction(result, args.output.as_deref())
}
