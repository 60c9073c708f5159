//! Capacity command - show how much a carrier can hold.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use veilmark::capacity::Carrier;
use veilmark::stego::image::load_image;
use veilmark::StegoEngine;

use super::{resolve_key, CliContext, CommandExecutor};

/// Show the capacity of a carrier.
#[derive(Args, Debug)]
pub struct CapacityCommand {
    #[command(flatten)]
    pub carrier: CarrierArgs,

    /// Account for encryption with this vault key
    #[arg(short, long)]
    pub key: Option<String>,
}

/// Exactly one carrier to measure.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct CarrierArgs {
    /// Image file
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// URL
    #[arg(long)]
    pub url: Option<String>,

    /// File holding an emoji cover text
    #[arg(long)]
    pub emoji: Option<PathBuf>,
}

impl CommandExecutor for CapacityCommand {
    fn execute(&self, ctx: &CliContext) -> Result<()> {
        let vault = ctx.load_vault_if(self.key.as_deref())?;
        let key = resolve_key(&vault, self.key.as_deref())?;
        let engine = StegoEngine::with_config(&vault, ctx.settings.stego.clone());

        let image;
        let text;
        let carrier = if let Some(path) = &self.carrier.image {
            image = load_image(path)
                .with_context(|| format!("Failed to load image {}", path.display()))?;
            Carrier::Image(&image)
        } else if let Some(path) = &self.carrier.emoji {
            text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Carrier::Emoji(&text)
        } else {
            Carrier::Url(self.carrier.url.as_deref().unwrap_or_default())
        };

        let bits = engine.capacity_bits(&carrier);
        let max_len = engine.max_message_len(&carrier, key.as_ref())?;

        println!("Carrier:          {}", carrier.kind());
        println!("Capacity:         {} bits ({} bytes)", bits, bits / 8);
        println!("Largest message:  {} bytes", max_len);
        Ok(())
    }
}
