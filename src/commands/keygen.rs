//! Key generation command.

use anyhow::{Context, Result};
use clap::Args;

use super::{CliContext, CommandExecutor};

/// Generate a new key in the vault.
///
/// Without a passphrase the key is a random AES-256 key. With a passphrase
/// it is an RSA-2048 key derived from the passphrase and a random salt; keep
/// the printed salt to recover it later with `keys recover`.
#[derive(Args, Debug)]
pub struct KeygenCommand {
    /// Label for the new key (must be unique in the vault)
    pub label: String,

    /// Passphrase to derive an RSA-2048 key from
    #[arg(short, long)]
    pub passphrase: Option<String>,
}

impl CommandExecutor for KeygenCommand {
    fn execute(&self, ctx: &CliContext) -> Result<()> {
        let vault = ctx.load_vault()?;
        let handle = vault
            .generate_key(&self.label, self.passphrase.as_deref())
            .context("Failed to generate key")?;
        ctx.save_vault(&vault)?;

        let record = vault.record(&handle)?;
        println!("Key generated successfully:");
        println!();
        println!("  Label:     {}", record.label);
        println!("  Id:        {}", record.id);
        println!("  Algorithm: {}", record.algorithm);
        if let Some(salt) = record.salt {
            println!("  Salt:      {}", hex::encode(salt));
            println!();
            println!("Keep the salt with your passphrase: together they recreate this key.");
        }
        println!();
        println!("Vault: {}", ctx.vault_path.display());

        Ok(())
    }
}
