//! Keys command - inspect and manage the vault.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use veilmark::crypto::SALT_LEN;

use super::{CliContext, CommandExecutor};

/// Manage keys stored in the vault.
#[derive(Args, Debug)]
pub struct KeysCommand {
    #[command(subcommand)]
    pub action: KeysAction,
}

#[derive(Subcommand, Debug)]
pub enum KeysAction {
    /// List all keys
    List,

    /// Delete a key
    Delete(KeysDeleteArgs),

    /// Recreate a passphrase-derived key from its passphrase and salt
    Recover(KeysRecoverArgs),
}

#[derive(Args, Debug)]
pub struct KeysDeleteArgs {
    /// Label of the key to delete
    pub label: String,
}

#[derive(Args, Debug)]
pub struct KeysRecoverArgs {
    /// Label to store the recovered key under
    pub label: String,

    /// Passphrase the key was generated from
    #[arg(short, long)]
    pub passphrase: String,

    /// Salt printed by keygen (32 hex characters)
    #[arg(short, long)]
    pub salt: String,
}

impl CommandExecutor for KeysCommand {
    fn execute(&self, ctx: &CliContext) -> Result<()> {
        match &self.action {
            KeysAction::List => list_keys(ctx),
            KeysAction::Delete(args) => delete_key(ctx, args),
            KeysAction::Recover(args) => recover_key(ctx, args),
        }
    }
}

/// List all keys.
fn list_keys(ctx: &CliContext) -> Result<()> {
    let vault = ctx.load_vault()?;
    let keys = vault.list_keys();

    if keys.is_empty() {
        println!("No keys in vault.");
        println!();
        println!("Generate one with: veilmark keygen <label> [--passphrase <passphrase>]");
        return Ok(());
    }

    println!("Keys ({}):", keys.len());
    println!();
    for record in keys {
        println!(
            "  {:<20} {:<9} {}  created {}",
            record.label,
            record.algorithm.to_string(),
            record.id,
            record.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    Ok(())
}

/// Delete a key.
fn delete_key(ctx: &CliContext, args: &KeysDeleteArgs) -> Result<()> {
    let vault = ctx.load_vault()?;
    let handle = vault
        .handle_for_label(&args.label)
        .with_context(|| format!("No key labelled '{}' in the vault", args.label))?;

    let record = vault.delete_key(&handle).context("Failed to delete key")?;
    ctx.save_vault(&vault)?;

    println!("Key '{}' ({}) deleted.", record.label, record.id);
    Ok(())
}

/// Recover a passphrase-derived key.
fn recover_key(ctx: &CliContext, args: &KeysRecoverArgs) -> Result<()> {
    let bytes = hex::decode(args.salt.trim()).context("Salt is not valid hex")?;
    let Ok(salt) = <[u8; SALT_LEN]>::try_from(bytes.as_slice()) else {
        bail!("Salt must be {} bytes ({} hex characters)", SALT_LEN, SALT_LEN * 2);
    };

    let vault = ctx.load_vault()?;
    let handle = vault
        .recover_key(&args.label, &args.passphrase, salt)
        .context("Failed to recover key")?;
    ctx.save_vault(&vault)?;

    let record = vault.record(&handle)?;
    println!("Key '{}' recovered ({}, {}).", record.label, record.algorithm, record.id);
    Ok(())
}
