//! Command module - Strategy pattern for CLI commands.
//!
//! Each command is a separate module implementing the `CommandExecutor` trait.
//! All file I/O happens here; the library core never touches the filesystem
//! on its own.

mod capacity;
mod emoji;
mod image;
mod keygen;
mod keys;
mod url;

pub use capacity::CapacityCommand;
pub use emoji::EmojiCommand;
pub use image::ImageCommand;
pub use keygen::KeygenCommand;
pub use keys::KeysCommand;
pub use url::UrlCommand;

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;

use veilmark::crypto::{KeyHandle, KeyVault, VaultContext};
use veilmark::settings::Settings;
use veilmark::stego::ExtractResult;

/// Environment variable holding the vault secret.
pub const VAULT_SECRET_ENV: &str = "VEILMARK_VAULT_SECRET";

/// Trait for command execution - Strategy pattern.
///
/// Each command struct holds its parsed arguments and implements
/// this trait to define its execution logic.
pub trait CommandExecutor {
    /// Executes the command with its parsed arguments.
    fn execute(&self, ctx: &CliContext) -> Result<()>;
}

/// Resolved settings and vault location shared by every command.
pub struct CliContext {
    pub settings: Settings,
    pub vault_path: PathBuf,
    vault_secret: Option<String>,
}

impl CliContext {
    pub fn new(settings: Settings, vault_path: PathBuf, vault_secret: Option<String>) -> Self {
        Self {
            settings,
            vault_path,
            vault_secret,
        }
    }

    fn vault_context(&self) -> Result<VaultContext> {
        match self.vault_secret.as_deref() {
            Some(secret) if !secret.is_empty() => Ok(VaultContext::new(secret)),
            _ => bail!(
                "A vault secret is required: pass --vault-secret or set {}",
                VAULT_SECRET_ENV
            ),
        }
    }

    /// Opens the vault file (an empty vault if it doesn't exist yet).
    pub fn load_vault(&self) -> Result<KeyVault> {
        let context = self.vault_context()?;
        KeyVault::load_from_file(&self.vault_path, &context)
            .with_context(|| format!("Failed to open vault {}", self.vault_path.display()))
    }

    /// Opens the vault only if a key label was given.
    pub fn load_vault_if(&self, key: Option<&str>) -> Result<KeyVault> {
        match key {
            Some(_) => self.load_vault(),
            None => Ok(KeyVault::new()),
        }
    }

    pub fn save_vault(&self, vault: &KeyVault) -> Result<()> {
        let context = self.vault_context()?;
        vault
            .save_to_file(&self.vault_path, &context)
            .with_context(|| format!("Failed to save vault {}", self.vault_path.display()))
    }
}

/// Message source shared by every embed command.
#[derive(Args, Debug)]
pub struct MessageArgs {
    /// Text message to hide (mutually exclusive with --file)
    #[arg(short, long, conflicts_with = "file")]
    pub message: Option<String>,

    /// Binary file to hide (mutually exclusive with --message)
    #[arg(short, long, conflicts_with = "message")]
    pub file: Option<PathBuf>,

    /// Label of the vault key to encrypt with
    #[arg(short, long)]
    pub key: Option<String>,
}

impl MessageArgs {
    /// Reads the message from --message, --file or stdin.
    pub fn read(&self) -> Result<Vec<u8>> {
        if let Some(path) = &self.file {
            return std::fs::read(path)
                .with_context(|| format!("Failed to read file {}", path.display()));
        }
        match &self.message {
            Some(m) => Ok(m.as_bytes().to_vec()),
            None => {
                eprintln!("Reading message from stdin (Ctrl+D to finish):");
                let mut buffer = String::new();
                io::stdin()
                    .read_to_string(&mut buffer)
                    .context("Failed to read message from stdin")?;
                Ok(buffer.trim().as_bytes().to_vec())
            }
        }
    }
}

/// Looks up the handle for a key label.
pub fn resolve_key(vault: &KeyVault, label: Option<&str>) -> Result<Option<KeyHandle>> {
    match label {
        Some(label) => vault
            .handle_for_label(label)
            .map(Some)
            .with_context(|| format!("No key labelled '{}' in the vault", label)),
        None => Ok(None),
    }
}

/// Prints or saves an extracted message. Fails if nothing usable was found.
pub fn report_extraction(result: ExtractResult, output: Option<&Path>) -> Result<()> {
    match result {
        ExtractResult::Found { message, encrypted } => {
            if encrypted {
                eprintln!("Message was encrypted and has been decrypted.");
            }
            match output {
                Some(path) => {
                    std::fs::write(path, &message)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    eprintln!("Extracted {} bytes to {}", message.len(), path.display());
                }
                None => println!("{}", String::from_utf8_lossy(&message)),
            }
            Ok(())
        }
        ExtractResult::NotFound => bail!("No hidden message found"),
        ExtractResult::Corrupted(reason) => bail!("Hidden message is corrupted: {}", reason),
    }
}
