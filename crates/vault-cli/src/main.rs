//! pwvault - terminal password manager
//!
//! Every command that touches credentials unlocks the account first. The
//! master secret comes from `--password` / `PWVAULT_PASSWORD` or is prompted
//! for on the terminal.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

use vault_core::{
    CredentialRecord, SecretString, Vault, VaultError, VaultSession, UNLOCK_FAILED_MESSAGE,
};

/// pwvault - Password manager with per-account encrypted storage
#[derive(Parser, Debug)]
#[command(name = "pwvault")]
#[command(version)]
#[command(about = "pwvault - Store and retrieve encrypted credentials")]
struct Args {
    /// Data directory (defaults to the platform data directory)
    #[arg(long, env = "PWVAULT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Vault account to act on
    #[arg(short, long, env = "PWVAULT_USER")]
    user: String,

    /// Master secret (prompted for when absent)
    #[arg(long, env = "PWVAULT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new account
    Init,
    /// Bring over an account from an earlier release
    ///
    /// Its tokens are keyed by the bcrypt hash stored for the user, so that
    /// hash is needed alongside the login password. Once the tokens are
    /// imported and migrated the account is re-keyed under the login password.
    ImportAccount {
        /// Stored bcrypt hash from the old users table (prompted for when absent)
        #[arg(long, env = "PWVAULT_LEGACY_HASH", hide_env_values = true)]
        hash: Option<String>,
        /// Exported tokens, one `title<TAB>username<TAB>token` per line
        #[arg(long)]
        tokens: Option<PathBuf>,
    },
    /// Add a credential; the secret is prompted for
    Add(Fields),
    /// Store an exported token as-is
    ImportToken {
        #[arg(long)]
        title: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        token: String,
    },
    /// Replace a credential; the secret is prompted for
    Edit {
        id: Uuid,
        #[command(flatten)]
        fields: Fields,
    },
    /// Delete a credential
    Delete { id: Uuid },
    /// List credentials
    List {
        /// Show decrypted secrets instead of masking them
        #[arg(long)]
        reveal: bool,
    },
    /// Print one decrypted secret
    Show { id: Uuid },
    /// Rewrite legacy tokens under the current format
    Migrate,
    /// Change the master secret
    Passwd,
}

#[derive(clap::Args, Debug)]
struct Fields {
    #[arg(long)]
    title: String,
    #[arg(long)]
    username: String,
    #[arg(long)]
    website: Option<String>,
    #[arg(long)]
    notes: Option<String>,
}

impl Fields {
    fn into_record(self, secret: SecretString) -> CredentialRecord {
        let mut record = CredentialRecord::new(&self.title, &self.username, secret);
        record.website = self.website;
        record.notes = self.notes;
        record
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let vault = match args.data_dir.clone() {
        Some(dir) => Vault::with_dir(dir),
        None => Vault::new(),
    }
    .context("Failed to open vault")?;
    info!("Using vault in {:?}", vault.storage_dir());

    run(&vault, args).await
}

async fn run(vault: &Vault, args: Args) -> Result<()> {
    let Args {
        user,
        password,
        command,
        ..
    } = args;

    match command {
        Command::Init => {
            let secret = prompt_new_secret(password)?;
            let session = vault.register(&user, secret).await.map_err(shown)?;
            println!("Created account {}", session.username());
        }
        Command::ImportAccount { hash, tokens } => {
            let login = master_secret(password)?;
            let stored_hash = match hash {
                Some(hash) => SecretString::new(hash),
                None => prompt("Stored password hash: ")?,
            };
            if stored_hash.is_empty() {
                bail!("A stored password hash is required");
            }
            let lines = match tokens {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {:?}", path))?,
                None => String::new(),
            };

            let session = vault
                .import_legacy_account(&user, login.clone(), stored_hash.clone())
                .await
                .map_err(shown)?;

            for (number, line) in lines.lines().enumerate() {
                let fields: Vec<&str> = line.split('\t').collect();
                let [title, username, token] = fields[..] else {
                    eprintln!("  line {}: expected three tab-separated fields", number + 1);
                    continue;
                };
                if let Err(e) = vault
                    .credentials()
                    .import_encrypted(&session, title, username, token)
                    .await
                {
                    warn!(kind = ?e.kind(), "Skipping line {}", number + 1);
                    eprintln!("  line {}: {}", number + 1, e.user_message());
                }
            }

            let report = vault
                .credentials()
                .migrate_legacy(&session)
                .await
                .map_err(shown)?;
            let session = vault
                .change_master_secret(session, stored_hash, login)
                .await
                .map_err(shown)?;
            println!(
                "Imported account {} with {} credentials ({} failed)",
                session.username(),
                report.migrated + report.already_current,
                report.failed.len()
            );
        }
        Command::Add(fields) => {
            let session = unlock(vault, &user, password).await?;
            let secret = prompt("Secret: ")?;
            let stored = vault
                .credentials()
                .add(&session, fields.into_record(secret))
                .await
                .map_err(shown)?;
            println!("{}", stored.id);
        }
        Command::ImportToken {
            title,
            username,
            token,
        } => {
            let session = unlock(vault, &user, password).await?;
            let stored = vault
                .credentials()
                .import_encrypted(&session, &title, &username, &token)
                .await
                .map_err(shown)?;
            println!("{}", stored.id);
        }
        Command::Edit { id, fields } => {
            let session = unlock(vault, &user, password).await?;
            let secret = prompt("Secret: ")?;
            vault
                .credentials()
                .edit(&session, id, fields.into_record(secret))
                .await
                .map_err(shown)?;
            println!("Updated {}", id);
        }
        Command::Delete { id } => {
            let session = unlock(vault, &user, password).await?;
            vault
                .credentials()
                .delete(&session, id)
                .await
                .map_err(shown)?;
            println!("Deleted {}", id);
        }
        Command::List { reveal } => {
            let session = unlock(vault, &user, password).await?;
            let rows = vault
                .credentials()
                .list_for_display(&session)
                .await
                .map_err(shown)?;
            let placeholder = vault.settings().placeholder.as_str();

            for row in &rows {
                let secret = match (&row.secret, reveal) {
                    (s, _) if !s.is_available() => s.display_or(placeholder),
                    (s, true) => s.display(),
                    (_, false) => "********",
                };
                println!(
                    "{}  {:<24} {:<24} {:<24} {}",
                    row.id,
                    row.title,
                    row.username,
                    secret,
                    row.website.as_deref().unwrap_or("")
                );
            }
            info!("Listed {} credentials", rows.len());
        }
        Command::Show { id } => {
            let session = unlock(vault, &user, password).await?;
            let secret = vault
                .credentials()
                .get_decrypted(&session, id)
                .await
                .map_err(shown)?;
            println!("{}", secret.expose());
        }
        Command::Migrate => {
            let session = unlock(vault, &user, password).await?;
            let report = vault
                .credentials()
                .migrate_legacy(&session)
                .await
                .map_err(shown)?;
            println!(
                "Migrated {}, already current {}, failed {}",
                report.migrated,
                report.already_current,
                report.failed.len()
            );
            for (id, kind) in &report.failed {
                eprintln!("  {}: {:?}", id, kind);
            }
        }
        Command::Passwd => {
            let old_secret = master_secret(password)?;
            let session = unlock_with(vault, &user, old_secret.clone()).await?;
            let new_secret = prompt_new_secret(None)?;
            let session = vault
                .change_master_secret(session, old_secret, new_secret)
                .await
                .map_err(shown)?;
            println!("Master secret changed for {}", session.username());
        }
    }

    Ok(())
}

async fn unlock(vault: &Vault, user: &str, password: Option<String>) -> Result<VaultSession> {
    unlock_with(vault, user, master_secret(password)?).await
}

/// Any unlock failure is reported the same way; the kind goes to the log
async fn unlock_with(vault: &Vault, user: &str, secret: SecretString) -> Result<VaultSession> {
    match vault.unlock(user, secret).await {
        Ok(session) => Ok(session),
        Err(e) => {
            warn!(kind = ?e.kind(), "Unlock failed for {}", user);
            bail!(UNLOCK_FAILED_MESSAGE)
        }
    }
}

/// Replace an error's text with its end-user message
fn shown(e: VaultError) -> anyhow::Error {
    anyhow::anyhow!(e.user_message())
}

fn master_secret(password: Option<String>) -> Result<SecretString> {
    match password {
        Some(password) => Ok(SecretString::new(password)),
        None => prompt("Master password: "),
    }
}

fn prompt_new_secret(password: Option<String>) -> Result<SecretString> {
    if let Some(password) = password {
        return Ok(SecretString::new(password));
    }

    let first = prompt("New master password: ")?;
    let second = prompt("Repeat master password: ")?;
    if first.expose() != second.expose() {
        bail!("Passwords do not match");
    }
    Ok(first)
}

fn prompt(label: &str) -> Result<SecretString> {
    let value = rpassword::prompt_password(label).context("Failed to read from terminal")?;
    Ok(SecretString::new(value))
}
