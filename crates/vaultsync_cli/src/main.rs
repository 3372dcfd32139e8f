//! VaultSync CLI
//!
//! Command-line front end for keeping a vault in sync with its SFTP copy.
//!
//! # Commands
//!
//! - `init` - Create a vault with a default settings entry
//! - `entry` - Add, list or remove entries
//! - `configure` - Change the sync settings stored in the vault
//! - `rekey` - Change the master key
//! - `status` - Show the sync settings and the derived target
//! - `sync` - Run one synchronization attempt
//! - `watch` - Keep the vault open and auto-sync on its interval
//! - `compare` - Compare two files byte for byte

mod commands;
mod console;
mod session;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Keeps an encrypted vault in sync with a copy on an SFTP server.
#[derive(Parser)]
#[command(name = "vaultsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the vault file
    #[arg(global = true, short = 'f', long)]
    vault: Option<PathBuf>,

    /// Master password of the vault
    #[arg(
        global = true,
        long,
        env = "VAULTSYNC_MASTER_PASSWORD",
        hide_env_values = true
    )]
    master_password: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new vault
    Init {
        /// Display name of the vault
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Manage entries
    Entry {
        #[command(subcommand)]
        action: EntryAction,
    },

    /// Change the sync settings stored in the vault
    Configure {
        /// Target URL, e.g. sftp://example.org:22/backups/
        #[arg(long)]
        url: Option<String>,

        /// SFTP user name
        #[arg(long)]
        username: Option<String>,

        /// SFTP password
        #[arg(long)]
        password: Option<String>,

        /// Sync right after the vault is opened
        #[arg(long)]
        sync_on_open: Option<bool>,

        /// Sync after every save
        #[arg(long)]
        sync_on_save: Option<bool>,

        /// Auto-sync interval in minutes (0 disables it)
        #[arg(long)]
        interval: Option<u32>,
    },

    /// Change the master key of the vault
    Rekey {
        /// New master password
        #[arg(
            long = "new",
            env = "VAULTSYNC_NEW_MASTER_PASSWORD",
            hide_env_values = true
        )]
        new_password: Option<String>,
    },

    /// Show the sync settings
    Status {
        /// Output format (text, json)
        #[arg(short = 'o', long, default_value = "text")]
        format: String,
    },

    /// Run one synchronization attempt
    Sync {
        /// Run unattended: never prompt, override a corrupted remote copy
        #[arg(short, long)]
        auto: bool,
    },

    /// Keep the vault open and sync on its auto-sync interval
    Watch {
        /// Stop after this many attempts
        #[arg(long)]
        max_attempts: Option<u64>,
    },

    /// Compare two files byte for byte
    Compare {
        /// First file
        a: PathBuf,

        /// Second file
        b: PathBuf,

        /// Read chunk size in bytes
        #[arg(long, default_value_t = vaultsync_engine::DEFAULT_VERIFY_CHUNK_SIZE)]
        chunk_size: usize,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum EntryAction {
    /// Add an entry
    Add {
        /// Entry title
        title: String,

        /// User name
        #[arg(short, long)]
        username: Option<String>,

        /// Password
        #[arg(short, long)]
        password: Option<String>,

        /// URL
        #[arg(long)]
        url: Option<String>,

        /// Notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// List entries
    List {
        /// Output format (text, json)
        #[arg(short = 'o', long, default_value = "text")]
        format: String,
    },

    /// Remove an entry
    Remove {
        /// Entry id
        id: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let vault = || cli.vault.clone().ok_or("Vault path required (--vault)");
    let password = || session::master_password(cli.master_password.as_deref());

    match cli.command {
        Commands::Init { ref name } => {
            commands::init::run(&vault()?, &password()?, name.as_deref())?;
        }
        Commands::Entry { ref action } => {
            let path = vault()?;
            let password = password()?;
            match action {
                EntryAction::Add {
                    title,
                    username,
                    password: entry_password,
                    url,
                    notes,
                } => commands::entry::add(
                    &commands::sync::build_engine(),
                    &path,
                    &password,
                    commands::entry::NewEntry {
                        title,
                        username: username.as_deref(),
                        password: entry_password.as_deref(),
                        url: url.as_deref(),
                        notes: notes.as_deref(),
                    },
                )?,
                EntryAction::List { format } => {
                    commands::entry::list(&path, &password, format)?;
                }
                EntryAction::Remove { id } => {
                    let engine = commands::sync::build_engine();
                    commands::entry::remove(&engine, &path, &password, id)?;
                }
            }
        }
        Commands::Configure {
            ref url,
            ref username,
            ref password,
            sync_on_open,
            sync_on_save,
            interval,
        } => {
            let changes = commands::configure::Changes {
                url: url.clone(),
                username: username.clone(),
                password: password.clone(),
                sync_on_open,
                sync_on_save,
                interval,
            };
            let master = session::master_password(cli.master_password.as_deref())?;
            commands::configure::run(&vault()?, &master, changes)?;
        }
        Commands::Rekey { ref new_password } => {
            let engine = commands::sync::build_engine();
            commands::rekey::run(&engine, &vault()?, &password()?, new_password.as_deref())?;
        }
        Commands::Status { ref format } => {
            commands::status::run(&vault()?, &password()?, format)?;
        }
        Commands::Sync { auto } => {
            commands::sync::run(&vault()?, &password()?, !auto)?;
        }
        Commands::Watch { max_attempts } => {
            commands::watch::run(&vault()?, &password()?, max_attempts)?;
        }
        Commands::Compare {
            ref a,
            ref b,
            chunk_size,
        } => {
            commands::compare::run(a, b, chunk_size)?;
        }
        Commands::Version => {
            println!("VaultSync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("VaultSync Core v{}", vaultsync_core::VERSION);
        }
    }

    Ok(())
}
