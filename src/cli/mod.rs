pub mod backup;
pub mod init;
pub mod migrate;
pub mod serve;
pub mod user;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "newsdesk")]
#[command(version)]
#[command(about = "A news-publishing backend", long_about = None)]
pub struct Cli {
    #[arg(short, long, default_value = "newsdesk.toml", env = "NEWSDESK_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter configuration and data directory
    Init {
        #[arg(default_value = ".")]
        path: PathBuf,
        #[arg(long)]
        name: Option<String>,
    },
    /// Migrate the database and start the HTTP API
    Serve {
        /// Overrides server.host
        #[arg(short = 'H', long)]
        host: Option<String>,
        /// Overrides server.port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Apply pending migrations, or show where the schema stands
    Migrate {
        #[command(subcommand)]
        command: Option<MigrateCommand>,
    },
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
    /// Export or import the whole database (stop the server first when importing)
    Backup {
        #[command(subcommand)]
        command: BackupCommand,
    },
}

#[derive(Subcommand)]
pub enum BackupCommand {
    /// Write a consistent copy of the database
    Export {
        #[arg(short, long, default_value = "backups")]
        output: PathBuf,
    },
    /// Replace the database with a .db/.sqlite file, migrating it first
    Import {
        file: PathBuf,
        /// Where the replaced database is saved
        #[arg(long, default_value = "backups")]
        backup_dir: PathBuf,
    },
    List {
        #[arg(default_value = "backups")]
        dir: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum MigrateCommand {
    /// Show base migrations, the slug column state, and slugs a backfill would assign
    Status,
}

#[derive(Subcommand)]
pub enum UserCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "journalist")]
        role: String,
        #[arg(long)]
        password: Option<String>,
    },
    List,
    Remove {
        email: String,
    },
    Passwd {
        email: String,
    },
}
