use crate::cli::BackupCommand;
use crate::db::backup;
use crate::{Config, Database};
use anyhow::{bail, Result};
use std::fs;
use std::path::Path;

pub async fn run(config_path: &Path, command: BackupCommand) -> Result<()> {
    let config = Config::load(config_path)?;

    match command {
        BackupCommand::Export { output } => {
            let db_path = Path::new(&config.database.path);
            if !db_path.exists() {
                bail!("Database not found: {}", db_path.display());
            }
            let db = Database::open_with_pool_size(&config.database.path, 1)?;
            let dest = output.join(backup::backup_file_name("newsdesk-backup"));
            backup::export(&db, &dest)?;
            db.close();
            println!("Backup written to {}", dest.display());
        }
        BackupCommand::Import { file, backup_dir } => {
            let report = backup::import(&file, Path::new(&config.database.path), &backup_dir)?;
            if let Some(previous) = &report.previous {
                println!("Previous database saved to {}", previous.display());
            }
            println!(
                "Imported {} article(s) into {}",
                report.articles, config.database.path
            );
            if !report.migration.is_noop() {
                println!(
                    "Slug migration applied (column added: {}, backfilled: {}, rebuilt: {})",
                    report.migration.column_added,
                    report.migration.backfilled,
                    report.migration.rebuilt
                );
            }
        }
        BackupCommand::List { dir } => {
            list_backups(&dir)?;
        }
    }

    Ok(())
}

fn list_backups(dir: &Path) -> Result<()> {
    if !dir.exists() {
        println!("No backups directory at {}", dir.display());
        return Ok(());
    }

    let mut backups: Vec<_> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "db"))
        .collect();
    backups.sort();
    backups.reverse();

    if backups.is_empty() {
        println!("No backups found in {}", dir.display());
        return Ok(());
    }

    println!("Available backups:");
    for path in backups {
        let size_mb = fs::metadata(&path)?.len() as f64 / (1024.0 * 1024.0);
        if let Some(name) = path.file_name() {
            println!("  {} ({:.2} MB)", name.to_string_lossy(), size_mb);
        }
    }
    Ok(())
}
