use crate::cli::MigrateCommand;
use crate::db::schema::{self, SlugColumnState, ARTICLES_TABLE};
use crate::db::{SlugMigrator, MIGRATION_DESCRIPTIONS};
use crate::{Config, Database};
use anyhow::Result;
use std::path::Path;

/// Slugs listed by `migrate status` before the rest is summarized.
const PLAN_PREVIEW: usize = 20;

pub async fn run(config_path: &Path, command: Option<MigrateCommand>) -> Result<()> {
    let config = Config::load(config_path)?;
    let db = Database::open(&config.database.path)?;

    match command {
        None => {
            let report = db.migrate()?;
            if report.is_noop() {
                tracing::info!("Schema already up to date");
            } else {
                tracing::info!(
                    column_added = report.column_added,
                    backfilled = report.backfilled,
                    rebuilt = report.rebuilt,
                    "Migrations complete"
                );
            }
        }
        Some(MigrateCommand::Status) => {
            show_status(&db)?;
        }
    }

    db.close();
    Ok(())
}

fn show_status(db: &Database) -> Result<()> {
    let statuses = db.get_migration_status()?;

    println!("\n  Migration Status\n");
    println!("  {:<10} {:<60} {}", "Version", "Description", "Applied");
    println!("  {}", "-".repeat(90));

    for (version, applied_at) in &statuses {
        let desc = MIGRATION_DESCRIPTIONS
            .get((*version as usize).saturating_sub(1))
            .unwrap_or(&"Unknown migration");

        let applied = match applied_at {
            Some(ts) => format!("\x1b[32m✓\x1b[0m {}", ts),
            None => "\x1b[33m✗ pending\x1b[0m".to_string(),
        };

        println!(
            "  {:<10} {:<60} {}",
            format!("{:03}", version),
            desc,
            applied
        );
    }

    let table_exists = {
        let conn = db.get()?;
        schema::table_exists(&conn, ARTICLES_TABLE)?
    };
    if !table_exists {
        println!("\n  Articles table not created yet. Run `newsdesk migrate`.\n");
        return Ok(());
    }

    let state = {
        let conn = db.get()?;
        schema::slug_column_state(&conn)?
    };
    let state_label = match state {
        SlugColumnState::Absent => "\x1b[33mmissing\x1b[0m",
        SlugColumnState::Unconstrained => "\x1b[33mpresent, not unique\x1b[0m",
        SlugColumnState::Unique => "\x1b[32munique\x1b[0m",
    };
    println!("\n  Article slug column: {}", state_label);

    let plan = SlugMigrator::new(db).plan()?;
    if plan.is_empty() {
        println!("  No slugs to backfill.");
    } else {
        println!("  {} article(s) would receive a slug:\n", plan.len());
        for assignment in plan.iter().take(PLAN_PREVIEW) {
            println!("    #{:<8} {}", assignment.id, assignment.slug);
        }
        if plan.len() > PLAN_PREVIEW {
            println!("    ... and {} more", plan.len() - PLAN_PREVIEW);
        }
    }

    if state != SlugColumnState::Unique || !plan.is_empty() {
        println!("\n  Run `newsdesk migrate` to apply.");
    }
    println!();

    Ok(())
}
