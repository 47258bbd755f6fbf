use crate::models::NewUser;
use crate::{services::auth, Config, Database};
use anyhow::Result;
use std::path::Path;

use super::UserCommand;

fn prompt_new_password(prompt: &str) -> Result<String> {
    let password = rpassword::prompt_password(prompt)?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        anyhow::bail!("Passwords do not match");
    }
    Ok(password)
}

pub async fn run(config_path: &Path, command: UserCommand) -> Result<()> {
    let config = Config::load(config_path)?;
    let db = Database::open(&config.database.path)?;
    db.migrate()?;

    match command {
        UserCommand::Add {
            name,
            email,
            role,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt_new_password("Password: ")?,
            };
            let role = role
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid role '{}': use admin or journalist", role))?;

            let user = auth::create_user(
                &db,
                &NewUser {
                    name,
                    email,
                    password,
                    role,
                    status: Default::default(),
                    notes: None,
                },
            )?;
            tracing::info!("User '{}' created with role {}", user.email, user.role);
        }
        UserCommand::List => {
            let users = auth::list_users(&db)?;

            println!(
                "{:<24} {:<32} {:<12} {:<10}",
                "NAME", "EMAIL", "ROLE", "STATUS"
            );
            println!("{}", "-".repeat(80));
            for user in users {
                println!(
                    "{:<24} {:<32} {:<12} {:<10}",
                    user.name, user.email, user.role, user.status
                );
            }
        }
        UserCommand::Remove { email } => match auth::get_user_by_email(&db, &email)? {
            Some(user) => {
                auth::delete_user(&db, user.id)?;
                tracing::info!("User '{}' removed", email);
            }
            None => tracing::warn!("User '{}' not found", email),
        },
        UserCommand::Passwd { email } => {
            let password = prompt_new_password("New password: ")?;
            auth::update_password(&db, &email, &password)?;
            tracing::info!("Password updated for '{}'", email);
        }
    }

    db.close();
    Ok(())
}
