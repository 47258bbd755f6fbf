use clap::Parser;
use newsdesk::cli::{Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newsdesk=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init { path, name }) => {
            newsdesk::cli::init::run(path, name).await?;
        }
        Some(Commands::Serve { host, port }) => {
            newsdesk::cli::serve::run(&cli.config, host, port).await?;
        }
        Some(Commands::Migrate { command }) => {
            newsdesk::cli::migrate::run(&cli.config, command).await?;
        }
        Some(Commands::User { command }) => {
            newsdesk::cli::user::run(&cli.config, command).await?;
        }
        Some(Commands::Backup { command }) => {
            newsdesk::cli::backup::run(&cli.config, command).await?;
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
        }
    }

    Ok(())
}
