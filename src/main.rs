use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use broadsheet::app::AppContext;
use broadsheet::cli::{commands, Cli, Commands};
use broadsheet::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(matches!(cli.command, Commands::Tui { .. }))?;

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url;
    }

    if let Commands::Route { fragment } = &cli.command {
        commands::route(fragment);
        return Ok(());
    }

    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Latest { page, all } => {
            commands::latest(&ctx, page, all).await?;
        }
        Commands::Show { id } => {
            commands::show(&ctx, id).await?;
        }
        Commands::Search { term, page } => {
            commands::search(&ctx, &term, page).await?;
        }
        Commands::Speak { id } => {
            commands::speak(&ctx, id).await?;
        }
        Commands::ClearCache => {
            commands::clear_cache(&ctx)?;
        }
        Commands::Route { .. } => {}
        Commands::Tui { fragment } => {
            broadsheet::tui::run(Arc::new(ctx), &fragment).await?;
        }
    }

    Ok(())
}

/// Log to stderr, or to `<data_dir>/broadsheet/broadsheet.log` while the TUI
/// owns the terminal.
fn init_tracing(tui: bool) -> anyhow::Result<()> {
    if tui {
        let path = AppContext::data_dir()?.join("broadsheet.log");
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
            .with(EnvFilter::from_default_env())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(EnvFilter::from_default_env())
            .init();
    }
    Ok(())
}
