use cadence_core::db;
use cadence_core::error::CoreError;
use cadence_core::models::OverrideAction;
use cadence_core::repository::SqliteRepository;
use clap::Parser;
use owo_colors::{OwoColorize, Style};
use tracing_subscriber::EnvFilter;
use util::LookupError;

mod cli;
mod commands;
mod config;
mod parser;
mod util;
mod views;

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CADENCE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = cli::Cli::parse();

    let config = config::Config::new().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Ignoring unreadable configuration");
        config::Config::default()
    });
    let calendar = match config.calendar() {
        Ok(calendar) => calendar,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    let planning = config.planning();

    let db_pool = match db::establish_connection(&config.database_path).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };
    let repository = SqliteRepository::new(db_pool);

    let result = match cli.command {
        cli::Commands::Template(command) => match command.action {
            cli::TemplateAction::Add(command) => {
                commands::template::add_template(&repository, &calendar, command).await
            }
            cli::TemplateAction::List => commands::template::list_templates(&repository).await,
            cli::TemplateAction::Enable(command) => {
                commands::template::set_enabled(&repository, command, true).await
            }
            cli::TemplateAction::Disable(command) => {
                commands::template::set_enabled(&repository, command, false).await
            }
        },
        cli::Commands::Day(command) => commands::day::show_day(&repository, &calendar, command).await,
        cli::Commands::Edit(command) => {
            commands::edit::edit_template(&repository, &calendar, planning, &config, command).await
        }
        cli::Commands::Skip(command) => {
            commands::overrides::override_day(&repository, &calendar, command, OverrideAction::Skipped).await
        }
        cli::Commands::Delete(command) => {
            commands::overrides::override_day(&repository, &calendar, command, OverrideAction::Deleted).await
        }
        cli::Commands::Restore(command) => {
            commands::overrides::restore_day(&repository, &calendar, planning, &config, command).await
        }
    };

    if let Err(e) = result {
        handle_error(e);
        std::process::exit(1);
    }
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    if let Some(lookup_error) = err.downcast_ref::<LookupError>() {
        match lookup_error {
            LookupError::Ambiguous { query, candidates } => {
                eprintln!("{} '{}' matches more than one template.", "Error:".style(error_style), query);
                eprintln!("Did you mean one of these?");
                for (id, title) in candidates {
                    eprintln!("  {} ({})", id.yellow(), title);
                }
            }
            _ => eprintln!("{} {}", "Error:".style(error_style), lookup_error),
        }
        return;
    }

    if let Some(core_error) = err.chain().find_map(|e| e.downcast_ref::<CoreError>()) {
        match core_error {
            CoreError::TemplateNotFound(id) => {
                eprintln!("{} Template '{}' no longer exists", "Error:".style(error_style), id);
            }
            CoreError::MissingOccurrence(id) => {
                eprintln!(
                    "{} Occurrence {} disappeared while the edit was applied; nothing was changed",
                    "Error:".style(error_style),
                    id.yellow()
                );
            }
            CoreError::RollbackIncomplete { cause, failures } => {
                eprintln!("{} {}", "Error:".style(error_style), cause);
                eprintln!(
                    "{} The edit could not be fully undone. These occurrences may be left changed:",
                    "Warning:".yellow().bold()
                );
                for failure in failures {
                    eprintln!("  {}", failure);
                }
            }
            CoreError::InvalidInput(s) => {
                eprintln!("{} Invalid input: {}", "Error:".style(error_style), s);
            }
            _ => eprintln!("{} {}", "Error:".style(error_style), err),
        }
    } else {
        eprintln!("{} {}", "Error:".style(error_style), err);
    }
}
