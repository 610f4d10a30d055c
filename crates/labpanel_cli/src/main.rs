//! `labpanel` command-line entry point.
//!
//! # Responsibility
//! - Provide read-only inspection of a panel database for operators.
//! - Keep output deterministic: one panel per line, tab separated.

use clap::{Parser, Subcommand};
use labpanel_core::db::open_db;
use labpanel_core::{
    default_log_level, init_logging, Panel, PanelConfig, PanelLookupCache, PanelService,
    SqlitePanelRepository,
};
use log::info;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "labpanel", about = "Inspect a laboratory panel catalog", version)]
struct Cli {
    /// SQLite database file; created and migrated when missing.
    #[arg(long, env = "LABPANEL_DB", default_value = "labpanel.sqlite3")]
    db: PathBuf,
    /// JSON config file (`{"default_page_size": 20}`).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Absolute directory for rolling log files. Logging is off when unset.
    #[arg(long, env = "LABPANEL_LOG_DIR")]
    log_dir: Option<String>,
    #[arg(long)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print core version and a liveness check.
    Ping,
    /// List active panels by name, or all panels by sort order.
    List {
        #[arg(long)]
        all: bool,
    },
    /// Print one page of panels starting at a 1-based record number.
    Page {
        #[arg(default_value_t = 1)]
        start: u32,
    },
    /// Case-insensitive name prefix search over active panels.
    Search { prefix: String },
    /// Resolve a panel name from the lookup cache.
    NameForId { id: i64 },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir)?;
    }

    if let Command::Ping = cli.command {
        println!("labpanel_core ping={}", labpanel_core::ping());
        println!("labpanel_core version={}", labpanel_core::core_version());
        return Ok(());
    }

    let config = match cli.config.as_ref() {
        Some(path) => PanelConfig::from_json_file(path)?,
        None => PanelConfig::default(),
    }
    .with_env_overrides()?;

    let conn = open_db(&cli.db)?;
    let repo = SqlitePanelRepository::try_new(&conn, Arc::new(PanelLookupCache::new()), &config)?;
    let service = PanelService::new(repo);
    info!(
        "event=cli_command module=cli status=start db={}",
        cli.db.display()
    );

    match cli.command {
        Command::Ping => {}
        Command::List { all } => {
            let panels = if all {
                service.all_panels()?
            } else {
                service.active_panels()?
            };
            print_panels(&panels);
        }
        Command::Page { start } => {
            let page = service.page_of_panels(start)?;
            print_panels(&page.items);
            if let Some(next) = page.next_starting_record_number(service.page_size()) {
                println!("# next page starts at {next}");
            }
        }
        Command::Search { prefix } => print_panels(&service.autocomplete(&prefix)?),
        Command::NameForId { id } => match service.lookup_name(id)? {
            Some(name) => println!("{name}"),
            None => return Err(format!("no active panel with id {id}").into()),
        },
    }

    Ok(())
}

fn print_panels(panels: &[Panel]) {
    for panel in panels {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            panel.id.unwrap_or_default(),
            panel.panel_name,
            panel.description,
            if panel.is_active { "Y" } else { "N" },
            panel.sort_order
        );
    }
}
