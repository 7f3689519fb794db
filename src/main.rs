// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use finance_tracker::logging::{self, LogTarget};
use finance_tracker::{export_csv, CliArgs, Command, Config, Store, Summary};

fn main() -> Result<()> {
    let cli = CliArgs::parse();
    let config = Config::load(&cli)?;
    let command = cli.command.clone().unwrap_or(Command::Tui);

    // A TUI owns the terminal, so its logs go to a file
    let target = if command == Command::Tui {
        LogTarget::File
    } else {
        LogTarget::Stderr
    };
    logging::init(&config.logging, target)?;

    info!(
        version = finance_tracker::VERSION,
        database = %config.storage.database.display(),
        ?command,
        "starting"
    );

    let store = Store::open(&config)?;

    match command {
        Command::Tui => run_ui_mode(&store),
        Command::Summary => run_summary(&store),
        Command::Export { dir } => run_export(&store, &dir),
        Command::MigrateLegacy => run_migrate_legacy(&store),
    }
}

fn run_summary(store: &Store) -> Result<()> {
    let summary = Summary::collect(store)?;
    println!("{}", summary);
    Ok(())
}

fn run_export(store: &Store, dir: &std::path::Path) -> Result<()> {
    let paths = export_csv(store, dir)?;
    for path in paths {
        println!("✓ {}", path.display());
    }
    Ok(())
}

fn run_migrate_legacy(store: &Store) -> Result<()> {
    let migrated = store.migrate_legacy()?;
    if migrated == 0 {
        println!("Nothing to migrate");
    } else {
        println!("✓ Migrated {} legacy rows into the balance sheet", migrated);
    }
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(store: &Store) -> Result<()> {
    let mut app = ui::App::new(store)?;
    ui::run_ui(&mut app, store)
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_store: &Store) -> Result<()> {
    eprintln!("TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use: finance-tracker summary");
    std::process::exit(1);
}
