// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use finance_ledger::{format_money, init_logging, Kind, LedgerConfig, LedgerError, LedgerStore};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "finance-ledger", version, about = "Personal income and expense ledger")]
struct Cli {
    /// Ledger database file [default: finanzas.db]
    #[arg(long, global = true, env = "FINANCE_LEDGER_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive terminal form (default)
    Ui,
    /// Create the ledger table if it does not exist
    Init,
    /// Copy movements from an old `movimientos` table
    Migrate,
    /// Record a movement
    Add {
        /// Income or Expense
        kind: String,
        description: String,
        #[arg(allow_hyphen_values = true)]
        amount: String,
    },
    /// Print every movement
    List {
        #[arg(long)]
        json: bool,
    },
    /// Delete a movement by id
    Delete { id: i64 },
    /// Print income, expense and balance
    Totals {
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = LedgerConfig::from_env();
    if let Some(db) = cli.db {
        config = config.with_db_path(db);
    }
    init_logging(&config.log_filter);

    match run(cli.command.unwrap_or(Command::Ui), &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("❌ {:#}", err);
            ExitCode::from(exit_status(&err))
        }
    }
}

/// 2 for rejected input, 1 for everything else
fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<LedgerError>() {
        Some(ledger_err) if ledger_err.is_validation() => 2,
        _ => 1,
    }
}

fn run(command: Command, config: &LedgerConfig) -> Result<()> {
    let store = LedgerStore::open(config.db_path.clone())
        .with_context(|| format!("Failed to open ledger at {}", config.db_path.display()))?;

    match command {
        Command::Ui => run_ui_mode(store),
        Command::Init => {
            println!("✓ Ledger ready at {}", store.path().display());
            Ok(())
        }
        Command::Migrate => {
            let report = store.migrate_legacy().context("Migration failed")?;
            println!("✓ Migrated {} movements", report.copied);
            if report.renumbered > 0 {
                println!("  {} got new ids (their old ids were already used)", report.renumbered);
            }
            if report.skipped > 0 {
                println!("⚠️  Skipped {} invalid rows; see the movimientos_migrated_* table", report.skipped);
            }
            Ok(())
        }
        Command::Add { kind, description, amount } => {
            let id = store
                .append_raw(&kind, &description, &amount)
                .context("Failed to save movement")?;
            println!("✓ Saved movement #{}", id);
            Ok(())
        }
        Command::List { json } => {
            let movements = store.list_all().context("Failed to load movements")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&movements)?);
                return Ok(());
            }

            println!("{:>5}  {:<8}  {:<32}  {:>14}  {}", "ID", "Kind", "Description", "Amount", "Date");
            for m in &movements {
                println!(
                    "{:>5}  {:<8}  {:<32}  {:>14}  {}",
                    m.id,
                    m.kind,
                    m.description,
                    format_money(m.signed_amount()),
                    m.timestamp
                );
            }
            println!("{} movements", movements.len());
            Ok(())
        }
        Command::Delete { id } => {
            if store.delete(id).context("Failed to delete movement")? {
                println!("✓ Deleted movement #{}", id);
            } else {
                println!("Nothing to delete: no movement #{}", id);
            }
            Ok(())
        }
        Command::Totals { json } => {
            let totals = store.totals().context("Failed to compute totals")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&totals)?);
            } else {
                println!("{}: {}", Kind::Income, format_money(totals.income));
                println!("{}: {}", Kind::Expense, format_money(totals.expense));
                println!("Balance: {}", format_money(totals.balance));
            }
            Ok(())
        }
    }
}

#[cfg(feature = "tui")]
fn run_ui_mode(store: LedgerStore) -> Result<()> {
    let mut app = ui::App::new(store).context("Failed to load movements")?;
    ui::run_ui(&mut app)?;
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_store: LedgerStore) -> Result<()> {
    anyhow::bail!("TUI mode not available; rebuild with `--features tui` or use the subcommands")
}
