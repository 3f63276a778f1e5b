/// Command line entry point for the habit core
///
/// Sets up logging, resolves the database location, and runs one
/// maintenance command (backup, stats, widget preview) against the store.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use habit_core::{config, today, Config, HabitCore, LocalScheduler, WidgetTheme};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the SQLite database file
    /// If not provided, uses a default location in the user's home directory
    #[arg(long)]
    database: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable verbose output (implies debug)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write every habit, log and todo to a backup file (stdout if omitted)
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Overwrite all data with the contents of a backup file
    Import {
        file: PathBuf,
        /// Confirm that existing data will be replaced
        #[arg(long)]
        yes: bool,
    },
    /// Print streaks and completion rate for every active habit
    Stats,
    /// Print today's widget projection
    Widget,
    /// Show or change the widget theme
    Theme { theme: Option<ThemeArg> },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ThemeArg {
    Light,
    Dark,
}

impl From<ThemeArg> for WidgetTheme {
    fn from(arg: ThemeArg) -> Self {
        match arg {
            ThemeArg::Light => WidgetTheme::Light,
            ThemeArg::Dark => WidgetTheme::Dark,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let log_level = if args.verbose {
        "debug"
    } else if args.debug {
        "info"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!("habit_core={}", log_level))
        .with_writer(std::io::stderr) // stdout carries command output
        .init();

    let db_path = match args.database {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            path
        }
        None => config::default_database_path()?,
    };
    info!("Using database at: {}", db_path.display());

    let scheduler = Arc::new(LocalScheduler::new());
    let core = HabitCore::open(Config::new(db_path), scheduler).await?;

    match args.command {
        Command::Export { output } => {
            let json = core.export_backup().await?.to_json()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("Backup written to {}", path.display());
                }
                None => println!("{}", json),
            }
        }
        Command::Import { file, yes } => {
            if !yes {
                eprintln!("Import replaces all existing data; rerun with --yes to confirm");
                std::process::exit(2);
            }
            let text = std::fs::read_to_string(&file)?;
            let backup = core.import_backup(&text).await?;
            println!(
                "Imported {} habits, {} logs, {} todos",
                backup.data.habits.len(),
                backup.data.logs.len(),
                backup.data.todos.len()
            );
        }
        Command::Stats => {
            let today = today();
            for habit in core.habits().habits() {
                let stats = core.habits().stats(&habit.id, today)?;
                println!(
                    "{:<30} days: {:>4}  streak: {:>3} (best {:>3})  30d: {:>3}%",
                    habit.name, stats.total_days, stats.current_streak, stats.best_streak, stats.completion_rate
                );
            }
        }
        Command::Widget => {
            let today = today();
            let preview = serde_json::json!({
                "theme": core.widget_theme().await?,
                "habits": core.habits().widget_items(today),
                "todos": core.todos().widget_items(today),
            });
            println!("{}", serde_json::to_string_pretty(&preview)?);
        }
        Command::Theme { theme } => {
            if let Some(theme) = theme {
                core.set_widget_theme(theme.into()).await?;
            }
            println!("{}", core.widget_theme().await?);
        }
    }

    Ok(())
}
