mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use dosewatch::config::DosewatchConfig;

#[derive(Parser)]
#[command(name = "dosewatch", version, about = "Medication reminders and adherence alerts")]
struct Cli {
    /// Config file (default: ~/.dosewatch/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch a user's schedules and stock until Ctrl-C
    Monitor {
        #[arg(long)]
        user: String,
    },
    /// Run one expiry and stock notification pass
    Check {
        #[arg(long)]
        user: String,
    },
    /// Print the stock summary for a user
    Summary {
        #[arg(long)]
        user: String,
    },
    /// Confirm a dose as taken
    Confirm {
        #[arg(long)]
        schedule: String,
        /// Dose time, HH:MM
        #[arg(long)]
        time: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Record a dose as skipped
    Skip {
        #[arg(long)]
        schedule: String,
        /// Dose time, HH:MM
        #[arg(long)]
        time: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List (or clear) a user's notifications
    Notifications {
        #[arg(long)]
        user: String,
        #[arg(long)]
        clear: bool,
    },
    /// Mark one notification as read
    MarkRead {
        #[arg(long)]
        id: String,
    },
    /// Forget throttle state for a medicine
    ResetTracker {
        #[arg(long)]
        medicine: String,
    },
    /// Add a medicine to a user's inventory
    AddMedicine(cli::entry::MedicineArgs),
    /// Add a dosing schedule
    AddSchedule(cli::entry::ScheduleArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => DosewatchConfig::load_from(path)?,
        None => DosewatchConfig::load()?,
    };

    // Log to stderr so command output on stdout stays clean.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Monitor { user } => cli::monitor::monitor(config, &user).await?,
        Command::Check { user } => cli::inventory::check(config, &user).await?,
        Command::Summary { user } => cli::inventory::summary(config, &user).await?,
        Command::Confirm {
            schedule,
            time,
            notes,
        } => cli::doses::confirm(config, &schedule, &time, notes.as_deref()).await?,
        Command::Skip {
            schedule,
            time,
            notes,
        } => cli::doses::skip(config, &schedule, &time, notes.as_deref()).await?,
        Command::Notifications { user, clear } => {
            cli::inbox::notifications(config, &user, clear).await?
        }
        Command::MarkRead { id } => cli::inbox::mark_read(config, &id).await?,
        Command::ResetTracker { medicine } => {
            cli::inventory::reset_tracker(config, &medicine).await?
        }
        Command::AddMedicine(args) => cli::entry::add_medicine(config, args).await?,
        Command::AddSchedule(args) => cli::entry::add_schedule(config, args).await?,
    }

    Ok(())
}
