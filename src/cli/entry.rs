use anyhow::{ensure, Context, Result};
use chrono::{NaiveDate, NaiveTime};
use clap::Args;

use dosewatch::config::DosewatchConfig;
use dosewatch::reminder::types::{Frequency, Medicine, Schedule};

#[derive(Args)]
pub struct MedicineArgs {
    #[arg(long)]
    user: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    quantity: u32,
    #[arg(long, default_value = "tablet")]
    unit: String,
    /// Expiry date, YYYY-MM-DD
    #[arg(long)]
    expiry: NaiveDate,
}

#[derive(Args)]
pub struct ScheduleArgs {
    #[arg(long)]
    user: String,
    /// Medicine id
    #[arg(long)]
    medicine: String,
    /// Dose times, HH:MM, comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    times: Vec<String>,
    /// Amount per intake, e.g. "2 tablets"
    #[arg(long, default_value = "1")]
    dosage: String,
    /// First day, YYYY-MM-DD
    #[arg(long)]
    start: NaiveDate,
    /// Last day (inclusive), YYYY-MM-DD
    #[arg(long)]
    end: Option<NaiveDate>,
    #[arg(long, default_value = "daily")]
    frequency: Frequency,
    /// Create the schedule with reminders switched off
    #[arg(long)]
    no_reminder: bool,
}

pub async fn add_medicine(config: DosewatchConfig, args: MedicineArgs) -> Result<()> {
    let engine = super::open_engine(config).await?;
    let medicine = Medicine {
        id: uuid::Uuid::now_v7().to_string(),
        user_id: args.user,
        name: args.name,
        quantity: args.quantity,
        unit: args.unit,
        expiry_date: args.expiry,
    };
    engine
        .store()
        .add_medicine(&medicine)
        .await
        .context("failed to add medicine")?;

    println!("{}", medicine.id);
    Ok(())
}

pub async fn add_schedule(config: DosewatchConfig, args: ScheduleArgs) -> Result<()> {
    // Normalize to zero-padded HH:MM; alarms match on exact text.
    let times = args
        .times
        .iter()
        .map(|time| {
            NaiveTime::parse_from_str(time.trim(), "%H:%M")
                .map(|t| t.format("%H:%M").to_string())
                .with_context(|| format!("invalid dose time {time:?}, expected HH:MM"))
        })
        .collect::<Result<Vec<_>>>()?;
    if let Some(end) = args.end {
        ensure!(end >= args.start, "end date {end} is before start date {}", args.start);
    }

    let engine = super::open_engine(config).await?;
    let medicine = engine.store().get_medicine(&args.medicine).await?;
    ensure!(medicine.is_some(), "medicine not found: {}", args.medicine);

    let schedule = Schedule {
        id: uuid::Uuid::now_v7().to_string(),
        medicine_id: args.medicine,
        user_id: args.user,
        frequency: args.frequency,
        times,
        dosage_per_intake: args.dosage,
        start_date: args.start,
        end_date: args.end,
        reminder_enabled: !args.no_reminder,
        taken: Vec::new(),
    };
    engine
        .store()
        .add_schedule(&schedule)
        .await
        .context("failed to add schedule")?;

    println!("{}", schedule.id);
    Ok(())
}
