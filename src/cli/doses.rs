use anyhow::Result;

use dosewatch::config::DosewatchConfig;

pub async fn confirm(
    config: DosewatchConfig,
    schedule_id: &str,
    time: &str,
    notes: Option<&str>,
) -> Result<()> {
    let engine = super::open_engine(config).await?;
    let confirmation = engine.doses().confirm_dose(schedule_id, time, notes).await?;

    println!("Dose at {time} confirmed ({} unit(s)).", confirmation.units);
    match confirmation.remaining {
        Some(remaining) => println!("Remaining stock: {remaining}"),
        None => println!("Medicine no longer exists; stock unchanged."),
    }
    Ok(())
}

pub async fn skip(
    config: DosewatchConfig,
    schedule_id: &str,
    time: &str,
    notes: Option<&str>,
) -> Result<()> {
    let engine = super::open_engine(config).await?;
    engine.doses().skip_dose(schedule_id, time, notes).await?;

    println!("Dose at {time} skipped.");
    Ok(())
}
