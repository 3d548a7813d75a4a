use anyhow::{Context, Result};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;

use dosewatch::config::DosewatchConfig;

/// Run the reminder scheduler and the periodic stock sweep until Ctrl-C.
pub async fn monitor(config: DosewatchConfig, user_id: &str) -> Result<()> {
    let check_every = Duration::from_secs(config.stock.check_interval_mins.max(1) * 60);
    let engine = super::open_engine(config).await?;

    let scheduler = engine.new_scheduler();
    let mut events = scheduler.subscribe();
    scheduler.start_monitoring(user_id).await;

    let mut stock_ticker = tokio::time::interval(check_every);
    stock_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    println!("Monitoring {user_id} (Ctrl-C to stop)");
    loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal.context("failed to listen for Ctrl-C")?;
                break;
            }
            _ = stock_ticker.tick() => {
                engine.monitor().check_all_notifications(user_id).await;
            }
            event = events.recv() => match event {
                Ok(event) => println!(
                    "[{}] {} - {} (schedule {})",
                    event.time, event.medicine_name, event.dosage, event.schedule_id
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "reminder events dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    scheduler.stop_monitoring();
    println!("Stopped.");
    Ok(())
}
