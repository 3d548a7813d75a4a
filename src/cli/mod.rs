pub mod doses;
pub mod entry;
pub mod inbox;
pub mod inventory;
pub mod monitor;

use anyhow::Result;
use std::sync::Arc;

use dosewatch::config::DosewatchConfig;
use dosewatch::reminder::collaborators::{
    create_family_alert, LogNotifier, PlatformNotifier, TerminalAlarm,
};
use dosewatch::reminder::Engine;

/// Open the configured database and build an engine with the terminal
/// collaborators.
pub async fn open_engine(config: DosewatchConfig) -> Result<Engine> {
    let family_alert = create_family_alert(&config.family_alert)?;
    let notifier: Arc<dyn PlatformNotifier> = Arc::new(LogNotifier);
    Engine::open(
        config,
        Some(notifier),
        family_alert,
        Arc::new(TerminalAlarm),
    )
    .await
}
