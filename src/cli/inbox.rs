use anyhow::Result;

use dosewatch::config::DosewatchConfig;

/// List a user's notifications, newest first, or clear them.
pub async fn notifications(config: DosewatchConfig, user_id: &str, clear: bool) -> Result<()> {
    let engine = super::open_engine(config).await?;
    let dispatcher = engine.dispatcher();

    if clear {
        let removed = dispatcher.clear_notifications(user_id).await?;
        println!("Deleted {removed} notification(s).");
        return Ok(());
    }

    let notifications = dispatcher.list_notifications(user_id).await?;
    if notifications.is_empty() {
        println!("No notifications.");
        return Ok(());
    }

    for n in &notifications {
        let marker = if n.read { " " } else { "*" };
        println!(
            "{marker} {}  [{:<14}] {}: {}",
            n.created_at.format("%Y-%m-%d %H:%M"),
            n.kind.as_str(),
            n.title,
            n.message
        );
        println!("    id: {}", n.id);
    }
    Ok(())
}

pub async fn mark_read(config: DosewatchConfig, notification_id: &str) -> Result<()> {
    let engine = super::open_engine(config).await?;
    engine.dispatcher().mark_read(notification_id).await?;
    println!("Marked {notification_id} as read.");
    Ok(())
}
