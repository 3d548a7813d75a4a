use anyhow::Result;

use dosewatch::config::DosewatchConfig;

/// One expiry + stock notification pass.
pub async fn check(config: DosewatchConfig, user_id: &str) -> Result<()> {
    let engine = super::open_engine(config).await?;
    let monitor = engine.monitor();

    let expiry = monitor.check_expiry_warnings(user_id).await?;
    let stock = monitor.check_low_stock(user_id).await?;

    println!("Expiry warnings sent: {expiry}");
    println!("Stock alerts sent:    {stock}");
    Ok(())
}

/// Print the stock summary for a user.
pub async fn summary(config: DosewatchConfig, user_id: &str) -> Result<()> {
    let engine = super::open_engine(config).await?;
    let summary = engine.monitor().get_stock_summary(user_id).await?;

    println!("Stock Summary for {user_id}");
    println!("{}", "=".repeat(40));
    println!("  Total medicines:     {}", summary.total);
    println!("  Out of stock:        {}", summary.out_of_stock);
    println!("  Low stock:           {}", summary.low_stock);
    println!("  Expiring soon:       {}", summary.expiring_soon);
    println!("  Expired:             {}", summary.expired);
    Ok(())
}

/// Forget every throttle bucket for a medicine.
pub async fn reset_tracker(config: DosewatchConfig, medicine_id: &str) -> Result<()> {
    let engine = super::open_engine(config).await?;
    let removed = engine.tracker().reset(medicine_id).await;

    if removed == 0 {
        println!("No throttle state for {medicine_id}.");
    } else {
        println!("Cleared {removed} throttle bucket(s) for {medicine_id}.");
    }
    Ok(())
}
