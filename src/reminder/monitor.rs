//! Stock and expiry monitoring.
//!
//! [`StockMonitor`] sweeps a user's medicines, classifies each by expiry and
//! stock level, and sends throttled notifications through the
//! [`NotificationTracker`] and [`NotificationDispatcher`].

use anyhow::Result;
use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::sync::Arc;

use super::clock::Clock;
use super::dispatcher::NotificationDispatcher;
use super::tracker::NotificationTracker;
use super::types::{Medicine, NotificationKind, ThrottleCategory};
use crate::config::StockConfig;
use crate::store::{AdherenceStore, Filter, MedicinePatch, StoreError};

/// Expiry classification of a medicine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryStatus {
    Ok,
    /// Expires within the warning window.
    ExpiringSoon { days: i64 },
    Expired,
}

/// Stock classification of a medicine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Ok,
    Low,
    Out,
}

/// Read-side stock report for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StockSummary {
    pub total: usize,
    pub out_of_stock: usize,
    pub low_stock: usize,
    pub expiring_soon: usize,
    pub expired: usize,
}

/// Whole days from `now` until the start of `medicine`'s expiry date, rounded
/// toward negative infinity.
pub fn days_until_expiry(medicine: &Medicine, now: NaiveDateTime) -> i64 {
    let expires_at = medicine.expiry_date.and_time(NaiveTime::default());
    (expires_at - now).num_seconds().div_euclid(86_400)
}

#[derive(Clone)]
pub struct StockMonitor {
    store: Arc<dyn AdherenceStore>,
    dispatcher: NotificationDispatcher,
    tracker: Arc<NotificationTracker>,
    clock: Arc<dyn Clock>,
    low_stock_threshold: u32,
    expiry_warning_days: i64,
}

impl StockMonitor {
    pub fn new(
        store: Arc<dyn AdherenceStore>,
        dispatcher: NotificationDispatcher,
        tracker: Arc<NotificationTracker>,
        clock: Arc<dyn Clock>,
        config: &StockConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            tracker,
            clock,
            low_stock_threshold: config.low_stock_threshold,
            expiry_warning_days: config.expiry_warning_days,
        }
    }

    pub fn tracker(&self) -> &Arc<NotificationTracker> {
        &self.tracker
    }

    pub fn expiry_status(&self, medicine: &Medicine, now: NaiveDateTime) -> ExpiryStatus {
        let days = days_until_expiry(medicine, now);
        if days <= 0 {
            ExpiryStatus::Expired
        } else if days <= self.expiry_warning_days {
            ExpiryStatus::ExpiringSoon { days }
        } else {
            ExpiryStatus::Ok
        }
    }

    pub fn stock_status(&self, medicine: &Medicine) -> StockStatus {
        if medicine.quantity == 0 {
            StockStatus::Out
        } else if medicine.quantity <= self.low_stock_threshold {
            StockStatus::Low
        } else {
            StockStatus::Ok
        }
    }

    /// Expiry sweep followed by stock sweep. Each half logs its own failure
    /// so one cannot starve the other.
    pub async fn check_all_notifications(&self, user_id: &str) {
        if let Err(e) = self.check_expiry_warnings(user_id).await {
            tracing::warn!(user_id = %user_id, error = %e, "expiry check failed");
        }
        if let Err(e) = self.check_low_stock(user_id).await {
            tracing::warn!(user_id = %user_id, error = %e, "stock check failed");
        }
    }

    /// Send throttled expiry warnings. Returns the number sent.
    pub async fn check_expiry_warnings(&self, user_id: &str) -> Result<usize> {
        let now = self.clock.now();
        let medicines = self.store.find_medicines(&Filter::user(user_id)).await?;
        let mut sent = 0;

        for medicine in &medicines {
            let (title, message) = match self.expiry_status(medicine, now) {
                ExpiryStatus::Ok => continue,
                ExpiryStatus::ExpiringSoon { days } => (
                    "Medicine expiring soon",
                    format!("{} expires in {days} day(s)", medicine.name),
                ),
                ExpiryStatus::Expired => (
                    "Medicine expired",
                    format!("{} has expired; dispose of it safely", medicine.name),
                ),
            };

            if self
                .notify(medicine, ThrottleCategory::Expiry, NotificationKind::ExpiryWarning, title, &message)
                .await
            {
                sent += 1;
            }
        }

        tracing::debug!(user_id = %user_id, checked = medicines.len(), sent, "expiry sweep done");
        Ok(sent)
    }

    /// Send throttled low/out-of-stock alerts. Returns the number sent.
    pub async fn check_low_stock(&self, user_id: &str) -> Result<usize> {
        let medicines = self.store.find_medicines(&Filter::user(user_id)).await?;
        let mut sent = 0;

        for medicine in &medicines {
            let (category, title, message) = match self.stock_status(medicine) {
                StockStatus::Ok => continue,
                StockStatus::Out => (
                    ThrottleCategory::OutOfStock,
                    "Out of stock",
                    format!("{} is out of stock", medicine.name),
                ),
                StockStatus::Low => (
                    ThrottleCategory::LowStock,
                    "Running low",
                    format!(
                        "Only {} {} of {} left",
                        medicine.quantity, medicine.unit, medicine.name
                    ),
                ),
            };

            if self
                .notify(medicine, category, NotificationKind::RefillAlert, title, &message)
                .await
            {
                sent += 1;
            }
        }

        tracing::debug!(user_id = %user_id, checked = medicines.len(), sent, "stock sweep done");
        Ok(sent)
    }

    /// Gate one notification through the tracker. Returns whether it went out.
    async fn notify(
        &self,
        medicine: &Medicine,
        category: ThrottleCategory,
        kind: NotificationKind,
        title: &str,
        message: &str,
    ) -> bool {
        if !self.tracker.can_send(&medicine.id, category).await {
            return false;
        }

        let action_url = format!("/medicines/{}", medicine.id);
        match self
            .dispatcher
            .send_notification(&medicine.user_id, kind, title, message, Some(&action_url))
            .await
        {
            Ok(_) => {
                self.tracker.mark_sent(&medicine.id, category).await;
                true
            }
            Err(e) => {
                tracing::warn!(medicine_id = %medicine.id, category = %category, error = %e, "notification not recorded");
                false
            }
        }
    }

    /// Lower a medicine's quantity by `amount`, flooring at zero. When the new
    /// quantity is at or below the low-stock threshold the owner's stock check
    /// runs immediately. Returns the new quantity.
    pub async fn decrement_stock(&self, medicine_id: &str, amount: u32) -> Result<u32> {
        let medicine = self
            .store
            .get_medicine(medicine_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "medicine",
                id: medicine_id.to_string(),
            })?;

        let new_quantity = medicine.quantity.saturating_sub(amount);
        self.store
            .update_medicine(
                medicine_id,
                &MedicinePatch {
                    quantity: Some(new_quantity),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(
            medicine_id = %medicine_id,
            from = medicine.quantity,
            to = new_quantity,
            "stock decremented"
        );

        if new_quantity <= self.low_stock_threshold {
            if let Err(e) = self.check_low_stock(&medicine.user_id).await {
                tracing::warn!(user_id = %medicine.user_id, error = %e, "stock check after decrement failed");
            }
        }

        Ok(new_quantity)
    }

    /// Count medicines by stock and expiry status. No side effects.
    pub async fn get_stock_summary(&self, user_id: &str) -> Result<StockSummary> {
        let now = self.clock.now();
        let medicines = self.store.find_medicines(&Filter::user(user_id)).await?;

        let mut summary = StockSummary {
            total: medicines.len(),
            ..Default::default()
        };
        for medicine in &medicines {
            match self.stock_status(medicine) {
                StockStatus::Out => summary.out_of_stock += 1,
                StockStatus::Low => summary.low_stock += 1,
                StockStatus::Ok => {}
            }
            match self.expiry_status(medicine, now) {
                ExpiryStatus::Expired => summary.expired += 1,
                ExpiryStatus::ExpiringSoon { .. } => summary.expiring_soon += 1,
                ExpiryStatus::Ok => {}
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn medicine(expiry: NaiveDate, quantity: u32) -> Medicine {
        Medicine {
            id: "m1".into(),
            user_id: "u1".into(),
            name: "Aspirin".into(),
            quantity,
            unit: "tablet".into(),
            expiry_date: expiry,
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 6, 10)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn days_until_expiry_floors() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        // Tomorrow midnight is 14 hours away: zero whole days.
        assert_eq!(days_until_expiry(&medicine(d(2026, 6, 11), 1), now()), 0);
        assert_eq!(days_until_expiry(&medicine(d(2026, 6, 12), 1), now()), 1);
        // Today's midnight already passed: -1.
        assert_eq!(days_until_expiry(&medicine(d(2026, 6, 10), 1), now()), -1);
        assert_eq!(days_until_expiry(&medicine(d(2026, 6, 18), 1), now()), 7);
    }
}
