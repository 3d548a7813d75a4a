//! Dose confirmation and skipping.
//!
//! Both operations append a [`TakenRecord`] to the schedule's log. Confirming
//! also draws the intake amount down from the medicine's stock.

use anyhow::{bail, Result};
use serde::Serialize;
use std::sync::Arc;

use super::clock::Clock;
use super::monitor::StockMonitor;
use super::types::{Schedule, TakenRecord};
use crate::store::{AdherenceStore, StoreError};

/// Outcome of [`DoseLog::confirm_dose`].
#[derive(Debug, Clone, Serialize)]
pub struct DoseConfirmation {
    pub record: TakenRecord,
    /// Units drawn from stock.
    pub units: u32,
    /// Stock after the draw; `None` when the medicine no longer exists.
    pub remaining: Option<u32>,
}

#[derive(Clone)]
pub struct DoseLog {
    store: Arc<dyn AdherenceStore>,
    monitor: StockMonitor,
    clock: Arc<dyn Clock>,
}

impl DoseLog {
    pub fn new(store: Arc<dyn AdherenceStore>, monitor: StockMonitor, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            monitor,
            clock,
        }
    }

    /// Record the dose at `time` as taken and decrement stock.
    pub async fn confirm_dose(
        &self,
        schedule_id: &str,
        time: &str,
        notes: Option<&str>,
    ) -> Result<DoseConfirmation> {
        let schedule = self.load(schedule_id, time).await?;
        let record = TakenRecord {
            date: self.clock.now(),
            time: time.to_string(),
            taken: true,
            skipped: None,
            notes: notes.map(str::to_string),
        };
        self.store.append_taken(schedule_id, &record).await?;

        let units = schedule.units_per_intake();
        let remaining = match self.monitor.decrement_stock(&schedule.medicine_id, units).await {
            Ok(quantity) => Some(quantity),
            Err(e) if is_missing(&e) => {
                tracing::warn!(schedule_id = %schedule_id, medicine_id = %schedule.medicine_id, "dose confirmed for a missing medicine");
                None
            }
            Err(e) => return Err(e),
        };

        tracing::info!(schedule_id = %schedule_id, time = %time, units, "dose confirmed");
        Ok(DoseConfirmation {
            record,
            units,
            remaining,
        })
    }

    /// Record the dose at `time` as deliberately skipped. Stock is untouched.
    pub async fn skip_dose(
        &self,
        schedule_id: &str,
        time: &str,
        notes: Option<&str>,
    ) -> Result<TakenRecord> {
        self.load(schedule_id, time).await?;
        let record = TakenRecord {
            date: self.clock.now(),
            time: time.to_string(),
            taken: false,
            skipped: Some(true),
            notes: notes.map(str::to_string),
        };
        self.store.append_taken(schedule_id, &record).await?;

        tracing::info!(schedule_id = %schedule_id, time = %time, "dose skipped");
        Ok(record)
    }

    async fn load(&self, schedule_id: &str, time: &str) -> Result<Schedule> {
        let schedule = self
            .store
            .get_schedule(schedule_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "schedule",
                id: schedule_id.to_string(),
            })?;

        if !schedule.times.iter().any(|t| t == time) {
            bail!(
                "schedule {schedule_id} has no dose at {time} (configured: {})",
                schedule.times.join(", ")
            );
        }
        Ok(schedule)
    }
}

fn is_missing(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::NotFound { .. })
    )
}
