//! Deferred missed-dose check.
//!
//! After the grace window, re-read the user's schedules for the medicine and
//! escalate through [`FamilyAlert`] when no `taken` record answers the dose.
//! Matching is by medicine *name*, so two same-named medicines of one user
//! share the answer.

use anyhow::Result;
use chrono::NaiveDateTime;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::collaborators::FamilyAlert;
use crate::store::{AdherenceStore, Filter};

#[derive(Clone)]
pub struct MissedDoseDetector {
    store: Arc<dyn AdherenceStore>,
    family_alert: Arc<dyn FamilyAlert>,
    grace: Duration,
}

impl MissedDoseDetector {
    pub fn new(
        store: Arc<dyn AdherenceStore>,
        family_alert: Arc<dyn FamilyAlert>,
        grace: Duration,
    ) -> Self {
        Self {
            store,
            family_alert,
            grace,
        }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Run [`check`](Self::check) once the grace window has passed.
    ///
    /// The returned handle may be dropped; the check still runs to completion.
    pub fn arm(
        &self,
        user_id: &str,
        medicine_name: &str,
        time: &str,
        scheduled_at: NaiveDateTime,
    ) -> JoinHandle<()> {
        let detector = self.clone();
        let user_id = user_id.to_string();
        let medicine_name = medicine_name.to_string();
        let time = time.to_string();

        tracing::debug!(
            user_id = %user_id,
            medicine = %medicine_name,
            time = %time,
            grace_secs = self.grace.as_secs(),
            "missed-dose check armed"
        );

        tokio::spawn(async move {
            tokio::time::sleep(detector.grace).await;
            if let Err(e) = detector
                .check(&user_id, &medicine_name, &time, scheduled_at)
                .await
            {
                tracing::warn!(
                    user_id = %user_id,
                    medicine = %medicine_name,
                    time = %time,
                    error = %e,
                    "missed-dose check failed"
                );
            }
        })
    }

    /// Check whether the dose at `time` on `scheduled_at`'s day was taken and
    /// alert the family if not. Returns `true` when an alert was sent.
    pub async fn check(
        &self,
        user_id: &str,
        medicine_name: &str,
        time: &str,
        scheduled_at: NaiveDateTime,
    ) -> Result<bool> {
        let schedules = self.store.find_schedules(&Filter::user(user_id)).await?;

        let medicine_ids: BTreeSet<&str> =
            schedules.iter().map(|s| s.medicine_id.as_str()).collect();
        let named: BTreeSet<String> = self
            .store
            .find_medicines(&Filter::user(user_id).with_ids(medicine_ids))
            .await?
            .into_iter()
            .filter(|m| m.name == medicine_name)
            .map(|m| m.id)
            .collect();

        let day = scheduled_at.date();
        let taken = schedules
            .iter()
            .filter(|s| named.contains(&s.medicine_id))
            .any(|s| s.was_taken(day, time));

        if taken {
            tracing::debug!(user_id = %user_id, medicine = %medicine_name, time = %time, "dose taken");
            return Ok(false);
        }

        tracing::info!(user_id = %user_id, medicine = %medicine_name, time = %time, "dose missed");
        self.family_alert
            .send_missed_dose_alert(user_id, medicine_name, time)
            .await?;
        Ok(true)
    }
}
