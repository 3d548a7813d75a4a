//! Notification persistence and live delivery.
//!
//! Every notification is written to the store first. Platform delivery is
//! attempted afterwards and only when a notifier exists and permission is
//! (or becomes) granted; its failures never reach the caller.

use chrono::{NaiveDate, NaiveTime};
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::clock::Clock;
use super::collaborators::{Permission, PlatformAlert, PlatformNotifier};
use super::missed_dose::MissedDoseDetector;
use super::types::{AppNotification, NotificationKind};
use crate::store::{AdherenceStore, Filter, NotificationPatch, StoreResult};

#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<dyn AdherenceStore>,
    notifier: Option<Arc<dyn PlatformNotifier>>,
    clock: Arc<dyn Clock>,
    missed_dose: MissedDoseDetector,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn AdherenceStore>,
        notifier: Option<Arc<dyn PlatformNotifier>>,
        clock: Arc<dyn Clock>,
        missed_dose: MissedDoseDetector,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            missed_dose,
        }
    }

    pub fn missed_dose(&self) -> &MissedDoseDetector {
        &self.missed_dose
    }

    /// Persist a notification, then try to show it on the platform.
    ///
    /// Delivery runs even when the write fails; the write error is returned.
    pub async fn send_notification(
        &self,
        user_id: &str,
        kind: NotificationKind,
        title: &str,
        message: &str,
        action_url: Option<&str>,
    ) -> StoreResult<AppNotification> {
        let notification = AppNotification {
            id: uuid::Uuid::now_v7().to_string(),
            user_id: user_id.to_string(),
            kind,
            title: title.to_string(),
            message: message.to_string(),
            read: false,
            action_url: action_url.map(str::to_string),
            created_at: self.clock.now(),
        };

        let stored = self.store.add_notification(&notification).await;
        if let Err(ref e) = stored {
            tracing::warn!(user_id = %user_id, kind = %kind, error = %e, "failed to persist notification");
        }

        self.deliver(&notification).await;

        stored.map(|_| notification)
    }

    async fn deliver(&self, notification: &AppNotification) {
        let Some(ref notifier) = self.notifier else {
            return;
        };

        let permission = match notifier.permission() {
            Permission::Default => notifier.request_permission().await,
            other => other,
        };
        if permission != Permission::Granted {
            tracing::debug!(id = %notification.id, "platform notifications not permitted");
            return;
        }

        let alert = PlatformAlert {
            title: notification.title.clone(),
            body: notification.message.clone(),
            tag: notification.id.clone(),
            require_interaction: notification.kind == NotificationKind::Reminder,
        };
        if let Err(e) = notifier.show(&alert).await {
            tracing::debug!(id = %notification.id, error = %e, "platform delivery failed");
        }
    }

    /// Fire a one-shot reminder at `time` on `date`, then arm a missed-dose
    /// check. Returns `None` when that moment is not in the future or `time`
    /// is not `HH:MM`.
    pub fn schedule_reminder(
        &self,
        user_id: &str,
        medicine_name: &str,
        time: &str,
        date: NaiveDate,
    ) -> Option<JoinHandle<()>> {
        let Ok(time_of_day) = NaiveTime::parse_from_str(time, "%H:%M") else {
            tracing::warn!(time = %time, "ignoring reminder with malformed time");
            return None;
        };
        let target = date.and_time(time_of_day);
        let delay = (target - self.clock.now()).to_std().ok()?;
        if delay.is_zero() {
            return None;
        }

        let dispatcher = self.clone();
        let user_id = user_id.to_string();
        let medicine_name = medicine_name.to_string();
        let time = time.to_string();

        Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let message = format!("Time to take {medicine_name} ({time})");
            if let Err(e) = dispatcher
                .send_notification(&user_id, NotificationKind::Reminder, "Medication reminder", &message, None)
                .await
            {
                tracing::debug!(user_id = %user_id, error = %e, "reminder not persisted");
            }
            dispatcher
                .missed_dose
                .arm(&user_id, &medicine_name, &time, target);
        }))
    }

    /// Inbox for a user, newest first.
    pub async fn list_notifications(&self, user_id: &str) -> StoreResult<Vec<AppNotification>> {
        self.store.find_notifications(&Filter::user(user_id)).await
    }

    pub async fn mark_read(&self, notification_id: &str) -> StoreResult<()> {
        self.store
            .update_notification(notification_id, &NotificationPatch { read: Some(true) })
            .await
    }

    /// Delete every notification for a user. Returns how many were removed.
    pub async fn clear_notifications(&self, user_id: &str) -> StoreResult<usize> {
        let removed = self.store.delete_notifications(&Filter::user(user_id)).await?;
        tracing::info!(user_id = %user_id, removed, "notifications cleared");
        Ok(removed)
    }
}
