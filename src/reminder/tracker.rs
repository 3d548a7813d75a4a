//! Notification rate limiting.
//!
//! [`NotificationTracker`] keeps one [`TrackerRecord`] per `(subject, category)`
//! bucket and answers "may this notification go out now?". The map is loaded
//! from [`TrackerStorage`] on open and written back after every mutation.

use chrono::{Duration, NaiveDateTime, Timelike};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::clock::Clock;
use super::types::{ThrottleCategory, TrackerRecord};
use crate::config::ThrottleConfig;
use crate::store::{StoreResult, TrackerStorage};

/// Throttle limits per category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottlePolicy {
    /// Maximum expiry notifications per subject per calendar day.
    pub expiry_daily_cap: u32,
    /// Hours of the day at which expiry notifications may go out.
    pub expiry_allowed_hours: Vec<u32>,
    pub expiry_min_interval: Duration,
    /// Minimum gap between stock notifications of the same category.
    pub stock_min_interval: Duration,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self::from(&ThrottleConfig::default())
    }
}

impl From<&ThrottleConfig> for ThrottlePolicy {
    fn from(config: &ThrottleConfig) -> Self {
        Self {
            expiry_daily_cap: config.expiry_daily_cap,
            expiry_allowed_hours: config.expiry_allowed_hours.clone(),
            expiry_min_interval: Duration::hours(config.expiry_min_interval_hours),
            stock_min_interval: Duration::hours(config.stock_min_interval_hours),
        }
    }
}

impl ThrottlePolicy {
    /// Category rules against an existing same-day record.
    fn permits(&self, record: &TrackerRecord, category: ThrottleCategory, now: NaiveDateTime) -> bool {
        let elapsed = now - record.last_notified;
        match category {
            ThrottleCategory::Expiry => {
                record.notification_count < self.expiry_daily_cap
                    && self.expiry_allowed_hours.contains(&now.hour())
                    && elapsed >= self.expiry_min_interval
            }
            ThrottleCategory::LowStock | ThrottleCategory::OutOfStock => {
                elapsed >= self.stock_min_interval
            }
        }
    }
}

/// Persistent per-bucket rate limiter.
pub struct NotificationTracker {
    clock: Arc<dyn Clock>,
    storage: Arc<dyn TrackerStorage>,
    policy: ThrottlePolicy,
    records: Mutex<HashMap<String, TrackerRecord>>,
}

impl NotificationTracker {
    /// Load persisted state and build the tracker.
    pub async fn open(
        storage: Arc<dyn TrackerStorage>,
        clock: Arc<dyn Clock>,
        policy: ThrottlePolicy,
    ) -> StoreResult<Self> {
        let records = storage.load().await?;
        tracing::debug!(buckets = records.len(), "notification tracker loaded");
        Ok(Self {
            clock,
            storage,
            policy,
            records: Mutex::new(records),
        })
    }

    pub fn policy(&self) -> &ThrottlePolicy {
        &self.policy
    }

    /// Whether a notification for this bucket may be sent now.
    ///
    /// A bucket never seen before always passes. On a new calendar day the
    /// daily count is reset (and persisted) before the category rules run.
    pub async fn can_send(&self, subject_id: &str, category: ThrottleCategory) -> bool {
        let now = self.clock.now();
        let key = TrackerRecord::key(subject_id, category);
        let mut records = self.records.lock().await;

        let Some(record) = records.get_mut(&key) else {
            return true;
        };

        if record.last_notified.date() != now.date() && record.notification_count != 0 {
            record.notification_count = 0;
            let snapshot = record.clone();
            self.persist(&records).await;
            return self.policy.permits(&snapshot, category, now);
        }

        self.policy.permits(record, category, now)
    }

    /// Record that a notification for this bucket went out now.
    pub async fn mark_sent(&self, subject_id: &str, category: ThrottleCategory) {
        let now = self.clock.now();
        let key = TrackerRecord::key(subject_id, category);
        let mut records = self.records.lock().await;

        match records.get_mut(&key) {
            Some(record) if record.last_notified.date() == now.date() => {
                record.notification_count += 1;
                record.last_notified = now;
            }
            _ => {
                records.insert(
                    key,
                    TrackerRecord {
                        subject_id: subject_id.to_string(),
                        category,
                        last_notified: now,
                        notification_count: 1,
                    },
                );
            }
        }

        self.persist(&records).await;
    }

    /// Current state of a bucket.
    pub async fn get(&self, subject_id: &str, category: ThrottleCategory) -> Option<TrackerRecord> {
        let key = TrackerRecord::key(subject_id, category);
        self.records.lock().await.get(&key).cloned()
    }

    /// Drop every bucket for a subject (e.g. after a refill or deletion).
    /// Returns the number of buckets removed.
    pub async fn reset(&self, subject_id: &str) -> usize {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, r| r.subject_id != subject_id);
        let removed = before - records.len();
        if removed > 0 {
            self.persist(&records).await;
        }
        removed
    }

    /// Drop all throttle state.
    pub async fn clear(&self) {
        let mut records = self.records.lock().await;
        records.clear();
        self.persist(&records).await;
    }

    async fn persist(&self, records: &HashMap<String, TrackerRecord>) {
        if let Err(e) = self.storage.save(records).await {
            tracing::warn!(error = %e, "failed to persist notification tracker");
        }
    }
}
