//! Adherence store contract.
//!
//! The engine never talks to a database directly: it goes through
//! [`AdherenceStore`] (schedules, medicines, notifications) and
//! [`TrackerStorage`] (the throttle map). [`sqlite`] provides the bundled
//! implementations; [`MemoryTrackerStorage`] keeps throttle state in process.

pub mod sqlite;

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::reminder::types::{AppNotification, Medicine, Schedule, TakenRecord, TrackerRecord};

/// Errors surfaced by store adapters.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("corrupt {entity} record {id}: {reason}")]
    Corrupt {
        entity: &'static str,
        id: String,
        reason: String,
    },
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store task failed: {0}")]
    Task(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Conjunctive query predicate: every populated field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    /// Equality on `user_id`.
    pub user_id: Option<String>,
    /// Membership on `id`. An empty list matches nothing.
    pub ids: Option<Vec<String>>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ids: None,
        }
    }

    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user_id: None,
            ids: Some(ids.into_iter().map(Into::into).collect()),
        }
    }

    pub fn with_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }
}

/// Partial update for a medicine. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MedicinePatch {
    pub quantity: Option<u32>,
    pub expiry_date: Option<NaiveDate>,
}

/// Partial update for a notification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationPatch {
    pub read: Option<bool>,
}

/// CRUD over the adherence collections.
///
/// Every method may fail with a [`StoreError`]; engine callers log and move on
/// rather than propagate into their loops.
#[async_trait]
pub trait AdherenceStore: Send + Sync {
    async fn find_schedules(&self, filter: &Filter) -> StoreResult<Vec<Schedule>>;
    async fn get_schedule(&self, id: &str) -> StoreResult<Option<Schedule>>;
    async fn add_schedule(&self, schedule: &Schedule) -> StoreResult<()>;
    /// Append to a schedule's dose log. Fails with `NotFound` for unknown ids.
    async fn append_taken(&self, schedule_id: &str, record: &TakenRecord) -> StoreResult<()>;
    async fn delete_schedule(&self, id: &str) -> StoreResult<bool>;

    async fn find_medicines(&self, filter: &Filter) -> StoreResult<Vec<Medicine>>;
    async fn get_medicine(&self, id: &str) -> StoreResult<Option<Medicine>>;
    async fn add_medicine(&self, medicine: &Medicine) -> StoreResult<()>;
    async fn update_medicine(&self, id: &str, patch: &MedicinePatch) -> StoreResult<()>;
    async fn delete_medicine(&self, id: &str) -> StoreResult<bool>;

    async fn add_notification(&self, notification: &AppNotification) -> StoreResult<()>;
    /// Newest first.
    async fn find_notifications(&self, filter: &Filter) -> StoreResult<Vec<AppNotification>>;
    async fn update_notification(&self, id: &str, patch: &NotificationPatch) -> StoreResult<()>;
    /// Returns the number of rows removed.
    async fn delete_notifications(&self, filter: &Filter) -> StoreResult<usize>;
}

/// Durable key-value surface for the notification tracker's flat map.
#[async_trait]
pub trait TrackerStorage: Send + Sync {
    async fn load(&self) -> StoreResult<HashMap<String, TrackerRecord>>;
    /// Replace the stored map with `records`.
    async fn save(&self, records: &HashMap<String, TrackerRecord>) -> StoreResult<()>;
}

/// Process-local tracker storage; state dies with the process.
#[derive(Debug, Default)]
pub struct MemoryTrackerStorage {
    records: Mutex<HashMap<String, TrackerRecord>>,
}

impl MemoryTrackerStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of what was last saved.
    pub fn snapshot(&self) -> HashMap<String, TrackerRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TrackerStorage for MemoryTrackerStorage {
    async fn load(&self) -> StoreResult<HashMap<String, TrackerRecord>> {
        self.records
            .lock()
            .map(|r| r.clone())
            .map_err(|e| StoreError::Task(format!("tracker lock poisoned: {e}")))
    }

    async fn save(&self, records: &HashMap<String, TrackerRecord>) -> StoreResult<()> {
        let mut stored = self
            .records
            .lock()
            .map_err(|e| StoreError::Task(format!("tracker lock poisoned: {e}")))?;
        *stored = records.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_builders() {
        let f = Filter::user("u1").with_ids(["a", "b"]);
        assert_eq!(f.user_id.as_deref(), Some("u1"));
        assert_eq!(f.ids, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(Filter::all(), Filter::default());
    }

    #[tokio::test]
    async fn memory_tracker_storage_replaces_map() {
        let storage = MemoryTrackerStorage::new();
        assert!(storage.load().await.unwrap().is_empty());

        let mut map = HashMap::new();
        map.insert(
            "m1_expiry".to_string(),
            TrackerRecord {
                subject_id: "m1".into(),
                category: crate::reminder::types::ThrottleCategory::Expiry,
                last_notified: chrono::NaiveDate::from_ymd_opt(2026, 1, 1)
                    .unwrap()
                    .and_hms_opt(8, 0, 0)
                    .unwrap(),
                notification_count: 1,
            },
        );
        storage.save(&map).await.unwrap();
        assert_eq!(storage.load().await.unwrap(), map);

        storage.save(&HashMap::new()).await.unwrap();
        assert!(storage.snapshot().is_empty());
    }
}
