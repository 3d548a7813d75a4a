#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use dosewatch::config::DosewatchConfig;
use dosewatch::db;
use dosewatch::reminder::clock::ManualClock;
use dosewatch::reminder::collaborators::{
    AlarmSound, FamilyAlert, Permission, PlatformAlert, PlatformNotifier,
};
use dosewatch::reminder::types::{Frequency, Medicine, Schedule};
use dosewatch::reminder::{Engine, EngineParts};
use dosewatch::store::sqlite::SqliteStore;
use dosewatch::store::{AdherenceStore, MemoryTrackerStorage};

/// Fresh in-memory store with schema and migrations applied.
pub fn test_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::new(db::open_memory_database().unwrap()))
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn medicine(id: &str, user_id: &str, name: &str, quantity: u32, expiry: NaiveDate) -> Medicine {
    Medicine {
        id: id.into(),
        user_id: user_id.into(),
        name: name.into(),
        quantity,
        unit: "tablet".into(),
        expiry_date: expiry,
    }
}

/// Daily, reminder-enabled schedule starting `start` with no end date.
pub fn schedule(id: &str, medicine_id: &str, user_id: &str, times: &[&str], start: NaiveDate) -> Schedule {
    Schedule {
        id: id.into(),
        medicine_id: medicine_id.into(),
        user_id: user_id.into(),
        frequency: Frequency::Daily,
        times: times.iter().map(|t| t.to_string()).collect(),
        dosage_per_intake: "1 tablet".into(),
        start_date: start,
        end_date: None,
        reminder_enabled: true,
        taken: Vec::new(),
    }
}

// ── Recording collaborators ─────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingFamilyAlert {
    calls: Mutex<Vec<(String, String, String)>>,
}

impl RecordingFamilyAlert {
    /// `(user_id, medicine_name, time)` per alert sent.
    pub fn calls(&self) -> Vec<(String, String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FamilyAlert for RecordingFamilyAlert {
    async fn send_missed_dose_alert(&self, user_id: &str, medicine_name: &str, time: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((user_id.into(), medicine_name.into(), time.into()));
        Ok(())
    }
}

pub struct RecordingNotifier {
    permission: Mutex<Permission>,
    /// What a permission request resolves to.
    on_request: Permission,
    requests: AtomicUsize,
    shown: Mutex<Vec<PlatformAlert>>,
}

impl RecordingNotifier {
    pub fn new(permission: Permission, on_request: Permission) -> Self {
        Self {
            permission: Mutex::new(permission),
            on_request,
            requests: AtomicUsize::new(0),
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn granted() -> Self {
        Self::new(Permission::Granted, Permission::Granted)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn shown(&self) -> Vec<PlatformAlert> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformNotifier for RecordingNotifier {
    fn permission(&self) -> Permission {
        *self.permission.lock().unwrap()
    }

    async fn request_permission(&self) -> Permission {
        self.requests.fetch_add(1, Ordering::SeqCst);
        *self.permission.lock().unwrap() = self.on_request;
        self.on_request
    }

    async fn show(&self, alert: &PlatformAlert) -> Result<()> {
        self.shown.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct CountingAlarm(AtomicUsize);

impl CountingAlarm {
    pub fn plays(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl AlarmSound for CountingAlarm {
    fn play(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Engine harness ──────────────────────────────────────────────────────────

pub struct Harness {
    pub engine: Engine,
    pub store: Arc<SqliteStore>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub family: Arc<RecordingFamilyAlert>,
    pub alarm: Arc<CountingAlarm>,
    pub trackers: Arc<MemoryTrackerStorage>,
}

impl Harness {
    pub async fn new(now: NaiveDateTime) -> Self {
        Self::with_notifier(now, RecordingNotifier::granted()).await
    }

    pub async fn with_notifier(now: NaiveDateTime, notifier: RecordingNotifier) -> Self {
        let store = test_store();
        let clock = Arc::new(ManualClock::new(now));
        let notifier = Arc::new(notifier);
        let family = Arc::new(RecordingFamilyAlert::default());
        let alarm = Arc::new(CountingAlarm::default());
        let trackers = Arc::new(MemoryTrackerStorage::new());

        let engine = Engine::build(
            EngineParts {
                store: store.clone(),
                tracker_storage: trackers.clone(),
                clock: clock.clone(),
                notifier: Some(notifier.clone() as Arc<dyn PlatformNotifier>),
                family_alert: family.clone(),
                alarm: alarm.clone(),
            },
            DosewatchConfig::default(),
        )
        .await
        .unwrap();

        Self {
            engine,
            store,
            clock,
            notifier,
            family,
            alarm,
            trackers,
        }
    }

    pub async fn add_medicine(&self, medicine: Medicine) {
        self.store.add_medicine(&medicine).await.unwrap();
    }

    pub async fn add_schedule(&self, schedule: Schedule) {
        self.store.add_schedule(&schedule).await.unwrap();
    }

    pub async fn quantity(&self, medicine_id: &str) -> u32 {
        self.store
            .get_medicine(medicine_id)
            .await
            .unwrap()
            .unwrap()
            .quantity
    }

    pub async fn inbox(&self, user_id: &str) -> Vec<dosewatch::reminder::types::AppNotification> {
        self.engine
            .dispatcher()
            .list_notifications(user_id)
            .await
            .unwrap()
    }
}
