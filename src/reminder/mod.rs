//! Reminder and adherence engine.
//!
//! [`Engine`] is the explicit context that owns every long-lived service:
//! the store, the clock, the throttle tracker, the dispatcher, the stock
//! monitor and the dose log. Schedulers are created per monitored user with
//! [`Engine::new_scheduler`].

pub mod adherence;
pub mod clock;
pub mod collaborators;
pub mod dispatcher;
pub mod missed_dose;
pub mod monitor;
pub mod scheduler;
pub mod tracker;
pub mod types;

use anyhow::Result;
use std::sync::{Arc, Mutex};

use crate::config::DosewatchConfig;
use crate::store::sqlite::{SqliteStore, SqliteTrackerStorage};
use crate::store::{AdherenceStore, TrackerStorage};
use adherence::DoseLog;
use clock::{Clock, SystemClock};
use collaborators::{AlarmSound, FamilyAlert, PlatformNotifier};
use dispatcher::NotificationDispatcher;
use missed_dose::MissedDoseDetector;
use monitor::StockMonitor;
use scheduler::ReminderScheduler;
use tracker::{NotificationTracker, ThrottlePolicy};

/// Pluggable pieces an [`Engine`] is assembled from.
pub struct EngineParts {
    pub store: Arc<dyn AdherenceStore>,
    pub tracker_storage: Arc<dyn TrackerStorage>,
    pub clock: Arc<dyn Clock>,
    pub notifier: Option<Arc<dyn PlatformNotifier>>,
    pub family_alert: Arc<dyn FamilyAlert>,
    pub alarm: Arc<dyn AlarmSound>,
}

pub struct Engine {
    config: DosewatchConfig,
    store: Arc<dyn AdherenceStore>,
    clock: Arc<dyn Clock>,
    alarm: Arc<dyn AlarmSound>,
    tracker: Arc<NotificationTracker>,
    dispatcher: NotificationDispatcher,
    monitor: StockMonitor,
    doses: DoseLog,
}

impl Engine {
    /// Wire the services together. Loads persisted throttle state.
    pub async fn build(parts: EngineParts, config: DosewatchConfig) -> Result<Self> {
        let EngineParts {
            store,
            tracker_storage,
            clock,
            notifier,
            family_alert,
            alarm,
        } = parts;

        let tracker = Arc::new(
            NotificationTracker::open(
                tracker_storage,
                clock.clone(),
                ThrottlePolicy::from(&config.throttle),
            )
            .await?,
        );
        let missed_dose = MissedDoseDetector::new(
            store.clone(),
            family_alert,
            config.reminders.missed_dose_grace(),
        );
        let dispatcher =
            NotificationDispatcher::new(store.clone(), notifier, clock.clone(), missed_dose);
        let monitor = StockMonitor::new(
            store.clone(),
            dispatcher.clone(),
            tracker.clone(),
            clock.clone(),
            &config.stock,
        );
        let doses = DoseLog::new(store.clone(), monitor.clone(), clock.clone());

        Ok(Self {
            config,
            store,
            clock,
            alarm,
            tracker,
            dispatcher,
            monitor,
            doses,
        })
    }

    /// Open the configured SQLite database and build an engine on the system
    /// clock with the given collaborators.
    pub async fn open(
        config: DosewatchConfig,
        notifier: Option<Arc<dyn PlatformNotifier>>,
        family_alert: Arc<dyn FamilyAlert>,
        alarm: Arc<dyn AlarmSound>,
    ) -> Result<Self> {
        let db_path = config.resolved_db_path();
        let conn = crate::db::open_database(&db_path)?;
        tracing::info!(path = %db_path.display(), "database opened");

        let shared = Arc::new(Mutex::new(conn));
        let parts = EngineParts {
            store: Arc::new(SqliteStore::from_shared(shared.clone())),
            tracker_storage: Arc::new(SqliteTrackerStorage::new(shared)),
            clock: Arc::new(SystemClock),
            notifier,
            family_alert,
            alarm,
        };
        Self::build(parts, config).await
    }

    /// A fresh scheduler for one monitoring session.
    pub fn new_scheduler(&self) -> Arc<ReminderScheduler> {
        Arc::new(ReminderScheduler::new(
            self.store.clone(),
            self.dispatcher.clone(),
            self.clock.clone(),
            self.alarm.clone(),
            &self.config.reminders,
        ))
    }

    pub fn config(&self) -> &DosewatchConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn AdherenceStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn tracker(&self) -> &Arc<NotificationTracker> {
        &self.tracker
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    pub fn monitor(&self) -> &StockMonitor {
        &self.monitor
    }

    pub fn doses(&self) -> &DoseLog {
        &self.doses
    }
}
