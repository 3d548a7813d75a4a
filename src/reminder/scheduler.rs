//! Dose alarm polling loop.
//!
//! A [`ReminderScheduler`] monitors one user at a time. Every sweep compares
//! the wall-clock `HH:MM` against each active schedule's dose times and fires
//! an alarm on an exact match. A fired `(schedule, time)` key is held for the
//! dedup window so the sweeps that follow within the same minute stay quiet.

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::clock::Clock;
use super::collaborators::AlarmSound;
use super::dispatcher::NotificationDispatcher;
use super::types::{time_of_day, Medicine, NotificationKind, ReminderEvent, Schedule};
use crate::config::ReminderConfig;
use crate::store::{AdherenceStore, Filter, StoreResult};

/// Capacity of the reminder event channel; slow subscribers lag, they never
/// block a sweep.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Dedup key for one dose slot of one schedule.
pub fn dedup_key(schedule_id: &str, time: &str) -> String {
    format!("{schedule_id}-{time}")
}

struct MonitoringRun {
    user_id: String,
    handle: JoinHandle<()>,
}

/// Current run plus a counter bumped by every start and stop. A start only
/// installs its loop if nothing else started or stopped during its first
/// sweep.
#[derive(Default)]
struct RunState {
    generation: u64,
    current: Option<MonitoringRun>,
}

/// Keys fired recently, each with the timer that will forget it.
type FiredRegistry = Arc<Mutex<HashMap<String, JoinHandle<()>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct ReminderScheduler {
    store: Arc<dyn AdherenceStore>,
    dispatcher: NotificationDispatcher,
    clock: Arc<dyn Clock>,
    alarm: Arc<dyn AlarmSound>,
    events: broadcast::Sender<ReminderEvent>,
    poll_interval: Duration,
    dedup_window: Duration,
    fired: FiredRegistry,
    run: Mutex<RunState>,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<dyn AdherenceStore>,
        dispatcher: NotificationDispatcher,
        clock: Arc<dyn Clock>,
        alarm: Arc<dyn AlarmSound>,
        config: &ReminderConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            dispatcher,
            clock,
            alarm,
            events,
            poll_interval: config.poll_interval(),
            dedup_window: config.dedup_window(),
            fired: Arc::new(Mutex::new(HashMap::new())),
            run: Mutex::new(RunState::default()),
        }
    }

    /// Receive a [`ReminderEvent`] for every alarm fired from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ReminderEvent> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.run).current.is_some()
    }

    /// User currently being monitored, if any.
    pub fn monitored_user(&self) -> Option<String> {
        lock(&self.run).current.as_ref().map(|r| r.user_id.clone())
    }

    /// Keys currently suppressed, sorted.
    pub fn fired_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.fired).keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Start (or restart) monitoring `user_id`: stop any previous run, sweep
    /// once right away, then sweep every poll interval.
    ///
    /// A stop or another start issued while the first sweep is in flight wins;
    /// this call then returns without installing its loop.
    pub async fn start_monitoring(self: &Arc<Self>, user_id: &str) {
        let (generation, _) = self.halt();
        tracing::info!(
            user_id = %user_id,
            poll_secs = self.poll_interval.as_secs(),
            "reminder monitoring started"
        );

        self.sweep(user_id).await;

        let mut state = lock(&self.run);
        if state.generation != generation {
            tracing::debug!(user_id = %user_id, "monitoring superseded during first sweep");
            return;
        }

        let scheduler = Arc::downgrade(self);
        let period = self.poll_interval;
        let user = user_id.to_string();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(scheduler) = scheduler.upgrade() else {
                    break;
                };
                scheduler.sweep(&user).await;
            }
        });

        let previous = state.current.replace(MonitoringRun {
            user_id: user_id.to_string(),
            handle,
        });
        if let Some(previous) = previous {
            previous.handle.abort();
        }
    }

    /// Cancel the periodic sweep and forget every fired key. Missed-dose
    /// checks already armed keep running. Returns whether a run was active.
    pub fn stop_monitoring(&self) -> bool {
        self.halt().1
    }

    /// Bump the generation, abort the current run and drain the fired keys.
    /// Returns the new generation and whether a run was active.
    fn halt(&self) -> (u64, bool) {
        let (generation, run) = {
            let mut state = lock(&self.run);
            state.generation += 1;
            (state.generation, state.current.take())
        };
        for (_, timer) in lock(&self.fired).drain() {
            timer.abort();
        }

        let had_run = run.is_some();
        if let Some(run) = run {
            run.handle.abort();
            tracing::info!(user_id = %run.user_id, "reminder monitoring stopped");
        }
        (generation, had_run)
    }

    /// One pass over the user's schedules. Returns the number of alarms fired.
    pub async fn sweep(&self, user_id: &str) -> usize {
        let now = self.clock.now();
        let current_time = time_of_day(&now);
        let today = now.date();

        let schedules = match self.store.find_schedules(&Filter::user(user_id)).await {
            Ok(schedules) => schedules,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "failed to load schedules");
                return 0;
            }
        };

        let mut fired = 0;
        for schedule in &schedules {
            if !schedule.reminder_enabled || !schedule.is_active_on(today) {
                continue;
            }
            match self
                .process_schedule(user_id, schedule, &current_time, now)
                .await
            {
                Ok(n) => fired += n,
                Err(e) => {
                    tracing::warn!(schedule_id = %schedule.id, error = %e, "schedule skipped this sweep");
                }
            }
        }

        tracing::debug!(user_id = %user_id, time = %current_time, schedules = schedules.len(), fired, "sweep done");
        fired
    }

    async fn process_schedule(
        &self,
        user_id: &str,
        schedule: &Schedule,
        current_time: &str,
        now: NaiveDateTime,
    ) -> StoreResult<usize> {
        let mut fired = 0;
        for time in &schedule.times {
            if time != current_time {
                continue;
            }
            let key = dedup_key(&schedule.id, time);
            if !self.claim(&key) {
                continue;
            }

            let medicine = match self.store.get_medicine(&schedule.medicine_id).await {
                Ok(Some(medicine)) => medicine,
                Ok(None) => {
                    tracing::debug!(schedule_id = %schedule.id, medicine_id = %schedule.medicine_id, "schedule references a missing medicine");
                    continue;
                }
                Err(e) => {
                    // Let the next sweep retry this slot.
                    self.release(&key);
                    return Err(e);
                }
            };

            self.fire(user_id, schedule, &medicine, time, now).await;
            fired += 1;
        }
        Ok(fired)
    }

    async fn fire(
        &self,
        user_id: &str,
        schedule: &Schedule,
        medicine: &Medicine,
        time: &str,
        now: NaiveDateTime,
    ) {
        tracing::info!(
            user_id = %user_id,
            schedule_id = %schedule.id,
            medicine = %medicine.name,
            time = %time,
            "dose alarm"
        );

        self.alarm.play();

        let message = format!(
            "Time to take {} of {} ({time})",
            schedule.dosage_per_intake, medicine.name
        );
        if let Err(e) = self
            .dispatcher
            .send_notification(user_id, NotificationKind::Reminder, "Medication reminder", &message, Some("/schedules"))
            .await
        {
            tracing::debug!(schedule_id = %schedule.id, error = %e, "reminder not persisted");
        }

        // No subscribers is fine.
        let _ = self.events.send(ReminderEvent {
            medicine_name: medicine.name.clone(),
            dosage: schedule.dosage_per_intake.clone(),
            time: time.to_string(),
            schedule_id: schedule.id.clone(),
        });

        self.dispatcher
            .missed_dose()
            .arm(user_id, &medicine.name, time, now);
    }

    /// Atomically mark `key` as fired. Returns `false` if it already was.
    fn claim(&self, key: &str) -> bool {
        let mut fired = lock(&self.fired);
        if fired.contains_key(key) {
            return false;
        }

        let registry = Arc::clone(&self.fired);
        let window = self.dedup_window;
        let expiring = key.to_string();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            lock(&registry).remove(&expiring);
        });
        fired.insert(key.to_string(), timer);
        true
    }

    fn release(&self, key: &str) {
        if let Some(timer) = lock(&self.fired).remove(key) {
            timer.abort();
        }
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}
