//! Medication reminders and adherence notifications.
//!
//! Dosewatch watches a user's dosing schedules and medicine inventory. It
//! fires a dose alarm when the wall clock reaches a configured time, escalates
//! to a family contact when a dose goes unconfirmed, and warns about expiring
//! or running-low medicines without flooding the inbox.
//!
//! | Concern | Behaviour |
//! |---------|-----------|
//! | **Dose alarms** | Polled every few seconds; one alarm per dose slot per dedup window |
//! | **Missed doses** | Checked once after a grace window; family alert if untaken |
//! | **Expiry warnings** | At most 4 per day, only at 08/12/16/20 h, 3 h apart |
//! | **Stock alerts** | Low and out-of-stock, each at most once per 24 h |
//!
//! # Architecture
//!
//! - **Storage**: SQLite behind the [`store::AdherenceStore`] trait
//! - **Time**: every "now" read goes through [`reminder::clock::Clock`]
//! - **Delivery**: persisted inbox entries, plus optional live platform alerts
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite database initialization, schema, and migrations
//! - [`store`]: Store traits, filters, and the SQLite adapters
//! - [`reminder`]: Scheduler, missed-dose detector, throttle tracker, stock monitor, dispatcher

pub mod config;
pub mod db;
pub mod reminder;
pub mod store;
