//! Core adherence type definitions.
//!
//! Defines [`Schedule`] (a dosing plan with its [`TakenRecord`] log),
//! [`Medicine`] (an inventory item), [`AppNotification`] (an inbox entry),
//! [`ThrottleCategory`] (rate-limit buckets), and [`ReminderEvent`] (the
//! in-process signal emitted when an alarm fires).

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// How often a schedule repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Once,
    Daily,
    Weekly,
    /// No weekday pattern is enforced; only the date range gates activity.
    Custom,
}

impl Frequency {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Custom => "custom",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "once" => Ok(Self::Once),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "custom" => Ok(Self::Custom),
            _ => Err(format!("unknown frequency: {s}")),
        }
    }
}

/// One entry in a schedule's append-only dose log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakenRecord {
    /// Wall-clock moment the dose was confirmed or skipped.
    pub date: NaiveDateTime,
    /// The configured dose time this record answers (`HH:MM`).
    pub time: String,
    pub taken: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A dosing plan for one medicine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub medicine_id: String,
    pub user_id: String,
    pub frequency: Frequency,
    /// Dose times of day, `HH:MM`, in configured order.
    pub times: Vec<String>,
    /// Free text such as `"2 tablets"`; a leading integer is the unit count.
    pub dosage_per_intake: String,
    pub start_date: NaiveDate,
    /// Inclusive last day, if any.
    pub end_date: Option<NaiveDate>,
    pub reminder_enabled: bool,
    #[serde(default)]
    pub taken: Vec<TakenRecord>,
}

impl Schedule {
    /// `start_date <= day` and (`end_date` absent or `end_date >= day`).
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        self.start_date <= day && self.end_date.map_or(true, |end| end >= day)
    }

    /// Whether the log holds a `taken` record for `time` on calendar `day`.
    pub fn was_taken(&self, day: NaiveDate, time: &str) -> bool {
        self.taken
            .iter()
            .any(|r| r.taken && r.time == time && r.date.date() == day)
    }

    /// Units consumed per intake, parsed from the leading integer of
    /// `dosage_per_intake`. Falls back to 1 when absent or zero.
    pub fn units_per_intake(&self) -> u32 {
        parse_leading_quantity(&self.dosage_per_intake).unwrap_or(1)
    }
}

/// Leading positive integer in free dosage text (`"2 tablets"` → 2).
pub fn parse_leading_quantity(text: &str) -> Option<u32> {
    let digits: String = text
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<u32>().ok().filter(|n| *n > 0)
}

/// A medicine in a user's inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medicine {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub quantity: u32,
    pub unit: String,
    pub expiry_date: NaiveDate,
}

/// Kind of inbox notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Reminder,
    ExpiryWarning,
    RefillAlert,
    DonationUpdate,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reminder => "reminder",
            Self::ExpiryWarning => "expiry_warning",
            Self::RefillAlert => "refill_alert",
            Self::DonationUpdate => "donation_update",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reminder" => Ok(Self::Reminder),
            "expiry_warning" => Ok(Self::ExpiryWarning),
            "refill_alert" => Ok(Self::RefillAlert),
            "donation_update" => Ok(Self::DonationUpdate),
            "system" => Ok(Self::System),
            _ => Err(format!("unknown notification type: {s}")),
        }
    }
}

/// A persisted inbox notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppNotification {
    /// UUID v7 primary key.
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Rate-limit bucket for stock and expiry notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottleCategory {
    Expiry,
    LowStock,
    OutOfStock,
}

impl ThrottleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expiry => "expiry",
            Self::LowStock => "low_stock",
            Self::OutOfStock => "out_of_stock",
        }
    }
}

impl std::fmt::Display for ThrottleCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ThrottleCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "expiry" => Ok(Self::Expiry),
            "low_stock" => Ok(Self::LowStock),
            "out_of_stock" => Ok(Self::OutOfStock),
            _ => Err(format!("unknown throttle category: {s}")),
        }
    }
}

/// Throttle state for one `(subject_id, category)` bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerRecord {
    pub subject_id: String,
    pub category: ThrottleCategory,
    pub last_notified: NaiveDateTime,
    /// Notifications sent on `last_notified`'s calendar day.
    pub notification_count: u32,
}

impl TrackerRecord {
    /// Flat-map key for a bucket.
    pub fn key(subject_id: &str, category: ThrottleCategory) -> String {
        format!("{subject_id}_{}", category.as_str())
    }
}

/// Signal broadcast to the host when a dose alarm fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderEvent {
    pub medicine_name: String,
    pub dosage: String,
    pub time: String,
    pub schedule_id: String,
}

/// Zero-padded 24h `HH:MM` for a wall-clock moment.
pub fn time_of_day(now: &NaiveDateTime) -> String {
    format!("{:02}:{:02}", now.hour(), now.minute())
}
