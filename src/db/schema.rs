//! SQL DDL for the adherence tables.
//!
//! Defines the `medicines`, `schedules`, `taken_records`, `notifications`, and
//! `schema_meta` tables. All DDL uses `IF NOT EXISTS` for idempotent
//! initialization. The `notification_trackers` table arrives with migration v2.

use rusqlite::Connection;

/// All schema DDL statements for the v1 tables.
const SCHEMA_SQL: &str = r#"
-- Medicine catalog per user
CREATE TABLE IF NOT EXISTS medicines (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    quantity INTEGER NOT NULL DEFAULT 0 CHECK(quantity >= 0),
    unit TEXT NOT NULL DEFAULT '',
    expiry_date TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_medicines_user ON medicines(user_id);

-- Dosing schedules; times is a JSON array of "HH:MM" strings
CREATE TABLE IF NOT EXISTS schedules (
    id TEXT PRIMARY KEY,
    medicine_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    frequency TEXT NOT NULL CHECK(frequency IN ('once','daily','weekly','custom')),
    times TEXT NOT NULL,
    dosage_per_intake TEXT NOT NULL DEFAULT '',
    start_date TEXT NOT NULL,
    end_date TEXT,
    reminder_enabled INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_schedules_user ON schedules(user_id);
CREATE INDEX IF NOT EXISTS idx_schedules_medicine ON schedules(medicine_id);

-- Append-only dose log
CREATE TABLE IF NOT EXISTS taken_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    schedule_id TEXT NOT NULL REFERENCES schedules(id) ON DELETE CASCADE,
    date TEXT NOT NULL,
    time TEXT NOT NULL,
    taken INTEGER NOT NULL,
    skipped INTEGER,
    notes TEXT
);

CREATE INDEX IF NOT EXISTS idx_taken_schedule ON taken_records(schedule_id);

-- In-app notification inbox
CREATE TABLE IF NOT EXISTS notifications (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    type TEXT NOT NULL CHECK(type IN ('reminder','expiry_warning','refill_alert','donation_update','system')),
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    read INTEGER NOT NULL DEFAULT 0,
    action_url TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
