//! SQLite-backed store adapters.
//!
//! [`SqliteStore`] implements [`AdherenceStore`] over the `medicines`,
//! `schedules`, `taken_records`, and `notifications` tables.
//! [`SqliteTrackerStorage`] persists the tracker map in
//! `notification_trackers`. Both share one `Arc<Mutex<Connection>>` and run
//! every statement on the blocking pool.

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{
    AdherenceStore, Filter, MedicinePatch, NotificationPatch, StoreError, StoreResult,
    TrackerStorage,
};
use crate::db::{format_date, format_timestamp, parse_date, parse_timestamp};
use crate::reminder::types::{
    AppNotification, Frequency, Medicine, NotificationKind, Schedule, TakenRecord,
    ThrottleCategory, TrackerRecord,
};

/// Run a closure against the shared connection on the blocking pool.
async fn with_conn<T, F>(db: &Arc<Mutex<Connection>>, f: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
{
    let db = Arc::clone(db);
    tokio::task::spawn_blocking(move || {
        let mut conn = db
            .lock()
            .map_err(|e| StoreError::Task(format!("db lock poisoned: {e}")))?;
        f(&mut conn)
    })
    .await
    .map_err(|e| StoreError::Task(format!("db task failed: {e}")))?
}

/// Build `WHERE ...` for a filter. Returns `None` when the filter can match
/// nothing (empty id list).
fn where_clause(filter: &Filter) -> Option<(String, Vec<String>)> {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some(ref user_id) = filter.user_id {
        values.push(user_id.clone());
        clauses.push(format!("user_id = ?{}", values.len()));
    }
    if let Some(ref ids) = filter.ids {
        if ids.is_empty() {
            return None;
        }
        let placeholders: Vec<String> = ids
            .iter()
            .map(|id| {
                values.push(id.clone());
                format!("?{}", values.len())
            })
            .collect();
        clauses.push(format!("id IN ({})", placeholders.join(", ")));
    }

    if clauses.is_empty() {
        Some((String::new(), values))
    } else {
        Some((format!("WHERE {}", clauses.join(" AND ")), values))
    }
}

fn corrupt(entity: &'static str, id: &str, reason: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        entity,
        id: id.to_string(),
        reason: reason.into(),
    }
}

/// SQLite implementation of [`AdherenceStore`].
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn from_shared(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    /// Handle to the underlying connection, for sharing with
    /// [`SqliteTrackerStorage`].
    pub fn shared(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.db)
    }
}

// ── Row helpers ──────────────────────────────────────────────────────────────

struct ScheduleRow {
    id: String,
    medicine_id: String,
    user_id: String,
    frequency: String,
    times: String,
    dosage_per_intake: String,
    start_date: String,
    end_date: Option<String>,
    reminder_enabled: bool,
}

const SCHEDULE_COLUMNS: &str = "id, medicine_id, user_id, frequency, times, dosage_per_intake, \
     start_date, end_date, reminder_enabled";

fn read_schedule_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduleRow> {
    Ok(ScheduleRow {
        id: row.get(0)?,
        medicine_id: row.get(1)?,
        user_id: row.get(2)?,
        frequency: row.get(3)?,
        times: row.get(4)?,
        dosage_per_intake: row.get(5)?,
        start_date: row.get(6)?,
        end_date: row.get(7)?,
        reminder_enabled: row.get(8)?,
    })
}

fn load_taken(conn: &Connection, schedule_id: &str) -> StoreResult<Vec<TakenRecord>> {
    let mut stmt = conn.prepare(
        "SELECT date, time, taken, skipped, notes FROM taken_records \
         WHERE schedule_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![schedule_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
                row.get::<_, Option<bool>>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(date, time, taken, skipped, notes)| {
            let date = parse_timestamp(&date)
                .ok_or_else(|| corrupt("taken record", schedule_id, format!("bad date {date}")))?;
            Ok(TakenRecord {
                date,
                time,
                taken,
                skipped,
                notes,
            })
        })
        .collect()
}

fn into_schedule(conn: &Connection, row: ScheduleRow) -> StoreResult<Schedule> {
    let frequency: Frequency = row
        .frequency
        .parse()
        .map_err(|e: String| corrupt("schedule", &row.id, e))?;
    let times: Vec<String> = serde_json::from_str(&row.times)
        .map_err(|e| corrupt("schedule", &row.id, format!("bad times: {e}")))?;
    let start_date = parse_date(&row.start_date)
        .ok_or_else(|| corrupt("schedule", &row.id, format!("bad start_date {}", row.start_date)))?;
    let end_date = match row.end_date {
        Some(ref s) => Some(
            parse_date(s)
                .ok_or_else(|| corrupt("schedule", &row.id, format!("bad end_date {s}")))?,
        ),
        None => None,
    };
    let taken = load_taken(conn, &row.id)?;

    Ok(Schedule {
        id: row.id,
        medicine_id: row.medicine_id,
        user_id: row.user_id,
        frequency,
        times,
        dosage_per_intake: row.dosage_per_intake,
        start_date,
        end_date,
        reminder_enabled: row.reminder_enabled,
        taken,
    })
}

const MEDICINE_COLUMNS: &str = "id, user_id, name, quantity, unit, expiry_date";

fn read_medicine_row(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<(String, String, String, i64, String, String)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn into_medicine(
    (id, user_id, name, quantity, unit, expiry): (String, String, String, i64, String, String),
) -> StoreResult<Medicine> {
    let quantity = u32::try_from(quantity)
        .map_err(|_| corrupt("medicine", &id, format!("bad quantity {quantity}")))?;
    let expiry_date = parse_date(&expiry)
        .ok_or_else(|| corrupt("medicine", &id, format!("bad expiry_date {expiry}")))?;
    Ok(Medicine {
        id,
        user_id,
        name,
        quantity,
        unit,
        expiry_date,
    })
}

const NOTIFICATION_COLUMNS: &str = "id, user_id, type, title, message, read, action_url, created_at";

#[allow(clippy::type_complexity)]
fn read_notification_row(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<(String, String, String, String, String, bool, Option<String>, String)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

#[allow(clippy::type_complexity)]
fn into_notification(
    (id, user_id, kind, title, message, read, action_url, created_at): (
        String,
        String,
        String,
        String,
        String,
        bool,
        Option<String>,
        String,
    ),
) -> StoreResult<AppNotification> {
    let kind: NotificationKind = kind
        .parse()
        .map_err(|e: String| corrupt("notification", &id, e))?;
    let created_at = parse_timestamp(&created_at)
        .ok_or_else(|| corrupt("notification", &id, format!("bad created_at {created_at}")))?;
    Ok(AppNotification {
        id,
        user_id,
        kind,
        title,
        message,
        read,
        action_url,
        created_at,
    })
}

// ── AdherenceStore ───────────────────────────────────────────────────────────

#[async_trait]
impl AdherenceStore for SqliteStore {
    async fn find_schedules(&self, filter: &Filter) -> StoreResult<Vec<Schedule>> {
        let Some((clause, values)) = where_clause(filter) else {
            return Ok(Vec::new());
        };
        with_conn(&self.db, move |conn| {
            let rows = {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SCHEDULE_COLUMNS} FROM schedules {clause} ORDER BY created_at, id"
                ))?;
                let collected = stmt
                    .query_map(params_from_iter(values.iter()), read_schedule_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                collected
            };
            // One undecodable row must not hide the user's other schedules.
            let mut schedules = Vec::with_capacity(rows.len());
            for row in rows {
                let id = row.id.clone();
                match into_schedule(&*conn, row) {
                    Ok(schedule) => schedules.push(schedule),
                    Err(e @ StoreError::Corrupt { .. }) => {
                        tracing::warn!(schedule_id = %id, error = %e, "skipping corrupt schedule");
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(schedules)
        })
        .await
    }

    async fn get_schedule(&self, id: &str) -> StoreResult<Option<Schedule>> {
        let id = id.to_string();
        with_conn(&self.db, move |conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = ?1"),
                    params![id],
                    read_schedule_row,
                )
                .optional()?;
            row.map(|r| into_schedule(&*conn, r)).transpose()
        })
        .await
    }

    async fn add_schedule(&self, schedule: &Schedule) -> StoreResult<()> {
        let schedule = schedule.clone();
        with_conn(&self.db, move |conn| {
            let times = serde_json::to_string(&schedule.times)?;
            let now = format_timestamp(&chrono::Local::now().naive_local());
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO schedules (id, medicine_id, user_id, frequency, times, dosage_per_intake, \
                 start_date, end_date, reminder_enabled, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    schedule.id,
                    schedule.medicine_id,
                    schedule.user_id,
                    schedule.frequency.as_str(),
                    times,
                    schedule.dosage_per_intake,
                    format_date(&schedule.start_date),
                    schedule.end_date.as_ref().map(format_date),
                    schedule.reminder_enabled,
                    now,
                ],
            )?;
            for record in &schedule.taken {
                insert_taken(&tx, &schedule.id, record)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn append_taken(&self, schedule_id: &str, record: &TakenRecord) -> StoreResult<()> {
        let schedule_id = schedule_id.to_string();
        let record = record.clone();
        with_conn(&self.db, move |conn| {
            let exists: bool = conn.query_row(
                "SELECT COUNT(*) > 0 FROM schedules WHERE id = ?1",
                params![schedule_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(StoreError::NotFound {
                    entity: "schedule",
                    id: schedule_id,
                });
            }
            insert_taken(conn, &schedule_id, &record)
        })
        .await
    }

    async fn delete_schedule(&self, id: &str) -> StoreResult<bool> {
        let id = id.to_string();
        with_conn(&self.db, move |conn| {
            let rows = conn.execute("DELETE FROM schedules WHERE id = ?1", params![id])?;
            Ok(rows > 0)
        })
        .await
    }

    async fn find_medicines(&self, filter: &Filter) -> StoreResult<Vec<Medicine>> {
        let Some((clause, values)) = where_clause(filter) else {
            return Ok(Vec::new());
        };
        with_conn(&self.db, move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MEDICINE_COLUMNS} FROM medicines {clause} ORDER BY name, id"
            ))?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), read_medicine_row)?
                .collect::<Result<Vec<_>, _>>()?;
            let mut medicines = Vec::with_capacity(rows.len());
            for row in rows {
                let id = row.0.clone();
                match into_medicine(row) {
                    Ok(medicine) => medicines.push(medicine),
                    Err(e @ StoreError::Corrupt { .. }) => {
                        tracing::warn!(medicine_id = %id, error = %e, "skipping corrupt medicine");
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(medicines)
        })
        .await
    }

    async fn get_medicine(&self, id: &str) -> StoreResult<Option<Medicine>> {
        let id = id.to_string();
        with_conn(&self.db, move |conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {MEDICINE_COLUMNS} FROM medicines WHERE id = ?1"),
                    params![id],
                    read_medicine_row,
                )
                .optional()?;
            row.map(into_medicine).transpose()
        })
        .await
    }

    async fn add_medicine(&self, medicine: &Medicine) -> StoreResult<()> {
        let medicine = medicine.clone();
        with_conn(&self.db, move |conn| {
            let now = format_timestamp(&chrono::Local::now().naive_local());
            conn.execute(
                "INSERT INTO medicines (id, user_id, name, quantity, unit, expiry_date, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    medicine.id,
                    medicine.user_id,
                    medicine.name,
                    medicine.quantity,
                    medicine.unit,
                    format_date(&medicine.expiry_date),
                    now,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn update_medicine(&self, id: &str, patch: &MedicinePatch) -> StoreResult<()> {
        let id = id.to_string();
        let patch = patch.clone();
        with_conn(&self.db, move |conn| {
            let now = format_timestamp(&chrono::Local::now().naive_local());
            let rows = conn.execute(
                "UPDATE medicines SET \
                 quantity = COALESCE(?1, quantity), \
                 expiry_date = COALESCE(?2, expiry_date), \
                 updated_at = ?3 \
                 WHERE id = ?4",
                params![
                    patch.quantity,
                    patch.expiry_date.as_ref().map(format_date),
                    now,
                    id,
                ],
            )?;
            if rows == 0 {
                return Err(StoreError::NotFound {
                    entity: "medicine",
                    id,
                });
            }
            Ok(())
        })
        .await
    }

    async fn delete_medicine(&self, id: &str) -> StoreResult<bool> {
        let id = id.to_string();
        with_conn(&self.db, move |conn| {
            let rows = conn.execute("DELETE FROM medicines WHERE id = ?1", params![id])?;
            Ok(rows > 0)
        })
        .await
    }

    async fn add_notification(&self, notification: &AppNotification) -> StoreResult<()> {
        let n = notification.clone();
        with_conn(&self.db, move |conn| {
            conn.execute(
                "INSERT INTO notifications (id, user_id, type, title, message, read, action_url, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    n.id,
                    n.user_id,
                    n.kind.as_str(),
                    n.title,
                    n.message,
                    n.read,
                    n.action_url,
                    format_timestamp(&n.created_at),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn find_notifications(&self, filter: &Filter) -> StoreResult<Vec<AppNotification>> {
        let Some((clause, values)) = where_clause(filter) else {
            return Ok(Vec::new());
        };
        with_conn(&self.db, move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications {clause} \
                 ORDER BY created_at DESC, id DESC"
            ))?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), read_notification_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(into_notification).collect()
        })
        .await
    }

    async fn update_notification(&self, id: &str, patch: &NotificationPatch) -> StoreResult<()> {
        let id = id.to_string();
        let read = patch.read;
        with_conn(&self.db, move |conn| {
            let rows = conn.execute(
                "UPDATE notifications SET read = COALESCE(?1, read) WHERE id = ?2",
                params![read, id],
            )?;
            if rows == 0 {
                return Err(StoreError::NotFound {
                    entity: "notification",
                    id,
                });
            }
            Ok(())
        })
        .await
    }

    async fn delete_notifications(&self, filter: &Filter) -> StoreResult<usize> {
        let Some((clause, values)) = where_clause(filter) else {
            return Ok(0);
        };
        with_conn(&self.db, move |conn| {
            let rows = conn.execute(
                &format!("DELETE FROM notifications {clause}"),
                params_from_iter(values.iter()),
            )?;
            Ok(rows)
        })
        .await
    }
}

fn insert_taken(conn: &Connection, schedule_id: &str, record: &TakenRecord) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO taken_records (schedule_id, date, time, taken, skipped, notes) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            schedule_id,
            format_timestamp(&record.date),
            record.time,
            record.taken,
            record.skipped,
            record.notes,
        ],
    )?;
    Ok(())
}

// ── TrackerStorage ───────────────────────────────────────────────────────────

/// Tracker map persisted in the `notification_trackers` table.
#[derive(Clone)]
pub struct SqliteTrackerStorage {
    db: Arc<Mutex<Connection>>,
}

impl SqliteTrackerStorage {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TrackerStorage for SqliteTrackerStorage {
    async fn load(&self) -> StoreResult<HashMap<String, TrackerRecord>> {
        with_conn(&self.db, |conn| {
            let mut stmt = conn.prepare(
                "SELECT key, subject_id, category, last_notified, notification_count \
                 FROM notification_trackers",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, u32>(4)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let mut map = HashMap::with_capacity(rows.len());
            for (key, subject_id, category, last_notified, notification_count) in rows {
                let category: ThrottleCategory = category
                    .parse()
                    .map_err(|e: String| corrupt("tracker", &key, e))?;
                let last_notified = parse_timestamp(&last_notified).ok_or_else(|| {
                    corrupt("tracker", &key, format!("bad last_notified {last_notified}"))
                })?;
                map.insert(
                    key,
                    TrackerRecord {
                        subject_id,
                        category,
                        last_notified,
                        notification_count,
                    },
                );
            }
            Ok(map)
        })
        .await
    }

    async fn save(&self, records: &HashMap<String, TrackerRecord>) -> StoreResult<()> {
        let records = records.clone();
        with_conn(&self.db, move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM notification_trackers", [])?;
            for (key, record) in &records {
                tx.execute(
                    "INSERT INTO notification_trackers \
                     (key, subject_id, category, last_notified, notification_count) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        key,
                        record.subject_id,
                        record.category.as_str(),
                        format_timestamp(&record.last_notified),
                        record.notification_count,
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn store() -> SqliteStore {
        SqliteStore::new(crate::db::open_memory_database().unwrap())
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn medicine(id: &str, user: &str, name: &str, quantity: u32) -> Medicine {
        Medicine {
            id: id.into(),
            user_id: user.into(),
            name: name.into(),
            quantity,
            unit: "tablet".into(),
            expiry_date: day(2027, 1, 1),
        }
    }

    #[test]
    fn where_clause_shapes() {
        assert_eq!(where_clause(&Filter::all()), Some((String::new(), vec![])));
        let (sql, values) = where_clause(&Filter::user("u1").with_ids(["a", "b"])).unwrap();
        assert_eq!(sql, "WHERE user_id = ?1 AND id IN (?2, ?3)");
        assert_eq!(values, vec!["u1", "a", "b"]);
        assert!(where_clause(&Filter::ids(Vec::<String>::new())).is_none());
    }

    #[tokio::test]
    async fn medicine_find_by_user_and_ids() {
        let store = store();
        store.add_medicine(&medicine("m1", "u1", "Aspirin", 5)).await.unwrap();
        store.add_medicine(&medicine("m2", "u1", "Ibuprofen", 5)).await.unwrap();
        store.add_medicine(&medicine("m3", "u2", "Aspirin", 5)).await.unwrap();

        let mine = store.find_medicines(&Filter::user("u1")).await.unwrap();
        assert_eq!(mine.len(), 2);

        let picked = store.find_medicines(&Filter::ids(["m1", "m3"])).await.unwrap();
        let ids: Vec<_> = picked.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m3"]);

        let none = store
            .find_medicines(&Filter::user("u2").with_ids(["m1"]))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn update_medicine_applies_patch() {
        let store = store();
        store.add_medicine(&medicine("m1", "u1", "Aspirin", 5)).await.unwrap();

        store
            .update_medicine(
                "m1",
                &MedicinePatch {
                    quantity: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let m = store.get_medicine("m1").await.unwrap().unwrap();
        assert_eq!(m.quantity, 2);
        assert_eq!(m.expiry_date, day(2027, 1, 1));

        let missing = store.update_medicine("nope", &MedicinePatch::default()).await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn schedule_round_trip_with_taken_log() {
        let store = store();
        let schedule = Schedule {
            id: "s1".into(),
            medicine_id: "m1".into(),
            user_id: "u1".into(),
            frequency: Frequency::Daily,
            times: vec!["08:00".into(), "20:00".into()],
            dosage_per_intake: "2 tablets".into(),
            start_date: day(2026, 1, 1),
            end_date: Some(day(2026, 12, 31)),
            reminder_enabled: true,
            taken: Vec::new(),
        };
        store.add_schedule(&schedule).await.unwrap();

        let record = TakenRecord {
            date: day(2026, 2, 1).and_hms_opt(8, 3, 0).unwrap(),
            time: "08:00".into(),
            taken: true,
            skipped: None,
            notes: Some("with food".into()),
        };
        store.append_taken("s1", &record).await.unwrap();

        let loaded = store.get_schedule("s1").await.unwrap().unwrap();
        assert_eq!(loaded.times, schedule.times);
        assert_eq!(loaded.end_date, schedule.end_date);
        assert_eq!(loaded.taken, vec![record.clone()]);

        let err = store.append_taken("ghost", &record).await;
        assert!(matches!(err, Err(StoreError::NotFound { entity: "schedule", .. })));
    }

    #[tokio::test]
    async fn corrupt_schedule_skipped_in_find_but_surfaced_by_get() {
        let store = store();
        {
            let db = store.shared();
            let conn = db.lock().unwrap();
            conn.execute(
                "INSERT INTO schedules (id, medicine_id, user_id, frequency, times, start_date, created_at) \
                 VALUES ('bad', 'm1', 'u1', 'daily', 'not json', '2026-01-01', '2026-01-01T00:00:00')",
                [],
            )
            .unwrap();
        }
        store
            .add_schedule(&Schedule {
                id: "good".into(),
                medicine_id: "m1".into(),
                user_id: "u1".into(),
                frequency: Frequency::Daily,
                times: vec!["09:00".into()],
                dosage_per_intake: "1".into(),
                start_date: day(2026, 1, 1),
                end_date: None,
                reminder_enabled: true,
                taken: Vec::new(),
            })
            .await
            .unwrap();

        let found = store.find_schedules(&Filter::user("u1")).await.unwrap();
        let ids: Vec<_> = found.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["good"]);

        let result = store.get_schedule("bad").await;
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn corrupt_medicine_skipped_in_find_but_surfaced_by_get() {
        let store = store();
        store.add_medicine(&medicine("good", "u1", "Aspirin", 10)).await.unwrap();
        {
            let db = store.shared();
            let conn = db.lock().unwrap();
            conn.execute(
                "INSERT INTO medicines (id, user_id, name, quantity, unit, expiry_date, created_at, updated_at) \
                 VALUES ('bad', 'u1', 'Ibuprofen', 5, 'tablet', '12/31/2027', '2026-01-01T00:00:00', '2026-01-01T00:00:00')",
                [],
            )
            .unwrap();
        }

        let found = store.find_medicines(&Filter::user("u1")).await.unwrap();
        let ids: Vec<_> = found.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["good"]);

        let result = store.get_medicine("bad").await;
        assert!(matches!(result, Err(StoreError::Corrupt { entity: "medicine", .. })));
    }

    #[tokio::test]
    async fn notifications_newest_first_and_bulk_delete() {
        let store = store();
        for (i, hour) in [8u32, 12, 10].iter().enumerate() {
            store
                .add_notification(&AppNotification {
                    id: format!("n{i}"),
                    user_id: "u1".into(),
                    kind: NotificationKind::System,
                    title: "t".into(),
                    message: "m".into(),
                    read: false,
                    action_url: None,
                    created_at: day(2026, 1, 1).and_hms_opt(*hour, 0, 0).unwrap(),
                })
                .await
                .unwrap();
        }

        let listed = store.find_notifications(&Filter::user("u1")).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["n1", "n2", "n0"]);

        store
            .update_notification("n0", &NotificationPatch { read: Some(true) })
            .await
            .unwrap();
        let n0 = store.find_notifications(&Filter::ids(["n0"])).await.unwrap();
        assert!(n0[0].read);

        assert_eq!(store.delete_notifications(&Filter::user("u1")).await.unwrap(), 3);
        assert!(store.find_notifications(&Filter::user("u1")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tracker_storage_round_trip() {
        let store = store();
        let storage = SqliteTrackerStorage::new(store.shared());
        assert!(storage.load().await.unwrap().is_empty());

        let mut map = HashMap::new();
        let record = TrackerRecord {
            subject_id: "m1".into(),
            category: ThrottleCategory::LowStock,
            last_notified: day(2026, 1, 1).and_hms_opt(9, 0, 0).unwrap(),
            notification_count: 1,
        };
        map.insert(TrackerRecord::key("m1", ThrottleCategory::LowStock), record);
        storage.save(&map).await.unwrap();
        assert_eq!(storage.load().await.unwrap(), map);

        storage.save(&HashMap::new()).await.unwrap();
        assert!(storage.load().await.unwrap().is_empty());
    }
}
