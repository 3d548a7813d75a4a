mod helpers;

use helpers::{at, day, medicine, schedule, test_store, Harness, RecordingFamilyAlert, RecordingNotifier};
use std::sync::Arc;
use std::time::Duration;

use dosewatch::reminder::clock::ManualClock;
use dosewatch::reminder::collaborators::Permission;
use dosewatch::reminder::dispatcher::NotificationDispatcher;
use dosewatch::reminder::missed_dose::MissedDoseDetector;
use dosewatch::reminder::types::NotificationKind;

#[tokio::test]
async fn persists_without_a_platform_notifier() {
    let store = test_store();
    let clock = Arc::new(ManualClock::new(at(2026, 2, 1, 10, 0)));
    let detector = MissedDoseDetector::new(
        store.clone(),
        Arc::new(RecordingFamilyAlert::default()),
        Duration::from_secs(60),
    );
    let dispatcher = NotificationDispatcher::new(store, None, clock, detector);

    let sent = dispatcher
        .send_notification("u1", NotificationKind::System, "Hello", "Welcome", None)
        .await
        .unwrap();

    let inbox = dispatcher.list_notifications("u1").await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].id, sent.id);
    assert!(!inbox[0].read);
    assert_eq!(inbox[0].created_at, at(2026, 2, 1, 10, 0));
}

#[tokio::test]
async fn denied_permission_skips_delivery_only() {
    let h = Harness::with_notifier(
        at(2026, 2, 1, 10, 0),
        RecordingNotifier::new(Permission::Denied, Permission::Granted),
    )
    .await;

    h.engine
        .dispatcher()
        .send_notification("u1", NotificationKind::Reminder, "Dose", "Take it", None)
        .await
        .unwrap();

    assert_eq!(h.inbox("u1").await.len(), 1);
    assert!(h.notifier.shown().is_empty());
    assert_eq!(h.notifier.requests(), 0, "denied is final");
}

#[tokio::test]
async fn undecided_permission_is_requested_once() {
    let h = Harness::with_notifier(
        at(2026, 2, 1, 10, 0),
        RecordingNotifier::new(Permission::Default, Permission::Granted),
    )
    .await;
    let dispatcher = h.engine.dispatcher();

    dispatcher
        .send_notification("u1", NotificationKind::RefillAlert, "Low", "Refill soon", Some("/medicines/m1"))
        .await
        .unwrap();
    dispatcher
        .send_notification("u1", NotificationKind::System, "Hi", "There", None)
        .await
        .unwrap();

    assert_eq!(h.notifier.requests(), 1);
    let shown = h.notifier.shown();
    assert_eq!(shown.len(), 2);
    assert!(!shown[0].require_interaction);
    assert_eq!(shown[0].title, "Low");
    assert_eq!(shown[0].body, "Refill soon");
}

#[tokio::test]
async fn refused_request_suppresses_delivery() {
    let h = Harness::with_notifier(
        at(2026, 2, 1, 10, 0),
        RecordingNotifier::new(Permission::Default, Permission::Denied),
    )
    .await;

    h.engine
        .dispatcher()
        .send_notification("u1", NotificationKind::System, "Hi", "There", None)
        .await
        .unwrap();

    assert_eq!(h.notifier.requests(), 1);
    assert!(h.notifier.shown().is_empty());
    assert_eq!(h.inbox("u1").await.len(), 1);
}

#[tokio::test]
async fn delivery_still_happens_when_persist_fails() {
    let h = Harness::new(at(2026, 2, 1, 10, 0)).await;
    {
        let db = h.store.shared();
        let conn = db.lock().unwrap();
        conn.execute_batch("DROP TABLE notifications").unwrap();
    }

    let result = h
        .engine
        .dispatcher()
        .send_notification("u1", NotificationKind::Reminder, "Dose", "Take it", None)
        .await;

    assert!(result.is_err());
    assert_eq!(h.notifier.shown().len(), 1);
}

#[tokio::test]
async fn inbox_mark_read_and_clear() {
    let h = Harness::new(at(2026, 2, 1, 10, 0)).await;
    let dispatcher = h.engine.dispatcher();

    let first = dispatcher
        .send_notification("u1", NotificationKind::System, "One", "1", None)
        .await
        .unwrap();
    h.clock.set(at(2026, 2, 1, 11, 0));
    dispatcher
        .send_notification("u1", NotificationKind::System, "Two", "2", None)
        .await
        .unwrap();
    dispatcher
        .send_notification("u2", NotificationKind::System, "Other", "3", None)
        .await
        .unwrap();

    dispatcher.mark_read(&first.id).await.unwrap();
    let inbox = dispatcher.list_notifications("u1").await.unwrap();
    let titles: Vec<_> = inbox.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["Two", "One"]);
    assert!(inbox[1].read);
    assert!(!inbox[0].read);

    assert_eq!(dispatcher.clear_notifications("u1").await.unwrap(), 2);
    assert!(dispatcher.list_notifications("u1").await.unwrap().is_empty());
    assert_eq!(dispatcher.list_notifications("u2").await.unwrap().len(), 1);
}

#[tokio::test]
async fn schedule_reminder_rejects_past_and_malformed_times() {
    let h = Harness::new(at(2026, 2, 1, 10, 0)).await;
    let dispatcher = h.engine.dispatcher();

    assert!(dispatcher
        .schedule_reminder("u1", "Aspirin", "09:59", day(2026, 2, 1))
        .is_none());
    assert!(dispatcher
        .schedule_reminder("u1", "Aspirin", "10:00", day(2026, 2, 1))
        .is_none());
    assert!(dispatcher
        .schedule_reminder("u1", "Aspirin", "late", day(2026, 2, 1))
        .is_none());
    assert!(dispatcher
        .schedule_reminder("u1", "Aspirin", "09:00", day(2026, 1, 31))
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn scheduled_reminder_fires_then_escalates() {
    let h = Harness::new(at(2026, 2, 1, 8, 59)).await;
    h.add_medicine(medicine("m1", "u1", "Aspirin", 20, day(2027, 1, 1))).await;
    h.add_schedule(schedule("s1", "m1", "u1", &["09:00"], day(2026, 1, 1))).await;

    let handle = h
        .engine
        .dispatcher()
        .schedule_reminder("u1", "Aspirin", "09:00", day(2026, 2, 1))
        .unwrap();
    handle.await.unwrap();

    let inbox = h.inbox("u1").await;
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::Reminder);
    assert!(h.family.calls().is_empty());

    // Nobody confirms; the grace window runs out.
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_secs(60)).await;
        if !h.family.calls().is_empty() {
            break;
        }
    }
    assert_eq!(
        h.family.calls(),
        vec![("u1".to_string(), "Aspirin".to_string(), "09:00".to_string())]
    );
}
