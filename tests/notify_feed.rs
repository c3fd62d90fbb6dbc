//! End-to-end change-feed behaviour through the company manager: a viewer
//! subscribes to a company, another task mutates the rota, and the viewer
//! re-fetches state when the feed fires. Companies must not leak events
//! into each other's feeds.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use ulid::Ulid;

use rota::company::CompanyManager;
use rota::holidays::HolidayCalendar;
use rota::model::Event;

fn test_data_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join("rota_test_feed").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

#[tokio::test]
async fn feed_drives_refetch() {
    let cm = CompanyManager::new(
        test_data_dir("refetch"),
        1000,
        Arc::new(HolidayCalendar::none()),
    );
    let engine = cm.get_or_create("acme").unwrap();

    let emp = Ulid::new();
    engine
        .register_employee(emp, "Priya".into(), Some("Kitchen".into()), d(2024, 3, 1))
        .await
        .unwrap();

    let mut feed = cm.subscribe("acme").unwrap();

    // Writer task commits a shift while the viewer waits on the feed
    let writer_engine = engine.clone();
    let sid = Ulid::new();
    let writer = tokio::spawn(async move {
        writer_engine
            .create_shift(sid, emp, d(2025, 6, 2), t(9, 0), t(17, 0), 30, None)
            .await
            .unwrap();
    });

    let event = tokio::time::timeout(Duration::from_secs(5), feed.recv())
        .await
        .expect("feed delivery timed out")
        .unwrap();
    match event {
        Event::ShiftCreated { id, .. } => assert_eq!(id, sid),
        other => panic!("unexpected event: {other:?}"),
    }
    writer.await.unwrap();

    // The re-fetch pattern: the event is only a tap on the shoulder, the
    // authoritative state comes from a fresh read.
    let day = engine.company_shifts_on(d(2025, 6, 2)).await;
    assert_eq!(day.len(), 1);
    assert_eq!(day[0].id, sid);
    assert_eq!(day[0].break_minutes, 30);
}

#[tokio::test]
async fn feeds_are_isolated_per_company() {
    let cm = CompanyManager::new(
        test_data_dir("isolated"),
        1000,
        Arc::new(HolidayCalendar::none()),
    );
    let acme = cm.get_or_create("acme").unwrap();
    let globex = cm.get_or_create("globex").unwrap();

    let mut acme_feed = cm.subscribe("acme").unwrap();
    let mut globex_feed = cm.subscribe("globex").unwrap();

    let emp = Ulid::new();
    acme.register_employee(emp, "Priya".into(), None, d(2024, 3, 1))
        .await
        .unwrap();

    // Acme's feed sees the registration
    let event = tokio::time::timeout(Duration::from_secs(5), acme_feed.recv())
        .await
        .expect("feed delivery timed out")
        .unwrap();
    assert!(matches!(event, Event::EmployeeRegistered { id, .. } if id == emp));

    // Globex's feed stays silent
    assert!(
        tokio::time::timeout(Duration::from_millis(200), globex_feed.recv())
            .await
            .is_err()
    );
    drop(globex);
}

#[tokio::test]
async fn multiple_subscribers_see_the_same_commit() {
    let cm = CompanyManager::new(
        test_data_dir("fanout"),
        1000,
        Arc::new(HolidayCalendar::none()),
    );
    let engine = cm.get_or_create("acme").unwrap();
    let emp = Ulid::new();
    engine
        .register_employee(emp, "Priya".into(), None, d(2024, 3, 1))
        .await
        .unwrap();

    let mut feeds: Vec<_> = (0..3).map(|_| cm.subscribe("acme").unwrap()).collect();

    let lid = Ulid::new();
    engine
        .create_leave_request(
            lid,
            emp,
            rota::model::LeaveType::Annual,
            d(2025, 7, 1),
            d(2025, 7, 5),
            None,
        )
        .await
        .unwrap();

    for feed in &mut feeds {
        let event = tokio::time::timeout(Duration::from_secs(5), feed.recv())
            .await
            .expect("feed delivery timed out")
            .unwrap();
        assert!(matches!(event, Event::LeaveRequested { id, .. } if id == lid));
    }
}
