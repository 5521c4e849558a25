use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use chrono::NaiveDate;
use serde_json::{Value, json};
use tower::ServiceExt;

use roomdesk::api::{AppState, build_router};
use roomdesk::backup::BackupManager;
use roomdesk::booking::BookingService;
use roomdesk::engine::Engine;
use roomdesk::limits::MAX_BOOKINGS_PER_DAY;
use roomdesk::model::{NewBooking, RoomId};
use roomdesk::validate::ExtensionPolicy;

fn test_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("roomdesk_test_http").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn test_app(name: &str, admin_password: Option<&str>) -> (Router, Arc<Engine>) {
    let dir = test_dir(name);
    let engine = Arc::new(Engine::new(dir.join("bookings.wal")).unwrap());
    let state = AppState {
        service: Arc::new(BookingService::new(engine.clone(), ExtensionPolicy::allow_any())),
        backups: Arc::new(BackupManager::new(dir.join("backups"), 30)),
        engine: engine.clone(),
        admin_password: admin_password.map(Arc::from),
    };
    (build_router(state, &["http://localhost:3000".to_string()]), engine)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn create_body(room: &str, date: &str, slot: &str) -> Value {
    json!({
        "roomId": room,
        "date": date,
        "timeSlot": slot,
        "booker": "Morgan",
        "extension": "321",
    })
}

async fn seed(engine: &Engine, room_id: RoomId, date: &str, slot: &str) -> u64 {
    engine
        .insert_booking(NewBooking {
            room_id,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            time_slot: slot.into(),
            booker: "Morgan".into(),
            extension: "321".into(),
            title: None,
            recurring_group_id: None,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn health_is_ok() {
    let (app, _engine) = test_app("health", None);
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn create_then_conflict_then_force() {
    let (app, _engine) = test_app("create_conflict", None);

    let (status, body) = send(&app, Method::POST, "/booking/create", Some(create_body("A", "2099-03-02", "09:00-10:00"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["booking"]["orderIndex"], 1);
    assert_eq!(body["booking"]["roomId"], "A");
    assert_eq!(body["booking"]["date"], "2099-03-02");
    let first_id = body["booking"]["id"].clone();

    let (status, body) = send(&app, Method::POST, "/booking/create", Some(create_body("A", "2099-03-02", "09:00-10:00"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["conflicts"].as_array().unwrap().len(), 1);
    assert_eq!(body["conflicts"][0]["id"], first_id);

    let mut forced = create_body("A", "2099-03-02", "09:00-10:00");
    forced["forceBook"] = json!(true);
    let (status, body) = send(&app, Method::POST, "/booking/create", Some(forced)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["booking"]["orderIndex"], 2);
}

#[tokio::test]
async fn create_validation_names_field() {
    let (app, _engine) = test_app("create_validation", None);

    let mut body = create_body("A", "2099-03-02", "09:00-10:00");
    body["extension"] = json!("12");
    let (status, resp) = send(&app, Method::POST, "/booking/create", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["success"], false);
    assert_eq!(resp["field"], "extension");

    let mut body = create_body("A", "2099-03-02", "09:00-10:00");
    body["booker"] = json!("A");
    let (status, resp) = send(&app, Method::POST, "/booking/create", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["field"], "booker");

    let (status, resp) = send(&app, Method::POST, "/booking/create", Some(create_body("Z", "2099-03-02", "09:00-10:00"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["field"], "roomId");

    let (status, resp) = send(&app, Method::POST, "/booking/create", Some(create_body("A", "2020-01-01", "09:00-10:00"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["success"], false);
}

async fn fill_day(engine: &Engine, room_id: RoomId, date: &str) {
    for _ in 0..MAX_BOOKINGS_PER_DAY {
        seed(engine, room_id, date, "09:00-10:00").await;
    }
}

#[tokio::test]
async fn full_day_is_refused_with_clear_message() {
    let (app, engine) = test_app("full_day", None);
    fill_day(&engine, RoomId::A, "2099-01-05").await;

    let mut body = create_body("A", "2099-01-05", "10:00-11:00");
    body["force"] = json!(true);
    let (status, resp) = send(&app, Method::POST, "/booking/create", Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(resp["success"], false);
    assert_eq!(resp["message"], "this room is fully booked on this date");
    assert_eq!(engine.booking_count(), MAX_BOOKINGS_PER_DAY);

    // Other room, same date is unaffected.
    let (status, _) = send(&app, Method::POST, "/booking/create", Some(create_body("B", "2099-01-05", "10:00-11:00"))).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn series_stops_at_full_day_and_reports_progress() {
    let (app, engine) = test_app("full_day_series", None);
    fill_day(&engine, RoomId::A, "2099-01-06").await;

    let mut body = create_body("A", "2099-01-05", "10:00-11:00");
    body["recurring"] = json!({ "enabled": true, "type": "daily", "endDate": "2099-01-07" });
    let (status, resp) = send(&app, Method::POST, "/booking/create", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(resp["requested"], 3);
    assert_eq!(resp["created"], 1);
    assert_eq!(resp["bookings"][0]["date"], "2099-01-05");
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let (app, _engine) = test_app("malformed_json", None);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/booking/create")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn weekly_series_and_recurring_count() {
    let (app, _engine) = test_app("weekly_series", None);
    let mut body = create_body("B", "2099-01-01", "14:00-15:00");
    body["title"] = json!("Sync");
    body["recurring"] = json!({ "enabled": true, "type": "weekly", "endDate": "2099-01-22" });

    let (status, resp) = send(&app, Method::POST, "/booking/create", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(resp["requested"], 4);
    assert_eq!(resp["created"], 4);
    let dates: Vec<&str> = resp["bookings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["date"].as_str().unwrap())
        .collect();
    assert_eq!(dates, vec!["2099-01-01", "2099-01-08", "2099-01-15", "2099-01-22"]);
    let group = resp["recurringGroupId"].as_str().unwrap().to_string();
    assert!(resp["bookings"]
        .as_array()
        .unwrap()
        .iter()
        .all(|b| b["recurringGroupId"] == group.as_str() && b["orderIndex"] == 1));

    let (status, resp) = send(&app, Method::GET, &format!("/bookings/recurring-count?groupId={group}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["count"], 4);

    let (status, resp) = send(&app, Method::GET, "/bookings/recurring-count", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["field"], "groupId");
}

#[tokio::test]
async fn delete_checks_extension_and_date() {
    let (app, engine) = test_app("delete_checks", None);
    let future = seed(&engine, RoomId::A, "2099-05-05", "09:00-10:00").await;
    let past = seed(&engine, RoomId::A, "2000-05-05", "09:00-10:00").await;

    let (status, _) = send(
        &app,
        Method::DELETE,
        "/booking/delete",
        Some(json!({ "bookingId": future, "extension": "999" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::DELETE,
        "/booking/delete",
        Some(json!({ "bookingId": past, "extension": "321" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(engine.booking_count(), 2);

    let (status, resp) = send(
        &app,
        Method::DELETE,
        "/booking/delete",
        Some(json!({ "bookingId": future, "extension": " 321 " })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["deletedCount"], 1);

    let (status, _) = send(
        &app,
        Method::DELETE,
        "/booking/delete",
        Some(json!({ "bookingId": future, "extension": "321" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_all_skips_past_members() {
    let (app, engine) = test_app("delete_all", None);
    let group = Some("rec-mixed".to_string());
    let mut ids = Vec::new();
    for date in ["2000-01-03", "2099-01-03", "2099-01-10", "2099-01-17"] {
        let b = engine
            .insert_booking(NewBooking {
                room_id: RoomId::B,
                date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
                time_slot: "10:00-11:00".into(),
                booker: "Morgan".into(),
                extension: "321".into(),
                title: None,
                recurring_group_id: group.clone(),
            })
            .await
            .unwrap();
        ids.push(b.id);
    }

    let (status, resp) = send(
        &app,
        Method::DELETE,
        "/booking/delete",
        Some(json!({ "bookingId": ids[1], "extension": "321", "deleteAll": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["deletedCount"], 3);
    assert_eq!(engine.booking_count(), 1);
    assert!(engine.get_booking(ids[0]).await.is_some());
}

#[tokio::test]
async fn list_by_month_filters_and_sorts() {
    let (app, engine) = test_app("list_month", None);
    seed(&engine, RoomId::A, "2025-09-15", "10:00-11:00").await;
    seed(&engine, RoomId::A, "2025-09-02", "09:00-10:00").await;
    seed(&engine, RoomId::A, "2025-09-15", "09:00-10:00").await;
    seed(&engine, RoomId::A, "2025-10-01", "09:00-10:00").await;
    seed(&engine, RoomId::B, "2025-09-15", "09:00-10:00").await;

    let (status, resp) = send(&app, Method::GET, "/bookings?roomId=A&date=2025-09", None).await;
    assert_eq!(status, StatusCode::OK);
    let rows: Vec<(String, String)> = resp["bookings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| {
            (
                b["date"].as_str().unwrap().to_string(),
                b["timeSlot"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        rows,
        vec![
            ("2025-09-02".to_string(), "09:00-10:00".to_string()),
            ("2025-09-15".to_string(), "09:00-10:00".to_string()),
            ("2025-09-15".to_string(), "10:00-11:00".to_string()),
        ]
    );

    let (_, resp) = send(&app, Method::GET, "/bookings?roomId=A&date=2025-09-15", None).await;
    assert_eq!(resp["bookings"].as_array().unwrap().len(), 2);
    let (_, resp) = send(&app, Method::GET, "/bookings?roomId=A", None).await;
    assert_eq!(resp["bookings"].as_array().unwrap().len(), 4);

    let (status, _) = send(&app, Method::GET, "/bookings?roomId=C", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, Method::GET, "/bookings?roomId=A&date=2025", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_clear_requires_configured_password() {
    let (app, engine) = test_app("admin_clear_disabled", None);
    seed(&engine, RoomId::A, "2099-01-01", "09:00-10:00").await;
    let (status, _) = send(&app, Method::POST, "/admin/clear-bookings", Some(json!({ "password": "" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(engine.booking_count(), 1);

    let (app, engine) = test_app("admin_clear_enabled", Some("s3cret"));
    seed(&engine, RoomId::A, "2099-01-01", "09:00-10:00").await;
    seed(&engine, RoomId::B, "2099-01-01", "09:00-10:00").await;
    let (status, _) = send(&app, Method::POST, "/admin/clear-bookings", Some(json!({ "password": "guess" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, resp) = send(&app, Method::POST, "/admin/clear-bookings", Some(json!({ "password": "s3cret" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["deletedCount"], 2);
    assert_eq!(engine.booking_count(), 0);
}

#[tokio::test]
async fn backup_failure_hides_cause() {
    let dir = test_dir("backup_failure");
    let engine = Arc::new(Engine::new(dir.join("bookings.wal")).unwrap());
    // A regular file where the backup directory should be.
    let blocker = dir.join("backups");
    std::fs::write(&blocker, b"not a directory").unwrap();
    let state = AppState {
        service: Arc::new(BookingService::new(engine.clone(), ExtensionPolicy::allow_any())),
        backups: Arc::new(BackupManager::new(blocker, 30)),
        engine,
        admin_password: None,
    };
    let app = build_router(state, &[]);

    let (status, resp) = send(&app, Method::POST, "/backup", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp["success"], false);
    assert_eq!(resp["message"], "something went wrong, please try again later");
}

#[tokio::test]
async fn backup_endpoints() {
    let (app, engine) = test_app("backups", None);
    seed(&engine, RoomId::A, "2099-01-01", "09:00-10:00").await;

    let (status, resp) = send(&app, Method::GET, "/backup-status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["totalBackups"], 0);
    assert_eq!(resp["latestBackup"], Value::Null);
    assert_eq!(resp["retentionDays"], 30);

    let (status, resp) = send(&app, Method::POST, "/backup", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["success"], true);
    let filename = resp["filename"].as_str().unwrap().to_string();
    assert!(filename.starts_with("booking_backup_") && filename.ends_with(".wal"));

    let (status, resp) = send(&app, Method::GET, "/backup", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["backups"][0]["filename"], filename.as_str());
    assert!(resp["backups"][0]["size"].as_u64().unwrap() > 0);

    let (_, resp) = send(&app, Method::GET, "/backup-status", None).await;
    assert_eq!(resp["totalBackups"], 1);
    assert_eq!(resp["latestBackup"]["filename"], filename.as_str());

    let (status, resp) = send(&app, Method::DELETE, "/backup", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["deletedCount"], 0);
}
