use bodispatch::datasource::JournalEvent;
use bodispatch::request::RawParameters;
use http::Method;
use serde_json::{json, Value};

mod common;
use common::app;

fn body_json(body: Option<&str>) -> Value {
    serde_json::from_str(body.expect("response body")).unwrap()
}

#[test]
fn test_convention_index_without_routes() {
    let app = app::build(app::config());
    let resp = app.service.handle(Method::GET, "/faq/", RawParameters::default());
    assert_eq!(resp.status, 200);
    assert_eq!(resp.reason, "OK");
    assert_eq!(resp.content_type, "application/json");
    assert_eq!(
        body_json(resp.body.as_deref()),
        json!({ "questions": ["Why?", "How?"] })
    );
    assert!(app.log.entries().is_empty());
}

#[test]
fn test_validation_error_renders_412_payload_without_logging() {
    let app = app::build(app::config());
    let resp = app.service.handle(
        Method::POST,
        "/user/register",
        RawParameters::form("email="),
    );
    assert_eq!(resp.status, 412);
    assert_eq!(
        body_json(resp.body.as_deref()),
        json!({
            "fieldId": "email",
            "type": "required",
            "message": "E-mail is required",
            "label": "E-mail",
        })
    );
    assert!(app.log.entries().is_empty());
}

#[test]
fn test_valid_form_passes_through_handler() {
    let app = app::build(app::config());
    let resp = app.service.handle(
        Method::POST,
        "/user/register",
        RawParameters::form("email=%20ada%40example.com%20"),
    );
    assert_eq!(resp.status, 200);
    assert_eq!(
        body_json(resp.body.as_deref()),
        json!({ "registered": "ada@example.com" })
    );
}

#[test]
fn test_technical_error_rolls_back_and_logs() {
    let app = app::build(app::config());
    let resp = app
        .service
        .handle(Method::POST, "/ledger/crash", RawParameters::default());
    assert_eq!(resp.status, 500);
    assert_eq!(resp.body, None);

    assert_eq!(
        app.store.events("main"),
        vec![
            JournalEvent::Open,
            JournalEvent::Begin,
            JournalEvent::Rollback,
            JournalEvent::Close
        ]
    );
    assert_eq!(app.store.committed("main", "balance"), None);

    let logged = app.log.entries();
    assert_eq!(logged.len(), 1);
    assert!(logged[0].message.contains("ledger out of balance"));
    assert!(!logged[0].trace.is_empty());
}

#[test]
fn test_aspect_plan_break_skips_remaining_steps() {
    let app = app::build(app::config());
    let resp = app.service.handle(
        Method::POST,
        "/user/create",
        RawParameters::form("name=ada"),
    );
    assert_eq!(resp.status, 201);
    // only 200 and 412 carry a body
    assert_eq!(resp.body, None);
    assert_eq!(*app.trail.lock().unwrap(), vec!["validate", "save"]);
    assert_eq!(app.store.committed("main", "user"), Some(json!("ada")));
}

#[test]
fn test_two_sources_commit_before_close() {
    let app = app::build(app::config());
    let resp = app
        .service
        .handle(Method::POST, "/ledger/transfer", RawParameters::default());
    assert_eq!(resp.status, 200);

    for source in ["main", "audit"] {
        assert_eq!(
            app.store.events(source),
            vec![
                JournalEvent::Open,
                JournalEvent::Begin,
                JournalEvent::Commit,
                JournalEvent::Close
            ],
            "source {source}"
        );
    }
    let journal = app.store.journal();
    let last_commit = journal
        .iter()
        .rposition(|e| e.event == JournalEvent::Commit)
        .unwrap();
    let first_close = journal
        .iter()
        .position(|e| e.event == JournalEvent::Close)
        .unwrap();
    assert!(last_commit < first_close);
    assert_eq!(app.store.committed("main", "balance"), Some(json!(90)));
    assert_eq!(app.store.committed("audit", "entry"), Some(json!("transfer 10")));
}

#[test]
fn test_business_error_keeps_code_and_drops_body() {
    let app = app::build(app::config());
    let resp = app
        .service
        .handle(Method::GET, "/ledger/denied", RawParameters::default());
    assert_eq!(resp.status, 403);
    assert_eq!(resp.reason, "Forbidden");
    assert_eq!(resp.body, None);
    assert!(app.log.entries().is_empty());
}

#[test]
fn test_technical_error_keeps_handler_status() {
    let app = app::build(app::config());
    let resp = app
        .service
        .handle(Method::POST, "/ledger/locked", RawParameters::default());
    assert_eq!(resp.status, 503);
    assert_eq!(app.log.entries().len(), 1);
}

#[test]
fn test_panic_is_a_logged_technical_error() {
    let app = app::build(app::config());
    let resp = app
        .service
        .handle(Method::GET, "/ledger/panic", RawParameters::default());
    assert_eq!(resp.status, 500);
    let logged = app.log.entries();
    assert_eq!(logged.len(), 1);
    assert!(logged[0].message.contains("ledger index corrupted"));
}

#[test]
fn test_missing_action_is_404() {
    let app = app::build(app::config());
    // Ledger has no transferGet
    let resp = app
        .service
        .handle(Method::GET, "/ledger/transfer", RawParameters::default());
    assert_eq!(resp.status, 404);
    assert_eq!(resp.body, None);
    assert!(app.log.entries().is_empty());
    assert!(app.store.journal().is_empty());
}

#[test]
fn test_unknown_handler_is_404() {
    let app = app::build(app::config());
    let resp = app
        .service
        .handle(Method::GET, "/nobody/home", RawParameters::default());
    assert_eq!(resp.status, 404);
}

#[test]
fn test_request_id_is_logged_with_error() {
    let app = app::build(app::config());
    let id = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    app.service.handle(
        Method::POST,
        "/ledger/crash",
        RawParameters::default().with_request_id(id),
    );
    let logged = app.log.entries();
    assert_eq!(logged[0].request_id.to_string(), id);
}
