mod common;

use chrono::{Duration, Utc};
use crossterm::event::KeyCode;
use devbills::auth::{Session, SessionStore};
use devbills::cli::state::{
    Effect, FormField, NoticeKind, Tab, MSG_ADDED, MSG_ADD_FAILED, MSG_DELETED, MSG_DELETE_FAILED, MSG_LOAD_FAILED,
    MSG_REQUIRED,
};
use devbills::models::{AuthUser, TransactionType};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{category, press, signed_in_app, transaction, type_text};

async fn mount_transactions(server: &MockServer, month: u32, year: i32, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/transactions"))
        .and(query_param("month", month.to_string()))
        .and(query_param("year", year.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn sign_in_opens_dashboard_and_persists_session() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");

    let app = signed_in_app(&server, Some(file.clone())).await;

    assert_eq!(app.tab, Tab::Dashboard);
    assert_eq!(app.auth.user.as_ref().map(|u| u.label()), Some("Ana"));
    assert!(app.api.has_token());
    assert!(!app.dashboard.loading_summary);
    assert!(app.dashboard.summary_error.is_none());

    let stored = SessionStore::new(Some(file)).load().unwrap();
    assert_eq!(stored.refresh_token, "refresh-1");
}

#[tokio::test]
async fn rejected_credentials_stay_on_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "INVALID_LOGIN_CREDENTIALS"}
        })))
        .mount(&server)
        .await;

    let mut app = common::app(&server, None);
    type_text(&mut app, "ana@example.com");
    press(&mut app, KeyCode::Tab);
    type_text(&mut app, "wrong");
    press(&mut app, KeyCode::Enter);
    assert!(app.auth.loading);
    app.run_effects().await;

    assert_eq!(app.tab, Tab::Login);
    assert!(!app.auth.loading);
    assert!(app.auth.user.is_none());
    assert_eq!(app.auth.error.as_deref(), Some("Invalid email or password"));
    assert!(app.login.password.value.is_empty());
}

#[tokio::test]
async fn empty_login_is_not_sent() {
    let server = MockServer::start().await;
    let mut app = common::app(&server, None);
    press(&mut app, KeyCode::Enter);
    assert!(!app.has_pending());
    assert!(app.auth.error.is_some());
}

#[tokio::test]
async fn month_change_refetches_transactions() {
    let server = MockServer::start().await;
    let mut app = signed_in_app(&server, None).await;

    let now = app.txn.period;
    let next = now.shift_months(1);
    mount_transactions(&server, now.month, now.year, json!([transaction("t1", "Market", 10.0, "expense")])).await;
    mount_transactions(&server, next.month, next.year, json!([
        transaction("t2", "Salary", 5000.0, "income"),
        transaction("t3", "Rent", 1500.0, "expense"),
    ]))
    .await;

    press(&mut app, KeyCode::Char('2'));
    assert_eq!(app.tab, Tab::Transactions);
    assert!(app.txn.loading);
    app.run_effects().await;
    assert_eq!(app.txn.list.len(), 1);
    assert_eq!(app.txn.tsel.selected(), Some(0));

    press(&mut app, KeyCode::Right);
    assert!(app.txn.loading);
    assert_eq!(app.pending().collect::<Vec<_>>(), vec![&Effect::LoadTransactions]);
    app.run_effects().await;

    assert!(!app.txn.loading);
    assert_eq!(app.txn.period, next);
    let ids: Vec<_> = app.txn.list.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["t2", "t3"]);
}

#[tokio::test]
async fn failed_fetch_sets_error_and_retry_recovers() {
    let server = MockServer::start().await;
    let mut app = signed_in_app(&server, None).await;
    let p = app.txn.period;

    Mock::given(method("GET"))
        .and(path("/transactions"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_transactions(&server, p.month, p.year, json!([transaction("t1", "Market", 10.0, "expense")])).await;

    press(&mut app, KeyCode::Char('2'));
    app.run_effects().await;
    assert_eq!(app.txn.error.as_deref(), Some(MSG_LOAD_FAILED));
    assert!(!app.txn.loading);

    press(&mut app, KeyCode::Char('r'));
    assert!(app.txn.error.is_none());
    app.run_effects().await;
    assert!(app.txn.error.is_none());
    assert_eq!(app.txn.list.len(), 1);
}

#[tokio::test]
async fn type_filter_is_sent_to_backend() {
    let server = MockServer::start().await;
    let mut app = signed_in_app(&server, None).await;
    let p = app.txn.period;
    // Mounted first so it wins over the unfiltered mock below.
    Mock::given(method("GET"))
        .and(path("/transactions"))
        .and(query_param("type", "expense"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([transaction("t5", "Bus", 4.4, "expense")])))
        .expect(1)
        .mount(&server)
        .await;
    mount_transactions(&server, p.month, p.year, json!([])).await;

    press(&mut app, KeyCode::Char('2'));
    app.run_effects().await;
    press(&mut app, KeyCode::Char('t'));
    assert_eq!(app.txn.type_filter, Some(TransactionType::Expense));
    app.run_effects().await;
    assert_eq!(app.txn.list[0].id, "t5");
}

#[tokio::test]
async fn search_filters_locally() {
    let server = MockServer::start().await;
    let mut app = signed_in_app(&server, None).await;
    let p = app.txn.period;
    mount_transactions(&server, p.month, p.year, json!([
        transaction("t1", "Supermarket", 10.0, "expense"),
        transaction("t2", "Salary", 5000.0, "income"),
    ]))
    .await;

    press(&mut app, KeyCode::Char('2'));
    app.run_effects().await;
    press(&mut app, KeyCode::Char('/'));
    type_text(&mut app, "SAL");
    press(&mut app, KeyCode::Enter);

    assert!(!app.txn.searching);
    assert!(!app.has_pending());
    let visible: Vec<_> = app.txn.visible().iter().map(|t| t.id.clone()).collect();
    assert_eq!(visible, vec!["t2".to_string()]);
    assert_eq!(app.txn.selected().map(|t| t.id.as_str()), Some("t2"));
}

#[tokio::test]
async fn confirmed_delete_removes_row() {
    let server = MockServer::start().await;
    let mut app = signed_in_app(&server, None).await;
    let p = app.txn.period;
    mount_transactions(&server, p.month, p.year, json!([
        transaction("t1", "Market", 10.0, "expense"),
        transaction("t2", "Cinema", 30.0, "expense"),
    ]))
    .await;
    Mock::given(method("DELETE"))
        .and(path("/transactions/t1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    press(&mut app, KeyCode::Char('2'));
    app.run_effects().await;

    press(&mut app, KeyCode::Char('d'));
    assert_eq!(app.txn.confirm_delete.as_deref(), Some("t1"));
    press(&mut app, KeyCode::Char('y'));
    assert_eq!(app.txn.deleting_id.as_deref(), Some("t1"));
    app.run_effects().await;

    let ids: Vec<_> = app.txn.list.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["t2"]);
    assert!(app.txn.deleting_id.is_none());
    let notice = app.notice.as_ref().unwrap();
    assert_eq!((notice.kind, notice.text.as_str()), (NoticeKind::Success, MSG_DELETED));
}

#[tokio::test]
async fn declined_delete_sends_nothing() {
    let server = MockServer::start().await;
    let mut app = signed_in_app(&server, None).await;
    let p = app.txn.period;
    mount_transactions(&server, p.month, p.year, json!([transaction("t1", "Market", 10.0, "expense")])).await;

    press(&mut app, KeyCode::Char('2'));
    app.run_effects().await;
    press(&mut app, KeyCode::Delete);
    press(&mut app, KeyCode::Esc);

    assert!(app.txn.confirm_delete.is_none());
    assert!(!app.has_pending());
    assert_eq!(app.txn.list.len(), 1);
}

#[tokio::test]
async fn failed_delete_keeps_list() {
    let server = MockServer::start().await;
    let mut app = signed_in_app(&server, None).await;
    let p = app.txn.period;
    mount_transactions(&server, p.month, p.year, json!([transaction("t1", "Market", 10.0, "expense")])).await;
    Mock::given(method("DELETE"))
        .and(path("/transactions/t1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    press(&mut app, KeyCode::Char('2'));
    app.run_effects().await;
    press(&mut app, KeyCode::Char('d'));
    press(&mut app, KeyCode::Char('y'));
    app.run_effects().await;

    assert_eq!(app.txn.list.len(), 1);
    assert!(app.txn.deleting_id.is_none());
    let notice = app.notice.as_ref().unwrap();
    assert_eq!((notice.kind, notice.text.as_str()), (NoticeKind::Error, MSG_DELETE_FAILED));
}

#[tokio::test]
async fn notices_expire() {
    let server = MockServer::start().await;
    let mut app = common::app(&server, None);
    app.notify(NoticeKind::Success, "saved");
    let shown = app.notice.as_ref().unwrap().shown_at;
    app.tick(shown + std::time::Duration::from_secs(1));
    assert!(app.notice.is_some());
    app.tick(shown + std::time::Duration::from_secs(5));
    assert!(app.notice.is_none());
}

async fn mount_categories(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            category("c1", "Food", "expense"),
            category("c2", "Salary", "income"),
            category("c3", "Transport", "expense"),
        ])))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn form_requires_every_field() {
    let server = MockServer::start().await;
    let mut app = signed_in_app(&server, None).await;
    mount_categories(&server).await;

    press(&mut app, KeyCode::Char('3'));
    app.run_effects().await;
    assert_eq!(app.tab, Tab::NewTxn);
    assert_eq!(app.form.filtered_categories().len(), 2);

    press(&mut app, KeyCode::Enter);
    assert_eq!(app.form.error.as_deref(), Some(MSG_REQUIRED));
    assert!(!app.has_pending());
}

#[tokio::test]
async fn switching_type_clears_category() {
    let server = MockServer::start().await;
    let mut app = signed_in_app(&server, None).await;
    mount_categories(&server).await;

    press(&mut app, KeyCode::Char('3'));
    app.run_effects().await;
    // Type -> Description -> Amount -> Date -> Category
    for _ in 0..4 {
        press(&mut app, KeyCode::Tab);
    }
    press(&mut app, KeyCode::Down);
    assert_eq!(app.form.selected_category().map(|c| c.id.as_str()), Some("c1"));

    press(&mut app, KeyCode::Tab);
    press(&mut app, KeyCode::Right);
    assert_eq!(app.form.r#type, TransactionType::Income);
    assert!(app.form.selected_category().is_none());
    let names: Vec<_> = app.form.filtered_categories().iter().map(|c| c.name.clone()).collect();
    assert_eq!(names, vec!["Salary".to_string()]);
}

#[tokio::test]
async fn global_keys_work_outside_text_fields() {
    let server = MockServer::start().await;
    let mut app = signed_in_app(&server, None).await;
    mount_categories(&server).await;

    press(&mut app, KeyCode::Char('3'));
    app.run_effects().await;
    assert_eq!(app.form.focus, FormField::Type);
    press(&mut app, KeyCode::Char('2'));
    assert_eq!(app.tab, Tab::Transactions);

    press(&mut app, KeyCode::Char('3'));
    press(&mut app, KeyCode::Tab);
    assert_eq!(app.form.focus, FormField::Description);
    type_text(&mut app, "q1?");
    assert_eq!(app.form.description.value, "q1?");
    assert_eq!(app.tab, Tab::NewTxn);
    assert!(!app.quit);

    // Description -> Amount -> Date -> Category
    for _ in 0..3 {
        press(&mut app, KeyCode::Tab);
    }
    assert_eq!(app.form.focus, FormField::Category);
    press(&mut app, KeyCode::Char('?'));
    assert_eq!(app.tab, Tab::Help);
    press(&mut app, KeyCode::Esc);
    assert_eq!(app.tab, Tab::NewTxn);
    assert_eq!(app.form.description.value, "q1?");

    press(&mut app, KeyCode::Char('q'));
    assert!(app.quit);
}

#[tokio::test]
async fn non_positive_amount_is_rejected() {
    let server = MockServer::start().await;
    let mut app = signed_in_app(&server, None).await;
    mount_categories(&server).await;

    press(&mut app, KeyCode::Char('3'));
    app.run_effects().await;
    press(&mut app, KeyCode::Tab);
    type_text(&mut app, "Refund");
    press(&mut app, KeyCode::Tab);
    type_text(&mut app, "-5");
    press(&mut app, KeyCode::Tab);
    press(&mut app, KeyCode::Tab);
    press(&mut app, KeyCode::Down);
    press(&mut app, KeyCode::Enter);

    assert_eq!(app.form.error.as_deref(), Some("Amount must be greater than zero."));
    assert!(!app.has_pending());
}

async fn fill_form(app: &mut devbills::cli::state::App) {
    press(app, KeyCode::Char('3'));
    app.run_effects().await;
    press(app, KeyCode::Tab);
    type_text(app, "Groceries");
    press(app, KeyCode::Tab);
    type_text(app, "87,90");
    press(app, KeyCode::Tab);
    app.form.date.set("2024-05-10");
    press(app, KeyCode::Tab);
    press(app, KeyCode::Down);
}

#[tokio::test]
async fn submit_creates_and_returns_to_list() {
    let server = MockServer::start().await;
    let mut app = signed_in_app(&server, None).await;
    mount_categories(&server).await;
    let p = app.txn.period;
    mount_transactions(&server, p.month, p.year, json!([transaction("t7", "Groceries", 87.9, "expense")])).await;
    Mock::given(method("POST"))
        .and(path("/transactions"))
        .and(body_string_contains("\"date\":\"2024-05-10T12:00:00Z\""))
        .and(body_string_contains("\"categoryId\":\"c1\""))
        .respond_with(ResponseTemplate::new(201).set_body_json(transaction("t7", "Groceries", 87.9, "expense")))
        .expect(1)
        .mount(&server)
        .await;

    fill_form(&mut app).await;
    press(&mut app, KeyCode::Enter);
    assert!(app.form.loading);
    app.run_effects().await;

    assert_eq!(app.tab, Tab::Transactions);
    assert_eq!(app.notice.as_ref().map(|n| n.text.as_str()), Some(MSG_ADDED));
    assert!(app.form.description.value.is_empty());
    assert_eq!(app.txn.list[0].id, "t7");
}

#[tokio::test]
async fn failed_submit_keeps_form() {
    let server = MockServer::start().await;
    let mut app = signed_in_app(&server, None).await;
    mount_categories(&server).await;
    Mock::given(method("POST"))
        .and(path("/transactions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "invalid"})))
        .mount(&server)
        .await;

    fill_form(&mut app).await;
    press(&mut app, KeyCode::Enter);
    app.run_effects().await;

    assert_eq!(app.tab, Tab::NewTxn);
    assert!(!app.form.loading);
    assert_eq!(app.form.description.value, "Groceries");
    let notice = app.notice.as_ref().unwrap();
    assert_eq!((notice.kind, notice.text.as_str()), (NoticeKind::Error, MSG_ADD_FAILED));
}

#[tokio::test]
async fn dashboard_fetches_are_independent() {
    let server = MockServer::start().await;
    common::mount_sign_in(&server).await;
    Mock::given(method("GET"))
        .and(path("/transactions/summary"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalIncomes": 10, "totalExpenses": 4, "balance": 6,
            "expenseCategory": [{"categoryId": "c1", "categoryName": "Food", "categoryColor": "#FF0000", "amount": 4}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/transactions/historical"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut app = common::app(&server, None);
    type_text(&mut app, "ana@example.com");
    press(&mut app, KeyCode::Tab);
    type_text(&mut app, "pw");
    press(&mut app, KeyCode::Enter);
    app.run_effects().await;

    assert_eq!(app.dashboard.summary.balance, rust_decimal::Decimal::new(6, 0));
    assert!(app.dashboard.summary_error.is_none());
    assert!(app.dashboard.history_error.is_some());
    assert!(app.dashboard.history.is_empty());
}

fn stored_session(expires_in: Duration) -> Session {
    Session {
        user: AuthUser {
            uid: "u1".into(),
            display_name: Some("Ana".into()),
            email: Some("ana@example.com".into()),
            photo_url: None,
        },
        id_token: "old-id".into(),
        refresh_token: "old-refresh".into(),
        expires_at: Utc::now() + expires_in,
    }
}

#[tokio::test]
async fn stored_session_is_restored_by_refresh() {
    let server = MockServer::start().await;
    common::mount_empty_dashboard(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("refresh_token=old-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_token": "new-id", "refresh_token": "new-refresh", "expires_in": "3600", "user_id": "u1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    SessionStore::new(Some(file.clone())).save(&stored_session(Duration::minutes(-5))).unwrap();

    let mut app = common::app(&server, Some(file.clone()));
    app.restore_stored_session();
    assert!(app.auth.loading);
    app.run_effects().await;

    assert_eq!(app.tab, Tab::Dashboard);
    assert!(app.auth.is_signed_in());
    assert_eq!(app.session.as_ref().map(|s| s.id_token.as_str()), Some("new-id"));
    let stored = SessionStore::new(Some(file)).load().unwrap();
    assert_eq!(stored.refresh_token, "new-refresh");
}

#[tokio::test]
async fn unrestorable_session_is_discarded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "TOKEN_EXPIRED"}
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    SessionStore::new(Some(file.clone())).save(&stored_session(Duration::minutes(30))).unwrap();

    let mut app = common::app(&server, Some(file.clone()));
    app.restore_stored_session();
    app.run_effects().await;

    assert_eq!(app.tab, Tab::Login);
    assert_eq!(app.auth.error.as_deref(), Some("Session expired, sign in again"));
    assert!(!file.exists());
}

fn short_lived_sign_in() -> serde_json::Value {
    let mut body = common::sign_in_body();
    body["expiresIn"] = json!("30");
    body
}

#[tokio::test]
async fn expiring_token_is_refreshed_before_backend_calls() {
    let server = MockServer::start().await;
    common::mount_sign_in_with(&server, short_lived_sign_in()).await;
    common::mount_empty_dashboard(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_token": "id-2", "refresh_token": "refresh-2", "expires_in": "3600", "user_id": "u1"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/transactions"))
        .and(header("authorization", "Bearer id-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([transaction("t1", "Lunch", 20.0, "expense")])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    let mut app = common::app(&server, Some(file.clone()));
    common::submit_login(&mut app);
    app.run_effects().await;
    press(&mut app, KeyCode::Char('2'));
    app.run_effects().await;

    assert_eq!(app.tab, Tab::Transactions);
    assert!(app.txn.error.is_none());
    assert_eq!(app.txn.list.len(), 1);
    assert_eq!(app.session.as_ref().map(|s| s.id_token.as_str()), Some("id-2"));
    assert_eq!(SessionStore::new(Some(file)).load().unwrap().refresh_token, "refresh-2");

    let paths: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    let refreshed = paths.iter().position(|p| p == "/token").unwrap();
    let listed = paths.iter().position(|p| p == "/transactions").unwrap();
    assert!(refreshed < listed, "requests: {paths:?}");
    let first_backend = paths.iter().position(|p| p.starts_with("/transactions")).unwrap();
    assert!(refreshed < first_backend, "requests: {paths:?}");
}

#[tokio::test]
async fn failed_refresh_signs_out_and_forgets_session() {
    let server = MockServer::start().await;
    common::mount_sign_in_with(&server, short_lived_sign_in()).await;
    common::mount_empty_dashboard(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "TOKEN_EXPIRED"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    let mut app = common::app(&server, Some(file.clone()));
    common::submit_login(&mut app);
    app.run_effects().await;

    assert_eq!(app.tab, Tab::Login);
    assert!(app.session.is_none());
    assert!(app.auth.user.is_none());
    assert!(!app.api.has_token());
    assert_eq!(app.auth.error.as_deref(), Some("Session expired, sign in again"));
    assert!(!file.exists());
    assert!(!app.has_pending());

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| !r.url.path().starts_with("/transactions")));
}

#[tokio::test]
async fn unauthorized_response_signs_out() {
    let server = MockServer::start().await;
    let mut app = signed_in_app(&server, None).await;
    Mock::given(method("GET"))
        .and(path("/transactions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "token expired"})))
        .mount(&server)
        .await;

    press(&mut app, KeyCode::Char('2'));
    app.run_effects().await;

    assert_eq!(app.tab, Tab::Login);
    assert!(app.session.is_none());
    assert!(!app.api.has_token());
    assert!(app.txn.list.is_empty());
}

#[tokio::test]
async fn sign_out_clears_everything() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    let mut app = signed_in_app(&server, Some(file.clone())).await;
    assert!(file.exists());

    press(&mut app, KeyCode::Char('L'));
    assert!(app.auth.loading);
    app.run_effects().await;

    assert_eq!(app.tab, Tab::Login);
    assert_eq!(app.auth, devbills::models::AuthState::default());
    assert!(app.session.is_none());
    assert!(!file.exists());
}
