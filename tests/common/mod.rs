#![allow(dead_code)]

use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use devbills::auth::{IdentityClient, SessionStore};
use devbills::cli::api::Client;
use devbills::cli::state::App;
use serde_json::{json, Value};
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API_KEY: &str = "test-key";

pub fn api_client(server: &MockServer, token: Option<&str>) -> Client {
    let mut client = Client::new(reqwest::Client::new(), Url::parse(&server.uri()).unwrap());
    client.set_token(token.map(str::to_string));
    client
}

pub fn identity(server: &MockServer) -> IdentityClient {
    IdentityClient::new(
        reqwest::Client::new(),
        Url::parse(&format!("{}/v1", server.uri())).unwrap(),
        Url::parse(&format!("{}/token", server.uri())).unwrap(),
        Some(API_KEY.to_string()),
    )
}

pub fn app(server: &MockServer, session_file: Option<PathBuf>) -> App {
    App::new(api_client(server, None), identity(server), SessionStore::new(session_file))
}

pub fn press(app: &mut App, code: KeyCode) {
    app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
}

pub fn type_text(app: &mut App, text: &str) {
    for c in text.chars() {
        press(app, KeyCode::Char(c));
    }
}

/// Fills the login form and presses Enter; effects are left queued.
pub fn submit_login(app: &mut App) {
    type_text(app, "ana@example.com");
    press(app, KeyCode::Tab);
    type_text(app, "hunter2");
    press(app, KeyCode::Enter);
}

pub fn sign_in_body() -> Value {
    json!({
        "localId": "u1",
        "email": "ana@example.com",
        "displayName": "Ana",
        "idToken": "id-1",
        "refreshToken": "refresh-1",
        "expiresIn": "3600"
    })
}

pub fn category(id: &str, name: &str, kind: &str) -> Value {
    json!({"id": id, "name": name, "color": "#22AA44", "type": kind})
}

pub fn transaction(id: &str, description: &str, amount: f64, kind: &str) -> Value {
    json!({
        "id": id,
        "userId": "u1",
        "description": description,
        "amount": amount,
        "date": "2024-05-10T12:00:00.000Z",
        "categoryId": "c1",
        "category": category("c1", "Food", kind),
        "type": kind
    })
}

pub async fn mount_sign_in(server: &MockServer) {
    mount_sign_in_with(server, sign_in_body()).await;
}

pub async fn mount_sign_in_with(server: &MockServer, body: Value) {
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .and(query_param("key", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Empty dashboard data for any month.
pub async fn mount_empty_dashboard(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/transactions/summary"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalIncomes": 0, "totalExpenses": 0, "balance": 0, "expenseCategory": []
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/transactions/historical"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"history": []})))
        .mount(server)
        .await;
}

/// Drives the login form and runs the resulting effects.
pub async fn signed_in_app(server: &MockServer, session_file: Option<PathBuf>) -> App {
    mount_sign_in(server).await;
    mount_empty_dashboard(server).await;
    let mut app = app(server, session_file);
    submit_login(&mut app);
    app.run_effects().await;
    assert!(app.auth.is_signed_in(), "sign-in failed: {:?}", app.auth.error);
    app
}
