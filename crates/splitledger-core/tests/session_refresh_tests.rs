//! Integration tests for bearer auth, token refresh and logout against a
//! mock backend.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use splitledger_core::api::{ApiError, AuthEvent, LogoutReason, RefreshError, RefreshPhase};
use splitledger_core::auth::{MemoryStorage, Session, SessionStorage, SessionStore};
use splitledger_core::ApiClient;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn envelope(data: Value) -> Value {
    json!({ "statusCode": 200, "data": data, "message": "ok", "success": true })
}

fn session(access_token: &str) -> Session {
    Session {
        access_token: access_token.to_string(),
        refresh_token: "refresh-1".to_string(),
        user_id: "u1".to_string(),
        user_email: "ann@example.com".to_string(),
    }
}

fn logged_in(storage: &Arc<MemoryStorage>) -> SessionStore {
    let store = SessionStore::new(storage.clone());
    store.set(&session("access-1")).unwrap();
    store
}

fn client(server: &MockServer, store: SessionStore) -> ApiClient {
    ApiClient::builder()
        .base_url(format!("{}/api/v1", server.uri()))
        .session(store)
        .build()
        .unwrap()
}

fn expense_json() -> Value {
    json!({ "_id": "e1", "description": "Dinner", "amount": 42.0, "splitBetween": ["u1", "u2"] })
}

async fn mount_expenses(server: &MockServer, token: &str, status: u16, times: u64) {
    let template = if status == 200 {
        ResponseTemplate::new(200).set_body_json(envelope(json!([expense_json()])))
    } else {
        ResponseTemplate::new(status).set_body_string("jwt expired")
    };
    Mock::given(method("GET"))
        .and(path("/api/v1/expense"))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(template)
        .expect(times)
        .mount(server)
        .await;
}

async fn mount_refresh(server: &MockServer, template: ResponseTemplate, times: u64) {
    Mock::given(method("POST"))
        .and(path("/api/v1/users/refresh-token"))
        .and(body_json(json!({ "refreshToken": "refresh-1" })))
        .respond_with(template)
        .expect(times)
        .mount(server)
        .await;
}

fn refresh_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(envelope(
        json!({ "accessToken": "access-2", "refreshToken": "refresh-2" }),
    ))
}

#[tokio::test]
async fn test_request_carries_bearer_token() {
    let server = MockServer::start().await;
    mount_expenses(&server, "access-1", 200, 1).await;

    let storage = Arc::new(MemoryStorage::new());
    let api = client(&server, logged_in(&storage));

    let expenses = api.list_expenses().await.unwrap();
    assert_eq!(expenses.len(), 1);
    assert_eq!(expenses[0].description, "Dinner");
}

#[tokio::test]
async fn test_unauthorized_refreshes_and_retries_once() {
    let server = MockServer::start().await;
    mount_expenses(&server, "access-1", 401, 1).await;
    mount_refresh(&server, refresh_ok(), 1).await;
    mount_expenses(&server, "access-2", 200, 1).await;

    let storage = Arc::new(MemoryStorage::new());
    let store = logged_in(&storage);
    let api = client(&server, store.clone());
    let mut events = api.subscribe();

    let expenses = api.list_expenses().await.unwrap();
    assert_eq!(expenses[0].id, "e1");

    let stored = store.get().unwrap().unwrap();
    assert_eq!(stored.access_token, "access-2");
    assert_eq!(stored.refresh_token, "refresh-2");
    assert_eq!(stored.user_id, "u1");
    assert_eq!(events.try_recv().unwrap(), AuthEvent::TokenRefreshed);
    assert_eq!(api.refresh_phase(), RefreshPhase::Idle);
}

#[tokio::test]
async fn test_failed_refresh_clears_session() {
    let server = MockServer::start().await;
    mount_expenses(&server, "access-1", 401, 1).await;
    mount_refresh(&server, ResponseTemplate::new(401), 1).await;

    let storage = Arc::new(MemoryStorage::new());
    let store = logged_in(&storage);
    let api = client(&server, store.clone());
    let mut events = api.subscribe();

    let err = api.list_expenses().await.unwrap_err();
    assert!(matches!(err, ApiError::SessionExpired(RefreshError::Rejected(401))));
    assert!(err.requires_login());

    assert!(storage.is_empty());
    for key in ["authToken", "refreshToken", "userId", "userEmail"] {
        assert_eq!(storage.get_item(key).unwrap(), None);
    }
    assert_eq!(store.get().unwrap(), None);
    assert_eq!(
        events.try_recv().unwrap(),
        AuthEvent::LoggedOut(LogoutReason::SessionExpired)
    );
    assert_eq!(api.refresh_phase(), RefreshPhase::Idle);
}

#[tokio::test]
async fn test_second_unauthorized_does_not_loop() {
    let server = MockServer::start().await;
    mount_expenses(&server, "access-1", 401, 1).await;
    mount_refresh(&server, refresh_ok(), 1).await;
    mount_expenses(&server, "access-2", 401, 1).await;

    let storage = Arc::new(MemoryStorage::new());
    let store = logged_in(&storage);
    let api = client(&server, store.clone());

    let err = api.list_expenses().await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));

    // The renewed session is kept; only the request failed
    assert_eq!(store.access_token().unwrap().as_deref(), Some("access-2"));
}

#[tokio::test]
async fn test_concurrent_unauthorized_share_one_refresh() {
    const REQUESTS: u64 = 5;

    let server = MockServer::start().await;
    mount_expenses(&server, "access-1", 401, REQUESTS).await;
    mount_refresh(&server, refresh_ok().set_delay(Duration::from_millis(200)), 1).await;
    mount_expenses(&server, "access-2", 200, REQUESTS).await;

    let storage = Arc::new(MemoryStorage::new());
    let api = client(&server, logged_in(&storage));

    let calls = (0..REQUESTS).map(|_| api.list_expenses());
    let results = futures::future::join_all(calls).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(api.refresh_phase(), RefreshPhase::Idle);
    server.verify().await;
}

#[tokio::test]
async fn test_missing_refresh_token_fails_without_renewal_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/expense"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, refresh_ok(), 0).await;

    let api = client(&server, SessionStore::in_memory());
    let err = api.list_expenses().await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::SessionExpired(RefreshError::MissingRefreshToken)
    ));
}

#[tokio::test]
async fn test_other_errors_propagate_without_refresh() {
    let server = MockServer::start().await;
    mount_expenses(&server, "access-1", 500, 1).await;
    mount_refresh(&server, refresh_ok(), 0).await;

    let storage = Arc::new(MemoryStorage::new());
    let store = logged_in(&storage);
    let api = client(&server, store.clone());

    let err = api.list_expenses().await.unwrap_err();
    assert!(matches!(err, ApiError::ServerError(body) if body == "jwt expired"));
    assert!(store.is_authenticated());
}

#[tokio::test]
async fn test_logout_clears_session_and_drops_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/users/logout"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({}))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/group"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([]))))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let api = client(&server, logged_in(&storage));
    let mut events = api.subscribe();

    api.logout().await.unwrap();
    assert!(storage.is_empty());
    assert_eq!(
        events.try_recv().unwrap(),
        AuthEvent::LoggedOut(LogoutReason::UserRequested)
    );

    let groups = api.list_groups().await.unwrap();
    assert!(groups.is_empty());

    let received = server.received_requests().await.unwrap();
    let group_request = received
        .iter()
        .find(|r| r.url.path() == "/api/v1/group")
        .unwrap();
    assert!(group_request.headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_logout_survives_backend_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/users/logout"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let api = client(&server, logged_in(&storage));

    api.logout().await.unwrap();
    assert!(storage.is_empty());
}

#[tokio::test]
async fn test_partial_session_sends_no_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/expense"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([]))))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    storage.set_item("authToken", "orphan").unwrap();
    let api = client(&server, SessionStore::new(storage.clone()));

    api.list_expenses().await.unwrap();

    let received = server.received_requests().await.unwrap();
    assert!(received[0].headers.get("authorization").is_none());
    assert!(storage.is_empty());
}

#[tokio::test]
async fn test_send_retry_keeps_headers_and_body() {
    let server = MockServer::start().await;
    let body = json!({ "description": "Taxi", "amount": 18.5, "splitBetween": ["u1"] });
    Mock::given(method("POST"))
        .and(path("/api/v1/expense"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, refresh_ok(), 1).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/expense"))
        .and(header("authorization", "Bearer access-2"))
        .and(header("x-client-request", "req-42"))
        .and(body_json(body.clone()))
        .respond_with(ResponseTemplate::new(201).set_body_json(envelope(expense_json())))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let api = client(&server, logged_in(&storage));

    let mut headers = HeaderMap::new();
    headers.insert("x-client-request", HeaderValue::from_static("req-42"));
    let response = api
        .send(Method::POST, "/expense", Some(&body), Some(&headers))
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let received = server.received_requests().await.unwrap();
    let expense_requests: Vec<_> = received
        .iter()
        .filter(|r| r.url.path() == "/api/v1/expense")
        .collect();
    assert_eq!(expense_requests.len(), 2);
    for request in expense_requests {
        assert_eq!(request.headers.get("x-client-request").unwrap(), "req-42");
        assert_eq!(serde_json::from_slice::<Value>(&request.body).unwrap(), body);
    }
}

#[tokio::test]
async fn test_refresh_completes_after_caller_is_dropped() {
    let server = MockServer::start().await;
    mount_expenses(&server, "access-1", 401, 1).await;
    mount_refresh(&server, refresh_ok().set_delay(Duration::from_millis(100)), 1).await;
    mount_expenses(&server, "access-2", 200, 1).await;

    let storage = Arc::new(MemoryStorage::new());
    let store = logged_in(&storage);
    let api = ApiClient::builder()
        .base_url(format!("{}/api/v1", server.uri()))
        .session(store.clone())
        .timeout(Duration::from_millis(500))
        .build()
        .unwrap();

    // Give up while the renewal is still in flight
    let abandoned = tokio::time::timeout(Duration::from_millis(50), api.list_expenses()).await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(api.refresh_phase(), RefreshPhase::Idle);
    assert_eq!(store.access_token().unwrap().as_deref(), Some("access-2"));

    let expenses = api.list_expenses().await.unwrap();
    assert_eq!(expenses.len(), 1);
    server.verify().await;
}

#[tokio::test]
async fn test_logout_during_refresh_stays_logged_out() {
    let server = MockServer::start().await;
    mount_expenses(&server, "access-1", 401, 1).await;
    mount_refresh(&server, refresh_ok().set_delay(Duration::from_millis(200)), 1).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/users/logout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({}))))
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let store = logged_in(&storage);
    let api = client(&server, store.clone());
    let mut events = api.subscribe();

    let (result, logout) = tokio::join!(api.list_expenses(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        api.logout().await
    });
    logout.unwrap();

    assert!(matches!(
        result,
        Err(ApiError::SessionExpired(RefreshError::MissingRefreshToken))
    ));
    assert_eq!(store.get().unwrap(), None);
    assert!(storage.is_empty());

    // Only the user's own logout is reported
    assert_eq!(
        events.try_recv().unwrap(),
        AuthEvent::LoggedOut(LogoutReason::UserRequested)
    );
    assert!(events.try_recv().is_err());
}
