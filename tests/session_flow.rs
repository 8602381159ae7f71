//! Session store tests
//!
//! Login, registration, logout, restore and profile updates against a
//! mocked backend, including the global 401 policy.

use skillspotter_sdk::storage::{MemoryStorage, StorageBackend};
use skillspotter_sdk::{
    ApiError, AuthStatus, ClientOptions, ConfigResolver, CredentialStore, NavigationQueue,
    ProfileUpdate, SessionStore, SkillSpotterClient, SkillSpotterError,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

struct Harness {
    client: SkillSpotterClient,
    session: SessionStore,
    storage: Arc<MemoryStorage>,
    navigator: Arc<NavigationQueue>,
}

fn harness(server: &MockServer) -> Harness {
    let storage = Arc::new(MemoryStorage::new());
    let navigator = Arc::new(NavigationQueue::new());
    let resolver = Arc::new(ConfigResolver::fixed(format!("{}/api", server.uri())));
    let client = SkillSpotterClient::builder(resolver)
        .storage(storage.clone())
        .navigator(navigator.clone())
        .options(ClientOptions::new().with_probe_retries(0, Duration::from_millis(1)))
        .build()
        .unwrap();
    let session = SessionStore::new(&client);
    Harness {
        client,
        session,
        storage,
        navigator,
    }
}

async fn persisted_token(storage: &Arc<MemoryStorage>) -> Option<String> {
    CredentialStore::new(storage.clone() as Arc<dyn StorageBackend>)
        .peek_persisted()
        .await
        .unwrap()
}

async fn mount_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"email": "ada@example.com", "password": "secret1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {"id": 1, "name": "Ada", "email": "ada@example.com", "role": "user"},
            "token": token
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_persists_token_and_sets_user() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server, "t1").await;
    let h = harness(&mock_server);

    let user = h.session.login("ada@example.com", "secret1").await.unwrap();

    assert_eq!(user.id, "1");
    assert!(h.session.is_authenticated());
    assert!(!h.session.is_admin());
    assert_eq!(persisted_token(&h.storage).await.as_deref(), Some("t1"));

    let snapshot = h.session.snapshot();
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.last_error, None);
}

#[tokio::test]
async fn test_login_rejected_leaves_state_untouched() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid email or password"})),
        )
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server);
    let err = h.session.login("ada@example.com", "wrong1").await.unwrap_err();

    match err {
        SkillSpotterError::InvalidCredentials(msg) => assert_eq!(msg, "Invalid email or password"),
        other => panic!("Expected InvalidCredentials, got {:?}", other),
    }
    assert!(!h.session.is_authenticated());
    assert_eq!(persisted_token(&h.storage).await, None);
    assert_eq!(
        h.session.snapshot().last_error.as_deref(),
        Some("Invalid email or password")
    );
}

#[tokio::test]
async fn test_register_validates_locally_before_sending() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server);
    let err = h
        .session
        .register("Ada", "not-an-email", "123")
        .await
        .unwrap_err();

    assert!(matches!(err, SkillSpotterError::Input(_)));
    assert!(!h.session.is_authenticated());
}

#[tokio::test]
async fn test_register_success_logs_in() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .and(body_json(json!({"name": "Ada", "email": "ada@example.com", "password": "secret1"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "user": {"userId": "u-9", "name": "Ada", "email": "ada@example.com"},
            "token": "t9"
        })))
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server);
    let user = h
        .session
        .register("Ada", "ada@example.com", "secret1")
        .await
        .unwrap();

    assert_eq!(user.id, "u-9");
    assert!(h.session.is_authenticated());
    assert_eq!(persisted_token(&h.storage).await.as_deref(), Some("t9"));
}

#[tokio::test]
async fn test_register_duplicate_email_is_validation_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"message": "Email already registered"})),
        )
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server);
    let err = h
        .session
        .register("Ada", "ada@example.com", "secret1")
        .await
        .unwrap_err();

    assert!(matches!(err, SkillSpotterError::Validation(ref m) if m == "Email already registered"));
}

#[tokio::test]
async fn test_logout_clears_even_when_backend_fails() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server, "t1").await;

    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server);
    h.session.login("ada@example.com", "secret1").await.unwrap();

    h.session.logout().await.unwrap();

    assert!(!h.session.is_authenticated());
    assert_eq!(h.session.snapshot().status, AuthStatus::Anonymous);
    assert_eq!(persisted_token(&h.storage).await, None);
    assert!(!h.client.credentials().is_present());
}

#[tokio::test]
async fn test_401_on_protected_endpoint_revokes_and_redirects() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server, "t1").await;

    Mock::given(method("GET"))
        .and(path("/api/resumes/42"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Token expired"})))
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server);
    h.session.login("ada@example.com", "secret1").await.unwrap();
    let mut updates = h.session.subscribe();

    let err = h.client.get_resume("42").await.unwrap_err();

    assert!(matches!(
        err,
        SkillSpotterError::Api(ApiError::Unauthorized { .. })
    ));
    assert_eq!(h.navigator.drain(), vec!["/login".to_string()]);
    assert!(!h.session.is_authenticated());
    assert_eq!(persisted_token(&h.storage).await, None);

    // Subscribers observe the forced logout
    assert!(updates.has_changed().unwrap());
    assert_eq!(updates.borrow_and_update().status, AuthStatus::Anonymous);
}

#[tokio::test]
async fn test_restore_with_accepted_credential() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("Authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "7", "name": "Grace", "email": "grace@example.com", "role": "admin"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server);
    CredentialStore::new(h.storage.clone())
        .save("t1")
        .await
        .unwrap();

    assert_eq!(h.session.snapshot().status, AuthStatus::Unknown);
    let session = h.session.restore().await;

    assert!(matches!(session.status, AuthStatus::Authenticated(ref u) if u.id == "7"));
    assert!(h.session.is_admin());
    assert!(!session.is_loading);
}

#[tokio::test]
async fn test_restore_with_rejected_credential_clears_storage() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid token"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server);
    CredentialStore::new(h.storage.clone())
        .save("stale")
        .await
        .unwrap();

    let session = h.session.restore().await;

    assert_eq!(session.status, AuthStatus::Anonymous);
    assert!(session.last_error.is_some());
    assert_eq!(persisted_token(&h.storage).await, None);
    // The probe is exempt from the login redirect
    assert!(h.navigator.is_empty());
}

#[tokio::test]
async fn test_restore_without_credential_skips_probe() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server);
    let session = h.session.restore().await;

    assert_eq!(session.status, AuthStatus::Anonymous);
    assert_eq!(session.last_error, None);
}

#[tokio::test]
async fn test_update_profile_merges_returned_fields() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server, "t1").await;

    Mock::given(method("PUT"))
        .and(path("/api/auth/profile"))
        .and(header("Authorization", "Bearer t1"))
        .and(body_json(json!({"name": "Ada L"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Ada L"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server);
    h.session.login("ada@example.com", "secret1").await.unwrap();

    let user = h
        .session
        .update_profile(ProfileUpdate::name("Ada L"))
        .await
        .unwrap();

    assert_eq!(user.name, "Ada L");
    assert_eq!(user.email, "ada@example.com");
    assert_eq!(h.session.current_user().unwrap().name, "Ada L");
}

#[tokio::test]
async fn test_update_profile_rejects_response_without_user_fields() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server, "t1").await;

    Mock::given(method("PUT"))
        .and(path("/api/auth/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Profile updated",
            "user": {"name": "New Name"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server);
    h.session.login("ada@example.com", "secret1").await.unwrap();

    let err = h
        .session
        .update_profile(ProfileUpdate::name("New Name"))
        .await
        .unwrap_err();

    assert!(matches!(err, SkillSpotterError::Api(ApiError::Schema(_))));
    // The session keeps the previous user untouched
    assert_eq!(h.session.current_user().unwrap().name, "Ada");
    assert!(h.session.is_authenticated());
    assert!(h.session.snapshot().last_error.is_some());
}

#[tokio::test]
async fn test_update_profile_requires_session() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/auth/profile"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server);
    let err = h
        .session
        .update_profile(ProfileUpdate::name("Nobody"))
        .await
        .unwrap_err();

    assert!(matches!(err, SkillSpotterError::Unauthorized));
}

#[tokio::test]
async fn test_change_password_sends_both_passwords() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server, "t1").await;

    Mock::given(method("PUT"))
        .and(path("/api/auth/change-password"))
        .and(body_json(json!({"currentPassword": "secret1", "newPassword": "secret2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server);
    h.session.login("ada@example.com", "secret1").await.unwrap();

    h.session.change_password("secret1", "secret2").await.unwrap();
    assert!(h.session.is_authenticated());
}

#[tokio::test]
async fn test_stores_from_one_client_share_state() {
    let mock_server = MockServer::start().await;
    mount_login(&mock_server, "t1").await;

    let h = harness(&mock_server);
    let other = SessionStore::new(&h.client);

    h.session.login("ada@example.com", "secret1").await.unwrap();
    assert!(other.is_authenticated());
}

#[tokio::test]
async fn test_logout_clears_when_backend_unreachable() {
    let storage = Arc::new(MemoryStorage::new());
    let client = SkillSpotterClient::builder(Arc::new(ConfigResolver::fixed("http://127.0.0.1:1/api")))
        .storage(storage.clone())
        .build()
        .unwrap();
    client.credentials().save("t1").await.unwrap();
    let session = SessionStore::new(&client);

    session.logout().await.unwrap();

    assert!(session.current_user().is_none());
    assert!(!client.credentials().is_present());
    assert_eq!(persisted_token(&storage).await, None);
}
