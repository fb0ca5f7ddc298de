//! Popup login against a mock identity provider.

use std::sync::Arc;
use std::time::Duration;

use sessionkit_auth::host::PopupRecord;
use sessionkit_auth::{
    AuthCodeResult, AuthorizationClient, ClientOptions, ClientOptionsBuilder, ClientRegistry,
    MemoryHost, PopupWindow, ReqwestTransport, User, WindowMessage,
};
use sessionkit_common::storage::MemoryStorage;
use sessionkit_common::testing::MockClock;
use tokio::task::JoinHandle;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct PopupLogin {
    client: AuthorizationClient,
    host: MemoryHost,
    popup: PopupRecord,
    login: JoinHandle<Option<User>>,
}

fn options(server: &MockServer, host: &MemoryHost) -> ClientOptionsBuilder {
    ClientOptions::builder()
        .endpoint(format!("{}/api/auth", server.uri()))
        .as_popup(true)
        .popup_poll_interval(Duration::from_millis(10))
        .transport(Arc::new(ReqwestTransport::new().unwrap()))
        .host(Arc::new(host.clone()))
        .storage(Arc::new(MemoryStorage::new()))
        .clock(Arc::new(MockClock::at_millis(1_700_000_000_000)))
}

async fn start_login(server: &MockServer, configure: impl FnOnce(ClientOptionsBuilder) -> ClientOptionsBuilder) -> PopupLogin {
    let host = MemoryHost::parse("https://app.test/page?x=1").unwrap().with_screen_size(1920, 1080);
    let options = configure(options(server, &host)).build().unwrap();
    let client = ClientRegistry::new().get("app", options).unwrap();
    client.bootstrapped().await;

    let login = tokio::spawn({
        let client = client.clone();
        async move { client.login().await }
    });
    let popup = host.wait_for_popups(1, Duration::from_secs(5)).await.expect("popup opened");

    PopupLogin { client, host, popup, login }
}

fn code_message(origin: &str, code: &str, state: &str) -> WindowMessage {
    WindowMessage::oauth_result(
        origin,
        &AuthCodeResult::Code { code: code.into(), token_endpoint: None, state: Some(state.into()) },
    )
}

async fn mount_provider(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/auth/token"))
        .and(body_string_contains("code=GOOD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "popup-token",
            "refresh_token": "r",
            "expires_in": 3600,
        })))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "getSession": { "user": { "id": 3, "uname": "popper", "email": "p@x.test" } } }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn popup_is_centered_and_carries_request() {
    let server = MockServer::start().await;
    let flow = start_login(&server, |b| b.redirect_uri("https://ignored.test/cb")).await;

    assert_eq!(flow.popup.name, "weightxreps_oauth");
    assert_eq!(
        flow.popup.features,
        "width=600,height=600,top=240,left=660,resizable=yes,scrollbars=yes"
    );
    let query: std::collections::HashMap<String, String> =
        flow.popup.url.query_pairs().into_owned().collect();
    assert_eq!(query["redirect_uri"], "https://app.test/page");
    assert_eq!(query["state"], flow.client.instance_id());
    assert_eq!(query["code_challenge_method"], "S256");
    assert!(flow.client.on_loading().value());

    flow.login.abort();
}

#[tokio::test]
async fn only_matching_message_completes_login() {
    let server = MockServer::start().await;
    mount_provider(&server).await;
    let flow = start_login(&server, |b| b).await;
    let origin = server.uri();
    let state = flow.client.instance_id().to_string();

    flow.host.post_message(code_message("https://evil.test", "BAD", &state));
    flow.host.post_message(code_message(&origin, "BAD", "another-instance"));
    flow.host.post_message(WindowMessage::new(origin.clone(), serde_json::json!({"unrelated": true})));
    flow.host.post_message(code_message(&origin, "GOOD", &state));

    let user = flow.login.await.unwrap().expect("logged in");

    assert_eq!(user.uname, "popper");
    assert_eq!(user.email.as_deref(), Some("p@x.test"));
    assert_eq!(flow.client.token().unwrap().access_token, "popup-token");
    assert_eq!(flow.client.on_error().value(), None);
    assert!(!flow.client.on_loading().value());
    assert_eq!(flow.host.message_subscribers(), 0);
}

#[tokio::test]
async fn closing_popup_cancels_login() {
    let server = MockServer::start().await;
    let flow = start_login(&server, |b| b).await;

    flow.popup.window.close_window();
    let user = flow.login.await.unwrap();

    assert!(user.is_none());
    assert_eq!(flow.client.on_error().value().as_deref(), Some("user_canceled"));
    assert!(!flow.client.on_loading().value());
}

#[tokio::test]
async fn popup_timeout_cancels_and_closes() {
    let server = MockServer::start().await;
    let flow = start_login(&server, |b| b.popup_timeout(Duration::from_millis(100))).await;

    let user = flow.login.await.unwrap();

    assert!(user.is_none());
    assert_eq!(flow.client.on_error().value().as_deref(), Some("user_canceled"));
    assert!(flow.popup.window.is_closed());
}

#[tokio::test]
async fn denied_access_is_reported_as_declined() {
    let server = MockServer::start().await;
    let flow = start_login(&server, |b| b).await;
    let state = flow.client.instance_id().to_string();

    flow.host.post_message(WindowMessage::oauth_result(
        server.uri(),
        &AuthCodeResult::Error { error: "access_denied".into(), state: Some(state) },
    ));
    let user = flow.login.await.unwrap();

    assert!(user.is_none());
    assert_eq!(flow.client.on_error().value().as_deref(), Some("user_declined"));
    assert!(server.received_requests().await.unwrap().is_empty());
}
