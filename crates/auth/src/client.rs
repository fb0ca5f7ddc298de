//! Authorization client
//!
//! Drives the authorization-code + PKCE flow for one client identifier:
//! bootstrap from a cached token or a returned authorization code,
//! interactive login through a popup or a full-page redirect, token exchange
//! and refresh, and session (user profile) lookup.
//!
//! State is published through four observable cells (`user`, `loading`,
//! `error`, `token`). Any transition of `loading` to `true` clears `error`.
//!
//! Concurrent [`AuthorizationClient::get_fresh_token`] callers share one
//! in-flight resolution, so a burst of requests during the refresh window
//! produces a single refresh.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use sessionkit_common::error::{ErrorClassification, ErrorSeverity};
use sessionkit_common::signal::{ReadOnlyCell, Signal};
use sessionkit_common::storage::PersistentStore;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::config::ClientOptions;
use crate::error::AuthError;
use crate::loading::LoadingTracker;
use crate::pkce::PkcePair;
use crate::provider::{self, AuthorizationRequest, Grant, ProviderEndpoints};
use crate::traits::PopupWindow;
use crate::types::{AuthCodeResult, SessionState, Token, User, WindowMessage};

/// Persisted PKCE verifier of the pending authorization request
pub const VERIFIER_KEY: &str = "wxr-pkce-code-verifier";
/// Persisted `state` of the pending authorization request
pub const STATE_KEY: &str = "wxr-pkce-state";
/// Persisted token
pub const TOKEN_KEY: &str = "wxr-accessToken";

/// Window name used for the login popup
pub const POPUP_NAME: &str = "weightxreps_oauth";
const POPUP_WIDTH: u32 = 600;
const POPUP_HEIGHT: u32 = 600;

/// Popup error code meaning the user refused access
const ACCESS_DENIED: &str = "access_denied";

type SharedToken = Shared<BoxFuture<'static, Result<String, AuthError>>>;

/// Cached storage value; the outer `None` means storage was not read yet
type CachedItem = Mutex<Option<Option<String>>>;

struct InFlight {
    id: u64,
    login_if_needed: bool,
    future: SharedToken,
}

struct ClientInner {
    client_id: String,
    instance_id: String,
    options: ClientOptions,
    endpoints: ProviderEndpoints,
    store: PersistentStore,

    user: Signal<Option<User>>,
    loading: Signal<bool>,
    error: Signal<Option<String>>,
    token: Signal<Option<Token>>,
    token_loaded: AtomicBool,
    tracker: LoadingTracker,

    verifier: CachedItem,
    pending_state: CachedItem,

    inflight: Mutex<Option<InFlight>>,
    next_flight: AtomicU64,
    bootstrapped: watch::Sender<bool>,
}

/// Authorization client for one client identifier
///
/// Obtain instances through [`ClientRegistry`](crate::ClientRegistry);
/// clones share state.
#[derive(Clone)]
pub struct AuthorizationClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for AuthorizationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationClient")
            .field("client_id", &self.inner.client_id)
            .field("instance_id", &self.inner.instance_id)
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl AuthorizationClient {
    /// Build a client without scheduling its bootstrap
    ///
    /// # Errors
    /// Returns [`AuthError::Config`] if the provider endpoints cannot be
    /// derived from `options`
    pub(crate) fn new(client_id: &str, options: ClientOptions) -> Result<Self, AuthError> {
        let endpoints =
            ProviderEndpoints::resolve(&options.endpoint, options.session_endpoint.as_ref())?;
        let store = PersistentStore::new(client_id, Arc::clone(&options.storage));

        let loading = Signal::new(false);
        let error: Signal<Option<String>> = Signal::new(None);
        let error_cell = error.clone();
        let _ = loading.listen(
            move |is_loading: &bool| {
                if *is_loading {
                    error_cell.set(None);
                }
            },
            false,
        );

        let (bootstrapped, _) = watch::channel(false);

        Ok(Self {
            inner: Arc::new(ClientInner {
                client_id: client_id.to_string(),
                instance_id: Uuid::new_v4().simple().to_string(),
                tracker: LoadingTracker::new(loading.clone()),
                options,
                endpoints,
                store,
                user: Signal::new(None),
                loading,
                error,
                token: Signal::new(None),
                token_loaded: AtomicBool::new(false),
                verifier: Mutex::new(None),
                pending_state: Mutex::new(None),
                inflight: Mutex::new(None),
                next_flight: AtomicU64::new(0),
                bootstrapped,
            }),
        })
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.inner.client_id
    }

    /// Random per-instance identifier, sent as the authorization `state`
    #[must_use]
    pub fn instance_id(&self) -> &str {
        &self.inner.instance_id
    }

    /// Authenticated user, `None` while logged out
    #[must_use]
    pub fn on_logged(&self) -> ReadOnlyCell<Option<User>> {
        self.inner.user.read_only()
    }

    #[must_use]
    pub fn on_loading(&self) -> ReadOnlyCell<bool> {
        self.inner.loading.read_only()
    }

    /// Last published error message
    #[must_use]
    pub fn on_error(&self) -> ReadOnlyCell<Option<String>> {
        self.inner.error.read_only()
    }

    #[must_use]
    pub fn on_token(&self) -> ReadOnlyCell<Option<Token>> {
        self.inner.token.read_only()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.inner.user.value()
    }

    /// Current token, read through to storage when none is held in memory
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        self.inner.current_token()
    }

    /// Derived lifecycle snapshot
    #[must_use]
    pub fn session_state(&self) -> SessionState {
        let inner = &self.inner;
        let has_token = inner.current_token().is_some();

        if inner.loading.value() {
            return if has_token { SessionState::Refreshing } else { SessionState::Authorizing };
        }
        if let Some(message) = inner.error.value() {
            return SessionState::Error(message);
        }
        if has_token {
            SessionState::Authenticated
        } else if inner.verifier().is_some() {
            SessionState::PendingAuthorization
        } else {
            SessionState::Unauthenticated
        }
    }

    /// Spawn [`bootstrap`](Self::bootstrap) on the ambient tokio runtime
    ///
    /// Returns `None` (and logs a warning) when called outside a runtime.
    pub fn schedule_bootstrap(&self) -> Option<JoinHandle<()>> {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let client = self.clone();
                Some(handle.spawn(async move { client.bootstrap().await }))
            }
            Err(_) => {
                warn!(
                    client_id = %self.inner.client_id,
                    "no tokio runtime available, bootstrap not scheduled"
                );
                None
            }
        }
    }

    /// Run the login continuation, publishing unexpected failures
    ///
    /// A `must_login` outcome is silent.
    pub async fn bootstrap(&self) {
        match self.continue_login_flow().await {
            Ok(()) => debug!(client_id = %self.inner.client_id, "bootstrap completed"),
            Err(err) if err.is_must_login() => {
                debug!(client_id = %self.inner.client_id, "bootstrap: no session");
            }
            Err(err) => {
                log_classified(&self.inner.client_id, "bootstrap failed", &err);
                self.inner.error.set(Some(err.to_string()));
            }
        }
        self.inner.bootstrapped.send_replace(true);
    }

    /// Wait until a bootstrap run has finished
    ///
    /// Never resolves if bootstrap was not scheduled and is never run.
    pub async fn bootstrapped(&self) {
        let mut done = self.inner.bootstrapped.subscribe();
        let _ = done.wait_for(|finished| *finished).await;
    }

    /// Resume a session or finish an authorization started before this
    /// instance existed
    ///
    /// 1. A cached, fresh (or refreshable) token ends the flow.
    /// 2. A `code` in the current location is exchanged for a token and the
    ///    query string is removed in place.
    /// 3. An `error` in the current location is published.
    ///
    /// # Errors
    /// Returns the first failure other than a missing session
    #[instrument(skip(self), fields(client_id = %self.inner.client_id))]
    pub async fn continue_login_flow(&self) -> Result<(), AuthError> {
        match self.get_fresh_token(false).await {
            Ok(_) => return Ok(()),
            Err(AuthError::UserMustLogin) => {}
            Err(err) => return Err(err),
        }

        let host = &self.inner.options.host;
        let location = host.location();

        match AuthCodeResult::from_query(location.query_pairs()) {
            Some(AuthCodeResult::Code { code, state, .. }) => {
                self.inner.check_returned_state(state.as_deref())?;
                self.inner.exchange_code(&code).await?;

                let mut clean = location.clone();
                clean.set_query(None);
                clean.set_fragment(None);
                host.replace_location(&clean);
                info!("authorization code exchanged");
                Ok(())
            }
            Some(AuthCodeResult::Error { error, .. }) => {
                warn!(error = %error, "authorization returned an error");
                self.inner.error.set(Some(error));
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Access token that is valid for at least the refresh window
    ///
    /// Concurrent callers share one resolution. A caller that may not start
    /// an interactive login never triggers one by joining a resolution that
    /// may; a caller that may waits for a non-interactive one to finish and
    /// then resolves again.
    ///
    /// # Errors
    /// [`AuthError::UserMustLogin`] when a login is needed but not allowed,
    /// otherwise the failure of the refresh, exchange or session lookup
    pub async fn get_fresh_token(&self, login_if_needed: bool) -> Result<String, AuthError> {
        loop {
            let (joinable, future) = {
                let mut slot = self.inner.inflight.lock();
                match slot.as_ref() {
                    Some(flight) => {
                        (flight.login_if_needed || !login_if_needed, flight.future.clone())
                    }
                    None => {
                        let (id, future) = self.start_flight(login_if_needed);
                        *slot = Some(InFlight { id, login_if_needed, future: future.clone() });
                        (true, future)
                    }
                }
            };

            if joinable {
                return future.await;
            }
            let _ = future.await;
        }
    }

    fn start_flight(&self, login_if_needed: bool) -> (u64, SharedToken) {
        let id = self.inner.next_flight.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let future = async move {
            let result = inner.resolve_fresh_token(login_if_needed).await;
            inner.finish_flight(id);
            result
        }
        .boxed()
        .shared();
        (id, future)
    }

    /// Interactive login if needed
    ///
    /// Failures are published on the error cell rather than returned.
    /// Returns the user when one is loaded afterwards.
    #[instrument(skip(self), fields(client_id = %self.inner.client_id))]
    pub async fn login(&self) -> Option<User> {
        let _loading = self.inner.tracker.begin();

        if let Err(err) = self.get_fresh_token(true).await {
            log_classified(&self.inner.client_id, "login failed", &err);
            self.inner.error.set(Some(err.to_string()));
        }

        self.inner.user.value()
    }

    /// Forget the token, the pending authorization and the user
    ///
    /// Local only; no request is sent.
    pub fn logout(&self) {
        self.inner.logout();
    }

    /// `Authorization` header value for the current token, without a
    /// freshness check
    ///
    /// # Errors
    /// [`AuthError::NoToken`] when logged out
    pub fn authorization(&self) -> Result<String, AuthError> {
        self.inner.current_token().map(|token| token.authorization_value()).ok_or(AuthError::NoToken)
    }

    /// Request headers for the current token, without a freshness check
    ///
    /// # Errors
    /// [`AuthError::NoToken`] when logged out
    pub fn request_headers_sync(&self) -> Result<HeaderMap, AuthError> {
        let value = self.authorization()?;
        let value = HeaderValue::from_str(&value).map_err(|e| {
            AuthError::UnexpectedResponse(format!("Token is not a valid header value: {e}"))
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    /// Request headers for a fresh token
    ///
    /// # Errors
    /// See [`get_fresh_token`](Self::get_fresh_token)
    pub async fn request_headers_async(
        &self,
        login_if_needed: bool,
    ) -> Result<HeaderMap, AuthError> {
        self.get_fresh_token(login_if_needed).await?;
        self.request_headers_sync()
    }
}

impl ClientInner {
    fn now_ms(&self) -> i64 {
        self.options.clock.millis_since_epoch()
    }

    fn finish_flight(&self, id: u64) {
        let mut slot = self.inflight.lock();
        if slot.as_ref().is_some_and(|flight| flight.id == id) {
            *slot = None;
        }
    }

    /// Token held in memory, falling back to storage until one has been set
    ///
    /// Once set (or cleared) in memory, storage is no longer consulted, so a
    /// failed write cannot bring back a cleared token.
    fn current_token(&self) -> Option<Token> {
        if let Some(token) = self.token.value() {
            return Some(token);
        }
        if self.token_loaded.load(Ordering::Acquire) {
            return None;
        }
        let stored = self.store.get_object::<Token>(TOKEN_KEY)?;
        self.token.set(Some(stored.clone()));
        self.token_loaded.store(true, Ordering::Release);
        Some(stored)
    }

    fn set_token(&self, token: Option<Token>) {
        if token.is_none() {
            self.set_verifier(None);
            self.set_pending_state(None);
        }
        self.token_loaded.store(true, Ordering::Release);
        if let Err(err) = self.store.set_object(TOKEN_KEY, token.as_ref()) {
            log_classified(&self.client_id, "failed to persist token", &err);
        }
        self.token.set(token);
    }

    fn verifier(&self) -> Option<String> {
        self.cached_or_stored(&self.verifier, VERIFIER_KEY)
    }

    fn set_verifier(&self, verifier: Option<&str>) {
        self.cache_and_store(&self.verifier, VERIFIER_KEY, verifier);
    }

    fn pending_state(&self) -> Option<String> {
        self.cached_or_stored(&self.pending_state, STATE_KEY)
    }

    fn set_pending_state(&self, state: Option<&str>) {
        self.cache_and_store(&self.pending_state, STATE_KEY, state);
    }

    fn cached_or_stored(&self, cache: &CachedItem, key: &str) -> Option<String> {
        if let Some(cached) = cache.lock().as_ref() {
            return cached.clone();
        }
        match self.store.get_item(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(err) => {
                log_classified(&self.client_id, "failed to read storage", &err);
                None
            }
        }
    }

    fn cache_and_store(&self, cache: &CachedItem, key: &str, value: Option<&str>) {
        *cache.lock() = Some(value.map(str::to_string));
        if let Err(err) = self.store.set_item(key, value) {
            log_classified(&self.client_id, "failed to write storage", &err);
        }
    }

    fn logout(&self) {
        self.set_token(None);
        self.user.set(None);
        debug!(client_id = %self.client_id, "logged out");
    }

    fn check_returned_state(&self, returned: Option<&str>) -> Result<(), AuthError> {
        match self.pending_state() {
            Some(expected) if returned != Some(expected.as_str()) => {
                warn!(client_id = %self.client_id, "authorization state mismatch");
                Err(AuthError::StateMismatch)
            }
            _ => Ok(()),
        }
    }

    async fn resolve_fresh_token(&self, login_if_needed: bool) -> Result<String, AuthError> {
        let Some(token) = self.current_token() else {
            if login_if_needed {
                return Ok(self.redirect_user_to_login().await?.access_token);
            }
            return Err(AuthError::UserMustLogin);
        };

        if token.needs_refresh(self.now_ms()) {
            let token = self.refresh_token(login_if_needed).await?;
            if self.user.with_value(Option::is_none) {
                self.get_user().await?;
            }
            return Ok(token.access_token);
        }

        if self.user.with_value(Option::is_none) {
            self.get_user().await?;
        }
        Ok(token.access_token)
    }

    #[instrument(skip(self), fields(client_id = %self.client_id))]
    async fn refresh_token(&self, redirect_if_required: bool) -> Result<Token, AuthError> {
        let token = self.current_token().ok_or(AuthError::NoToken)?;

        let result = match token.refresh_token {
            Some(refresh_token) => self.fetch_token(Grant::RefreshToken { refresh_token }).await,
            None => Err(AuthError::Provider(AuthError::REFRESH_TOKEN_NOT_FOUND.to_string())),
        };

        match result {
            Err(err) if err.is_refresh_token_not_found() => {
                info!(error = %err, "refresh token rejected");
                if redirect_if_required {
                    self.redirect_user_to_login().await
                } else {
                    Err(AuthError::UserMustLogin)
                }
            }
            other => other,
        }
    }

    async fn exchange_code(&self, code: &str) -> Result<Token, AuthError> {
        let code_verifier = self.verifier().ok_or(AuthError::VerifierMissing)?;
        self.fetch_token(Grant::AuthorizationCode { code: code.to_string(), code_verifier }).await
    }

    async fn fetch_token(&self, grant: Grant) -> Result<Token, AuthError> {
        let _loading = self.tracker.begin();

        let request = self.endpoints.token_request(&self.client_id, &grant);
        if !grant.is_refresh() {
            self.set_verifier(None);
            self.set_pending_state(None);
        }

        debug!(client_id = %self.client_id, grant = grant.grant_type(), "requesting token");
        let response = self.options.transport.send(request).await?;
        let mut token = provider::parse_token_response(&response, self.now_ms())?;

        if let Grant::RefreshToken { refresh_token } = &grant {
            if token.refresh_token.is_none() {
                token.refresh_token = Some(refresh_token.clone());
            }
        }
        self.set_token(Some(token.clone()));

        if !grant.is_refresh() {
            self.get_user().await?;
        }
        Ok(token)
    }

    async fn get_user(&self) -> Result<User, AuthError> {
        let token = self.current_token().ok_or(AuthError::NoToken)?;
        let request = self.endpoints.session_request(&token.authorization_value());

        let response = {
            let _loading = self.tracker.begin();
            self.options.transport.send(request).await?
        };

        let parsed = provider::parse_session_response(&response);
        if response.status == 401 {
            warn!(client_id = %self.client_id, "session rejected the token, logging out");
            self.logout();
            return Err(parsed.err().unwrap_or(AuthError::UserMustLogin));
        }

        let user = parsed?;
        debug!(client_id = %self.client_id, user_id = user.id, "session loaded");
        self.user.set(Some(user.clone()));
        Ok(user)
    }

    fn redirect_uri(&self, location: &Url) -> String {
        let current = format!("{}{}", location.origin().ascii_serialization(), location.path());
        if self.options.as_popup {
            current
        } else {
            self.options.redirect_uri.clone().unwrap_or(current)
        }
    }

    #[instrument(skip(self), fields(client_id = %self.client_id, popup = self.options.as_popup))]
    async fn redirect_user_to_login(&self) -> Result<Token, AuthError> {
        let location = self.options.host.location();
        if self.options.require_https && location.scheme() != "https" {
            return Err(AuthError::HttpsRequired);
        }

        let pkce = PkcePair::generate();
        let redirect_uri = self.redirect_uri(&location);
        self.set_verifier(Some(&pkce.code_verifier));
        self.set_pending_state(Some(&self.instance_id));

        let url = self.endpoints.authorization_url(&AuthorizationRequest {
            client_id: &self.client_id,
            redirect_uri: &redirect_uri,
            state: &self.instance_id,
            code_challenge: &pkce.code_challenge,
            code_challenge_method: pkce.challenge_method(),
            scope: &self.options.scope,
        });

        if !self.options.as_popup {
            info!("navigating to authorization endpoint");
            self.options.host.navigate(&url);
            // The page unloads from here; release the slot so the pending
            // flight does not keep this client alive.
            *self.inflight.lock() = None;
            return std::future::pending().await;
        }

        let result = {
            let _loading = self.tracker.begin();
            self.await_popup_result(&url).await?
        };

        match result {
            AuthCodeResult::Code { code, .. } => self.exchange_code(&code).await,
            AuthCodeResult::Error { error, .. } if error == ACCESS_DENIED => {
                Err(AuthError::UserDeclined)
            }
            AuthCodeResult::Error { error, .. } => Err(AuthError::Provider(error)),
        }
    }

    fn popup_features(&self) -> String {
        let (screen_width, screen_height) = self.options.host.screen_size();
        let left = screen_width.saturating_sub(POPUP_WIDTH) / 2;
        let top = screen_height.saturating_sub(POPUP_HEIGHT) / 2;
        format!(
            "width={POPUP_WIDTH},height={POPUP_HEIGHT},top={top},left={left},resizable=yes,scrollbars=yes"
        )
    }

    async fn await_popup_result(&self, url: &Url) -> Result<AuthCodeResult, AuthError> {
        let mut messages = self.options.host.subscribe_messages();
        let popup = self.options.host.open_popup(url, POPUP_NAME, &self.popup_features());

        let wait = self.wait_for_popup_message(&mut messages, popup.as_ref());
        let outcome = match self.options.popup_timeout {
            Some(limit) => tokio::time::timeout(limit, wait).await.unwrap_or_else(|_| {
                info!(timeout = ?limit, "popup login timed out");
                Err(AuthError::UserCanceled)
            }),
            None => wait.await,
        };

        if outcome.is_err() {
            popup.close();
        }
        outcome
    }

    async fn wait_for_popup_message(
        &self,
        messages: &mut tokio::sync::broadcast::Receiver<WindowMessage>,
        popup: &dyn PopupWindow,
    ) -> Result<AuthCodeResult, AuthError> {
        let mut poll = tokio::time::interval(self.options.popup_poll_interval.max(Duration::from_millis(1)));
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                received = messages.recv() => match received {
                    Ok(message) => {
                        if let Some(result) = self.accept_popup_message(&message) {
                            return Ok(result);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "window message subscriber lagged");
                    }
                    Err(RecvError::Closed) => return Err(AuthError::UserCanceled),
                },
                _ = poll.tick() => {
                    if popup.is_closed() {
                        info!("popup closed before completing login");
                        return Err(AuthError::UserCanceled);
                    }
                }
            }
        }
    }

    fn accept_popup_message(&self, message: &WindowMessage) -> Option<AuthCodeResult> {
        if message.origin != self.endpoints.origin() {
            debug!(origin = %message.origin, "ignoring message from foreign origin");
            return None;
        }
        let result = message.auth_result()?;
        if result.state() != Some(self.instance_id.as_str()) {
            warn!(state = ?result.state(), "ignoring authorization result for another request");
            return None;
        }
        Some(result)
    }
}

/// Log `err` at the level its severity calls for
fn log_classified<E: ErrorClassification + fmt::Display>(client_id: &str, context: &str, err: &E) {
    match err.severity() {
        ErrorSeverity::Info => info!(client_id, error = %err, "{context}"),
        ErrorSeverity::Warning => {
            warn!(client_id, error = %err, retryable = err.is_retryable(), "{context}");
        }
        ErrorSeverity::Error | ErrorSeverity::Critical => {
            error!(client_id, error = %err, critical = err.is_critical(), "{context}");
        }
    }
}
