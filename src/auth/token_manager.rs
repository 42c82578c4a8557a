use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use super::renewal_scheduler::RenewalTask;
use super::token_introspection::{
    decode_claims, decode_exp, is_expired_at, is_token_expired, now_millis, now_secs, renewal_delay,
    seconds_until_expiry,
};
use super::token_store::{TokenKind, TokenStore};
use crate::api_clients::AuthApiClient;
use crate::constants::{
    INVALID_TOKEN_CODE, INVALID_TOKEN_DESCRIPTION, NOT_SIGNED_IN_CODE, NOT_SIGNED_IN_DESCRIPTION,
    REFRESH_TOKEN_QUERY_PARAM, SUPER_ADMIN_ROLE,
};
use crate::error::{AppError, AppResult};
use crate::models::{AccessTokenResponse, Envelope, ErrorDetail, SessionUser, SignInRequest, TokenClaims, TokenPair};
use crate::navigation::{Navigator, take_query_param};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    #[default]
    SignedOut,
    SignedIn,
    Renewing,
}

/// Read-only view of the session handed to UI consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub status: SessionStatus,
    pub is_authenticated: bool,
    pub user: Option<SessionUser>,
}

impl AuthSession {
    pub fn signed_out() -> Self {
        Self {
            status: SessionStatus::SignedOut,
            is_authenticated: false,
            user: None,
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    status: SessionStatus,
    refresh_claims: Option<TokenClaims>,
    // bumped on every sign-in and teardown; stale renewals compare against it
    generation: u64,
}

impl SessionState {
    fn is_authenticated(&self, now: i64) -> bool {
        self.status != SessionStatus::SignedOut
            && self
                .refresh_claims
                .as_ref()
                .is_some_and(|claims| !is_expired_at(claims.exp, now))
    }

    fn snapshot(&self) -> AuthSession {
        let is_authenticated = self.is_authenticated(now_secs());
        AuthSession {
            status: self.status,
            is_authenticated,
            user: self
                .refresh_claims
                .as_ref()
                .filter(|_| is_authenticated)
                .map(SessionUser::from),
        }
    }
}

fn invalid_token() -> ErrorDetail {
    ErrorDetail::new(INVALID_TOKEN_CODE, INVALID_TOKEN_DESCRIPTION)
}

fn not_signed_in() -> ErrorDetail {
    ErrorDetail::new(NOT_SIGNED_IN_CODE, NOT_SIGNED_IN_DESCRIPTION)
}

/// Owns the authenticated session.
///
/// All session mutation goes through [`sign_in`](Self::sign_in),
/// [`bootstrap`](Self::bootstrap), [`renew_access_token`](Self::renew_access_token)
/// and [`sign_out`](Self::sign_out). While signed in, a renewal timer keeps a
/// non-expired access token available; any renewal failure ends the session.
pub struct TokenManager {
    auth: AuthApiClient,
    tokens: Arc<TokenStore>,
    navigator: Arc<dyn Navigator>,
    renewal_margin: Duration,
    state: RwLock<SessionState>,
    renewal: Mutex<Option<RenewalTask>>,
    updates: watch::Sender<AuthSession>,
    self_ref: Weak<TokenManager>,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("session", &self.session())
            .field("renewal_margin", &self.renewal_margin)
            .field("scheduled_renewal", &self.scheduled_renewal())
            .finish()
    }
}

impl TokenManager {
    pub fn new(
        auth: AuthApiClient,
        tokens: Arc<TokenStore>,
        navigator: Arc<dyn Navigator>,
        renewal_margin: Duration,
    ) -> Arc<Self> {
        let (updates, _) = watch::channel(AuthSession::signed_out());
        Arc::new_cyclic(|self_ref| Self {
            auth,
            tokens,
            navigator,
            renewal_margin,
            state: RwLock::new(SessionState::default()),
            renewal: Mutex::new(None),
            updates,
            self_ref: Weak::clone(self_ref),
        })
    }

    fn read_state<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    fn update_state<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let (result, snapshot) = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let result = f(&mut state);
            (result, state.snapshot())
        };
        self.updates.send_replace(snapshot);
        result
    }

    pub fn session(&self) -> AuthSession {
        self.read_state(SessionState::snapshot)
    }

    /// True only while a non-expired refresh token is held
    pub fn is_authenticated(&self) -> bool {
        self.read_state(|state| state.is_authenticated(now_secs()))
    }

    pub fn current_user(&self) -> Option<SessionUser> {
        self.session().user
    }

    /// Receive a new snapshot every time the session changes
    pub fn subscribe(&self) -> watch::Receiver<AuthSession> {
        self.updates.subscribe()
    }

    /// Authenticated and holding either the super-admin role or one of `required_roles`
    pub fn has_any_role(&self, required_roles: &[&str]) -> bool {
        self.read_state(|state| {
            if !state.is_authenticated(now_secs()) {
                return false;
            }
            state.refresh_claims.as_ref().is_some_and(|claims| {
                claims
                    .roles
                    .iter()
                    .any(|role| role == SUPER_ADMIN_ROLE || required_roles.contains(&role.as_str()))
            })
        })
    }

    pub async fn access_token(&self) -> Option<String> {
        if self.read_state(|state| state.status == SessionStatus::SignedOut) {
            return None;
        }
        self.tokens.get(TokenKind::Access).await
    }

    /// Time left until the pending renewal timer fires, if one is armed
    pub fn scheduled_renewal(&self) -> Option<Duration> {
        let renewal = self.renewal.lock().unwrap_or_else(PoisonError::into_inner);
        renewal
            .as_ref()
            .filter(|task| !task.is_finished())
            .map(|task| task.due_at().saturating_duration_since(Instant::now()))
    }

    fn generation(&self) -> u64 {
        self.read_state(|state| state.generation)
    }

    fn establish(&self, claims: TokenClaims) {
        self.update_state(|state| {
            state.status = SessionStatus::SignedIn;
            state.refresh_claims = Some(claims);
            state.generation += 1;
        });
    }

    fn mark_renewing(&self) -> u64 {
        self.update_state(|state| {
            if state.status == SessionStatus::SignedIn {
                state.status = SessionStatus::Renewing;
            }
            state.generation
        })
    }

    fn finish_renewal(&self, generation: u64) {
        self.update_state(|state| {
            if state.generation == generation && state.status == SessionStatus::Renewing {
                state.status = SessionStatus::SignedIn;
            }
        });
    }

    fn cancel_renewal(&self) {
        let pending = self.renewal.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = pending {
            task.cancel();
        }
    }

    /// Arm the renewal timer for `margin` before the access token expires.
    /// Undecodable tokens are renewed immediately.
    fn schedule_renewal(&self, access_token: &str) {
        let delay = match decode_exp(access_token) {
            Some(exp) => renewal_delay(exp, now_millis(), self.renewal_margin),
            None => Duration::ZERO,
        };

        let manager = Weak::clone(&self.self_ref);
        let task = RenewalTask::schedule(delay, move || async move {
            let Some(manager) = manager.upgrade() else {
                return;
            };
            if let Err(e) = manager.renew_access_token(true).await {
                error!("Scheduled access token renewal failed: {}", e);
            }
        });

        info!("Next access token renewal in {:?}", delay);
        let previous = self
            .renewal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    /// Sign in with credentials. On success both tokens are persisted, the
    /// user is projected from the refresh token and renewal is scheduled.
    pub async fn sign_in(&self, credentials: &SignInRequest) -> AppResult<Envelope<TokenPair>> {
        let envelope = self.auth.sign_in(credentials).await?;
        if !envelope.succeeded {
            warn!("Sign-in rejected: {}", envelope.error_summary());
            return Ok(envelope);
        }

        let Some(pair) = envelope.payload.clone() else {
            error!("Sign-in succeeded without returning tokens");
            return Ok(Envelope::unknown_error());
        };

        let claims = decode_claims(&pair.refresh_token).filter(|claims| !is_expired_at(claims.exp, now_secs()));
        let Some(claims) = claims else {
            warn!("Sign-in returned an invalid or expired refresh token");
            return Ok(Envelope::failure(vec![invalid_token()]));
        };

        if let Err(e) = self.persist_pair(&pair).await {
            error!("Failed to persist session tokens: {}", e);
            if let Err(clear_error) = self.tokens.clear().await {
                error!("Failed to clear partially persisted tokens: {}", clear_error);
            }
            return Err(e);
        }

        info!("Signed in as {}", claims.email);
        self.establish(claims);
        self.schedule_renewal(&pair.access_token);

        Ok(envelope)
    }

    async fn persist_pair(&self, pair: &TokenPair) -> AppResult<()> {
        self.tokens
            .set(TokenKind::Refresh, Some(pair.refresh_token.clone()))
            .await?;
        self.tokens
            .set(TokenKind::Access, Some(pair.access_token.clone()))
            .await
    }

    /// Restore a session at process start.
    ///
    /// A `refresh_token` query parameter on the current location wins over
    /// durable storage and is stripped from the location. A valid token
    /// restores the session and renews the access token right away; an
    /// expired or undecodable one clears everything.
    pub async fn bootstrap(&self) -> AppResult<AuthSession> {
        let from_location = self.consume_bootstrap_param();
        let persist = from_location.is_some();
        let refresh_token = match from_location {
            Some(token) => Some(token),
            None => self.tokens.get(TokenKind::Refresh).await,
        };

        let Some(refresh_token) = refresh_token else {
            debug!("No persisted session found");
            return Ok(self.session());
        };

        let claims = decode_claims(&refresh_token).filter(|claims| !is_expired_at(claims.exp, now_secs()));
        let Some(claims) = claims else {
            warn!("Persisted refresh token is expired or invalid, clearing session");
            self.teardown().await;
            return Ok(self.session());
        };

        if persist {
            self.tokens.set(TokenKind::Refresh, Some(refresh_token)).await?;
        }
        self.tokens.set(TokenKind::Access, None).await?;

        info!("Restoring session for {}", claims.email);
        self.establish(claims);
        self.renew_access_token(true).await?;

        Ok(self.session())
    }

    fn consume_bootstrap_param(&self) -> Option<String> {
        let url = self.navigator.current_url()?;
        let (token, stripped) = take_query_param(&url, REFRESH_TOKEN_QUERY_PARAM);
        let token = token?;
        self.navigator.replace_url(stripped);
        if token.is_empty() {
            warn!("Ignoring empty bootstrap parameter");
            return None;
        }
        info!("Using refresh token from bootstrap parameter");
        Some(token)
    }

    /// Mint a new access token from the held refresh token.
    ///
    /// Without `force`, a held access token that outlives the renewal margin
    /// is returned as is. An expired refresh token or any renewal failure
    /// ends the session.
    pub async fn renew_access_token(&self, force: bool) -> AppResult<Envelope<AccessTokenResponse>> {
        if self.read_state(|state| state.status == SessionStatus::SignedOut) {
            debug!("No session, skipping access token renewal");
            return Ok(Envelope::failure(vec![not_signed_in()]));
        }
        let Some(refresh_token) = self.tokens.get(TokenKind::Refresh).await else {
            debug!("No refresh token held, skipping access token renewal");
            return Ok(Envelope::failure(vec![not_signed_in()]));
        };

        if is_token_expired(&refresh_token) {
            warn!("Refresh token expired, ending session");
            self.sign_out().await;
            return Ok(Envelope::failure(vec![invalid_token()]));
        }

        if !force {
            if let Some(access_token) = self.tokens.get(TokenKind::Access).await {
                let margin = i64::try_from(self.renewal_margin.as_secs()).unwrap_or(i64::MAX);
                if seconds_until_expiry(&access_token).is_some_and(|secs| secs > margin) {
                    debug!("Access token still fresh, renewal not needed");
                    return Ok(Envelope::success(Some(AccessTokenResponse { access_token })));
                }
            }
        }

        let generation = self.mark_renewing();
        let envelope = match self.auth.refresh_access_token(&refresh_token).await {
            Ok(envelope) => envelope,
            Err(e) => {
                if self.generation() == generation {
                    error!("Access token renewal could not be sent, ending session: {}", e);
                    self.sign_out().await;
                }
                return Err(e);
            }
        };

        if self.generation() != generation {
            debug!("Session changed while renewing, discarding renewal result");
            return Ok(envelope);
        }

        let renewed = envelope
            .payload
            .as_ref()
            .filter(|_| envelope.succeeded)
            .map(|payload| payload.access_token.clone())
            .filter(|token| decode_exp(token).is_some());

        let Some(access_token) = renewed else {
            if envelope.succeeded {
                warn!("Access token renewal returned an unusable token, ending session");
            } else {
                warn!("Access token renewal failed, ending session: {}", envelope.error_summary());
            }
            self.sign_out().await;
            return Ok(if envelope.succeeded {
                Envelope::failure(vec![invalid_token()])
            } else {
                envelope
            });
        };

        if let Err(e) = self.tokens.set(TokenKind::Access, Some(access_token.clone())).await {
            error!("Failed to store renewed access token, ending session: {}", e);
            self.sign_out().await;
            return Err(e);
        }
        self.finish_renewal(generation);
        self.schedule_renewal(&access_token);
        info!("Access token renewed");

        Ok(envelope)
    }

    /// Access token guaranteed to outlive the renewal margin, renewing if needed
    pub async fn ensure_fresh_access_token(&self) -> AppResult<String> {
        let envelope = self.renew_access_token(false).await?;
        if !envelope.succeeded {
            return Err(AppError::AuthError(envelope.error_summary()));
        }
        self.tokens
            .get(TokenKind::Access)
            .await
            .ok_or_else(|| AppError::AuthError(NOT_SIGNED_IN_DESCRIPTION.to_string()))
    }

    /// End the session: best-effort backend sign-out, local teardown, then
    /// a redirect to the application root.
    pub async fn sign_out(&self) {
        self.cancel_renewal();

        match self.tokens.get(TokenKind::Refresh).await {
            Some(token) if !is_token_expired(&token) => match self.auth.sign_out(&token).await {
                Ok(envelope) if envelope.succeeded => debug!("Backend session closed"),
                Ok(envelope) => warn!("Sign-out endpoint reported failure: {}", envelope.error_summary()),
                Err(e) => warn!("Sign-out request failed: {}", e),
            },
            Some(_) => debug!("Refresh token already expired, skipping sign-out endpoint"),
            None => debug!("No refresh token held, skipping sign-out endpoint"),
        }

        self.teardown().await;
        self.navigator.redirect_to_root();
        info!("Signed out");
    }

    /// Clear in-memory and durable session state
    async fn teardown(&self) {
        self.cancel_renewal();
        self.update_state(|state| {
            state.status = SessionStatus::SignedOut;
            state.refresh_claims = None;
            state.generation += 1;
        });
        if let Err(e) = self.tokens.clear().await {
            error!("Failed to clear persisted tokens: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_clients::test_support::ScriptedTransport;
    use crate::api_clients::{HttpMethod, HttpRequestClient, HttpTransport};
    use crate::auth::secure_storage_trait::SecureStorage;
    use crate::auth::token_introspection::encode_unsigned_token;
    use crate::auth::token_persistence::MemoryStorage;
    use crate::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, REFRESH_TOKEN_PATH, SIGN_IN_PATH, SIGN_OUT_PATH};
    use crate::navigation::InMemoryNavigator;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use url::Url;

    /// Memory storage whose access token writes can be switched to failing
    #[derive(Debug, Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        fail_access_writes: AtomicBool,
    }

    impl FlakyStorage {
        fn fail_access_writes(&self) {
            self.fail_access_writes.store(true, Ordering::SeqCst);
        }

        fn is_empty(&self) -> bool {
            self.inner.is_empty()
        }
    }

    #[async_trait]
    impl SecureStorage for FlakyStorage {
        async fn set_item(&self, key: &str, value: &str) -> AppResult<()> {
            if key == ACCESS_TOKEN_KEY && self.fail_access_writes.load(Ordering::SeqCst) {
                return Err(AppError::StorageError("keyring locked".to_string()));
            }
            self.inner.set_item(key, value).await
        }

        async fn get_item(&self, key: &str) -> AppResult<Option<String>> {
            self.inner.get_item(key).await
        }

        async fn remove_item(&self, key: &str) -> AppResult<()> {
            self.inner.remove_item(key).await
        }
    }

    struct Harness {
        transport: Arc<ScriptedTransport>,
        storage: Arc<FlakyStorage>,
        tokens: Arc<TokenStore>,
        navigator: Arc<InMemoryNavigator>,
        manager: Arc<TokenManager>,
    }

    fn harness_with(storage: MemoryStorage, location: Option<&str>) -> Harness {
        let transport = Arc::new(ScriptedTransport::new());
        let storage = Arc::new(FlakyStorage {
            inner: storage,
            fail_access_writes: AtomicBool::new(false),
        });
        let tokens = Arc::new(TokenStore::new(Arc::clone(&storage) as Arc<dyn SecureStorage>));
        let navigator = Arc::new(InMemoryNavigator::new(location.map(|l| Url::parse(l).unwrap())));
        let client = HttpRequestClient::new(
            Url::parse("https://auth.example.com").unwrap(),
            Arc::clone(&transport) as Arc<dyn HttpTransport>,
            Arc::clone(&tokens),
        );
        let manager = TokenManager::new(
            AuthApiClient::new(Arc::new(client)),
            Arc::clone(&tokens),
            Arc::clone(&navigator) as Arc<dyn Navigator>,
            Duration::from_secs(30),
        );
        Harness {
            transport,
            storage,
            tokens,
            navigator,
            manager,
        }
    }

    fn harness() -> Harness {
        harness_with(MemoryStorage::new(), Some("https://console.example.com/users"))
    }

    fn token(expires_in: i64, roles: &[&str]) -> String {
        encode_unsigned_token(&json!({
            "sub": "7",
            "email": "ada@example.com",
            "user_uuid": "u-7",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "roles": roles,
            "exp": now_secs() + expires_in,
            "iat": now_secs()
        }))
    }

    fn pair_body(access: &str, refresh: &str) -> String {
        json!({
            "result": true,
            "response": {"accessToken": access, "refreshToken": refresh},
            "errors": []
        })
        .to_string()
    }

    fn access_body(access: &str) -> String {
        json!({"result": true, "response": {"accessToken": access}, "errors": []}).to_string()
    }

    fn credentials() -> SignInRequest {
        SignInRequest {
            email: "ada@example.com".to_string(),
            password: "secret".to_string(),
        }
    }

    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    async fn signed_in(h: &Harness, access: &str, refresh: &str) {
        h.transport.respond(HttpMethod::Post, SIGN_IN_PATH, 200, &pair_body(access, refresh));
        let envelope = h.manager.sign_in(&credentials()).await.unwrap();
        assert!(envelope.succeeded);
    }

    #[tokio::test]
    async fn test_sign_in_establishes_session() {
        let h = harness();
        let access = token(600, &["ADMIN"]);
        let refresh = token(86_400, &["ADMIN"]);
        signed_in(&h, &access, &refresh).await;

        let session = h.manager.session();
        assert!(session.is_authenticated);
        assert_eq!(session.status, SessionStatus::SignedIn);
        assert_eq!(session.user.unwrap().email, "ada@example.com");
        assert_eq!(h.storage.get_item(ACCESS_TOKEN_KEY).await.unwrap(), Some(access.clone()));
        assert_eq!(h.storage.get_item(REFRESH_TOKEN_KEY).await.unwrap(), Some(refresh));
        assert_eq!(h.manager.access_token().await, Some(access));

        let delay = h.manager.scheduled_renewal().unwrap();
        assert!(delay <= Duration::from_secs(570) && delay >= Duration::from_secs(568), "{:?}", delay);
    }

    #[tokio::test]
    async fn test_sign_in_with_invalid_credentials() {
        let h = harness();
        h.transport.respond(
            HttpMethod::Post,
            SIGN_IN_PATH,
            401,
            r#"{"result":false,"response":null,"errors":[{"reasonCode":"auth.invalid.credentials","description":"Invalid email or password"}]}"#,
        );

        let envelope = h.manager.sign_in(&credentials()).await.unwrap();

        assert!(!envelope.succeeded);
        assert_eq!(envelope.errors[0].reason_code, "auth.invalid.credentials");
        assert!(!h.manager.is_authenticated());
        assert_eq!(h.manager.session(), AuthSession::signed_out());
        assert!(h.storage.is_empty());
        assert!(h.manager.scheduled_renewal().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_with_expired_refresh_token_fails() {
        let h = harness();
        h.transport.respond(
            HttpMethod::Post,
            SIGN_IN_PATH,
            200,
            &pair_body(&token(600, &[]), &token(-60, &[])),
        );

        let envelope = h.manager.sign_in(&credentials()).await.unwrap();

        assert!(!envelope.succeeded);
        assert_eq!(envelope.errors[0].reason_code, INVALID_TOKEN_CODE);
        assert!(!h.manager.is_authenticated());
        assert!(h.storage.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_lived_access_token_renews_immediately() {
        let h = harness();
        let renewed = token(600, &[]);
        h.transport.respond(HttpMethod::Post, REFRESH_TOKEN_PATH, 200, &access_body(&renewed));
        signed_in(&h, &token(10, &[]), &token(86_400, &[])).await;

        assert_eq!(h.manager.scheduled_renewal(), Some(Duration::ZERO));

        settle().await;
        assert_eq!(h.transport.calls_to(REFRESH_TOKEN_PATH), 1);
        assert_eq!(h.manager.access_token().await, Some(renewed));
        assert_eq!(h.manager.session().status, SessionStatus::SignedIn);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_renews_before_expiry() {
        let h = harness();
        let renewed = token(900, &[]);
        h.transport.respond(HttpMethod::Post, REFRESH_TOKEN_PATH, 200, &access_body(&renewed));
        let refresh = token(86_400, &[]);
        signed_in(&h, &token(600, &[]), &refresh).await;

        tokio::time::advance(Duration::from_secs(560)).await;
        settle().await;
        assert_eq!(h.transport.calls_to(REFRESH_TOKEN_PATH), 0);

        tokio::time::advance(Duration::from_secs(11)).await;
        settle().await;
        assert_eq!(h.transport.calls_to(REFRESH_TOKEN_PATH), 1);

        let refresh_call = h
            .transport
            .calls()
            .into_iter()
            .find(|c| c.url.path() == REFRESH_TOKEN_PATH)
            .unwrap();
        assert_eq!(
            refresh_call.headers.get("authorization").unwrap(),
            &format!("Bearer {}", refresh)
        );
        assert_eq!(h.manager.access_token().await, Some(renewed));
        assert!(h.manager.scheduled_renewal().unwrap() > Duration::from_secs(860));
    }

    #[tokio::test]
    async fn test_renewal_failure_ends_session() {
        let h = harness();
        h.transport.respond(
            HttpMethod::Post,
            REFRESH_TOKEN_PATH,
            401,
            r#"{"result":false,"response":null,"errors":[{"reasonCode":"token.revoked","description":"Token revoked"}]}"#,
        );
        h.transport.respond(HttpMethod::Post, SIGN_OUT_PATH, 200, r#"{"result":true,"response":true,"errors":[]}"#);
        signed_in(&h, &token(600, &[]), &token(86_400, &[])).await;

        let envelope = h.manager.renew_access_token(true).await.unwrap();

        assert!(!envelope.succeeded);
        assert_eq!(envelope.errors[0].reason_code, "token.revoked");
        assert!(!h.manager.is_authenticated());
        assert!(h.storage.is_empty());
        assert!(h.manager.access_token().await.is_none());
        assert_eq!(h.navigator.redirect_count(), 1);
        assert!(h.manager.scheduled_renewal().is_none());
    }

    #[tokio::test]
    async fn test_renewal_network_failure_ends_session() {
        let h = harness();
        h.transport.fail(
            HttpMethod::Post,
            REFRESH_TOKEN_PATH,
            AppError::NetworkError("connection reset".to_string()),
        );
        signed_in(&h, &token(600, &[]), &token(86_400, &[])).await;

        let envelope = h.manager.renew_access_token(true).await.unwrap();

        assert_eq!(envelope, Envelope::unknown_error());
        assert_eq!(h.manager.session(), AuthSession::signed_out());
    }

    #[tokio::test]
    async fn test_renewal_with_expired_refresh_token_ends_session() {
        let h = harness();
        signed_in(&h, &token(600, &[]), &token(86_400, &[])).await;
        h.tokens
            .set(TokenKind::Refresh, Some(token(-5, &[])))
            .await
            .unwrap();

        let envelope = h.manager.renew_access_token(true).await.unwrap();

        assert_eq!(envelope.errors[0].reason_code, INVALID_TOKEN_CODE);
        assert!(!h.manager.is_authenticated());
        assert!(h.manager.access_token().await.is_none());
        assert!(h.storage.is_empty());
        assert_eq!(h.transport.calls_to(REFRESH_TOKEN_PATH), 0);
        assert_eq!(h.transport.calls_to(SIGN_OUT_PATH), 0);
    }

    #[tokio::test]
    async fn test_sign_in_storage_failure_leaves_nothing_behind() {
        let h = harness();
        h.storage.fail_access_writes();
        h.transport.respond(
            HttpMethod::Post,
            SIGN_IN_PATH,
            200,
            &pair_body(&token(600, &[]), &token(86_400, &[])),
        );

        let result = h.manager.sign_in(&credentials()).await;

        assert!(matches!(result, Err(AppError::StorageError(_))));
        assert!(!h.manager.is_authenticated());
        assert!(h.storage.is_empty());
        assert!(h.manager.scheduled_renewal().is_none());

        let restored = h.manager.bootstrap().await.unwrap();
        assert_eq!(restored, AuthSession::signed_out());
    }

    #[tokio::test]
    async fn test_renewal_storage_failure_ends_session() {
        let h = harness();
        h.transport
            .respond(HttpMethod::Post, REFRESH_TOKEN_PATH, 200, &access_body(&token(900, &[])));
        signed_in(&h, &token(600, &[]), &token(86_400, &[])).await;
        h.storage.fail_access_writes();

        let result = h.manager.renew_access_token(true).await;

        assert!(matches!(result, Err(AppError::StorageError(_))));
        assert_eq!(h.manager.session(), AuthSession::signed_out());
        assert!(h.manager.scheduled_renewal().is_none());
        assert!(h.storage.get_item(REFRESH_TOKEN_KEY).await.unwrap().is_none());
        assert_eq!(h.navigator.redirect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_renewal_storage_failure_ends_session() {
        let h = harness();
        h.transport
            .respond(HttpMethod::Post, REFRESH_TOKEN_PATH, 200, &access_body(&token(900, &[])));
        signed_in(&h, &token(10, &[]), &token(86_400, &[])).await;
        h.storage.fail_access_writes();

        settle().await;

        assert_eq!(h.transport.calls_to(REFRESH_TOKEN_PATH), 1);
        assert!(!h.manager.is_authenticated());
        assert_eq!(h.manager.session().status, SessionStatus::SignedOut);
        assert!(h.manager.scheduled_renewal().is_none());
        assert!(h.manager.access_token().await.is_none());
    }

    #[tokio::test]
    async fn test_unforced_renewal_keeps_fresh_token() {
        let h = harness();
        let access = token(600, &[]);
        signed_in(&h, &access, &token(86_400, &[])).await;

        let envelope = h.manager.renew_access_token(false).await.unwrap();

        assert_eq!(envelope.payload.unwrap().access_token, access);
        assert_eq!(h.transport.calls_to(REFRESH_TOKEN_PATH), 0);
        assert_eq!(h.manager.ensure_fresh_access_token().await.unwrap(), access);
    }

    #[tokio::test]
    async fn test_renewal_without_session_is_a_no_op() {
        let h = harness();

        let envelope = h.manager.renew_access_token(true).await.unwrap();

        assert_eq!(envelope.errors[0].reason_code, NOT_SIGNED_IN_CODE);
        assert_eq!(h.transport.call_count(), 0);
        assert!(matches!(
            h.manager.ensure_fresh_access_token().await,
            Err(AppError::AuthError(_))
        ));
    }

    #[tokio::test]
    async fn test_bootstrap_with_expired_stored_token_clears_storage() {
        let storage = MemoryStorage::with_items([
            (REFRESH_TOKEN_KEY, token(-3600, &[])),
            (ACCESS_TOKEN_KEY, token(-3600, &[])),
        ]);
        let h = harness_with(storage, None);

        let session = h.manager.bootstrap().await.unwrap();

        assert_eq!(session, AuthSession::signed_out());
        assert!(h.storage.is_empty());
        assert!(h.manager.access_token().await.is_none());
        assert_eq!(h.transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_bootstrap_restores_session_and_renews() {
        let refresh = token(86_400, &["EDITOR"]);
        let renewed = token(600, &["EDITOR"]);
        let h = harness_with(MemoryStorage::with_items([(REFRESH_TOKEN_KEY, refresh.clone())]), None);
        h.transport.respond(HttpMethod::Post, REFRESH_TOKEN_PATH, 200, &access_body(&renewed));

        let session = h.manager.bootstrap().await.unwrap();

        assert!(session.is_authenticated);
        assert_eq!(session.user.unwrap().roles, vec!["EDITOR".to_string()]);
        assert_eq!(h.transport.calls_to(REFRESH_TOKEN_PATH), 1);
        assert_eq!(h.storage.get_item(ACCESS_TOKEN_KEY).await.unwrap(), Some(renewed));
        assert!(h.manager.scheduled_renewal().is_some());
    }

    #[tokio::test]
    async fn test_bootstrap_prefers_location_parameter() {
        let stored = encode_unsigned_token(&json!({"email": "old@example.com", "exp": now_secs() + 86_400}));
        let from_link = token(86_400, &[]);
        let h = harness_with(
            MemoryStorage::with_items([(REFRESH_TOKEN_KEY, stored)]),
            Some(&format!("https://console.example.com/welcome?refresh_token={}&tab=1", from_link)),
        );
        h.transport
            .respond(HttpMethod::Post, REFRESH_TOKEN_PATH, 200, &access_body(&token(600, &[])));

        let session = h.manager.bootstrap().await.unwrap();

        assert_eq!(session.user.unwrap().email, "ada@example.com");
        assert_eq!(h.storage.get_item(REFRESH_TOKEN_KEY).await.unwrap(), Some(from_link));
        assert_eq!(
            h.navigator.current_url().unwrap().as_str(),
            "https://console.example.com/welcome?tab=1"
        );
    }

    #[tokio::test]
    async fn test_bootstrap_strips_empty_location_parameter() {
        let h = harness_with(
            MemoryStorage::new(),
            Some("https://console.example.com/welcome?refresh_token=&tab=1"),
        );

        let session = h.manager.bootstrap().await.unwrap();

        assert_eq!(session, AuthSession::signed_out());
        assert_eq!(
            h.navigator.current_url().unwrap().as_str(),
            "https://console.example.com/welcome?tab=1"
        );
        assert_eq!(h.transport.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_renewal_counts_down() {
        let h = harness();
        signed_in(&h, &token(600, &[]), &token(86_400, &[])).await;
        let armed = h.manager.scheduled_renewal().unwrap();

        tokio::time::advance(Duration::from_secs(100)).await;

        let remaining = h.manager.scheduled_renewal().unwrap();
        assert!(remaining <= armed - Duration::from_secs(100), "{:?} vs {:?}", remaining, armed);
    }

    #[tokio::test]
    async fn test_bootstrap_without_tokens_stays_signed_out() {
        let h = harness();

        let session = h.manager.bootstrap().await.unwrap();

        assert_eq!(session, AuthSession::signed_out());
        assert_eq!(h.transport.call_count(), 0);
        assert_eq!(h.navigator.redirect_count(), 0);
    }

    #[tokio::test]
    async fn test_sign_out_tears_down_even_if_backend_fails() {
        let h = harness();
        h.transport.respond(HttpMethod::Post, SIGN_OUT_PATH, 500, "");
        let refresh = token(86_400, &[]);
        signed_in(&h, &token(600, &[]), &refresh).await;

        h.manager.sign_out().await;

        let sign_out_call = h
            .transport
            .calls()
            .into_iter()
            .find(|c| c.url.path() == SIGN_OUT_PATH)
            .unwrap();
        assert_eq!(
            sign_out_call.headers.get("authorization").unwrap(),
            &format!("Bearer {}", refresh)
        );
        assert_eq!(h.manager.session(), AuthSession::signed_out());
        assert!(h.storage.is_empty());
        assert!(h.manager.scheduled_renewal().is_none());
        assert_eq!(h.navigator.current_url().unwrap().as_str(), "https://console.example.com/");
    }

    #[tokio::test]
    async fn test_has_any_role() {
        let h = harness();
        assert!(!h.manager.has_any_role(&["ADMIN"]));

        signed_in(&h, &token(600, &["EDITOR"]), &token(86_400, &["EDITOR"])).await;
        assert!(h.manager.has_any_role(&["ADMIN", "EDITOR"]));
        assert!(!h.manager.has_any_role(&["ADMIN"]));
        assert!(!h.manager.has_any_role(&[]));

        h.manager.sign_out().await;
        assert!(!h.manager.has_any_role(&["EDITOR"]));
    }

    #[tokio::test]
    async fn test_super_admin_passes_every_role_check() {
        let h = harness();
        signed_in(&h, &token(600, &[SUPER_ADMIN_ROLE]), &token(86_400, &[SUPER_ADMIN_ROLE])).await;

        assert!(h.manager.has_any_role(&["TRANSLATOR"]));
        assert!(h.manager.has_any_role(&[]));
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let h = harness();
        let mut updates = h.manager.subscribe();

        signed_in(&h, &token(600, &[]), &token(86_400, &[])).await;
        assert!(updates.has_changed().unwrap());
        assert!(updates.borrow_and_update().is_authenticated);

        h.manager.sign_out().await;
        assert_eq!(*updates.borrow_and_update(), AuthSession::signed_out());
    }
}
