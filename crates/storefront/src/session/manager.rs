//! Token lifecycle: persist, mirror, refresh ahead of expiry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use barker_core::auth::{Claims, Role, parse_jwt, role_for_tokens};

use super::cookies::{
    CookieSink, ROLE_COOKIE, TOKEN_COOKIE, expired_cookie, role_cookie, token_cookie,
};
use super::scheduler::{Clock, Scheduler, SystemClock, TimerHandle, TokioScheduler};
use super::storage::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, TokenStorage};
use crate::api::BackendClient;

/// How long before expiry the refresh fires.
pub const REFRESH_LEAD_MS: i64 = 60_000;
/// Refresh never fires sooner than this.
pub const MIN_REFRESH_DELAY_MS: i64 = 5_000;

/// Delay until the refresh for a token expiring at `exp_secs`.
#[must_use]
pub const fn refresh_delay_ms(exp_secs: i64, now_ms: i64) -> i64 {
    let due = exp_secs
        .saturating_mul(1000)
        .saturating_sub(now_ms)
        .saturating_sub(REFRESH_LEAD_MS);
    if due < MIN_REFRESH_DELAY_MS {
        MIN_REFRESH_DELAY_MS
    } else {
        due
    }
}

/// Access and refresh tokens. Either may be absent.
#[derive(Debug, Clone, Default)]
pub struct TokenPair {
    pub access: Option<SecretString>,
    pub refresh: Option<SecretString>,
}

impl TokenPair {
    #[must_use]
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: Some(SecretString::from(access.into())),
            refresh: Some(SecretString::from(refresh.into())),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.access.is_none() && self.refresh.is_none()
    }
}

/// Owns the client side of an authenticated session.
///
/// Tokens live in a [`TokenStorage`]; the access token and a derived role are
/// mirrored into cookies for the route guard. Saving an access token arms a
/// single refresh timer, replacing any earlier one. A failed refresh ends the
/// session.
///
/// Storage and cookie failures are logged and otherwise ignored.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<TokenManagerInner>,
}

struct TokenManagerInner {
    client: BackendClient,
    storage: Arc<dyn TokenStorage>,
    cookies: Arc<dyn CookieSink>,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    timer: Mutex<Option<ArmedTimer>>,
    /// Serializes refresh calls.
    refresh_lock: tokio::sync::Mutex<()>,
    /// Bumped by every `clear_tokens`; refreshes that straddle a bump are
    /// discarded.
    generation: AtomicU64,
    next_timer_id: AtomicU64,
    last_failure: Mutex<Option<String>>,
}

struct ArmedTimer {
    id: u64,
    fires_at_ms: i64,
    handle: TimerHandle,
}

impl TokenManager {
    /// Manager on the system clock with tokio timers.
    #[must_use]
    pub fn new(
        client: BackendClient,
        storage: Arc<dyn TokenStorage>,
        cookies: Arc<dyn CookieSink>,
    ) -> Self {
        Self::with_runtime(
            client,
            storage,
            cookies,
            Arc::new(SystemClock),
            Arc::new(TokioScheduler),
        )
    }

    /// Manager with an explicit clock and scheduler.
    #[must_use]
    pub fn with_runtime(
        client: BackendClient,
        storage: Arc<dyn TokenStorage>,
        cookies: Arc<dyn CookieSink>,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            inner: Arc::new(TokenManagerInner {
                client,
                storage,
                cookies,
                clock,
                scheduler,
                timer: Mutex::new(None),
                refresh_lock: tokio::sync::Mutex::new(()),
                generation: AtomicU64::new(0),
                next_timer_id: AtomicU64::new(0),
                last_failure: Mutex::new(None),
            }),
        }
    }

    #[must_use]
    pub fn client(&self) -> &BackendClient {
        &self.inner.client
    }

    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.inner.clock.as_ref()
    }

    // =========================================================================
    // Storage
    // =========================================================================

    /// Persist whichever tokens are present, mirror them into cookies and
    /// re-arm the refresh timer.
    ///
    /// A missing field leaves the stored value untouched. The role cookie is
    /// the first of `roles`, or is derived from the access token's claims.
    #[instrument(skip_all, fields(has_access = tokens.access.is_some(), has_refresh = tokens.refresh.is_some()))]
    pub fn save_tokens(&self, tokens: &TokenPair, roles: &[String]) {
        if let Some(access) = &tokens.access {
            let access = access.expose_secret();
            self.store(ACCESS_TOKEN_KEY, access);

            let role = role_for_tokens(Some(access), roles);
            self.mirror(token_cookie(access));
            self.mirror(role_cookie(&role));
        }
        if let Some(refresh) = &tokens.refresh {
            self.store(REFRESH_TOKEN_KEY, refresh.expose_secret());
        }

        *self.last_failure() = None;
        self.schedule_refresh();
    }

    /// Read both tokens. Unreadable storage yields an empty pair.
    #[must_use]
    pub fn load_tokens(&self) -> TokenPair {
        TokenPair {
            access: self.read(ACCESS_TOKEN_KEY).map(SecretString::from),
            refresh: self.read(REFRESH_TOKEN_KEY).map(SecretString::from),
        }
    }

    /// Forget the session: drop both tokens, expire both cookies and disarm
    /// the timer. Refreshes still in flight will be discarded.
    #[instrument(skip(self))]
    pub fn clear_tokens(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);

        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.inner.storage.remove(key) {
                tracing::warn!(error = %e, key, "Failed to remove token");
            }
        }
        self.mirror(expired_cookie(TOKEN_COOKIE));
        self.mirror(expired_cookie(ROLE_COOKIE));
        self.disarm();
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Claims of the stored access token, if it decodes.
    #[must_use]
    pub fn access_claims(&self) -> Option<Claims> {
        self.read(ACCESS_TOKEN_KEY).as_deref().and_then(parse_jwt)
    }

    /// Whether a decodable, unexpired access token is stored.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.access_claims()
            .is_some_and(|claims| !claims.is_expired_at(self.inner.clock.now_secs()))
    }

    /// Role embedded in the stored access token.
    #[must_use]
    pub fn current_role(&self) -> Option<Role> {
        let access = self.read(ACCESS_TOKEN_KEY)?;
        parse_jwt(&access)?;
        Some(role_for_tokens(Some(&access), &[]))
    }

    /// When the armed refresh fires, in epoch milliseconds.
    #[must_use]
    pub fn armed_refresh_at(&self) -> Option<i64> {
        self.timer().as_ref().map(|timer| timer.fires_at_ms)
    }

    /// Why the last refresh ended the session, until the next save.
    #[must_use]
    pub fn last_refresh_failure(&self) -> Option<String> {
        self.last_failure().clone()
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Returns `false` without a network call when no refresh token is
    /// stored. Any failure clears the session and returns `false`.
    #[instrument(skip(self))]
    pub async fn refresh_access(&self) -> bool {
        let _in_flight = self.inner.refresh_lock.lock().await;
        let generation = self.inner.generation.load(Ordering::SeqCst);

        let Some(refresh) = self.load_tokens().refresh else {
            tracing::debug!("No refresh token stored");
            return false;
        };

        let result = self.inner.client.refresh(&refresh).await;

        if self.inner.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("Session cleared during refresh; discarding response");
            return false;
        }

        match result {
            Ok(response) => {
                let tokens = TokenPair {
                    access: Some(response.access),
                    refresh: Some(response.refresh.unwrap_or(refresh)),
                };
                self.save_tokens(&tokens, &[]);
                tracing::info!("Access token refreshed");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed; ending session");
                self.clear_tokens();
                *self.last_failure() = Some(e.to_string());
                false
            }
        }
    }

    /// Arm the refresh timer for the stored access token.
    ///
    /// Any armed timer is cancelled first. Nothing is armed when there is no
    /// access token or it carries no expiry.
    pub fn schedule_refresh(&self) {
        self.disarm();

        let Some(exp) = self.access_claims().and_then(|claims| claims.exp()) else {
            return;
        };

        let now_ms = self.inner.clock.now_ms();
        let delay_ms = refresh_delay_ms(exp, now_ms);
        let id = self.inner.next_timer_id.fetch_add(1, Ordering::Relaxed);
        let weak: Weak<TokenManagerInner> = Arc::downgrade(&self.inner);

        let handle = self.inner.scheduler.schedule(
            Duration::from_millis(delay_ms.unsigned_abs()),
            Box::pin(async move {
                if let Some(inner) = weak.upgrade() {
                    Self { inner }.fire(id).await;
                }
            }),
        );

        tracing::debug!(delay_ms, "Refresh timer armed");
        *self.timer() = Some(ArmedTimer {
            id,
            fires_at_ms: now_ms + delay_ms,
            handle,
        });
    }

    /// Re-arm the timer for tokens left by an earlier process.
    pub fn resume(&self) {
        if self.read(ACCESS_TOKEN_KEY).is_some() {
            self.schedule_refresh();
        }
    }

    async fn fire(&self, id: u64) {
        {
            let mut timer = self.timer();
            if timer.as_ref().is_none_or(|armed| armed.id != id) {
                return;
            }
            // The timer has fired; it must not be cancelled from inside itself.
            timer.take();
        }
        self.refresh_access().await;
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn disarm(&self) {
        let armed = self.timer().take();
        if let Some(armed) = armed {
            armed.handle.cancel();
        }
    }

    fn store(&self, key: &str, value: &str) {
        if let Err(e) = self.inner.storage.set(key, value) {
            tracing::warn!(error = %e, key, "Failed to persist token");
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.inner.storage.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, key, "Failed to read token");
                None
            }
        }
    }

    fn mirror(&self, cookie: cookie::Cookie<'static>) {
        let name = cookie.name().to_string();
        if let Err(e) = self.inner.cookies.set_cookie(cookie) {
            tracing::warn!(error = %e, cookie = %name, "Failed to mirror cookie");
        }
    }

    fn timer(&self) -> MutexGuard<'_, Option<ArmedTimer>> {
        self.inner.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn last_failure(&self) -> MutexGuard<'_, Option<String>> {
        self.inner
            .last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("client", &self.inner.client)
            .field("armed_refresh_at", &self.armed_refresh_at())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use barker_core::auth::encode_unsigned;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::session::cookies::{CookieJarMirror, is_expired};
    use crate::session::scheduler::{ManualClock, ManualScheduler};
    use crate::session::storage::{MemoryStorage, StorageError};

    const NOW_MS: i64 = 1_700_000_000_000;
    const NOW_SECS: i64 = NOW_MS / 1000;

    struct Harness {
        manager: TokenManager,
        storage: Arc<MemoryStorage>,
        cookies: Arc<CookieJarMirror>,
        scheduler: Arc<ManualScheduler>,
    }

    fn harness(base_url: &str) -> Harness {
        let storage = Arc::new(MemoryStorage::new());
        let cookies = Arc::new(CookieJarMirror::new());
        let scheduler = Arc::new(ManualScheduler::new());
        let manager = TokenManager::with_runtime(
            BackendClient::new(base_url).unwrap(),
            storage.clone(),
            cookies.clone(),
            Arc::new(ManualClock::new(NOW_MS)),
            scheduler.clone(),
        );
        Harness {
            manager,
            storage,
            cookies,
            scheduler,
        }
    }

    fn access_expiring_in(secs: i64) -> String {
        encode_unsigned(&json!({"exp": NOW_SECS + secs, "roles": ["ROLE_CLIENT"]}))
    }

    #[test]
    fn test_refresh_delay_floor_and_lead() {
        assert_eq!(refresh_delay_ms(NOW_SECS + 30, NOW_MS), MIN_REFRESH_DELAY_MS);
        assert_eq!(refresh_delay_ms(NOW_SECS - 3_600, NOW_MS), MIN_REFRESH_DELAY_MS);
        assert_eq!(refresh_delay_ms(NOW_SECS + 3_600, NOW_MS), 3_540_000);
        assert_eq!(
            refresh_delay_ms(i64::MAX, NOW_MS),
            i64::MAX - NOW_MS - REFRESH_LEAD_MS
        );
    }

    #[test]
    fn test_save_tokens_stores_mirrors_and_arms() {
        let h = harness("http://127.0.0.1:9");
        let access = access_expiring_in(30);

        h.manager.save_tokens(&TokenPair::new(access.clone(), "r-1"), &[]);

        assert_eq!(h.storage.get(ACCESS_TOKEN_KEY).unwrap(), Some(access.clone()));
        assert_eq!(h.storage.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r-1"));
        assert_eq!(h.cookies.value(TOKEN_COOKIE), Some(access));
        assert_eq!(h.cookies.value(ROLE_COOKIE).as_deref(), Some("ROLE_CLIENT"));

        // 30 s to expiry is inside the lead window: the 5 s floor applies.
        assert_eq!(
            h.scheduler.pending_delays(),
            vec![Duration::from_millis(5_000)]
        );
        assert_eq!(h.manager.armed_refresh_at(), Some(NOW_MS + 5_000));
    }

    #[test]
    fn test_save_without_refresh_keeps_stored_refresh() {
        let h = harness("http://127.0.0.1:9");
        h.manager
            .save_tokens(&TokenPair::new(access_expiring_in(600), "r-1"), &[]);

        let only_access = TokenPair {
            access: Some(SecretString::from(access_expiring_in(900))),
            refresh: None,
        };
        h.manager.save_tokens(&only_access, &[]);

        let loaded = h.manager.load_tokens();
        assert_eq!(loaded.refresh.unwrap().expose_secret(), "r-1");
        assert_eq!(h.scheduler.pending_delays().len(), 1);
    }

    #[test]
    fn test_login_roles_win_over_claims() {
        let h = harness("http://127.0.0.1:9");
        let admin = encode_unsigned(&json!({"is_staff": true}));

        h.manager
            .save_tokens(&TokenPair::new(admin.clone(), "r"), &["ROLE_CLIENT".to_string()]);
        assert_eq!(h.cookies.value(ROLE_COOKIE).as_deref(), Some("ROLE_CLIENT"));

        h.manager.save_tokens(&TokenPair::new(admin, "r"), &[]);
        assert_eq!(h.cookies.value(ROLE_COOKIE).as_deref(), Some("ROLE_ADMIN"));
    }

    #[test]
    fn test_token_without_exp_arms_nothing() {
        let h = harness("http://127.0.0.1:9");
        let access = encode_unsigned(&json!({"roles": ["ROLE_CLIENT"]}));
        h.manager.save_tokens(&TokenPair::new(access, "r"), &[]);

        assert!(h.scheduler.pending_delays().is_empty());
        assert_eq!(h.manager.armed_refresh_at(), None);
        assert!(h.manager.is_authenticated());
    }

    #[test]
    fn test_clear_tokens_empties_storage_and_expires_cookies() {
        let h = harness("http://127.0.0.1:9");
        h.manager
            .save_tokens(&TokenPair::new(access_expiring_in(600), "r-1"), &[]);

        h.manager.clear_tokens();

        let loaded = h.manager.load_tokens();
        assert!(loaded.access.is_none());
        assert!(loaded.refresh.is_none());
        assert!(is_expired(&h.cookies.get(TOKEN_COOKIE).unwrap()));
        assert!(is_expired(&h.cookies.get(ROLE_COOKIE).unwrap()));
        assert!(h.scheduler.pending_delays().is_empty());
        assert_eq!(h.manager.armed_refresh_at(), None);
    }

    #[test]
    fn test_resume_rearms_existing_session() {
        let h = harness("http://127.0.0.1:9");
        h.storage
            .set(ACCESS_TOKEN_KEY, &access_expiring_in(3_600))
            .unwrap();

        h.manager.resume();
        assert_eq!(
            h.scheduler.pending_delays(),
            vec![Duration::from_millis(3_540_000)]
        );
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let h = harness(&server.uri());
        assert!(!h.manager.refresh_access().await);
    }

    #[tokio::test]
    async fn test_timer_fires_refresh_and_rearms() {
        let server = MockServer::start().await;
        let fresh = access_expiring_in(3_600);
        Mock::given(method("POST"))
            .and(path("/auth/token/refresh/"))
            .and(body_json(json!({"refresh": "r-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": fresh})))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server.uri());
        h.manager
            .save_tokens(&TokenPair::new(access_expiring_in(30), "r-1"), &[]);

        assert!(h.scheduler.fire_next().await);

        let loaded = h.manager.load_tokens();
        assert_eq!(loaded.access.unwrap().expose_secret(), fresh);
        assert_eq!(loaded.refresh.unwrap().expose_secret(), "r-1");
        assert_eq!(
            h.scheduler.pending_delays(),
            vec![Duration::from_millis(3_540_000)]
        );
    }

    #[tokio::test]
    async fn test_rejected_refresh_ends_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/token/refresh/"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"detail": "Token is invalid"})),
            )
            .mount(&server)
            .await;

        let h = harness(&server.uri());
        h.manager
            .save_tokens(&TokenPair::new(access_expiring_in(600), "r-1"), &[]);

        assert!(!h.manager.refresh_access().await);
        assert!(h.manager.load_tokens().is_empty());
        assert!(is_expired(&h.cookies.get(TOKEN_COOKIE).unwrap()));
        assert!(
            h.manager
                .last_refresh_failure()
                .unwrap()
                .contains("Token is invalid")
        );
    }

    #[tokio::test]
    async fn test_refresh_response_without_access_ends_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/token/refresh/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let h = harness(&server.uri());
        h.manager
            .save_tokens(&TokenPair::new(access_expiring_in(600), "r-1"), &[]);

        assert!(!h.manager.refresh_access().await);
        assert!(h.manager.load_tokens().is_empty());
    }

    #[tokio::test]
    async fn test_logout_during_refresh_discards_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/token/refresh/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access": access_expiring_in(3_600)}))
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;

        let h = harness(&server.uri());
        h.manager
            .save_tokens(&TokenPair::new(access_expiring_in(600), "r-1"), &[]);

        let manager = h.manager.clone();
        let refresh = tokio::spawn(async move { manager.refresh_access().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.manager.clear_tokens();

        assert!(!refresh.await.unwrap());
        assert!(h.manager.load_tokens().is_empty());
        assert!(h.scheduler.pending_delays().is_empty());
    }

    struct BrokenStorage;

    impl TokenStorage for BrokenStorage {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("disabled".to_string()))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        }
        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disabled".to_string()))
        }
    }

    #[test]
    fn test_storage_failures_degrade_quietly() {
        let cookies = Arc::new(CookieJarMirror::new());
        let manager = TokenManager::with_runtime(
            BackendClient::new("http://127.0.0.1:9").unwrap(),
            Arc::new(BrokenStorage),
            cookies.clone(),
            Arc::new(ManualClock::new(NOW_MS)),
            Arc::new(ManualScheduler::new()),
        );

        let access = access_expiring_in(600);
        manager.save_tokens(&TokenPair::new(access.clone(), "r"), &[]);

        assert!(manager.load_tokens().is_empty());
        // The cookie mirror still works.
        assert_eq!(cookies.value(TOKEN_COOKIE), Some(access));
        manager.clear_tokens();
    }

    struct BrokenCookies;

    impl CookieSink for BrokenCookies {
        fn set_cookie(&self, _cookie: cookie::Cookie<'static>) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("cookies disabled".to_string()))
        }
    }

    #[test]
    fn test_cookie_failures_keep_storage_and_timer() {
        let storage = Arc::new(MemoryStorage::new());
        let scheduler = Arc::new(ManualScheduler::new());
        let manager = TokenManager::with_runtime(
            BackendClient::new("http://127.0.0.1:9").unwrap(),
            storage.clone(),
            Arc::new(BrokenCookies),
            Arc::new(ManualClock::new(NOW_MS)),
            scheduler.clone(),
        );

        let access = access_expiring_in(600);
        manager.save_tokens(&TokenPair::new(access.clone(), "r"), &[]);

        assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), Some(access));
        assert_eq!(storage.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r"));
        assert_eq!(scheduler.pending_delays(), vec![Duration::from_secs(540)]);
        assert!(manager.is_authenticated());

        manager.clear_tokens();

        assert!(storage.get(ACCESS_TOKEN_KEY).unwrap().is_none());
        assert!(storage.get(REFRESH_TOKEN_KEY).unwrap().is_none());
        assert!(scheduler.pending_delays().is_empty());
        assert!(manager.armed_refresh_at().is_none());
    }
}
