//! # Sessions
//!
//! Accounts are keyed by username, the auth service by email-like handle.
//! Every username maps to `lowercase(username)@{login_domain}`.
//!
//! ## Sign-up
//! - Validate username and password
//! - Ask the identity verifier about the raw username while the account is created
//! - Insert the profile once; a failure is logged and the account stays
//!
//! ## Tokens
//! Access tokens are renewed with the refresh token shortly before they
//! expire, and once more when the backend answers 401. A profile that still
//! cannot be read counts as signed out for the admin gate.
//!
//! ## Visitors
//! Each browser gets its own [`SessionManager`] behind an opaque `sid` cookie.
//! The cookie is issued only after a successful sign-in or sign-up.
use std::{
    sync::{Arc, LazyLock},
    time::Duration,
};

use axum::http::{HeaderMap, header::COOKIE};
use dashmap::DashMap;
use regex::Regex;
use remote::{
    Backend, RemoteError, Tables,
    models::{AuthSession, Identity, Profile},
    probe::IdentityVerifier,
};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::AuthError;

pub const SESSION_COOKIE: &str = "sid";

const MIN_PASSWORD_LEN: usize = 6;
const BOOTSTRAP_USERNAME: &str = "aliteaxolot";
const BOOTSTRAP_PASSWORD: &str = "ayush59321";
/// Renew this long before the access token runs out.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

static USERNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_]{3,16}$").expect("username pattern is valid")
});

pub struct SessionPolicy {
    pub login_domain: String,
    /// Registering with the bootstrap credentials grants admin.
    pub bootstrap_admin: bool,
}

#[derive(Clone, Debug, Default)]
pub struct SessionState {
    pub identity: Option<Identity>,
    pub profile: Option<Profile>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<Instant>,
}

impl SessionState {
    fn signed_in(session: AuthSession, profile: Option<Profile>) -> Self {
        Self {
            identity: Some(session.identity),
            profile,
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            expires_at: expiry(session.expires_in),
        }
    }
}

fn expiry(expires_in: Option<u64>) -> Option<Instant> {
    expires_in.map(|secs| Instant::now() + Duration::from_secs(secs))
}

pub fn login_handle(username: &str, login_domain: &str) -> String {
    format!("{}@{}", username.to_lowercase(), login_domain)
}

pub fn validate_username(username: &str) -> Result<(), AuthError> {
    if USERNAME.is_match(username) {
        Ok(())
    } else {
        Err(AuthError::InvalidUsername)
    }
}

pub struct SessionManager {
    backend: Arc<dyn Backend>,
    verifier: Arc<dyn IdentityVerifier>,
    policy: Arc<SessionPolicy>,
    state: watch::Sender<SessionState>,
}

impl SessionManager {
    pub fn new(
        backend: Arc<dyn Backend>,
        verifier: Arc<dyn IdentityVerifier>,
        policy: Arc<SessionPolicy>,
    ) -> Self {
        Self {
            backend,
            verifier,
            policy,
            state: watch::Sender::new(SessionState::default()),
        }
    }

    pub fn current_profile(&self) -> Option<Profile> {
        self.state.borrow().profile.clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.borrow().identity.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.borrow().access_token.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub async fn sign_in(&self, username: &str, password: &str) -> Result<Identity, AuthError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let handle = login_handle(username.trim(), &self.policy.login_domain);
        let session = self.backend.sign_in(&handle, password).await.map_err(|e| {
            warn!("Sign-in for {username} failed: {e}");
            AuthError::from(e)
        })?;

        let token = session.access_token.as_deref();
        let profile = match self.backend.fetch_profile(session.identity.id, token).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Profile lookup for {} failed: {e}", session.identity.id);
                None
            }
        };

        info!("Signed in {username}");
        let identity = session.identity.clone();
        self.state.send_replace(SessionState::signed_in(session, profile));

        Ok(identity)
    }

    pub async fn sign_up(&self, username: &str, password: &str) -> Result<Identity, AuthError> {
        validate_username(username)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }

        let handle = login_handle(username, &self.policy.login_domain);
        let is_admin = self.grants_admin(username, password);
        if is_admin {
            warn!("Bootstrap admin credentials used to register {username}");
        }

        let (is_premium, created) = tokio::join!(
            self.verifier.is_premium(username),
            self.backend.sign_up(&handle, password)
        );
        let session = created.map_err(|e| {
            warn!("Sign-up for {username} failed: {e}");
            AuthError::from(e)
        })?;

        let profile = Profile {
            user_id: session.identity.id,
            username: username.to_string(),
            is_admin,
            is_premium_minecraft: is_premium,
        };
        let token = session.access_token.as_deref();
        let profile = match self.backend.insert_profile(&profile, token).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                error!("Profile sync failed for {}: {e}", session.identity.id);
                None
            }
        };

        info!("Registered {username} (premium: {is_premium})");
        let identity = session.identity.clone();
        self.state.send_replace(SessionState::signed_in(session, profile));

        Ok(identity)
    }

    pub async fn sign_out(&self) {
        let previous = self.state.send_replace(SessionState::default());

        if let Some(token) = previous.access_token {
            if let Err(e) = self.backend.sign_out(&token).await {
                warn!("Backend sign-out failed: {e}");
            }
        }
    }

    /// The access token to send, renewed first when it is about to run out.
    pub async fn token(&self) -> Option<String> {
        let expiring = self
            .state
            .borrow()
            .expires_at
            .is_some_and(|at| at <= Instant::now() + REFRESH_MARGIN);

        if expiring {
            self.refresh().await;
        }

        self.access_token()
    }

    /// Trades the refresh token for a new access token. `false` when there is
    /// nothing to trade or the backend refused.
    pub async fn refresh(&self) -> bool {
        let (id, refresh_token) = {
            let state = self.state.borrow();
            match (&state.identity, &state.refresh_token) {
                (Some(identity), Some(token)) => (identity.id, token.clone()),
                _ => return false,
            }
        };

        match self.backend.refresh(&refresh_token).await {
            Ok(session) => {
                debug!("Renewed access token for {id}");
                self.state.send_modify(|state| {
                    if state.identity.as_ref().is_some_and(|identity| identity.id == id) {
                        state.access_token = session.access_token;
                        state.refresh_token = session.refresh_token;
                        state.expires_at = expiry(session.expires_in);
                    }
                });

                true
            }
            Err(e) => {
                warn!("Token refresh for {id} failed: {e}");
                false
            }
        }
    }

    /// Re-reads the profile so privilege changes made elsewhere take effect.
    /// `None` when it could not be read, even if one is cached.
    pub async fn reload_profile(&self) -> Option<Profile> {
        let id = self.identity()?.id;

        let token = self.token().await;
        let mut fetched = self.backend.fetch_profile(id, token.as_deref()).await;

        if matches!(fetched, Err(RemoteError::Rejected { status: 401, .. })) && self.refresh().await {
            let token = self.access_token();
            fetched = self.backend.fetch_profile(id, token.as_deref()).await;
        }

        match fetched {
            Ok(profile) => {
                self.state.send_modify(|state| {
                    if state.identity.as_ref().is_some_and(|identity| identity.id == id) {
                        state.profile = profile;
                    }
                });

                self.current_profile()
            }
            Err(e) => {
                warn!("Profile reload for {id} failed: {e}");
                None
            }
        }
    }

    fn grants_admin(&self, username: &str, password: &str) -> bool {
        self.policy.bootstrap_admin
            && username.to_lowercase() == BOOTSTRAP_USERNAME
            && password == BOOTSTRAP_PASSWORD
    }
}

struct Visit {
    manager: Arc<SessionManager>,
    last_seen: Instant,
}

/// Visitor sessions by cookie id. A session not seen for the idle timeout is
/// dropped by [`Sessions::expire_idle`].
pub struct Sessions {
    map: DashMap<Uuid, Visit>,
    idle: Duration,
    backend: Arc<dyn Backend>,
    verifier: Arc<dyn IdentityVerifier>,
    policy: Arc<SessionPolicy>,
}

impl Sessions {
    pub fn new(
        backend: Arc<dyn Backend>,
        verifier: Arc<dyn IdentityVerifier>,
        policy: SessionPolicy,
        idle: Duration,
    ) -> Self {
        Self {
            map: DashMap::new(),
            idle,
            backend,
            verifier,
            policy: Arc::new(policy),
        }
    }

    /// A fresh manager, not yet reachable by any cookie.
    pub fn manager(&self) -> Arc<SessionManager> {
        Arc::new(SessionManager::new(
            self.backend.clone(),
            self.verifier.clone(),
            self.policy.clone(),
        ))
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle
    }

    pub fn register(&self, manager: Arc<SessionManager>) -> Uuid {
        let id = Uuid::new_v4();
        self.map.insert(
            id,
            Visit {
                manager,
                last_seen: Instant::now(),
            },
        );

        id
    }

    /// Looks up the visitor's session and marks it as seen.
    pub fn find(&self, headers: &HeaderMap) -> Option<(Uuid, Arc<SessionManager>)> {
        let id = cookie_value(headers, SESSION_COOKIE)?.parse().ok()?;
        let mut visit = self.map.get_mut(&id)?;
        visit.last_seen = Instant::now();

        Some((id, visit.manager.clone()))
    }

    pub fn close(&self, id: Uuid) -> Option<Arc<SessionManager>> {
        self.map.remove(&id).map(|(_, visit)| visit.manager)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Removes every session idle for at least the timeout.
    pub fn sweep(&self) -> Vec<Arc<SessionManager>> {
        let now = Instant::now();
        let mut expired = Vec::new();

        self.map.retain(|_, visit| {
            let keep = now.duration_since(visit.last_seen) < self.idle;
            if !keep {
                expired.push(visit.manager.clone());
            }

            keep
        });

        expired
    }

    /// Sweeps every `every` until `cancel` fires. Expired sessions are signed
    /// out of the backend.
    pub fn expire_idle(self: &Arc<Self>, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let sessions = self.clone();

        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let expired = sessions.sweep();
                if expired.is_empty() {
                    continue;
                }

                info!("Expired {} idle sessions, {} active", expired.len(), sessions.len());
                for manager in expired {
                    manager.sign_out().await;
                }
            }

            debug!("Session sweep stopped");
        })
    }
}

pub fn session_cookie(id: Uuid, max_age: Duration) -> String {
    format!(
        "{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        max_age.as_secs()
    )
}

pub fn expired_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|header| header.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then_some(value)
        })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::http::HeaderValue;
    use remote::{
        ChangeFeed, MemoryBackend, Query, RemoteError,
        models::{AuthSession, Table},
    };
    use serde_json::Value;

    use super::*;

    struct FixedVerifier(bool);

    #[async_trait]
    impl IdentityVerifier for FixedVerifier {
        async fn is_premium(&self, _username: &str) -> bool {
            self.0
        }
    }

    fn manager_with(backend: Arc<MemoryBackend>, bootstrap_admin: bool) -> SessionManager {
        SessionManager::new(
            backend,
            Arc::new(FixedVerifier(true)),
            Arc::new(SessionPolicy {
                login_domain: "confessionmc.fun".to_string(),
                bootstrap_admin,
            }),
        )
    }

    #[test]
    fn test_login_handle() {
        let handle = login_handle("SteveTheBuilder", "confessionmc.fun");

        assert_eq!(handle, "stevethebuilder@confessionmc.fun");
        assert_eq!(login_handle("stevethebuilder", "confessionmc.fun"), handle);
        assert_eq!(login_handle("SteveTheBuilder", "confessionmc.fun"), handle);
    }

    #[test]
    fn test_username_rules() {
        assert!(validate_username("Steve_01").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("way_too_long_for_the_game").is_err());
        assert!(validate_username("no spaces").is_err());
    }

    #[tokio::test]
    async fn test_sign_up_creates_profile() {
        let backend = Arc::new(MemoryBackend::new());
        let manager = manager_with(backend.clone(), true);

        let identity = manager.sign_up("Steve", "hunter22").await.unwrap();
        let profile = manager.current_profile().unwrap();

        assert_eq!(identity.email, "steve@confessionmc.fun");
        assert_eq!(profile.user_id, identity.id);
        assert_eq!(profile.username, "Steve");
        assert!(profile.is_premium_minecraft);
        assert!(!profile.is_admin);
        assert!(manager.access_token().is_some());
    }

    #[tokio::test]
    async fn test_bootstrap_credentials_grant_admin() {
        let backend = Arc::new(MemoryBackend::new());

        let manager = manager_with(backend.clone(), true);
        manager.sign_up("AliteAxolot", "ayush59321").await.unwrap();
        assert!(manager.current_profile().unwrap().is_admin);

        let manager = manager_with(backend.clone(), true);
        manager.sign_up("someone_else", "ayush59321").await.unwrap();
        assert!(!manager.current_profile().unwrap().is_admin);
    }

    #[tokio::test]
    async fn test_bootstrap_needs_exact_password() {
        let manager = manager_with(Arc::new(MemoryBackend::new()), true);

        manager.sign_up("aliteaxolot", "ayush59322").await.unwrap();

        assert!(!manager.current_profile().unwrap().is_admin);
    }

    #[tokio::test]
    async fn test_bootstrap_disabled() {
        let manager = manager_with(Arc::new(MemoryBackend::new()), false);

        manager.sign_up("aliteaxolot", "ayush59321").await.unwrap();

        assert!(!manager.current_profile().unwrap().is_admin);
    }

    #[tokio::test]
    async fn test_duplicate_username_is_case_insensitive() {
        let backend = Arc::new(MemoryBackend::new());
        manager_with(backend.clone(), true)
            .sign_up("Steve", "hunter22")
            .await
            .unwrap();

        let error = manager_with(backend, true)
            .sign_up("STEVE", "hunter22")
            .await
            .unwrap_err();

        assert_eq!(error.to_string(), "User already registered");
    }

    #[tokio::test]
    async fn test_sign_up_validation() {
        let manager = manager_with(Arc::new(MemoryBackend::new()), true);

        assert!(matches!(
            manager.sign_up("Steve", "12345").await,
            Err(AuthError::WeakPassword)
        ));
        assert!(matches!(
            manager.sign_up("S", "hunter22").await,
            Err(AuthError::InvalidUsername)
        ));
        assert!(manager.identity().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_loads_profile_and_notifies() {
        let backend = Arc::new(MemoryBackend::new());
        manager_with(backend.clone(), true)
            .sign_up("Alex", "hunter22")
            .await
            .unwrap();

        let manager = manager_with(backend, true);
        let mut changes = manager.subscribe();
        manager.sign_in("alex", "hunter22").await.unwrap();

        assert!(changes.has_changed().unwrap());
        assert_eq!(
            changes.borrow_and_update().profile.as_ref().unwrap().username,
            "Alex"
        );
    }

    #[tokio::test]
    async fn test_sign_in_failure_surfaces_message() {
        let manager = manager_with(Arc::new(MemoryBackend::new()), true);

        let error = manager.sign_in("ghost", "hunter22").await.unwrap_err();

        assert_eq!(error.to_string(), "Invalid login credentials");
        assert!(manager.current_profile().is_none());
    }

    /// Accepts accounts but refuses every profile row.
    struct NoProfiles(MemoryBackend);

    #[async_trait]
    impl Backend for NoProfiles {
        async fn sign_in(&self, handle: &str, password: &str) -> Result<AuthSession, RemoteError> {
            self.0.sign_in(handle, password).await
        }

        async fn sign_up(&self, handle: &str, password: &str) -> Result<AuthSession, RemoteError> {
            self.0.sign_up(handle, password).await
        }

        async fn sign_out(&self, token: &str) -> Result<(), RemoteError> {
            self.0.sign_out(token).await
        }

        async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, RemoteError> {
            self.0.refresh(refresh_token).await
        }

        async fn select(&self, query: &Query, token: Option<&str>) -> Result<Vec<Value>, RemoteError> {
            self.0.select(query, token).await
        }

        async fn insert(
            &self,
            table: Table,
            row: Value,
            token: Option<&str>,
        ) -> Result<Value, RemoteError> {
            if table == Table::Profiles {
                return Err(RemoteError::rejected(403, "new row violates row-level security policy"));
            }
            self.0.insert(table, row, token).await
        }

        async fn update(
            &self,
            table: Table,
            id: Uuid,
            patch: Value,
            token: Option<&str>,
        ) -> Result<Value, RemoteError> {
            self.0.update(table, id, patch, token).await
        }

        async fn delete(&self, table: Table, id: Uuid, token: Option<&str>) -> Result<(), RemoteError> {
            self.0.delete(table, id, token).await
        }

        fn changes(&self) -> &ChangeFeed {
            self.0.changes()
        }
    }

    #[tokio::test]
    async fn test_profile_sync_failure_keeps_identity() {
        let manager = SessionManager::new(
            Arc::new(NoProfiles(MemoryBackend::new())),
            Arc::new(FixedVerifier(false)),
            Arc::new(SessionPolicy {
                login_domain: "confessionmc.fun".to_string(),
                bootstrap_admin: true,
            }),
        );

        let identity = manager.sign_up("Herobrine", "hunter22").await.unwrap();

        assert_eq!(manager.identity(), Some(identity));
        assert!(manager.current_profile().is_none());
    }

    #[tokio::test]
    async fn test_sign_out_clears_state() {
        let manager = manager_with(Arc::new(MemoryBackend::new()), true);
        manager.sign_up("Steve", "hunter22").await.unwrap();

        manager.sign_out().await;

        assert!(manager.identity().is_none());
        assert!(manager.current_profile().is_none());
        assert!(manager.access_token().is_none());
    }

    #[tokio::test]
    async fn test_reload_sees_revoked_privilege() {
        let backend = Arc::new(MemoryBackend::new());
        let manager = manager_with(backend.clone(), true);
        manager.sign_up("aliteaxolot", "ayush59321").await.unwrap();
        assert!(manager.current_profile().unwrap().is_admin);

        let row = backend.rows(Table::Profiles).remove(0);
        let id = row["id"].as_str().unwrap().parse().unwrap();
        backend
            .update(Table::Profiles, id, serde_json::json!({ "is_admin": false }), None)
            .await
            .unwrap();

        assert!(!manager.reload_profile().await.unwrap().is_admin);
    }

    #[test]
    fn test_cookie_lookup() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {SESSION_COOKIE}={id}")).unwrap(),
        );

        assert_eq!(cookie_value(&headers, SESSION_COOKIE), Some(id.to_string().as_str()));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    fn registry(idle: Duration) -> Arc<Sessions> {
        Arc::new(Sessions::new(
            Arc::new(MemoryBackend::new()),
            Arc::new(FixedVerifier(false)),
            SessionPolicy {
                login_domain: "confessionmc.fun".to_string(),
                bootstrap_admin: false,
            },
            idle,
        ))
    }

    fn cookie(id: Uuid) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&format!("{SESSION_COOKIE}={id}")).unwrap());

        headers
    }

    #[test]
    fn test_registry() {
        let sessions = registry(Duration::from_secs(600));
        let id = sessions.register(sessions.manager());

        assert!(sessions.find(&cookie(id)).is_some());
        assert!(sessions.close(id).is_some());
        assert!(sessions.find(&cookie(id)).is_none());
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_session_cookie_lifetime() {
        let id = Uuid::new_v4();

        let issued = session_cookie(id, Duration::from_secs(86400));

        assert!(issued.starts_with(&format!("{SESSION_COOKIE}={id};")));
        assert!(issued.contains("Max-Age=86400"));
        assert!(expired_cookie().contains("Max-Age=0"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_expire() {
        let sessions = registry(Duration::from_secs(600));
        let idle = sessions.register(sessions.manager());
        let active = sessions.register(sessions.manager());
        let cancel = CancellationToken::new();
        let task = sessions.expire_idle(Duration::from_secs(60), cancel.clone());

        for _ in 0..15 {
            tokio::time::sleep(Duration::from_secs(60)).await;
            assert!(sessions.find(&cookie(active)).is_some());
        }

        assert!(sessions.find(&cookie(idle)).is_none());
        assert_eq!(sessions.len(), 1);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_signs_out_expired_session() {
        let backend = Arc::new(MemoryBackend::new());
        let sessions = Sessions::new(
            backend.clone(),
            Arc::new(FixedVerifier(false)),
            SessionPolicy {
                login_domain: "confessionmc.fun".to_string(),
                bootstrap_admin: false,
            },
            Duration::from_secs(600),
        );
        let manager = sessions.manager();
        manager.sign_up("Steve", "hunter22").await.unwrap();
        let token = manager.access_token();
        sessions.register(manager.clone());

        tokio::time::advance(Duration::from_secs(601)).await;
        let expired = sessions.sweep();
        assert_eq!(expired.len(), 1);
        expired[0].sign_out().await;

        assert!(manager.identity().is_none());
        let revoked = backend
            .select(&Query::table(Table::Ranks), token.as_deref())
            .await;
        assert!(matches!(revoked, Err(RemoteError::Rejected { status: 401, .. })));
    }

    #[tokio::test]
    async fn test_reload_refreshes_rejected_token() {
        let backend = Arc::new(MemoryBackend::new());
        let manager = manager_with(backend.clone(), true);
        manager.sign_up("aliteaxolot", "ayush59321").await.unwrap();
        let stale = manager.access_token();

        backend.expire_access_tokens();
        let profile = manager.reload_profile().await;

        assert!(profile.unwrap().is_admin);
        assert!(manager.access_token().is_some());
        assert_ne!(manager.access_token(), stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_renewed_before_expiry() {
        let manager = manager_with(Arc::new(MemoryBackend::new()), true);
        manager.sign_up("Steve", "hunter22").await.unwrap();
        let first = manager.token().await;

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(manager.token().await, first);

        tokio::time::advance(Duration::from_secs(3500)).await;
        let renewed = manager.token().await;
        assert!(renewed.is_some());
        assert_ne!(renewed, first);
    }

    #[tokio::test]
    async fn test_unreadable_profile_is_not_returned() {
        let backend = Arc::new(MemoryBackend::new());
        let manager = manager_with(backend.clone(), true);
        manager.sign_up("aliteaxolot", "ayush59321").await.unwrap();

        backend.expire_access_tokens();
        backend.set_failing(true);

        assert!(manager.reload_profile().await.is_none());
        assert!(!manager.refresh().await);
    }
}
