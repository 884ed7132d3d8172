use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use parking_lot::{Mutex, RwLock};
use tokio::{runtime::Handle, sync::broadcast, sync::watch};
use tracing::{debug, info, warn};

use super::{ActivitySignal, IdentityProvider, InactivityWatch, SessionState};
use crate::{error::StoreError, models::User, storage::CredentialStore};

const NOTICE_CAPACITY: usize = 8;

/// Session transitions the host must react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionNotice {
    /// The inactivity limit elapsed and the session was logged out.
    Expired,
}

/// Owner of the authentication state. Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct SessionManager {
    shared: Arc<Shared>,
}

struct Shared {
    state: RwLock<SessionState>,
    resolving: AtomicBool,
    /// Bumped by every logout; a resolution that straddles one is discarded.
    logouts: AtomicU64,
    store: Arc<dyn CredentialStore>,
    identity: Arc<dyn IdentityProvider>,
    inactivity_limit: Duration,
    watch: Mutex<Option<InactivityWatch>>,
    snapshots: watch::Sender<SessionState>,
    notices: broadcast::Sender<SessionNotice>,
}

impl SessionManager {
    /// New manager in the loading state. Call [`resolve_session`](Self::resolve_session) once.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        identity: Arc<dyn IdentityProvider>,
        inactivity_limit: Duration,
    ) -> Self {
        let (snapshots, _) = watch::channel(SessionState::initial());
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(SessionState::initial()),
                resolving: AtomicBool::new(false),
                logouts: AtomicU64::new(0),
                store,
                identity,
                inactivity_limit,
                watch: Mutex::new(None),
                snapshots,
                notices,
            }),
        }
    }

    /// Current state.
    pub fn snapshot(&self) -> SessionState {
        self.shared.state.read().clone()
    }

    /// Receive every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.snapshots.subscribe()
    }

    /// Receive [`SessionNotice`]s.
    pub fn notices(&self) -> broadcast::Receiver<SessionNotice> {
        self.shared.notices.subscribe()
    }

    /// Logged-in user, if any.
    pub fn user(&self) -> Option<User> {
        self.shared.state.read().user.clone()
    }

    /// Determine the session from the persisted credential.
    ///
    /// Without a token no request is made. With a token the identity endpoint decides;
    /// any failure clears the credential and leaves the session logged out. `loading`
    /// is `false` afterwards in every case. A logout while the lookup is in flight wins
    /// over its result. A call made while another is still running returns the current
    /// snapshot and changes nothing.
    pub async fn resolve_session(&self) -> SessionState {
        if self
            .shared
            .resolving
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("session resolution already in progress");
            return self.snapshot();
        }

        let generation = self.shared.logouts.load(Ordering::Acquire);
        let user = match self.shared.store.token() {
            None => {
                debug!("no stored credential");
                None
            }
            Some(_) => match self.shared.identity.current_user().await {
                Ok(user) => {
                    info!(user_id = user.id, role = ?user.role, "session restored");
                    Some(user)
                }
                Err(err) => {
                    warn!(%err, "stored credential rejected; continuing logged out");
                    if let Err(err) = self.shared.store.clear() {
                        warn!(%err, "failed to clear rejected credential");
                    }
                    None
                }
            },
        };

        self.commit(user, false, Some(generation));
        self.shared.resolving.store(false, Ordering::Release);
        self.snapshot()
    }

    /// Persist a credential from login or email verification and become authenticated.
    pub fn establish(&self, token: &str, user: User) -> Result<(), StoreError> {
        self.shared.store.save(token, &user)?;
        info!(user_id = user.id, role = ?user.role, "logged in");
        self.transition(Some(user));
        Ok(())
    }

    /// Drop the session locally. Safe to call when already logged out.
    pub fn logout(&self) {
        if self.end_session() {
            info!("logged out");
        }
    }

    /// Report user input to the inactivity timer.
    pub fn record_activity(&self, signal: ActivitySignal) {
        if let Some(watch) = self.shared.watch.lock().as_ref() {
            watch.touch(signal);
        }
    }

    /// `true` while an inactivity timer is armed.
    pub fn is_watching(&self) -> bool {
        self.shared
            .watch
            .lock()
            .as_ref()
            .is_some_and(|watch| !watch.is_finished())
    }

    fn expire(&self) {
        if self.end_session() {
            info!(
                limit_secs = self.shared.inactivity_limit.as_secs(),
                "logged out after inactivity"
            );
            let _ = self.shared.notices.send(SessionNotice::Expired);
        }
    }

    /// Clear credential and state. Returns whether a session was actually ended.
    fn end_session(&self) -> bool {
        self.shared.logouts.fetch_add(1, Ordering::AcqRel);
        let token = self.shared.store.token();
        if let Err(err) = self.shared.store.clear() {
            warn!(%err, "failed to clear stored credential");
        }
        // An in-flight resolution still owns `loading`.
        let loading = self.shared.resolving.load(Ordering::Acquire);
        let was_authenticated = self.commit(None, loading, None);
        if let Some(token) = token {
            self.notify_server(token);
        }
        was_authenticated
    }

    fn notify_server(&self, token: String) {
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        let identity = Arc::clone(&self.shared.identity);
        handle.spawn(async move {
            if let Err(err) = identity.end_session(&token).await {
                debug!(%err, "logout notification failed");
            }
        });
    }

    fn transition(&self, user: Option<User>) -> bool {
        self.commit(user, false, None)
    }

    /// Apply a user and keep the inactivity watch in step with the authenticated flag.
    /// With `since`, the user is dropped if a logout happened after that generation.
    /// Returns the previous authenticated flag.
    fn commit(&self, user: Option<User>, loading: bool, since: Option<u64>) -> bool {
        let mut state = self.shared.state.write();
        let user = match since {
            Some(generation) if generation != self.shared.logouts.load(Ordering::Acquire) => {
                if user.is_some() {
                    debug!("logout during session resolution; discarding restored user");
                }
                None
            }
            _ => user,
        };
        let was_authenticated = state.is_authenticated;
        *state = SessionState {
            loading,
            ..SessionState::resolved(user)
        };
        let now_authenticated = state.is_authenticated;

        match (was_authenticated, now_authenticated) {
            (false, true) => self.arm_watch(),
            (true, false) => {
                if self.shared.watch.lock().take().is_some() {
                    debug!("inactivity watch released");
                }
            }
            _ => {}
        }

        let snapshot = state.clone();
        drop(state);
        self.shared.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
        was_authenticated
    }

    fn arm_watch(&self) {
        if Handle::try_current().is_err() {
            warn!("no async runtime; inactivity timeout disabled");
            return;
        }
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let watch = InactivityWatch::start(self.shared.inactivity_limit, move || {
            if let Some(shared) = weak.upgrade() {
                SessionManager { shared }.expire();
            }
        });
        debug!(
            limit_secs = self.shared.inactivity_limit.as_secs(),
            "inactivity watch armed"
        );
        *self.shared.watch.lock() = Some(watch);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use reqwest::StatusCode;

    use super::*;
    use crate::{
        error::ApiError,
        models::Role,
        navigation::{AdminSection, View},
        session::{evaluate, GuardOutcome, GuardPolicy},
        storage::MemoryCredentialStore,
    };

    const LIMIT: Duration = Duration::from_secs(300);

    fn user(role: Role) -> User {
        User {
            id: 5,
            name: "Chamari".to_string(),
            email: "chamari@example.lk".to_string(),
            role,
            is_verified: Some(true),
            created_at: None,
            total_bookings: None,
        }
    }

    struct FakeIdentity {
        outcome: Option<User>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl FakeIdentity {
        fn ok(user: User) -> Arc<Self> {
            Arc::new(Self {
                outcome: Some(user),
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                outcome: None,
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeIdentity {
        async fn current_user(&self) -> Result<User, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.outcome.clone().ok_or_else(|| ApiError::Http {
                status: StatusCode::UNAUTHORIZED,
                message: "invalid token".to_string(),
            })
        }
    }

    fn manager(store: Arc<MemoryCredentialStore>, identity: Arc<FakeIdentity>) -> SessionManager {
        SessionManager::new(store, identity, LIMIT)
    }

    fn assert_invariants(state: &SessionState) {
        if state.is_authenticated {
            assert!(state.user.is_some());
        }
        if state.is_admin() {
            assert!(state.is_authenticated);
        }
    }

    #[tokio::test]
    async fn starts_loading() {
        let session = manager(
            Arc::new(MemoryCredentialStore::new()),
            FakeIdentity::failing(),
        );
        let state = session.snapshot();
        assert!(state.loading);
        assert!(!state.is_authenticated);
        assert_eq!(
            evaluate(GuardPolicy::AUTHENTICATED, &state),
            GuardOutcome::Loading
        );
    }

    #[tokio::test]
    async fn no_token_resolves_without_network() {
        let identity = FakeIdentity::ok(user(Role::Customer));
        let session = manager(Arc::new(MemoryCredentialStore::new()), identity.clone());

        let state = session.resolve_session().await;
        assert!(!state.loading);
        assert!(!state.is_authenticated);
        assert!(state.user.is_none());
        assert_eq!(identity.calls(), 0);
        assert!(!session.is_watching());
    }

    #[tokio::test]
    async fn valid_token_restores_user() {
        let store = Arc::new(MemoryCredentialStore::with_token("good"));
        let identity = FakeIdentity::ok(user(Role::Admin));
        let session = manager(store.clone(), identity.clone());

        let state = session.resolve_session().await;
        assert!(!state.loading);
        assert!(state.is_authenticated);
        assert!(state.is_admin());
        assert_invariants(&state);
        assert_eq!(identity.calls(), 1);
        assert_eq!(store.token().as_deref(), Some("good"));
        assert!(session.is_watching());
    }

    #[tokio::test]
    async fn rejected_token_is_cleared() {
        let store = Arc::new(MemoryCredentialStore::with_token("stale"));
        let session = manager(store.clone(), FakeIdentity::failing());

        let state = session.resolve_session().await;
        assert!(!state.loading);
        assert!(!state.is_authenticated);
        assert!(store.token().is_none());
        assert_invariants(&state);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_resolution_is_rejected() {
        let store = Arc::new(MemoryCredentialStore::with_token("good"));
        let identity = Arc::new(FakeIdentity {
            outcome: Some(user(Role::Customer)),
            calls: AtomicUsize::new(0),
            delay: Duration::from_secs(2),
        });
        let session = manager(store, identity.clone());

        let (first, second) = tokio::join!(session.resolve_session(), session.resolve_session());
        assert_eq!(identity.calls(), 1);
        assert!(first.is_authenticated);
        assert!(second.loading, "second call must not alter state");
        assert!(session.snapshot().is_authenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn logout_during_resolution_wins() {
        let store = Arc::new(MemoryCredentialStore::with_token("good"));
        let identity = Arc::new(FakeIdentity {
            outcome: Some(user(Role::Customer)),
            calls: AtomicUsize::new(0),
            delay: Duration::from_secs(2),
        });
        let session = manager(store.clone(), identity);

        let resolver = session.clone();
        let pending = tokio::spawn(async move { resolver.resolve_session().await });
        tokio::time::sleep(Duration::from_secs(1)).await;
        session.logout();

        let mid = session.snapshot();
        assert!(mid.loading, "logout must not end the loading phase");
        assert_eq!(
            evaluate(GuardPolicy::AUTHENTICATED, &mid),
            GuardOutcome::Loading
        );

        let end = pending.await.unwrap();
        assert!(!end.loading);
        assert!(!end.is_authenticated);
        assert!(end.user.is_none());
        assert!(store.token().is_none());
        assert!(!session.is_watching());
        assert_eq!(session.snapshot(), end);
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let store = Arc::new(MemoryCredentialStore::new());
        let session = manager(store.clone(), FakeIdentity::ok(user(Role::Customer)));
        session.resolve_session().await;
        session.establish("fresh", user(Role::Customer)).unwrap();
        assert!(session.is_watching());

        session.logout();
        let once = session.snapshot();
        session.logout();
        let twice = session.snapshot();

        assert_eq!(once, twice);
        assert!(!twice.is_authenticated);
        assert!(twice.user.is_none());
        assert!(store.token().is_none());
        assert!(!session.is_watching());
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let session = manager(
            Arc::new(MemoryCredentialStore::new()),
            FakeIdentity::failing(),
        );
        let mut updates = session.subscribe();
        session.resolve_session().await;
        assert!(updates.has_changed().unwrap());
        assert!(!updates.borrow_and_update().loading);

        session.establish("tok", user(Role::Customer)).unwrap();
        assert!(updates.borrow_and_update().is_authenticated);

        session.logout();
        session.logout();
        assert!(updates.has_changed().unwrap());
        assert!(!updates.borrow_and_update().is_authenticated);
        assert!(!updates.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn inactivity_logs_out_and_notifies_once() {
        let store = Arc::new(MemoryCredentialStore::with_token("good"));
        let session = manager(store.clone(), FakeIdentity::ok(user(Role::Customer)));
        let mut notices = session.notices();
        session.resolve_session().await;
        assert!(session.snapshot().is_authenticated);

        tokio::time::sleep(LIMIT + Duration::from_secs(1)).await;

        let state = session.snapshot();
        assert!(!state.is_authenticated);
        assert!(state.user.is_none());
        assert!(store.token().is_none());
        assert_eq!(notices.try_recv().unwrap(), SessionNotice::Expired);
        assert!(notices.try_recv().is_err());
        assert_eq!(
            View::Admin(AdminSection::Dashboard).expiry_redirect(),
            Some(View::Login)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn activity_before_deadline_keeps_session() {
        let store = Arc::new(MemoryCredentialStore::with_token("good"));
        let session = manager(store, FakeIdentity::ok(user(Role::Customer)));
        let mut notices = session.notices();
        session.resolve_session().await;

        tokio::time::sleep(LIMIT - Duration::from_secs(1)).await;
        session.record_activity(ActivitySignal::PointerMove);
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert!(session.snapshot().is_authenticated);
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_logout_releases_timer() {
        let store = Arc::new(MemoryCredentialStore::with_token("good"));
        let session = manager(store, FakeIdentity::ok(user(Role::Customer)));
        let mut notices = session.notices();
        session.resolve_session().await;

        session.logout();
        tokio::time::sleep(LIMIT * 2).await;
        assert!(notices.try_recv().is_err());

        session.establish("again", user(Role::Customer)).unwrap();
        assert!(session.is_watching());
        tokio::time::sleep(LIMIT + Duration::from_secs(1)).await;
        assert_eq!(notices.try_recv().unwrap(), SessionNotice::Expired);
    }

    #[tokio::test]
    async fn non_admin_never_renders_admin_views() {
        let store = Arc::new(MemoryCredentialStore::with_token("good"));
        let session = manager(store, FakeIdentity::ok(user(Role::Customer)));
        assert_ne!(
            evaluate(GuardPolicy::ADMIN, &session.snapshot()),
            GuardOutcome::Render
        );
        session.resolve_session().await;
        assert_eq!(
            evaluate(GuardPolicy::ADMIN, &session.snapshot()),
            GuardOutcome::Redirect(View::Home)
        );
    }
}
