mod auth;
mod cloud;

use super::{
    constants::{
        collection, field, role,
        session::{ANONYMOUS_USERNAME, LOGIN_ACTION},
    },
    debug, error, get_doc, info, warn, Document, DocumentGateway, Fields, FiresiteError, FiresiteResult, Lookup,
    Subscription,
};
use serde_json::{json, Value};
use sha3::{Digest, Sha3_256};
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, Weak,
    },
};
use tokio::sync::{mpsc, watch};

pub use auth::{AuthCallback, AuthProvider, AuthUser};
pub use cloud::{CloudClient, CloudRequest, CloudTransport};

/// Hex sha3-256 of `salt:username||password`, as expected by the login action.
pub fn password_hash(salt_prefix: &str, username: &str, password: &str) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(format!("{salt_prefix}:{username}||{password}").as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The signed in user: an anonymous identity or a loaded `User` record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionUser {
    pub id: String,
    pub username: String,
    pub anon: bool,
    pub roles: BTreeMap<String, bool>,
    pub fields: Fields,
}

impl SessionUser {
    pub fn anonymous<S: Into<String>>(id: S) -> Self {
        Self {
            id: id.into(),
            username: ANONYMOUS_USERNAME.into(),
            anon: true,
            ..Default::default()
        }
    }

    pub fn from_document(doc: Document) -> Self {
        let roles = doc
            .get(field::ROLES)
            .and_then(Value::as_object)
            .map(|roles| {
                roles
                    .iter()
                    .map(|(name, granted)| (name.clone(), granted.as_bool().unwrap_or(false)))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            id: doc.id().to_string(),
            username: doc.get_str(field::USERNAME).unwrap_or_default().to_string(),
            anon: false,
            roles,
            fields: doc.into_fields(),
        }
    }

    /// Whether the user holds `role` or the admin role.
    pub fn has_role(&self, wanted: &str) -> bool {
        let granted = |name: &str| self.roles.get(name).copied().unwrap_or(false);
        granted(wanted) || granted(role::ADMIN)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    /// The initial identity has not been resolved yet.
    #[default]
    Pending,
    SignedIn(SessionUser),
    SignedOut,
}

impl SessionState {
    pub fn user(&self) -> Option<&SessionUser> {
        match self {
            Self::SignedIn(user) => Some(user),
            _ => None,
        }
    }
}

/// Tracks who is signed in and performs login and logout.
pub struct Session {
    gateway: Arc<dyn DocumentGateway>,
    auth: Arc<dyn AuthProvider>,
    cloud: CloudClient,
    salt_prefix: String,
    state: watch::Sender<SessionState>,
    awaiting_initial: AtomicBool,
    /// Bumped on every attach and detach; queued notifications of an older
    /// attachment are dropped.
    attachment: AtomicU64,
    listener: Mutex<Option<Subscription>>,
}

impl Session {
    pub fn new<S: Into<String>>(
        gateway: Arc<dyn DocumentGateway>,
        auth: Arc<dyn AuthProvider>,
        cloud: CloudClient,
        salt_prefix: S,
    ) -> Self {
        Self {
            gateway,
            auth,
            cloud,
            salt_prefix: salt_prefix.into(),
            state: watch::Sender::new(SessionState::Pending),
            awaiting_initial: AtomicBool::new(true),
            attachment: AtomicU64::new(0),
            listener: Mutex::default(),
        }
    }

    pub fn cloud(&self) -> &CloudClient {
        &self.cloud
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn publish(&self, state: SessionState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    /// Feeds auth provider notifications into the session, in order. Must be
    /// called from within a tokio runtime.
    pub fn attach(self: &Arc<Self>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = self.auth.on_auth_state_changed(Arc::new(move |user: Option<AuthUser>| {
            if tx.send(user).is_err() {
                debug!("session gone, dropping auth state change");
            }
        }));

        let attachment = self.attachment.fetch_add(1, Ordering::SeqCst) + 1;
        let session: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(user) = rx.recv().await {
                let Some(session) = session.upgrade() else {
                    break;
                };
                if session.attachment.load(Ordering::SeqCst) != attachment {
                    break;
                }
                session.handle_auth_state(user).await;
            }
        });

        let previous = self
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(subscription);
        if let Some(previous) = previous {
            previous.unsubscribe();
        }
    }

    /// Stops listening to the auth provider.
    pub fn detach(&self) {
        self.attachment.fetch_add(1, Ordering::SeqCst);
        let listener = self.listener.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(listener) = listener {
            listener.unsubscribe();
        }
    }

    /// Applies an identity change reported by the auth provider.
    ///
    /// The very first report without a user signs in anonymously instead of
    /// logging out.
    pub async fn handle_auth_state(&self, user: Option<AuthUser>) {
        let initial = self.awaiting_initial.swap(false, Ordering::SeqCst);
        if initial && user.is_none() {
            match self.auth.sign_in_anonymously().await {
                Ok(user) => self.apply(Some(user)).await,
                Err(e) => {
                    warn!("anonymous sign-in failed: {e}");
                    self.publish(SessionState::SignedOut);
                }
            }
            return;
        }
        self.apply(user).await;
    }

    async fn apply(&self, user: Option<AuthUser>) {
        match user {
            None => {
                info!("logout complete");
                self.publish(SessionState::SignedOut);
            }
            Some(user) if user.anonymous => {
                self.publish(SessionState::SignedIn(SessionUser::anonymous(user.uid)));
            }
            Some(user) => {
                let known = self
                    .current_user_now()
                    .is_some_and(|current| !current.anon && current.id == user.uid);
                if known {
                    return;
                }
                let loaded = self.load_user(&user.uid).await;
                self.publish(SessionState::SignedIn(loaded));
            }
        }
    }

    async fn load_user(&self, uid: &str) -> SessionUser {
        let fallback = || SessionUser {
            id: uid.to_string(),
            ..Default::default()
        };
        match get_doc(&*self.gateway, &Lookup::by_id(collection::USER, uid)).await {
            Ok(Some(doc)) => SessionUser::from_document(doc),
            Ok(None) => {
                warn!("no user record for {uid}");
                fallback()
            }
            Err(e) => {
                error!("failed to load user {uid}: {e}");
                fallback()
            }
        }
    }

    /// Exchanges credentials for a token through the login action and signs
    /// in with it.
    pub async fn login(&self, username: &str, password: &str) -> FiresiteResult<SessionUser> {
        let username = username.to_lowercase();
        let hash = password_hash(&self.salt_prefix, &username, password);

        let response = self
            .cloud
            .call(LOGIN_ACTION, json!({ "u": username, "h": hash }), false)
            .await
            .map_err(|e| {
                warn!("login failed for {username}: {e}");
                match e {
                    FiresiteError::Cloud { message, .. } => FiresiteError::Auth(message),
                    other => FiresiteError::Auth(other.to_string()),
                }
            })?;
        let token = response
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| FiresiteError::Auth("login response carried no token".into()))?;

        let user = self.auth.sign_in_with_token(token).await.map_err(|e| {
            warn!("token sign-in failed for {username}: {e}");
            FiresiteError::Auth(e.to_string())
        })?;
        self.awaiting_initial.store(false, Ordering::SeqCst);
        self.apply(Some(user)).await;

        self.current_user_now()
            .ok_or_else(|| FiresiteError::Auth("signed in user could not be resolved".into()))
    }

    /// Forgets the current user; signs out of the provider unless anonymous.
    pub async fn logout(&self) -> FiresiteResult<()> {
        let anon = self.current_user_now().is_some_and(|user| user.anon);
        self.publish(SessionState::SignedOut);
        if !anon {
            self.auth.sign_out().await?;
        }
        Ok(())
    }

    /// Waits until the initial identity is resolved.
    pub async fn current_user(&self) -> Option<SessionUser> {
        let mut state = self.state.subscribe();
        let resolved = state
            .wait_for(|state| !matches!(state, SessionState::Pending))
            .await
            .ok()?;
        resolved.user().cloned()
    }

    pub fn current_user_now(&self) -> Option<SessionUser> {
        self.state.borrow().user().cloned()
    }

    /// Empty when nobody is signed in.
    pub fn current_user_id(&self) -> String {
        self.state.borrow().user().map(|user| user.id.clone()).unwrap_or_default()
    }

    pub fn is(&self, role: &str) -> bool {
        self.state.borrow().user().is_some_and(|user| user.has_role(role))
    }

    pub fn require(&self, role: &str) -> FiresiteResult<()> {
        if self.is(role) {
            Ok(())
        } else {
            Err(FiresiteError::Forbidden(role.to_string()))
        }
    }

    /// True unless a member or admin is signed in.
    pub fn is_anonymous(&self) -> bool {
        !self.is(role::ADMIN) && !self.is(role::MEMBER)
    }

    pub fn is_logged_in(&self) -> bool {
        !self.is_anonymous()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.detach();
    }
}
