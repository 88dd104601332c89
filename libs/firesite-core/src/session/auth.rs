use crate::{FiresiteResult, Subscription};
use async_trait::async_trait;
use std::sync::Arc;

/// An identity as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    pub anonymous: bool,
}

impl AuthUser {
    pub fn anonymous<S: Into<String>>(uid: S) -> Self {
        Self {
            uid: uid.into(),
            anonymous: true,
        }
    }

    pub fn registered<S: Into<String>>(uid: S) -> Self {
        Self {
            uid: uid.into(),
            anonymous: false,
        }
    }
}

/// Called with the new identity, or `None` once signed out.
pub type AuthCallback = Arc<dyn Fn(Option<AuthUser>) + Send + Sync>;

/// The external identity service.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    fn current_user(&self) -> Option<AuthUser>;

    /// Token proving the current identity to cloud functions; `None` when
    /// nobody is signed in.
    async fn id_token(&self) -> FiresiteResult<Option<String>>;

    async fn sign_in_anonymously(&self) -> FiresiteResult<AuthUser>;

    async fn sign_in_with_token(&self, token: &str) -> FiresiteResult<AuthUser>;

    async fn sign_out(&self) -> FiresiteResult<()>;

    /// Registers `callback` for every later identity change. Providers may
    /// also report the restored identity right after registration.
    fn on_auth_state_changed(&self, callback: AuthCallback) -> Subscription;
}
