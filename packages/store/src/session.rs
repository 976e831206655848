//! # Sessions and the identity seam
//!
//! A [`Session`] is the explicit context every repository is built from: it
//! names the owner whose rows may be touched and carries a liveness flag shared
//! by all of its clones. Ending a session (sign-out, teardown) flips that flag,
//! after which:
//!
//! - new repository calls fail with [`crate::StoreError::Unauthorized`];
//! - calls already in flight still return their result to the caller, but do
//!   not touch any snapshot.
//!
//! [`IdentityProvider`] is the minimal contract consumed from the external auth
//! service. Implementations live in the `api` crate (hosted service and a local
//! stub).

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::models::OwnerId;

/// Profile of the signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
}

impl UserInfo {
    /// Get display name, falling back to email if name is not set.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

/// A signed-in user plus the liveness flag scoping their repositories.
#[derive(Clone)]
pub struct Session {
    owner: OwnerId,
    user: UserInfo,
    access_token: Option<String>,
    alive: Arc<AtomicBool>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("owner", &self.owner)
            .field("email", &self.user.email)
            .field("access_token", &self.access_token.as_ref().map(|_| "[HIDDEN]"))
            .field("active", &self.is_active())
            .finish()
    }
}

impl Session {
    pub fn new(user: UserInfo, access_token: Option<String>) -> Self {
        Self {
            owner: OwnerId::new(user.id.clone()),
            user,
            access_token,
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn user(&self) -> &UserInfo {
        &self.user
    }

    /// Bearer token for the data service, if the provider issued one.
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// End this session and every clone of it.
    pub fn end(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

/// Source of the current owner.
pub trait IdentityProvider {
    /// Exchange credentials for a new session.
    fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<Session, AuthError>>;

    /// Owner of the current session, if one is active.
    fn current_owner(&self) -> Option<OwnerId>;

    /// End the current session.
    fn sign_out(&self) -> impl std::future::Future<Output = Result<(), AuthError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_is_shared_by_clones() {
        let session = Session::new(
            UserInfo {
                id: "u1".into(),
                email: "a@example.com".into(),
                name: None,
            },
            Some("token".into()),
        );
        let clone = session.clone();
        assert!(clone.is_active());

        session.end();
        assert!(!clone.is_active());
        assert_eq!(clone.owner().as_str(), "u1");
        assert_eq!(clone.user().display_name(), "a@example.com");
        assert!(!format!("{clone:?}").contains("token"));
    }
}
