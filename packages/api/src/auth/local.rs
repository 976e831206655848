//! In-process identity provider with its own registered-user table.
//!
//! Stands in for the hosted auth service in tests and offline runs. Emails are
//! normalised to lowercase; passwords are kept only as Argon2 hashes.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use store::{AuthError, IdentityProvider, OwnerId, Session, UserInfo};
use tracing::info;
use uuid::Uuid;

use super::password::{hash_password, verify_password};

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

struct LocalUser {
    info: UserInfo,
    password_hash: String,
}

#[derive(Default)]
pub struct LocalIdentity {
    users: Mutex<HashMap<String, LocalUser>>,
    current: Mutex<Option<Session>>,
}

impl LocalIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new user and sign them in.
    pub fn register(&self, email: &str, password: &str, name: &str) -> Result<Session, AuthError> {
        let email = email.trim().to_lowercase();
        let name = name.trim();

        if !is_valid_email(&email) {
            return Err(AuthError::Validation("Invalid email address".into()));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let mut users = lock(&self.users);
        if users.contains_key(&email) {
            return Err(AuthError::AlreadyRegistered);
        }

        let info = UserInfo {
            id: Uuid::new_v4().to_string(),
            email: email.clone(),
            name: (!name.is_empty()).then(|| name.to_string()),
        };
        users.insert(
            email,
            LocalUser {
                info: info.clone(),
                password_hash: hash_password(password)?,
            },
        );
        drop(users);

        info!(user_id = %info.id, "registered local user");
        Ok(self.start(info))
    }

    fn start(&self, info: UserInfo) -> Session {
        let session = Session::new(info, None);
        if let Some(previous) = lock(&self.current).replace(session.clone()) {
            previous.end();
        }
        session
    }
}

/// `local@domain.tld`: one `@`, no whitespace, a dot inside the domain.
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .rsplit_once('.')
        .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl IdentityProvider for LocalIdentity {
    async fn authenticate(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = email.trim().to_lowercase();
        let info = {
            let users = lock(&self.users);
            let user = users.get(&email).ok_or(AuthError::InvalidCredentials)?;
            if !verify_password(password, &user.password_hash)? {
                return Err(AuthError::InvalidCredentials);
            }
            user.info.clone()
        };
        info!(user_id = %info.id, "signed in");
        Ok(self.start(info))
    }

    fn current_owner(&self) -> Option<OwnerId> {
        lock(&self.current)
            .as_ref()
            .filter(|s| s.is_active())
            .map(|s| s.owner().clone())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let session = lock(&self.current).take().ok_or(AuthError::NotSignedIn)?;
        session.end();
        info!(owner = %session.owner(), "signed out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_sign_in_sign_out() {
        let identity = LocalIdentity::new();
        let registered = identity
            .register("  Alice@Example.com ", "long enough", "Alice")
            .unwrap();
        assert_eq!(registered.user().email, "alice@example.com");
        assert_eq!(identity.current_owner(), Some(registered.owner().clone()));

        let session = identity
            .authenticate("alice@example.com", "long enough")
            .await
            .unwrap();
        assert_eq!(session.owner(), registered.owner());
        assert!(!registered.is_active());

        identity.sign_out().await.unwrap();
        assert!(!session.is_active());
        assert_eq!(identity.current_owner(), None);
        assert_eq!(identity.sign_out().await, Err(AuthError::NotSignedIn));
    }

    #[test]
    fn test_email_shape() {
        for ok in ["a@b.c", "first.last@mail.example.org"] {
            assert!(is_valid_email(ok), "{ok}");
        }
        for bad in ["", "nope", "a@b", "@b.c", "a@.c", "a@b.", "a b@c.d", "a@b@c.d"] {
            assert!(!is_valid_email(bad), "{bad}");
        }
        assert!(matches!(
            LocalIdentity::new().register("a@b", "long enough", ""),
            Err(AuthError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_rejections() {
        let identity = LocalIdentity::new();
        assert!(matches!(
            identity.register("nope", "long enough", ""),
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            identity.register("a@b.c", "short", ""),
            Err(AuthError::Validation(_))
        ));

        identity.register("a@b.c", "long enough", "").unwrap();
        assert_eq!(
            identity.register("A@B.C", "another one", "").unwrap_err(),
            AuthError::AlreadyRegistered
        );
        assert_eq!(
            identity.authenticate("a@b.c", "wrong password").await.unwrap_err(),
            AuthError::InvalidCredentials
        );
        assert_eq!(
            identity.authenticate("x@y.z", "long enough").await.unwrap_err(),
            AuthError::InvalidCredentials
        );
    }
}
