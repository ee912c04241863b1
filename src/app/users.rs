//! Account store and login tracking.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

/// An authenticated user, held by the handlers of its session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoggedUser {
    username: String,
}

impl LoggedUser {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginError {
    #[error("username and password must not be empty")]
    EmptyCredentials,
    #[error("user '{0}' already exists")]
    UserExists(String),
    #[error("wrong username or password")]
    WrongCredentials,
    #[error("user '{0}' is already logged in")]
    AlreadyLoggedIn(String),
}

#[derive(Debug)]
struct Account {
    password: String,
    #[allow(dead_code)]
    email: String,
}

/// Registered accounts plus the set of users with a live session.
#[derive(Debug, Default)]
pub struct LoginManager {
    accounts: RwLock<HashMap<String, Account>>,
    logged_in: RwLock<HashSet<String>>,
}

impl LoginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an account and log it in.
    pub fn signup(&self, username: &str, password: &str, email: &str) -> Result<LoggedUser, LoginError> {
        if username.is_empty() || password.is_empty() {
            return Err(LoginError::EmptyCredentials);
        }

        // Lock order: accounts, then logged_in (same as `login`)
        let mut accounts = self.accounts.write();
        if accounts.contains_key(username) {
            return Err(LoginError::UserExists(username.to_string()));
        }
        let mut logged_in = self.logged_in.write();
        if !logged_in.insert(username.to_string()) {
            return Err(LoginError::AlreadyLoggedIn(username.to_string()));
        }
        accounts.insert(
            username.to_string(),
            Account {
                password: password.to_string(),
                email: email.to_string(),
            },
        );
        drop(logged_in);
        drop(accounts);

        debug!(user = username, "Signed up");
        Ok(LoggedUser::new(username))
    }

    /// Check credentials and mark the user as logged in.
    pub fn login(&self, username: &str, password: &str) -> Result<LoggedUser, LoginError> {
        let accounts = self.accounts.read();
        let valid = accounts
            .get(username)
            .is_some_and(|account| account.password == password);
        if !valid {
            return Err(LoginError::WrongCredentials);
        }

        if !self.logged_in.write().insert(username.to_string()) {
            return Err(LoginError::AlreadyLoggedIn(username.to_string()));
        }
        drop(accounts);

        debug!(user = username, "Logged in");
        Ok(LoggedUser::new(username))
    }

    /// Forget the user's live session. Unknown users are ignored.
    pub fn logout(&self, user: &LoggedUser) {
        if self.logged_in.write().remove(user.username()) {
            debug!(user = user.username(), "Logged out");
        }
    }

    pub fn is_logged_in(&self, username: &str) -> bool {
        self.logged_in.read().contains(username)
    }
}
