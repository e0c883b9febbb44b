//! Login and bearer-token resolution.
//!
//! Trust boundary: tokens here are NOT secure. A token is
//! `token_<username>_<suffix>` and only the username is checked against the
//! registry. There is no signature, expiry or revocation, so anyone who knows
//! a username can forge a token. Swap this module for a real identity
//! provider before exposing the service beyond a test network.

use crate::error::{AuthError, DuplicateUser, LoginError};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

const SCHEME: &str = "Token ";
const TOKEN_PREFIX: &str = "token_";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserIdentity(String);

impl UserIdentity {
    pub fn username(&self) -> &str {
        &self.0
    }
}

/// Resolves `Authorization` header values to registered users.
#[derive(Debug, Clone, Default)]
pub struct TokenAuthenticator {
    registered: HashSet<String>,
}

impl TokenAuthenticator {
    pub fn new<I, S>(usernames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TokenAuthenticator {
            registered: usernames.into_iter().map(Into::into).collect(),
        }
    }

    pub fn resolve(&self, credential: Option<&str>) -> Result<UserIdentity, AuthError> {
        let credential = credential
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(AuthError::MissingCredential)?;

        let username = credential
            .strip_prefix(SCHEME)
            .and_then(|token| token.strip_prefix(TOKEN_PREFIX))
            .and_then(|rest| rest.split('_').next())
            .filter(|name| !name.is_empty())
            .ok_or(AuthError::InvalidCredential)?;

        if self.registered.contains(username) {
            Ok(UserIdentity(username.to_owned()))
        } else {
            Err(AuthError::InvalidCredential)
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AccountInfo {
    pub username: String,
    pub id: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginGrant {
    pub token: String,
    pub user: AccountInfo,
}

struct Account {
    id: u32,
    password: String,
}

/// Username/password table loaded at start-up. Plain-text passwords: this is
/// a fixture for client development, not an account system.
pub struct Accounts {
    by_name: HashMap<String, Account>,
}

impl Accounts {
    /// Ids follow the order the users are given in, starting at 1.
    pub fn new<I>(users: I) -> Result<Self, DuplicateUser>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut by_name = HashMap::new();
        for ((username, password), id) in users.into_iter().zip(1..) {
            if by_name.contains_key(&username) {
                return Err(DuplicateUser(username));
            }
            by_name.insert(username, Account { id, password });
        }

        Ok(Accounts { by_name })
    }

    pub fn usernames(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn authenticator(&self) -> TokenAuthenticator {
        TokenAuthenticator::new(self.usernames())
    }

    pub fn login(&self, username: &str, password: &str) -> Result<LoginGrant, LoginError> {
        if username.is_empty() || password.is_empty() {
            return Err(LoginError::MissingFields);
        }

        let account = self.by_name.get(username).ok_or(LoginError::UserNotFound)?;
        if account.password != password {
            return Err(LoginError::WrongPassword);
        }

        Ok(LoginGrant {
            token: format!("{TOKEN_PREFIX}{username}_{}", Uuid::new_v4().simple()),
            user: AccountInfo {
                username: username.to_owned(),
                id: account.id,
            },
        })
    }
}
