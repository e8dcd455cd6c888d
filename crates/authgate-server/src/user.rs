//! User records and credential verification.
//!
//! Passwords are stored as PHC-formatted Argon2id hashes. Login failures are
//! indistinguishable to clients whether the account is unknown, inactive, or
//! the password is wrong.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use dashmap::DashMap;

use authgate_auth::{AuthError, AuthResult, TokenSubject};

// ============================================================================
// User Record
// ============================================================================

/// A user account as loaded from storage.
#[derive(Debug, Clone)]
pub struct UserRecord {
    /// Primary key; becomes the `sub` claim.
    pub id: i64,
    /// Login identifier.
    pub email: String,
    /// PHC-formatted Argon2id password hash.
    pub password_hash: String,
    /// Role recorded in issued tokens.
    pub role: String,
    /// Deactivated accounts cannot log in.
    pub is_active: bool,
}

impl UserRecord {
    /// The identity tokens are issued for.
    #[must_use]
    pub fn subject(&self) -> TokenSubject {
        TokenSubject {
            id: self.id,
            email: self.email.clone(),
            role: self.role.clone(),
        }
    }
}

// ============================================================================
// User Store
// ============================================================================

/// Lookup of user accounts for login.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Finds a user by email, including the password hash.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if the backing store failed.
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<UserRecord>>;
}

/// In-memory user store for tests and demos.
#[derive(Default)]
pub struct MemoryUserStore {
    users: DashMap<String, UserRecord>,
}

impl MemoryUserStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a user, keyed by email.
    pub fn insert(&self, user: UserRecord) {
        self.users.insert(user.email.clone(), user);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<UserRecord>> {
        Ok(self.users.get(email).map(|entry| entry.value().clone()))
    }
}

// ============================================================================
// Password Hashing
// ============================================================================

/// Hashes a password with Argon2id and a fresh random salt.
///
/// # Errors
///
/// Returns [`AuthError::Store`] if hashing fails.
pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::store(format!("password hashing failed: {e}")))
}

/// Verifies a password against a stored PHC hash.
///
/// An undecodable stored hash counts as a mismatch, not an error: login must
/// fail closed for that account, not 500.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        tracing::warn!("stored password hash is not valid PHC format");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
