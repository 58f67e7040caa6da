// User lookup collaborator: trait plus Postgres and in-memory implementations

use crate::auth::{
    error::AuthError,
    models::{Role, User},
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

/// Read access to accounts, plus the insert used by registration.
/// The session core itself only ever calls `find_by_email`.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user by email (case-insensitive)
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    /// Create a new user
    async fn create_user(&self, email: &str, password_hash: &str, role: Role) -> Result<User, AuthError>;
}

/// Postgres-backed user repository
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, role, created_at FROM users WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create_user(&self, email: &str, password_hash: &str, role: Role) -> Result<User, AuthError> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (email, password_hash, role) VALUES ($1, $2, $3) \
             RETURNING id, email, password_hash, role, created_at",
        )
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AuthError::EmailAlreadyExists;
                }
            }
            AuthError::DatabaseError(e.to_string())
        })?;

        Ok(user)
    }
}

/// In-process user store for tests and local development
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<Vec<User>>,
    lookups: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `find_by_email` calls served so far
    #[cfg(test)]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail as if the database were down
    #[cfg(test)]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), AuthError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuthError::DatabaseError("user store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let users = self
            .users
            .read()
            .map_err(|_| AuthError::Internal("user store lock poisoned".to_string()))?;
        Ok(users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create_user(&self, email: &str, password_hash: &str, role: Role) -> Result<User, AuthError> {
        self.check_available()?;

        let mut users = self
            .users
            .write()
            .map_err(|_| AuthError::Internal("user store lock poisoned".to_string()))?;
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(AuthError::EmailAlreadyExists);
        }

        let user = User {
            id: users.len() as i32 + 1,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role: role.as_str().to_string(),
            created_at: Utc::now(),
        };
        users.push(user.clone());
        Ok(user)
    }
}
