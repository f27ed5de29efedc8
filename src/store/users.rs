//! Operator accounts.
//!
//! Email is the identity key; the credential is only ever stored as an
//! Argon2id PHC string and checked on every later login.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::RelayError;

/// An operator account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    password_hash: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
        }
    }
}

/// Return the user registered under `email`, creating it on first sight.
///
/// An existing user must present the credential it was created with, otherwise
/// [`RelayError::InvalidCredential`] is returned.
pub async fn find_or_create_user(
    pool: &SqlitePool,
    email: &str,
    password: &str,
) -> Result<User, RelayError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(RelayError::MissingField("email"));
    }
    if password.is_empty() {
        return Err(RelayError::MissingField("password"));
    }

    if let Some(row) = find_row_by_email(pool, email).await? {
        verify_password(password, &row.password_hash)?;
        return Ok(row.into());
    }

    let hash = hash_password(password)?;
    let inserted = sqlx::query_as::<_, UserRow>(
        r"
        INSERT INTO users (email, password_hash)
        VALUES (?, ?)
        RETURNING id, email, password_hash
        ",
    )
    .bind(email)
    .bind(&hash)
    .fetch_one(pool)
    .await;

    match inserted {
        Ok(row) => {
            info!(user_id = row.id, "Created user");
            Ok(row.into())
        }
        // Lost a race with a concurrent first login for the same email.
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            let row = find_row_by_email(pool, email)
                .await?
                .ok_or(RelayError::UnknownUser)?;
            verify_password(password, &row.password_hash)?;
            Ok(row.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Look up a user by id.
pub async fn get_user(pool: &SqlitePool, user_id: i64) -> Result<Option<User>, RelayError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, email, password_hash FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(User::from))
}

async fn find_row_by_email(pool: &SqlitePool, email: &str) -> Result<Option<UserRow>, RelayError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, email, password_hash FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, RelayError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| RelayError::PasswordHash)
}

/// Verify a password against a stored hash.
fn verify_password(password: &str, hash: &str) -> Result<(), RelayError> {
    let parsed = PasswordHash::new(hash).map_err(|_| RelayError::InvalidCredential)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| RelayError::InvalidCredential)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_pool;

    #[tokio::test]
    async fn test_first_login_creates_user() {
        let pool = test_pool().await;
        let user = find_or_create_user(&pool, "a@x.com", "pw").await.unwrap();
        assert_eq!(user.email, "a@x.com");
        assert_eq!(get_user(&pool, user.id).await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn test_second_login_returns_same_user() {
        let pool = test_pool().await;
        let first = find_or_create_user(&pool, "a@x.com", "pw").await.unwrap();
        let second = find_or_create_user(&pool, " a@x.com ", "pw").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let pool = test_pool().await;
        find_or_create_user(&pool, "a@x.com", "pw").await.unwrap();
        let err = find_or_create_user(&pool, "a@x.com", "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::InvalidCredential));
    }

    #[tokio::test]
    async fn test_password_is_not_stored_in_plaintext() {
        let pool = test_pool().await;
        find_or_create_user(&pool, "a@x.com", "hunter2").await.unwrap();
        let row = find_row_by_email(&pool, "a@x.com").await.unwrap().unwrap();
        assert_ne!(row.password_hash, "hunter2");
        assert!(row.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_empty_fields_are_rejected() {
        let pool = test_pool().await;
        assert!(matches!(
            find_or_create_user(&pool, "  ", "pw").await.unwrap_err(),
            RelayError::MissingField("email")
        ));
        assert!(matches!(
            find_or_create_user(&pool, "a@x.com", "").await.unwrap_err(),
            RelayError::MissingField("password")
        ));
    }
}
