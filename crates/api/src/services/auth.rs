//! Registration, login and password handling.

use std::collections::BTreeMap;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use clove_core::{Email, Role};

use crate::error::AppError;
use crate::models::{NewUser, User};
use crate::store::Store;
use crate::token::TokenCodec;

/// Minimum password length for new accounts.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Registration and login.
pub struct AuthService<'a> {
    store: &'a dyn Store,
    tokens: &'a TokenCodec,
}

impl<'a> AuthService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store, tokens: &'a TokenCodec) -> Self {
        Self { store, tokens }
    }

    /// Register a new account and issue its first token.
    ///
    /// Every registration creates a regular [`Role::User`]; admin accounts
    /// are only ever created by promotion through an existing admin.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for bad fields and
    /// [`AppError::Conflict`] if the email is taken.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<(User, String), AppError> {
        let email = validate_registration(name, email, password)?;

        let user = self
            .store
            .create_user(NewUser {
                name: name.trim().to_owned(),
                email,
                password_hash: hash_password(password)?,
                role: Role::User,
            })
            .await?;

        tracing::info!(user_id = %user.id, "user registered");
        let token = self.tokens.issue(user.email.as_str(), user.role);
        Ok((user, token))
    }

    /// Verify credentials and issue a token.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthenticated`] for an unknown email or wrong
    /// password; the two cases are indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, String), AppError> {
        let email = Email::parse(email).map_err(|_| AppError::Unauthenticated)?;

        let (user, password_hash) = self
            .store
            .user_credentials(&email)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        verify_password(password, &password_hash)?;

        let token = self.tokens.issue(user.email.as_str(), user.role);
        Ok((user, token))
    }
}

/// Validate registration fields, collecting every failure.
fn validate_registration(name: &str, email: &str, password: &str) -> Result<Email, AppError> {
    let mut errors = BTreeMap::new();

    if name.trim().is_empty() {
        errors.insert("name".to_owned(), "must not be blank".to_owned());
    }

    let parsed = match Email::parse(email) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            errors.insert("email".to_owned(), e.to_string());
            None
        }
    };

    if password.len() < MIN_PASSWORD_LENGTH {
        errors.insert(
            "password".to_owned(),
            format!("must be at least {MIN_PASSWORD_LENGTH} characters"),
        );
    }

    match parsed {
        Some(parsed) if errors.is_empty() => Ok(parsed),
        _ => Err(AppError::Validation(errors)),
    }
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// Verify a password against a stored hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AppError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AppError::Unauthenticated)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::Unauthenticated)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use crate::store::memory::MemoryStore;

    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(
            SecretString::from("0123456789abcdef0123456789abcdef"),
            3600,
        )
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong password!", &hash),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn test_registration_validation_collects_all_failures() {
        let err = validate_registration("  ", "not-an-email", "short").unwrap_err();
        let AppError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.contains_key("name"));
        assert!(errors.contains_key("email"));
        assert!(errors.contains_key("password"));
    }

    #[tokio::test]
    async fn test_register_always_creates_regular_user() {
        let store = MemoryStore::new();
        let tokens = codec();
        let service = AuthService::new(&store, &tokens);

        let (user, token) = service
            .register("Ada", "ada@example.com", "a-long-password")
            .await
            .unwrap();
        assert_eq!(user.role, Role::User);

        let claims = tokens.verify(&token, Some("ada@example.com")).unwrap();
        assert_eq!(claims.role, Role::User);
    }

    #[tokio::test]
    async fn test_login_does_not_reveal_which_factor_failed() {
        let store = MemoryStore::new();
        let tokens = codec();
        let service = AuthService::new(&store, &tokens);
        service
            .register("Ada", "ada@example.com", "a-long-password")
            .await
            .unwrap();

        let unknown = service.login("ghost@example.com", "a-long-password").await;
        let wrong = service.login("ada@example.com", "wrong-password").await;
        assert!(matches!(unknown, Err(AppError::Unauthenticated)));
        assert!(matches!(wrong, Err(AppError::Unauthenticated)));

        assert!(
            service
                .login("ada@example.com", "a-long-password")
                .await
                .is_ok()
        );
    }
}
