//! Registration, login and bearer tokens.
//!
//! Passwords are hashed with Argon2id using a random per-hash salt plus the
//! process-wide password secret as the Argon2 keyed secret. Tokens are
//! HS256 JWTs carrying the subject id and role.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use crate::config::AuthConfig;
use crate::db::{NewUser, Role, User};
use crate::store::{Entity, StoreError, UserStore};

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").unwrap();
}

/// Claims carried by every token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Mask an email for logs: `ab****@domain`
pub fn mask_email(email: &str) -> String {
    let mut parts = email.split('@');
    let (user, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(user), Some(domain), None) => (user, domain),
        _ => return "invalid_email".to_string(),
    };
    let visible: String = user.chars().take(2).collect();
    format!("{}****@{}", visible, domain)
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

fn parse_role(role: &str) -> ServiceResult<Role> {
    role.parse().map_err(|_| {
        warn!(role = %role, "Invalid role provided");
        ServiceError::InvalidRole
    })
}

fn hasher(secret: &[u8]) -> Result<Argon2<'_>, argon2::Error> {
    Argon2::new_with_secret(secret, Algorithm::Argon2id, Version::V0x13, Params::default())
}

fn hash_with_secret(secret: &[u8], password: &str) -> ServiceResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = hasher(secret).map_err(|e| ServiceError::internal("argon2 setup failed", e))?;
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ServiceError::internal("password hashing failed", e))?;
    Ok(hash.to_string())
}

fn verify_with_secret(secret: &[u8], password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    match hasher(secret) {
        Ok(argon2) => argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok(),
        Err(_) => false,
    }
}

pub struct IdentityService {
    users: Arc<dyn UserStore>,
    password_secret: Arc<[u8]>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
}

impl IdentityService {
    pub fn new(users: Arc<dyn UserStore>, config: &AuthConfig) -> Self {
        Self {
            users,
            password_secret: Arc::from(config.password_secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            token_ttl: config.token_ttl(),
        }
    }

    /// Issue a token for a throwaway identity with `role`
    pub fn dummy_login(&self, role: &str) -> ServiceResult<String> {
        let role = parse_role(role)?;
        let id = Uuid::new_v4();
        let token = self.issue_token(id, role)?;
        info!(user_id = %id, role = %role, "Dummy login successful");
        Ok(token)
    }

    pub async fn register(&self, email: &str, password: &str, role: &str) -> ServiceResult<User> {
        let masked = mask_email(email);
        debug!(email = %masked, "Registering user");

        let role = parse_role(role)?;
        if !is_valid_email(email) {
            warn!(email = %masked, "Invalid email provided");
            return Err(ServiceError::InvalidEmail);
        }

        let password_hash = self.hash_password(password.to_string()).await?;
        let user = self
            .users
            .create(NewUser {
                email: email.to_string(),
                password_hash,
                role,
            })
            .await
            .map_err(|e| match e {
                StoreError::Duplicate(Entity::User) => {
                    warn!(email = %masked, "User already exists");
                    ServiceError::UserExists
                }
                other => ServiceError::internal("failed to create user", other),
            })?;

        info!(user_id = %user.id, email = %masked, "User registered");
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<String> {
        let masked = mask_email(email);

        let user = self.users.get_by_email(email).await.map_err(|e| match e {
            StoreError::NotFound(Entity::User) => {
                warn!(email = %masked, "Login failed: unknown email");
                ServiceError::InvalidCredentials
            }
            other => ServiceError::internal("failed to load user", other),
        })?;

        if !self
            .verify_password(password.to_string(), user.password_hash.clone())
            .await?
        {
            warn!(email = %masked, "Login failed: password mismatch");
            return Err(ServiceError::InvalidCredentials);
        }

        let token = self.issue_token(user.id, user.role)?;
        info!(user_id = %user.id, "Login successful");
        Ok(token)
    }

    pub fn validate_token(&self, token: &str) -> ServiceResult<Claims> {
        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => ServiceError::TokenExpired,
                _ => {
                    debug!("Token rejected: {}", e);
                    ServiceError::InvalidToken
                }
            })
    }

    fn issue_token(&self, user_id: Uuid, role: Role) -> ServiceResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            role,
            iat: now.timestamp(),
            exp: (now + self.token_ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::internal("failed to sign token", e))
    }

    async fn hash_password(&self, password: String) -> ServiceResult<String> {
        let secret = self.password_secret.clone();
        tokio::task::spawn_blocking(move || hash_with_secret(&secret, &password))
            .await
            .map_err(|e| ServiceError::internal("password hashing task failed", e))?
    }

    async fn verify_password(&self, password: String, hash: String) -> ServiceResult<bool> {
        let secret = self.password_secret.clone();
        tokio::task::spawn_blocking(move || verify_with_secret(&secret, &password, &hash))
            .await
            .map_err(|e| ServiceError::internal("password verification task failed", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Stores;

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-jwt-secret-that-is-long-enough-1234".to_string(),
            token_ttl_minutes: 60,
            password_secret: "test-password-secret".to_string(),
        }
    }

    fn service() -> IdentityService {
        IdentityService::new(Stores::memory().users, &config())
    }

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("alice@example.com"), "al****@example.com");
        assert_eq!(mask_email("a@example.com"), "a****@example.com");
        assert_eq!(mask_email("no-at-sign"), "invalid_email");
        assert_eq!(mask_email("a@b@c"), "invalid_email");
    }

    #[test]
    fn test_email_syntax() {
        assert!(is_valid_email("user.name+tag@mail.example.ru"));
        assert!(!is_valid_email("user@localhost"));
        assert!(!is_valid_email("not an email"));
        assert!(!is_valid_email("@example.com"));
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_with_secret(b"pepper", "hunter2").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_with_secret(b"pepper", "hunter2", &hash));
        assert!(!verify_with_secret(b"pepper", "wrong", &hash));
        assert!(!verify_with_secret(b"other-pepper", "hunter2", &hash));
        assert!(!verify_with_secret(b"pepper", "hunter2", "not-a-phc-string"));
    }

    #[test]
    fn test_dummy_login_issues_role_token() {
        let service = service();
        let token = service.dummy_login("moderator").unwrap();
        let claims = service.validate_token(&token).unwrap();
        assert_eq!(claims.role, Role::Moderator);
        assert!(claims.exp > claims.iat);

        assert!(matches!(
            service.dummy_login("admin"),
            Err(ServiceError::InvalidRole)
        ));
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let service = service();
        let user = service
            .register("worker@example.com", "secret", "employee")
            .await
            .unwrap();
        assert_eq!(user.role, Role::Employee);
        assert_ne!(user.password_hash, "secret");

        let token = service.login("worker@example.com", "secret").await.unwrap();
        let claims = service.validate_token(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::Employee);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let service = service();
        assert!(matches!(
            service.register("worker@example.com", "x", "boss").await,
            Err(ServiceError::InvalidRole)
        ));
        assert!(matches!(
            service.register("worker", "x", "employee").await,
            Err(ServiceError::InvalidEmail)
        ));

        service
            .register("worker@example.com", "x", "employee")
            .await
            .unwrap();
        assert!(matches!(
            service.register("worker@example.com", "y", "moderator").await,
            Err(ServiceError::UserExists)
        ));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let service = service();
        service
            .register("worker@example.com", "secret", "employee")
            .await
            .unwrap();

        let unknown = service.login("nobody@example.com", "secret").await;
        let mismatch = service.login("worker@example.com", "wrong").await;
        assert!(matches!(unknown, Err(ServiceError::InvalidCredentials)));
        assert!(matches!(mismatch, Err(ServiceError::InvalidCredentials)));
    }

    #[test]
    fn test_expired_token() {
        let service = service();
        let now = Utc::now();
        let claims = Claims {
            sub: Uuid::new_v4(),
            role: Role::Employee,
            iat: (now - Duration::hours(2)).timestamp(),
            exp: (now - Duration::hours(1)).timestamp(),
        };
        let token = encode(&Header::default(), &claims, &service.encoding_key).unwrap();
        assert!(matches!(
            service.validate_token(&token),
            Err(ServiceError::TokenExpired)
        ));
    }

    #[test]
    fn test_tampered_or_foreign_token() {
        let service = service();
        assert!(matches!(
            service.validate_token("garbage"),
            Err(ServiceError::InvalidToken)
        ));

        let mut other_config = config();
        other_config.jwt_secret = "a-completely-different-signing-secret".to_string();
        let other = IdentityService::new(Stores::memory().users, &other_config);
        let foreign = other.dummy_login("employee").unwrap();
        assert!(matches!(
            service.validate_token(&foreign),
            Err(ServiceError::InvalidToken)
        ));
    }
}
