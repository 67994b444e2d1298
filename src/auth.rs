use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::AppError,
    models::User,
    repository::{RepoError, RepositoryState},
};

/// Claims
///
/// Payload carried inside every bearer token. The server trusts only `sub`;
/// `email` and `role` are informational for the frontend and are re-read
/// from the database on each request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    pub iat: usize,
    pub exp: usize,
    /// Unique token id, reserved for a future revocation list.
    pub jti: Uuid,
}

#[derive(Debug, Error, PartialEq)]
pub enum TokenError {
    #[error("missing authorization header")]
    MissingHeader,
    #[error("authorization header must be a Bearer token")]
    MalformedHeader,
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
    #[error("could not sign token: {0}")]
    Signing(String),
}

/// Identity fields encoded into a freshly issued token.
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub id: Uuid,
    pub email: String,
    pub role: String,
}

impl From<&User> for TokenSubject {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role_name.clone(),
        }
    }
}

/// TokenKeys
///
/// HS256 signing and verification keys derived once from the configured secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.jwt_secret, config.jwt_ttl_hours)
    }

    pub fn issue(&self, subject: &TokenSubject) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.id,
            email: subject.email.clone(),
            role: subject.role.clone(),
            iat: now.timestamp() as usize,
            exp: (now + self.ttl).timestamp() as usize,
            jti: Uuid::new_v4(),
        };
        self.sign(&claims)
    }

    /// Signs arbitrary claims. `issue` is the normal entry point.
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let token = encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        tracing::debug!(user_id = %claims.sub, "token signed");
        Ok(token)
    }

    /// Verifies signature and expiry. Never panics on hostile input.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let validation = Validation::new(Algorithm::HS256);
        match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => Err(TokenError::Expired),
                _ => {
                    tracing::debug!(error = %e, "token rejected");
                    Err(TokenError::Invalid)
                }
            },
        }
    }
}

/// Pulls the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, TokenError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(TokenError::MissingHeader)?
        .to_str()
        .map_err(|_| TokenError::MalformedHeader)?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(TokenError::MalformedHeader)
}

/// AuthUser
///
/// The resolved identity of an authenticated request. The role and
/// subscription flag come from the database, not from the token, so role
/// changes take effect on the next request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub is_subscribed: bool,
}

/// Rejection: `AppError::Unauthenticated` (401) for a missing or bad token,
/// a deleted user or a deactivated account.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Set by the auth middleware, which already resolved the identity.
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let keys = TokenKeys::from_ref(state);

        let token = bearer_token(&parts.headers)?;
        let claims = keys.verify(token)?;

        let user = match repo.get_user(claims.sub).await {
            Ok(user) => user,
            Err(RepoError::NotFound) => {
                tracing::warn!(user_id = %claims.sub, "token for unknown user");
                return Err(AppError::Unauthenticated("account not found".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if !user.is_active {
            return Err(AppError::Unauthenticated("account is disabled".to_string()));
        }

        let auth_user = AuthUser {
            id: user.id,
            email: user.email,
            role: user.role_name,
            is_subscribed: user.is_subscribed,
        };
        parts.extensions.insert(auth_user.clone());
        Ok(auth_user)
    }
}

/// `Option<AuthUser>`: anonymous when no `Authorization` header is sent,
/// but a header that is present must still be valid.
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        if !parts.headers.contains_key(header::AUTHORIZATION) {
            return Ok(None);
        }
        <AuthUser as FromRequestParts<S>>::from_request_parts(parts, state)
            .await
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn keys() -> TokenKeys {
        TokenKeys::new("unit-test-secret", 1)
    }

    fn subject() -> TokenSubject {
        TokenSubject {
            id: Uuid::new_v4(),
            email: "ana@example.com".to_string(),
            role: "Usuario".to_string(),
        }
    }

    #[test]
    fn issued_token_round_trips_identity() {
        let subject = subject();
        let token = keys().issue(&subject).unwrap();
        let claims = keys().verify(&token).unwrap();
        assert_eq!(claims.sub, subject.id);
        assert_eq!(claims.email, subject.email);
        assert_eq!(claims.role, subject.role);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn token_signed_with_other_secret_is_invalid() {
        let token = TokenKeys::new("other-secret", 1).issue(&subject()).unwrap();
        assert_eq!(keys().verify(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), Err(TokenError::MissingHeader));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert_eq!(bearer_token(&headers), Err(TokenError::MalformedHeader));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Ok("abc"));
    }
}
