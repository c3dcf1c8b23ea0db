/*!
 * # Caller identity
 *
 * Callers identify themselves with `Authorization: Bearer <jwt>` (HS256,
 * `sub` is the acting identity recorded on movements). The header is
 * optional: a request without it runs anonymously. A header that is present
 * but malformed, badly signed or expired is rejected with 401.
 *
 * When `require_auth_for_writes` is enabled, mutating methods additionally
 * require a valid token.
 */

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::ServiceError;

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,          // Acting identity
    pub name: Option<String>, // Display name
    pub jti: String,          // JWT ID
    pub iat: i64,             // Issued at time
    pub exp: i64,             // Expiration time
    pub iss: String,          // Issuer
}

/// Authenticated caller extracted from a bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub name: Option<String>,
    pub token_id: String,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            name: claims.name,
            token_id: claims.jti,
        }
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    pub jwt_issuer: String,
    pub token_lifetime: Duration,
    pub require_auth_for_writes: bool,
}

impl AuthConfig {
    pub fn from_app_config(cfg: &AppConfig) -> Self {
        Self {
            jwt_secret: cfg.jwt_secret.clone(),
            jwt_issuer: cfg.jwt_issuer.clone(),
            token_lifetime: Duration::from_secs(cfg.jwt_expiration_secs),
            require_auth_for_writes: cfg.require_auth_for_writes,
        }
    }
}

/// Token validation and minting
#[derive(Clone, Debug)]
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    fn secret(&self) -> Result<&[u8], AuthError> {
        self.config
            .jwt_secret
            .as_deref()
            .map(str::as_bytes)
            .ok_or(AuthError::NotConfigured)
    }

    /// Signs a token for `subject`, valid for the configured lifetime.
    pub fn issue_token(&self, subject: &str, name: Option<&str>) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.token_lifetime)
                .map_err(|_| AuthError::TokenCreation("invalid token lifetime".to_string()))?;

        let claims = Claims {
            sub: subject.to_string(),
            name: name.map(str::to_string),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.jwt_issuer.clone(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret()?),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret()?),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        if claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }

        Ok(claims)
    }

    /// Resolves the caller from request headers. `Ok(None)` means anonymous.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Option<AuthUser>, AuthError> {
        let Some(value) = headers.get(header::AUTHORIZATION) else {
            return Ok(None);
        };

        let value = value.to_str().map_err(|_| AuthError::InvalidToken)?;
        let token = value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidToken)?;

        let claims = self.validate_token(token)?;
        debug!(user_id = %claims.sub, "Authenticated caller");
        Ok(Some(claims.into()))
    }

    /// Whether an anonymous caller may use `method`.
    pub fn allows_anonymous(&self, method: &Method) -> bool {
        !self.config.require_auth_for_writes || is_read_only(method)
    }
}

fn is_read_only(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingAuth,

    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Bearer tokens are not accepted: no signing secret is configured")]
    NotConfigured,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenCreation(msg) => ServiceError::InternalError(msg),
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

/// Authentication middleware
///
/// Rejects bad tokens, enforces `require_auth_for_writes`, and stores the
/// caller as a request extension for [`Actor`].
pub async fn auth_middleware(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let user = match auth.authenticate(request.headers()) {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    if user.is_none() && !auth.allows_anonymous(request.method()) {
        return AuthError::MissingAuth.into_response();
    }

    if let Some(user) = user {
        request.extensions_mut().insert(user);
    }

    next.run(request).await
}

/// The acting identity of a request, if any.
#[derive(Debug, Clone, Default)]
pub struct Actor(pub Option<AuthUser>);

impl Actor {
    pub fn user_id(&self) -> Option<&str> {
        self.0.as_ref().map(|u| u.user_id.as_str())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Actor(parts.extensions.get::<AuthUser>().cloned()))
    }
}
