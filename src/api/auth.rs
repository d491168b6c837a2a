use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::config::AuthConfig;
use crate::model::{Role, UserContext};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleClaim {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Claims read from an identity-provider access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub realm_access: Option<RoleClaim>,
    #[serde(default)]
    pub resource_access: HashMap<String, RoleClaim>,
}

impl Claims {
    /// Granted authorities: realm roles already carrying the `ROLE_` prefix,
    /// plus every client role upper-cased and prefixed.
    pub fn authorities(&self) -> Vec<String> {
        let realm = self
            .realm_access
            .iter()
            .flat_map(|access| access.roles.iter())
            .filter(|role| role.starts_with("ROLE_"))
            .cloned();
        let clients = self
            .resource_access
            .values()
            .flat_map(|access| access.roles.iter())
            .map(|role| format!("ROLE_{}", role.to_uppercase()));
        realm.chain(clients).collect()
    }

    /// `preferred_username`, falling back to `sub` when it is missing or blank.
    pub fn username(&self) -> Option<&str> {
        let present = |name: &&str| !name.trim().is_empty();
        self.preferred_username
            .as_deref()
            .filter(present)
            .or_else(|| self.sub.as_deref().filter(present))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("token carries no username")]
    MissingUsername,
}

/// Verifies HS256 bearer tokens against the configured secret and optional
/// issuer and audience.
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<UserContext, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        let claims = data.claims;
        let username = claims.username().ok_or(AuthError::MissingUsername)?;
        let authorities = claims.authorities();
        let roles = authorities
            .iter()
            .filter_map(|authority| Role::from_authority(authority));
        Ok(UserContext::new(username, roles))
    }
}

/// Pulls the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolves the caller from the bearer token, if any. Requests without a
/// token continue anonymously; a token that fails verification is rejected.
pub async fn authenticate(
    State(verifier): State<std::sync::Arc<TokenVerifier>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(request.headers()) {
        match verifier.verify(token) {
            Ok(user) => {
                log::debug!("Authenticated {} {:?}", user.username, user.roles);
                request.extensions_mut().insert(user);
            }
            Err(e) => {
                log::warn!("Rejected bearer token on {}: {}", request.uri().path(), e);
                return ApiError::unauthorized("Invalid or expired token").into_response();
            }
        }
    }
    next.run(request).await
}

fn require_role(request: &Request, role: Role) -> Result<(), ApiError> {
    let user = request
        .extensions()
        .get::<UserContext>()
        .ok_or_else(|| ApiError::unauthorized("Full authentication is required to access this resource"))?;
    if !user.has_role(role) {
        log::warn!("{} lacks {} for {}", user.username, role.authority(), request.uri().path());
        return Err(ApiError::forbidden(format!("{} is required", role.authority())));
    }
    Ok(())
}

pub async fn require_user(request: Request, next: Next) -> Response {
    match require_role(&request, Role::User) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

pub async fn require_admin(request: Request, next: Next) -> Response {
    match require_role(&request, Role::Admin) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

/// The authenticated caller. Rejects with 401 on anonymous requests.
#[async_trait]
impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserContext>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Full authentication is required to access this resource"))
    }
}
