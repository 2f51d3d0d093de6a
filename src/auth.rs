/// Authentication extractors and role policy
use crate::{account::Role, crypto::AccessClaims, error::ApiError};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Identity established by a verified access token.
///
/// Inserted into request extensions by `api::middleware::authenticate`.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<AccessClaims> for AuthenticatedUser {
    fn from(claims: AccessClaims) -> Self {
        Self {
            id: claims.id,
            username: claims.username,
            email: claims.email,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("UNAUTHORIZED".to_string()))
    }
}

/// Which roles a gated route admits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolePolicy {
    AdminOnly,
    ModeratorOnly,
    AnyRole,
}

impl RolePolicy {
    pub fn permits(&self, role: Role) -> bool {
        match self {
            RolePolicy::AdminOnly => role == Role::Admin,
            RolePolicy::ModeratorOnly => role == Role::Moderator,
            RolePolicy::AnyRole => true,
        }
    }
}
