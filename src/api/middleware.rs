/// Authentication and authorization middleware
///
/// `authenticate` verifies the bearer token and records who is calling.
/// The role gates then re-read the account so role changes and soft
/// deletes take effect on the next request, not at token expiry.
use crate::{
    auth::{AuthenticatedUser, RolePolicy},
    context::AppContext,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

/// Name of the cookie carrying the refresh token
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> ApiResult<String> {
    let header = headers
        .get(AUTHORIZATION)
        .map(|h| {
            h.to_str()
                .map_err(|_| ApiError::BadRequest("incorrectly formatted header authorization".to_string()))
        })
        .transpose()?
        .unwrap_or("");

    if header.is_empty() {
        return Err(ApiError::Unauthorized("UNAUTHORIZED".to_string()));
    }

    let parts: Vec<&str> = header.split(' ').collect();
    match parts.as_slice() {
        ["Bearer", token] if !token.is_empty() => Ok(token.to_string()),
        _ => Err(ApiError::BadRequest(
            "incorrectly formatted header authorization".to_string(),
        )),
    }
}

/// Verify the access token and add the caller to request extensions
pub async fn authenticate(
    State(ctx): State<AppContext>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(req.headers())?;
    let claims = ctx.session_manager.codec().verify_access_token(&token)?;

    req.extensions_mut().insert(AuthenticatedUser::from(claims));
    Ok(next.run(req).await)
}

/// Enforce a role policy against a fresh read of the caller's account.
///
/// The live account is added to request extensions for the handler.
pub async fn authorize(ctx: &AppContext, req: &mut Request, policy: RolePolicy) -> ApiResult<()> {
    let user = req
        .extensions()
        .get::<AuthenticatedUser>()
        .cloned()
        .ok_or_else(|| ApiError::Unauthorized("UNAUTHORIZED".to_string()))?;

    let account = ctx.account_manager.find_account(user.id).await?;
    if !policy.permits(account.role) {
        tracing::debug!("authorize: {} denied for role {}", account.id, account.role);
        return Err(ApiError::Unauthorized("UNAUTHORIZED".to_string()));
    }

    req.extensions_mut().insert(account);
    Ok(())
}

pub async fn require_admin(
    State(ctx): State<AppContext>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&ctx, &mut req, RolePolicy::AdminOnly).await?;
    Ok(next.run(req).await)
}

pub async fn require_moderator(
    State(ctx): State<AppContext>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&ctx, &mut req, RolePolicy::ModeratorOnly).await?;
    Ok(next.run(req).await)
}

pub async fn require_any_role(
    State(ctx): State<AppContext>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&ctx, &mut req, RolePolicy::AnyRole).await?;
    Ok(next.run(req).await)
}

/// Only checks that a refresh cookie is present; the token is not verified
pub async fn require_login(req: Request, next: Next) -> Result<Response, ApiError> {
    let jar = CookieJar::from_headers(req.headers());
    if jar.get(REFRESH_COOKIE).is_none() {
        return Err(ApiError::Unauthorized("UNAUTHORIZED".to_string()));
    }

    Ok(next.run(req).await)
}
