/// Account, session and administration endpoints
use crate::{
    account::{AccountResponse, LoginRequest, RegisterRequest, UpdateAccountRequest},
    api::{
        extract::{ApiJson, ApiPath, ApiQuery},
        middleware::{self, REFRESH_COOKIE},
        response::WebResponse,
    },
    context::AppContext,
    db::account::Account,
    error::{ApiError, ApiResult},
    paging::{ListQuery, PageParams},
};
use axum::{
    extract::State,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Extension, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

/// `?id=&id=` query string
#[derive(Debug, Default, Deserialize)]
pub struct IdsParams {
    #[serde(default)]
    pub id: Vec<String>,
}

fn parse_account_ids(params: IdsParams) -> ApiResult<Vec<Uuid>> {
    if params.id.is_empty() {
        return Err(ApiError::BadRequest("query params invalid".to_string()));
    }
    params
        .id
        .iter()
        .map(|raw| {
            Uuid::parse_str(raw)
                .map_err(|_| ApiError::BadRequest(format!("invalid UUID: {}", raw)))
        })
        .collect()
}

fn refresh_cookie(jar: &CookieJar) -> ApiResult<String> {
    jar.get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| ApiError::Unauthorized("No Cookie".to_string()))
}

/// Build account routes
pub fn routes(ctx: &AppContext) -> Router<AppContext> {
    let public = Router::new()
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/refresh", get(refresh))
        .route("/api/logout", delete(logout));

    // Layers added last run first
    let current = Router::new()
        .route("/api/authentication", get(current_account))
        .route_layer(from_fn_with_state(ctx.clone(), middleware::require_any_role))
        .route_layer(from_fn_with_state(ctx.clone(), middleware::authenticate));

    let profile = Router::new()
        .route("/api/user/:id", put(update_account))
        .route_layer(from_fn(middleware::require_login));

    let admin = Router::new()
        .route(
            "/api/admin/users",
            get(list_accounts)
                .delete(delete_accounts)
                .patch(restore_accounts),
        )
        .route("/api/admin/users/search", get(search_accounts))
        .route("/api/admin/registers", post(register_many))
        .route(
            "/api/admin/user/:id",
            get(get_account).delete(delete_account).patch(restore_account),
        )
        .route_layer(from_fn_with_state(ctx.clone(), middleware::require_admin))
        .route_layer(from_fn_with_state(ctx.clone(), middleware::authenticate));

    let moderator = Router::new()
        .route("/api/moderator/users", get(list_accounts))
        .route("/api/moderator/registers", post(register_many))
        .route("/api/moderator/user/:id", get(get_account))
        .route_layer(from_fn(middleware::require_login))
        .route_layer(from_fn_with_state(ctx.clone(), middleware::require_moderator))
        .route_layer(from_fn_with_state(ctx.clone(), middleware::authenticate));

    Router::new()
        .merge(public)
        .merge(current)
        .merge(profile)
        .merge(admin)
        .merge(moderator)
}

/// Register a single account
async fn register(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<WebResponse<Value>> {
    tracing::debug!("register: {} as {}", req.email, req.role);
    let id = ctx.account_manager.create_account(req).await?;

    Ok(WebResponse::ok("Successfully Create", json!({ "id": id })))
}

/// Register a batch of accounts
async fn register_many(
    State(ctx): State<AppContext>,
    ApiJson(reqs): ApiJson<Vec<RegisterRequest>>,
) -> ApiResult<WebResponse<Value>> {
    let ids = ctx.account_manager.create_accounts(reqs).await?;

    Ok(WebResponse::ok("Successfully Creates", json!({ "ids": ids })))
}

/// Open a session: access token in the body, refresh token in a cookie
async fn login(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<(CookieJar, WebResponse<Value>)> {
    let tokens = ctx.session_manager.login(req).await?;

    let cookie = Cookie::build((REFRESH_COOKIE, tokens.refresh_token))
        .http_only(true)
        .path("/");

    Ok((
        jar.add(cookie),
        WebResponse::ok(
            "Successfully Login",
            json!({ "accessToken": tokens.access_token }),
        ),
    ))
}

async fn refresh(
    State(ctx): State<AppContext>,
    jar: CookieJar,
) -> ApiResult<WebResponse<Value>> {
    let refresh_token = refresh_cookie(&jar)?;
    let access_token = ctx.session_manager.refresh(&refresh_token).await?;

    Ok(WebResponse::ok(
        "Successfully Refresh Token",
        json!({ "accessToken": access_token }),
    ))
}

/// Revoke the session and expire the cookie
async fn logout(
    State(ctx): State<AppContext>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, WebResponse<Value>)> {
    let refresh_token = refresh_cookie(&jar)?;
    ctx.session_manager.logout(&refresh_token).await?;

    Ok((
        jar.remove(Cookie::build(REFRESH_COOKIE).path("/")),
        WebResponse::ok("Successfully Logout", Value::Null),
    ))
}

/// The caller's live account, as loaded by the role gate
async fn current_account(Extension(account): Extension<Account>) -> WebResponse<AccountResponse> {
    WebResponse::ok("Successfully Authentication", AccountResponse::from(account))
}

async fn update_account(
    State(ctx): State<AppContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateAccountRequest>,
) -> ApiResult<WebResponse<Value>> {
    ctx.account_manager.update_account(id, req).await?;

    Ok(WebResponse::ok("Successfully Update", json!({ "id": id })))
}

async fn list_accounts(
    State(ctx): State<AppContext>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<WebResponse<Value>> {
    let (accounts, pagination) = ctx.account_manager.find_accounts(ListQuery::all(&params)?).await?;
    let users: Vec<AccountResponse> = accounts.into_iter().map(AccountResponse::from).collect();

    Ok(WebResponse::ok(
        "Successfully Get All",
        json!({ "users": users, "pagination": pagination }),
    ))
}

async fn search_accounts(
    State(ctx): State<AppContext>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<WebResponse<Value>> {
    let (accounts, pagination) = ctx
        .account_manager
        .find_accounts(ListQuery::search(&params)?)
        .await?;
    let users: Vec<AccountResponse> = accounts.into_iter().map(AccountResponse::from).collect();

    Ok(WebResponse::ok(
        "Successfully Get Search",
        json!({ "users": users, "pagination": pagination }),
    ))
}

async fn get_account(
    State(ctx): State<AppContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<WebResponse<Value>> {
    let account = ctx.account_manager.find_account(id).await?;

    Ok(WebResponse::ok(
        "Successfully Get By ID",
        json!({ "user": AccountResponse::from(account) }),
    ))
}

async fn delete_account(
    State(ctx): State<AppContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<WebResponse<Value>> {
    ctx.account_manager.delete_account(id).await?;
    Ok(WebResponse::ok("Successfully Delete", Value::Null))
}

async fn delete_accounts(
    State(ctx): State<AppContext>,
    ApiQuery(params): ApiQuery<IdsParams>,
) -> ApiResult<WebResponse<Value>> {
    let ids = parse_account_ids(params)?;
    ctx.account_manager.delete_accounts(&ids).await?;
    Ok(WebResponse::ok("Successfully Deletes", Value::Null))
}

async fn restore_account(
    State(ctx): State<AppContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<WebResponse<Value>> {
    ctx.account_manager.restore_account(id).await?;
    Ok(WebResponse::ok("Successfully Restore", Value::Null))
}

async fn restore_accounts(
    State(ctx): State<AppContext>,
    ApiQuery(params): ApiQuery<IdsParams>,
) -> ApiResult<WebResponse<Value>> {
    let ids = parse_account_ids(params)?;
    ctx.account_manager.restore_accounts(&ids).await?;
    Ok(WebResponse::ok("Successfully Restores", Value::Null))
}
