/// Task list endpoints under `/api/user/:id`
use crate::{
    api::{
        extract::{ApiJson, ApiPath, ApiQuery},
        middleware,
        response::WebResponse,
        users::IdsParams,
    },
    context::AppContext,
    error::{ApiError, ApiResult},
    paging::{ListQuery, PageParams},
    todo::{TaskBatchRequest, TaskRequest, TaskSelector},
};
use axum::{
    extract::State,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

/// `?id=` query string naming one task
#[derive(Debug, Default, Deserialize)]
struct IdParam {
    id: Option<String>,
}

fn parse_task_id(raw: &str) -> ApiResult<i64> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest("query params invalid".to_string()))
}

fn single_task(param: IdParam) -> ApiResult<i64> {
    match param.id.as_deref() {
        Some(raw) if !raw.is_empty() => parse_task_id(raw),
        _ => Err(ApiError::BadRequest("query params invalid".to_string())),
    }
}

/// Build task routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route(
            "/api/user/:id/todolist",
            get(list_tasks)
                .post(create_task)
                .put(update_task)
                .delete(delete_task),
        )
        .route("/api/user/:id/todolist/s", get(search_tasks))
        .route("/api/user/:id/todolist/:task_id", get(get_task))
        .route(
            "/api/user/:id/todolists",
            post(create_tasks).delete(delete_tasks),
        )
        .route_layer(from_fn(middleware::require_login))
}

async fn list_tasks(
    State(ctx): State<AppContext>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<WebResponse<Value>> {
    let (tasks, pagination) = ctx
        .task_manager
        .find_tasks(user_id, ListQuery::all(&params)?)
        .await?;

    Ok(WebResponse::ok(
        "Successfully Get All",
        json!({ "todolist": tasks, "pagination": pagination }),
    ))
}

async fn search_tasks(
    State(ctx): State<AppContext>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<WebResponse<Value>> {
    let (tasks, pagination) = ctx
        .task_manager
        .find_tasks(user_id, ListQuery::search(&params)?)
        .await?;

    Ok(WebResponse::ok(
        "Successfully Get Search",
        json!({ "todolist": tasks, "pagination": pagination }),
    ))
}

async fn get_task(
    State(ctx): State<AppContext>,
    ApiPath((user_id, task_id)): ApiPath<(Uuid, i64)>,
) -> ApiResult<WebResponse<Value>> {
    let task = ctx.task_manager.find_task(user_id, task_id).await?;

    Ok(WebResponse::ok("Successfully Get By ID", json!({ "todolist": task })))
}

async fn create_task(
    State(ctx): State<AppContext>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<TaskRequest>,
) -> ApiResult<WebResponse<Value>> {
    let task_id = ctx.task_manager.create_task(user_id, req).await?;

    Ok(WebResponse::ok(
        "Successfully Create Todo List",
        json!({ "task_id": task_id }),
    ))
}

async fn create_tasks(
    State(ctx): State<AppContext>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<TaskBatchRequest>,
) -> ApiResult<WebResponse<Value>> {
    let created = ctx
        .task_manager
        .create_tasks(user_id, req.into_requests()?)
        .await?;

    Ok(WebResponse::ok(
        "Successfully Creates Todo List",
        json!({ "created": created }),
    ))
}

async fn update_task(
    State(ctx): State<AppContext>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiQuery(param): ApiQuery<IdParam>,
    ApiJson(req): ApiJson<TaskRequest>,
) -> ApiResult<WebResponse<Value>> {
    let task_id = single_task(param)?;
    ctx.task_manager.update_task(user_id, task_id, req).await?;

    Ok(WebResponse::ok("Successfully Update Todo List", Value::Null))
}

async fn delete_task(
    State(ctx): State<AppContext>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiQuery(param): ApiQuery<IdParam>,
) -> ApiResult<WebResponse<Value>> {
    let task_id = single_task(param)?;
    ctx.task_manager
        .delete_tasks(user_id, TaskSelector::One(task_id))
        .await?;

    Ok(WebResponse::ok("Successfully Delete Todo List", Value::Null))
}

async fn delete_tasks(
    State(ctx): State<AppContext>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<IdsParams>,
) -> ApiResult<WebResponse<Value>> {
    if params.id.is_empty() {
        return Err(ApiError::BadRequest("query params invalid".to_string()));
    }
    let ids = params
        .id
        .iter()
        .map(|raw| parse_task_id(raw))
        .collect::<ApiResult<Vec<i64>>>()?;
    ctx.task_manager
        .delete_tasks(user_id, TaskSelector::Many(ids))
        .await?;

    Ok(WebResponse::ok("Successfully Delete Todo Lists", Value::Null))
}
