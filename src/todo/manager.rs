/// Task manager
use crate::{
    config::ServerConfig,
    db::{
        self,
        task::{self as store, Task, TaskFields},
    },
    error::{ApiError, ApiResult},
    paging::{ListQuery, Pagination},
    todo::{TaskRequest, TaskSelector},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

fn task_not_found(ids: &[i64]) -> ApiError {
    match ids {
        [id] => ApiError::NotFound(format!("todolist with id {} not found", id)),
        _ => ApiError::NotFound(format!("todolist with id {:?} not found", ids)),
    }
}

fn write_error(err: sqlx::Error) -> ApiError {
    ApiError::from_write_error(err, "user")
}

/// Task service
pub struct TaskManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
}

impl TaskManager {
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> Self {
        Self { db, config }
    }

    /// Paginated tasks of one user
    pub async fn find_tasks(
        &self,
        user_id: Uuid,
        query: ListQuery,
    ) -> ApiResult<(Vec<Task>, Pagination)> {
        let limit = self.config.pagination.limit;
        let window = query.window(limit)?;

        let mut tx = self.db.begin().await?;
        let result: ApiResult<_> = async {
            match &query {
                ListQuery::All { .. } => {
                    let tasks = store::list_tasks(&mut tx, user_id, window).await?;
                    let total = store::count_tasks(&mut tx, user_id).await?;
                    Ok((tasks, total))
                }
                ListQuery::Search { search, .. } => {
                    let tasks = store::search_tasks(&mut tx, user_id, search, window).await?;
                    let total = store::count_search_tasks(&mut tx, user_id, search).await?;
                    Ok((tasks, total))
                }
            }
        }
        .await;
        let (tasks, total) = db::commit_or_rollback(tx, result).await?;

        Ok((tasks, Pagination::new(query.page(), limit, total)))
    }

    pub async fn find_task(&self, user_id: Uuid, task_id: i64) -> ApiResult<Task> {
        let mut conn = self.db.acquire().await?;
        store::get_task(&mut conn, user_id, task_id)
            .await?
            .ok_or_else(|| task_not_found(&[task_id]))
    }

    pub async fn create_task(&self, user_id: Uuid, request: TaskRequest) -> ApiResult<i64> {
        let fields = request.into_fields()?;

        let mut tx = self.db.begin().await?;
        let result = store::insert_task(&mut tx, user_id, &fields)
            .await
            .map_err(write_error);
        let task_id = db::commit_or_rollback(tx, result).await?;

        tracing::info!("create_task: task {} for {}", task_id, user_id);
        Ok(task_id)
    }

    /// Create several tasks atomically
    pub async fn create_tasks(&self, user_id: Uuid, requests: Vec<TaskRequest>) -> ApiResult<usize> {
        if requests.is_empty() {
            return Err(ApiError::BadRequest("todo_list: at least one task required".to_string()));
        }
        let fields = requests
            .into_iter()
            .map(TaskRequest::into_fields)
            .collect::<ApiResult<Vec<TaskFields>>>()?;

        let pagination = &self.config.pagination;
        let mut tx = self.db.begin().await?;
        let result = store::insert_tasks(
            &mut tx,
            user_id,
            &fields,
            pagination.batch_size,
            pagination.limit_insert,
        )
        .await
        .map_err(write_error);
        db::commit_or_rollback(tx, result).await?;

        tracing::info!("create_tasks: {} tasks for {}", fields.len(), user_id);
        Ok(fields.len())
    }

    pub async fn update_task(&self, user_id: Uuid, task_id: i64, request: TaskRequest) -> ApiResult<()> {
        let fields = request.into_fields()?;

        let mut tx = self.db.begin().await?;
        let result: ApiResult<_> = async {
            let updated = store::update_task(&mut tx, user_id, task_id, &fields)
                .await
                .map_err(write_error)?;
            if !updated {
                return Err(task_not_found(&[task_id]));
            }
            Ok(())
        }
        .await;
        db::commit_or_rollback(tx, result).await?;

        tracing::info!("update_task: task {} for {}", task_id, user_id);
        Ok(())
    }

    /// Hard-delete the selected tasks; fails unless every id exists
    pub async fn delete_tasks(&self, user_id: Uuid, selector: TaskSelector) -> ApiResult<()> {
        let ids = selector.ids();
        if ids.is_empty() {
            return Err(ApiError::BadRequest("id: at least one task id required".to_string()));
        }

        let mut tx = self.db.begin().await?;
        let result: ApiResult<_> = async {
            if !store::tasks_exist(&mut tx, user_id, ids).await? {
                return Err(task_not_found(ids));
            }
            store::delete_tasks(&mut tx, user_id, ids).await?;
            Ok(())
        }
        .await;
        db::commit_or_rollback(tx, result).await?;

        tracing::info!("delete_tasks: removed {} tasks for {}", ids.len(), user_id);
        Ok(())
    }
}
