/// Task database models and operations
use crate::{db::account::like_pattern, paging::PageWindow};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

const TASK_COLUMNS: &str =
    "task_id, user_id, task_name, description, due_date, priority, completed, created_at, updated_at";

/// Task record in the database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Task {
    pub task_id: i64,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub task_name: String,
    pub description: String,
    pub due_date: NaiveDate,
    pub priority: i64,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Task fields supplied on create and update
#[derive(Debug, Clone)]
pub struct TaskFields {
    pub task_name: String,
    pub description: String,
    pub due_date: NaiveDate,
    pub priority: i64,
    pub completed: bool,
}

pub async fn list_tasks(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    window: PageWindow,
) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!(
        "SELECT {} FROM todolist WHERE user_id = ?1 ORDER BY task_id LIMIT ?2 OFFSET ?3",
        TASK_COLUMNS
    ))
    .bind(user_id)
    .bind(window.limit)
    .bind(window.offset)
    .fetch_all(&mut *conn)
    .await
}

pub async fn count_tasks(conn: &mut SqliteConnection, user_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM todolist WHERE user_id = ?1")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await
}

/// Tasks of one user whose name or description contains `search`
pub async fn search_tasks(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    search: &str,
    window: PageWindow,
) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!(
        "SELECT {} FROM todolist
         WHERE user_id = ?1 AND (task_name LIKE ?2 ESCAPE '\\' OR description LIKE ?2 ESCAPE '\\')
         ORDER BY task_id LIMIT ?3 OFFSET ?4",
        TASK_COLUMNS
    ))
    .bind(user_id)
    .bind(like_pattern(search))
    .bind(window.limit)
    .bind(window.offset)
    .fetch_all(&mut *conn)
    .await
}

pub async fn count_search_tasks(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    search: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM todolist
         WHERE user_id = ?1 AND (task_name LIKE ?2 ESCAPE '\\' OR description LIKE ?2 ESCAPE '\\')",
    )
    .bind(user_id)
    .bind(like_pattern(search))
    .fetch_one(&mut *conn)
    .await
}

pub async fn get_task(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    task_id: i64,
) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!(
        "SELECT {} FROM todolist WHERE user_id = ?1 AND task_id = ?2",
        TASK_COLUMNS
    ))
    .bind(user_id)
    .bind(task_id)
    .fetch_optional(&mut *conn)
    .await
}

/// Insert one task and return its id
pub async fn insert_task(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    fields: &TaskFields,
) -> Result<i64, sqlx::Error> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO todolist (user_id, task_name, description, due_date, priority, completed, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
    )
    .bind(user_id)
    .bind(&fields.task_name)
    .bind(&fields.description)
    .bind(fields.due_date)
    .bind(fields.priority)
    .bind(fields.completed)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Insert many tasks for one user, chunked like account batches
pub async fn insert_tasks(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    tasks: &[TaskFields],
    batch_size: usize,
    limit_insert: usize,
) -> Result<(), sqlx::Error> {
    if tasks.len() >= limit_insert {
        for chunk in tasks.chunks(batch_size.max(1)) {
            insert_task_rows(conn, user_id, chunk).await?;
        }
        Ok(())
    } else {
        insert_task_rows(conn, user_id, tasks).await
    }
}

async fn insert_task_rows(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    tasks: &[TaskFields],
) -> Result<(), sqlx::Error> {
    if tasks.is_empty() {
        return Ok(());
    }

    let now = Utc::now();
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "INSERT INTO todolist (user_id, task_name, description, due_date, priority, completed, created_at, updated_at) ",
    );
    builder.push_values(tasks, |mut row, task| {
        row.push_bind(user_id)
            .push_bind(&task.task_name)
            .push_bind(&task.description)
            .push_bind(task.due_date)
            .push_bind(task.priority)
            .push_bind(task.completed)
            .push_bind(now)
            .push_bind(now);
    });

    builder.build().execute(&mut *conn).await?;
    Ok(())
}

pub async fn update_task(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    task_id: i64,
    fields: &TaskFields,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE todolist
         SET task_name = ?1, description = ?2, due_date = ?3, priority = ?4, completed = ?5, updated_at = ?6
         WHERE user_id = ?7 AND task_id = ?8",
    )
    .bind(&fields.task_name)
    .bind(&fields.description)
    .bind(fields.due_date)
    .bind(fields.priority)
    .bind(fields.completed)
    .bind(Utc::now())
    .bind(user_id)
    .bind(task_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// True only if every id names a task of this user
pub async fn tasks_exist(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    task_ids: &[i64],
) -> Result<bool, sqlx::Error> {
    let mut unique = task_ids.to_vec();
    unique.sort_unstable();
    unique.dedup();
    if unique.is_empty() {
        return Ok(false);
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM todolist WHERE user_id = ");
    builder.push_bind(user_id).push(" AND task_id IN (");
    push_task_ids(&mut builder, &unique);
    builder.push(")");

    let found = builder.build_query_scalar::<i64>().fetch_one(&mut *conn).await?;
    Ok(found == unique.len() as i64)
}

pub async fn delete_tasks(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    task_ids: &[i64],
) -> Result<u64, sqlx::Error> {
    if task_ids.is_empty() {
        return Ok(0);
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("DELETE FROM todolist WHERE user_id = ");
    builder.push_bind(user_id).push(" AND task_id IN (");
    push_task_ids(&mut builder, task_ids);
    builder.push(")");

    let result = builder.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

fn push_task_ids(builder: &mut QueryBuilder<'_, Sqlite>, task_ids: &[i64]) {
    let mut separated = builder.separated(", ");
    for id in task_ids {
        separated.push_bind(*id);
    }
}
