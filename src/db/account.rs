/// Account database models and operations
///
/// Rows with a non-null `deleted_at` are soft-deleted: single-row lookups
/// and existence checks skip them, listings include them, and restore
/// clears the marker again.
use crate::paging::PageWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

const ACCOUNT_COLUMNS: &str =
    "id, username, email, password, role, refresh_token, created_at, updated_at, deleted_at";

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Moderator,
    #[default]
    Basic,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "ADMIN"),
            Role::Moderator => write!(f, "MODERATOR"),
            Role::Basic => write!(f, "BASIC"),
        }
    }
}

/// Account record in the database
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Argon2 hash, never the plaintext
    pub password: String,
    pub role: Role,
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Row to insert
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Profile changes; the password hash is only replaced when present
#[derive(Debug, Clone)]
pub struct AccountChanges {
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
}

/// `%search%` with LIKE wildcards in `search` matched literally; pair with `ESCAPE '\'`
pub(crate) fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Page of accounts, soft-deleted included
pub async fn list_accounts(
    conn: &mut SqliteConnection,
    window: PageWindow,
) -> Result<Vec<Account>, sqlx::Error> {
    sqlx::query_as::<_, Account>(&format!(
        "SELECT {} FROM users ORDER BY created_at, id LIMIT ?1 OFFSET ?2",
        ACCOUNT_COLUMNS
    ))
    .bind(window.limit)
    .bind(window.offset)
    .fetch_all(&mut *conn)
    .await
}

pub async fn count_accounts(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&mut *conn)
        .await
}

/// Page of accounts whose username or email contains `search`
pub async fn search_accounts(
    conn: &mut SqliteConnection,
    search: &str,
    window: PageWindow,
) -> Result<Vec<Account>, sqlx::Error> {
    sqlx::query_as::<_, Account>(&format!(
        "SELECT {} FROM users WHERE username LIKE ?1 ESCAPE '\\' OR email LIKE ?1 ESCAPE '\\'
         ORDER BY created_at, id LIMIT ?2 OFFSET ?3",
        ACCOUNT_COLUMNS
    ))
    .bind(like_pattern(search))
    .bind(window.limit)
    .bind(window.offset)
    .fetch_all(&mut *conn)
    .await
}

pub async fn count_search_accounts(
    conn: &mut SqliteConnection,
    search: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username LIKE ?1 ESCAPE '\\' OR email LIKE ?1 ESCAPE '\\'")
        .bind(like_pattern(search))
        .fetch_one(&mut *conn)
        .await
}

pub async fn get_account_by_id(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<Account>, sqlx::Error> {
    sqlx::query_as::<_, Account>(&format!(
        "SELECT {} FROM users WHERE id = ?1 AND deleted_at IS NULL",
        ACCOUNT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn get_account_by_email(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<Account>, sqlx::Error> {
    sqlx::query_as::<_, Account>(&format!(
        "SELECT {} FROM users WHERE email = ?1 AND deleted_at IS NULL",
        ACCOUNT_COLUMNS
    ))
    .bind(email)
    .fetch_optional(&mut *conn)
    .await
}

/// Resolve a session by its stored refresh token (exact match)
pub async fn get_account_by_refresh_token(
    conn: &mut SqliteConnection,
    token: &str,
) -> Result<Option<Account>, sqlx::Error> {
    sqlx::query_as::<_, Account>(&format!(
        "SELECT {} FROM users WHERE refresh_token = ?1 AND deleted_at IS NULL",
        ACCOUNT_COLUMNS
    ))
    .bind(token)
    .fetch_optional(&mut *conn)
    .await
}

#[cfg(test)]
pub async fn insert_account(
    conn: &mut SqliteConnection,
    account: &NewAccount,
) -> Result<(), sqlx::Error> {
    insert_account_rows(conn, std::slice::from_ref(account)).await
}

/// Insert many accounts. Batches of at least `limit_insert` rows are split
/// into statements of `batch_size` rows each.
pub async fn insert_accounts(
    conn: &mut SqliteConnection,
    accounts: &[NewAccount],
    batch_size: usize,
    limit_insert: usize,
) -> Result<(), sqlx::Error> {
    if accounts.len() >= limit_insert {
        for chunk in accounts.chunks(batch_size.max(1)) {
            insert_account_rows(conn, chunk).await?;
        }
        Ok(())
    } else {
        insert_account_rows(conn, accounts).await
    }
}

async fn insert_account_rows(
    conn: &mut SqliteConnection,
    accounts: &[NewAccount],
) -> Result<(), sqlx::Error> {
    if accounts.is_empty() {
        return Ok(());
    }

    let now = Utc::now();
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "INSERT INTO users (id, username, email, password, role, created_at, updated_at) ",
    );
    builder.push_values(accounts, |mut row, account| {
        row.push_bind(account.id)
            .push_bind(&account.username)
            .push_bind(&account.email)
            .push_bind(&account.password_hash)
            .push_bind(account.role)
            .push_bind(now)
            .push_bind(now);
    });

    builder.build().execute(&mut *conn).await?;
    Ok(())
}

/// Returns false when no live row matched
pub async fn update_account(
    conn: &mut SqliteConnection,
    id: Uuid,
    changes: &AccountChanges,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users
         SET username = ?1, email = ?2, password = COALESCE(?3, password), updated_at = ?4
         WHERE id = ?5 AND deleted_at IS NULL",
    )
    .bind(&changes.username)
    .bind(&changes.email)
    .bind(changes.password_hash.as_deref())
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Set or clear the session pointer
pub async fn set_refresh_token(
    conn: &mut SqliteConnection,
    id: Uuid,
    token: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET refresh_token = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(token)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

#[cfg(test)]
pub async fn soft_delete_account(conn: &mut SqliteConnection, id: Uuid) -> Result<(), sqlx::Error> {
    soft_delete_accounts(conn, &[id]).await
}

pub async fn soft_delete_accounts(
    conn: &mut SqliteConnection,
    ids: &[Uuid],
) -> Result<(), sqlx::Error> {
    if ids.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET deleted_at = ");
    builder
        .push_bind(Utc::now())
        .push(" WHERE deleted_at IS NULL AND id IN (");
    push_id_list(&mut builder, ids);
    builder.push(")");

    builder.build().execute(&mut *conn).await?;
    Ok(())
}

#[cfg(test)]
pub async fn restore_account(conn: &mut SqliteConnection, id: Uuid) -> Result<(), sqlx::Error> {
    restore_accounts(conn, &[id]).await
}

/// Clear the soft-delete marker; live rows are left untouched
pub async fn restore_accounts(conn: &mut SqliteConnection, ids: &[Uuid]) -> Result<(), sqlx::Error> {
    if ids.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("UPDATE users SET deleted_at = NULL WHERE deleted_at IS NOT NULL AND id IN (");
    push_id_list(&mut builder, ids);
    builder.push(")");

    builder.build().execute(&mut *conn).await?;
    Ok(())
}

pub async fn account_exists(conn: &mut SqliteConnection, id: Uuid) -> Result<bool, sqlx::Error> {
    accounts_exist(conn, &[id]).await
}

/// True only if every id names a live account
pub async fn accounts_exist(conn: &mut SqliteConnection, ids: &[Uuid]) -> Result<bool, sqlx::Error> {
    count_matching(conn, ids, true).await
}

#[cfg(test)]
pub async fn account_exists_any_state(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<bool, sqlx::Error> {
    accounts_exist_any_state(conn, &[id]).await
}

/// True only if every id names an account, soft-deleted or not
pub async fn accounts_exist_any_state(
    conn: &mut SqliteConnection,
    ids: &[Uuid],
) -> Result<bool, sqlx::Error> {
    count_matching(conn, ids, false).await
}

async fn count_matching(
    conn: &mut SqliteConnection,
    ids: &[Uuid],
    live_only: bool,
) -> Result<bool, sqlx::Error> {
    let mut unique = ids.to_vec();
    unique.sort();
    unique.dedup();
    if unique.is_empty() {
        return Ok(false);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM users WHERE ");
    if live_only {
        builder.push("deleted_at IS NULL AND ");
    }
    builder.push("id IN (");
    push_id_list(&mut builder, &unique);
    builder.push(")");

    let found = builder.build_query_scalar::<i64>().fetch_one(&mut *conn).await?;
    Ok(found == unique.len() as i64)
}

/// Live accounts holding the admin role
pub async fn count_admins(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = ?1 AND deleted_at IS NULL")
        .bind(Role::Admin)
        .fetch_one(&mut *conn)
        .await
}

/// Soft-deleted admins among `ids`
pub async fn count_deleted_admins(
    conn: &mut SqliteConnection,
    ids: &[Uuid],
) -> Result<i64, sqlx::Error> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM users WHERE role = ");
    builder
        .push_bind(Role::Admin)
        .push(" AND deleted_at IS NOT NULL AND id IN (");
    push_id_list(&mut builder, ids);
    builder.push(")");

    builder.build_query_scalar::<i64>().fetch_one(&mut *conn).await
}

fn push_id_list(builder: &mut QueryBuilder<'_, Sqlite>, ids: &[Uuid]) {
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
}
