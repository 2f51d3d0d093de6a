/// Account manager
///
/// Every mutation runs in its own transaction: the checks and writes go
/// through a borrowed connection and the outcome decides between commit and
/// rollback in `db::commit_or_rollback`.
use crate::{
    account::{RegisterRequest, Role, UpdateAccountRequest},
    config::ServerConfig,
    crypto::PasswordHasher,
    db::{
        self,
        account::{self as store, Account, AccountChanges, NewAccount},
    },
    error::{ApiError, ApiResult},
    paging::{ListQuery, Pagination},
};
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

fn not_found(id: impl std::fmt::Debug) -> ApiError {
    ApiError::NotFound(format!("users with id {:?} not found", id))
}

fn admin_limit() -> ApiError {
    ApiError::Unauthorized("admin is maximum one person".to_string())
}

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
    hasher: PasswordHasher,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> Self {
        let hasher = PasswordHasher::new(config.authentication.hash_cost);
        Self { db, config, hasher }
    }

    /// Register a single account and return its generated id
    pub async fn create_account(&self, request: RegisterRequest) -> ApiResult<Uuid> {
        let mut tx = self.db.begin().await?;
        let result = self.create_in(&mut tx, vec![request]).await;
        let ids = db::commit_or_rollback(tx, result).await?;

        let id = ids
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Internal("account insert returned no id".to_string()))?;
        tracing::info!("create_account: created account {}", id);
        Ok(id)
    }

    /// Register a batch of accounts atomically
    pub async fn create_accounts(&self, requests: Vec<RegisterRequest>) -> ApiResult<Vec<Uuid>> {
        if requests.is_empty() {
            return Err(ApiError::BadRequest("users: at least one account required".to_string()));
        }

        let mut tx = self.db.begin().await?;
        let result = self.create_in(&mut tx, requests).await;
        let ids = db::commit_or_rollback(tx, result).await?;

        tracing::info!("create_accounts: created {} accounts", ids.len());
        Ok(ids)
    }

    async fn create_in(
        &self,
        conn: &mut SqliteConnection,
        requests: Vec<RegisterRequest>,
    ) -> ApiResult<Vec<Uuid>> {
        for request in &requests {
            request.validate()?;
        }

        let requested_admins = requests.iter().filter(|r| r.role == Role::Admin).count();
        if requested_admins > 0 {
            // Read-then-write: two concurrent admin registrations can both pass
            let existing = store::count_admins(conn).await?;
            if existing >= 1 || requested_admins > 1 {
                tracing::warn!("create_account: rejected additional admin");
                return Err(admin_limit());
            }
        }

        let mut rows = Vec::with_capacity(requests.len());
        for request in requests {
            rows.push(NewAccount {
                id: Uuid::new_v4(),
                password_hash: self.hasher.hash(&request.password)?,
                username: request.username,
                email: request.email,
                role: request.role,
            });
        }

        let pagination = &self.config.pagination;
        store::insert_accounts(conn, &rows, pagination.batch_size, pagination.limit_insert)
            .await
            .map_err(|e| ApiError::from_write_error(e, "user"))?;

        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    /// Update username, email and optionally the password of a live account
    pub async fn update_account(&self, id: Uuid, request: UpdateAccountRequest) -> ApiResult<()> {
        let mut tx = self.db.begin().await?;
        let result = self.update_in(&mut tx, id, &request).await;
        db::commit_or_rollback(tx, result).await?;

        tracing::info!("update_account: updated account {}", id);
        Ok(())
    }

    async fn update_in(
        &self,
        conn: &mut SqliteConnection,
        id: Uuid,
        request: &UpdateAccountRequest,
    ) -> ApiResult<()> {
        request.validate()?;
        let new_password = request.new_password()?;

        if !store::account_exists(conn, id).await? {
            return Err(not_found(id));
        }

        let password_hash = match new_password {
            Some(password) => Some(self.hasher.hash(password)?),
            None => None,
        };
        let changes = AccountChanges {
            username: request.username.clone(),
            email: request.email.clone(),
            password_hash,
        };

        let updated = store::update_account(conn, id, &changes)
            .await
            .map_err(|e| ApiError::from_write_error(e, "user"))?;
        if !updated {
            return Err(not_found(id));
        }

        Ok(())
    }

    /// Soft-delete one live account
    pub async fn delete_account(&self, id: Uuid) -> ApiResult<()> {
        self.delete_accounts_inner(&[id], not_found(id)).await?;
        tracing::info!("delete_account: soft-deleted account {}", id);
        Ok(())
    }

    /// Soft-delete several live accounts; fails unless every id exists
    pub async fn delete_accounts(&self, ids: &[Uuid]) -> ApiResult<()> {
        self.delete_accounts_inner(ids, not_found(ids)).await?;
        tracing::info!("delete_accounts: soft-deleted {} accounts", ids.len());
        Ok(())
    }

    async fn delete_accounts_inner(&self, ids: &[Uuid], missing: ApiError) -> ApiResult<()> {
        let mut tx = self.db.begin().await?;
        let result: ApiResult<_> = async {
            if !store::accounts_exist(&mut tx, ids).await? {
                return Err(missing);
            }
            store::soft_delete_accounts(&mut tx, ids).await?;
            Ok(())
        }
        .await;
        db::commit_or_rollback(tx, result).await
    }

    /// Restore one account. Restoring a live account is a no-op.
    pub async fn restore_account(&self, id: Uuid) -> ApiResult<()> {
        self.restore_accounts_inner(&[id], not_found(id)).await?;
        tracing::info!("restore_account: restored account {}", id);
        Ok(())
    }

    /// Restore several accounts; fails unless every id exists in any state
    pub async fn restore_accounts(&self, ids: &[Uuid]) -> ApiResult<()> {
        self.restore_accounts_inner(ids, not_found(ids)).await?;
        tracing::info!("restore_accounts: restored {} accounts", ids.len());
        Ok(())
    }

    async fn restore_accounts_inner(&self, ids: &[Uuid], missing: ApiError) -> ApiResult<()> {
        let mut tx = self.db.begin().await?;
        let result: ApiResult<_> = async {
            if !store::accounts_exist_any_state(&mut tx, ids).await? {
                return Err(missing);
            }

            // Restoring must not bring back a second live admin
            let returning_admins = store::count_deleted_admins(&mut tx, ids).await?;
            if returning_admins > 0 && store::count_admins(&mut tx).await? + returning_admins > 1 {
                tracing::warn!("restore_accounts: rejected additional admin");
                return Err(admin_limit());
            }

            store::restore_accounts(&mut tx, ids).await?;
            Ok(())
        }
        .await;
        db::commit_or_rollback(tx, result).await
    }

    /// Paginated listing, soft-deleted accounts included
    pub async fn find_accounts(&self, query: ListQuery) -> ApiResult<(Vec<Account>, Pagination)> {
        let limit = self.config.pagination.limit;
        let window = query.window(limit)?;

        let mut tx = self.db.begin().await?;
        let result: ApiResult<_> = async {
            match &query {
                ListQuery::All { .. } => {
                    let accounts = store::list_accounts(&mut tx, window).await?;
                    let total = store::count_accounts(&mut tx).await?;
                    Ok((accounts, total))
                }
                ListQuery::Search { search, .. } => {
                    let accounts = store::search_accounts(&mut tx, search, window).await?;
                    let total = store::count_search_accounts(&mut tx, search).await?;
                    Ok((accounts, total))
                }
            }
        }
        .await;
        let (accounts, total) = db::commit_or_rollback(tx, result).await?;

        Ok((accounts, Pagination::new(query.page(), limit, total)))
    }

    /// Fetch one live account
    pub async fn find_account(&self, id: Uuid) -> ApiResult<Account> {
        let mut conn = self.db.acquire().await?;
        store::get_account_by_id(&mut conn, id)
            .await?
            .ok_or_else(|| not_found(id))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        config::tests::test_config,
        db::test_pool,
        paging::{PageParams, MAX_PAGE},
    };

    pub(crate) async fn test_manager() -> (AccountManager, SqlitePool) {
        let pool = test_pool().await;
        let manager = AccountManager::new(pool.clone(), Arc::new(test_config()));
        (manager, pool)
    }

    pub(crate) fn register(username: &str, role: Role) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: "password123".to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn test_create_and_find_account() {
        let (manager, _pool) = test_manager().await;
        let id = manager
            .create_account(register("alice123", Role::Basic))
            .await
            .unwrap();

        let account = manager.find_account(id).await.unwrap();
        assert_eq!(account.username, "alice123");
        assert_ne!(account.password, "password123");
        assert!(account.password.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_second_admin_rejected() {
        let (manager, _pool) = test_manager().await;
        manager
            .create_account(register("admin001", Role::Admin))
            .await
            .unwrap();

        let err = manager
            .create_account(register("admin002", Role::Admin))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "admin is maximum one person"));
    }

    #[tokio::test]
    async fn test_batch_with_two_admins_rejected() {
        let (manager, pool) = test_manager().await;
        let err = manager
            .create_accounts(vec![register("admin001", Role::Admin), register("admin002", Role::Admin)])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let (manager, _pool) = test_manager().await;
        manager
            .create_account(register("alice123", Role::Basic))
            .await
            .unwrap();

        let err = manager
            .create_account(register("alice123", Role::Basic))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_invalid_request_is_bad_request() {
        let (manager, _pool) = test_manager().await;
        let mut request = register("alice123", Role::Basic);
        request.password = "short".to_string();

        let err = manager.create_account(request).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_batch_is_atomic() {
        let (manager, pool) = test_manager().await;
        let mut duplicate = register("bobby123", Role::Basic);
        duplicate.email = "alice123@example.com".to_string();

        let err = manager
            .create_accounts(vec![register("alice123", Role::Basic), duplicate])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_update_missing_account() {
        let (manager, _pool) = test_manager().await;
        let request = UpdateAccountRequest {
            username: "alice123".to_string(),
            email: "alice@example.com".to_string(),
            password: None,
        };

        let err = manager.update_account(Uuid::new_v4(), request).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_then_restore() {
        let (manager, _pool) = test_manager().await;
        let id = manager
            .create_account(register("alice123", Role::Basic))
            .await
            .unwrap();

        manager.delete_account(id).await.unwrap();
        assert!(matches!(manager.find_account(id).await, Err(ApiError::NotFound(_))));
        // A second delete finds no live row
        assert!(matches!(manager.delete_account(id).await, Err(ApiError::NotFound(_))));

        manager.restore_account(id).await.unwrap();
        assert!(manager.find_account(id).await.is_ok());
        // Restoring a live account succeeds without change
        manager.restore_account(id).await.unwrap();
    }

    #[tokio::test]
    async fn test_restore_cannot_revive_second_admin() {
        let (manager, _pool) = test_manager().await;
        let first = manager
            .create_account(register("admin001", Role::Admin))
            .await
            .unwrap();
        manager.delete_account(first).await.unwrap();
        let second = manager
            .create_account(register("admin002", Role::Admin))
            .await
            .unwrap();

        let err = manager.restore_account(first).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "admin is maximum one person"));
        assert!(matches!(manager.find_account(first).await, Err(ApiError::NotFound(_))));

        // Once the live admin is gone the old one may return
        manager.delete_account(second).await.unwrap();
        manager.restore_account(first).await.unwrap();
        assert_eq!(manager.find_account(first).await.unwrap().role, Role::Admin);

        // Restoring both in one batch would leave two admins
        manager.delete_account(first).await.unwrap();
        assert!(matches!(
            manager.restore_accounts(&[first, second]).await,
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_page_past_offset_range_is_bad_request() {
        let (manager, _pool) = test_manager().await;
        let params = PageParams {
            page: Some(MAX_PAGE.to_string()),
            search: None,
        };
        // limit 2 in the test config keeps the offset in range
        assert!(manager.find_accounts(ListQuery::all(&params).unwrap()).await.is_ok());

        let params = PageParams {
            page: Some(i64::MAX.to_string()),
            search: None,
        };
        assert!(matches!(ListQuery::all(&params), Err(ApiError::BadRequest(_))));
        assert!(matches!(
            manager.find_accounts(ListQuery::All { page: i64::MAX }).await,
            Err(ApiError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_bulk_operations_need_every_id() {
        let (manager, _pool) = test_manager().await;
        let ids = manager
            .create_accounts(vec![register("alice123", Role::Basic), register("bobby123", Role::Basic)])
            .await
            .unwrap();

        let mut with_unknown = ids.clone();
        with_unknown.push(Uuid::new_v4());
        assert!(matches!(
            manager.delete_accounts(&with_unknown).await,
            Err(ApiError::NotFound(_))
        ));

        manager.delete_accounts(&ids).await.unwrap();
        manager.restore_accounts(&ids).await.unwrap();
        assert!(manager.find_account(ids[1]).await.is_ok());
    }

    #[tokio::test]
    async fn test_listing_includes_deleted_accounts() {
        let (manager, _pool) = test_manager().await;
        let ids = manager
            .create_accounts(vec![
                register("alice123", Role::Basic),
                register("bobby123", Role::Basic),
                register("carol123", Role::Moderator),
            ])
            .await
            .unwrap();
        manager.delete_account(ids[0]).await.unwrap();

        let (accounts, pagination) = manager.find_accounts(ListQuery::All { page: 1 }).await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(pagination.data, 3);
        assert_eq!(pagination.total_page, 2);

        let (found, pagination) = manager
            .find_accounts(ListQuery::Search {
                page: 1,
                search: "carol".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(pagination.data, 1);
    }
}
