/// Development data seeding
use crate::{
    account::Role,
    context::AppContext,
    crypto::PasswordHasher,
    db::{self, account::NewAccount},
    error::{ApiError, ApiResult},
};
use rand::{distributions::Alphanumeric, Rng};
use uuid::Uuid;

/// Password given to seeded accounts when none is supplied
pub const DEFAULT_SEED_PASSWORD: &str = "password123";

fn random_username() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!("user_{}", suffix.to_lowercase())
}

/// Insert `count` BASIC accounts with random usernames and emails
pub async fn seed_accounts(ctx: &AppContext, count: usize, password: &str) -> ApiResult<Vec<Uuid>> {
    if count == 0 {
        return Err(ApiError::BadRequest("count must be at least 1".to_string()));
    }
    if password.chars().count() < 8 {
        return Err(ApiError::BadRequest(
            "password: must be at least 8 characters".to_string(),
        ));
    }

    // One hash shared by every seeded row
    let hasher = PasswordHasher::new(ctx.config.authentication.hash_cost);
    let password_hash = hasher.hash(password)?;

    let rows: Vec<NewAccount> = (0..count)
        .map(|_| {
            let username = random_username();
            NewAccount {
                id: Uuid::new_v4(),
                email: format!("{}@example.com", username),
                username,
                password_hash: password_hash.clone(),
                role: Role::Basic,
            }
        })
        .collect();

    let pagination = &ctx.config.pagination;
    let mut tx = ctx.db.begin().await?;
    let result = db::account::insert_accounts(
        &mut tx,
        &rows,
        pagination.batch_size,
        pagination.limit_insert,
    )
    .await
    .map_err(|e| ApiError::from_write_error(e, "user"));
    db::commit_or_rollback(tx, result).await?;

    tracing::info!("seed: inserted {} accounts", rows.len());
    Ok(rows.into_iter().map(|row| row.id).collect())
}
