/// Account management system
///
/// Handles account creation, profile updates, soft deletion and restore
/// (`AccountManager`) and the login/refresh/logout session lifecycle
/// (`SessionManager`).

mod manager;
mod session;

pub use crate::db::account::Role;
pub use manager::AccountManager;
pub use session::{SessionManager, SessionTokens};

use crate::{
    db::account::Account,
    error::{ApiError, ApiResult},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

const MIN_PASSWORD_LEN: usize = 8;

/// Account creation request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 5, max = 100))]
    pub username: String,
    #[validate(email, length(max = 100))]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
    pub role: Role,
}

/// Login request; all three fields must match the stored account
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 5, max = 100))]
    pub username: String,
    #[validate(email, length(max = 100))]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
}

/// Profile update request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateAccountRequest {
    #[validate(length(min = 5, max = 100))]
    pub username: String,
    #[validate(email, length(max = 100))]
    pub email: String,
    /// Absent or empty leaves the stored password unchanged
    #[serde(default)]
    pub password: Option<String>,
}

impl UpdateAccountRequest {
    /// The replacement password, if one was supplied
    pub fn new_password(&self) -> ApiResult<Option<&str>> {
        match self.password.as_deref() {
            None | Some("") => Ok(None),
            Some(password) if password.chars().count() < MIN_PASSWORD_LEN => Err(
                ApiError::BadRequest(format!(
                    "password: must be at least {} characters",
                    MIN_PASSWORD_LEN
                )),
            ),
            Some(password) => Ok(Some(password)),
        }
    }
}

/// Public view of an account; never carries the password hash or session pointer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            email: account.email,
            role: account.role,
            created_at: account.created_at,
            updated_at: account.updated_at,
            deleted_at: account.deleted_at,
        }
    }
}
