/// Session lifecycle: login, access token refresh and logout
///
/// The refresh token stored on the account row is the only server-side
/// session state. Overwriting it on login ends the previous session;
/// clearing it on logout revokes the session. Access tokens are never
/// stored and stay valid until they expire.
use crate::{
    account::LoginRequest,
    config::ServerConfig,
    crypto::{PasswordHasher, TokenCodec},
    db::{self, account as store},
    error::{ApiError, ApiResult},
};
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use validator::Validate;

const LOGIN_FAILED: &str = "Email or Username or Password Wrong";

/// Tokens handed out by a successful login
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Session service
pub struct SessionManager {
    db: SqlitePool,
    codec: TokenCodec,
    hasher: PasswordHasher,
}

impl SessionManager {
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> Self {
        Self {
            db,
            codec: TokenCodec::new(&config.authentication),
            hasher: PasswordHasher::new(config.authentication.hash_cost),
        }
    }

    /// Verifier for access tokens presented to the gate
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Authenticate by email, username and password and open a new session
    pub async fn login(&self, request: LoginRequest) -> ApiResult<SessionTokens> {
        let mut tx = self.db.begin().await?;
        let result = self.login_in(&mut tx, &request).await;
        let tokens = db::commit_or_rollback(tx, result).await?;

        tracing::info!("login: session opened for {}", request.email);
        Ok(tokens)
    }

    async fn login_in(
        &self,
        conn: &mut SqliteConnection,
        request: &LoginRequest,
    ) -> ApiResult<SessionTokens> {
        request.validate()?;

        // Every mismatch collapses into the same message
        let account = match store::get_account_by_email(conn, &request.email).await? {
            Some(account) => account,
            None => {
                tracing::debug!("login: unknown email");
                return Err(ApiError::BadRequest(LOGIN_FAILED.to_string()));
            }
        };
        if account.email != request.email
            || account.username != request.username
            || !self.hasher.verify(&request.password, &account.password)
        {
            tracing::debug!("login: credential mismatch for {}", account.id);
            return Err(ApiError::BadRequest(LOGIN_FAILED.to_string()));
        }

        let access_token =
            self.codec
                .issue_access_token(account.id, &account.username, &account.email)?;
        let refresh_token = self.codec.issue_refresh_token()?;

        store::set_refresh_token(conn, account.id, Some(&refresh_token)).await?;

        Ok(SessionTokens {
            access_token,
            refresh_token,
        })
    }

    /// Mint a new access token for the session holding `refresh_token`.
    ///
    /// The refresh token itself is not rotated.
    pub async fn refresh(&self, refresh_token: &str) -> ApiResult<String> {
        let mut tx = self.db.begin().await?;
        let result: ApiResult<_> = async {
            let account = store::get_account_by_refresh_token(&mut tx, refresh_token)
                .await?
                .ok_or_else(|| ApiError::NotFound("refresh token not found".to_string()))?;

            self.codec.verify_refresh_token(refresh_token)?;
            self.codec
                .issue_access_token(account.id, &account.username, &account.email)
        }
        .await;

        db::commit_or_rollback(tx, result).await
    }

    /// Revoke the session holding `refresh_token`
    pub async fn logout(&self, refresh_token: &str) -> ApiResult<()> {
        let mut tx = self.db.begin().await?;
        let result: ApiResult<_> = async {
            let account = store::get_account_by_refresh_token(&mut tx, refresh_token)
                .await?
                .ok_or_else(|| ApiError::NotFound("refresh token not found".to_string()))?;

            store::set_refresh_token(&mut tx, account.id, None).await?;
            Ok(account.id)
        }
        .await;
        let id = db::commit_or_rollback(tx, result).await?;

        tracing::info!("logout: session closed for {}", id);
        Ok(())
    }
}
