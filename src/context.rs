/// Application context and dependency injection
use crate::{
    account::{AccountManager, SessionManager},
    config::ServerConfig,
    db,
    error::ApiResult,
    todo::TaskManager,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub account_manager: Arc<AccountManager>,
    pub session_manager: Arc<SessionManager>,
    pub task_manager: Arc<TaskManager>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> ApiResult<Self> {
        // Validate configuration
        config.validate()?;

        // Initialize database
        let db = db::create_pool(&config.database).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        tracing::info!("Database ready at {}", config.database.url);

        Ok(Self::with_pool(db, config))
    }

    /// Wire the services over an existing pool
    pub fn with_pool(db: SqlitePool, config: ServerConfig) -> Self {
        let config = Arc::new(config);

        Self {
            account_manager: Arc::new(AccountManager::new(db.clone(), config.clone())),
            session_manager: Arc::new(SessionManager::new(db.clone(), config.clone())),
            task_manager: Arc::new(TaskManager::new(db.clone(), config.clone())),
            config,
            db,
        }
    }

    /// Get the service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
