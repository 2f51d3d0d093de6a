/// Tasklane - multi-tenant task backend
///
/// Accounts with JWT sessions and role gates, each owning a private task list.

mod account;
mod api;
mod auth;
mod config;
mod context;
mod crypto;
mod db;
mod error;
mod paging;
mod seed;
mod server;
mod todo;

use clap::Parser;
use config::{LoggingConfig, ServerConfig};
use context::AppContext;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "tasklane", about = "Multi-tenant task backend", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Start the HTTP server (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Insert random BASIC accounts for development
    Seed {
        /// Number of accounts to create
        #[arg(long, default_value = "10")]
        count: usize,
        /// Password shared by the seeded accounts
        #[arg(long, default_value = seed::DEFAULT_SEED_PASSWORD)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = ServerConfig::from_env()?;

    // Initialize logging
    init_tracing(&config.logging);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            print_banner();
            let ctx = AppContext::new(config).await?;
            server::serve(ctx).await?;
        }
        Command::Migrate => {
            let pool = db::create_pool(&config.database).await?;
            db::run_migrations(&pool).await?;
            tracing::info!("Migrations applied to {}", config.database.url);
            pool.close().await;
        }
        Command::Seed { count, password } => {
            let ctx = AppContext::new(config).await?;
            let ids = seed::seed_accounts(&ctx, count, &password).await?;
            println!("Seeded {} accounts", ids.len());
            ctx.db.close().await;
        }
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level)
        .unwrap_or_else(|_| "tasklane=debug,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(filter)
        .with(logging.json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!logging.json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

fn print_banner() {
    println!(
        r#"
  _            _    _
 | |_ __ _ ___| | _| | __ _ _ __   ___
 | __/ _` / __| |/ / |/ _` | '_ \ / _ \
 | || (_| \__ \   <| | (_| | | | |  __/
  \__\__,_|___/_|\_\_|\__,_|_| |_|\___|

        Multi-tenant task backend v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
