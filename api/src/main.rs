mod auth;
mod config;
mod database;
mod openapi;
mod request_logging;
mod search;
mod validation;

use clap::{Parser, Subcommand};
use config::ShopConfig;
use database::{Database, Role};
use poem::{
    handler, listener::TcpListener, middleware::CookieJarManager, middleware::Cors, Endpoint,
    EndpointExt, Route, Server,
};
use poem_openapi::OpenApiService;
use request_logging::RequestLogging;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "shop-api")]
#[command(about = "Shop catalog, cart and order API server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve,
    /// Grant the admin role to an existing account
    PromoteAdmin {
        #[arg(long)]
        email: String,
    },
}

struct AppContext {
    database: Arc<Database>,
    config: Arc<ShopConfig>,
}

async fn setup_app_context() -> anyhow::Result<AppContext> {
    let config = ShopConfig::from_env()?;
    let database = match Database::new(&config.database_url).await {
        Ok(db) => {
            tracing::info!("Database initialized at {}", config.database_url);
            Arc::new(db)
        }
        Err(e) => {
            tracing::error!(
                "Failed to initialize database at {}: {:#}",
                config.database_url,
                e
            );
            return Err(e.context("Database initialization failed"));
        }
    };

    Ok(AppContext {
        database,
        config: Arc::new(config),
    })
}

#[handler]
fn root() -> &'static str {
    "Shop API server is running"
}

fn create_app(ctx: AppContext) -> impl Endpoint {
    let api_service = OpenApiService::new(
        openapi::create_combined_api(),
        "Shop API",
        env!("CARGO_PKG_VERSION"),
    )
    .server(format!("http://localhost:{}/api", ctx.config.port));
    let swagger_ui = api_service.swagger_ui();
    let spec = api_service.spec_endpoint();

    Route::new()
        .at("/", poem::get(root))
        .nest("/api", api_service)
        .nest("/docs", swagger_ui)
        .at("/openapi.json", spec)
        .with(Cors::new())
        .with(CookieJarManager::new())
        .with(RequestLogging)
        .data(ctx.database)
        .data(ctx.config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve => serve_command().await,
        Commands::PromoteAdmin { email } => promote_admin_command(&email).await,
    }
}

async fn serve_command() -> anyhow::Result<()> {
    let ctx = setup_app_context().await?;
    let addr = format!("0.0.0.0:{}", ctx.config.port);

    tracing::info!(
        "Starting Shop API server on {} ({})",
        addr,
        ctx.config.environment
    );
    Server::new(TcpListener::bind(&addr))
        .run(create_app(ctx))
        .await?;
    Ok(())
}

async fn promote_admin_command(email: &str) -> anyhow::Result<()> {
    let ctx = setup_app_context().await?;
    if !ctx.database.set_user_role(email, Role::Admin).await? {
        anyhow::bail!("No user registered with email {}", email);
    }
    tracing::info!("Granted admin role to {}", email);
    Ok(())
}
