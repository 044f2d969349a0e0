use anyhow::Context;
use std::net::SocketAddr;

use cinema_booking::{
    build_router,
    config::Config,
    database::Database,
    models::User,
    telemetry, AppState,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Failed to load configuration")?;

    telemetry::init_tracing(&config.app);
    tracing::info!("Starting Cinema Booking API ({})", config.app.environment);

    let db = Database::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    if config.database.run_migrations {
        db.run_migrations().await.context("Failed to run migrations")?;
    }

    // `cinema_booking create-user <email> <password>` provisions an account and exits
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let [command, email, password] = args.as_slice() {
        if command == "create-user" {
            let user = User::create(&db.pool, email, password, bcrypt::DEFAULT_COST).await?;
            tracing::info!("User {} created with id {}", user.email, user.id);
            return Ok(());
        }
    }
    if !args.is_empty() {
        anyhow::bail!("usage: cinema_booking [create-user <email> <password>]");
    }

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port)
        .parse()
        .context("Invalid HOST/PORT")?;

    let app = build_router(AppState::new(db, config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
