use axum::{middleware as axum_middleware, routing::get, Router};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

use dashtam_backend_core::handlers::docs::ApiDoc;
use dashtam_backend_core::handlers::{health, protected_routes, public_routes};
use dashtam_backend_core::{auth_middleware, initialize_app_state};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Version flag for container health checks - must be FIRST
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 && args[1] == "--version" {
        println!("dashtam-backend v{}", env!("CARGO_PKG_VERSION"));
        std::process::exit(0);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "dashtam_backend_core=debug,axum=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenv::dotenv().ok();

    let config = dashtam_backend_core::app_config::config();
    let bind_address = config.bind_address.clone();
    info!("=== STARTING DASHTAM BACKEND CORE ===");
    info!("Environment: {:?}", config.environment);
    if config.use_remote_logging() {
        info!(
            "Remote log shipping target region: {}",
            config.aws_region.as_deref().unwrap_or("unset")
        );
    }

    let state = match initialize_app_state().await {
        Ok(state) => state,
        Err(e) => {
            error!("Startup failed: {}", e);
            return Err(e);
        },
    };

    // Hourly cleanup of expired sessions and refresh tokens. The rows
    // are already dead to every query; this bounds table growth.
    {
        let pool = state.diesel_pool.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(3600));
            loop {
                ticker.tick().await;
                match pool.get().await {
                    Ok(mut conn) => {
                        use dashtam_backend_core::models::{RefreshTokenData, Session};
                        if let Err(e) = Session::cleanup_expired_sessions(&mut conn, None).await {
                            error!("session cleanup failed: {}", e);
                        }
                        if let Err(e) = RefreshTokenData::cleanup_expired(&mut conn, None).await {
                            error!("refresh token cleanup failed: {}", e);
                        }
                    },
                    Err(e) => error!("cleanup skipped, no connection: {}", e),
                }
            }
        });
    }

    let api = Router::new()
        .merge(public_routes())
        .merge(
            protected_routes().layer(axum_middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        );

    let mut app = Router::new()
        .nest("/api/v1", api)
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    if state.config.enable_swagger_ui {
        app = app.merge(
            utoipa_swagger_ui::SwaggerUi::new("/api/docs")
                .url("/api/docs/openapi.json", ApiDoc::openapi()),
        );
        info!("Swagger UI enabled at /api/docs");
    }

    info!("Listening on {}", bind_address);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
