//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! Useful for development when only the REST server (with OpenAPI/Swagger UI) is wanted. The
//! workspace's main `carelink-run` binary runs both gRPC and REST concurrently.

use api_rest::{router, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// # Environment Variables
/// - `CARE_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `CARE_DATA_DIR`, `CARE_ENV`, `CARE_CHALLENGE_LOOKUP`, `CARE_TOKEN_KEY_PEM`: see
///   `api_shared::bootstrap`
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("carelink_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("CARE_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    tracing::info!("-- Starting Carelink REST API on {}", addr);

    let services = api_shared::bootstrap::services_from_env()?;
    let app = router(AppState::new(services));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
