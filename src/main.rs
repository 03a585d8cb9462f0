use std::net::SocketAddr;
use tonic::transport::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_grpc::{auth_interceptor, pb::care_server::CareServer, CareService};
use api_rest::{router, AppState};
use api_shared::FILE_DESCRIPTOR_SET;

/// Main entry point for Carelink
///
/// Starts both servers over one shared set of core services:
/// - gRPC on port 50051 (configurable via `CARE_ADDR`), guarded by the `x-api-key` header
/// - REST on port 3000 (configurable via `CARE_REST_ADDR`), bearer-token authenticated
///
/// # Environment Variables
/// - `CARE_DATA_DIR`: record store directory (default: "care_data")
/// - `CARE_ENV`: `development` or `production`
/// - `CARE_CHALLENGE_LOOKUP`: `exact-code` or `latest-for-identifier`
/// - `CARE_TOKEN_KEY_PEM`: PKCS#8 P-256 signing key
/// - `API_KEY`: API key for gRPC authentication
/// - `CARE_ENABLE_REFLECTION`: `true` to serve gRPC reflection
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("carelink=info".parse()?)
                .add_directive("carelink_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let grpc_addr: SocketAddr = std::env::var("CARE_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:50051".into())
        .parse()?;
    let rest_addr = std::env::var("CARE_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!("++ Starting Carelink gRPC on {}", grpc_addr);
    tracing::info!("++ Starting Carelink REST on {}", rest_addr);

    let services = api_shared::bootstrap::services_from_env()?;

    let rest_app = router(AppState::new(services.clone()));
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    let rest_server = tokio::spawn(async move { axum::serve(listener, rest_app).await });

    let mut grpc_builder = Server::builder().add_service(CareServer::with_interceptor(
        CareService::new(services),
        auth_interceptor,
    ));
    if std::env::var("CARE_ENABLE_REFLECTION").unwrap_or_else(|_| "false".to_string()) == "true" {
        let reflection_service = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
            .build_v1()?;
        grpc_builder = grpc_builder.add_service(reflection_service);
        tracing::info!("gRPC server reflection enabled");
    }
    let grpc_server = grpc_builder.serve(grpc_addr);

    // Run both
    let (rest_result, grpc_result) = tokio::join!(rest_server, grpc_server);
    rest_result??;
    grpc_result?;

    Ok(())
}
