use std::net::SocketAddr;
use std::sync::Arc;

use faas_executor::runtime::{ContainerRuntimePort, DockerRuntime};
use faas_executor::{InstanceManager, ReadinessProber};
use faas_gateway::{
    ActivityTracker, GatewayConfig, GatewayState, IdleReaper, PostgresMetadataStore,
};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,faas_gateway_server=debug".into()),
        )
        .init();

    let config = GatewayConfig::from_env()?;
    info!(listen_addr = %config.listen_addr, artifact_root = %config.artifact_root, "starting faas-gateway-server");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    let metadata = Arc::new(PostgresMetadataStore::new(pool));

    // A broken connection to the container daemon is fatal at startup: the
    // gateway has no useful work to do without it (§7, "fatal-to-process").
    let docker_runtime: Arc<dyn ContainerRuntimePort> = Arc::new(DockerRuntime::connect_local()?);

    let instances = Arc::new(
        InstanceManager::new(docker_runtime.clone(), config.artifact_root.clone())
            .with_url_resolution_timeout(config.url_resolution_timeout),
    );
    let readiness = Arc::new(ReadinessProber::new(
        std::time::Duration::from_secs(2),
        config.health_probe_timeout,
    ));
    let tracker = Arc::new(ActivityTracker::new());

    let reaper = Arc::new(IdleReaper::new(
        metadata.clone(),
        tracker.clone(),
        docker_runtime.clone(),
        config.idle_threshold,
        config.sweep_interval,
    ));
    let _reaper_task = reaper.spawn();

    let state = GatewayState {
        metadata,
        instances,
        readiness,
        tracker,
        client: reqwest::Client::new(),
    };

    let app = faas_gateway::router(state);
    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(%addr, "faas-gateway-server listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
