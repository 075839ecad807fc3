/// dockwatch: observes and controls the workloads of a container runtime.
///
/// The runtime is reached through its HTTP API on a Unix socket or TCP endpoint, or through its
/// command line client when the API is unavailable. Container stats are turned into CPU and
/// memory percentages, kept in a bounded history and checked against thresholds; breaches and
/// lifecycle events become notifications delivered to chat webhooks and email.
pub mod alerting;
pub mod api;
pub mod config;
pub mod container;
pub mod error;
pub mod history;
pub mod metrics;
pub mod model;
pub mod normalize;
pub mod notify;
pub mod service;
pub mod transport;

use std::sync::Arc;

use error::ResultOkLogExt;

/// Runs dockwatch.
///
/// Reads the configuration from the environment, probes the runtime transports, starts the API
/// server and then polls the stats of all running containers at the configured interval.
///
/// # Errors
///
/// Possible errors include:
/// - Invalid environment variables (e.g., a non-numeric `CPU_THRESHOLD`).
/// - Failure to bind the API address.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::from_env()?;
    log::debug!("Configuration: {config:?}");

    let service = Arc::new(service::MonitorService::from_config(&config));
    match service.connect().await {
        Some(kind) => log::info!("Connected to the container runtime via {kind}"),
        None => log::warn!("Container runtime unreachable, retrying on every poll"),
    }

    let api = api::APIServer::new(Arc::clone(&service));
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tokio::spawn(async move {
        api.serve(listener).await.ok_log();
    });

    let mut interval = tokio::time::interval(config.poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if service.transport().is_none() {
            service.connect().await;
        }

        let before = std::time::Instant::now();
        if let Some(count) = service.poll().await.ok_warn("poll failed") {
            log::trace!(
                "Polled {count} container(s) in {} ms",
                before.elapsed().as_millis()
            );
        }
    }
}
