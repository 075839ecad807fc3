/// Entry point for dockwatch.
///
/// Connects to the container runtime through its socket or its CLI, polls container stats in
/// the background and serves the HTTP API.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the API cannot bind its address.
///
/// # Examples
///
/// ```bash
/// RUST_LOG=info CHANNELS_FILE=/etc/dockwatch/channels.json cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    dockwatch::run().await
}
