use std::path::PathBuf;
use std::time::Duration;

use hyper::Method;
use hyper::body::Bytes;

use super::unix::{self, UnixConnector};
use super::{Error, Result, Transport, TransportKind, validate_reference};
use crate::metrics::RawStats;
use crate::model::{
    ComposeAction, ComposeProject, ContainerSnapshot, ImageSnapshot, LifecycleAction, PruneReport,
    RuntimeVersion,
};
use crate::normalize::{self, socket as payload};

pub const DEFAULT_SOCKET_PATH: &str = "/var/run/docker.sock";
pub const DEFAULT_API_VERSION: &str = "v1.43";

/// Where the runtime daemon listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp { host: String, port: u16, tls: bool },
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::Unix(PathBuf::from(DEFAULT_SOCKET_PATH))
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
            Endpoint::Tcp { host, port, tls } => {
                let scheme = if *tls { "https" } else { "http" };
                write!(f, "{scheme}://{host}:{port}")
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Connection {
    Unix(UnixConnector),
    Tcp { base_url: String, client: reqwest::Client },
}

/// Talks to the daemon's versioned HTTP API.
///
/// Unix sockets are driven with a plain HTTP/1 connection per request; TCP endpoints go
/// through a pooled [`reqwest::Client`], which also covers TLS.
#[derive(Debug, Clone)]
pub struct SocketTransport {
    endpoint: Endpoint,
    connection: Connection,
    api_version: String,
    timeout: Duration,
}

impl SocketTransport {
    pub fn new(endpoint: Endpoint, api_version: impl Into<String>, timeout: Duration) -> Self {
        let connection = match &endpoint {
            Endpoint::Unix(path) => Connection::Unix(UnixConnector::new(path)),
            Endpoint::Tcp { .. } => Connection::Tcp {
                base_url: endpoint.to_string(),
                client: reqwest::Client::new(),
            },
        };
        let api_version = api_version.into();
        let api_version = api_version.trim_matches('/').to_owned();

        Self {
            endpoint,
            connection,
            api_version,
            timeout,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Issues a request and returns the body of a successful response.
    ///
    /// `304 Not Modified`, which the daemon answers for starting a running container or
    /// stopping a stopped one, counts as success.
    async fn request(&self, method: Method, path_and_query: &str) -> Result<Bytes> {
        let path = format!("/{}{}", self.api_version, path_and_query);
        let operation = format!("{method} {path}");
        let exchange = async {
            match &self.connection {
                Connection::Unix(connector) => {
                    let response = unix::send(connector, method, &path).await?;
                    Ok::<_, Error>((response.status.as_u16(), response.body))
                }
                Connection::Tcp { base_url, client } => {
                    let url = format!("{base_url}{path}");
                    let client_err = |source| Error::Client {
                        endpoint: base_url.clone(),
                        source,
                    };
                    let response = client
                        .request(method, &url)
                        .send()
                        .await
                        .map_err(client_err)?;
                    let status = response.status().as_u16();
                    let body = response.bytes().await.map_err(client_err)?;
                    Ok((status, body))
                }
            }
        };

        let (status, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| Error::Timeout {
                operation,
                after: self.timeout,
            })??;

        if (200..300).contains(&status) || status == 304 {
            return Ok(body);
        }
        Err(Error::Status {
            status,
            message: error_message(&body),
        })
    }
}

/// Extracts the `message` field of an API error body, falling back to the raw text.
fn error_message(body: &[u8]) -> String {
    #[derive(serde::Deserialize)]
    struct ApiError {
        message: String,
    }

    match serde_json::from_slice::<ApiError>(body) {
        Ok(err) => err.message,
        Err(_) => String::from_utf8_lossy(body).trim().to_owned(),
    }
}

impl Transport for SocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Socket
    }

    async fn ping(&self) -> Result<()> {
        self.request(Method::GET, "/info").await?;
        Ok(())
    }

    async fn version(&self) -> Result<RuntimeVersion> {
        let body = self.request(Method::GET, "/version").await?;
        Ok(payload::version(&body)?)
    }

    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSnapshot>> {
        let body = self
            .request(Method::GET, &format!("/containers/json?all={all}"))
            .await?;
        Ok(payload::containers(&body)?)
    }

    async fn stats(&self, container: &str) -> Result<RawStats> {
        let container = validate_reference(container)?;
        let body = self
            .request(
                Method::GET,
                &format!("/containers/{container}/stats?stream=false"),
            )
            .await?;
        Ok(RawStats::Counters(payload::stats(&body)?))
    }

    async fn logs(&self, container: &str, tail: usize, timestamps: bool) -> Result<String> {
        let container = validate_reference(container)?;
        let body = self
            .request(
                Method::GET,
                &format!(
                    "/containers/{container}/logs?stdout=true&stderr=true&tail={tail}&timestamps={timestamps}"
                ),
            )
            .await?;
        Ok(normalize::strip_log_framing(&body))
    }

    async fn lifecycle(
        &self,
        container: &str,
        action: LifecycleAction,
        timeout: Option<u32>,
    ) -> Result<()> {
        let container = validate_reference(container)?;
        let mut path = format!("/containers/{container}/{action}");
        if let (Some(t), LifecycleAction::Stop | LifecycleAction::Restart) = (timeout, action) {
            path.push_str(&format!("?t={t}"));
        }
        self.request(Method::POST, &path).await?;
        Ok(())
    }

    async fn list_images(&self, all: bool) -> Result<Vec<ImageSnapshot>> {
        let body = self
            .request(Method::GET, &format!("/images/json?all={all}"))
            .await?;
        Ok(payload::images(&body)?)
    }

    async fn remove_image(&self, image: &str, force: bool) -> Result<()> {
        let image = validate_reference(image)?;
        self.request(Method::DELETE, &format!("/images/{image}?force={force}"))
            .await?;
        Ok(())
    }

    async fn prune_images(&self) -> Result<PruneReport> {
        let body = self.request(Method::POST, "/images/prune").await?;
        Ok(payload::prune_report(&body)?)
    }

    async fn list_compose_projects(&self) -> Result<Vec<ComposeProject>> {
        let containers = self.list_containers(true).await?;
        Ok(payload::compose_projects(&containers))
    }

    async fn compose_action(&self, _project: &str, _action: ComposeAction) -> Result<()> {
        Err(Error::Unsupported {
            transport: TransportKind::Socket,
            operation: "compose action",
        })
    }
}
