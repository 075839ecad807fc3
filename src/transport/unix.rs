use std::path::{Path, PathBuf};
use std::{pin, task};

use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper_util::rt::TokioIo;
use tower::ServiceExt;

use super::{Error, Result};

#[derive(Debug, Clone)]
pub(super) struct UnixConnector {
    path: PathBuf,
}

impl UnixConnector {
    pub(super) fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl tower::Service<hyper::Uri> for UnixConnector {
    type Response = TokioIo<tokio::net::UnixStream>;

    type Error = std::io::Error;

    type Future = pin::Pin<
        Box<dyn Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: hyper::Uri) -> Self::Future {
        let path = self.path.clone();
        Box::pin(async move {
            let stream = tokio::net::UnixStream::connect(path).await?;

            Ok(TokioIo::new(stream))
        })
    }
}

/// A response from the daemon with its body fully read.
#[derive(Debug)]
pub(super) struct RawResponse {
    pub status: hyper::StatusCode,
    pub body: Bytes,
}

/// Sends a single bodiless request over a fresh connection to the socket.
pub(super) async fn send(
    connector: &UnixConnector,
    method: hyper::Method,
    path_and_query: &str,
) -> Result<RawResponse> {
    let endpoint = connector.path.display().to_string();
    log::trace!("{method} unix://{endpoint}{path_and_query}");
    let uri: hyper::Uri = format!("http://localhost{path_and_query}")
        .parse()
        .map_err(|_| Error::InvalidArgument(path_and_query.to_owned()))?;
    let io = connector
        .clone()
        .oneshot(uri.clone())
        .await
        .map_err(|source| Error::Connect {
            endpoint: endpoint.clone(),
            source,
        })?;

    let (mut sender, connection) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|source| Error::Http {
            endpoint: endpoint.clone(),
            source,
        })?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            log::debug!("runtime socket connection closed with error: {err}");
        }
    });

    let request = hyper::Request::builder()
        .method(method)
        .uri(uri.path_and_query().map(|p| p.as_str()).unwrap_or("/"))
        .header(hyper::header::HOST, "localhost")
        .body(Empty::<Bytes>::new())?;
    let response = sender
        .send_request(request)
        .await
        .map_err(|source| Error::Http {
            endpoint: endpoint.clone(),
            source,
        })?;
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|source| Error::Http { endpoint, source })?
        .to_bytes();

    Ok(RawResponse { status, body })
}
