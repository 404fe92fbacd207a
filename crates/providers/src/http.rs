//! HTTP plumbing shared by the provider adapters.

use std::time::Duration;

use reqwest::{header, Client, RequestBuilder};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::debug;

use crate::{ConnectTimings, FunctionEndpoint, InvokeResponse, TransportError};

/// Build the `reqwest` client every adapter shares.
pub fn build_client(timeout: Duration) -> Result<Client, TransportError> {
    let mut default_headers = header::HeaderMap::new();
    default_headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );

    Client::builder()
        .default_headers(default_headers)
        .timeout(timeout)
        .build()
        .map_err(|e| TransportError::Client(e.to_string()))
}

/// Upper bound for the timed connect; a slower connect is reported at this value.
const CONNECT_TIMING_LIMIT: Duration = Duration::from_secs(5);

/// Time the name lookup and the TCP connect for the endpoint's host.
///
/// The measuring connection is dropped at once; `reqwest` opens its own. Neither figure includes
/// the time the function takes to answer.
async fn connect_timings(endpoint: &FunctionEndpoint) -> ConnectTimings {
    let started = Instant::now();
    let target = (endpoint.hostname.as_str(), endpoint.effective_port());
    let resolved = tokio::net::lookup_host(target)
        .await
        .ok()
        .and_then(|mut addrs| addrs.next());
    let dns = started.elapsed();

    let Some(addr) = resolved else {
        return ConnectTimings {
            dns,
            ..Default::default()
        };
    };

    let started = Instant::now();
    let connect = tokio::time::timeout(CONNECT_TIMING_LIMIT, TcpStream::connect(addr));
    let tcp = match connect.await {
        Ok(Ok(_stream)) => started.elapsed(),
        Ok(Err(e)) => {
            debug!(%endpoint, "timed connect failed: {e}");
            started.elapsed()
        }
        Err(_) => CONNECT_TIMING_LIMIT,
    };

    ConnectTimings {
        dns,
        tcp,
        tls: Duration::ZERO,
    }
}

/// Send a prepared request and record connection timings.
///
/// `reqwest` does not expose per-phase timings, so DNS and TCP connect are
/// measured by [`connect_timings`] before the request goes out. The TLS
/// handshake is not observable and is reported as zero.
pub async fn send_timed(
    endpoint: &FunctionEndpoint,
    request: RequestBuilder,
) -> Result<InvokeResponse, TransportError> {
    let timings = connect_timings(endpoint).await;

    let response = request.send().await.map_err(|e| TransportError::Request {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        });
    }

    let bytes = response.bytes().await.map_err(|e| TransportError::Request {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })?;
    let body = if bytes.is_empty() {
        None
    } else {
        serde_json::from_slice(&bytes).ok()
    };

    debug!(%endpoint, status = status.as_u16(), ?timings, "function invoked");

    Ok(InvokeResponse {
        status: status.as_u16(),
        body,
        timings,
    })
}
