//! Blocking transport backed by [`ureq`].
//!
//! Status handling lives here rather than in the parsers: any response
//! outside 2xx comes back as [`TransportError::Status`] with the raw body.

use std::time::Duration;

use ureq::http;

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse, Transport};

/// A [`Transport`] implementation backed by a [`ureq::Agent`].
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Option<Duration>) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(timeout)
            // Statuses are mapped below so the body is kept.
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.timeout)
    }

    pub fn from_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = http::Request::builder()
            .method(request.method.as_str())
            .uri(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let result = match request.body {
            Some(body) => {
                let req = builder
                    .body(body.into_bytes())
                    .map_err(|e| TransportError::Other(Box::new(e)))?;
                self.agent.run(req)
            }
            None => {
                let req = builder
                    .body(())
                    .map_err(|e| TransportError::Other(Box::new(e)))?;
                self.agent.run(req)
            }
        };

        match result {
            Ok(response) => convert_response(response),
            Err(ureq::Error::Timeout(_)) => Err(TransportError::Timeout),
            Err(ureq::Error::HostNotFound) => Err(TransportError::Connection("host not found".to_owned())),
            Err(ureq::Error::Io(e)) => Err(TransportError::Connection(e.to_string())),
            Err(e) => Err(TransportError::Other(Box::new(e))),
        }
    }
}

fn convert_response(response: http::Response<ureq::Body>) -> Result<HttpResponse, TransportError> {
    let (parts, mut body) = response.into_parts();
    let status = parts.status.as_u16();
    let body = body
        .read_to_string()
        .map_err(|e| TransportError::Connection(e.to_string()))?;

    if !parts.status.is_success() {
        tracing::debug!(status, "server returned non-success status");
        return Err(TransportError::Status { status, body });
    }

    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_owned(), value.to_str().ok()?.to_owned())))
        .collect();

    Ok(HttpResponse { status, headers, body })
}
