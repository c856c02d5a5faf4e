//! Single HTTP exchange with the device. No business logic lives here.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use shared::protocol::{DeviceRequest, Method};
use tracing::{debug, warn};
use url::Url;

use crate::{config::ClientSettings, error::TransportError};

#[async_trait]
pub trait Transport: Send + Sync {
    /// Resolves with the raw body of a `200 OK` response.
    async fn send(&self, request: &DeviceRequest) -> Result<String, TransportError>;
}

pub struct HttpTransport {
    http: Client,
    base_url: Url,
    credentials: Option<(String, String)>,
}

impl HttpTransport {
    pub fn new(settings: &ClientSettings) -> anyhow::Result<Self> {
        let base_url = settings.device_base_url()?;
        let mut builder = Client::builder();
        if let Some(timeout) = settings.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self {
            http,
            base_url,
            credentials: settings
                .credentials()
                .map(|(user, pass)| (user.to_string(), pass.to_string())),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint_url(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path)
            .map_err(|err| TransportError::network(format!("invalid endpoint path {path}: {err}")))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &DeviceRequest) -> Result<String, TransportError> {
        let url = self.endpoint_url(request.path())?;
        let mut builder = match request.method() {
            Method::Get => self.http.get(url).query(&request.params),
            Method::Post => self.http.post(url).form(&request.params),
        };
        if let Some((user, pass)) = &self.credentials {
            builder = builder.basic_auth(user, Some(pass));
        }

        debug!(endpoint = request.endpoint.name(), "sending device request");
        let res = builder.send().await.map_err(map_reqwest_error)?;

        let status = res.status();
        if status != StatusCode::OK {
            warn!(
                endpoint = request.endpoint.name(),
                status = status.as_u16(),
                "device rejected request"
            );
            return Err(TransportError::status(
                status.as_u16(),
                status.canonical_reason().unwrap_or("unexpected status"),
            ));
        }

        let body = res.bytes().await.map_err(|err| {
            if err.is_timeout() {
                TransportError::timed_out()
            } else {
                TransportError::network(format!("failed to read response body: {err}"))
            }
        })?;
        String::from_utf8(body.to_vec()).map_err(|err| {
            TransportError::network(format!("response body is not valid utf-8: {err}"))
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::timed_out()
    } else if err.is_connect() {
        TransportError::network(format!("failed to connect to device: {err}"))
    } else {
        TransportError::network(err.to_string())
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
