//! Typed wrappers over the five device endpoints.
//!
//! Bindings pair a request shape with a response shape and never decide UI
//! effects: transport and decode failures both come back as
//! [`OperationFailure`] for the controller to report.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use shared::{
    domain::PayloadSummary,
    protocol::{
        decode_json, DeviceRequest, DeviceStatistics, Endpoint, LoadPayloadResponse,
        RunPayloadResponse, SavePayloadResponse,
    },
};

use crate::{
    config::PayloadEncoding,
    error::{DecodeError, OperationFailure},
    transport::Transport,
};

#[derive(Clone)]
pub struct DeviceApi {
    transport: Arc<dyn Transport>,
    encoding: PayloadEncoding,
}

impl DeviceApi {
    pub fn new(transport: Arc<dyn Transport>, encoding: PayloadEncoding) -> Self {
        Self {
            transport,
            encoding,
        }
    }

    pub fn encoding(&self) -> PayloadEncoding {
        self.encoding
    }

    /// Filenames in the order the device reported them.
    pub async fn list_payloads(&self) -> Result<Vec<PayloadSummary>, OperationFailure> {
        let names: Vec<String> = self.call(DeviceRequest::new(Endpoint::ListPayloads)).await?;
        Ok(names.into_iter().map(PayloadSummary::new).collect())
    }

    pub async fn fetch_statistics(&self) -> Result<DeviceStatistics, OperationFailure> {
        self.call(DeviceRequest::new(Endpoint::FetchStatistics)).await
    }

    pub async fn load_payload(&self, file: &str) -> Result<LoadPayloadResponse, OperationFailure> {
        let request = DeviceRequest::new(Endpoint::LoadPayload).with_param("file", file);
        let response: LoadPayloadResponse = self.call(request).await?;
        Ok(LoadPayloadResponse {
            payload: decode_text(self.encoding, Endpoint::LoadPayload, &response.payload)?,
        })
    }

    pub async fn run_payload(&self, payload: &str) -> Result<RunPayloadResponse, OperationFailure> {
        let request = DeviceRequest::new(Endpoint::RunPayload)
            .with_param("payload", encode_text(self.encoding, payload));
        let response: RunPayloadResponse = self.call(request).await?;
        Ok(RunPayloadResponse {
            result: decode_text(self.encoding, Endpoint::RunPayload, &response.result)?,
            notification: response.notification,
        })
    }

    pub async fn save_payload(
        &self,
        filename: &str,
        payload: &str,
    ) -> Result<SavePayloadResponse, OperationFailure> {
        let request = DeviceRequest::new(Endpoint::SavePayload)
            .with_param("filename", encode_text(self.encoding, filename))
            .with_param("payload", encode_text(self.encoding, payload));
        self.call(request).await
    }

    async fn call<T: DeserializeOwned>(&self, request: DeviceRequest) -> Result<T, OperationFailure> {
        let body = self.transport.send(&request).await?;
        Ok(decode_json(request.endpoint, &body)?)
    }
}

fn encode_text(encoding: PayloadEncoding, text: &str) -> String {
    match encoding {
        PayloadEncoding::Plain => text.to_string(),
        PayloadEncoding::Base64 => STANDARD.encode(text.as_bytes()),
    }
}

// The device appends a newline to every base64 field it emits.
fn decode_text(
    encoding: PayloadEncoding,
    endpoint: Endpoint,
    text: &str,
) -> Result<String, DecodeError> {
    match encoding {
        PayloadEncoding::Plain => Ok(text.to_string()),
        PayloadEncoding::Base64 => {
            let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            let bytes = STANDARD
                .decode(compact.as_bytes())
                .map_err(|err| DecodeError::new(endpoint.name(), format!("invalid base64: {err}")))?;
            String::from_utf8(bytes)
                .map_err(|err| DecodeError::new(endpoint.name(), format!("invalid utf-8: {err}")))
        }
    }
}

#[cfg(test)]
#[path = "tests/bindings_tests.rs"]
mod tests;
