use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::DecodeError;

pub const FETCH_PAYLOADS_PATH: &str = "/api/fetchPayloads";
pub const STATISTICS_PATH: &str = "/api/statistics";
pub const LOAD_PAYLOAD_PATH: &str = "/api/loadPayload";
pub const RUN_PAYLOAD_PATH: &str = "/api/runPayload";
pub const SAVE_PAYLOAD_PATH: &str = "/api/savePayload";

/// `result` value the device reports for a successful save.
pub const SAVE_SUCCESS: &str = "success";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

/// The fixed set of device endpoints the console talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    ListPayloads,
    FetchStatistics,
    LoadPayload,
    RunPayload,
    SavePayload,
}

impl Endpoint {
    pub const fn path(self) -> &'static str {
        match self {
            Self::ListPayloads => FETCH_PAYLOADS_PATH,
            Self::FetchStatistics => STATISTICS_PATH,
            Self::LoadPayload => LOAD_PAYLOAD_PATH,
            Self::RunPayload => RUN_PAYLOAD_PATH,
            Self::SavePayload => SAVE_PAYLOAD_PATH,
        }
    }

    pub const fn method(self) -> Method {
        match self {
            Self::ListPayloads | Self::FetchStatistics | Self::LoadPayload => Method::Get,
            Self::RunPayload | Self::SavePayload => Method::Post,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::ListPayloads => "list_payloads",
            Self::FetchStatistics => "fetch_statistics",
            Self::LoadPayload => "load_payload",
            Self::RunPayload => "run_payload",
            Self::SavePayload => "save_payload",
        }
    }
}

/// One request against a device endpoint. For GET the params become the
/// query string, for POST a single `application/x-www-form-urlencoded` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRequest {
    pub endpoint: Endpoint,
    pub params: Vec<(&'static str, String)>,
}

impl DeviceRequest {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.params.push((name, value.into()));
        self
    }

    pub fn method(&self) -> Method {
        self.endpoint.method()
    }

    pub fn path(&self) -> &'static str {
        self.endpoint.path()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardIdentity {
    pub name: String,
    pub chip: String,
    pub circuitpython_version: String,
    pub circuitpython_version_full: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbsoluteUtilization {
    pub total: f64,
    pub used: f64,
    pub available: f64,
    #[serde(rename = "unit_of_measurement")]
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativeUtilization {
    pub used: f64,
    pub available: f64,
    #[serde(rename = "unit_of_measurement")]
    pub unit: String,
}

/// Figures are reported independently by the device; nothing here is
/// derived from anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilizationBlock {
    pub absolute: AbsoluteUtilization,
    pub relative: RelativeUtilization,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatistics {
    pub board: BoardIdentity,
    pub storage: UtilizationBlock,
    pub memory: UtilizationBlock,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usb_connected: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadPayloadResponse {
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPayloadResponse {
    pub result: String,
    pub notification: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavePayloadResponse {
    pub result: String,
    pub notification: String,
}

impl SavePayloadResponse {
    pub fn is_success(&self) -> bool {
        self.result == SAVE_SUCCESS
    }
}

/// Parses a response body as JSON regardless of its declared content type.
pub fn decode_json<T: DeserializeOwned>(endpoint: Endpoint, body: &str) -> Result<T, DecodeError> {
    serde_json::from_str(body).map_err(|err| DecodeError::new(endpoint.name(), err.to_string()))
}
