use std::{
    fs, io,
    path::Path,
    str::FromStr,
    time::Duration,
};

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;
use tracing::warn;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "console.toml";
pub const DEFAULT_DEVICE_URL: &str = "http://192.168.4.1";
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// How `payload`, `filename` and `result` text travels over the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadEncoding {
    #[default]
    Plain,
    Base64,
}

impl FromStr for PayloadEncoding {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(Self::Plain),
            "base64" => Ok(Self::Base64),
            other => Err(anyhow!("unknown payload encoding `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub device_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// `None` waits forever.
    pub request_timeout: Option<Duration>,
    pub payload_encoding: PayloadEncoding,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            device_url: DEFAULT_DEVICE_URL.into(),
            username: None,
            password: None,
            request_timeout: Some(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS)),
            payload_encoding: PayloadEncoding::Plain,
        }
    }
}

impl ClientSettings {
    /// Basic-auth credentials, only when both halves are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }

    pub fn device_base_url(&self) -> anyhow::Result<Url> {
        let url = Url::parse(self.device_url.trim())
            .with_context(|| format!("invalid device url `{}`", self.device_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("device url must use http or https, got `{}`", url.scheme());
        }
        if url.cannot_be_a_base() {
            bail!("device url `{}` cannot be used as a base", self.device_url);
        }
        Ok(url)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    device_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    request_timeout_seconds: Option<u64>,
    payload_encoding: Option<PayloadEncoding>,
}

/// Loads defaults, then `path` (or `console.toml` when present), then the
/// process environment.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<ClientSettings> {
    let raw = match path {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?,
        ),
        None => match fs::read_to_string(DEFAULT_CONFIG_PATH) {
            Ok(raw) => Some(raw),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {DEFAULT_CONFIG_PATH}"))
            }
        },
    };

    settings_from_sources(raw.as_deref(), |key| std::env::var(key).ok())
}

pub fn settings_from_sources(
    file_contents: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<ClientSettings> {
    let mut settings = ClientSettings::default();

    if let Some(raw) = file_contents {
        let file_cfg: FileSettings = toml::from_str(raw).context("failed to parse config file")?;
        if let Some(v) = file_cfg.device_url {
            settings.device_url = v;
        }
        if let Some(v) = file_cfg.username {
            settings.username = Some(v);
        }
        if let Some(v) = file_cfg.password {
            settings.password = Some(v);
        }
        if let Some(v) = file_cfg.request_timeout_seconds {
            settings.request_timeout = timeout_from_seconds(v);
        }
        if let Some(v) = file_cfg.payload_encoding {
            settings.payload_encoding = v;
        }
    }

    if let Some(v) = env("DEVICE_URL") {
        settings.device_url = v;
    }
    if let Some(v) = env("APP__DEVICE_URL") {
        settings.device_url = v;
    }

    if let Some(v) = env("DEVICE_USERNAME") {
        settings.username = Some(v);
    }
    if let Some(v) = env("APP__DEVICE_USERNAME") {
        settings.username = Some(v);
    }

    if let Some(v) = env("DEVICE_PASSWORD") {
        settings.password = Some(v);
    }
    if let Some(v) = env("APP__DEVICE_PASSWORD") {
        settings.password = Some(v);
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECONDS") {
        match v.trim().parse::<u64>() {
            Ok(parsed) => settings.request_timeout = timeout_from_seconds(parsed),
            Err(err) => warn!(value = %v, %err, "ignoring APP__REQUEST_TIMEOUT_SECONDS"),
        }
    }

    if let Some(v) = env("APP__PAYLOAD_ENCODING") {
        match v.parse::<PayloadEncoding>() {
            Ok(parsed) => settings.payload_encoding = parsed,
            Err(err) => warn!(value = %v, %err, "ignoring APP__PAYLOAD_ENCODING"),
        }
    }

    Ok(settings)
}

fn timeout_from_seconds(seconds: u64) -> Option<Duration> {
    (seconds > 0).then(|| Duration::from_secs(seconds))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
