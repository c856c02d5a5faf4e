//! Client core for the device payload console: transport, endpoint
//! bindings, the request lifecycle controller and the view state it drives.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

pub mod bindings;
pub mod config;
pub mod controller;
pub mod error;
pub mod presentation;
pub mod store;
pub mod transport;

pub use bindings::DeviceApi;
pub use config::{load_settings, ClientSettings, PayloadEncoding};
pub use controller::{Controller, OperationClass, Outcome};
pub use error::{DecodeError, OperationFailure, TransportError};
pub use presentation::{
    dispatch, Intent, NoPrompt, Presenter, Prompt, RenderTarget, ViewFragment,
};
pub use store::{ActivePayload, Activity, ViewState, ViewStateStore};
pub use transport::{HttpTransport, Transport};

/// Wires an HTTP transport for `settings` into a fresh controller.
pub fn connect(settings: &ClientSettings, prompt: Arc<dyn Prompt>) -> Result<Controller> {
    let transport = HttpTransport::new(settings)?;
    info!(
        device = %transport.base_url(),
        encoding = ?settings.payload_encoding,
        authenticated = settings.credentials().is_some(),
        "device transport ready"
    );
    let api = DeviceApi::new(Arc::new(transport), settings.payload_encoding);
    Ok(Controller::new(api, Arc::new(ViewStateStore::new()), prompt))
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
