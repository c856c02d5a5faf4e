use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use shared::protocol::{DeviceRequest, Endpoint};
use tokio::sync::oneshot;

use crate::{
    bindings::DeviceApi,
    config::PayloadEncoding,
    controller::Controller,
    error::TransportError,
    presentation::{Prompt, RenderTarget, ViewFragment},
    store::ViewStateStore,
    transport::Transport,
};

pub(crate) type GateSender = oneshot::Sender<Result<String, TransportError>>;

enum Reply {
    Ready(Result<String, TransportError>),
    Gated(oneshot::Receiver<Result<String, TransportError>>),
}

/// In-memory device: replies are queued per endpoint and consumed in call
/// order. Gated replies hold the request open until the test releases them.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    replies: Mutex<HashMap<Endpoint, VecDeque<Reply>>>,
    calls: Mutex<Vec<DeviceRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn reply(&self, endpoint: Endpoint, body: impl Into<String>) {
        self.push(endpoint, Reply::Ready(Ok(body.into())));
    }

    pub(crate) fn fail(&self, endpoint: Endpoint, err: TransportError) {
        self.push(endpoint, Reply::Ready(Err(err)));
    }

    pub(crate) fn gate(&self, endpoint: Endpoint) -> GateSender {
        let (tx, rx) = oneshot::channel();
        self.push(endpoint, Reply::Gated(rx));
        tx
    }

    pub(crate) fn calls(&self) -> Vec<DeviceRequest> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }

    fn push(&self, endpoint: Endpoint, reply: Reply) {
        self.replies
            .lock()
            .expect("replies lock")
            .entry(endpoint)
            .or_default()
            .push_back(reply);
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &DeviceRequest) -> Result<String, TransportError> {
        self.calls.lock().expect("calls lock").push(request.clone());
        let reply = self
            .replies
            .lock()
            .expect("replies lock")
            .get_mut(&request.endpoint)
            .and_then(VecDeque::pop_front);
        match reply {
            Some(Reply::Ready(result)) => result,
            Some(Reply::Gated(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(TransportError::network("gate dropped"))),
            None => Err(TransportError::status(404, "Not Found")),
        }
    }
}

pub(crate) struct ScriptedPrompt {
    answer: Option<String>,
    asked: AtomicUsize,
}

impl ScriptedPrompt {
    pub(crate) fn answering(answer: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.map(str::to_string),
            asked: AtomicUsize::new(0),
        })
    }

    pub(crate) fn times_asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prompt for ScriptedPrompt {
    async fn prompt_text(&self, _message: &str) -> Option<String> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

#[derive(Default)]
pub(crate) struct RecordingTarget {
    fragments: Mutex<Vec<ViewFragment>>,
}

impl RecordingTarget {
    pub(crate) fn take(&self) -> Vec<ViewFragment> {
        std::mem::take(&mut *self.fragments.lock().expect("fragments lock"))
    }
}

impl RenderTarget for RecordingTarget {
    fn render(&self, fragment: ViewFragment) {
        self.fragments.lock().expect("fragments lock").push(fragment);
    }
}

pub(crate) fn controller_with(
    transport: Arc<ScriptedTransport>,
    prompt: Arc<dyn Prompt>,
) -> Controller {
    Controller::new(
        DeviceApi::new(transport, PayloadEncoding::Plain),
        Arc::new(ViewStateStore::new()),
        prompt,
    )
}

pub(crate) fn statistics_body() -> String {
    serde_json::json!({
        "board": {
            "name": "FeatherS2",
            "chip": "ESP32S2",
            "circuitpython_version": "8.2.0",
            "circuitpython_version_full": "8.2.0 on 2023-07-05; FeatherS2 with ESP32S2"
        },
        "storage": {
            "absolute": {"unit_of_measurement": "KB", "available": 812.5, "used": 1200, "total": 1900},
            "relative": {"unit_of_measurement": "%", "available": 42.76, "used": 63.16}
        },
        "memory": {
            "absolute": {"unit_of_measurement": "KB", "available": 1800.25, "used": 210.5, "total": 2010.75},
            "relative": {"unit_of_measurement": "%", "available": 89.53, "used": 10.47}
        },
        "usb_connected": false
    })
    .to_string()
}
