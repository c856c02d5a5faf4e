//! View state owned by the controller and observed by the presenter.

use shared::{
    domain::{Notification, PayloadSummary},
    protocol::DeviceStatistics,
};
use tokio::sync::watch;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivePayload {
    pub filename: Option<String>,
    pub content: String,
    pub last_result: Option<String>,
}

/// Inputs an operation disables while it is pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSet {
    pub editor: bool,
    pub result: bool,
}

impl InputSet {
    pub const NONE: Self = Self {
        editor: false,
        result: false,
    };
}

/// Reference counts behind the busy indicator and the input locks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Activity {
    pub busy: u32,
    pub editor_locks: u32,
    pub result_locks: u32,
}

impl Activity {
    pub fn is_busy(&self) -> bool {
        self.busy > 0
    }

    pub fn editor_enabled(&self) -> bool {
        self.editor_locks == 0
    }

    pub fn result_enabled(&self) -> bool {
        self.result_locks == 0
    }

    pub(crate) fn enter(&mut self, inputs: InputSet) {
        self.busy += 1;
        if inputs.editor {
            self.editor_locks += 1;
        }
        if inputs.result {
            self.result_locks += 1;
        }
    }

    pub(crate) fn leave(&mut self, inputs: InputSet) {
        self.busy = release(self.busy, "busy");
        if inputs.editor {
            self.editor_locks = release(self.editor_locks, "editor");
        }
        if inputs.result {
            self.result_locks = release(self.result_locks, "result");
        }
    }
}

fn release(count: u32, counter: &'static str) -> u32 {
    if count == 0 {
        warn!(counter, "released an activity counter that was already zero");
    }
    count.saturating_sub(1)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    /// Always sorted ascending by filename.
    pub payloads: Vec<PayloadSummary>,
    pub statistics: Option<DeviceStatistics>,
    pub active: ActivePayload,
    pub notification: Notification,
    pub activity: Activity,
}

impl ViewState {
    pub(crate) fn replace_payloads(&mut self, mut payloads: Vec<PayloadSummary>) {
        payloads.sort();
        self.payloads = payloads;
    }

    pub(crate) fn apply_loaded(&mut self, filename: &str, content: String) {
        self.active = ActivePayload {
            filename: Some(filename.to_string()),
            content,
            last_result: None,
        };
        self.notification = Notification::info(format!("file: {filename}"));
    }

    pub(crate) fn adopt_filename_if_unset(&mut self, filename: &str) {
        if self.active.filename.is_none() {
            self.active.filename = Some(filename.to_string());
        }
    }

    pub(crate) fn reset_active(&mut self) {
        self.active = ActivePayload::default();
        self.notification = Notification::default();
    }
}

/// Holds the single [`ViewState`]. Every mutation publishes a complete
/// snapshot to subscribers, so observers never see a half-applied
/// transition.
pub struct ViewStateStore {
    tx: watch::Sender<ViewState>,
}

impl Default for ViewStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewStateStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ViewState::default());
        Self { tx }
    }

    pub fn get(&self) -> ViewState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.tx.subscribe()
    }

    pub(crate) fn update(&self, mutate: impl FnOnce(&mut ViewState)) {
        self.tx.send_modify(mutate);
    }
}
