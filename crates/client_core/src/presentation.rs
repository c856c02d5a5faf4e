//! Projection of [`ViewState`] onto an abstract render target, and the
//! user-intent path back into the controller.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use shared::{
    domain::{Notification, Severity},
    protocol::{DeviceStatistics, UtilizationBlock},
};
use tokio::sync::watch;
use tracing::debug;

use crate::{
    controller::{Controller, OperationClass, Outcome},
    store::{ActivePayload, Activity, ViewState},
};

/// Asks the operator for a line of text. `None` means cancelled.
#[async_trait]
pub trait Prompt: Send + Sync {
    async fn prompt_text(&self, message: &str) -> Option<String>;
}

/// Prompt for non-interactive front ends; always cancels.
pub struct NoPrompt;

#[async_trait]
impl Prompt for NoPrompt {
    async fn prompt_text(&self, _message: &str) -> Option<String> {
        None
    }
}

pub trait RenderTarget: Send + Sync {
    fn render(&self, fragment: ViewFragment);
}

/// Something the operator asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Refresh,
    Load(String),
    Run,
    Save,
    New,
    Edit(String),
    Cancel(OperationClass),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEntry {
    pub label: String,
    pub intent: Intent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsView {
    pub fields: Vec<(&'static str, String)>,
}

impl StatisticsView {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivePayloadView {
    pub filename_label: String,
    pub editor_text: String,
    pub result_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationView {
    pub message: String,
    pub severity: Severity,
    pub style_class: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityView {
    pub busy: bool,
    pub editor_enabled: bool,
    pub result_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewFragment {
    PayloadList(Vec<PayloadEntry>),
    /// `None` until the first successful statistics fetch.
    Statistics(Option<StatisticsView>),
    ActivePayload(ActivePayloadView),
    Notification(NotificationView),
    Activity(ActivityView),
}

pub fn style_class(severity: Severity) -> &'static str {
    match severity {
        Severity::None => "",
        Severity::Info => "notification background_gray",
        Severity::Success => "notification background_green",
        Severity::Error => "notification background_red",
    }
}

pub fn project(state: &ViewState) -> [ViewFragment; 5] {
    [
        ViewFragment::PayloadList(
            state
                .payloads
                .iter()
                .map(|payload| PayloadEntry {
                    label: payload.filename.clone(),
                    intent: Intent::Load(payload.filename.clone()),
                })
                .collect(),
        ),
        ViewFragment::Statistics(state.statistics.as_ref().map(project_statistics)),
        ViewFragment::ActivePayload(project_active(&state.active)),
        ViewFragment::Notification(project_notification(&state.notification)),
        ViewFragment::Activity(project_activity(state.activity)),
    ]
}

fn project_statistics(stats: &DeviceStatistics) -> StatisticsView {
    let mut fields = vec![
        ("board_name", stats.board.name.clone()),
        ("chip_name", stats.board.chip.clone()),
        ("circuitpython_version", stats.board.circuitpython_version.clone()),
        (
            "circuitpython_version_full",
            stats.board.circuitpython_version_full.clone(),
        ),
    ];
    push_utilization(&mut fields, UTILIZATION_LABELS[0], &stats.storage);
    push_utilization(&mut fields, UTILIZATION_LABELS[1], &stats.memory);
    if let Some(connected) = stats.usb_connected {
        let usb = if connected { "yes" } else { "no" };
        fields.push(("usb_connected", usb.to_string()));
    }
    StatisticsView { fields }
}

const UTILIZATION_LABELS: [[&str; 5]; 2] = [
    [
        "storage_total",
        "storage_used",
        "storage_used_percentage",
        "storage_available",
        "storage_available_percentage",
    ],
    [
        "memory_total",
        "memory_used",
        "memory_used_percentage",
        "memory_available",
        "memory_available_percentage",
    ],
];

fn push_utilization(
    fields: &mut Vec<(&'static str, String)>,
    labels: [&'static str; 5],
    block: &UtilizationBlock,
) {
    let abs = &block.absolute;
    let rel = &block.relative;
    fields.push((labels[0], format!("{} {}", abs.total, abs.unit)));
    fields.push((labels[1], format!("{} {}", abs.used, abs.unit)));
    fields.push((labels[2], format!("{}{}", rel.used, rel.unit)));
    fields.push((labels[3], format!("{} {}", abs.available, abs.unit)));
    fields.push((labels[4], format!("{}{}", rel.available, rel.unit)));
}

fn project_active(active: &ActivePayload) -> ActivePayloadView {
    ActivePayloadView {
        filename_label: active.filename.clone().unwrap_or_default(),
        editor_text: active.content.clone(),
        result_text: active.last_result.clone().unwrap_or_default(),
    }
}

fn project_notification(notification: &Notification) -> NotificationView {
    NotificationView {
        message: notification.message.clone(),
        severity: notification.severity,
        style_class: style_class(notification.severity),
    }
}

fn project_activity(activity: Activity) -> ActivityView {
    ActivityView {
        busy: activity.is_busy(),
        editor_enabled: activity.editor_enabled(),
        result_enabled: activity.result_enabled(),
    }
}

/// Pushes changed fragments to a render target.
pub struct Presenter {
    target: Arc<dyn RenderTarget>,
    last: Mutex<Option<[ViewFragment; 5]>>,
}

impl Presenter {
    pub fn new(target: Arc<dyn RenderTarget>) -> Self {
        Self {
            target,
            last: Mutex::new(None),
        }
    }

    /// Renders the fragments that differ from the previous render and
    /// returns how many were pushed.
    pub fn render(&self, state: &ViewState) -> usize {
        let fragments = project(state);
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let mut pushed = 0;
        for (index, fragment) in fragments.iter().enumerate() {
            let unchanged = last
                .as_ref()
                .is_some_and(|previous| previous[index] == *fragment);
            if !unchanged {
                self.target.render(fragment.clone());
                pushed += 1;
            }
        }
        *last = Some(fragments);
        pushed
    }

    /// Renders the current state, then every change until the store goes away.
    pub async fn follow(&self, mut rx: watch::Receiver<ViewState>) {
        loop {
            let state = rx.borrow_and_update().clone();
            self.render(&state);
            if rx.changed().await.is_err() {
                debug!("view state store dropped; presenter stopping");
                return;
            }
        }
    }
}

/// Forwards an operator intent to the controller and returns the outcome of
/// every remote operation it started. Local-only intents start none.
pub async fn dispatch(controller: &Controller, intent: Intent) -> Vec<Outcome> {
    match intent {
        Intent::Refresh => {
            let (list, stats) = controller.init().await;
            vec![list, stats]
        }
        Intent::Load(filename) => vec![controller.load_payload(&filename).await],
        Intent::Run => vec![controller.run_payload().await],
        Intent::Save => vec![controller.save_payload().await],
        Intent::New => {
            controller.new_payload();
            Vec::new()
        }
        Intent::Edit(content) => {
            controller.edit_content(content);
            Vec::new()
        }
        Intent::Cancel(class) => {
            controller.cancel(class);
            Vec::new()
        }
    }
}

#[cfg(test)]
#[path = "tests/presentation_tests.rs"]
mod tests;
