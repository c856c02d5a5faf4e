//! Plain-text render target for a terminal.

use std::io::{self, Write};

use client_core::{
    presentation::{ActivePayloadView, ActivityView, NotificationView, PayloadEntry, StatisticsView},
    RenderTarget, ViewFragment,
};
use shared::domain::Severity;

pub struct TerminalTarget;

impl RenderTarget for TerminalTarget {
    fn render(&self, fragment: ViewFragment) {
        let text = match fragment {
            ViewFragment::PayloadList(entries) => payload_list(&entries),
            ViewFragment::Statistics(Some(stats)) => statistics(&stats),
            ViewFragment::Statistics(None) => return,
            ViewFragment::ActivePayload(view) => active_payload(&view),
            ViewFragment::Notification(view) => match notification(&view) {
                Some(text) => text,
                None => return,
            },
            ViewFragment::Activity(view) => activity(view),
        };
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }
}

pub fn severity_tag(severity: Severity) -> &'static str {
    match severity {
        Severity::None => "",
        Severity::Info => "[info]",
        Severity::Success => "[ok]",
        Severity::Error => "[error]",
    }
}

fn payload_list(entries: &[PayloadEntry]) -> String {
    if entries.is_empty() {
        return "payloads: (none)".to_string();
    }
    let mut text = String::from("payloads:");
    for entry in entries {
        text.push_str("\n  ");
        text.push_str(&entry.label);
    }
    text
}

fn statistics(stats: &StatisticsView) -> String {
    let width = stats
        .fields
        .iter()
        .map(|(label, _)| label.len())
        .max()
        .unwrap_or(0);
    let mut text = String::from("device:");
    for (label, value) in &stats.fields {
        text.push_str(&format!("\n  {label:<width$}  {value}"));
    }
    text
}

fn active_payload(view: &ActivePayloadView) -> String {
    let name = if view.filename_label.is_empty() {
        "(unsaved)"
    } else {
        view.filename_label.as_str()
    };
    let mut text = format!("--- {name} ---\n{}", view.editor_text);
    if !view.result_text.is_empty() {
        text.push_str("\n--- result ---\n");
        text.push_str(&view.result_text);
    }
    text
}

fn notification(view: &NotificationView) -> Option<String> {
    if view.severity == Severity::None && view.message.is_empty() {
        return None;
    }
    Some(format!("{} {}", severity_tag(view.severity), view.message))
}

fn activity(view: ActivityView) -> String {
    match (view.busy, view.editor_enabled) {
        (false, _) => "(idle)".to_string(),
        (true, true) => "(working...)".to_string(),
        (true, false) => "(working... editor locked)".to_string(),
    }
}
