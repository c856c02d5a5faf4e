//! Request lifecycle: every device call goes Idle -> Pending -> Applied or
//! Failed -> Idle, one request slot per operation class.
//!
//! A second invocation of a class that is still pending replaces the first:
//! the older request is aborted and its generation invalidated, so its
//! completion can never reach the view state.

use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use futures::future::{AbortHandle, Abortable};
use shared::domain::{Notification, Severity};
use tracing::{debug, info, warn};

use crate::{
    bindings::DeviceApi,
    error::OperationFailure,
    presentation::Prompt,
    store::{InputSet, ViewState, ViewStateStore},
};

pub const FILENAME_PROMPT: &str = "Enter filename: ";

/// Classes whose completion writes into the active payload.
const ACTIVE_PAYLOAD_WRITERS: [OperationClass; 3] =
    [OperationClass::Load, OperationClass::Run, OperationClass::Save];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    List,
    Stats,
    Load,
    Run,
    Save,
}

impl OperationClass {
    pub const ALL: [Self; 5] = [Self::List, Self::Stats, Self::Load, Self::Run, Self::Save];

    pub const fn name(self) -> &'static str {
        match self {
            Self::List => "list_payloads",
            Self::Stats => "fetch_statistics",
            Self::Load => "load_payload",
            Self::Run => "run_payload",
            Self::Save => "save_payload",
        }
    }

    pub const fn inputs(self) -> InputSet {
        match self {
            Self::Run => InputSet {
                editor: true,
                result: true,
            },
            Self::Save => InputSet {
                editor: true,
                result: false,
            },
            Self::List | Self::Stats | Self::Load => InputSet::NONE,
        }
    }

    fn failure_label(self) -> &'static str {
        match self {
            Self::List => "Listing payloads failed",
            Self::Stats => "Fetching statistics failed",
            Self::Load => "Loading payload failed",
            Self::Run => "Running payload failed",
            Self::Save => "Saving payload failed",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::List => 0,
            Self::Stats => 1,
            Self::Load => 2,
            Self::Run => 3,
            Self::Save => 4,
        }
    }
}

/// How one invocation settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Failed(OperationFailure),
    /// A newer invocation of the same class (or a cancel) took the slot;
    /// nothing was written.
    Superseded,
    /// Save without a filename and the prompt was cancelled or empty.
    Aborted,
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

#[derive(Default)]
struct RequestSlot {
    generation: u64,
    pending: Option<AbortHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket {
    class: OperationClass,
    generation: u64,
}

pub struct Controller {
    api: DeviceApi,
    store: Arc<ViewStateStore>,
    prompt: Arc<dyn Prompt>,
    slots: Mutex<[RequestSlot; 5]>,
}

impl Controller {
    pub fn new(api: DeviceApi, store: Arc<ViewStateStore>, prompt: Arc<dyn Prompt>) -> Self {
        Self {
            api,
            store,
            prompt,
            slots: Mutex::new(Default::default()),
        }
    }

    pub fn store(&self) -> &Arc<ViewStateStore> {
        &self.store
    }

    pub fn state(&self) -> ViewState {
        self.store.get()
    }

    pub fn is_pending(&self, class: OperationClass) -> bool {
        self.slots()[class.index()].pending.is_some()
    }

    /// Page-load refresh: payload list and statistics, concurrently.
    pub async fn init(&self) -> (Outcome, Outcome) {
        futures::join!(self.list_payloads(), self.fetch_statistics())
    }

    pub async fn list_payloads(&self) -> Outcome {
        self.perform(
            OperationClass::List,
            |_| {},
            self.api.list_payloads(),
            |state, payloads| state.replace_payloads(payloads),
        )
        .await
    }

    pub async fn fetch_statistics(&self) -> Outcome {
        self.perform(
            OperationClass::Stats,
            |_| {},
            self.api.fetch_statistics(),
            |state, stats| state.statistics = Some(stats),
        )
        .await
    }

    pub async fn load_payload(&self, file: &str) -> Outcome {
        self.perform(
            OperationClass::Load,
            |_| {},
            self.api.load_payload(file),
            |state, response| state.apply_loaded(file, response.payload),
        )
        .await
    }

    /// Runs the current editor content on the device.
    pub async fn run_payload(&self) -> Outcome {
        let content = self.store.get().active.content;
        self.perform(
            OperationClass::Run,
            |state| state.active.last_result = None,
            self.api.run_payload(&content),
            |state, response| {
                state.active.last_result = Some(response.result);
                state.notification = Notification::success(response.notification);
            },
        )
        .await
    }

    /// Saves the current editor content, asking for a filename first when
    /// the active payload has none.
    pub async fn save_payload(&self) -> Outcome {
        let filename = match self.store.get().active.filename {
            Some(filename) => filename,
            None => match self.prompt.prompt_text(FILENAME_PROMPT).await {
                Some(name) if !name.trim().is_empty() => name.trim().to_string(),
                _ => {
                    info!(operation = OperationClass::Save.name(), "save aborted at filename prompt");
                    return Outcome::Aborted;
                }
            },
        };
        let content = self.store.get().active.content;

        self.perform(
            OperationClass::Save,
            |state| state.notification = Notification::default(),
            self.api.save_payload(&filename, &content),
            |state, response| {
                let severity = if response.is_success() {
                    Severity::Success
                } else {
                    Severity::Error
                };
                state.notification = Notification::new(severity, response.notification);
                state.adopt_filename_if_unset(&filename);
            },
        )
        .await
    }

    /// Clears the active payload and notification. Pending load, run and
    /// save requests are cancelled first so none of them can write into the
    /// fresh payload when they complete.
    pub fn new_payload(&self) {
        for class in ACTIVE_PAYLOAD_WRITERS {
            self.cancel(class);
        }
        self.store.update(ViewState::reset_active);
    }

    /// Replaces the editor content. Ignored while the editor is locked.
    pub fn edit_content(&self, content: impl Into<String>) -> bool {
        let content = content.into();
        let mut accepted = false;
        self.store.update(|state| {
            if state.activity.editor_enabled() {
                state.active.content = content;
                accepted = true;
            }
        });
        if !accepted {
            debug!("edit ignored while the editor is locked");
        }
        accepted
    }

    /// Abandons the pending request of `class`, if any. Returns whether
    /// something was cancelled.
    pub fn cancel(&self, class: OperationClass) -> bool {
        let mut slots = self.slots();
        let slot = &mut slots[class.index()];
        let Some(handle) = slot.pending.take() else {
            return false;
        };
        handle.abort();
        slot.generation += 1;
        self.store
            .update(|state| state.activity.leave(class.inputs()));
        info!(operation = class.name(), generation = slot.generation, "request cancelled");
        true
    }

    async fn perform<T, Fut>(
        &self,
        class: OperationClass,
        prepare: impl FnOnce(&mut ViewState),
        request: Fut,
        apply: impl FnOnce(&mut ViewState, T),
    ) -> Outcome
    where
        Fut: Future<Output = Result<T, OperationFailure>>,
    {
        let (abort_handle, registration) = AbortHandle::new_pair();
        let ticket = self.begin(class, abort_handle, prepare);
        let mut guard = PendingGuard {
            controller: self,
            ticket,
            armed: true,
        };

        let result = match Abortable::new(request, registration).await {
            Ok(result) => result,
            Err(_aborted) => {
                guard.armed = false;
                debug!(operation = class.name(), generation = ticket.generation, "request aborted");
                return Outcome::Superseded;
            }
        };

        guard.armed = false;
        self.settle(ticket, result, apply)
    }

    fn begin(
        &self,
        class: OperationClass,
        abort_handle: AbortHandle,
        prepare: impl FnOnce(&mut ViewState),
    ) -> Ticket {
        let mut slots = self.slots();
        let slot = &mut slots[class.index()];
        slot.generation += 1;
        let replaced = slot.pending.replace(abort_handle);
        let ticket = Ticket {
            class,
            generation: slot.generation,
        };

        match replaced {
            Some(previous) => {
                previous.abort();
                self.store.update(prepare);
                info!(operation = class.name(), generation = ticket.generation, "request replaced pending one");
            }
            None => {
                self.store.update(|state| {
                    state.activity.enter(class.inputs());
                    prepare(state);
                });
                info!(operation = class.name(), generation = ticket.generation, "request started");
            }
        }
        ticket
    }

    fn settle<T>(
        &self,
        ticket: Ticket,
        result: Result<T, OperationFailure>,
        apply: impl FnOnce(&mut ViewState, T),
    ) -> Outcome {
        let mut slots = self.slots();
        let slot = &mut slots[ticket.class.index()];
        if slot.generation != ticket.generation || slot.pending.is_none() {
            debug!(
                operation = ticket.class.name(),
                generation = ticket.generation,
                current = slot.generation,
                "discarding stale completion"
            );
            return Outcome::Superseded;
        }
        slot.pending = None;

        let class = ticket.class;
        let outcome = match result {
            Ok(value) => {
                self.store.update(|state| {
                    apply(state, value);
                    state.activity.leave(class.inputs());
                });
                Outcome::Applied
            }
            Err(failure) => {
                warn!(operation = class.name(), status = ?failure.status(), %failure, "request failed");
                let notification =
                    Notification::error(format!("{}: {failure}", class.failure_label()));
                self.store.update(|state| {
                    state.notification = notification;
                    state.activity.leave(class.inputs());
                });
                Outcome::Failed(failure)
            }
        };
        debug!(operation = class.name(), generation = ticket.generation, ?outcome, "request settled");
        outcome
    }

    // Caller dropped the future mid-flight: release the slot as if cancelled.
    fn abandon(&self, ticket: Ticket) {
        let mut slots = self.slots();
        let slot = &mut slots[ticket.class.index()];
        if slot.generation != ticket.generation || slot.pending.is_none() {
            return;
        }
        slot.pending = None;
        slot.generation += 1;
        self.store
            .update(|state| state.activity.leave(ticket.class.inputs()));
        debug!(operation = ticket.class.name(), generation = ticket.generation, "request abandoned");
    }

    fn slots(&self) -> MutexGuard<'_, [RequestSlot; 5]> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct PendingGuard<'a> {
    controller: &'a Controller,
    ticket: Ticket,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.controller.abandon(self.ticket);
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
