use crate::api::{StartWorkflowRequest, StatusSnapshot, WorkflowClient};
use crate::config::{ConfigError, Settings};
use crate::history::{HistoryStore, SavedConversation};
use crate::poller::{start_polling, PollEvent, PollingHandle};
use crate::session::{ConversationSession, SnapshotOutcome};
use crate::shared::ids::RepositoryRef;
use crate::shared::logging::append_controller_log_line;
use crate::triage::split_requirement_and_logs;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("message must not be empty")]
    EmptyMessage,
    #[error("invalid repository reference: {0}")]
    InvalidRepositoryRef(String),
    #[error("a run is in progress; input is not being accepted right now")]
    InputNotAccepted,
}

/// Drives one live conversation against the remote workflow: owns the
/// session, the polling handle, and the best-effort history store.
///
/// All state mutation happens inside [`send_message`], [`pump_events`] and
/// [`start_new_conversation`]; the polling thread only fetches and forwards
/// events over the channel drained by `pump_events`.
pub struct Controller {
    client: WorkflowClient,
    poll_interval: Duration,
    state_root: PathBuf,
    history: Option<HistoryStore>,
    session: ConversationSession,
    last_conversation_id: Option<String>,
    poller: Option<PollingHandle>,
    events_tx: Sender<PollEvent>,
    events_rx: Receiver<PollEvent>,
}

impl Controller {
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        let state_root = settings.resolve_state_root()?;
        let db_path = settings.history_db_path()?;
        let (events_tx, events_rx) = mpsc::channel();

        let mut controller = Self {
            client: WorkflowClient::new(&settings.api_base_url),
            poll_interval: Duration::from_millis(settings.polling_interval_ms),
            state_root,
            history: None,
            session: ConversationSession::new(&settings.repository_ref),
            last_conversation_id: None,
            poller: None,
            events_tx,
            events_rx,
        };

        // History is best-effort: a store that cannot open degrades to a
        // logged warning, never to a controller that refuses to start.
        match HistoryStore::open(&db_path).and_then(|store| {
            store.ensure_schema()?;
            Ok(store)
        }) {
            Ok(store) => controller.history = Some(store),
            Err(err) => controller.log(&format!("history store unavailable: {err}")),
        }

        Ok(controller)
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn history(&self) -> Option<&HistoryStore> {
        self.history.as_ref()
    }

    pub fn is_polling(&self) -> bool {
        self.poller
            .as_ref()
            .is_some_and(|handle| !handle.is_cancelled())
    }

    /// Dispatches one operator message: the first message of a conversation
    /// runs the request/log splitter and starts a new workflow; a message
    /// while a run waits for input is routed as a response on the same
    /// conversation id.
    ///
    /// Validation failures are returned to the caller untouched; transport
    /// failures become a FAILED timeline entry and `Ok(())`.
    pub fn send_message(&mut self, text: &str) -> Result<(), DispatchError> {
        if text.trim().is_empty() {
            return Err(DispatchError::EmptyMessage);
        }
        if !self.session.accepting_input {
            return Err(DispatchError::InputNotAccepted);
        }

        match self.session.conversation_id.clone() {
            Some(conversation_id) => {
                // Mid-run response: no requirement/log splitting applies.
                self.session.push_operator_message(text);
                match self.client.respond(&conversation_id, text) {
                    Ok(snapshot) => self.accept_snapshot(snapshot),
                    Err(err) => self.handle_transport_error(&err.to_string()),
                }
            }
            None => {
                let repository_ref = RepositoryRef::parse(&self.session.repository_ref)
                    .map_err(DispatchError::InvalidRepositoryRef)?;
                let split = split_requirement_and_logs(text);
                self.session.push_operator_message(text);
                let request = StartWorkflowRequest {
                    requirement: split.requirement,
                    repository_ref: repository_ref.as_str().to_string(),
                    logs_pasted: split.logs,
                };
                match self.client.start(&request) {
                    Ok(snapshot) => {
                        self.session.conversation_id = Some(snapshot.conversation_id.clone());
                        self.last_conversation_id = Some(snapshot.conversation_id.clone());
                        self.accept_snapshot(snapshot);
                    }
                    Err(err) => self.handle_transport_error(&err.to_string()),
                }
            }
        }
        Ok(())
    }

    /// Drains pending poll events without blocking and applies them to the
    /// session. Returns the number of events handled.
    pub fn pump_events(&mut self) -> usize {
        let mut handled = 0usize;
        loop {
            match self.events_rx.try_recv() {
                Ok(PollEvent::Snapshot(snapshot)) => {
                    self.accept_snapshot(snapshot);
                    handled += 1;
                }
                Ok(PollEvent::TransportError {
                    conversation_id,
                    message,
                }) => {
                    if self.session.is_run_active
                        && self.session.conversation_id.as_deref() == Some(&conversation_id)
                    {
                        self.handle_transport_error(&message);
                    } else {
                        self.log(&format!(
                            "discarded stale transport error for conversation {conversation_id}"
                        ));
                    }
                    handled += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        handled
    }

    /// Abandons the live conversation: flushes a non-empty timeline to
    /// history, cancels polling, and resets the session to IDLE.
    pub fn start_new_conversation(&mut self) {
        self.cancel_polling();
        if !self.session.timeline.is_empty() {
            self.flush_history();
        }
        self.session.reset();
        self.last_conversation_id = None;
    }

    fn accept_snapshot(&mut self, snapshot: StatusSnapshot) {
        let outcome = self.session.apply_snapshot(&snapshot);
        if outcome == SnapshotOutcome::Discarded {
            self.log(&format!(
                "discarded stale snapshot for conversation {}",
                snapshot.conversation_id
            ));
            return;
        }
        if snapshot.status.is_terminal() {
            self.flush_history();
        }
        self.sync_polling();
    }

    fn handle_transport_error(&mut self, message: &str) {
        self.session.fail_with(message);
        self.cancel_polling();
    }

    /// Reconciles the polling cycle with the session flags: polling runs
    /// exactly while a conversation id exists and the run is active, and a
    /// previous cycle is cancelled before a new one starts.
    fn sync_polling(&mut self) {
        let conversation_id = match (&self.session.conversation_id, self.session.is_run_active) {
            (Some(id), true) => id.clone(),
            _ => {
                self.cancel_polling();
                return;
            }
        };
        let cycle_alive = self
            .poller
            .as_ref()
            .is_some_and(|handle| !handle.is_cancelled());
        if cycle_alive {
            return;
        }
        self.cancel_polling();
        self.poller = Some(start_polling(
            self.client.clone(),
            conversation_id,
            self.poll_interval,
            self.events_tx.clone(),
        ));
    }

    fn cancel_polling(&mut self) {
        if let Some(handle) = self.poller.take() {
            handle.cancel();
        }
    }

    fn flush_history(&mut self) {
        let Some(store) = &self.history else {
            return;
        };
        let conversation_id = self
            .session
            .conversation_id
            .clone()
            .or_else(|| self.last_conversation_id.clone());
        let Some(conversation_id) = conversation_id else {
            self.log("skipped history flush: conversation never reached the remote");
            return;
        };
        let saved = SavedConversation {
            conversation_id,
            repository_ref: self.session.repository_ref.clone(),
            saved_at: Utc::now().timestamp(),
            timeline: self.session.timeline.clone(),
        };
        if let Err(err) = store.save(&saved) {
            self.log(&format!(
                "history save failed for conversation {}: {err}",
                saved.conversation_id
            ));
        }
    }

    fn log(&self, message: &str) {
        let line = format!("{} {message}", Utc::now().to_rfc3339());
        let _ = append_controller_log_line(&self.state_root, &line);
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.cancel_polling();
    }
}
