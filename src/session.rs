use crate::api::{RunStatus, StatusSnapshot};
use crate::shared::ids::new_message_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Operator,
    Agent,
}

/// One operator-visible entry in a conversation timeline.
///
/// Operator entries are immutable once appended. The last agent entry may be
/// rewritten in place while the same agent keeps reporting progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub status: Option<RunStatus>,
    #[serde(default)]
    pub progress: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// How a snapshot was folded into the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    Appended,
    Coalesced,
    /// Stale event: wrong conversation or no active run. Not applied.
    Discarded,
}

/// The single live conversation: canonical timeline, run flags, and the id
/// binding it to a remote run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSession {
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub repository_ref: String,
    #[serde(default)]
    pub timeline: Vec<TimelineMessage>,
    #[serde(default)]
    pub accepting_input: bool,
    #[serde(default)]
    pub is_run_active: bool,
}

impl ConversationSession {
    pub fn new(repository_ref: &str) -> Self {
        Self {
            conversation_id: None,
            repository_ref: repository_ref.to_string(),
            timeline: Vec::new(),
            accepting_input: true,
            is_run_active: false,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.conversation_id.is_none()
    }

    /// Appends an operator entry and marks the run in flight. The caller
    /// dispatches the request and feeds the first snapshot back in.
    pub fn push_operator_message(&mut self, content: &str) {
        let now = Utc::now();
        self.timeline.push(TimelineMessage {
            id: new_message_id(now.timestamp_millis()),
            role: Role::Operator,
            content: content.to_string(),
            agent_name: None,
            status: None,
            progress: None,
            timestamp: now,
        });
        self.is_run_active = true;
        self.accepting_input = false;
    }

    /// Reconciles one status snapshot into the timeline and updates the run
    /// flags from its status.
    ///
    /// Stale delivery is rejected up front: a snapshot for another
    /// conversation, or one arriving when no run is active (a poll response
    /// that lost the race with cancellation), is discarded unapplied.
    pub fn apply_snapshot(&mut self, snapshot: &StatusSnapshot) -> SnapshotOutcome {
        if !self.is_run_active {
            return SnapshotOutcome::Discarded;
        }
        match self.conversation_id.as_deref() {
            Some(id) if id == snapshot.conversation_id => {}
            _ => return SnapshotOutcome::Discarded,
        }

        let outcome = self.reconcile(snapshot);

        match snapshot.status {
            RunStatus::Running => {}
            RunStatus::WaitingForInput => {
                // Retained conversation id routes the next operator message
                // as a response to this same run.
                self.is_run_active = false;
                self.accepting_input = true;
            }
            RunStatus::Completed | RunStatus::Failed => {
                self.is_run_active = false;
                self.accepting_input = true;
                self.conversation_id = None;
            }
        }
        outcome
    }

    fn reconcile(&mut self, snapshot: &StatusSnapshot) -> SnapshotOutcome {
        let timestamp = parse_snapshot_timestamp(&snapshot.timestamp);
        if let Some(last) = self.timeline.last_mut() {
            if last.role == Role::Agent && last.agent_name == snapshot.agent_name {
                last.content = snapshot.display_message().to_string();
                last.status = Some(snapshot.status);
                last.progress = snapshot.progress;
                last.timestamp = timestamp;
                return SnapshotOutcome::Coalesced;
            }
        }
        self.timeline.push(TimelineMessage {
            id: new_message_id(timestamp.timestamp_millis()),
            role: Role::Agent,
            content: snapshot.display_message().to_string(),
            agent_name: snapshot.agent_name.clone(),
            status: Some(snapshot.status),
            progress: snapshot.progress,
            timestamp,
        });
        SnapshotOutcome::Appended
    }

    /// Records a transport failure as a normal FAILED timeline entry and
    /// abandons the run. The session stays usable for a fresh conversation.
    pub fn fail_with(&mut self, message: &str) {
        let now = Utc::now();
        self.timeline.push(TimelineMessage {
            id: new_message_id(now.timestamp_millis()),
            role: Role::Agent,
            content: format!("Error: {message}"),
            agent_name: None,
            status: Some(RunStatus::Failed),
            progress: None,
            timestamp: now,
        });
        self.is_run_active = false;
        self.accepting_input = true;
        self.conversation_id = None;
    }

    /// Full reset back to IDLE. The caller flushes the timeline to history
    /// first if it wants it kept.
    pub fn reset(&mut self) {
        self.conversation_id = None;
        self.timeline.clear();
        self.is_run_active = false;
        self.accepting_input = true;
    }
}

/// Defensive snapshot timestamp parsing: RFC 3339 first, then chrono's
/// permissive `DateTime<Utc>` form, else the moment of receipt.
pub fn parse_snapshot_timestamp(raw: &str) -> DateTime<Utc> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&Utc);
    }
    if let Ok(parsed) = raw.parse::<DateTime<Utc>>() {
        return parsed;
    }
    Utc::now()
}
