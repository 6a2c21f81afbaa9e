use crate::session::TimelineMessage;
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("sqlite open failed at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to create history database parent {path}: {source}")]
    CreateParent {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sqlite statement failed: {source}")]
    Sql {
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to encode timeline for conversation {conversation_id}: {source}")]
    Encode {
        conversation_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode stored timeline for conversation {conversation_id}: {source}")]
    Decode {
        conversation_id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The persisted form of a finished or abandoned conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedConversation {
    pub conversation_id: String,
    pub repository_ref: String,
    pub saved_at: i64,
    pub timeline: Vec<TimelineMessage>,
}

/// Durable conversation store keyed by conversation id. Saving is
/// best-effort by contract; callers catch errors and log them.
pub struct HistoryStore {
    db_path: PathBuf,
}

impl HistoryStore {
    pub fn open(db_path: &Path) -> Result<Self, HistoryError> {
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent).map_err(|source| HistoryError::CreateParent {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let store = Self {
            db_path: db_path.to_path_buf(),
        };

        // Fail fast on an unopenable database.
        let _ = store.connect()?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection, HistoryError> {
        Connection::open(&self.db_path).map_err(|source| HistoryError::Open {
            path: self.db_path.display().to_string(),
            source,
        })
    }

    pub fn ensure_schema(&self) -> Result<(), HistoryError> {
        let connection = self.connect()?;
        connection
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS conversations (
                    conversation_id TEXT PRIMARY KEY,
                    repository_ref TEXT NOT NULL,
                    saved_at INTEGER NOT NULL,
                    timeline TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_conversations_saved_at
                    ON conversations(saved_at DESC);
                ",
            )
            .map_err(|source| HistoryError::Sql { source })
    }

    /// Upserts one conversation by id.
    pub fn save(&self, saved: &SavedConversation) -> Result<(), HistoryError> {
        let timeline =
            serde_json::to_string(&saved.timeline).map_err(|source| HistoryError::Encode {
                conversation_id: saved.conversation_id.clone(),
                source,
            })?;
        let connection = self.connect()?;
        connection
            .execute(
                "INSERT INTO conversations (conversation_id, repository_ref, saved_at, timeline)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(conversation_id) DO UPDATE SET
                     repository_ref = excluded.repository_ref,
                     saved_at = excluded.saved_at,
                     timeline = excluded.timeline",
                params![
                    saved.conversation_id,
                    saved.repository_ref,
                    saved.saved_at,
                    timeline
                ],
            )
            .map_err(|source| HistoryError::Sql { source })?;
        Ok(())
    }

    /// All saved conversations, newest first.
    pub fn load_all(&self) -> Result<Vec<SavedConversation>, HistoryError> {
        let connection = self.connect()?;
        let mut statement = connection
            .prepare(
                "SELECT conversation_id, repository_ref, saved_at, timeline
                 FROM conversations ORDER BY saved_at DESC, conversation_id",
            )
            .map_err(|source| HistoryError::Sql { source })?;
        let rows = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(|source| HistoryError::Sql { source })?;

        let mut result = Vec::new();
        for row in rows {
            let (conversation_id, repository_ref, saved_at, timeline_json) =
                row.map_err(|source| HistoryError::Sql { source })?;
            let timeline = serde_json::from_str(&timeline_json).map_err(|source| {
                HistoryError::Decode {
                    conversation_id: conversation_id.clone(),
                    source,
                }
            })?;
            result.push(SavedConversation {
                conversation_id,
                repository_ref,
                saved_at,
                timeline,
            });
        }
        Ok(result)
    }

    pub fn delete(&self, conversation_id: &str) -> Result<(), HistoryError> {
        let connection = self.connect()?;
        connection
            .execute(
                "DELETE FROM conversations WHERE conversation_id = ?1",
                params![conversation_id],
            )
            .map_err(|source| HistoryError::Sql { source })?;
        Ok(())
    }
}
