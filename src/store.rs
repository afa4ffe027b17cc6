//! External collaborators of the coordinator
//!
//! [`QuizStore`] supplies read-only quiz snapshots when a host does not send
//! one, and [`ResultsSink`] receives the final results of every finished
//! session. Neither is touched while a session is running otherwise.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::{io::AsyncWriteExt, sync::Mutex};

use super::{quiz::Quiz, session::SessionResults};

/// Errors raised by the stores
#[derive(Error, Debug)]
pub enum Error {
    /// Reading or writing a file failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// A quiz or result could not be (de)serialized
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// A stored quiz failed validation
    #[error("invalid quiz {path}: {reason}")]
    Invalid {
        /// File the quiz was loaded from
        path: PathBuf,
        /// Validation failure
        reason: String,
    },
}

/// Read-only source of quiz snapshots
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuizStore: Send + Sync {
    /// Returns a snapshot of the quiz with the given id, if it exists
    async fn snapshot(&self, quiz_id: &str) -> Option<Quiz>;
}

/// Destination for the results of finished sessions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResultsSink: Send + Sync {
    /// Records the results of one finished session
    async fn record(&self, results: SessionResults) -> Result<(), Error>;
}

/// Quiz store kept in memory, optionally preloaded from a directory
#[derive(Debug, Default)]
pub struct InMemoryQuizStore {
    quizzes: HashMap<String, Quiz>,
}

impl InMemoryQuizStore {
    /// Adds or replaces a quiz
    pub fn insert(&mut self, quiz_id: impl Into<String>, quiz: Quiz) {
        self.quizzes.insert(quiz_id.into(), quiz);
    }

    /// Number of stored quizzes
    pub fn len(&self) -> usize {
        self.quizzes.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.quizzes.is_empty()
    }

    /// Loads every `*.json` file of a directory, keyed by file stem
    ///
    /// # Errors
    ///
    /// Fails on the first unreadable, unparsable or invalid quiz file.
    pub async fn load_dir(dir: &Path) -> Result<Self, Error> {
        let mut store = Self::default();
        let mut entries = tokio::fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|extension| extension != "json") {
                continue;
            }
            let Some(quiz_id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let quiz: Quiz = serde_json::from_slice(&tokio::fs::read(&path).await?)?;
            quiz.check().map_err(|error| Error::Invalid {
                path: path.clone(),
                reason: error.to_string(),
            })?;

            tracing::debug!(quiz_id, path = %path.display(), "quiz loaded");
            store.insert(quiz_id, quiz);
        }

        Ok(store)
    }
}

#[async_trait]
impl QuizStore for InMemoryQuizStore {
    async fn snapshot(&self, quiz_id: &str) -> Option<Quiz> {
        self.quizzes.get(quiz_id).cloned()
    }
}

/// Results sink that only logs a summary
#[derive(Debug, Default)]
pub struct LogResultsSink;

#[async_trait]
impl ResultsSink for LogResultsSink {
    async fn record(&self, results: SessionResults) -> Result<(), Error> {
        tracing::info!(
            code = %results.code,
            quiz = %results.quiz_title,
            participants = results.participants.len(),
            winner = results.participants.first().map(|p| p.standing.name.as_str()),
            "session results"
        );
        Ok(())
    }
}

/// Results sink appending one JSON document per line to a file
#[derive(Debug)]
pub struct JsonLinesResultsSink {
    path: PathBuf,
    /// Serializes appends from concurrently finishing sessions
    write_lock: Mutex<()>,
}

impl JsonLinesResultsSink {
    /// Creates a sink writing to `path`; the file is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl ResultsSink for JsonLinesResultsSink {
    async fn record(&self, results: SessionResults) -> Result<(), Error> {
        let mut line = serde_json::to_vec(&results)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}
