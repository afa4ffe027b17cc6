//! Quiz snapshots and question definitions
//!
//! A session plays an immutable snapshot of a quiz taken when it is hosted.
//! This module defines that snapshot, validates it before a session is
//! created, and builds the question payloads broadcast to participants,
//! which never reveal the correct answers.

use std::{
    collections::{BTreeSet, HashSet},
    time::Duration,
};

use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;

use crate::constants::quiz as limits;

type ValidationResult = garde::Result;

/// Validates that an optional time limit falls within the allowed bounds
fn validate_time_limit(val: &Option<Duration>) -> ValidationResult {
    let Some(val) = val else {
        return Ok(());
    };
    if (limits::MIN_TIME_LIMIT..=limits::MAX_TIME_LIMIT).contains(&val.as_secs()) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "time limit is outside of the bounds [{},{}]",
            limits::MIN_TIME_LIMIT,
            limits::MAX_TIME_LIMIT,
        )))
    }
}

/// The kind of a question, deciding how answers are scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    /// Exactly one option is correct
    SingleChoice,
    /// One or more options are correct; the whole set must be selected
    MultipleChoice,
    /// Two options, one of them correct
    TrueFalse,
    /// Free text, never scored automatically
    OpenEnded,
    /// Opinion question with options but no correct answer
    Poll,
}

impl QuestionKind {
    /// Whether answers to this kind of question are scored automatically
    pub fn is_scored(self) -> bool {
        matches!(
            self,
            Self::SingleChoice | Self::MultipleChoice | Self::TrueFalse
        )
    }
}

/// A single question of the quiz snapshot
#[serde_with::serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Identifier used by participants when submitting answers
    #[garde(length(min = 1, max = limits::MAX_QUESTION_ID_LENGTH))]
    pub id: String,
    /// The prompt shown to everyone
    #[garde(length(min = 1, max = limits::MAX_PROMPT_LENGTH))]
    pub prompt: String,
    /// How the question is answered and scored
    #[serde(rename = "type")]
    #[garde(skip)]
    pub kind: QuestionKind,
    /// Ordered option labels, meaningful for choice questions
    #[serde(default)]
    #[garde(length(max = limits::MAX_OPTION_COUNT), inner(length(min = 1, max = limits::MAX_OPTION_LENGTH)))]
    pub options: Vec<String>,
    /// Indices of the correct options
    #[serde(default)]
    #[garde(skip)]
    pub correct_answers: BTreeSet<usize>,
    /// Base points for a correct answer
    #[garde(range(max = limits::MAX_POINTS))]
    pub points: u64,
    /// Optional time budget for answering
    #[serde(rename = "timeLimitSeconds")]
    #[serde_as(as = "Option<serde_with::DurationSeconds<u64>>")]
    #[garde(custom(|v, _| validate_time_limit(v)))]
    pub time_limit: Option<Duration>,
    /// Broadcast the question results as soon as the server closes answering
    #[serde(default)]
    #[garde(skip)]
    pub reveal_results_on_timeout: bool,
}

/// A complete, immutable quiz snapshot
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    /// Title shown in the lobby
    #[garde(length(min = 1, max = limits::MAX_TITLE_LENGTH))]
    pub title: String,
    /// Optional longer description
    #[serde(default)]
    #[garde(length(max = limits::MAX_DESCRIPTION_LENGTH))]
    pub description: String,
    /// Ordered questions
    #[garde(length(min = 1, max = limits::MAX_QUESTION_COUNT), dive)]
    pub questions: Vec<Question>,
}

/// Reasons a quiz snapshot cannot be hosted
#[derive(Error, Debug)]
pub enum Error {
    /// A field is outside of its bounds
    #[error("{0}")]
    Report(#[from] garde::Report),
    /// A question's options and correct answers do not fit its kind
    #[error("question {index}: {reason}")]
    Question {
        /// Position of the offending question
        index: usize,
        /// What is wrong with it
        reason: &'static str,
    },
    /// Two questions share the same identifier
    #[error("duplicate question id {0:?}")]
    DuplicateId(String),
}

impl Question {
    /// Checks that the options and correct answers match the question kind
    ///
    /// # Errors
    ///
    /// Returns a short description of the first inconsistency found.
    fn check_answers(&self) -> Result<(), &'static str> {
        if self
            .correct_answers
            .iter()
            .any(|index| *index >= self.options.len())
        {
            return Err("correct answer index out of range");
        }

        match self.kind {
            QuestionKind::SingleChoice | QuestionKind::MultipleChoice
                if self.options.len() < 2 =>
            {
                Err("choice questions need at least two options")
            }
            QuestionKind::TrueFalse if self.options.len() != 2 => {
                Err("true/false questions need exactly two options")
            }
            QuestionKind::SingleChoice | QuestionKind::TrueFalse
                if self.correct_answers.len() != 1 =>
            {
                Err("exactly one option must be correct")
            }
            QuestionKind::MultipleChoice if self.correct_answers.is_empty() => {
                Err("at least one option must be correct")
            }
            QuestionKind::Poll if self.options.len() < 2 => {
                Err("poll questions need at least two options")
            }
            QuestionKind::OpenEnded | QuestionKind::Poll if !self.correct_answers.is_empty() => {
                Err("unscored questions cannot have correct answers")
            }
            _ => Ok(()),
        }
    }
}

impl Quiz {
    /// Returns the number of questions
    pub(crate) fn len(&self) -> usize {
        self.questions.len()
    }

    /// Validates the snapshot before it can be hosted
    ///
    /// # Errors
    ///
    /// Returns [`Error::Report`] when a field is out of bounds,
    /// [`Error::Question`] when a question is inconsistent with its kind and
    /// [`Error::DuplicateId`] when question ids collide.
    pub fn check(&self) -> Result<(), Error> {
        self.validate()?;

        let mut seen = HashSet::new();
        for (index, question) in self.questions.iter().enumerate() {
            question
                .check_answers()
                .map_err(|reason| Error::Question { index, reason })?;
            if !seen.insert(question.id.as_str()) {
                return Err(Error::DuplicateId(question.id.clone()));
            }
        }

        Ok(())
    }

    /// Summary sent to participants when they join
    pub fn info(&self) -> QuizInfo {
        QuizInfo {
            title: self.title.clone(),
            description: self.description.clone(),
            question_count: self.len(),
        }
    }

    /// Participant-facing payload for the question at `index`
    pub fn payload(&self, index: usize) -> Option<QuestionPayload> {
        let question = self.questions.get(index)?;
        Some(QuestionPayload {
            index,
            count: self.len(),
            id: question.id.clone(),
            prompt: question.prompt.clone(),
            kind: question.kind,
            options: question.options.clone(),
            points: question.points,
            time_limit: question.time_limit,
        })
    }
}

/// Quiz metadata shared with participants
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizInfo {
    /// Quiz title
    pub title: String,
    /// Quiz description
    pub description: String,
    /// Number of questions in the quiz
    pub question_count: usize,
}

/// A question as broadcast to participants, without the correct answers
#[serde_with::serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    /// Index of the question (0-based)
    pub index: usize,
    /// Total number of questions
    pub count: usize,
    /// Question identifier to echo back when answering
    pub id: String,
    /// The prompt
    pub prompt: String,
    /// Question kind
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    /// Option labels
    pub options: Vec<String>,
    /// Base points
    pub points: u64,
    /// Advisory time limit
    #[serde(rename = "timeLimitSeconds")]
    #[serde_as(as = "Option<serde_with::DurationSeconds<u64>>")]
    pub time_limit: Option<Duration>,
}
