//! Participant identities and the per-session participant registry
//!
//! Every real-time connection gets an [`Id`] for its lifetime. Connections
//! that join a session become [`Participant`]s, tracked by the session's
//! [`Participants`] registry together with their running score and answer
//! history.

use std::{
    collections::{HashMap, hash_map::Entry},
    fmt::Display,
    str::FromStr,
    time::Duration,
};

use itertools::Itertools;
use rustrict::CensorStr;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    constants::session::{MAX_NAME_LENGTH, MAX_PARTICIPANT_COUNT},
    scoring::Answer,
};

/// Identity of one real-time connection
///
/// The id is stable for the lifetime of the connection and doubles as the
/// participant id once the connection joins a session.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random connection id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Errors that can occur when managing participants
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The display name is empty or contains only whitespace
    #[error("name cannot be empty")]
    Empty,
    /// The display name exceeds the maximum allowed length
    #[error("name is too long")]
    TooLong,
    /// The display name contains inappropriate content
    #[error("name is inappropriate")]
    Sinful,
    /// The session has reached the maximum number of participants
    #[error("maximum number of participants reached")]
    MaximumParticipants,
    /// The connection is not a participant of the session
    #[error("not a participant of this session")]
    Unknown,
    /// The answer targets a question other than the current one
    #[error("answer is for a question that is no longer current")]
    StaleQuestion,
}

/// Validates and normalizes a display name
///
/// # Errors
///
/// * `Error::TooLong` - Name exceeds the maximum length
/// * `Error::Empty` - Name is empty after trimming whitespace
/// * `Error::Sinful` - Name contains inappropriate content
pub fn validate_name(name: &str) -> Result<String, Error> {
    if name.len() > MAX_NAME_LENGTH {
        return Err(Error::TooLong);
    }
    let name = rustrict::trim_whitespace(name);
    if name.is_empty() {
        return Err(Error::Empty);
    }
    if name.is_inappropriate() {
        return Err(Error::Sinful);
    }
    Ok(name.to_owned())
}

/// One submitted answer in a participant's history
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    /// Identifier of the answered question
    pub question_id: String,
    /// The raw answer payload
    pub answer: Answer,
    /// Whether it was judged correct
    pub is_correct: bool,
    /// Points awarded for it
    pub points: u64,
    /// Time the participant reported spending
    #[serde(rename = "timeSpentSeconds")]
    #[serde_as(as = "serde_with::DurationSecondsWithFrac<f64>")]
    pub time_spent: Duration,
}

/// A joined, scored party of a session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Connection identity
    pub id: Id,
    /// Display name chosen at join time; not unique
    pub name: String,
    /// Running total, never decreasing
    pub score: u64,
    /// Ordered answer log
    pub answers: Vec<AnswerRecord>,
    /// Join sequence number, used to break leaderboard ties
    #[serde(skip)]
    join_order: u64,
}

impl Participant {
    /// The answer given to `question_id`, if any
    pub fn answer_for(&self, question_id: &str) -> Option<&AnswerRecord> {
        self.answers.iter().find(|a| a.question_id == question_id)
    }

    /// Public view of the participant
    pub fn info(&self) -> ParticipantInfo {
        ParticipantInfo {
            id: self.id,
            name: self.name.clone(),
            score: self.score,
        }
    }
}

/// Participant summary sent over the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    /// Participant id
    pub id: Id,
    /// Display name
    pub name: String,
    /// Current score
    pub score: u64,
}

/// Per-session registry of participants
#[derive(Debug)]
pub struct Participants {
    /// Primary mapping from connection id to participant
    mapping: HashMap<Id, Participant>,
    /// Sequence number handed to the next new participant
    next_join: u64,
    /// Maximum number of participants accepted
    capacity: usize,
}

impl Default for Participants {
    fn default() -> Self {
        Self::with_capacity(MAX_PARTICIPANT_COUNT)
    }
}

impl Participants {
    /// Creates an empty registry accepting at most `capacity` participants
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            mapping: HashMap::new(),
            next_join: 0,
            capacity: capacity.min(MAX_PARTICIPANT_COUNT),
        }
    }

    /// Adds a participant, or renames it if the connection already joined
    ///
    /// Re-joining keeps the original join order and score.
    ///
    /// # Returns
    ///
    /// The participant and whether it was newly added
    ///
    /// # Errors
    ///
    /// Returns a name validation error, or `Error::MaximumParticipants` when
    /// the registry is full.
    pub fn join(&mut self, id: Id, name: &str) -> Result<(&Participant, bool), Error> {
        let name = validate_name(name)?;
        let at_capacity = self.mapping.len() >= self.capacity;

        match self.mapping.entry(id) {
            Entry::Occupied(entry) => {
                let participant = entry.into_mut();
                participant.name = name;
                Ok((participant, false))
            }
            Entry::Vacant(_) if at_capacity => Err(Error::MaximumParticipants),
            Entry::Vacant(entry) => {
                let join_order = self.next_join;
                self.next_join += 1;
                Ok((
                    entry.insert(Participant {
                        id,
                        name,
                        score: 0,
                        answers: Vec::new(),
                        join_order,
                    }),
                    true,
                ))
            }
        }
    }

    /// Removes a participant; unknown ids are ignored
    pub fn leave(&mut self, id: Id) -> Option<Participant> {
        self.mapping.remove(&id)
    }

    /// Appends an answer to the participant's history and adds its points
    ///
    /// # Arguments
    ///
    /// * `id` - The answering participant
    /// * `current_question_id` - Id of the question the session is on
    /// * `record` - The scored answer
    ///
    /// # Returns
    ///
    /// The participant's new total score
    ///
    /// # Errors
    ///
    /// Returns `Error::StaleQuestion` without touching the score if the
    /// record is for a different question, and `Error::Unknown` for ids
    /// that never joined.
    pub fn record_answer(
        &mut self,
        id: Id,
        current_question_id: &str,
        record: AnswerRecord,
    ) -> Result<u64, Error> {
        if record.question_id != current_question_id {
            return Err(Error::StaleQuestion);
        }
        let participant = self.mapping.get_mut(&id).ok_or(Error::Unknown)?;
        participant.score = participant.score.saturating_add(record.points);
        participant.answers.push(record);
        Ok(participant.score)
    }

    /// Gets a participant
    pub fn get(&self, id: Id) -> Option<&Participant> {
        self.mapping.get(&id)
    }

    /// Checks whether a connection is a participant
    pub fn contains(&self, id: Id) -> bool {
        self.mapping.contains_key(&id)
    }

    /// Number of present participants
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    /// Whether nobody is present
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Ids of all present participants, in join order
    pub fn ids(&self) -> Vec<Id> {
        self.in_join_order().map(|p| p.id).collect_vec()
    }

    /// Present participants in join order
    pub fn in_join_order(&self) -> impl Iterator<Item = &Participant> {
        self.mapping.values().sorted_by_key(|p| p.join_order)
    }

    /// Present participants sorted by score, highest first
    ///
    /// Equal scores keep join order, so the ranking is deterministic.
    pub fn leaderboard(&self) -> Vec<&Participant> {
        self.in_join_order()
            .sorted_by(|a, b| b.score.cmp(&a.score))
            .collect_vec()
    }

    /// Number of present participants who answered `question_id`
    pub fn answered_count(&self, question_id: &str) -> usize {
        self.mapping
            .values()
            .filter(|p| p.answer_for(question_id).is_some())
            .count()
    }
}
