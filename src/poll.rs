//! Ad-hoc polls layered onto a live session
//!
//! A host can run one quick single-question survey at a time. Responses are
//! last-write-wins per participant; ending the poll tallies every configured
//! option (including those nobody picked) and discards the poll.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    constants::poll::{MAX_OPTION_COUNT, MAX_OPTION_LENGTH, MAX_QUESTION_LENGTH},
    participant::Id,
};

/// Errors that can occur while running a poll
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The poll question is empty or too long
    #[error("poll question is empty or too long")]
    InvalidQuestion,
    /// Fewer than two options, too many, or an option is empty or too long
    #[error("poll needs between two and eight short, non-empty options")]
    InvalidOptions,
    /// Two options have the same label
    #[error("poll options must be distinct")]
    DuplicateOption,
    /// The response is not one of the configured options
    #[error("option is not part of this poll")]
    UnknownOption,
}

/// Definition of a poll as sent by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollDefinition {
    /// The question text
    pub question: String,
    /// Ordered option labels
    pub options: Vec<String>,
}

/// Number of responses for one option
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionCount {
    /// Option label
    pub option: String,
    /// Responses choosing it
    pub count: usize,
}

/// Final counts of a poll, in option order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Tally(Vec<OptionCount>);

/// An active poll
#[derive(Debug, Clone)]
pub struct Poll {
    question: String,
    options: Vec<String>,
    /// Latest choice of each participant
    responses: HashMap<Id, String>,
}

impl Poll {
    /// Creates a poll after validating its definition
    ///
    /// # Errors
    ///
    /// Returns an error if the question or options are out of bounds or if
    /// two options share a label.
    pub fn new(definition: PollDefinition) -> Result<Self, Error> {
        let PollDefinition { question, options } = definition;

        let question = question.trim().to_owned();
        if question.is_empty() || question.len() > MAX_QUESTION_LENGTH {
            return Err(Error::InvalidQuestion);
        }

        let options = options
            .into_iter()
            .map(|option| option.trim().to_owned())
            .collect_vec();
        if !(2..=MAX_OPTION_COUNT).contains(&options.len())
            || options
                .iter()
                .any(|option| option.is_empty() || option.len() > MAX_OPTION_LENGTH)
        {
            return Err(Error::InvalidOptions);
        }
        if options.iter().collect::<HashSet<_>>().len() != options.len() {
            return Err(Error::DuplicateOption);
        }

        Ok(Self {
            question,
            options,
            responses: HashMap::new(),
        })
    }

    /// The poll question
    pub fn question(&self) -> &str {
        &self.question
    }

    /// The configured options
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Number of participants who responded
    pub fn response_count(&self) -> usize {
        self.responses.len()
    }

    /// Records or replaces a participant's choice
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownOption` if `option` is not configured.
    pub fn respond(&mut self, id: Id, option: &str) -> Result<(), Error> {
        let option = option.trim();
        if !self.options.iter().any(|o| o == option) {
            return Err(Error::UnknownOption);
        }
        self.responses.insert(id, option.to_owned());
        Ok(())
    }

    /// Drops the response of a participant who left
    pub fn forget(&mut self, id: Id) {
        self.responses.remove(&id);
    }

    /// Counts responses per configured option
    pub fn tally(&self) -> Tally {
        let counts = self.responses.values().counts();
        Tally(
            self.options
                .iter()
                .map(|option| OptionCount {
                    option: option.clone(),
                    count: counts.get(option).copied().unwrap_or_default(),
                })
                .collect_vec(),
        )
    }

    /// Ends the poll, returning its question and final tally
    pub fn end(self) -> (String, Tally) {
        let tally = self.tally();
        (self.question, tally)
    }
}

/// Poll events sent to session members
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
#[serde(rename_all_fields = "camelCase")]
pub enum UpdateMessage {
    /// (ALL) A poll has started
    PollStarted {
        /// The poll question
        question: String,
        /// Ordered options
        options: Vec<String>,
    },
    /// (HOST ONLY) A participant responded
    PollResponseReceived {
        /// Who responded
        participant_id: Id,
        /// The chosen option
        option: String,
        /// Distinct respondents so far
        response_count: usize,
    },
    /// (ALL) The poll ended
    PollEnded {
        /// The poll question
        question: String,
        /// Final counts
        tally: Tally,
    },
}
