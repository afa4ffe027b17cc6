//! Session state machine
//!
//! A [`Session`] owns one hosting instance of a quiz: the immutable quiz
//! snapshot, the phase (`Lobby`, `Active`, `Finished`), the current question
//! pointer, the participant registry, the scoring history and an optional
//! poll. Every operation is handled to completion against `&mut self`, so the
//! caller only has to serialize access to a session to get consistent state.
//!
//! Outbound traffic goes through a `tunnel_finder` closure resolving a
//! participant or host id into a [`Tunnel`]. Timed events are requested
//! through a `schedule_message` closure and come back via
//! [`Session::receive_alarm`].

use std::{collections::BTreeSet, fmt::Debug, time::Duration};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;
use web_time::SystemTime;

use super::{
    Preview,
    constants::session::{DEFAULT_ANSWER_GRACE, MAX_PARTICIPANT_COUNT},
    leaderboard::{Leaderboard, QuestionStats, Standing},
    participant::{self, AnswerRecord, Id, ParticipantInfo, Participants},
    poll::{self, Poll, PollDefinition},
    quiz::{QuestionPayload, Quiz, QuizInfo},
    scoring::{self, Answer},
    session_code::SessionCode,
    tunnel::Tunnel,
};

/// Lifecycle phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Accepting participants, no question shown yet
    Lobby,
    /// Questions are being played
    Active,
    /// Final leaderboard has been broadcast
    Finished,
}

/// Per-session settings supplied by the gateway
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Added to a question's time limit before the server closes answering
    pub answer_grace: Duration,
    /// Maximum number of participants accepted
    pub max_participants: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            answer_grace: Duration::from_secs(DEFAULT_ANSWER_GRACE),
            max_participants: MAX_PARTICIPANT_COUNT,
        }
    }
}

/// Timed events a session asks its owner to deliver later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// The time budget (plus grace) of a question ran out
    QuestionTimeout {
        /// Index of the question the alarm was scheduled for
        index: usize,
    },
}

/// Errors reported back to the connection that issued a request
///
/// None of these affect other members of the session.
#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No session is hosted under that code
    #[error("no session with that code")]
    NotFound,
    /// A host-only action was issued by someone else
    #[error("only the host can do that")]
    Unauthorized,
    /// The action is not allowed in the session's current phase
    #[error("not allowed at this point of the quiz")]
    InvalidPhase,
    /// The answer is for a question that is no longer open
    #[error("that question is no longer open")]
    StaleQuestion,
    /// A poll is already running
    #[error("a poll is already running")]
    DuplicatePoll,
    /// There is no poll to respond to or end
    #[error("no poll is running")]
    NoActivePoll,
    /// The poll response is not one of the poll's options
    #[error("option is not part of this poll")]
    UnknownOption,
    /// The participant already answered the current question
    #[error("you already answered this question")]
    AlreadyAnswered,
    /// The connection already hosts or joined another session
    #[error("this connection already belongs to a session")]
    AlreadyBound,
    /// The quiz snapshot failed validation
    #[error("invalid quiz: {0}")]
    InvalidQuiz(String),
    /// No snapshot was supplied and the store has none for that quiz
    #[error("quiz not available")]
    QuizUnavailable,
    /// No free session code could be drawn
    #[error("no free session code available")]
    CodeSpaceExhausted,
    /// The message could not be parsed
    #[error("malformed message")]
    MalformedMessage,
    /// The requested question has not been shown yet
    #[error("question index out of range")]
    QuestionOutOfRange,
    /// The connection is not a participant of the session
    #[error("not a participant of this session")]
    NotParticipant,
    /// The display name was rejected or the session is full
    #[error(transparent)]
    Name(participant::Error),
    /// The poll definition was rejected
    #[error(transparent)]
    InvalidPoll(poll::Error),
}

impl From<participant::Error> for Error {
    fn from(error: participant::Error) -> Self {
        match error {
            participant::Error::StaleQuestion => Self::StaleQuestion,
            participant::Error::Unknown => Self::NotParticipant,
            other => Self::Name(other),
        }
    }
}

impl From<poll::Error> for Error {
    fn from(error: poll::Error) -> Self {
        match error {
            poll::Error::UnknownOption => Self::UnknownOption,
            other => Self::InvalidPoll(other),
        }
    }
}

/// What happened to the session after a host action
#[derive(Debug)]
pub enum Outcome {
    /// The session keeps going
    Continue,
    /// The session just reached `Finished`
    Finished(Box<SessionResults>),
}

/// Final result of one participant
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantResult {
    /// Final ranking entry
    #[serde(flatten)]
    pub standing: Standing,
    /// Every answer the participant gave
    pub answers: Vec<AnswerRecord>,
}

/// Record handed to the results sink once a session finishes
#[serde_with::serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResults {
    /// Code the session was hosted under
    pub code: SessionCode,
    /// Title of the played quiz
    pub quiz_title: String,
    /// Opaque host identity supplied when hosting
    pub host_id: String,
    /// When the first question was shown
    #[serde_as(as = "Option<serde_with::TimestampSeconds<i64>>")]
    pub started_at: Option<SystemTime>,
    /// When the session finished
    #[serde_as(as = "serde_with::TimestampSeconds<i64>")]
    pub finished_at: SystemTime,
    /// Present participants, ranked
    pub participants: Vec<ParticipantResult>,
    /// Per-question (correct, answered) counts
    pub stats: Vec<QuestionStats>,
}

/// Operator-facing snapshot of a session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Session code
    pub code: SessionCode,
    /// Quiz title
    pub title: String,
    /// Current phase
    pub phase: Phase,
    /// Present participants
    pub participant_count: usize,
    /// Current question, `-1` in the lobby
    pub current_question_index: i64,
    /// Number of questions in the quiz
    pub question_count: usize,
    /// Whether a poll is running
    pub poll_active: bool,
}

/// Session events sent to hosts and participants
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
#[serde(rename_all_fields = "camelCase")]
pub enum UpdateMessage {
    /// (HOST ONLY) The session was created
    QuizHosted {
        /// Code participants use to join
        code: SessionCode,
        /// Quiz summary
        quiz: QuizInfo,
    },
    /// (HOST ONLY) A participant joined or changed name
    ParticipantJoined {
        /// The participant
        participant: ParticipantInfo,
        /// Present participants
        participant_count: usize,
    },
    /// (HOST ONLY) A participant left
    ParticipantLeft {
        /// Who left
        participant_id: Id,
        /// Present participants
        participant_count: usize,
    },
    /// (HOST ONLY) A participant answered the current question
    ParticipantAnswered {
        /// Who answered
        participant_id: Id,
        /// Whether the answer was correct
        is_correct: bool,
        /// Points awarded for it
        points_awarded: u64,
        /// The participant's new total
        total_score: u64,
    },
    /// (HOST ONLY) Every present participant answered the current question
    AllAnswered {
        /// Current question
        question_index: usize,
    },
    /// (ALL) The first question
    QuizStarted(QuestionPayload),
    /// (ALL) A following question
    NextQuestion(QuestionPayload),
    /// (ALL) The server stopped accepting answers for a question
    AnsweringClosed {
        /// The closed question
        question_index: usize,
    },
    /// (ALL) Transient results of one question
    QuestionResults {
        /// The question
        question_index: usize,
        /// Indices of the correct options
        correct_answers: BTreeSet<usize>,
        /// How many participants selected each option
        option_counts: Vec<usize>,
        /// Correct and total answers
        stats: QuestionStats,
        /// Current standings
        leaderboard: Preview<Standing>,
    },
    /// (ALL) Final leaderboard
    QuizFinished {
        /// Present participants, ranked
        leaderboard: Vec<Standing>,
    },
    /// (HOST ONLY) End-of-quiz statistics
    Summary {
        /// Per-question (correct, answered) counts
        stats: Vec<QuestionStats>,
        /// Participants who answered at least once
        participant_count: usize,
    },
    /// (PARTICIPANT) End-of-quiz recap for one participant
    ParticipantSummary {
        /// Points earned on each question, zero where unanswered
        points: Vec<u64>,
        /// Final score
        score: u64,
        /// Final position on the leaderboard
        position: usize,
    },
    /// (PARTICIPANTS) The host left; the session is gone
    HostDisconnected,
    /// (ISSUER) Join accepted
    JoinedQuiz {
        /// Quiz summary
        quiz: QuizInfo,
        /// Everyone present, in join order
        participants: Preview<ParticipantInfo>,
    },
    /// (ISSUER) Join rejected
    JoinError {
        /// Human readable reason
        message: String,
    },
    /// (ISSUER) Answer accepted
    AnswerSubmitted {
        /// Whether it was correct
        is_correct: bool,
        /// Points awarded for it
        points_awarded: u64,
        /// New total
        total_score: u64,
    },
    /// (ISSUER) A request was rejected
    Rejected {
        /// Name of the rejected event
        event: &'static str,
        /// Machine readable reason
        error: Error,
        /// Human readable reason
        message: String,
    },
}

/// One live hosting instance of a quiz
pub struct Session {
    code: SessionCode,
    quiz: Quiz,
    phase: Phase,
    /// `None` while in the lobby
    current_question: Option<usize>,
    host: Id,
    /// Opaque identity of the host account, passed through to the results
    host_identity: String,
    participants: Participants,
    poll: Option<Poll>,
    leaderboard: Leaderboard,
    /// Per question, per option selection counts
    option_counts: Vec<Vec<usize>>,
    /// Whether the current question still accepts answers
    answers_open: bool,
    all_answered_announced: bool,
    started_at: Option<SystemTime>,
    finished_at: Option<SystemTime>,
    options: Options,
}

impl Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("code", &self.code)
            .field("phase", &self.phase)
            .field("current_question", &self.current_question)
            .finish_non_exhaustive()
    }
}

// Fan-out helpers
impl Session {
    fn send_to<T: Tunnel, F: Fn(Id) -> Option<T>>(
        id: Id,
        message: &super::UpdateMessage,
        tunnel_finder: &F,
    ) {
        if let Some(tunnel) = tunnel_finder(id) {
            tunnel.send_message(message);
        }
    }

    fn announce_host<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &super::UpdateMessage,
        tunnel_finder: &F,
    ) {
        Self::send_to(self.host, message, tunnel_finder);
    }

    fn announce_participants<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &super::UpdateMessage,
        tunnel_finder: &F,
    ) {
        for id in self.participants.ids() {
            Self::send_to(id, message, tunnel_finder);
        }
    }

    /// Sends a message to the host and every present participant
    fn announce<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &super::UpdateMessage,
        tunnel_finder: &F,
    ) {
        self.announce_host(message, tunnel_finder);
        self.announce_participants(message, tunnel_finder);
    }

    fn authorize(&self, issuer: Id) -> Result<(), Error> {
        if issuer == self.host {
            Ok(())
        } else {
            Err(Error::Unauthorized)
        }
    }
}

impl Session {
    /// Creates a lobby-phase session for a validated quiz snapshot
    ///
    /// # Arguments
    ///
    /// * `code` - Code the session is registered under
    /// * `quiz` - Snapshot of the quiz, never modified afterwards
    /// * `host` - Connection id of the host
    /// * `host_identity` - Opaque host identity supplied by the caller
    /// * `options` - Per-session settings
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidQuiz` if the snapshot fails validation.
    pub fn new(
        code: SessionCode,
        quiz: Quiz,
        host: Id,
        host_identity: String,
        options: Options,
    ) -> Result<Self, Error> {
        quiz.check()
            .map_err(|error| Error::InvalidQuiz(error.to_string()))?;

        Ok(Self {
            code,
            phase: Phase::Lobby,
            current_question: None,
            host,
            host_identity,
            participants: Participants::with_capacity(options.max_participants),
            poll: None,
            leaderboard: Leaderboard::new(quiz.len()),
            option_counts: quiz
                .questions
                .iter()
                .map(|question| vec![0; question.options.len()])
                .collect_vec(),
            answers_open: false,
            all_answered_announced: false,
            started_at: None,
            finished_at: None,
            options,
            quiz,
        })
    }

    /// Tells the host the session exists and which code to share
    pub fn announce_hosted<T: Tunnel, F: Fn(Id) -> Option<T>>(&self, tunnel_finder: F) {
        self.announce_host(
            &UpdateMessage::QuizHosted {
                code: self.code,
                quiz: self.quiz.info(),
            }
            .into(),
            &tunnel_finder,
        );
    }

    /// Adds a participant to a lobby-phase session
    ///
    /// Joining again from the same connection only updates the name.
    ///
    /// # Errors
    ///
    /// * `Error::AlreadyBound` - The host tried to join its own session
    /// * `Error::InvalidPhase` - The quiz already started
    /// * `Error::Name` - The name was rejected or the session is full
    pub fn join<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        issuer: Id,
        name: &str,
        tunnel_finder: F,
    ) -> Result<(), Error> {
        if issuer == self.host {
            return Err(Error::AlreadyBound);
        }
        if self.phase != Phase::Lobby {
            return Err(Error::InvalidPhase);
        }

        let (participant, added) = {
            let (participant, added) = self.participants.join(issuer, name)?;
            (participant.info(), added)
        };

        if added {
            tracing::info!(code = %self.code, participant = %issuer, name = %participant.name, "participant joined");
        }

        self.announce_host(
            &UpdateMessage::ParticipantJoined {
                participant,
                participant_count: self.participants.len(),
            }
            .into(),
            &tunnel_finder,
        );

        Self::send_to(
            issuer,
            &UpdateMessage::JoinedQuiz {
                quiz: self.quiz.info(),
                participants: Preview::of(
                    self.participants.in_join_order().map(|p| p.info()),
                    self.participants.len(),
                ),
            }
            .into(),
            &tunnel_finder,
        );

        Ok(())
    }

    /// Removes a participant who disconnected
    ///
    /// Unknown ids are ignored. Points the participant already earned stay
    /// in the per-question history.
    pub fn leave<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, issuer: Id, tunnel_finder: F) {
        if self.participants.leave(issuer).is_none() {
            return;
        }
        if let Some(poll) = &mut self.poll {
            poll.forget(issuer);
        }

        tracing::info!(code = %self.code, participant = %issuer, "participant left");

        self.announce_host(
            &UpdateMessage::ParticipantLeft {
                participant_id: issuer,
                participant_count: self.participants.len(),
            }
            .into(),
            &tunnel_finder,
        );
        self.check_all_answered(&tunnel_finder);
    }

    /// Moves the session from `Lobby` to `Active` and shows the first question
    ///
    /// # Errors
    ///
    /// * `Error::Unauthorized` - Issued by someone other than the host
    /// * `Error::InvalidPhase` - Not in the lobby, or nobody joined yet
    pub fn start<T: Tunnel, F: Fn(Id) -> Option<T>, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        issuer: Id,
        schedule_message: S,
        tunnel_finder: F,
    ) -> Result<(), Error> {
        self.authorize(issuer)?;
        if self.phase != Phase::Lobby || self.participants.is_empty() {
            return Err(Error::InvalidPhase);
        }

        self.phase = Phase::Active;
        self.started_at = Some(SystemTime::now());
        tracing::info!(code = %self.code, participants = self.participants.len(), "quiz started");

        self.open_question(0, schedule_message, &tunnel_finder);
        Ok(())
    }

    /// Advances to the next question, finishing the quiz after the last one
    ///
    /// # Errors
    ///
    /// * `Error::Unauthorized` - Issued by someone other than the host
    /// * `Error::InvalidPhase` - The session is not `Active`
    pub fn next_question<T: Tunnel, F: Fn(Id) -> Option<T>, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        issuer: Id,
        schedule_message: S,
        tunnel_finder: F,
    ) -> Result<Outcome, Error> {
        self.authorize(issuer)?;
        if self.phase != Phase::Active {
            return Err(Error::InvalidPhase);
        }

        let next = self.current_question.map_or(0, |index| index + 1);
        if next < self.quiz.len() {
            self.open_question(next, schedule_message, &tunnel_finder);
            Ok(Outcome::Continue)
        } else {
            Ok(Outcome::Finished(Box::new(self.finish(&tunnel_finder))))
        }
    }

    /// Ends the quiz early
    ///
    /// Allowed from the lobby too, which finishes with an empty history.
    ///
    /// # Errors
    ///
    /// * `Error::Unauthorized` - Issued by someone other than the host
    /// * `Error::InvalidPhase` - The quiz already finished
    pub fn end_quiz<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        issuer: Id,
        tunnel_finder: F,
    ) -> Result<Outcome, Error> {
        self.authorize(issuer)?;
        if self.phase == Phase::Finished {
            return Err(Error::InvalidPhase);
        }
        Ok(Outcome::Finished(Box::new(self.finish(&tunnel_finder))))
    }

    /// Broadcasts the results of the current or an earlier question
    ///
    /// Does not change the phase or the current question.
    ///
    /// # Errors
    ///
    /// * `Error::Unauthorized` - Issued by someone other than the host
    /// * `Error::InvalidPhase` - No question was shown yet
    /// * `Error::QuestionOutOfRange` - The question has not been shown yet
    pub fn show_question_results<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        issuer: Id,
        question_index: usize,
        tunnel_finder: F,
    ) -> Result<(), Error> {
        self.authorize(issuer)?;
        let current = self.current_question.ok_or(Error::InvalidPhase)?;
        if question_index > current {
            return Err(Error::QuestionOutOfRange);
        }
        let message = self
            .question_results(question_index)
            .ok_or(Error::QuestionOutOfRange)?;
        self.announce(&message.into(), &tunnel_finder);
        Ok(())
    }

    /// Scores and records a participant's answer to the current question
    ///
    /// # Arguments
    ///
    /// * `issuer` - The answering participant
    /// * `question_id` - Question the participant believes is current
    /// * `answer` - Raw answer payload
    /// * `time_spent` - Time the participant reports having spent
    /// * `tunnel_finder` - Function to find communication tunnels
    ///
    /// # Errors
    ///
    /// * `Error::NotParticipant` - The issuer never joined
    /// * `Error::InvalidPhase` - The quiz has not started
    /// * `Error::StaleQuestion` - The question is not current, answering was
    ///   closed, or the quiz finished; nothing is recorded
    /// * `Error::AlreadyAnswered` - The participant already answered it
    pub fn submit_answer<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        issuer: Id,
        question_id: &str,
        answer: Answer,
        time_spent: Duration,
        tunnel_finder: F,
    ) -> Result<(), Error> {
        let Some(participant) = self.participants.get(issuer) else {
            return Err(Error::NotParticipant);
        };
        let index = match (self.phase, self.current_question) {
            (Phase::Lobby, _) | (_, None) => return Err(Error::InvalidPhase),
            (Phase::Finished, _) => return Err(Error::StaleQuestion),
            (Phase::Active, Some(index)) => index,
        };
        let question = self
            .quiz
            .questions
            .get(index)
            .ok_or(Error::StaleQuestion)?;
        if !self.answers_open || question.id != question_id {
            return Err(Error::StaleQuestion);
        }
        if participant.answer_for(question_id).is_some() {
            return Err(Error::AlreadyAnswered);
        }

        let verdict = scoring::evaluate(question, &answer, time_spent);
        if let (Some(selected), Some(counts)) = (answer.selected(), self.option_counts.get_mut(index))
        {
            for option in selected {
                if let Some(count) = counts.get_mut(option) {
                    *count += 1;
                }
            }
        }

        let total_score = self.participants.record_answer(
            issuer,
            &question.id,
            AnswerRecord {
                question_id: question.id.clone(),
                answer,
                is_correct: verdict.is_correct,
                points: verdict.points,
                time_spent,
            },
        )?;
        self.leaderboard
            .record(index, issuer, verdict.points, verdict.is_correct);

        Self::send_to(
            issuer,
            &UpdateMessage::AnswerSubmitted {
                is_correct: verdict.is_correct,
                points_awarded: verdict.points,
                total_score,
            }
            .into(),
            &tunnel_finder,
        );
        self.announce_host(
            &UpdateMessage::ParticipantAnswered {
                participant_id: issuer,
                is_correct: verdict.is_correct,
                points_awarded: verdict.points,
                total_score,
            }
            .into(),
            &tunnel_finder,
        );
        self.check_all_answered(&tunnel_finder);

        Ok(())
    }

    /// Starts a poll
    ///
    /// # Errors
    ///
    /// * `Error::Unauthorized` - Issued by someone other than the host
    /// * `Error::InvalidPhase` - The quiz finished
    /// * `Error::DuplicatePoll` - A poll is already running
    /// * `Error::InvalidPoll` - The definition was rejected
    pub fn start_poll<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        issuer: Id,
        definition: PollDefinition,
        tunnel_finder: F,
    ) -> Result<(), Error> {
        self.authorize(issuer)?;
        if self.phase == Phase::Finished {
            return Err(Error::InvalidPhase);
        }
        if self.poll.is_some() {
            return Err(Error::DuplicatePoll);
        }

        let poll = Poll::new(definition)?;
        let message = poll::UpdateMessage::PollStarted {
            question: poll.question().to_owned(),
            options: poll.options().to_vec(),
        };
        self.poll = Some(poll);
        self.announce(&message.into(), &tunnel_finder);
        Ok(())
    }

    /// Records a participant's poll response, replacing any earlier one
    ///
    /// # Errors
    ///
    /// * `Error::NotParticipant` - The issuer never joined
    /// * `Error::NoActivePoll` - No poll is running
    /// * `Error::UnknownOption` - The option is not part of the poll
    pub fn poll_response<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        issuer: Id,
        option: &str,
        tunnel_finder: F,
    ) -> Result<(), Error> {
        if !self.participants.contains(issuer) {
            return Err(Error::NotParticipant);
        }
        let poll = self.poll.as_mut().ok_or(Error::NoActivePoll)?;
        poll.respond(issuer, option)?;

        let message = poll::UpdateMessage::PollResponseReceived {
            participant_id: issuer,
            option: option.trim().to_owned(),
            response_count: poll.response_count(),
        };
        self.announce_host(&message.into(), &tunnel_finder);
        Ok(())
    }

    /// Ends the running poll and broadcasts its tally
    ///
    /// # Errors
    ///
    /// * `Error::Unauthorized` - Issued by someone other than the host
    /// * `Error::NoActivePoll` - No poll is running
    pub fn end_poll<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        issuer: Id,
        tunnel_finder: F,
    ) -> Result<(), Error> {
        self.authorize(issuer)?;
        let (question, tally) = self.poll.take().ok_or(Error::NoActivePoll)?.end();
        self.announce(
            &poll::UpdateMessage::PollEnded { question, tally }.into(),
            &tunnel_finder,
        );
        Ok(())
    }

    /// Handles a previously scheduled alarm
    ///
    /// Alarms for questions the session already moved past are ignored.
    pub fn receive_alarm<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        alarm: AlarmMessage,
        tunnel_finder: F,
    ) {
        match alarm {
            AlarmMessage::QuestionTimeout { index } => {
                if self.phase != Phase::Active
                    || self.current_question != Some(index)
                    || !self.answers_open
                {
                    return;
                }
                self.answers_open = false;
                tracing::debug!(code = %self.code, question = index, "answering closed");

                self.announce(
                    &UpdateMessage::AnsweringClosed {
                        question_index: index,
                    }
                    .into(),
                    &tunnel_finder,
                );

                let reveal = self
                    .quiz
                    .questions
                    .get(index)
                    .is_some_and(|question| question.reveal_results_on_timeout);
                if reveal {
                    if let Some(message) = self.question_results(index) {
                        self.announce(&message.into(), &tunnel_finder);
                    }
                }
            }
        }
    }

    /// Tells every participant the host left and closes their connections
    pub fn host_disconnected<T: Tunnel, F: Fn(Id) -> Option<T>>(&self, tunnel_finder: F) {
        tracing::info!(code = %self.code, "host disconnected");
        self.announce_participants(&UpdateMessage::HostDisconnected.into(), &tunnel_finder);
        for id in self.participants.ids() {
            if let Some(tunnel) = tunnel_finder(id) {
                tunnel.close();
            }
        }
    }
}

// Internal transitions
impl Session {
    fn open_question<T: Tunnel, F: Fn(Id) -> Option<T>, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        index: usize,
        mut schedule_message: S,
        tunnel_finder: &F,
    ) {
        let Some(payload) = self.quiz.payload(index) else {
            return;
        };
        let time_limit = payload.time_limit;

        self.current_question = Some(index);
        self.answers_open = true;
        self.all_answered_announced = false;
        tracing::debug!(code = %self.code, question = index, "question shown");

        let message = if index == 0 {
            UpdateMessage::QuizStarted(payload)
        } else {
            UpdateMessage::NextQuestion(payload)
        };
        self.announce(&message.into(), tunnel_finder);

        if let Some(limit) = time_limit {
            schedule_message(
                AlarmMessage::QuestionTimeout { index },
                limit + self.options.answer_grace,
            );
        }
    }

    fn finish<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, tunnel_finder: &F) -> SessionResults {
        self.phase = Phase::Finished;
        self.answers_open = false;
        self.poll = None;
        let finished_at = SystemTime::now();
        self.finished_at = Some(finished_at);
        tracing::info!(code = %self.code, participants = self.participants.len(), "quiz finished");

        let standings = Leaderboard::current(&self.participants);
        self.announce(
            &UpdateMessage::QuizFinished {
                leaderboard: standings.clone(),
            }
            .into(),
            tunnel_finder,
        );

        let stats = self.leaderboard.host_summary();
        self.announce_host(
            &UpdateMessage::Summary {
                stats: stats.clone(),
                participant_count: self.leaderboard.answering_participants(),
            }
            .into(),
            tunnel_finder,
        );

        for standing in &standings {
            Self::send_to(
                standing.id,
                &UpdateMessage::ParticipantSummary {
                    points: self.leaderboard.player_summary(standing.id),
                    score: standing.score,
                    position: standing.position,
                }
                .into(),
                tunnel_finder,
            );
        }

        SessionResults {
            code: self.code,
            quiz_title: self.quiz.title.clone(),
            host_id: self.host_identity.clone(),
            started_at: self.started_at,
            finished_at,
            participants: standings
                .into_iter()
                .map(|standing| ParticipantResult {
                    answers: self
                        .participants
                        .get(standing.id)
                        .map(|p| p.answers.clone())
                        .unwrap_or_default(),
                    standing,
                })
                .collect_vec(),
            stats,
        }
    }

    fn check_all_answered<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, tunnel_finder: &F) {
        let Some(index) = self.current_question else {
            return;
        };
        if self.phase != Phase::Active
            || !self.answers_open
            || self.all_answered_announced
            || self.participants.is_empty()
        {
            return;
        }
        let Some(question) = self.quiz.questions.get(index) else {
            return;
        };

        if self.participants.answered_count(&question.id) == self.participants.len() {
            self.all_answered_announced = true;
            self.announce_host(
                &UpdateMessage::AllAnswered {
                    question_index: index,
                }
                .into(),
                tunnel_finder,
            );
        }
    }

    fn question_results(&self, index: usize) -> Option<UpdateMessage> {
        let question = self.quiz.questions.get(index)?;
        Some(UpdateMessage::QuestionResults {
            question_index: index,
            correct_answers: question.correct_answers.clone(),
            option_counts: self.option_counts.get(index).cloned().unwrap_or_default(),
            stats: self.leaderboard.question_stats(index),
            leaderboard: Leaderboard::preview(&self.participants),
        })
    }
}

// Accessors
impl Session {
    /// Participant registry
    pub fn participants(&self) -> &Participants {
        &self.participants
    }

    /// Current question index, `-1` in the lobby
    pub fn current_question_index(&self) -> i64 {
        self.current_question
            .map_or(-1, |index| i64::try_from(index).unwrap_or(i64::MAX))
    }

    /// Whether a poll is running
    pub fn poll_active(&self) -> bool {
        self.poll.is_some()
    }

    /// Operator-facing snapshot
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            code: self.code,
            title: self.quiz.title.clone(),
            phase: self.phase,
            participant_count: self.participants.len(),
            current_question_index: self.current_question_index(),
            question_count: self.quiz.len(),
            poll_active: self.poll_active(),
        }
    }
}
