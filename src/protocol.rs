//! Inbound wire protocol
//!
//! Every client frame is a JSON object `{"event": "<name>", "data": {...}}`.
//! Frames are parsed into [`IncomingMessage`] at the gateway boundary, so
//! the state machine only ever sees well-formed requests.

use serde::Deserialize;

use super::{poll::PollDefinition, quiz::Quiz, scoring::Answer, session_code::SessionCode};

/// A request sent by a host or a participant
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
#[serde(rename_all_fields = "camelCase")]
pub enum IncomingMessage {
    /// (HOST) Create a session for a quiz
    HostQuiz {
        /// Identifier of the quiz in the quiz store
        quiz_id: String,
        /// Opaque identity of the host account
        host_id: String,
        /// Snapshot to play; loaded from the store when omitted
        #[serde(default, rename = "quizSnapshot")]
        quiz: Option<Quiz>,
    },
    /// (HOST) Leave the lobby and show the first question
    StartQuiz {
        /// Target session
        code: SessionCode,
    },
    /// (HOST) Show the next question or finish
    NextQuestion {
        /// Target session
        code: SessionCode,
    },
    /// (HOST) Broadcast the results of a question
    ShowQuestionResults {
        /// Target session
        code: SessionCode,
        /// Question to show results for
        question_index: usize,
    },
    /// (HOST) Finish the quiz early
    EndQuiz {
        /// Target session
        code: SessionCode,
    },
    /// (HOST) Start a poll
    StartPoll {
        /// Target session
        code: SessionCode,
        /// The poll question and options
        poll: PollDefinition,
    },
    /// (HOST) End the running poll
    EndPoll {
        /// Target session
        code: SessionCode,
    },
    /// (PARTICIPANT) Join a lobby
    JoinQuiz {
        /// Target session
        code: SessionCode,
        /// Name shown to the host and on the leaderboard
        display_name: String,
    },
    /// (PARTICIPANT) Answer the current question
    SubmitAnswer {
        /// Target session
        code: SessionCode,
        /// Question being answered
        question_id: String,
        /// Raw answer
        answer: Answer,
        /// Time the participant took to answer
        #[serde(default)]
        time_spent_seconds: f64,
    },
    /// (PARTICIPANT) Respond to the running poll
    PollResponse {
        /// Target session
        code: SessionCode,
        /// Chosen option label
        option: String,
    },
}

impl IncomingMessage {
    /// Wire name of the event, used when reporting a rejection
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::HostQuiz { .. } => "host-quiz",
            Self::StartQuiz { .. } => "start-quiz",
            Self::NextQuestion { .. } => "next-question",
            Self::ShowQuestionResults { .. } => "show-question-results",
            Self::EndQuiz { .. } => "end-quiz",
            Self::StartPoll { .. } => "start-poll",
            Self::EndPoll { .. } => "end-poll",
            Self::JoinQuiz { .. } => "join-quiz",
            Self::SubmitAnswer { .. } => "submit-answer",
            Self::PollResponse { .. } => "poll-response",
        }
    }

    /// Session the request targets, if it targets an existing one
    pub fn code(&self) -> Option<SessionCode> {
        match self {
            Self::HostQuiz { .. } => None,
            Self::StartQuiz { code }
            | Self::NextQuestion { code }
            | Self::ShowQuestionResults { code, .. }
            | Self::EndQuiz { code }
            | Self::StartPoll { code, .. }
            | Self::EndPoll { code }
            | Self::JoinQuiz { code, .. }
            | Self::SubmitAnswer { code, .. }
            | Self::PollResponse { code, .. } => Some(*code),
        }
    }

    /// Parses a text frame
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the frame is not a known event.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_quiz_with_snapshot() {
        let message = IncomingMessage::parse(
            r#"{"event":"host-quiz","data":{"quizId":"q-1","hostId":"owner","quizSnapshot":{
                "title":"T","questions":[{"id":"a","prompt":"P","type":"true-false",
                "options":["True","False"],"correctAnswers":[0],"points":100}]}}}"#,
        )
        .unwrap();

        let IncomingMessage::HostQuiz {
            quiz_id,
            host_id,
            quiz,
        } = message
        else {
            panic!("expected host-quiz");
        };
        assert_eq!(quiz_id, "q-1");
        assert_eq!(host_id, "owner");
        assert_eq!(quiz.unwrap().questions.len(), 1);
    }

    #[test]
    fn test_parse_host_quiz_without_snapshot() {
        let message =
            IncomingMessage::parse(r#"{"event":"host-quiz","data":{"quizId":"q-1","hostId":"h"}}"#)
                .unwrap();
        assert!(matches!(message, IncomingMessage::HostQuiz { quiz: None, .. }));
        assert_eq!(message.code(), None);
    }

    #[test]
    fn test_parse_participant_events() {
        let join = IncomingMessage::parse(
            r#"{"event":"join-quiz","data":{"code":"123456","displayName":"Alice"}}"#,
        )
        .unwrap();
        assert_eq!(join.event_name(), "join-quiz");
        assert_eq!(join.code(), Some(SessionCode::try_from(123_456).unwrap()));

        let answer = IncomingMessage::parse(
            r#"{"event":"submit-answer","data":{"code":"123456","questionId":"q1","answer":[0,2],"timeSpentSeconds":3.5}}"#,
        )
        .unwrap();
        let IncomingMessage::SubmitAnswer {
            answer,
            time_spent_seconds,
            ..
        } = answer
        else {
            panic!("expected submit-answer");
        };
        assert_eq!(answer, Answer::Indices(vec![0, 2]));
        assert!((time_spent_seconds - 3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_start_poll() {
        let message = IncomingMessage::parse(
            r#"{"event":"start-poll","data":{"code":"123456","poll":{"question":"Tea?","options":["Yes","No"]}}}"#,
        )
        .unwrap();
        let IncomingMessage::StartPoll { poll, .. } = message else {
            panic!("expected start-poll");
        };
        assert_eq!(poll.options, vec!["Yes", "No"]);
    }

    #[test]
    fn test_unknown_or_malformed_events_rejected() {
        assert!(IncomingMessage::parse(r#"{"event":"reboot","data":{}}"#).is_err());
        assert!(IncomingMessage::parse(r#"{"event":"start-quiz","data":{"code":"12"}}"#).is_err());
        assert!(IncomingMessage::parse("not json").is_err());
    }
}
