//! Configuration constants for the quiz session coordinator
//!
//! This module contains the limits and tuning values used throughout the
//! coordinator to validate hosted quizzes, bound session sizes and keep
//! the scoring formula consistent.

/// Quiz snapshot limits, checked when a quiz is hosted
pub mod quiz {
    /// Maximum length of a quiz title in characters
    pub const MAX_TITLE_LENGTH: usize = 200;
    /// Maximum length of a quiz description in characters
    pub const MAX_DESCRIPTION_LENGTH: usize = 2000;
    /// Maximum number of questions in a single quiz
    pub const MAX_QUESTION_COUNT: usize = 100;
    /// Maximum length of a question identifier
    pub const MAX_QUESTION_ID_LENGTH: usize = 64;
    /// Maximum length of a question prompt
    pub const MAX_PROMPT_LENGTH: usize = 500;
    /// Maximum number of options on a choice question
    pub const MAX_OPTION_COUNT: usize = 8;
    /// Maximum length of a single option label
    pub const MAX_OPTION_LENGTH: usize = 200;
    /// Minimum time limit in seconds for answering a question
    pub const MIN_TIME_LIMIT: u64 = 5;
    /// Maximum time limit in seconds for answering a question
    pub const MAX_TIME_LIMIT: u64 = 240;
    /// Maximum base points for a single question
    pub const MAX_POINTS: u64 = 10_000;
}

/// Live session limits
pub mod session {
    /// Maximum number of participants in a single session
    pub const MAX_PARTICIPANT_COUNT: usize = 1000;
    /// Maximum length of a display name in bytes
    pub const MAX_NAME_LENGTH: usize = 30;
    /// Seconds added to a question's time limit before the server closes answering
    pub const DEFAULT_ANSWER_GRACE: u64 = 2;
    /// Number of entries shown in truncated participant and leaderboard lists
    pub const LIST_LIMIT: usize = 50;
}

/// Scoring constants
pub mod scoring {
    /// Share of the base points available as a bonus for an instant answer
    pub const TIME_BONUS_RATIO: f64 = 0.5;
}

/// Session code constants
pub mod code {
    /// Smallest code value (displayed as six digits)
    pub const MIN_VALUE: u32 = 100_000;
    /// One past the largest code value
    pub const MAX_VALUE: u32 = 1_000_000;
    /// Number of random draws before code allocation gives up
    pub const DRAW_ATTEMPTS: usize = 64;
}

/// Poll limits
pub mod poll {
    /// Maximum length of a poll question
    pub const MAX_QUESTION_LENGTH: usize = 200;
    /// Maximum number of poll options
    pub const MAX_OPTION_COUNT: usize = 8;
    /// Maximum length of a poll option
    pub const MAX_OPTION_LENGTH: usize = 100;
}
