//! Answer evaluation and point calculation
//!
//! Scoring is a pure function of the question, the submitted answer and
//! the time the participant reports having spent. A correct answer earns
//! the question's base points plus a time bonus of up to half the base,
//! decaying linearly to nothing as the time limit is used up.

use std::{collections::BTreeSet, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    constants::{quiz::MAX_TIME_LIMIT, scoring::TIME_BONUS_RATIO},
    quiz::{Question, QuestionKind},
};

/// A raw answer as submitted by a participant
///
/// The shape follows the JSON value sent on the wire: a number selects one
/// option, an array selects several, and a string is a free-text answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    /// A single option index
    Index(usize),
    /// A set of option indices
    Indices(Vec<usize>),
    /// Free text
    Text(String),
}

impl Answer {
    /// The option indices selected by this answer, if it is a choice answer
    pub fn selected(&self) -> Option<BTreeSet<usize>> {
        match self {
            Self::Index(index) => Some(BTreeSet::from([*index])),
            Self::Indices(indices) => Some(indices.iter().copied().collect()),
            Self::Text(_) => None,
        }
    }
}

/// Outcome of scoring one answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    /// Whether the answer was judged correct
    pub is_correct: bool,
    /// Points awarded for it
    pub points: u64,
}

impl Verdict {
    /// An incorrect or unscored answer
    pub const WRONG: Self = Self {
        is_correct: false,
        points: 0,
    };
}

/// Checks whether `answer` is correct for `question`
///
/// Single-choice and true/false questions accept exactly one selected
/// option that is marked correct. Multiple-choice questions require the
/// selected set to equal the correct set; there is no partial credit.
/// Open-ended and poll questions are never correct.
pub fn is_correct(question: &Question, answer: &Answer) -> bool {
    if !question.kind.is_scored() {
        return false;
    }
    let Some(selected) = answer.selected() else {
        return false;
    };

    match question.kind {
        QuestionKind::SingleChoice | QuestionKind::TrueFalse => {
            selected.len() == 1
                && selected
                    .iter()
                    .all(|index| question.correct_answers.contains(index))
        }
        QuestionKind::MultipleChoice => selected == question.correct_answers,
        QuestionKind::OpenEnded | QuestionKind::Poll => false,
    }
}

/// Fraction of the time budget left when the answer was given
///
/// Returns a value in `[0, 1]`; questions without a time limit never earn a
/// bonus.
pub fn time_bonus_fraction(time_limit: Option<Duration>, time_spent: Duration) -> f64 {
    match time_limit {
        Some(limit) if !limit.is_zero() => {
            let limit = limit.as_secs_f64();
            ((limit - time_spent.as_secs_f64()) / limit).clamp(0., 1.)
        }
        _ => 0.,
    }
}

/// Points for a correct answer with the given bonus fraction
pub fn points_for(base_points: u64, bonus_fraction: f64) -> u64 {
    base_points + (base_points as f64 * TIME_BONUS_RATIO * bonus_fraction).round() as u64
}

/// Scores an answer
///
/// # Arguments
///
/// * `question` - The question being answered
/// * `answer` - The participant's raw answer
/// * `time_spent` - Time the participant took to answer
pub fn evaluate(question: &Question, answer: &Answer, time_spent: Duration) -> Verdict {
    if !is_correct(question, answer) {
        return Verdict::WRONG;
    }

    Verdict {
        is_correct: true,
        points: points_for(
            question.points,
            time_bonus_fraction(question.time_limit, time_spent),
        ),
    }
}

/// Converts a client-reported number of seconds into a duration
///
/// NaN and negative values count as zero. Anything above twice the longest
/// allowed time limit, infinity included, is capped there so it never earns
/// a bonus.
pub fn time_spent_from_secs(seconds: f64) -> Duration {
    let ceiling = (MAX_TIME_LIMIT * 2) as f64;
    if seconds.is_nan() || seconds <= 0. {
        Duration::ZERO
    } else {
        Duration::from_secs_f64(seconds.min(ceiling))
    }
}
