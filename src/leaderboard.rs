//! Leaderboard and scoring history
//!
//! Running totals live on each [`Participant`]; this module turns them into
//! ranked standings and keeps a per-question history of awarded points so
//! question results and end-of-quiz summaries still count participants
//! who have since left.

use itertools::Itertools;
use serde::Serialize;

use super::{
    Preview,
    participant::{Id, Participant, Participants},
};

/// One ranked leaderboard entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    /// Participant id
    pub id: Id,
    /// Display name
    pub name: String,
    /// Total score
    pub score: u64,
    /// Position in the ranking (1-indexed)
    pub position: usize,
}

/// Aggregate outcome of one question
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStats {
    /// Participants who answered correctly
    pub correct: usize,
    /// Participants who answered at all
    pub answered: usize,
}

/// Per-question record of awarded points
#[derive(Debug, Default)]
pub struct Leaderboard {
    /// For each question index: (participant, points, correct) in submission order
    points_earned: Vec<Vec<(Id, u64, bool)>>,
}

impl Leaderboard {
    /// Creates an empty history for a quiz with `question_count` questions
    pub fn new(question_count: usize) -> Self {
        Self {
            points_earned: vec![Vec::new(); question_count],
        }
    }

    /// Records the outcome of one answer
    pub fn record(&mut self, question_index: usize, id: Id, points: u64, correct: bool) {
        if let Some(entries) = self.points_earned.get_mut(question_index) {
            entries.push((id, points, correct));
        }
    }

    /// Ranks the given participants, highest score first
    ///
    /// Ties keep join order and share no position: every entry gets a
    /// distinct 1-indexed position.
    pub fn standings<'a, I>(ranked: I) -> Vec<Standing>
    where
        I: IntoIterator<Item = &'a Participant>,
    {
        ranked
            .into_iter()
            .enumerate()
            .map(|(i, participant)| Standing {
                id: participant.id,
                name: participant.name.clone(),
                score: participant.score,
                position: i + 1,
            })
            .collect_vec()
    }

    /// Current standings of the present participants
    pub fn current(participants: &Participants) -> Vec<Standing> {
        Self::standings(participants.leaderboard())
    }

    /// Leading standings for display
    pub fn preview(participants: &Participants) -> Preview<Standing> {
        let standings = Self::current(participants);
        let total = standings.len();
        Preview::of(standings, total)
    }

    /// Statistics for one question
    pub fn question_stats(&self, question_index: usize) -> QuestionStats {
        self.points_earned
            .get(question_index)
            .map(|entries| QuestionStats {
                correct: entries.iter().filter(|(_, _, correct)| *correct).count(),
                answered: entries.len(),
            })
            .unwrap_or_default()
    }

    /// Statistics for every question, in quiz order
    pub fn host_summary(&self) -> Vec<QuestionStats> {
        (0..self.points_earned.len())
            .map(|i| self.question_stats(i))
            .collect_vec()
    }

    /// Points a participant earned on each question, zero where unanswered
    pub fn player_summary(&self, id: Id) -> Vec<u64> {
        self.points_earned
            .iter()
            .map(|entries| {
                entries
                    .iter()
                    .find(|(entry_id, _, _)| *entry_id == id)
                    .map_or(0, |(_, points, _)| *points)
            })
            .collect_vec()
    }

    /// Number of distinct participants who ever answered
    pub fn answering_participants(&self) -> usize {
        self.points_earned
            .iter()
            .flatten()
            .map(|(id, _, _)| *id)
            .unique()
            .count()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{constants::session::LIST_LIMIT, participant::AnswerRecord, scoring::Answer};

    fn answer(participants: &mut Participants, id: Id, question_id: &str, points: u64) {
        participants
            .record_answer(
                id,
                question_id,
                AnswerRecord {
                    question_id: question_id.to_string(),
                    answer: Answer::Index(0),
                    is_correct: points > 0,
                    points,
                    time_spent: Duration::ZERO,
                },
            )
            .unwrap();
    }

    #[test]
    fn test_standings_positions() {
        let mut participants = Participants::default();
        let a = Id::new();
        let b = Id::new();
        let c = Id::new();
        participants.join(a, "A").unwrap();
        participants.join(b, "B").unwrap();
        participants.join(c, "C").unwrap();
        answer(&mut participants, b, "q1", 800);
        answer(&mut participants, c, "q1", 800);

        let standings = Leaderboard::current(&participants);
        assert_eq!(
            standings
                .iter()
                .map(|s| (s.name.as_str(), s.score, s.position))
                .collect_vec(),
            vec![("B", 800, 1), ("C", 800, 2), ("A", 0, 3)]
        );
    }

    #[test]
    fn test_preview_keeps_total() {
        let mut participants = Participants::default();
        for i in 0..(LIST_LIMIT + 5) {
            participants.join(Id::new(), &format!("P{i}")).unwrap();
        }
        let preview = Leaderboard::preview(&participants);
        assert_eq!(preview.total, LIST_LIMIT + 5);
        assert_eq!(preview.items.len(), LIST_LIMIT);
        assert_eq!(preview.items[0].position, 1);
    }

    #[test]
    fn test_question_stats_and_summaries() {
        let mut leaderboard = Leaderboard::new(2);
        let a = Id::new();
        let b = Id::new();
        leaderboard.record(0, a, 1500, true);
        leaderboard.record(0, b, 0, false);
        leaderboard.record(1, b, 1200, true);
        leaderboard.record(5, b, 1200, true);

        assert_eq!(
            leaderboard.question_stats(0),
            QuestionStats {
                correct: 1,
                answered: 2
            }
        );
        assert_eq!(leaderboard.question_stats(9), QuestionStats::default());
        assert_eq!(leaderboard.host_summary().len(), 2);
        assert_eq!(leaderboard.player_summary(a), vec![1500, 0]);
        assert_eq!(leaderboard.player_summary(b), vec![0, 1200]);
        assert_eq!(leaderboard.answering_participants(), 2);
    }
}
