use std::fmt;

use super::Session;

/// Snapshot of how far a session has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub is_complete: bool,
}

/// Score of a graded session: points earned, points available, rounded percentage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreSummary {
    pub total: f64,
    pub max: f64,
    pub percent: u32,
}

impl fmt::Display for ScoreSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}/{:.1} ({}%)", self.total, self.max, self.percent)
    }
}

impl Session {
    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.item_count();
        let answered = self.answers().len();
        SessionProgress {
            total,
            answered,
            remaining: total.saturating_sub(answered),
            is_complete: self.is_complete(),
        }
    }

    /// `round(100 * score / items)` for quiz and flashcard sessions.
    #[must_use]
    pub fn display_score(&self) -> Option<u32> {
        self.score_summary().map(|summary| summary.percent)
    }

    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn score_summary(&self) -> Option<ScoreSummary> {
        let total = self.score()?;
        let max = self.item_count() as f64;
        if max <= 0.0 {
            return None;
        }
        let percent = (100.0 * total / max).round().clamp(0.0, 100.0) as u32;
        Some(ScoreSummary {
            total,
            max,
            percent,
        })
    }
}
