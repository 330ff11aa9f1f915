use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four study modalities. At most one session per modality is live at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Quiz,
    Teaching,
    Clinical,
    Flashcards,
}

impl Modality {
    pub const ALL: [Modality; 4] = [
        Modality::Quiz,
        Modality::Teaching,
        Modality::Clinical,
        Modality::Flashcards,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Modality::Quiz => "quiz",
            Modality::Teaching => "teaching",
            Modality::Clinical => "clinical",
            Modality::Flashcards => "flashcards",
        }
    }

    /// Quiz and flashcards walk a fixed item list with a gated cursor and a score.
    #[must_use]
    pub fn is_graded(self) -> bool {
        matches!(self, Modality::Quiz | Modality::Flashcards)
    }

    /// Teaching and clinical sessions are append-only conversations.
    #[must_use]
    pub fn is_conversational(self) -> bool {
        !self.is_graded()
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownModality(pub String);

impl fmt::Display for UnknownModality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown modality: {}", self.0)
    }
}

impl std::error::Error for UnknownModality {}

impl FromStr for Modality {
    type Err = UnknownModality;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Modality::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownModality(s.to_string()))
    }
}

/// Lifecycle of a session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    Active,
    Complete,
}

impl SessionStatus {
    #[must_use]
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::NotStarted, SessionStatus::Active)
                | (SessionStatus::Active, SessionStatus::Complete)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modality_parses_its_own_name() {
        for modality in Modality::ALL {
            assert_eq!(modality.as_str().parse::<Modality>().unwrap(), modality);
        }
        assert!("essay".parse::<Modality>().is_err());
    }

    #[test]
    fn status_only_moves_forward() {
        assert!(SessionStatus::NotStarted.can_transition_to(SessionStatus::Active));
        assert!(SessionStatus::Active.can_transition_to(SessionStatus::Complete));
        assert!(!SessionStatus::Complete.can_transition_to(SessionStatus::Active));
        assert!(!SessionStatus::Active.can_transition_to(SessionStatus::NotStarted));
    }
}
