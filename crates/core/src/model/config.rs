use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::model::Modality;

pub const MIN_ITEM_COUNT: u32 = 1;
pub const MAX_ITEM_COUNT: u32 = 30;
pub const DEFAULT_QUIZ_COUNT: u32 = 5;
pub const DEFAULT_FLASHCARD_COUNT: u32 = 10;

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Undergrad,
    Med,
    Advanced,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Undergrad => "undergrad",
            Difficulty::Med => "med",
            Difficulty::Advanced => "advanced",
        }
    }

    /// Difficulty used when a start request does not name one.
    #[must_use]
    pub fn default_for(modality: Modality) -> Self {
        match modality {
            Modality::Clinical => Difficulty::Med,
            _ => Difficulty::Undergrad,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "undergrad" => Ok(Difficulty::Undergrad),
            "med" => Ok(Difficulty::Med),
            "advanced" => Ok(Difficulty::Advanced),
            _ => Err(ValidationError::UnknownDifficulty(s.to_string())),
        }
    }
}

//
// ─── SYSTEM FILTER ─────────────────────────────────────────────────────────────
//

/// Neuroanatomical system used to narrow generated content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemFilter {
    Limbic,
    Brainstem,
    Cortical,
    Cerebellar,
    Spinal,
    Vascular,
    CranialNerve,
    Developmental,
    Other,
}

impl SystemFilter {
    pub const ALL: [SystemFilter; 9] = [
        SystemFilter::Limbic,
        SystemFilter::Brainstem,
        SystemFilter::Cortical,
        SystemFilter::Cerebellar,
        SystemFilter::Spinal,
        SystemFilter::Vascular,
        SystemFilter::CranialNerve,
        SystemFilter::Developmental,
        SystemFilter::Other,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SystemFilter::Limbic => "limbic",
            SystemFilter::Brainstem => "brainstem",
            SystemFilter::Cortical => "cortical",
            SystemFilter::Cerebellar => "cerebellar",
            SystemFilter::Spinal => "spinal",
            SystemFilter::Vascular => "vascular",
            SystemFilter::CranialNerve => "cranial_nerve",
            SystemFilter::Developmental => "developmental",
            SystemFilter::Other => "other",
        }
    }
}

impl fmt::Display for SystemFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SystemFilter {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        SystemFilter::ALL
            .into_iter()
            .find(|f| f.as_str() == needle)
            .ok_or_else(|| ValidationError::UnknownSystem(s.to_string()))
    }
}

//
// ─── SESSION CONFIG ────────────────────────────────────────────────────────────
//

/// Parameters fixed when a session starts. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    topic: Option<String>,
    difficulty: Difficulty,
    system_filter: Option<SystemFilter>,
    item_count: Option<u32>,
}

impl SessionConfig {
    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn system_filter(&self) -> Option<SystemFilter> {
        self.system_filter
    }

    /// Requested number of items. Only set for quiz and flashcard sessions.
    #[must_use]
    pub fn item_count(&self) -> Option<u32> {
        self.item_count
    }
}

/// Unvalidated start parameters as supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct SessionConfigDraft {
    pub topic: Option<String>,
    pub difficulty: Option<String>,
    pub system_filter: Option<String>,
    pub item_count: Option<u32>,
}

impl SessionConfigDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: impl Into<String>) -> Self {
        self.difficulty = Some(difficulty.into());
        self
    }

    #[must_use]
    pub fn with_system_filter(mut self, system: impl Into<String>) -> Self {
        self.system_filter = Some(system.into());
        self
    }

    #[must_use]
    pub fn with_item_count(mut self, count: u32) -> Self {
        self.item_count = Some(count);
        self
    }

    /// Validate and normalize the draft for the given modality.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` when the difficulty or system filter is not a
    /// recognized value, the item count is outside `1..=30` (quiz/flashcards), or a
    /// teaching session has no topic.
    pub fn validate(self, modality: Modality) -> Result<SessionConfig, ValidationError> {
        let topic = normalize_optional(self.topic);

        let difficulty = match normalize_optional(self.difficulty) {
            Some(raw) => raw.parse()?,
            None => Difficulty::default_for(modality),
        };

        let system_filter = normalize_optional(self.system_filter)
            .map(|raw| raw.parse::<SystemFilter>())
            .transpose()?;

        if modality == Modality::Teaching && topic.is_none() {
            return Err(ValidationError::MissingTopic(modality));
        }

        let item_count = match modality {
            Modality::Quiz => Some(check_count(self.item_count.unwrap_or(DEFAULT_QUIZ_COUNT))?),
            Modality::Flashcards => Some(check_count(
                self.item_count.unwrap_or(DEFAULT_FLASHCARD_COUNT),
            )?),
            Modality::Teaching | Modality::Clinical => None,
        };

        Ok(SessionConfig {
            topic,
            difficulty,
            system_filter,
            item_count,
        })
    }
}

fn check_count(count: u32) -> Result<u32, ValidationError> {
    if (MIN_ITEM_COUNT..=MAX_ITEM_COUNT).contains(&count) {
        Ok(count)
    } else {
        Err(ValidationError::ItemCountOutOfRange {
            count,
            min: MIN_ITEM_COUNT,
            max: MAX_ITEM_COUNT,
        })
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}
