//! Search intent taxonomy and classification.
//!
//! Every keyword is labeled with a top-level [`Intent`] and a [`SubIntent`].
//! Rules run first; the embedding fallback only sees keywords no rule
//! matched.

mod classifier;

pub use classifier::{IntentClassifier, SEMANTIC_THRESHOLD};

use serde::{Deserialize, Serialize};

/// Top-level search intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Transactional,
    Informational,
    CommercialInvestigation,
    Navigational,
    #[default]
    Uncategorized,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Transactional => "TRANSACTIONAL",
            Intent::Informational => "INFORMATIONAL",
            Intent::CommercialInvestigation => "COMMERCIAL_INVESTIGATION",
            Intent::Navigational => "NAVIGATIONAL",
            Intent::Uncategorized => "UNCATEGORIZED",
        }
    }
}

/// Second-level intent; each belongs to exactly one [`Intent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubIntent {
    Buy,
    Price,
    Discount,
    Definition,
    Guide,
    Knowledge,
    Review,
    Comparison,
    BestList,
    Location,
    Brand,
    Download,
    #[default]
    None,
}

impl SubIntent {
    /// Parent intent of this sub-intent.
    pub fn parent(&self) -> Intent {
        match self {
            SubIntent::Buy | SubIntent::Price | SubIntent::Discount => Intent::Transactional,
            SubIntent::Definition | SubIntent::Guide | SubIntent::Knowledge => {
                Intent::Informational
            }
            SubIntent::Review | SubIntent::Comparison | SubIntent::BestList => {
                Intent::CommercialInvestigation
            }
            SubIntent::Location | SubIntent::Brand | SubIntent::Download => Intent::Navigational,
            SubIntent::None => Intent::Uncategorized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubIntent::Buy => "BUY",
            SubIntent::Price => "PRICE",
            SubIntent::Discount => "DISCOUNT",
            SubIntent::Definition => "DEFINITION",
            SubIntent::Guide => "GUIDE",
            SubIntent::Knowledge => "KNOWLEDGE",
            SubIntent::Review => "REVIEW",
            SubIntent::Comparison => "COMPARISON",
            SubIntent::BestList => "BEST_LIST",
            SubIntent::Location => "LOCATION",
            SubIntent::Brand => "BRAND",
            SubIntent::Download => "DOWNLOAD",
            SubIntent::None => "NONE",
        }
    }
}

/// Intent pair attached to a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct IntentLabel {
    pub intent: Intent,
    pub sub_intent: SubIntent,
}

impl IntentLabel {
    /// Label for a sub-intent under its parent.
    pub fn of(sub_intent: SubIntent) -> Self {
        Self {
            intent: sub_intent.parent(),
            sub_intent,
        }
    }

    /// `UNCATEGORIZED` / `NONE`.
    pub fn uncategorized() -> Self {
        Self::default()
    }
}
