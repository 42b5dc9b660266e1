//! Interpretation request types

use serde::{Deserialize, Serialize};

use crate::{Result, SibylError};

/// One card drawn into a spread position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawnCard {
    pub id: String,
    pub name: String,
    /// Spread slot the card landed in. Significant to meaning: the same
    /// cards in different positions are a different reading.
    pub position: u32,
}

impl DrawnCard {
    pub fn new(id: impl Into<String>, name: impl Into<String>, position: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            position,
        }
    }
}

/// An inbound interpretation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingRequest {
    /// Querent's question. May be empty for open readings.
    #[serde(default)]
    pub question: String,
    pub cards: Vec<DrawnCard>,
    pub spread_id: String,
    pub layout_type: u32,
    pub locale: String,
}

impl ReadingRequest {
    pub fn new(
        spread_id: impl Into<String>,
        layout_type: u32,
        locale: impl Into<String>,
        cards: Vec<DrawnCard>,
    ) -> Self {
        Self {
            question: String::new(),
            cards,
            spread_id: spread_id.into(),
            layout_type,
            locale: locale.into(),
        }
    }

    /// Set the querent's question.
    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.question = question.into();
        self
    }

    /// Check the request is interpretable. A reading needs at least one
    /// card; everything else has a usable degenerate form.
    pub fn validate(&self) -> Result<()> {
        if self.cards.is_empty() {
            return Err(SibylError::Validation(
                "a reading requires at least one card".to_string(),
            ));
        }
        Ok(())
    }
}
