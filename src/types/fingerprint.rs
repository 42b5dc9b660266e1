//! Request fingerprinting.
//!
//! Two interpretation requests that mean the same thing must hash to the
//! same fingerprint so the response cache can deduplicate and coalesce
//! them. Every component is length-prefixed before hashing so no choice
//! of separator characters inside a field can alias two different
//! requests.

use sha2::{Digest, Sha256};

use super::request::ReadingRequest;

/// Normalize a querent's question for fingerprinting: trim and collapse
/// every internal whitespace run to a single space. Case is preserved;
/// only whitespace is incidental.
pub fn normalize_question(question: &str) -> String {
    question.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn update_component(hasher: &mut Sha256, component: &[u8]) {
    hasher.update((component.len() as u64).to_le_bytes());
    hasher.update(component);
}

impl ReadingRequest {
    /// Deterministic hex SHA-256 fingerprint over the normalized request:
    /// card ids in position order, spread id, layout type, locale, and
    /// the normalized question.
    pub fn fingerprint(&self) -> String {
        let mut cards: Vec<_> = self.cards.iter().collect();
        cards.sort_by_key(|card| card.position);

        let mut hasher = Sha256::new();
        update_component(&mut hasher, self.spread_id.as_bytes());
        hasher.update(self.layout_type.to_le_bytes());
        update_component(&mut hasher, self.locale.as_bytes());
        update_component(&mut hasher, normalize_question(&self.question).as_bytes());
        for card in cards {
            update_component(&mut hasher, card.id.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}
