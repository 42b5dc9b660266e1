//! Public types for the Sibyl API.

mod budget;
mod fingerprint;
mod reading;
mod request;

pub use budget::StreamBudget;
pub use fingerprint::normalize_question;
pub use reading::Reading;
pub use request::{DrawnCard, ReadingRequest};
