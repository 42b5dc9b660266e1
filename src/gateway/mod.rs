//! Request orchestration.
//!
//! [`Sibyl`] is the entry point: configure a [`SibylBuilder`], build an
//! [`Oracle`], and call [`Oracle::interpret`] once per incoming request.
//! The oracle owns the admission limiter, the coalescing response cache,
//! the narrative provider handle, and the metrics exporter.

mod builder;
mod oracle;

pub use builder::{Sibyl, SibylBuilder};
pub use oracle::Oracle;
