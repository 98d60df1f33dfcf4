//! Small shared utilities: identifiers and serde helpers.

pub mod ids;
pub mod serde_helpers;

pub use ids::MessageId;
