//! Data schema: story requests, character rosters, and language metadata.

pub mod language;
pub mod request;
