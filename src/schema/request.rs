/// Story request schema — the structured form input a generation run starts
/// from. Immutable once submitted; a new submission constructs a fresh one.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::language::Language;

/// Hard cap on the character roster, matching the form's add-control limit.
pub const MAX_CHARACTERS: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RosterError {
    #[error("character roster is full ({MAX_CHARACTERS} max)")]
    Full,
    #[error("character name must not be empty")]
    EmptyName,
    #[error("no character at index {0}")]
    OutOfRange(usize),
}

/// Ordered roster of 1..=5 non-empty character names.
///
/// Owns the cap logic so the add/remove controls in any frontend can simply
/// mirror `can_add()`. Serializes as a bare name array; deserialization goes
/// through the same cap validation as `push`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct CharacterRoster {
    names: Vec<String>,
}

impl TryFrom<Vec<String>> for CharacterRoster {
    type Error = RosterError;

    fn try_from(names: Vec<String>) -> Result<Self, RosterError> {
        let mut roster = CharacterRoster::new();
        for name in names {
            roster.push(name)?;
        }
        Ok(roster)
    }
}

impl From<CharacterRoster> for Vec<String> {
    fn from(roster: CharacterRoster) -> Self {
        roster.names
    }
}

impl CharacterRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a character name, preserving submission order. Whitespace-only
    /// names are rejected; adding beyond the cap is an error, not a panic.
    pub fn push(&mut self, name: impl Into<String>) -> Result<(), RosterError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RosterError::EmptyName);
        }
        if self.names.len() >= MAX_CHARACTERS {
            return Err(RosterError::Full);
        }
        self.names.push(name);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<String, RosterError> {
        if index >= self.names.len() {
            return Err(RosterError::OutOfRange(index));
        }
        Ok(self.names.remove(index))
    }

    /// Whether the add-control should be enabled.
    pub fn can_add(&self) -> bool {
        self.names.len() < MAX_CHARACTERS
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Roster joined for prompt interpolation, order preserved.
    pub fn joined(&self) -> String {
        self.names.join(", ")
    }
}

/// Everything the user supplied for one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryRequest {
    pub theme: String,
    pub setting: String,
    pub genre: String,
    pub language: Language,
    pub audience: String,
    pub writing_style: String,
    #[serde(default)]
    pub word_limit: Option<u32>,
    #[serde(default)]
    pub additional_details: Option<String>,
    pub characters: CharacterRoster,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_roster() -> CharacterRoster {
        let mut roster = CharacterRoster::new();
        for name in ["Amira", "Bilal", "Chandra", "Dara", "Elif"] {
            roster.push(name).unwrap();
        }
        roster
    }

    #[test]
    fn push_beyond_cap_is_rejected() {
        let mut roster = full_roster();
        assert!(!roster.can_add());
        assert_eq!(roster.push("Farid"), Err(RosterError::Full));
        assert_eq!(roster.len(), 5);
    }

    #[test]
    fn removing_below_cap_reopens_capacity() {
        let mut roster = full_roster();
        assert!(!roster.can_add());
        roster.remove(2).unwrap();
        assert!(roster.can_add());
        roster.push("Farid").unwrap();
        assert!(!roster.can_add());
    }

    #[test]
    fn blank_names_are_rejected() {
        let mut roster = CharacterRoster::new();
        assert_eq!(roster.push("   "), Err(RosterError::EmptyName));
        assert!(roster.is_empty());
    }

    #[test]
    fn order_is_preserved() {
        let mut roster = CharacterRoster::new();
        roster.push("Zed").unwrap();
        roster.push("Ana").unwrap();
        assert_eq!(roster.joined(), "Zed, Ana");
    }

    #[test]
    fn remove_out_of_range() {
        let mut roster = CharacterRoster::new();
        roster.push("Solo").unwrap();
        assert_eq!(roster.remove(3), Err(RosterError::OutOfRange(3)));
    }
}
