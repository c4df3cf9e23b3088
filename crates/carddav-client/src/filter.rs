//! Filter model: typed match predicates per contact property

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CardDavError, Result};

/// Text match semantics for a single property filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchType {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
}

impl MatchType {
    /// Wire spelling used in the `match-type` attribute
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::Contains => "contains",
            Self::StartsWith => "starts-with",
            Self::EndsWith => "ends-with",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchType {
    type Err = CardDavError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "equals" => Ok(Self::Equals),
            "contains" => Ok(Self::Contains),
            "starts-with" => Ok(Self::StartsWith),
            "ends-with" => Ok(Self::EndsWith),
            other => Err(CardDavError::Validation(format!(
                "unsupported match type: {other}"
            ))),
        }
    }
}

/// How multiple property filters combine in one query.
///
/// `All` serializes as `test="allof"` and `Any` as `test="anyof"`,
/// following RFC 6352.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    All,
    Any,
}

impl FilterMode {
    /// Value of the filter element's `test` attribute
    pub fn test_attr(&self) -> &'static str {
        match self {
            Self::All => "allof",
            Self::Any => "anyof",
        }
    }
}

impl FromStr for FilterMode {
    type Err = CardDavError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "and" | "all" | "allof" => Ok(Self::All),
            "or" | "any" | "anyof" => Ok(Self::Any),
            other => Err(CardDavError::Validation(format!(
                "unsupported filter mode: {other}"
            ))),
        }
    }
}

/// A single property predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    pub match_type: MatchType,
    pub text: String,
}

/// Ordered property → predicate map plus a combination mode.
///
/// Setting a filter for a property that already has one overwrites the
/// prior predicate; the property keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    entries: Vec<(String, FieldFilter)>,
    mode: FilterMode,
}

impl FilterSet {
    /// Create an empty filter set with the default `All` mode
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty filter set with an explicit combination mode
    pub fn with_mode(mode: FilterMode) -> Self {
        Self {
            entries: Vec::new(),
            mode,
        }
    }

    /// Set a predicate for `property`, parsing the match type from its wire
    /// spelling. An unknown match type fails with a validation error and
    /// leaves the set untouched.
    pub fn set_filter(&mut self, property: &str, match_type: &str, text: &str) -> Result<()> {
        let match_type = match_type.parse()?;
        self.insert(property, match_type, text);
        Ok(())
    }

    /// Typed variant of [`set_filter`](Self::set_filter); cannot fail
    pub fn insert(&mut self, property: &str, match_type: MatchType, text: &str) {
        let filter = FieldFilter {
            match_type,
            text: text.to_string(),
        };
        match self.entries.iter_mut().find(|(name, _)| name == property) {
            Some((_, existing)) => *existing = filter,
            None => self.entries.push((property.to_string(), filter)),
        }
    }

    /// Set the combination mode from a user-facing spelling:
    /// `AND`/`ALL` select all-of, `OR`/`ANY` select any-of.
    pub fn set_filter_type(&mut self, mode: &str) -> Result<()> {
        self.mode = mode.parse()?;
        Ok(())
    }

    /// Set the combination mode directly
    pub fn set_mode(&mut self, mode: FilterMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn get(&self, property: &str) -> Option<&FieldFilter> {
        self.entries
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, filter)| filter)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate configured predicates in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldFilter)> {
        self.entries
            .iter()
            .map(|(name, filter)| (name.as_str(), filter))
    }
}
