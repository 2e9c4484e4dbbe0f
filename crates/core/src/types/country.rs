//! ISO 3166-1 alpha-2 country code type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`CountryCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CountryCodeError {
    /// The input is not exactly two characters.
    #[error("country code must be exactly 2 letters (got {0})")]
    InvalidLength(usize),
    /// The input contains non-alphabetic characters.
    #[error("country code must be alphabetic")]
    NotAlphabetic,
}

/// A two-letter country code such as `US`, `IN` or `NP`.
///
/// Input is normalized to upper case.
///
/// ```
/// use iwishbag_core::CountryCode;
///
/// assert_eq!(CountryCode::parse("in").unwrap().as_str(), "IN");
/// assert!(CountryCode::parse("IND").is_err());
/// assert!(CountryCode::parse("1N").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
    /// Parse a `CountryCode` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not two ASCII letters.
    pub fn parse(s: &str) -> Result<Self, CountryCodeError> {
        let trimmed = s.trim();
        let len = trimmed.chars().count();
        if len != 2 {
            return Err(CountryCodeError::InvalidLength(len));
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CountryCodeError::NotAlphabetic);
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CountryCode {
    type Err = CountryCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CountryCode {
    type Error = CountryCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CountryCode> for String {
    fn from(code: CountryCode) -> Self {
        code.0
    }
}
