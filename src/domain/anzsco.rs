//! ANZSCO occupation codes.
//!
//! Shortage data is aggregated by the first four digits of the code, so the
//! validated form keeps the full input around but exposes the 4-digit prefix
//! used for keying and matching.

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// A validated ANZSCO occupation code: 4 to 6 ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnzscoCode(String);

impl AnzscoCode {
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let trimmed = input.trim();
        if !(4..=6).contains(&trimmed.len()) || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::validation("anzsco_code must be 4-6 digits"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 4-digit aggregation prefix.
    pub fn prefix4(&self) -> &str {
        &self.0[..4]
    }
}
