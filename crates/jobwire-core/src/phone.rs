//! Phone number normalization.
//!
//! Recipients are keyed by their phone number in canonical form: digits
//! only, country code first, no `+` (E.164 without the prefix). This is the
//! format the WhatsApp API expects and the one stored in the send ledger.

use std::fmt;

use serde::Serialize;

/// Shortest accepted number, in digits.
const MIN_DIGITS: usize = 10;

/// Longest accepted number, in digits (E.164 maximum).
const MAX_DIGITS: usize = 15;

/// Reasons a raw phone number is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhoneError {
    /// Input was empty or had no digits.
    #[error("Phone number is empty")]
    Empty,

    /// Digit count outside the accepted range.
    #[error("Phone number length {0} is invalid (expected 10-15 digits)")]
    Length(usize),
}

/// A phone number in canonical digits-only form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Normalizes a raw phone number.
    ///
    /// Every non-digit character is stripped, so `+1 (555) 123-4567`
    /// becomes `15551234567`.
    ///
    /// # Errors
    ///
    /// Returns an error if no digits remain or the digit count is outside
    /// 10-15.
    pub fn parse(raw: &str) -> Result<Self, PhoneError> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

        if digits.is_empty() {
            return Err(PhoneError::Empty);
        }
        if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits.len()) {
            return Err(PhoneError::Length(digits.len()));
        }

        Ok(Self(digits))
    }

    /// Wraps an already-canonical value read back from storage.
    pub(crate) const fn from_canonical(digits: String) -> Self {
        Self(digits)
    }

    /// Returns the canonical digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the number masked for logs.
    #[must_use]
    pub fn masked(&self) -> String {
        mask_phone(&self.0)
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Masks a phone number, keeping the first two and last two characters.
///
/// Values shorter than four characters are fully masked.
#[must_use]
pub fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    if chars.len() < 4 {
        return "****".to_string();
    }

    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}...{tail}")
}
