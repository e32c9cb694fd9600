//! Phone number type.
//!
//! The phone number is the identity of a user. It is a bare identifier: no
//! verification happens anywhere, so treat it as trivially spoofable.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input string is empty (after trimming).
    #[error("phone number cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("phone number must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character that is not a digit or `+`.
    #[error("phone number contains invalid character '{0}'")]
    InvalidCharacter(char),
}

/// A phone number used as user identity.
///
/// ## Constraints
///
/// - Surrounding whitespace is trimmed; inner spaces and dashes are removed
/// - Length: 1-20 characters after normalization
/// - Only ASCII digits, with an optional leading `+`
///
/// ## Examples
///
/// ```
/// use chefs_journal_core::PhoneNumber;
///
/// assert_eq!(PhoneNumber::parse(" 138-0013-8000 ").unwrap().as_str(), "13800138000");
/// assert!(PhoneNumber::parse("+8613800138000").is_ok());
///
/// assert!(PhoneNumber::parse("").is_err());
/// assert!(PhoneNumber::parse("call me").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Maximum length of a normalized phone number (E.164 plus slack).
    pub const MAX_LENGTH: usize = 20;

    /// Parse and normalize a `PhoneNumber`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, or contains anything
    /// other than digits, spaces, dashes and a leading `+`.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let mut normalized = String::with_capacity(s.len());
        for (i, c) in s.trim().chars().enumerate() {
            match c {
                '0'..='9' => normalized.push(c),
                '+' if i == 0 => normalized.push(c),
                ' ' | '-' => {}
                other => return Err(PhoneError::InvalidCharacter(other)),
            }
        }

        if normalized.is_empty() || normalized == "+" {
            return Err(PhoneError::Empty);
        }

        if normalized.len() > Self::MAX_LENGTH {
            return Err(PhoneError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        Ok(Self(normalized))
    }

    /// Returns the phone number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the last four digits (or the whole number if shorter).
    #[must_use]
    pub fn last_four(&self) -> &str {
        let start = self.0.len().saturating_sub(4);
        self.0.get(start..).unwrap_or(&self.0)
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for PhoneNumber {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for PhoneNumber {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Database values are assumed valid
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for PhoneNumber {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_separators() {
        let phone = PhoneNumber::parse("  138 0013-8000 ").unwrap();
        assert_eq!(phone.as_str(), "13800138000");
    }

    #[test]
    fn test_parse_leading_plus() {
        assert_eq!(
            PhoneNumber::parse("+44 20 7946 0958").unwrap().as_str(),
            "+442079460958"
        );
        assert!(matches!(
            PhoneNumber::parse("44+20"),
            Err(PhoneError::InvalidCharacter('+'))
        ));
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(PhoneNumber::parse(""), Err(PhoneError::Empty)));
        assert!(matches!(PhoneNumber::parse("  "), Err(PhoneError::Empty)));
        assert!(matches!(PhoneNumber::parse("+"), Err(PhoneError::Empty)));
    }

    #[test]
    fn test_parse_too_long() {
        assert!(matches!(
            PhoneNumber::parse(&"1".repeat(21)),
            Err(PhoneError::TooLong { .. })
        ));
    }

    #[test]
    fn test_last_four() {
        assert_eq!(PhoneNumber::parse("13800138000").unwrap().last_four(), "8000");
        assert_eq!(PhoneNumber::parse("12").unwrap().last_four(), "12");
    }

    #[test]
    fn test_deserialize_validates() {
        let phone: PhoneNumber = serde_json::from_str("\"139-0000-1111\"").unwrap();
        assert_eq!(phone.as_str(), "13900001111");
        assert!(serde_json::from_str::<PhoneNumber>("\"abc\"").is_err());
    }
}
