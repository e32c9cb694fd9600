//! Family identifier: the 8-character code members type in to join.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`FamilyId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FamilyIdError {
    /// The code does not have exactly [`FamilyId::LENGTH`] characters.
    #[error("family id must be exactly {expected} characters (got {actual})")]
    WrongLength {
        /// Required length.
        expected: usize,
        /// Length of the input after trimming.
        actual: usize,
    },
    /// The code contains a non-alphanumeric character.
    #[error("family id contains invalid character '{0}'")]
    InvalidCharacter(char),
}

/// Identifier of a family (the tenant boundary for shared data).
///
/// Codes are case-insensitive on input and stored upper-case.
///
/// ```
/// use chefs_journal_core::FamilyId;
///
/// let id = FamilyId::parse(" 3f2a9c1b ").unwrap();
/// assert_eq!(id.as_str(), "3F2A9C1B");
/// assert!(FamilyId::parse("short").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct FamilyId(String);

impl FamilyId {
    /// Number of characters in a family code.
    pub const LENGTH: usize = 8;

    /// Parse a family code, trimming whitespace and upper-casing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is not 8 ASCII alphanumeric characters.
    pub fn parse(s: &str) -> Result<Self, FamilyIdError> {
        let trimmed = s.trim();
        if let Some(bad) = trimmed.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(FamilyIdError::InvalidCharacter(bad));
        }
        if trimmed.len() != Self::LENGTH {
            return Err(FamilyIdError::WrongLength {
                expected: Self::LENGTH,
                actual: trimmed.chars().count(),
            });
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Generate a new random family code from a UUID v4.
    #[must_use]
    pub fn generate() -> Self {
        let simple = uuid::Uuid::new_v4().simple().to_string();
        let code: String = simple.chars().take(Self::LENGTH).collect();
        Self(code.to_ascii_uppercase())
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FamilyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for FamilyId {
    type Err = FamilyIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FamilyId {
    type Error = FamilyIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FamilyId> for String {
    fn from(id: FamilyId) -> Self {
        id.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for FamilyId {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for FamilyId {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for FamilyId {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
