//! Identifiers for conversation participants.
//!
//! A participant is either a backend account (numeric [`AccountId`]) or an
//! identity-provider user ([`ExternalUid`]). Both appear on the wire: the
//! REST backend keys conversations by account id, the document store by uid.

use core::cmp::Ordering;
use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::AccountId;

/// Errors raised when parsing a participant identifier.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParticipantIdError {
    #[error("participant id cannot be empty")]
    Empty,
    /// `_` separates the two halves of a conversation id.
    #[error("participant id cannot contain '{0}'")]
    ForbiddenChar(char),
    /// Numeric text always names an account.
    #[error("uid cannot be numeric: {0}")]
    NumericUid(String),
}

/// Optional `-` followed by at least one ASCII digit.
fn is_numeric(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Opaque user id issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ExternalUid(String);

impl ExternalUid {
    /// Parse a uid, rejecting blanks, whitespace, the `_` separator and
    /// numeric text (which would read back as an account id).
    ///
    /// # Errors
    ///
    /// Returns [`ParticipantIdError`] if the uid is empty, numeric or
    /// contains a forbidden character.
    pub fn parse(s: &str) -> Result<Self, ParticipantIdError> {
        if s.is_empty() {
            return Err(ParticipantIdError::Empty);
        }
        if is_numeric(s) {
            return Err(ParticipantIdError::NumericUid(s.to_owned()));
        }
        if let Some(c) = s.chars().find(|c| *c == '_' || c.is_whitespace()) {
            return Err(ParticipantIdError::ForbiddenChar(c));
        }
        Ok(Self(s.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ExternalUid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for ExternalUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ExternalUid {
    type Err = ParticipantIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// One side of a conversation.
///
/// Ordering is total: account ids compare numerically (so `9 < 10`), uids
/// lexicographically, and every account sorts before every uid.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParticipantId {
    Account(AccountId),
    External(ExternalUid),
}

impl ParticipantId {
    /// The account id, if this participant is a backend account.
    #[must_use]
    pub const fn account(&self) -> Option<AccountId> {
        match self {
            Self::Account(id) => Some(*id),
            Self::External(_) => None,
        }
    }
}

impl Ord for ParticipantId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Account(a), Self::Account(b)) => a.cmp(b),
            (Self::External(a), Self::External(b)) => a.cmp(b),
            (Self::Account(_), Self::External(_)) => Ordering::Less,
            (Self::External(_), Self::Account(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for ParticipantId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account(id) => write!(f, "{id}"),
            Self::External(uid) => write!(f, "{uid}"),
        }
    }
}

impl FromStr for ParticipantId {
    type Err = ParticipantIdError;

    /// Numeric input (`42`, `-5`) is an account id; anything else a uid.
    /// Inverse of `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if is_numeric(s) {
            return s
                .parse::<AccountId>()
                .map(Self::Account)
                .map_err(|_| ParticipantIdError::NumericUid(s.to_owned()));
        }
        ExternalUid::parse(s).map(Self::External)
    }
}

impl From<AccountId> for ParticipantId {
    fn from(id: AccountId) -> Self {
        Self::Account(id)
    }
}

impl From<ExternalUid> for ParticipantId {
    fn from(uid: ExternalUid) -> Self {
        Self::External(uid)
    }
}

impl Serialize for ParticipantId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Account(id) => serializer.serialize_i64(id.as_i64()),
            Self::External(uid) => serializer.serialize_str(uid.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for ParticipantId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self::Account(AccountId::new(n))),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}
