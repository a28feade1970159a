//! Conversations between two collectors.
//!
//! A conversation is keyed by a [`ConversationId`] derived from its two
//! participants, so the same pair always lands on the same conversation no
//! matter who writes first. Each conversation keeps an append-only message
//! log and one unread counter per participant.
//!
//! # Invariants
//!
//! - `ConversationId::between(a, b) == ConversationId::between(b, a)`
//! - Sending appends the message, updates the last-message preview and bumps
//!   the recipient's counter by exactly one, all or nothing
//! - Opening resets only the reader's counter, to exactly zero

use core::fmt;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{MessageId, ParticipantId, ParticipantIdError};

/// Name shown for a participant whose pseudonym is unknown.
pub const DEFAULT_PSEUDONYM: &str = "Utilisateur";

/// Separator between the two participant ids of a conversation id.
const SEPARATOR: char = '_';

/// Errors raised by conversation operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    /// Both sides of the conversation are the same participant.
    #[error("cannot open a conversation with yourself")]
    SelfConversation,

    /// The participant is not part of this conversation.
    #[error("{0} is not a participant of this conversation")]
    NotParticipant(ParticipantId),

    /// Message content is empty after trimming.
    #[error("message content cannot be empty")]
    EmptyMessage,

    /// The id is not of the form `<a>_<b>`.
    #[error("malformed conversation id: {0}")]
    MalformedId(String),

    #[error("invalid participant in conversation id: {0}")]
    Participant(#[from] ParticipantIdError),
}

// =============================================================================
// ConversationId
// =============================================================================

/// Deterministic conversation key: `min(a, b) + "_" + max(a, b)`.
///
/// ```
/// use cardtrade_core::{AccountId, conversation::ConversationId};
///
/// let a = AccountId::new(10).into();
/// let b = AccountId::new(9).into();
/// let id = ConversationId::between(&a, &b).unwrap();
/// assert_eq!(id.as_str(), "9_10");
/// assert_eq!(id, ConversationId::between(&b, &a).unwrap());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConversationId {
    raw: String,
    low: ParticipantId,
    high: ParticipantId,
}

impl ConversationId {
    /// Derive the conversation id for two participants.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationError::SelfConversation`] when `a == b`.
    pub fn between(a: &ParticipantId, b: &ParticipantId) -> Result<Self, ConversationError> {
        if a == b {
            return Err(ConversationError::SelfConversation);
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        Ok(Self {
            raw: format!("{low}{SEPARATOR}{high}"),
            low: low.clone(),
            high: high.clone(),
        })
    }

    /// Parse an id previously produced by [`ConversationId::between`].
    ///
    /// The halves are re-ordered if needed, so a hand-written `"10_9"` maps
    /// to the canonical `"9_10"`.
    ///
    /// # Errors
    ///
    /// Returns an error if there is not exactly one separator, either half is
    /// not a valid participant id, or both halves are equal.
    pub fn parse(s: &str) -> Result<Self, ConversationError> {
        let (left, right) = s
            .split_once(SEPARATOR)
            .ok_or_else(|| ConversationError::MalformedId(s.to_owned()))?;
        let left: ParticipantId = left.parse()?;
        let right: ParticipantId = right.parse()?;
        Self::between(&left, &right)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Both participants, smaller first.
    #[must_use]
    pub const fn participants(&self) -> (&ParticipantId, &ParticipantId) {
        (&self.low, &self.high)
    }

    #[must_use]
    pub fn contains(&self, participant: &ParticipantId) -> bool {
        &self.low == participant || &self.high == participant
    }

    /// The participant on the other side from `me`.
    #[must_use]
    pub fn other_participant(&self, me: &ParticipantId) -> Option<&ParticipantId> {
        if &self.low == me {
            Some(&self.high)
        } else if &self.high == me {
            Some(&self.low)
        } else {
            None
        }
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl core::str::FromStr for ConversationId {
    type Err = ConversationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ConversationId {
    type Error = ConversationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ConversationId> for String {
    fn from(id: ConversationId) -> Self {
        id.raw
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Message payload type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
}

/// A message about to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub sender: ParticipantId,
    pub recipient: ParticipantId,
    pub content: String,
    pub kind: MessageKind,
}

impl OutgoingMessage {
    /// Build a text message.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationError::EmptyMessage`] for blank content and
    /// [`ConversationError::SelfConversation`] when sender and recipient are
    /// the same.
    pub fn text(
        sender: ParticipantId,
        recipient: ParticipantId,
        content: impl Into<String>,
    ) -> Result<Self, ConversationError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(ConversationError::EmptyMessage);
        }
        if sender == recipient {
            return Err(ConversationError::SelfConversation);
        }
        Ok(Self {
            sender,
            recipient,
            content,
            kind: MessageKind::Text,
        })
    }

    /// Freeze into a stored message.
    #[must_use]
    pub fn into_message(self, id: MessageId, sent_at: DateTime<Utc>) -> Message {
        Message {
            id,
            sender: self.sender,
            recipient: self.recipient,
            content: self.content,
            kind: self.kind,
            sent_at,
            read: false,
        }
    }
}

/// A stored message. Never edited after creation except for the read flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: ParticipantId,
    pub recipient: ParticipantId,
    pub content: String,
    #[serde(default)]
    pub kind: MessageKind,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

// =============================================================================
// Conversation
// =============================================================================

/// Full conversation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    id: ConversationId,
    pseudonyms: HashMap<ParticipantId, String>,
    messages: Vec<Message>,
    last_message: String,
    last_message_at: DateTime<Utc>,
    unread_counts: HashMap<ParticipantId, u32>,
}

impl Conversation {
    /// Create an empty conversation with both counters at zero.
    #[must_use]
    pub fn new(id: ConversationId, created_at: DateTime<Utc>) -> Self {
        let (low, high) = id.participants();
        let unread_counts = HashMap::from([(low.clone(), 0), (high.clone(), 0)]);
        Self {
            id,
            pseudonyms: HashMap::new(),
            messages: Vec::new(),
            last_message: String::new(),
            last_message_at: created_at,
            unread_counts,
        }
    }

    /// Attach a display name to a participant.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationError::NotParticipant`] for outsiders.
    pub fn set_pseudonym(
        &mut self,
        participant: &ParticipantId,
        pseudonym: impl Into<String>,
    ) -> Result<(), ConversationError> {
        self.ensure_participant(participant)?;
        self.pseudonyms.insert(participant.clone(), pseudonym.into());
        Ok(())
    }

    #[must_use]
    pub const fn id(&self) -> &ConversationId {
        &self.id
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn last_message(&self) -> &str {
        &self.last_message
    }

    #[must_use]
    pub const fn last_message_at(&self) -> DateTime<Utc> {
        self.last_message_at
    }

    /// Display name, falling back to [`DEFAULT_PSEUDONYM`].
    #[must_use]
    pub fn pseudonym(&self, participant: &ParticipantId) -> &str {
        self.pseudonyms
            .get(participant)
            .map_or(DEFAULT_PSEUDONYM, String::as_str)
    }

    /// Unread count for a participant; zero for outsiders.
    #[must_use]
    pub fn unread_for(&self, participant: &ParticipantId) -> u32 {
        self.unread_counts.get(participant).copied().unwrap_or(0)
    }

    /// Apply a send as one update: append, refresh the preview, and
    /// increment the recipient's counter.
    ///
    /// Everything is validated before anything is written, so an error
    /// leaves the conversation untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationError::NotParticipant`] if the sender or the
    /// recipient is not part of this conversation.
    pub fn apply_send(&mut self, message: Message) -> Result<(), ConversationError> {
        self.ensure_participant(&message.sender)?;
        self.ensure_participant(&message.recipient)?;
        if message.sender == message.recipient {
            return Err(ConversationError::SelfConversation);
        }

        self.last_message.clone_from(&message.content);
        self.last_message_at = message.sent_at;
        *self
            .unread_counts
            .entry(message.recipient.clone())
            .or_insert(0) += 1;
        self.messages.push(message);
        Ok(())
    }

    /// Reset the reader's counter to zero and flag their messages as read.
    ///
    /// Returns how many messages were unread.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationError::NotParticipant`] for outsiders.
    pub fn mark_read(&mut self, reader: &ParticipantId) -> Result<u32, ConversationError> {
        self.ensure_participant(reader)?;
        for message in self.messages.iter_mut().filter(|m| &m.recipient == reader) {
            message.read = true;
        }
        Ok(self
            .unread_counts
            .insert(reader.clone(), 0)
            .unwrap_or(0))
    }

    /// List-row view of this conversation for `viewer`.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationError::NotParticipant`] for outsiders.
    pub fn summary_for(
        &self,
        viewer: &ParticipantId,
    ) -> Result<ConversationSummary, ConversationError> {
        let other = self
            .id
            .other_participant(viewer)
            .ok_or_else(|| ConversationError::NotParticipant(viewer.clone()))?;
        Ok(ConversationSummary {
            id: self.id.clone(),
            other_participant: other.clone(),
            other_pseudonym: self.pseudonym(other).to_owned(),
            last_message: self.last_message.clone(),
            last_message_at: self.last_message_at,
            unread_count: self.unread_for(viewer),
        })
    }

    fn ensure_participant(&self, participant: &ParticipantId) -> Result<(), ConversationError> {
        if self.id.contains(participant) {
            Ok(())
        } else {
            Err(ConversationError::NotParticipant(participant.clone()))
        }
    }
}

/// One row of a participant's conversation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub other_participant: ParticipantId,
    pub other_pseudonym: String,
    pub last_message: String,
    pub last_message_at: DateTime<Utc>,
    pub unread_count: u32,
}

/// Sum of unread counters across a participant's conversations.
#[must_use]
pub fn total_unread(summaries: &[ConversationSummary]) -> u32 {
    summaries.iter().map(|s| s.unread_count).sum()
}
