//! Conversation endpoints.

use chrono::Utc;
use tracing::instrument;

use cardtrade_core::conversation::{ConversationId, ConversationSummary, Message, OutgoingMessage};
use cardtrade_core::{MessageId, ParticipantId};

use super::conversions::{convert_conversation_row, convert_message};
use super::wire::{
    ConversationRow, CreateConversationBody, MessageRecord, ResetUnreadBody, SendAck,
    SendMessageBody, UnreadResponse,
};
use super::{ApiClient, ApiError, segment};

impl ApiClient {
    /// Create a conversation; a no-op when it already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(conversation_id = %id))]
    pub async fn create_conversation(&self, id: &ConversationId) -> Result<(), ApiError> {
        let (low, high) = id.participants();
        let url = self.endpoint("conversations/create")?;
        self.post_unit(
            url,
            &CreateConversationBody {
                conversation_id: id.as_str(),
                user_ids: [low, high],
            },
        )
        .await
    }

    /// Conversations of a participant, with their unread counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or a row is malformed.
    #[instrument(skip(self), fields(participant = %participant))]
    pub async fn list_conversations(
        &self,
        participant: &ParticipantId,
    ) -> Result<Vec<ConversationSummary>, ApiError> {
        let url = self.endpoint(&format!(
            "conversations/user/{}",
            segment(&participant.to_string())
        ))?;
        let rows: Option<Vec<ConversationRow>> = self.get_json(url).await?;
        rows.unwrap_or_default()
            .into_iter()
            .map(|row| convert_conversation_row(row, participant))
            .collect()
    }

    /// All messages of a conversation, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or a message is malformed.
    #[instrument(skip(self), fields(conversation_id = %id))]
    pub async fn get_messages(&self, id: &ConversationId) -> Result<Vec<Message>, ApiError> {
        let url = self.endpoint(&format!("conversations/messages/{}", segment(id.as_str())))?;
        let records: Option<Vec<MessageRecord>> = self.get_json(url).await?;
        let mut messages = records
            .unwrap_or_default()
            .into_iter()
            .map(|record| convert_message(record, id))
            .collect::<Result<Vec<_>, _>>()?;
        messages.sort_by_key(|m| (m.sent_at, m.id));
        Ok(messages)
    }

    /// Send a message.
    ///
    /// The backend appends the message, refreshes the conversation preview
    /// and increments the recipient's unread counter in one update.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, message), fields(conversation_id = %id))]
    pub async fn send_message(
        &self,
        id: &ConversationId,
        message: OutgoingMessage,
    ) -> Result<Message, ApiError> {
        let url = self.endpoint(&format!("conversations/messages/{}", segment(id.as_str())))?;
        let ack: Option<SendAck> = self
            .post_json(
                url,
                &SendMessageBody {
                    sender_id: &message.sender,
                    receiver_id: &message.recipient,
                    content: &message.content,
                    kind: message.kind,
                },
            )
            .await?;
        let ack = ack.unwrap_or_default();
        Ok(message.into_message(
            MessageId::new(ack.id.unwrap_or_default()),
            ack.timestamp.unwrap_or_else(Utc::now),
        ))
    }

    /// Reset `reader`'s unread counter for a conversation to zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(conversation_id = %id, reader = %reader))]
    pub async fn reset_unread(
        &self,
        id: &ConversationId,
        reader: &ParticipantId,
    ) -> Result<(), ApiError> {
        let url = self.endpoint("conversations/reset-unread")?;
        self.post_unit(
            url,
            &ResetUnreadBody {
                conversation_id: id.as_str(),
                user_id: reader,
            },
        )
        .await
    }

    /// Unread messages across all conversations of a participant.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(participant = %participant))]
    pub async fn total_unread(&self, participant: &ParticipantId) -> Result<u32, ApiError> {
        let url = self.endpoint(&format!(
            "conversations/unread/{}",
            segment(&participant.to_string())
        ))?;
        let response: Option<UnreadResponse> = self.get_json(url).await?;
        Ok(response
            .and_then(|r| r.total_unread)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0))
    }
}
