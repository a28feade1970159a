//! Buyer/seller messaging.
//!
//! [`ConversationStore`] is the storage seam: the REST backend in
//! production, [`InMemoryConversationStore`] for tests and offline use.
//! A send is a single store operation, so no store can append a message
//! without also bumping the recipient's unread counter.
//!
//! [`Messenger`] is the service the screens call: start a conversation,
//! send, open (which clears the reader's counter), list, count unread, and
//! reach the admin account.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use cardtrade_core::conversation::{
    self, Conversation, ConversationError, ConversationId, ConversationSummary, Message,
    OutgoingMessage,
};
use cardtrade_core::{AccountId, MessageId, ParticipantId};

use crate::api::{ApiClient, ApiError};
use crate::error::add_breadcrumb;

/// Pseudonym given to the admin side of a support conversation.
pub const ADMIN_PSEUDONYM: &str = "Admin";

/// Errors raised by messaging operations.
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error(transparent)]
    Conversation(#[from] ConversationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("conversation {0} does not exist")]
    NotFound(ConversationId),

    /// No admin account is configured.
    #[error("no admin account configured")]
    NoAdmin,

    /// The admin tried to contact themselves.
    #[error("the admin account cannot contact itself")]
    AlreadyAdmin,
}

/// A participant together with the name shown to the other side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub id: ParticipantId,
    pub pseudonym: Option<String>,
}

impl Contact {
    #[must_use]
    pub fn new(id: impl Into<ParticipantId>) -> Self {
        Self {
            id: id.into(),
            pseudonym: None,
        }
    }

    #[must_use]
    pub fn named(id: impl Into<ParticipantId>, pseudonym: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pseudonym: Some(pseudonym.into()),
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// Where conversations live.
pub trait ConversationStore: Send + Sync + 'static {
    /// Create the conversation unless it already exists.
    fn create_if_absent(
        &self,
        id: &ConversationId,
        pseudonyms: &[(ParticipantId, String)],
    ) -> impl Future<Output = Result<(), MessagingError>> + Send;

    /// Append a message, refresh the preview and bump the recipient's
    /// unread counter, as one update.
    fn apply_send(
        &self,
        id: &ConversationId,
        message: OutgoingMessage,
    ) -> impl Future<Output = Result<Message, MessagingError>> + Send;

    /// Reset `reader`'s unread counter to zero.
    fn reset_unread(
        &self,
        id: &ConversationId,
        reader: &ParticipantId,
    ) -> impl Future<Output = Result<(), MessagingError>> + Send;

    /// Messages of a conversation, oldest first.
    fn messages(
        &self,
        id: &ConversationId,
    ) -> impl Future<Output = Result<Vec<Message>, MessagingError>> + Send;

    /// Conversations `participant` takes part in.
    fn list_for(
        &self,
        participant: &ParticipantId,
    ) -> impl Future<Output = Result<Vec<ConversationSummary>, MessagingError>> + Send;

    /// Unread messages across all of `participant`'s conversations.
    fn total_unread(
        &self,
        participant: &ParticipantId,
    ) -> impl Future<Output = Result<u32, MessagingError>> + Send {
        async move {
            let summaries = self.list_for(participant).await?;
            Ok(conversation::total_unread(&summaries))
        }
    }
}

/// Map a backend 404 on a conversation to [`MessagingError::NotFound`].
fn conversation_error(id: &ConversationId, err: ApiError) -> MessagingError {
    if err.is_not_found() {
        MessagingError::NotFound(id.clone())
    } else {
        MessagingError::Api(err)
    }
}

impl ConversationStore for ApiClient {
    // The backend names participants from its users table.
    async fn create_if_absent(
        &self,
        id: &ConversationId,
        _pseudonyms: &[(ParticipantId, String)],
    ) -> Result<(), MessagingError> {
        Ok(self.create_conversation(id).await?)
    }

    async fn apply_send(
        &self,
        id: &ConversationId,
        message: OutgoingMessage,
    ) -> Result<Message, MessagingError> {
        self.send_message(id, message)
            .await
            .map_err(|e| conversation_error(id, e))
    }

    async fn reset_unread(
        &self,
        id: &ConversationId,
        reader: &ParticipantId,
    ) -> Result<(), MessagingError> {
        Self::reset_unread(self, id, reader)
            .await
            .map_err(|e| conversation_error(id, e))
    }

    async fn messages(&self, id: &ConversationId) -> Result<Vec<Message>, MessagingError> {
        self.get_messages(id)
            .await
            .map_err(|e| conversation_error(id, e))
    }

    async fn list_for(
        &self,
        participant: &ParticipantId,
    ) -> Result<Vec<ConversationSummary>, MessagingError> {
        Ok(self.list_conversations(participant).await?)
    }

    async fn total_unread(&self, participant: &ParticipantId) -> Result<u32, MessagingError> {
        Ok(Self::total_unread(self, participant).await?)
    }
}

/// Conversations kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    conversations: Mutex<HashMap<ConversationId, Conversation>>,
    next_message_id: AtomicI64,
}

impl InMemoryConversationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConversationStore for InMemoryConversationStore {
    async fn create_if_absent(
        &self,
        id: &ConversationId,
        pseudonyms: &[(ParticipantId, String)],
    ) -> Result<(), MessagingError> {
        let mut conversations = self.conversations.lock().await;
        if conversations.contains_key(id) {
            return Ok(());
        }
        let mut conversation = Conversation::new(id.clone(), Utc::now());
        for (participant, pseudonym) in pseudonyms {
            conversation.set_pseudonym(participant, pseudonym.clone())?;
        }
        conversations.insert(id.clone(), conversation);
        Ok(())
    }

    async fn apply_send(
        &self,
        id: &ConversationId,
        message: OutgoingMessage,
    ) -> Result<Message, MessagingError> {
        let mut conversations = self.conversations.lock().await;
        let conversation = conversations
            .get_mut(id)
            .ok_or_else(|| MessagingError::NotFound(id.clone()))?;
        let message_id = MessageId::new(self.next_message_id.fetch_add(1, Ordering::Relaxed) + 1);
        let message = message.into_message(message_id, Utc::now());
        conversation.apply_send(message.clone())?;
        Ok(message)
    }

    async fn reset_unread(
        &self,
        id: &ConversationId,
        reader: &ParticipantId,
    ) -> Result<(), MessagingError> {
        let mut conversations = self.conversations.lock().await;
        let conversation = conversations
            .get_mut(id)
            .ok_or_else(|| MessagingError::NotFound(id.clone()))?;
        conversation.mark_read(reader)?;
        Ok(())
    }

    async fn messages(&self, id: &ConversationId) -> Result<Vec<Message>, MessagingError> {
        let conversations = self.conversations.lock().await;
        conversations
            .get(id)
            .map(|c| c.messages().to_vec())
            .ok_or_else(|| MessagingError::NotFound(id.clone()))
    }

    async fn list_for(
        &self,
        participant: &ParticipantId,
    ) -> Result<Vec<ConversationSummary>, MessagingError> {
        let conversations = self.conversations.lock().await;
        conversations
            .values()
            .filter(|c| c.id().contains(participant))
            .map(|c| c.summary_for(participant).map_err(MessagingError::from))
            .collect()
    }
}

// =============================================================================
// Messenger
// =============================================================================

/// Messaging service over a [`ConversationStore`].
pub struct Messenger<S> {
    store: Arc<S>,
    admin: Option<AccountId>,
}

impl<S> Clone for Messenger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            admin: self.admin,
        }
    }
}

impl<S: ConversationStore> Messenger<S> {
    #[must_use]
    pub fn new(store: S, admin: Option<AccountId>) -> Self {
        Self {
            store: Arc::new(store),
            admin,
        }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn admin(&self) -> Option<AccountId> {
        self.admin
    }

    /// Get or create the conversation between `me` and `other`.
    ///
    /// # Errors
    ///
    /// Returns an error when both sides are the same participant or the
    /// store fails.
    #[instrument(skip_all, fields(me = %me.id, other = %other.id))]
    pub async fn start_conversation(
        &self,
        me: &Contact,
        other: &Contact,
    ) -> Result<ConversationId, MessagingError> {
        let id = ConversationId::between(&me.id, &other.id)?;
        let pseudonyms: Vec<(ParticipantId, String)> = [me, other]
            .into_iter()
            .filter_map(|c| Some((c.id.clone(), c.pseudonym.clone()?)))
            .collect();
        self.store.create_if_absent(&id, &pseudonyms).await?;
        debug!(conversation_id = %id, "Conversation ready");
        Ok(id)
    }

    /// Send a text message from `sender` to the other participant.
    ///
    /// The conversation must have been started first.
    ///
    /// # Errors
    ///
    /// Returns an error for blank content, when `sender` is not part of the
    /// conversation, or when the store fails.
    #[instrument(skip(self, content), fields(conversation_id = %id, sender = %sender))]
    pub async fn send(
        &self,
        id: &ConversationId,
        sender: &ParticipantId,
        content: &str,
    ) -> Result<Message, MessagingError> {
        let recipient = id
            .other_participant(sender)
            .ok_or_else(|| ConversationError::NotParticipant(sender.clone()))?;
        let outgoing = OutgoingMessage::text(sender.clone(), recipient.clone(), content.trim())?;
        let message = self.store.apply_send(id, outgoing).await?;
        add_breadcrumb(
            "messaging",
            "Sent message",
            Some(&[("conversation_id", id.as_str())]),
        );
        Ok(message)
    }

    /// Open a conversation: clear `reader`'s unread counter, then load the
    /// messages.
    ///
    /// # Errors
    ///
    /// Returns an error when `reader` is not part of the conversation or the
    /// store fails.
    #[instrument(skip(self), fields(conversation_id = %id, reader = %reader))]
    pub async fn open(
        &self,
        id: &ConversationId,
        reader: &ParticipantId,
    ) -> Result<Vec<Message>, MessagingError> {
        if !id.contains(reader) {
            return Err(ConversationError::NotParticipant(reader.clone()).into());
        }
        self.store.reset_unread(id, reader).await?;
        self.store.messages(id).await
    }

    /// Conversations of `participant`, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn conversations(
        &self,
        participant: &ParticipantId,
    ) -> Result<Vec<ConversationSummary>, MessagingError> {
        let mut summaries = self.store.list_for(participant).await?;
        summaries.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(summaries)
    }

    /// Unread badge count.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn total_unread(&self, participant: &ParticipantId) -> Result<u32, MessagingError> {
        self.store.total_unread(participant).await
    }

    /// Unread badge count, or zero when it cannot be fetched.
    pub async fn total_unread_or_zero(&self, participant: &ParticipantId) -> u32 {
        match self.total_unread(participant).await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Failed to fetch unread count");
                0
            }
        }
    }

    /// Start (or reopen) the support conversation with the admin account.
    ///
    /// # Errors
    ///
    /// Returns [`MessagingError::NoAdmin`] when no admin is configured and
    /// [`MessagingError::AlreadyAdmin`] when `me` is the admin.
    pub async fn contact_admin(&self, me: &Contact) -> Result<ConversationId, MessagingError> {
        let admin = self.admin.ok_or(MessagingError::NoAdmin)?;
        if me.id.account() == Some(admin) {
            return Err(MessagingError::AlreadyAdmin);
        }
        let id = self
            .start_conversation(me, &Contact::named(admin, ADMIN_PSEUDONYM))
            .await?;
        add_breadcrumb("messaging", "Contacted admin", None);
        Ok(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use cardtrade_core::ExternalUid;
    use cardtrade_core::conversation::DEFAULT_PSEUDONYM;

    use super::*;

    fn account(id: i64) -> ParticipantId {
        AccountId::new(id).into()
    }

    fn messenger() -> Messenger<InMemoryConversationStore> {
        Messenger::new(InMemoryConversationStore::new(), Some(AccountId::new(1)))
    }

    #[tokio::test]
    async fn test_sends_accumulate_unread_until_opened() {
        let messenger = messenger();
        let alice = Contact::named(AccountId::new(10), "Alice");
        let bob = Contact::named(AccountId::new(9), "Bob");
        let id = messenger.start_conversation(&alice, &bob).await.unwrap();
        assert_eq!(id.as_str(), "9_10");

        for n in 0..3 {
            messenger.send(&id, &alice.id, &format!("message {n}")).await.unwrap();
        }

        let bob_view = messenger.conversations(&bob.id).await.unwrap();
        assert_eq!(bob_view.len(), 1);
        assert_eq!(bob_view[0].unread_count, 3);
        assert_eq!(bob_view[0].other_pseudonym, "Alice");
        assert_eq!(bob_view[0].last_message, "message 2");
        assert_eq!(messenger.total_unread(&alice.id).await.unwrap(), 0);

        let messages = messenger.open(&id, &bob.id).await.unwrap();
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|m| m.read));
        assert_eq!(messenger.total_unread(&bob.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_opening_leaves_other_counter() {
        let messenger = messenger();
        let a = Contact::new(AccountId::new(2));
        let b = Contact::new(AccountId::new(3));
        let id = messenger.start_conversation(&a, &b).await.unwrap();

        messenger.send(&id, &a.id, "salut").await.unwrap();
        messenger.send(&id, &b.id, "bonjour").await.unwrap();
        messenger.open(&id, &a.id).await.unwrap();

        assert_eq!(messenger.total_unread(&a.id).await.unwrap(), 0);
        assert_eq!(messenger.total_unread(&b.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let messenger = messenger();
        let a = Contact::new(AccountId::new(2));
        let b = Contact::new(AccountId::new(3));
        let id = messenger.start_conversation(&a, &b).await.unwrap();
        messenger.send(&id, &a.id, "hello").await.unwrap();

        let again = messenger.start_conversation(&b, &a).await.unwrap();
        assert_eq!(again, id);
        assert_eq!(messenger.total_unread(&b.id).await.unwrap(), 1);

        let summary = &messenger.conversations(&b.id).await.unwrap()[0];
        assert_eq!(summary.other_pseudonym, DEFAULT_PSEUDONYM);
    }

    #[tokio::test]
    async fn test_send_rejections() {
        let messenger = messenger();
        let a = Contact::new(AccountId::new(2));
        let b = Contact::new(AccountId::new(3));
        let id = ConversationId::between(&a.id, &b.id).unwrap();

        // Not started yet.
        assert!(matches!(
            messenger.send(&id, &a.id, "hello").await,
            Err(MessagingError::NotFound(_))
        ));

        messenger.start_conversation(&a, &b).await.unwrap();
        assert!(matches!(
            messenger.send(&id, &a.id, "   ").await,
            Err(MessagingError::Conversation(ConversationError::EmptyMessage))
        ));
        assert!(matches!(
            messenger.send(&id, &account(4), "hello").await,
            Err(MessagingError::Conversation(ConversationError::NotParticipant(_)))
        ));
        assert_eq!(messenger.total_unread(&b.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_external_participant() {
        let messenger = messenger();
        let guest = Contact::new(ExternalUid::parse("xY7kQ").unwrap());
        let seller = Contact::new(AccountId::new(12));
        let id = messenger.start_conversation(&guest, &seller).await.unwrap();
        assert_eq!(id.as_str(), "12_xY7kQ");

        messenger.send(&id, &guest.id, "dispo ?").await.unwrap();
        assert_eq!(messenger.total_unread_or_zero(&seller.id).await, 1);
    }

    #[tokio::test]
    async fn test_contact_admin() {
        let messenger = messenger();
        let me = Contact::named(AccountId::new(5), "Sacha");

        let id = messenger.contact_admin(&me).await.unwrap();
        assert_eq!(id.as_str(), "1_5");
        let summary = &messenger.conversations(&me.id).await.unwrap()[0];
        assert_eq!(summary.other_pseudonym, ADMIN_PSEUDONYM);

        let admin = Contact::new(AccountId::new(1));
        assert!(matches!(
            messenger.contact_admin(&admin).await,
            Err(MessagingError::AlreadyAdmin)
        ));

        let unconfigured = Messenger::new(InMemoryConversationStore::new(), None);
        assert!(matches!(
            unconfigured.contact_admin(&me).await,
            Err(MessagingError::NoAdmin)
        ));
    }
}
