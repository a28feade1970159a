//! Conversation commands.
//!
//! # Usage
//!
//! ```bash
//! ct-cli --email me@exemple.fr conversations list
//! ct-cli --email me@exemple.fr conversations open 42
//! ct-cli --email me@exemple.fr conversations send 7_42 "Toujours dispo ?"
//! ct-cli --email me@exemple.fr conversations read 7_42
//! ct-cli --email me@exemple.fr conversations unread
//! ct-cli --email me@exemple.fr conversations contact-admin
//! ```

#![allow(clippy::print_stdout)]

use cardtrade_client::Services;
use cardtrade_client::messaging::Contact;
use cardtrade_core::ParticipantId;
use cardtrade_core::conversation::ConversationId;

use super::{CliError, me, signed_in};

/// Conversations of the signed-in user, most recent first.
pub async fn list(services: &Services) -> Result<(), CliError> {
    let me: ParticipantId = signed_in(services).await?.into();
    let summaries = services.messenger().conversations(&me).await?;

    if summaries.is_empty() {
        println!("No conversations.");
        return Ok(());
    }
    for summary in summaries {
        let badge = if summary.unread_count > 0 {
            format!(" [{} unread]", summary.unread_count)
        } else {
            String::new()
        };
        println!(
            "{:<20} {:<20} {}{badge}",
            summary.id.as_str(),
            summary.other_pseudonym,
            summary.last_message_at.format("%Y-%m-%d %H:%M"),
        );
        if !summary.last_message.is_empty() {
            println!("    {}", summary.last_message);
        }
    }
    Ok(())
}

/// Start (or find) the conversation with another participant.
pub async fn open(services: &Services, other: ParticipantId) -> Result<(), CliError> {
    let me = me(services).await?;
    let id = services
        .messenger()
        .start_conversation(&me, &Contact::new(other))
        .await?;
    println!("{id}");
    Ok(())
}

/// Show a conversation's messages and mark them read.
pub async fn read(services: &Services, id: &str) -> Result<(), CliError> {
    let id = parse_conversation_id(id)?;
    let me: ParticipantId = signed_in(services).await?.into();
    let messages = services.messenger().open(&id, &me).await?;

    for message in messages {
        let who = if message.sender == me {
            "me".to_string()
        } else {
            message.sender.to_string()
        };
        println!(
            "[{}] {who}: {}",
            message.sent_at.format("%Y-%m-%d %H:%M"),
            message.content
        );
    }
    Ok(())
}

/// Send a text message in a conversation.
pub async fn send(services: &Services, id: &str, text: &str) -> Result<(), CliError> {
    let id = parse_conversation_id(id)?;
    let me: ParticipantId = signed_in(services).await?.into();
    let message = services.messenger().send(&id, &me, text).await?;
    println!("Sent message {} to {}", message.id, message.recipient);
    Ok(())
}

/// Unread badge count.
pub async fn unread(services: &Services) -> Result<(), CliError> {
    let me: ParticipantId = signed_in(services).await?.into();
    println!("{}", services.messenger().total_unread_or_zero(&me).await);
    Ok(())
}

/// Open the support conversation with the admin account.
pub async fn contact_admin(services: &Services) -> Result<(), CliError> {
    let me = me(services).await?;
    let id = services.messenger().contact_admin(&me).await?;
    println!("{id}");
    Ok(())
}

fn parse_conversation_id(raw: &str) -> Result<ConversationId, CliError> {
    ConversationId::parse(raw).map_err(|e| CliError::InvalidArgument(e.to_string()))
}
