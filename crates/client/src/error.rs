//! Unified error handling with Sentry integration.
//!
//! Provides a unified `ClientError` type for everything the services can
//! fail with, and the user-facing dialog text for each failure. Internal
//! details never reach the dialog; they go to the logs and to Sentry.

use thiserror::Error;

use cardtrade_core::cart::CartError;
use cardtrade_core::checkout::{CheckoutBlocker, CheckoutError};
use cardtrade_core::collection::CollectionError;
use cardtrade_core::listing::DraftError;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::messaging::MessagingError;

/// Title of every error dialog.
pub const ERROR_TITLE: &str = "Erreur";

/// Top-level error type of the client services.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Backend request failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Messaging operation failed.
    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    /// Checkout edit or submission refused.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Cart edit refused.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Card or listing form incomplete.
    #[error("Draft error: {0}")]
    Draft(#[from] DraftError),

    /// Collection edit refused.
    #[error("Collection error: {0}")]
    Collection(#[from] CollectionError),

    /// The operation needs a resolved account id.
    #[error("Not signed in")]
    NotSignedIn,
}

impl From<CheckoutBlocker> for ClientError {
    fn from(blocker: CheckoutBlocker) -> Self {
        Self::Checkout(CheckoutError::Blocked(blocker))
    }
}

/// Dialog shown to the user for a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMessage {
    pub title: &'static str,
    pub body: String,
}

impl ClientError {
    /// Dialog text for this error.
    #[must_use]
    pub fn user_message(&self) -> UserMessage {
        // Don't expose internal error details to users
        let body = match self {
            Self::Config(_) | Self::Api(_) => {
                "Une erreur est survenue. Veuillez réessayer plus tard.".to_string()
            }
            Self::Messaging(err) => match err {
                MessagingError::NoAdmin => {
                    "Le support n'est pas disponible pour le moment.".to_string()
                }
                MessagingError::AlreadyAdmin => {
                    "Vous ne pouvez pas vous contacter vous-même.".to_string()
                }
                MessagingError::Conversation(
                    cardtrade_core::conversation::ConversationError::EmptyMessage,
                ) => "Le message ne peut pas être vide.".to_string(),
                _ => "Impossible d'envoyer le message.".to_string(),
            },
            Self::Checkout(err) => match err {
                CheckoutError::InvalidPostalCode(_) => {
                    "Veuillez entrer un code postal valide (5 chiffres).".to_string()
                }
                CheckoutError::UnknownShippingOption(_) => {
                    "Ce mode de livraison n'est plus disponible.".to_string()
                }
                CheckoutError::Blocked(blocker) => blocker_message(blocker).to_string(),
            },
            Self::Cart(CartError::AlreadyInCart(_)) => {
                "Cette carte est déjà dans votre panier.".to_string()
            }
            Self::Cart(CartError::DifferentSeller { .. }) => {
                "Votre panier contient des cartes d'un autre vendeur.".to_string()
            }
            Self::Draft(DraftError::MissingFields { .. }) => {
                "Les champs Nom, Année, Set et Numéro sont obligatoires.".to_string()
            }
            Self::Draft(DraftError::NoKind) => {
                "Choisissez la vente ou l'échange.".to_string()
            }
            Self::Draft(DraftError::MissingPrice) => {
                "Veuillez indiquer un prix pour la carte.".to_string()
            }
            Self::Collection(CollectionError::EmptyCategoryName) => {
                "Le nom de la catégorie ne peut pas être vide.".to_string()
            }
            Self::Collection(CollectionError::EmptyImport) => {
                "Le fichier est vide ou ne contient aucun identifiant de carte valide.".to_string()
            }
            Self::NotSignedIn => "Vous devez être connecté.".to_string(),
        };
        UserMessage {
            title: ERROR_TITLE,
            body,
        }
    }

    /// Whether the failure is worth an error report.
    #[must_use]
    pub const fn is_reportable(&self) -> bool {
        matches!(
            self,
            Self::Api(_) | Self::Config(_) | Self::Messaging(MessagingError::Api(_))
        )
    }

    /// Log the error, capturing it to Sentry when reportable.
    pub fn report(&self) {
        if self.is_reportable() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Client error"
            );
        } else {
            tracing::warn!(error = %self, "Client error");
        }
    }
}

const fn blocker_message(blocker: &CheckoutBlocker) -> &'static str {
    match blocker {
        CheckoutBlocker::EmptyCart => "Votre panier est vide.",
        CheckoutBlocker::NoShippingOption => "Veuillez choisir un mode de livraison.",
        CheckoutBlocker::RelayPointNotChosen => "Veuillez rechercher et choisir un point relais.",
        CheckoutBlocker::IncompleteAddress { .. } => {
            "Veuillez compléter votre adresse de livraison dans votre profil."
        }
    }
}

/// Result type alias for `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Set the Sentry user context from an account id.
///
/// Call this once the account id is resolved to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("messaging", "Sent message", Some(&[("conversation_id", "3_8")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
