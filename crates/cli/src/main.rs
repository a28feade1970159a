//! Cardtrade CLI - drive the marketplace client services from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Resolve the account id of an email
//! ct-cli --email sacha@bourg-palette.fr account resolve
//!
//! # Browse the marketplace, refreshing every few seconds
//! ct-cli marketplace search --price 10-50 --kind vente --watch
//!
//! # Messaging
//! ct-cli --email sacha@bourg-palette.fr conversations list
//! ct-cli --email sacha@bourg-palette.fr conversations send 7_42 "Toujours dispo ?"
//!
//! # Collection: view a category, then list a card for sale
//! ct-cli --email sacha@bourg-palette.fr collection category 1 --search base
//! ct-cli --email sacha@bourg-palette.fr collection sell 150 --kind vente --price 25
//!
//! # Price a cart
//! ct-cli --email sacha@bourg-palette.fr checkout quote -l 12 -s colissimo
//! ```
//!
//! # Environment Variables
//!
//! - `CARDTRADE_API_URL` - Backend base URL (required)
//! - `CARDTRADE_EMAIL` / `CARDTRADE_UID` - Signed-in identity
//! - `SENTRY_DSN` - Error tracking (optional)
//! - `CARDTRADE_LOG_JSON` - JSON log lines on stderr
//!
//! See `ClientConfig::from_env` for the remaining settings.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cardtrade_client::auth::Identity;
use cardtrade_client::{ClientConfig, Services};
use cardtrade_core::filter::{ListingKind, MarketplaceQuery, PriceBucket};
use cardtrade_client::collection::NewCard;
use cardtrade_core::listing::CardDetails;
use cardtrade_core::{
    CardId, CategoryId, Email, ExternalUid, ListingId, ParticipantId, Price, SavedCardId,
};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "ct-cli")]
#[command(author, version, about = "Cardtrade marketplace CLI")]
struct Cli {
    /// Email of the signed-in user
    #[arg(long, global = true, env = "CARDTRADE_EMAIL")]
    email: Option<Email>,

    /// Identity-provider uid of the signed-in user
    #[arg(long, global = true, env = "CARDTRADE_UID", default_value = "ct-cli")]
    uid: ExternalUid,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "CARDTRADE_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Account lookup
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },
    /// Buyer/seller messaging
    Conversations {
        #[command(subcommand)]
        action: ConversationAction,
    },
    /// Marketplace listings
    Marketplace {
        #[command(subcommand)]
        action: MarketplaceAction,
    },
    /// Owned cards, categories and saved cards
    Collection {
        #[command(subcommand)]
        action: CollectionAction,
    },
    /// Card catalogue
    Cards {
        #[command(subcommand)]
        action: CardAction,
    },
    /// Shipping options and relay points
    Shipping {
        #[command(subcommand)]
        action: ShippingAction,
    },
    /// Cart pricing and order placement
    Checkout {
        #[command(subcommand)]
        action: CheckoutAction,
    },
}

#[derive(Subcommand)]
enum AccountAction {
    /// Resolve the account id of the signed-in email
    Resolve,
    /// Edit the public profile
    Update {
        #[arg(long)]
        pseudo: Option<String>,

        #[arg(long)]
        address: Option<String>,

        #[arg(long)]
        paypal: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConversationAction {
    /// List conversations with unread counts
    List,
    /// Start a conversation with another participant
    Open {
        /// Account id or uid of the other participant
        other: ParticipantId,
    },
    /// Show messages and mark them read
    Read {
        /// Conversation id, e.g. `7_42`
        id: String,
    },
    /// Send a text message
    Send {
        /// Conversation id, e.g. `7_42`
        id: String,
        text: String,
    },
    /// Total unread messages
    Unread,
    /// Open the support conversation
    ContactAdmin,
}

#[derive(Subcommand)]
enum MarketplaceAction {
    /// Search listings
    Search {
        /// Free text
        #[arg(short, long, default_value = "")]
        text: String,

        /// Price range (`all`, `0-10`, `10-50`, `50-999999`)
        #[arg(short, long, default_value = "all")]
        price: PriceBucket,

        /// Listing type (`all`, `vente`, `echange`)
        #[arg(short, long, default_value = "all")]
        kind: ListingKind,

        /// Zero-based page
        #[arg(long, default_value_t = 0)]
        page: u32,

        /// Keep refreshing until Ctrl-C
        #[arg(short, long)]
        watch: bool,
    },
    /// Listings of the signed-in seller
    Mine,
    /// Withdraw a listing
    Withdraw { id: ListingId },
}

#[derive(Subcommand)]
enum CollectionAction {
    /// Owned cards
    List {
        #[arg(short, long, default_value = "")]
        search: String,
    },
    /// Categories with card counts
    Categories,
    /// Cards of one category
    Category {
        id: CategoryId,

        /// Every word must match
        #[arg(short, long, default_value = "")]
        search: String,
    },
    /// Create a category
    NewCategory { name: String },
    /// Delete a category, keeping its cards
    DeleteCategory { id: CategoryId },
    /// Add the card ids of a text file (one per line) to a category
    Import { category: CategoryId, file: PathBuf },
    /// Store a card, optionally listing it
    Add {
        name: String,

        #[arg(long)]
        year: Option<i32>,

        #[arg(long)]
        set: Option<String>,

        #[arg(long)]
        number: Option<String>,

        #[arg(long)]
        attributes: Option<String>,

        /// Photo URL
        #[arg(long)]
        photo: Option<String>,

        /// `vente` or `echange` to list right away
        #[arg(short, long, default_value = "all")]
        kind: ListingKind,

        #[arg(short, long)]
        price: Option<Price>,
    },
    /// Move an owned card to the marketplace
    Sell {
        card: CardId,

        /// `vente` or `echange`
        #[arg(short, long)]
        kind: ListingKind,

        #[arg(short, long)]
        price: Option<Price>,
    },
    /// Saved cards
    Saved,
    /// Remove a saved card
    Unsave { id: SavedCardId },
}

#[derive(Subcommand)]
enum CardAction {
    /// Search the catalogue
    Search {
        text: String,

        /// Zero-based page
        #[arg(long, default_value_t = 0)]
        page: u32,
    },
    /// Random cards
    Random {
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },
}

#[derive(Subcommand)]
enum ShippingAction {
    /// List shipping options
    Options,
    /// Find relay points near a postal code
    Relay { postal_code: String },
}

#[derive(Subcommand)]
enum CheckoutAction {
    /// Price a cart of listings
    Quote {
        /// Listing id, repeatable
        #[arg(short, long = "listing", required = true)]
        listings: Vec<ListingId>,

        /// Shipping option id
        #[arg(short, long)]
        shipping: Option<String>,

        /// Postal code for a relay point search
        #[arg(short, long)]
        postal_code: Option<String>,

        /// Place the order and print the payment URL
        #[arg(long)]
        submit: bool,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
#[allow(clippy::print_stderr)]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cardtrade_client=info,ct_cli=info".into());

    let text_layer =
        (!cli.log_json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    let json_layer = cli.log_json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, config).await {
        match &e {
            CliError::Client(err) => {
                err.report();
                let message = err.user_message();
                eprintln!("{}: {}", message.title, message.body);
                tracing::debug!(error = %err, "Command failed");
            }
            CliError::InvalidArgument(_) => eprintln!("{e}"),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), CliError> {
    let services = Services::new(config)?;

    if let Some(email) = cli.email {
        services
            .accounts()
            .identity_changed(Some(Identity {
                uid: cli.uid,
                email,
            }))
            .await;
    }

    match cli.command {
        Commands::Account { action } => match action {
            AccountAction::Resolve => commands::account::resolve(&services).await?,
            AccountAction::Update {
                pseudo,
                address,
                paypal,
            } => {
                commands::account::update(
                    &services,
                    commands::account::ProfileEdits {
                        pseudo,
                        address,
                        paypal,
                    },
                )
                .await?;
            }
        },
        Commands::Conversations { action } => match action {
            ConversationAction::List => commands::conversations::list(&services).await?,
            ConversationAction::Open { other } => {
                commands::conversations::open(&services, other).await?;
            }
            ConversationAction::Read { id } => {
                commands::conversations::read(&services, &id).await?;
            }
            ConversationAction::Send { id, text } => {
                commands::conversations::send(&services, &id, &text).await?;
            }
            ConversationAction::Unread => commands::conversations::unread(&services).await?,
            ConversationAction::ContactAdmin => {
                commands::conversations::contact_admin(&services).await?;
            }
        },
        Commands::Marketplace { action } => match action {
            MarketplaceAction::Search {
                text,
                price,
                kind,
                page,
                watch,
            } => {
                let query = MarketplaceQuery { text, price, kind };
                if watch {
                    commands::marketplace::watch(&services, query).await?;
                } else {
                    commands::marketplace::search(&services, &query, page).await?;
                }
            }
            MarketplaceAction::Mine => commands::marketplace::mine(&services).await?,
            MarketplaceAction::Withdraw { id } => {
                commands::marketplace::withdraw(&services, id).await?;
            }
        },
        Commands::Collection { action } => run_collection(&services, action).await?,
        Commands::Cards { action } => match action {
            CardAction::Search { text, page } => {
                commands::cards::search(&services, &text, page).await?;
            }
            CardAction::Random { limit } => commands::cards::random(&services, limit).await?,
        },
        Commands::Shipping { action } => match action {
            ShippingAction::Options => commands::shipping::options(&services).await?,
            ShippingAction::Relay { postal_code } => {
                commands::shipping::relay(&services, &postal_code).await?;
            }
        },
        Commands::Checkout { action } => match action {
            CheckoutAction::Quote {
                listings,
                shipping,
                postal_code,
                submit,
            } => {
                commands::checkout::quote(
                    &services,
                    commands::checkout::QuoteOptions {
                        listings,
                        shipping_option: shipping,
                        postal_code,
                        submit,
                    },
                )
                .await?;
            }
        },
    }
    Ok(())
}

async fn run_collection(services: &Services, action: CollectionAction) -> Result<(), CliError> {
    use commands::collection;

    match action {
        CollectionAction::List { search } => collection::list(services, &search).await,
        CollectionAction::Categories => collection::categories(services).await,
        CollectionAction::Category { id, search } => {
            collection::category(services, id, &search).await
        }
        CollectionAction::NewCategory { name } => collection::new_category(services, &name).await,
        CollectionAction::DeleteCategory { id } => collection::delete_category(services, id).await,
        CollectionAction::Import { category, file } => {
            collection::import(services, category, &file).await
        }
        CollectionAction::Add {
            name,
            year,
            set,
            number,
            attributes,
            photo,
            kind,
            price,
        } => {
            let card = NewCard {
                details: CardDetails {
                    name,
                    year,
                    card_set: set,
                    number,
                    attributes,
                },
                photo,
                kind,
                price,
            };
            collection::add(services, card).await
        }
        CollectionAction::Sell { card, kind, price } => {
            collection::sell(services, card, kind, price).await
        }
        CollectionAction::Saved => collection::saved(services).await,
        CollectionAction::Unsave { id } => collection::unsave(services, id).await,
    }
}
