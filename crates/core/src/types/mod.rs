//! Core types for Cardtrade.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod participant;
pub mod price;

pub use email::{Email, EmailError};
pub use id::*;
pub use participant::{ExternalUid, ParticipantId, ParticipantIdError};
pub use price::{CURRENCY_SYMBOL, Price};
