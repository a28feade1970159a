//! Cardtrade Core - domain types and pure marketplace logic.
//!
//! This crate holds everything the trading-card marketplace client computes
//! locally:
//! - `types` - Newtype IDs, participant identifiers, emails and prices
//! - `conversation` - Deterministic conversation IDs and unread tracking
//! - `cart` / `shipping` / `checkout` - Cart totals and checkout gating
//! - `filter` - Marketplace query building, text filtering and pagination
//! - `listing` - Marketplace listings, listing drafts and catalogue cards
//! - `collection` - Personal collections, categories and saved cards
//!
//! # Architecture
//!
//! The core crate contains only types and algorithms - no I/O, no HTTP
//! clients, no clocks beyond timestamps handed in by the caller. The
//! `cardtrade-client` crate wires these to the REST backend.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod collection;
pub mod conversation;
pub mod filter;
pub mod listing;
pub mod shipping;
pub mod types;

pub use types::*;
