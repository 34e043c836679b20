//! Barker Core - shared types and checkout rules.
//!
//! This crate holds the pieces of the Barker pet-food storefront that do not
//! touch the network. It is shared by:
//! - `storefront` - HTTP front, route guard and token lifecycle
//! - `cli` - operator tooling
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no clocks. Callers pass in the current time where it matters.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, prices and emails
//! - [`shipping`] - Shipping zones and postal-code resolution
//! - [`checkout`] - Shipping quotes and order totals for the checkout form
//! - [`cart`] - The customer's cart
//! - [`auth`] - JWT claim decoding and role normalization

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod shipping;
pub mod types;

pub use types::*;
