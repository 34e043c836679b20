//! Barker storefront library.
//!
//! The front server for the Barker pet-food shop: it guards `/admin` and
//! `/checkout` by cookie, proxies login, quotes shipping for the checkout
//! form and serves the exported frontend. The [`session`] module holds the
//! client-side token lifecycle (storage, cookie mirror, silent refresh) that
//! the CLI drives.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;
