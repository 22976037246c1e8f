//! Varejo storefront library.
//!
//! Cart reconciliation and checkout orchestration for the public
//! storefront, exposed as a library so route handlers and the checkout
//! flow can be tested without a running server.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod clients;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
