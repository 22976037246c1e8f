//! Varejo Core - Shared types library.
//!
//! This crate provides common types used across Varejo components:
//! - `storefront` - Public-facing purchasing pipeline (cart + checkout)
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. This keeps
//! it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, emails, and Brazilian
//!   tax documents

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
