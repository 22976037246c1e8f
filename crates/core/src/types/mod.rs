//! Core types for Varejo.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod document;
pub mod email;
pub mod id;

pub use document::{Cnpj, Cpf, DocumentError};
pub use email::{Email, EmailError};
pub use id::*;
