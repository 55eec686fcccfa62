//! Core types, services and trait definitions for Memora.
//!
//! Two engines live here: advisory duplicate detection for proposed
//! memorials ([`duplicates`]) and the living-profile lifecycle that ends in an
//! irreversible conversion into a memorial ([`lifecycle`]).
//!
//! Nothing here speaks HTTP or SQL. Persistence is reached only through the
//! traits in [`store`].

// Trait methods spell out `Send` futures; impls use native `async fn`.
#![allow(async_fn_in_trait)]

pub mod duplicates;
pub mod error;
pub mod family;
pub mod lifecycle;
pub mod memorial;
pub mod normalize;
pub mod profile;
pub mod similarity;
pub mod store;

pub use error::{Error, ErrorKind, Result};
