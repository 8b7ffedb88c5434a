//! catalog-bridge core - Shared types library.
//!
//! This crate provides the types shared by every catalog-bridge component:
//! - `storefront` - Grid rendering, catalog sync and the HTTP server
//! - `cli` - Command-line tools for migrations, users and one-shot syncs
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no database
//! access, no HTTP clients.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, prices, SKUs, user roles and remote products

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
