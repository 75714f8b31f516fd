//! Core types and error handling for KVForge
//!
//! This crate contains the fundamental types shared by the protocol, store,
//! and server crates:
//!
//! - Common error types with [`Error`] and [`Result`]
//! - The [`Token`] protocol argument type and [`Status`] response codes
//! - [`SyncMode`], the durability knob for the append-only log
//!
//! # Example
//!
//! ```
//! use kvforge_core::{Token, Status};
//!
//! let key = Token::new("user:123");
//! let value = Token::new("John Doe");
//! assert_eq!(Status::Ok.as_u8(), 0);
//! ```

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
