//! Error types for KVForge
//!
//! This module defines the error types used throughout KVForge's protocol,
//! store, and persistence layers.

use thiserror::Error;

/// The main error type for KVForge operations
#[derive(Error, Debug)]
pub enum Error {
    /// An I/O error occurred on a connection or the append-only log
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame was malformed, oversize, or not valid UTF-8. Fatal for the connection.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An unknown command, wrong arity, or unparseable score. Reported as (ERR, message).
    #[error("command error: {0}")]
    Command(String),

    /// A key or member was missing for a read or remove. Reported as (NX, "").
    #[error("not found")]
    NotFound,

    /// The append-only log could not be written. Logged; the in-memory mutation still applies.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Invalid startup configuration. Fatal before the listener binds.
    #[error("configuration error: {0}")]
    Config(String),
}

/// A specialized Result type for KVForge operations
pub type Result<T> = std::result::Result<T, Error>;
