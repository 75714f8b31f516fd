//! Core types used throughout KVForge
//!
//! This module contains the fundamental data types shared by the protocol,
//! store, and server crates.

use std::fmt;
use std::ops::Deref;

/// Protocol-level maximum length of a single argument, in bytes.
pub const MAX_TOKEN_LEN: usize = 4096;

/// Protocol-level maximum number of arguments in one request.
pub const MAX_ARGS: usize = 1024;

/// An opaque, length-bounded, UTF-8 byte string — the protocol's universal
/// argument type. Unlike a bare `Vec<u8>`, constructing a `Token` enforces
/// the length and encoding rules at the boundary, rather than scattering
/// those checks across every call site.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Token(Vec<u8>);

impl Token {
    /// Builds a `Token` from a string already known to satisfy the protocol's
    /// length bound (e.g. literals used in tests and internal responses).
    pub fn new(s: impl Into<String>) -> Self {
        let s = s.into();
        debug_assert!(s.len() <= MAX_TOKEN_LEN);
        Token(s.into_bytes())
    }

    /// Validates `bytes` against the protocol's length and UTF-8 constraints.
    ///
    /// # Errors
    ///
    /// Returns `None` if `bytes` exceeds [`MAX_TOKEN_LEN`] or is not valid UTF-8.
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        if bytes.len() > MAX_TOKEN_LEN {
            return None;
        }
        std::str::from_utf8(&bytes).ok()?;
        Some(Token(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // Safety of `unwrap`: constructors only ever admit valid UTF-8.
        std::str::from_utf8(&self.0).unwrap()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl Deref for Token {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Token::new(s)
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Token::new(s)
    }
}

/// Wire-protocol response status codes. These numeric values are part
/// of the ABI and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    /// RES_OK — the command completed and produced a result.
    Ok = 0,
    /// RES_NX — "not found / no result."
    Nx = 1,
    /// RES_ERR — the command could not be executed as given.
    Err = 2,
}

impl Status {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Synchronization modes for the append-only log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// No synchronization: records are handed to the OS and never fsynced.
    #[default]
    None,
    /// Flush to the OS buffer after every record, but no fsync.
    Normal,
    /// Flush and `fsync` after every record.
    Full,
}

impl std::str::FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(SyncMode::None),
            "normal" => Ok(SyncMode::Normal),
            "full" => Ok(SyncMode::Full),
            other => Err(format!(
                "invalid sync mode '{other}' (expected none, normal, or full)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_rejects_oversize() {
        let bytes = vec![b'a'; MAX_TOKEN_LEN + 1];
        assert!(Token::from_bytes(bytes).is_none());
    }

    #[test]
    fn token_rejects_non_utf8() {
        assert!(Token::from_bytes(vec![0xff, 0xfe]).is_none());
    }

    #[test]
    fn token_round_trips_bytes() {
        let t = Token::from_bytes(b"hello".to_vec()).unwrap();
        assert_eq!(t.as_bytes(), b"hello");
        assert_eq!(t.as_str(), "hello");
    }

    #[test]
    fn sync_mode_parses_case_insensitively() {
        assert_eq!("Full".parse::<SyncMode>().unwrap(), SyncMode::Full);
        assert_eq!("NONE".parse::<SyncMode>().unwrap(), SyncMode::None);
        assert!("bogus".parse::<SyncMode>().is_err());
    }
}
