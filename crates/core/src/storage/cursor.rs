//! Opaque pagination tokens.
//!
//! A cursor is the compact JSON form of a [`ResumeKey`], base64-encoded so it
//! can travel in a query string. Cursors are not secret and are not signed;
//! they only have to round-trip exactly.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::{RepositoryError, ResumeKey, Result};

/// Encodes a resume key into a cursor token.
pub fn encode_cursor(key: &ResumeKey) -> Result<String> {
    let json = serde_json::to_vec(key)
        .map_err(|e| RepositoryError::InvalidCursor(format!("failed to encode cursor: {e}")))?;
    Ok(STANDARD.encode(json))
}

/// Decodes a cursor token back into the resume key it was built from.
///
/// Every failure is an [`RepositoryError::InvalidCursor`]: a token that does
/// not decode is a client error, never "start from the beginning".
pub fn decode_cursor(token: &str) -> Result<ResumeKey> {
    let bytes = STANDARD
        .decode(token)
        .map_err(|e| RepositoryError::InvalidCursor(format!("invalid cursor encoding: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| RepositoryError::InvalidCursor(format!("invalid cursor format: {e}")))
}
