// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - PoC Engine Error Types
 * Production-ready error handling with thiserror
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScannerError>;

/// Engine error type. Verdicts and errors are distinct channels: a false
/// verdict is `Ok(false)`, never an `Err`.
#[derive(Error, Debug)]
pub enum ScannerError {
    /// PoC document could not be decoded from YAML/JSON
    #[error("failed to decode poc document: {0}")]
    Decode(String),

    /// PoC violates a structural invariant
    #[error("invalid poc `{name}`: {reason}")]
    InvalidPoc { name: String, reason: String },

    /// Expression failed to compile
    #[error("compile error in `{expression}`: {message}")]
    Compile { expression: String, message: String },

    /// Expression failed at evaluation time (type mismatch, bad argument,
    /// missing variable). Always fatal to the scan, never a false verdict.
    #[error("scan failed: evaluate error in `{expression}`: {message}")]
    Evaluate { expression: String, message: String },

    /// Search pattern is not a valid regex
    #[error("invalid search pattern `{pattern}`: {message}")]
    InvalidSearch { pattern: String, message: String },

    /// Request could not be constructed (malformed method or headers)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Target or probe URL failed to parse
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// Transport-level failure (connection refused, DNS, timeout)
    #[error("transport error: {0}")]
    Transport(String),
}
