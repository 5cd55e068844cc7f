// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Encoding primitives shared by the expression built-ins: md5 digests,
//! standard base64, and query-style url encoding (space as `+`).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use md5::{Digest, Md5};

/// Lowercase hex md5 digest (32 characters).
pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Standard (padded) base64 encoding.
pub fn base64_encode(data: &[u8]) -> String {
    BASE64.encode(data)
}

/// Standard (padded) base64 decoding; errors on malformed input.
pub fn base64_decode(data: &[u8]) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(data)
}

/// application/x-www-form-urlencoded escaping: space becomes `+`,
/// reserved and control bytes are percent-encoded.
pub fn url_encode(data: &[u8]) -> String {
    urlencoding::encode_binary(data).replace("%20", "+")
}

/// Inverse of [`url_encode`]: `+` becomes space before percent-decoding,
/// so `%2B` still round-trips to a literal `+`.
pub fn url_decode(data: &str) -> Result<String, std::string::FromUtf8Error> {
    let unplussed = data.replace('+', " ");
    urlencoding::decode(&unplussed).map(|cow| cow.into_owned())
}

/// Raw byte-slice containment used by `bcontains` and the reverse
/// collector's record check.
pub fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}
