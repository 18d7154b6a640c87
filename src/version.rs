//! Version normalization and numeric encoding.
//!
//! Package records reference host versions in two shapes: dotted strings
//! (`7.5.0`, `4.7`) and the compact legacy form used by the old
//! compatibility config (`v47`, `v711`, `v7100`). Everything is reduced to a
//! [`CanonicalVersion`] triple, which in turn is packed into a single sortable
//! integer for range queries.
//!
//! # Numeric encoding
//!
//! Each component is zero-padded to three digits and concatenated:
//!
//! ```text
//! 7.5.0   -> 007 005 000 -> 7005000
//! 4.11.0  -> 004 011 000 -> 4011000
//! 0.0.1   -> 000 000 001 -> 1
//! ```
//!
//! Components above 999 would bleed into the neighbouring digit group, so
//! [`encode`] rejects them instead of producing a misordered value.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Largest value a single component may take in the numeric encoding.
pub const MAX_COMPONENT: u32 = 999;

/// Largest integer [`encode`] can produce (`999.999.999`).
pub const MAX_ENCODED: i64 = 999_999_999;

/// Errors raised by the numeric version encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// A component does not fit into its three-digit group.
    #[error("version component {component} = {value} exceeds {max}", max = MAX_COMPONENT)]
    ComponentOutOfRange {
        component: &'static str,
        value: u32,
    },

    /// An encoded value cannot have come from [`encode`].
    #[error("encoded version {0} is outside 0..={max}", max = MAX_ENCODED)]
    EncodedOutOfRange(i64),

    /// The token is not a `major.minor[.patch]` version.
    #[error("unparsable version token: '{0}'")]
    Unparsable(String),
}

/// A `(major, minor, patch)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl CanonicalVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Pack this version into its sortable integer form.
    pub fn encode(&self) -> Result<i64, VersionError> {
        encode(self)
    }
}

impl fmt::Display for CanonicalVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for CanonicalVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s).ok_or_else(|| VersionError::Unparsable(s.to_string()))
    }
}

/// Parse a dotted version token.
///
/// Accepts `major.minor` or `major.minor.patch` made of non-negative
/// integers, with surrounding whitespace ignored. A missing patch defaults to
/// zero. Anything else (`abc`, empty, four groups, signs) yields `None`.
pub fn normalize(token: &str) -> Option<CanonicalVersion> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    let mut parts = [0u32; 3];
    let mut count = 0;
    for group in token.split('.') {
        if count == parts.len() || group.is_empty() || !group.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        parts[count] = group.parse().ok()?;
        count += 1;
    }

    if count < 2 {
        return None;
    }

    Some(CanonicalVersion::new(parts[0], parts[1], parts[2]))
}

/// Parse a raw token from the legacy compatibility data.
///
/// The legacy store mixes dotted versions with a compact digit-only form.
/// In the compact form a trailing `0` marks a full three-part version
/// (`470` is 4.7.0, `7100` is 7.10.0); without it the digits are only a
/// major/minor pair (`47` is 4.7, `711` is 7.11). That rule has no general
/// inverse and is kept exactly as the data was written.
pub fn parse_legacy(raw: &str) -> Option<CanonicalVersion> {
    let lowered = raw.trim().to_lowercase();
    let mut token = lowered.as_str();
    token = token.strip_prefix("version").unwrap_or(token).trim_start();
    token = token.strip_prefix('v').unwrap_or(token);
    let token = token
        .trim_end_matches(".x")
        .trim_end_matches('x')
        .trim_matches('.')
        .trim();

    if token.is_empty() {
        return None;
    }

    if token.contains('.') {
        return normalize(token);
    }

    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let digit = |i: usize| u32::from(token.as_bytes()[i] - b'0');
    match (token.len(), token.ends_with('0')) {
        (1, _) => Some(CanonicalVersion::new(digit(0), 0, 0)),
        (2, _) => Some(CanonicalVersion::new(digit(0), digit(1), 0)),
        (3, true) => Some(CanonicalVersion::new(digit(0), digit(1), 0)),
        (3, false) => Some(CanonicalVersion::new(digit(0), token[1..].parse().ok()?, 0)),
        (4, true) => Some(CanonicalVersion::new(digit(0), token[1..3].parse().ok()?, 0)),
        _ => None,
    }
}

/// Pack a version into `major * 1_000_000 + minor * 1_000 + patch`.
pub fn encode(v: &CanonicalVersion) -> Result<i64, VersionError> {
    for (component, value) in [("major", v.major), ("minor", v.minor), ("patch", v.patch)] {
        if value > MAX_COMPONENT {
            return Err(VersionError::ComponentOutOfRange { component, value });
        }
    }

    Ok(i64::from(v.major) * 1_000_000 + i64::from(v.minor) * 1_000 + i64::from(v.patch))
}

/// Unpack a value produced by [`encode`].
pub fn decode(value: i64) -> Result<CanonicalVersion, VersionError> {
    if !(0..=MAX_ENCODED).contains(&value) {
        return Err(VersionError::EncodedOutOfRange(value));
    }

    // Range checked above, each group fits in u32.
    Ok(CanonicalVersion::new(
        (value / 1_000_000) as u32,
        (value / 1_000 % 1_000) as u32,
        (value % 1_000) as u32,
    ))
}
