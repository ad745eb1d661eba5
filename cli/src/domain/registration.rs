//! Domain name registration model.
//!
//! Pure types only — no I/O, no async.

use std::fmt;

use serde::Serialize;

use super::error::RegistrationError;

/// A domain name registered under the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredDomain {
    pub name: String,
    /// Provider status code; see [`RegisteredDomain::status_label`].
    pub status: String,
    /// Registry type, e.g. `gTLD` or `ccTLD`.
    pub kind: String,
    pub registered_at: String,
    pub expires_at: String,
}

impl RegisteredDomain {
    /// Readable form of the provider's status code.
    #[must_use]
    pub fn status_label(&self) -> &str {
        match self.status.as_str() {
            "1" => "renewal due",
            "2" => "redemption due",
            "3" => "normal",
            other => other,
        }
    }
}

/// Whether a domain name can be registered, as the registry reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Registrable,
    PreRegistration,
    /// Pending deletion; can be reserved.
    Reservable,
    Taken,
    CheckFailed,
    Suspended,
    Blacklisted,
    Unknown(i64),
}

impl Availability {
    /// Map the registry's numeric availability code.
    #[must_use]
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Registrable,
            3 => Self::PreRegistration,
            4 => Self::Reservable,
            0 => Self::Taken,
            -1 => Self::CheckFailed,
            -2 => Self::Suspended,
            -3 => Self::Blacklisted,
            other => Self::Unknown(other),
        }
    }

    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            Self::Registrable => 1,
            Self::PreRegistration => 3,
            Self::Reservable => 4,
            Self::Taken => 0,
            Self::CheckFailed => -1,
            Self::Suspended => -2,
            Self::Blacklisted => -3,
            Self::Unknown(code) => code,
        }
    }

    /// True when a registration order would be accepted now.
    #[must_use]
    pub fn is_registrable(self) -> bool {
        self == Self::Registrable
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registrable => f.write_str("registrable"),
            Self::PreRegistration => f.write_str("open for pre-registration"),
            Self::Reservable => f.write_str("pending deletion, can be reserved"),
            Self::Taken => f.write_str("not registrable"),
            Self::CheckFailed => f.write_str("check failed"),
            Self::Suspended => f.write_str("registration suspended"),
            Self::Blacklisted => f.write_str("blacklisted"),
            Self::Unknown(code) => write!(f, "unknown ({code})"),
        }
    }
}

/// Result of an availability check for one name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainCheck {
    pub name: String,
    pub availability: Availability,
    /// Registry's explanation when the name is not registrable.
    pub reason: String,
    /// One-year registration price in CNY, when quoted.
    pub price: Option<i64>,
}

/// Normalize a domain name for a check: trimmed, lower-case, at least two
/// labels, each 1..=63 characters of letters, digits, hyphens or non-ASCII
/// (internationalized names), and not starting or ending with a hyphen.
///
/// # Errors
///
/// Returns [`RegistrationError::InvalidName`] for anything else.
pub fn normalize_domain_name(raw: &str) -> Result<String, RegistrationError> {
    let name = raw.trim().trim_end_matches('.').to_lowercase();
    let invalid = || RegistrationError::InvalidName(raw.trim().to_string());
    if name.len() > 253 {
        return Err(invalid());
    }
    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() < 2 {
        return Err(invalid());
    }
    for label in labels {
        let chars = label.chars().count();
        if chars == 0 || chars > 63 || label.starts_with('-') || label.ends_with('-') {
            return Err(invalid());
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || !c.is_ascii())
        {
            return Err(invalid());
        }
    }
    Ok(name)
}
