//! Country resolution result type.

use std::fmt;

use serde::{Serialize, Serializer};

/// Country associated with a request address.
///
/// Real ISO codes and the non-country cases are separate variants, so a
/// genuine two-letter code can never collide with a sentinel label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Country {
    /// A resolved two-letter ISO country code (uppercase)
    Code(String),
    /// Address matched a configured local/private range
    Local,
    /// Address could not be resolved by any source
    Unknown,
    /// No client address was available
    Absent,
}

impl Country {
    /// Build a `Country` from a resolver result.
    pub fn from_resolved(code: Option<String>) -> Self {
        match code {
            Some(c) => Country::Code(c),
            None => Country::Unknown,
        }
    }

    /// Get the presentation label, or `None` for [`Country::Absent`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Country::Code(code) => Some(code),
            Country::Local => Some("LOCAL"),
            Country::Unknown => Some("UNKNOWN"),
            Country::Absent => None,
        }
    }

    /// Get the resolved ISO code, if this is a real country.
    pub fn code(&self) -> Option<&str> {
        match self {
            Country::Code(code) => Some(code),
            _ => None,
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str().unwrap_or("-"))
    }
}

impl Serialize for Country {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Absent serializes as null so the presentation layer can omit it
        self.as_str().serialize(serializer)
    }
}
