//! Structured case identifiers.
//!
//! An identifier names one test across the local source set and the remote
//! system and is the sole join key between the two. The grammar is fixed:
//! `TC-LAYER-MODULE-NUMBER` where `LAYER` and `MODULE` are uppercase
//! alphanumeric tokens of 2 to 8 characters and `NUMBER` is a zero-padded
//! three digit integer, e.g. `TC-API-SYNC-001`.

use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CasebindError;

/// Fixed identifier prefix.
pub const ID_PREFIX: &str = "TC";

/// Width of the zero-padded numeric segment.
pub const ID_NUMBER_WIDTH: usize = 3;

static ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^TC-(?P<layer>[A-Z0-9]{2,8})-(?P<module>[A-Z0-9]{2,8})-(?P<number>[0-9]{3})$")
        .expect("identifier grammar regex is valid")
});

/// A validated case identifier.
///
/// Immutable once constructed. Ordering follows the string form, which
/// groups identifiers by layer, then module, then number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CaseId {
    raw: String,
    layer_len: usize,
    module_len: usize,
}

impl CaseId {
    /// Validate `value` against the identifier grammar.
    pub fn parse(value: &str) -> Result<Self, CasebindError> {
        let captures = ID_PATTERN.captures(value).ok_or_else(|| {
            let reason = if value.starts_with(ID_PREFIX) {
                if value != value.to_uppercase() {
                    "segments must be uppercase alphanumeric".to_string()
                } else {
                    format!(
                        "expected {ID_PREFIX}-LAYER-MODULE-NNN with a \
                         {ID_NUMBER_WIDTH}-digit zero-padded number"
                    )
                }
            } else {
                format!("missing '{ID_PREFIX}-' prefix")
            };
            CasebindError::InvalidId {
                value: value.to_string(),
                reason,
            }
        })?;
        Ok(CaseId {
            raw: value.to_string(),
            layer_len: captures["layer"].len(),
            module_len: captures["module"].len(),
        })
    }

    /// The layer segment, e.g. `API` in `TC-API-SYNC-001`.
    pub fn layer(&self) -> &str {
        let start = ID_PREFIX.len() + 1;
        &self.raw[start..start + self.layer_len]
    }

    /// The module segment, e.g. `SYNC` in `TC-API-SYNC-001`.
    pub fn module(&self) -> &str {
        let start = ID_PREFIX.len() + 1 + self.layer_len + 1;
        &self.raw[start..start + self.module_len]
    }

    /// The numeric segment parsed out of its zero padding.
    pub fn number(&self) -> u32 {
        self.raw[self.raw.len() - ID_NUMBER_WIDTH..]
            .parse()
            .expect("validated identifier ends in digits")
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Display for CaseId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for CaseId {
    type Err = CasebindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CaseId::parse(s)
    }
}

impl TryFrom<String> for CaseId {
    type Error = CasebindError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CaseId::parse(&value)
    }
}

impl From<CaseId> for String {
    fn from(id: CaseId) -> String {
        id.raw
    }
}
