//! Validated table and index identifiers.
//!
//! Names reach the store as table names and as on-disk directory names, so
//! they are checked against `[A-Za-z_][A-Za-z0-9_]{0,62}` once at the edge
//! and carried as newtypes afterwards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MAX_IDENT_LEN: usize = 63;

fn validate(kind: &str, raw: &str) -> Result<()> {
    let mut chars = raw.chars();
    let Some(first) = chars.next() else {
        return Err(Error::validation(format!("{kind} name must not be empty")));
    };
    if raw.len() > MAX_IDENT_LEN {
        return Err(Error::validation(format!(
            "{kind} name '{raw}' exceeds {MAX_IDENT_LEN} characters"
        )));
    }
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(Error::validation(format!(
            "{kind} name '{raw}' must start with a letter or underscore"
        )));
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(Error::validation(format!(
            "{kind} name '{raw}' contains invalid character {bad:?}"
        )));
    }
    Ok(())
}

macro_rules! identifier {
    ($name:ident, $kind:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Result<Self> {
                let raw = raw.into();
                validate($kind, &raw)?;
                Ok(Self(raw))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = Error;
            fn from_str(s: &str) -> Result<Self> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;
            fn try_from(s: String) -> Result<Self> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(v: $name) -> String {
                v.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(TableName, "table");
identifier!(IndexName, "index");
