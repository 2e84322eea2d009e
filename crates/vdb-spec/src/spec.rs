use std::fmt;
use std::str::FromStr;

use crate::error::{SpecError, SpecResult};
use crate::registry::MEM_PROTOCOL;

/// Validate a protocol name: a lowercase ASCII letter followed by lowercase
/// letters, digits, `+`, `.` or `-`.
pub fn validate_protocol(protocol: &str) -> SpecResult<()> {
    let invalid = |reason: &str| SpecError::InvalidSpec {
        spec: protocol.to_string(),
        reason: reason.to_string(),
    };
    let mut chars = protocol.chars();
    match chars.next() {
        None => return Err(invalid("protocol must not be empty")),
        Some(c) if !c.is_ascii_lowercase() => {
            return Err(invalid("protocol must start with a lowercase letter"))
        }
        Some(_) => {}
    }
    if chars.any(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '.' | '-'))) {
        return Err(invalid("protocol may only contain a-z, 0-9, '+', '.' and '-'"));
    }
    Ok(())
}

/// A parsed `<protocol>:<location>` database name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DatabaseSpec {
    pub protocol: String,
    /// Empty only for the bare ephemeral `mem` spec.
    pub database_name: String,
}

impl DatabaseSpec {
    pub fn parse(spec: &str) -> SpecResult<Self> {
        if spec == MEM_PROTOCOL {
            return Ok(Self::ephemeral());
        }
        let Some((protocol, location)) = spec.split_once(':') else {
            return Err(SpecError::InvalidSpec {
                spec: spec.to_string(),
                reason: "expected <protocol>:<location>".into(),
            });
        };
        validate_protocol(protocol).map_err(|e| match e {
            SpecError::InvalidSpec { reason, .. } => SpecError::InvalidSpec {
                spec: spec.to_string(),
                reason,
            },
            other => other,
        })?;
        if location.is_empty() && protocol != MEM_PROTOCOL {
            return Err(SpecError::InvalidSpec {
                spec: spec.to_string(),
                reason: format!("protocol {protocol} needs a location"),
            });
        }
        Ok(Self {
            protocol: protocol.to_string(),
            database_name: location.to_string(),
        })
    }

    /// The bare `mem` spec: a fresh store that nothing else shares.
    pub fn ephemeral() -> Self {
        Self {
            protocol: MEM_PROTOCOL.to_string(),
            database_name: String::new(),
        }
    }

    pub fn is_ephemeral(&self) -> bool {
        self.protocol == MEM_PROTOCOL && self.database_name.is_empty()
    }
}

impl fmt::Display for DatabaseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.database_name.is_empty() {
            write!(f, "{}", self.protocol)
        } else {
            write!(f, "{}:{}", self.protocol, self.database_name)
        }
    }
}

impl FromStr for DatabaseSpec {
    type Err = SpecError;

    fn from_str(s: &str) -> SpecResult<Self> {
        Self::parse(s)
    }
}
