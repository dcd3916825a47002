//! Human-readable reference identifiers.
//!
//! A thread owns the prefix `<base>-<group>` and issues sub-numbers beneath
//! it, yielding display ids of the form `<base>-<group>.<sub:03>`, e.g.
//! `RF000000001US-7.001`. The group is unpadded (1-99); the sub-number is
//! always rendered with three digits (1-999).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Highest group number a base can issue.
pub const MAX_GROUP: u32 = 99;
/// Highest sub-number a thread can issue.
pub const MAX_SUB: u32 = 999;
/// Longest accepted base token.
pub const MAX_BASE_LEN: usize = 32;

/// Immutable per-portfolio root token (e.g. `RF000000001US`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Base(String);

impl Base {
    /// Validate and wrap a base token.
    ///
    /// Tokens are 1-32 ASCII alphanumerics. `-` and `.` are excluded so that
    /// a display id always parses back unambiguously.
    pub fn new(token: impl Into<String>) -> Result<Self, TypeError> {
        let token = token.into();
        if token.is_empty() {
            return Err(TypeError::InvalidBase {
                token,
                reason: "must not be empty".into(),
            });
        }
        if token.len() > MAX_BASE_LEN {
            return Err(TypeError::InvalidBase {
                token,
                reason: format!("longer than {MAX_BASE_LEN} characters"),
            });
        }
        if let Some(ch) = token.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(TypeError::InvalidBase {
                reason: format!("contains forbidden character {ch:?}"),
                token,
            });
        }
        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Base {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for Base {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Base {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

fn check_group(group: u32) -> Result<u32, TypeError> {
    if (1..=MAX_GROUP).contains(&group) {
        Ok(group)
    } else {
        Err(TypeError::GroupOutOfRange(group))
    }
}

fn check_sub(sub: u32) -> Result<u32, TypeError> {
    if (1..=MAX_SUB).contains(&sub) {
        Ok(sub)
    } else {
        Err(TypeError::SubOutOfRange(sub))
    }
}

/// The `<base>-<group>` prefix owned by a thread.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadPrefix {
    pub base: Base,
    pub group: u32,
}

impl ThreadPrefix {
    pub fn new(base: Base, group: u32) -> Result<Self, TypeError> {
        Ok(Self {
            base,
            group: check_group(group)?,
        })
    }

    /// The display id for a sub-number issued under this prefix.
    pub fn display_id(&self, sub: u32) -> Result<DisplayId, TypeError> {
        DisplayId::new(self.base.clone(), self.group, sub)
    }
}

impl fmt::Display for ThreadPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.base, self.group)
    }
}

/// Human-readable record identifier `<base>-<group>.<sub:03>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisplayId {
    base: Base,
    group: u32,
    sub: u32,
}

impl DisplayId {
    pub fn new(base: Base, group: u32, sub: u32) -> Result<Self, TypeError> {
        Ok(Self {
            base,
            group: check_group(group)?,
            sub: check_sub(sub)?,
        })
    }

    pub fn base(&self) -> &Base {
        &self.base
    }

    pub fn group(&self) -> u32 {
        self.group
    }

    pub fn sub(&self) -> u32 {
        self.sub
    }

    pub fn prefix(&self) -> ThreadPrefix {
        ThreadPrefix {
            base: self.base.clone(),
            group: self.group,
        }
    }
}

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}.{:03}", self.base, self.group, self.sub)
    }
}

impl FromStr for DisplayId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| TypeError::InvalidDisplayId {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let (base, rest) = s.split_once('-').ok_or_else(|| invalid("missing '-'"))?;
        let (group, sub) = rest.split_once('.').ok_or_else(|| invalid("missing '.'"))?;

        if group.is_empty()
            || group.starts_with('0')
            || !group.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid("group must be an unpadded decimal"));
        }
        if sub.len() != 3 || !sub.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("sub-number must be exactly three digits"));
        }

        let group: u32 = group.parse().map_err(|_| invalid("group is not a number"))?;
        let sub: u32 = sub.parse().map_err(|_| invalid("sub-number is not a number"))?;
        Self::new(Base::new(base)?, group, sub)
    }
}

impl Serialize for DisplayId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DisplayId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
