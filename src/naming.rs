//! Collection naming: `<index>[:<env>][@<version>]`
//!
//! A logical index is served by an alias named `<index>[:<env>]`. Every
//! generation built for it is a concrete collection with the version (a unix
//! timestamp in seconds) appended after `@`. Parsing is two-staged: a syntactic
//! match that always succeeds, then a fallible version decode that yields an
//! absent version instead of an error, so names created outside this crate
//! never break listings.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>.*?)(?::(?P<env>.*?))?(?:@(?P<version>\d+))?$")
        .expect("collection name pattern is valid")
});

/// Generation marker of a collection: integer seconds since the unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(i64);

impl Version {
    /// Version for the current second
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.timestamp())
    }

    /// Decode a digit string; `None` when it does not fit a timestamp
    pub fn parse(digits: &str) -> Option<Self> {
        let seconds = digits.parse::<i64>().ok()?;
        DateTime::<Utc>::from_timestamp(seconds, 0)?;
        Some(Self(seconds))
    }

    pub fn seconds(&self) -> i64 {
        self.0
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.0, 0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Version {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s).ok_or_else(|| {
            crate::error::Error::InvalidArgument(format!("{} is not a valid version", s))
        })
    }
}

/// The components of a collection name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionName {
    pub index_name: String,
    pub env: Option<String>,
    pub version: Option<Version>,
}

impl CollectionName {
    pub fn new(index_name: impl Into<String>, env: Option<&str>, version: Option<Version>) -> Self {
        Self {
            index_name: index_name.into(),
            env: env.map(str::to_string),
            version,
        }
    }

    /// The alias this collection belongs to (`index[:env]`)
    pub fn alias_name(&self) -> String {
        alias_name(&self.index_name, self.env.as_deref())
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.alias_name())?;
        if let Some(version) = self.version {
            write!(f, "@{}", version)?;
        }
        Ok(())
    }
}

impl FromStr for CollectionName {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(parse(s))
    }
}

/// Split a collection name into index name, env and version.
///
/// A suffix after `@` that is not all digits, or that overflows a timestamp,
/// leaves the version absent; in the non-digit case the suffix stays part of
/// the index (or env) name.
pub fn parse(name: &str) -> CollectionName {
    let Some(captures) = NAME_PATTERN.captures(name) else {
        return CollectionName::new(name, None, None);
    };

    let index_name = captures
        .name("name")
        .map(|m| m.as_str())
        .unwrap_or(name)
        .to_string();
    let env = captures.name("env").map(|m| m.as_str().to_string());
    let version = captures
        .name("version")
        .and_then(|m| Version::parse(m.as_str()));

    CollectionName {
        index_name,
        env,
        version,
    }
}

/// `index[:env]@version`
pub fn compose(index_name: &str, env: Option<&str>, version: Version) -> String {
    format!("{}@{}", alias_name(index_name, env), version)
}

/// `index[:env]`
pub fn alias_name(index_name: &str, env: Option<&str>) -> String {
    match env {
        Some(env) => format!("{}:{}", index_name, env),
        None => index_name.to_string(),
    }
}
