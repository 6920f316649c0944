// Copyright (c) 2026 Dataverse Broker Contributors
// SPDX-License-Identifier: AGPL-3.0

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Header every OSB request must carry.
pub const API_VERSION_HEADER: &str = "X-Broker-API-Version";

/// The only major version of the OSB API this broker speaks.
pub const SUPPORTED_MAJOR: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
}

impl ApiVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// A platform version is acceptable when it shares our major version and
    /// is not older than `minimum`.
    pub fn is_supported_by(&self, minimum: &ApiVersion) -> bool {
        self.major == SUPPORTED_MAJOR && self.major == minimum.major && self.minor >= minimum.minor
    }
}

impl Default for ApiVersion {
    fn default() -> Self {
        Self::new(2, 13)
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid API version '{0}', expected <major>.<minor>")]
pub struct ApiVersionParseError(pub String);

impl FromStr for ApiVersion {
    type Err = ApiVersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (major, minor) = trimmed
            .split_once('.')
            .ok_or_else(|| ApiVersionParseError(s.to_string()))?;
        let major = major.parse().map_err(|_| ApiVersionParseError(s.to_string()))?;
        let minor = minor.parse().map_err(|_| ApiVersionParseError(s.to_string()))?;
        Ok(Self { major, minor })
    }
}

impl Serialize for ApiVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ApiVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
