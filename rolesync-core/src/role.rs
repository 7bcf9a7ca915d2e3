// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::flag::{self, ParseFlagError};

/// Sentinel filter reference matching everyone on the other side of a role definition.
pub const WILDCARD: &str = "wildcard";

/// Reference from a role to one of its two filters.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterRef {
    /// Matches everyone, the role is then driven by the other filter alone.
    Wildcard,

    /// A concrete filter, looked up by name in the role's namespace.
    Named(String),
}

impl FilterRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, FilterRef::Wildcard)
    }

    /// Returns the filter name if this is not the wildcard.
    pub fn name(&self) -> Option<&str> {
        match self {
            FilterRef::Wildcard => None,
            FilterRef::Named(name) => Some(name),
        }
    }
}

impl From<&str> for FilterRef {
    fn from(value: &str) -> Self {
        if value == WILDCARD {
            FilterRef::Wildcard
        } else {
            FilterRef::Named(value.to_string())
        }
    }
}

impl Display for FilterRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterRef::Wildcard => write!(f, "{WILDCARD}"),
            FilterRef::Named(name) => write!(f, "{name}"),
        }
    }
}

impl Serialize for FilterRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FilterRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(FilterRef::from(value.as_str()))
    }
}

/// Where a role lives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleType {
    /// Only known to the policy store.
    #[default]
    Internal,

    /// Mirrored onto the chat platform.
    Discord,
}

impl RoleType {
    pub const ALL: [RoleType; 2] = [RoleType::Internal, RoleType::Discord];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleType::Internal => "internal",
            RoleType::Discord => "discord",
        }
    }
}

impl Display for RoleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RoleType {
    type Err = RoleUpdateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        RoleType::ALL
            .into_iter()
            .find(|role_type| role_type.as_str() == value)
            .ok_or_else(|| RoleUpdateError::InvalidRoleType(value.to_string()))
    }
}

/// A named policy entity whose membership is derived from two filters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Identity of the role within its namespace.
    pub short_name: String,

    /// Display name, this is what gets mirrored onto the platform.
    pub name: String,

    #[serde(rename = "type", default)]
    pub role_type: RoleType,

    pub filter_a: FilterRef,
    pub filter_b: FilterRef,

    #[serde(default)]
    pub color: u32,
    #[serde(default, deserialize_with = "flag::deserialize")]
    pub hoist: bool,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub permissions: u64,
    #[serde(default, deserialize_with = "flag::deserialize")]
    pub managed: bool,
    #[serde(default, deserialize_with = "flag::deserialize")]
    pub mentionable: bool,
    #[serde(default, deserialize_with = "flag::deserialize")]
    pub joinable: bool,

    /// Special-interest group, users may add themselves when the role is also joinable.
    #[serde(default, deserialize_with = "flag::deserialize")]
    pub sig: bool,

    /// Participate in platform mirroring.
    #[serde(default, deserialize_with = "flag::deserialize")]
    pub sync: bool,
}

impl Role {
    /// Returns a role with the given identity and filters and every other attribute unset.
    pub fn new(
        short_name: impl Into<String>,
        name: impl Into<String>,
        filter_a: FilterRef,
        filter_b: FilterRef,
    ) -> Self {
        Self {
            short_name: short_name.into(),
            name: name.into(),
            role_type: RoleType::default(),
            filter_a,
            filter_b,
            color: 0,
            hoist: false,
            position: 0,
            permissions: 0,
            managed: false,
            mentionable: false,
            joinable: false,
            sig: false,
            sync: false,
        }
    }

    /// Builder-style toggle of the sync flag.
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Builder-style toggle of the SIG flags.
    pub fn with_sig(mut self, sig: bool, joinable: bool) -> Self {
        self.sig = sig;
        self.joinable = joinable;
        self
    }

    /// Attributes which are mirrored onto the platform when the role is edited there.
    pub fn attributes(&self) -> RoleAttributes {
        RoleAttributes {
            name: self.name.clone(),
            color: self.color,
            permissions: self.permissions,
            position: self.position,
            hoist: self.hoist,
            mentionable: self.mentionable,
            managed: self.managed,
        }
    }

    /// Apply an administrative update to a single attribute.
    pub fn update(&mut self, key: RoleKey, value: &str) -> Result<(), RoleUpdateError> {
        if value.is_empty() {
            return Err(RoleUpdateError::EmptyValue(key));
        }

        match key {
            RoleKey::Name => self.name = value.to_string(),
            RoleKey::Color => self.color = parse_number(key, value)?,
            RoleKey::Position => self.position = parse_number(key, value)?,
            RoleKey::Permissions => self.permissions = parse_number(key, value)?,
            RoleKey::Hoist => self.hoist = flag::parse(value)?,
            RoleKey::Joinable => self.joinable = flag::parse(value)?,
            RoleKey::Managed => self.managed = flag::parse(value)?,
            RoleKey::Mentionable => self.mentionable = flag::parse(value)?,
            RoleKey::Sig => self.sig = flag::parse(value)?,
            RoleKey::Sync => self.sync = flag::parse(value)?,
        }

        Ok(())
    }
}

fn parse_number<T: FromStr>(key: RoleKey, value: &str) -> Result<T, RoleUpdateError> {
    value
        .trim()
        .parse()
        .map_err(|_| RoleUpdateError::InvalidNumber(key, value.to_string()))
}

/// Role attributes an administrator is allowed to update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RoleKey {
    Name,
    Color,
    Hoist,
    Position,
    Permissions,
    Joinable,
    Managed,
    Mentionable,
    Sig,
    Sync,
}

impl RoleKey {
    pub const ALL: [RoleKey; 10] = [
        RoleKey::Name,
        RoleKey::Color,
        RoleKey::Hoist,
        RoleKey::Position,
        RoleKey::Permissions,
        RoleKey::Joinable,
        RoleKey::Managed,
        RoleKey::Mentionable,
        RoleKey::Sig,
        RoleKey::Sync,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKey::Name => "Name",
            RoleKey::Color => "Color",
            RoleKey::Hoist => "Hoist",
            RoleKey::Position => "Position",
            RoleKey::Permissions => "Permissions",
            RoleKey::Joinable => "Joinable",
            RoleKey::Managed => "Managed",
            RoleKey::Mentionable => "Mentionable",
            RoleKey::Sig => "Sig",
            RoleKey::Sync => "Sync",
        }
    }
}

impl Display for RoleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RoleKey {
    type Err = RoleUpdateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        RoleKey::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| RoleUpdateError::InvalidKey(value.to_string()))
    }
}

/// Attributes of a role as the platform knows them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAttributes {
    pub name: String,
    pub color: u32,
    pub permissions: u64,
    pub position: i32,
    pub hoist: bool,
    pub mentionable: bool,
    pub managed: bool,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RoleUpdateError {
    #[error("`{0}` isn't a valid role key")]
    InvalidKey(String),

    #[error("`{0}` isn't a valid role type")]
    InvalidRoleType(String),

    #[error("value for {0} is required")]
    EmptyValue(RoleKey),

    #[error("`{1}` is not a valid number for {0}")]
    InvalidNumber(RoleKey, String),

    #[error(transparent)]
    InvalidFlag(#[from] ParseFlagError),
}
