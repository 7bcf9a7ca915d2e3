// SPDX-License-Identifier: MIT OR Apache-2.0

//! Boolean flags stored as strings.
//!
//! Hash-based policy stores keep role flags as `"1"`/`"0"` or `"true"`/`"false"`. Every string
//! flag is turned into a `bool` by [`parse`] and nowhere else, including serde deserialisation
//! through [`deserialize`].
use serde::de::{self, Deserializer, Visitor};
use thiserror::Error;

/// Parse a string flag.
///
/// Accepts `"1"`, `"0"` and `"true"`, `"false"` in any letter case. Surrounding whitespace is
/// ignored.
pub fn parse(value: &str) -> Result<bool, ParseFlagError> {
    let value = value.trim();
    match value {
        "1" => Ok(true),
        "0" => Ok(false),
        _ if value.eq_ignore_ascii_case("true") => Ok(true),
        _ if value.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(ParseFlagError(value.to_string())),
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("`{0}` is not a valid flag, expected one of 1, 0, true, false")]
pub struct ParseFlagError(pub String);

/// Serde helper accepting either a native boolean or a string flag.
///
/// Use with `#[serde(deserialize_with = "rolesync_core::flag::deserialize")]`.
pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    struct FlagVisitor;

    impl Visitor<'_> for FlagVisitor {
        type Value = bool;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a boolean or one of \"1\", \"0\", \"true\", \"false\"")
        }

        fn visit_bool<E>(self, value: bool) -> Result<bool, E>
        where
            E: de::Error,
        {
            Ok(value)
        }

        fn visit_u64<E>(self, value: u64) -> Result<bool, E>
        where
            E: de::Error,
        {
            match value {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(E::custom(ParseFlagError(value.to_string()))),
            }
        }

        fn visit_str<E>(self, value: &str) -> Result<bool, E>
        where
            E: de::Error,
        {
            parse(value).map_err(E::custom)
        }
    }

    deserializer.deserialize_any(FlagVisitor)
}
