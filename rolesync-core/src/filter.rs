// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

use crate::role::WILDCARD;

/// A named, explicitly managed set of users.
///
/// The member set itself is kept by the policy store, this is only the filter's description
/// entry. A filter "exists" exactly when its description entry exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub name: String,
    pub description: String,
}

impl Filter {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    /// The wildcard sentinel is reserved and can't be used as a filter name.
    pub fn is_reserved_name(name: &str) -> bool {
        name == WILDCARD
    }
}
