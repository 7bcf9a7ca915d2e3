// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filter set algebra.
//!
//! A role's member set is derived from its two filters: the intersection of both member sets, or
//! the members of one filter when the other side is the wildcard. Both sides being the wildcard
//! is not a meaningful definition and is rejected.
use std::collections::BTreeSet;

use thiserror::Error;

use crate::identity::UserId;
use crate::role::{FilterRef, Role};

/// Set of users resolved for a role.
pub type MemberSet = BTreeSet<UserId>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MembershipError {
    /// Both filters of a role are the wildcard.
    #[error("role `{0}` has a wildcard on both filters")]
    InvalidRoleDefinition(String),

    /// A role refers to a filter which does not exist.
    #[error("filter `{0}` doesn't exist")]
    FilterNotFound(String),
}

/// Compute the resolved member set for a pair of filter references.
///
/// `lookup` returns the members of a named filter, or `None` when the filter does not exist.
/// `role` is only used to label errors.
pub fn resolve_membership<F>(
    role: &str,
    filter_a: &FilterRef,
    filter_b: &FilterRef,
    mut lookup: F,
) -> Result<MemberSet, MembershipError>
where
    F: FnMut(&str) -> Option<MemberSet>,
{
    let mut members = |name: &str| {
        lookup(name).ok_or_else(|| MembershipError::FilterNotFound(name.to_string()))
    };

    match (filter_a, filter_b) {
        (FilterRef::Wildcard, FilterRef::Wildcard) => {
            Err(MembershipError::InvalidRoleDefinition(role.to_string()))
        }
        (FilterRef::Named(name), FilterRef::Wildcard)
        | (FilterRef::Wildcard, FilterRef::Named(name)) => members(name.as_str()),
        (FilterRef::Named(name_a), FilterRef::Named(name_b)) => {
            let a = members(name_a.as_str())?;
            let b = members(name_b.as_str())?;
            Ok(a.intersection(&b).cloned().collect())
        }
    }
}

/// Compute the resolved member set of a role.
pub fn resolve_role<F>(role: &Role, lookup: F) -> Result<MemberSet, MembershipError>
where
    F: FnMut(&str) -> Option<MemberSet>,
{
    resolve_membership(&role.short_name, &role.filter_a, &role.filter_b, lookup)
}

/// Names of the concrete filters a role refers to.
pub fn referenced_filters(role: &Role) -> impl Iterator<Item = &str> {
    [&role.filter_a, &role.filter_b]
        .into_iter()
        .filter_map(FilterRef::name)
}
