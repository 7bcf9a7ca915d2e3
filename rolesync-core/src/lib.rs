// SPDX-License-Identifier: MIT OR Apache-2.0

//! Policy data types shared by the rolesync crates.
//!
//! A community's policy is a set of [`Role`]s. Each role is bound to two filters, named sets of
//! users, and derives its members from them with the set algebra in [`membership`]. Roles which
//! have the `sync` flag set are mirrored onto an external chat platform.
pub mod filter;
pub mod flag;
pub mod identity;
pub mod membership;
pub mod role;

pub use filter::Filter;
pub use flag::ParseFlagError;
pub use identity::{Namespace, UserId};
pub use membership::{MemberSet, MembershipError, resolve_membership, resolve_role};
pub use role::{FilterRef, Role, RoleAttributes, RoleKey, RoleType, RoleUpdateError, WILDCARD};
