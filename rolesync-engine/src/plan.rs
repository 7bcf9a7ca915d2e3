// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure diffing of policy state against a platform snapshot.
//!
//! Planning doesn't perform any I/O, the engine fetches both sides, asks for a plan and then
//! executes it against the platform.
use std::collections::{BTreeMap, BTreeSet};

use rolesync_core::UserId;
use rolesync_platform::{PlatformMember, PlatformRoles, RoleId};

/// Changes needed to make the platform's role set match the policy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RolePlan {
    /// In the policy but not on the platform.
    pub create: BTreeSet<String>,

    /// On the platform but not in the policy.
    pub delete: BTreeSet<String>,

    /// On both sides, attributes get overwritten with the policy's.
    pub update: BTreeSet<String>,
}

impl RolePlan {
    /// Returns `true` if the role sets already match.
    pub fn is_converged(&self) -> bool {
        self.create.is_empty() && self.delete.is_empty()
    }
}

/// Diff the names of the sync-enabled policy roles against the platform's role names.
///
/// `platform` is expected to already be stripped of ignored roles.
pub fn plan_role_definitions(policy: &BTreeSet<String>, platform: &BTreeSet<String>) -> RolePlan {
    RolePlan {
        create: policy.difference(platform).cloned().collect(),
        delete: platform.difference(policy).cloned().collect(),
        update: platform.intersection(policy).cloned().collect(),
    }
}

/// Desired role set of a single platform member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberUpdate {
    pub user_id: UserId,

    /// Complete role set to apply, managed and unmanaged roles alike.
    pub role_ids: Vec<RoleId>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemberPlan {
    /// One entry per member whose managed roles differ from the policy.
    pub updates: Vec<MemberUpdate>,

    /// Members with differing roles who are on the no-sync list.
    pub skipped: Vec<UserId>,

    /// Policy members who aren't on the platform.
    pub absent: Vec<UserId>,

    /// Policy role names without a platform id, left out of every update.
    pub unmapped: BTreeSet<String>,

    /// Members holding unmanaged roles which are missing from the role list. Updating them would
    /// strip those roles, so they are left alone until the role list catches up.
    pub held: BTreeMap<UserId, BTreeSet<String>>,
}

/// Inputs to membership planning.
#[derive(Clone, Copy, Debug)]
pub struct MembershipSnapshot<'a> {
    /// Every platform member with their current role names.
    pub members: &'a [PlatformMember],

    /// Platform role name to id map.
    pub roles: &'a PlatformRoles,

    /// Names of all sync-enabled policy roles. Only these are added or removed.
    pub managed: &'a BTreeSet<String>,

    /// Role names each user should hold according to the policy.
    pub policy: &'a BTreeMap<UserId, BTreeSet<String>>,

    /// Users who are never updated.
    pub no_sync: &'a BTreeSet<UserId>,
}

/// Compute one role set update per member whose managed roles differ from the policy.
///
/// Members without a policy entry converge to an empty managed set. Roles a member holds which
/// aren't managed are carried over into the update unchanged.
pub fn plan_member_updates(snapshot: MembershipSnapshot<'_>) -> MemberPlan {
    let mut plan = MemberPlan::default();
    let empty = BTreeSet::new();

    let on_platform: BTreeSet<&UserId> = snapshot.members.iter().map(|m| &m.user_id).collect();
    plan.absent = snapshot
        .policy
        .keys()
        .filter(|user_id| !on_platform.contains(user_id))
        .cloned()
        .collect();

    for member in snapshot.members {
        let desired = snapshot.policy.get(&member.user_id).unwrap_or(&empty);
        let observed: BTreeSet<&String> = member
            .role_names
            .iter()
            .filter(|name| snapshot.managed.contains(*name))
            .collect();

        let converged = observed.len() == desired.len()
            && desired.iter().all(|name| observed.contains(name));
        if converged {
            continue;
        }

        if snapshot.no_sync.contains(&member.user_id) {
            plan.skipped.push(member.user_id.clone());
            continue;
        }

        let mut role_ids = BTreeSet::new();
        let mut missing = BTreeSet::new();
        for name in member
            .role_names
            .iter()
            .filter(|name| !snapshot.managed.contains(*name))
        {
            match snapshot.roles.id(name) {
                Some(id) => {
                    role_ids.insert(id.clone());
                }
                None => {
                    missing.insert(name.clone());
                }
            }
        }

        if !missing.is_empty() {
            plan.held.insert(member.user_id.clone(), missing);
            continue;
        }

        for name in desired {
            match snapshot.roles.id(name) {
                Some(id) => {
                    role_ids.insert(id.clone());
                }
                None => {
                    plan.unmapped.insert(name.clone());
                }
            }
        }

        plan.updates.push(MemberUpdate {
            user_id: member.user_id.clone(),
            role_ids: role_ids.into_iter().collect(),
        });
    }

    plan
}
