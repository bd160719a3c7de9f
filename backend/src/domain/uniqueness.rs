//! Per-cpu account uniqueness.
//!
//! Two roles placed on the same cpu must never claim the same OS account.
//! The check is pure: callers load the other roles on the proposed cpu and
//! hand them in.

use std::collections::HashSet;
use std::fmt;

use super::accounts::AccountSet;
use super::inventory::{CpuAssignment, Role, RoleId};

/// One proposed account that clashes with an existing claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountConflict {
    /// The duplicated account token.
    pub account: String,
    /// Role already holding the account, or `None` when the proposed list
    /// repeats the token itself.
    pub held_by: Option<ConflictingRole>,
}

/// Identity of the role that already claims an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictingRole {
    pub id: RoleId,
    pub name: String,
}

impl fmt::Display for AccountConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.held_by {
            Some(role) => write!(
                f,
                "account `{}` is already used by role `{}` on this cpu",
                self.account, role.name
            ),
            None => write!(f, "account `{}` is listed more than once", self.account),
        }
    }
}

/// A role proposal to be checked against its future cpu neighbours.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub role_id: RoleId,
    pub cpu: CpuAssignment,
    pub accounts: &'a AccountSet,
}

/// Collect every account conflict of `candidate` against `neighbours`.
///
/// Conflicts are returned in the order of the candidate's tokens, so the
/// first element is the first duplicate an operator would read. Roles with
/// the candidate's own id are ignored, and an unassigned cpu never
/// conflicts. Clashes that exist only between neighbours do not block the
/// candidate.
pub fn find_conflicts(candidate: Candidate<'_>, neighbours: &[Role]) -> Vec<AccountConflict> {
    if !candidate.cpu.is_assigned() {
        return Vec::new();
    }

    let others: Vec<&Role> = neighbours
        .iter()
        .filter(|role| role.id != candidate.role_id)
        .collect();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut conflicts = Vec::new();
    for token in candidate.accounts.iter() {
        if let Some(holder) = others.iter().find(|role| role.accounts.contains(token)) {
            conflicts.push(AccountConflict {
                account: token.to_owned(),
                held_by: Some(ConflictingRole {
                    id: holder.id,
                    name: holder.name.clone(),
                }),
            });
        } else if !seen.insert(token) {
            conflicts.push(AccountConflict {
                account: token.to_owned(),
                held_by: None,
            });
        }
    }
    conflicts
}

#[cfg(test)]
mod tests {
    //! Regression coverage for account uniqueness.

    use rstest::{fixture, rstest};

    use super::*;
    use crate::domain::CpuId;

    fn role(id: i64, name: &str, accounts: &str, cpu: i64) -> Role {
        Role {
            id: RoleId::new(id),
            name: name.to_owned(),
            ipadr: String::new(),
            accounts: AccountSet::parse(accounts),
            cpu: CpuAssignment::from_column(Some(cpu)),
            has_data: false,
            description: String::new(),
        }
    }

    #[fixture]
    fn node3() -> Vec<Role> {
        vec![role(1, "QS", "edge query", 3), role(2, "DL", "dl", 3)]
    }

    #[rstest]
    fn rejects_account_held_by_neighbour(node3: Vec<Role>) {
        let accounts = AccountSet::parse("edge dl");
        let conflicts = find_conflicts(
            Candidate {
                role_id: RoleId::new(1),
                cpu: CpuAssignment::Assigned(CpuId::new(3)),
                accounts: &accounts,
            },
            &node3,
        );

        assert_eq!(conflicts.len(), 1);
        let first = conflicts.first().expect("one conflict");
        assert_eq!(first.account, "dl");
        assert_eq!(
            first.held_by.as_ref().map(|held| held.name.as_str()),
            Some("DL")
        );
    }

    #[rstest]
    fn own_row_is_not_a_neighbour(node3: Vec<Role>) {
        let accounts = AccountSet::parse("edge query");
        let conflicts = find_conflicts(
            Candidate {
                role_id: RoleId::new(1),
                cpu: CpuAssignment::Assigned(CpuId::new(3)),
                accounts: &accounts,
            },
            &node3,
        );
        assert!(conflicts.is_empty());
    }

    #[rstest]
    fn unassigned_cpu_skips_the_check(node3: Vec<Role>) {
        let accounts = AccountSet::parse("dl dl");
        let conflicts = find_conflicts(
            Candidate {
                role_id: RoleId::new(9),
                cpu: CpuAssignment::Unassigned,
                accounts: &accounts,
            },
            &node3,
        );
        assert!(conflicts.is_empty());
    }

    #[rstest]
    fn repeated_token_in_proposal_conflicts() {
        let accounts = AccountSet::parse("vdl vdl");
        let conflicts = find_conflicts(
            Candidate {
                role_id: RoleId::new(4),
                cpu: CpuAssignment::Assigned(CpuId::new(3)),
                accounts: &accounts,
            },
            &[],
        );
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].held_by, None);
        assert!(conflicts[0].to_string().contains("more than once"));
    }

    #[rstest]
    fn all_conflicts_are_reported_in_token_order(node3: Vec<Role>) {
        let accounts = AccountSet::parse("query fresh dl edge");
        let conflicts = find_conflicts(
            Candidate {
                role_id: RoleId::new(7),
                cpu: CpuAssignment::Assigned(CpuId::new(3)),
                accounts: &accounts,
            },
            &node3,
        );
        let names: Vec<&str> = conflicts.iter().map(|c| c.account.as_str()).collect();
        assert_eq!(names, ["query", "dl", "edge"]);
    }

    #[rstest]
    fn clashes_between_neighbours_do_not_block_candidate() {
        let neighbours = vec![role(1, "A", "x", 3), role(2, "B", "x", 3)];
        let accounts = AccountSet::parse("y");
        let conflicts = find_conflicts(
            Candidate {
                role_id: RoleId::new(5),
                cpu: CpuAssignment::Assigned(CpuId::new(3)),
                accounts: &accounts,
            },
            &neighbours,
        );
        assert!(conflicts.is_empty());
    }
}
