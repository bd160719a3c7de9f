//! Commit errors raised by the coordinator.
//!
//! Validation failures are raised before any write and leave the inventory
//! untouched. Store failures during a cascade carry enough detail for an
//! operator to tell exactly which rows were changed.

use serde::{Deserialize, Serialize};

use super::dirty::DirtyMarks;
use super::inventory::{CpuId, RoleId};
use super::ports::InventoryStoreError;
use super::rename::{AccountCountMismatch, JournalEntry, Rename};
use super::uniqueness::AccountConflict;

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The edit would give two roles on one cpu the same account.
    DuplicateAccount,
    /// The rename path was asked to add or drop accounts.
    AccountCountMismatch,
    /// A membership change replaced accounts instead of adding or removing.
    AccountRenameRequired,
    /// The edit would give two cpus the same node number.
    DuplicateNodeNumber,
    /// The requested row does not exist.
    NotFound,
    /// The inventory store could not be reached.
    ServiceUnavailable,
    /// Some writes were applied and others were not.
    PartialSuccess,
    /// The store rejected a read or write.
    InternalError,
}

/// Failure of a commit pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommitError {
    /// Validation: an account is already claimed on the target cpu.
    #[error("{}", describe_conflicts(.conflicts))]
    DuplicateAccount {
        /// First duplicate in the proposed order.
        account: String,
        /// Every duplicate found.
        conflicts: Vec<AccountConflict>,
    },
    /// Validation: renames must keep the account count.
    #[error(transparent)]
    AccountCountMismatch(#[from] AccountCountMismatch),
    /// Validation: the membership path only adds or removes accounts.
    #[error(
        "replacing {} with {} keeps the account count; rename the accounts instead",
        .removed.join(","),
        .added.join(",")
    )]
    AccountRenameRequired {
        removed: Vec<String>,
        added: Vec<String>,
    },
    /// Validation: node numbers are unique across cpus.
    #[error("node number {node_number} is already used by cpu `{held_by}`")]
    DuplicateNodeNumber { node_number: i32, held_by: String },
    #[error("role {0} does not exist")]
    RoleNotFound(RoleId),
    #[error("cpu {0} does not exist")]
    CpuNotFound(CpuId),
    /// A store call failed before anything was written.
    #[error(transparent)]
    Store(#[from] InventoryStoreError),
    /// The rename cascade or the role write failed after renames started.
    #[error("{}", describe_rename_failure(.failed, .source, .applied, .unreverted))]
    RenameFailed {
        /// The rename being applied when the store failed, or `None` when
        /// the renames succeeded and the role write failed.
        failed: Option<Rename>,
        source: InventoryStoreError,
        /// Renames that completed before the failure.
        applied: Vec<Rename>,
        /// Writes compensation could not reverse; empty when rolled back.
        unreverted: Vec<JournalEntry>,
    },
    /// The primary row was saved but dirty propagation stopped early.
    #[error("changes saved but dirty propagation failed: {source}")]
    PartiallyCommitted {
        marked: DirtyMarks,
        source: InventoryStoreError,
    },
}

impl CommitError {
    /// Build a duplicate-account error from a non-empty conflict list.
    pub(crate) fn duplicate_account(conflicts: Vec<AccountConflict>) -> Option<Self> {
        let account = conflicts.first()?.account.clone();
        Some(Self::DuplicateAccount { account, conflicts })
    }

    /// Stable code for adapters.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::DuplicateAccount { .. } => ErrorCode::DuplicateAccount,
            Self::AccountCountMismatch(_) => ErrorCode::AccountCountMismatch,
            Self::AccountRenameRequired { .. } => ErrorCode::AccountRenameRequired,
            Self::DuplicateNodeNumber { .. } => ErrorCode::DuplicateNodeNumber,
            Self::RoleNotFound(_) | Self::CpuNotFound(_) => ErrorCode::NotFound,
            Self::Store(InventoryStoreError::Connection { .. }) => ErrorCode::ServiceUnavailable,
            Self::Store(_) => ErrorCode::InternalError,
            Self::RenameFailed { unreverted, .. } if unreverted.is_empty() => {
                ErrorCode::InternalError
            }
            Self::RenameFailed { .. } | Self::PartiallyCommitted { .. } => {
                ErrorCode::PartialSuccess
            }
        }
    }

    /// Whether the inventory was left exactly as it was before the commit.
    pub fn left_inventory_unchanged(&self) -> bool {
        match self {
            Self::RenameFailed { unreverted, .. } => unreverted.is_empty(),
            Self::PartiallyCommitted { .. } => false,
            _ => true,
        }
    }
}

fn describe_conflicts(conflicts: &[AccountConflict]) -> String {
    conflicts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn describe_rename_failure(
    failed: &Option<Rename>,
    source: &InventoryStoreError,
    applied: &[Rename],
    unreverted: &[JournalEntry],
) -> String {
    let stage = match failed {
        Some(rename) => format!("account rename {rename} failed"),
        None => "saving the role after renaming accounts failed".to_owned(),
    };
    if unreverted.is_empty() {
        return format!("{stage}: {source}; all rename writes were rolled back");
    }
    let applied = applied
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{stage}: {source}; partial success, {} write(s) could not be rolled back (renames completed: [{applied}])",
        unreverted.len()
    )
}

#[cfg(test)]
mod tests {
    //! Error codes and operator-facing messages.

    use rstest::rstest;

    use super::*;
    use crate::domain::uniqueness::ConflictingRole;
    use crate::domain::EdgeFileId;

    fn dl_conflict() -> AccountConflict {
        AccountConflict {
            account: "dl".to_owned(),
            held_by: Some(ConflictingRole {
                id: RoleId::new(2),
                name: "DL".to_owned(),
            }),
        }
    }

    #[rstest]
    fn duplicate_account_names_the_offending_account() {
        let err = CommitError::duplicate_account(vec![dl_conflict()]).expect("one conflict");
        assert_eq!(err.code(), ErrorCode::DuplicateAccount);
        assert_eq!(
            err.to_string(),
            "account `dl` is already used by role `DL` on this cpu"
        );
        assert!(err.left_inventory_unchanged());
    }

    #[rstest]
    fn empty_conflict_list_is_not_an_error() {
        assert!(CommitError::duplicate_account(Vec::new()).is_none());
    }

    #[rstest]
    fn connection_failures_are_service_unavailable() {
        let err = CommitError::from(InventoryStoreError::connection("refused"));
        assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
    }

    #[rstest]
    fn rolled_back_rename_is_reported_as_such() {
        let err = CommitError::RenameFailed {
            failed: Some(Rename::new("b", "c")),
            source: InventoryStoreError::query("timeout"),
            applied: Vec::new(),
            unreverted: Vec::new(),
        };
        assert_eq!(err.code(), ErrorCode::InternalError);
        assert!(err.to_string().contains("rolled back"));
        assert!(err.left_inventory_unchanged());
    }

    #[rstest]
    fn unreverted_rename_is_partial_success() {
        let err = CommitError::RenameFailed {
            failed: Some(Rename::new("b", "c")),
            source: InventoryStoreError::query("timeout"),
            applied: vec![Rename::new("a", "z")],
            unreverted: vec![JournalEntry::EdgeFileRenamed {
                id: EdgeFileId::new(1),
                from: "cfg.R.a".to_owned(),
                to: "cfg.R.z".to_owned(),
            }],
        };
        assert_eq!(err.code(), ErrorCode::PartialSuccess);
        let message = err.to_string();
        assert!(message.contains("partial success"));
        assert!(message.contains("a -> z"));
        assert!(!err.left_inventory_unchanged());
    }
}
