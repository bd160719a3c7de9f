//! Inventory domain: typed rows, account rules and commit pipelines.
//!
//! Purpose: keep every rule about account uniqueness, cascading renames and
//! dirty propagation independent of storage. Adapters reach the domain only
//! through the [`ports::InventoryStore`] trait.
//!
//! Public surface:
//! - [`ChangeCommitCoordinator`]: validate -> rename -> persist -> propagate.
//! - [`CascadingRenameEngine`], [`DirtyPropagator`]: the stages it drives.
//! - [`AccountSet`], [`NamingRules`]: value types shared with adapters.
//! - [`CommitError`] / [`ErrorCode`]: failure reporting.

pub mod accounts;
pub mod commit;
pub mod cpu_locks;
pub mod dirty;
pub mod error;
pub mod inventory;
pub mod naming_rules;
pub mod ports;
pub mod rename;
pub mod uniqueness;

pub use self::accounts::AccountSet;
pub use self::commit::{
    ChangeCommitCoordinator, MembershipOutcome, RoleEditOutcome, RoleEditRequest, SaveOutcome,
};
pub use self::cpu_locks::CpuLocks;
pub use self::dirty::{DirtyMarks, DirtyPropagator, PropagationFailed};
pub use self::error::{CommitError, ErrorCode};
pub use self::inventory::{
    Cpu, CpuAssignment, CpuAssignmentParseError, CpuId, EdgeFile, EdgeFileId, Role, RoleId,
    ThreadAssignment, ThreadAssignmentId, UNASSIGNED_CPU_TOKEN,
};
pub use self::naming_rules::{NamingRule, NamingRules, NamingRulesError, RoleResolver};
pub use self::rename::{
    AccountCountMismatch, AppliedRename, CascadingRenameEngine, JournalEntry, Rename,
    RenameJournal, RenamePlan, RenameReport, compute_renames, edge_file_suffix,
};
pub use self::uniqueness::{AccountConflict, Candidate, ConflictingRole, find_conflicts};
