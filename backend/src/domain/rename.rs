//! Cascading account renames.
//!
//! Renaming a role's accounts position by position must carry the new names
//! into two dependent tables: edgefiles named `<prefix>.<role>.<account>` and
//! the role's thread assignments bound to the account. The engine reads all
//! affected rows before writing any of them, so swaps such as `a b` -> `b a`
//! do not chase their own output. Every successful write is journalled and
//! the journal can be replayed backwards to undo a failed batch.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use super::accounts::AccountSet;
use super::inventory::{EdgeFileId, RoleId, ThreadAssignmentId};
use super::ports::{InventoryStore, InventoryStoreError};

/// One positional account rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub old: String,
    pub new: String,
}

impl Rename {
    pub fn new(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
        }
    }
}

impl fmt::Display for Rename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.old, self.new)
    }
}

/// The rename path only supports one-to-one renames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("account count changed from {old} to {new}; renames must keep the count")]
pub struct AccountCountMismatch {
    pub old: usize,
    pub new: usize,
}

/// Pair up `old` and `new` by position and keep the differing pairs.
///
/// # Examples
/// ```
/// use edgeconfig::domain::{AccountSet, Rename, compute_renames};
///
/// let renames = compute_renames(&AccountSet::parse("a b"), &AccountSet::parse("a c"))
///     .expect("same length");
/// assert_eq!(renames, [Rename::new("b", "c")]);
/// ```
pub fn compute_renames(
    old: &AccountSet,
    new: &AccountSet,
) -> Result<Vec<Rename>, AccountCountMismatch> {
    if old.len() != new.len() {
        return Err(AccountCountMismatch {
            old: old.len(),
            new: new.len(),
        });
    }
    Ok(old
        .iter()
        .zip(new.iter())
        .filter(|(before, after)| before != after)
        .map(|(before, after)| Rename::new(before, after))
        .collect())
}

/// Suffix identifying a role/account pair inside edgefile names.
pub fn edge_file_suffix(role_name: &str, account: &str) -> String {
    format!("{role_name}.{account}")
}

/// The part of `name` before `suffix`, when the suffix sits on a dot
/// boundary (or is the whole name).
fn segment_stem<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    name.strip_suffix(suffix)
        .filter(|stem| stem.is_empty() || stem.ends_with('.'))
}

/// Planned edgefile rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeFileRewrite {
    pub id: EdgeFileId,
    pub from: String,
    pub to: String,
}

/// All row changes implied by one [`Rename`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameStep {
    pub rename: Rename,
    pub edge_files: Vec<EdgeFileRewrite>,
    pub thread_assignments: Vec<ThreadAssignmentId>,
}

/// Row-level plan for a batch of renames on one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    pub role_id: RoleId,
    pub role_name: String,
    pub steps: Vec<RenameStep>,
}

impl RenamePlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Rows touched by one applied rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedRename {
    pub rename: Rename,
    pub edge_files: usize,
    pub thread_assignments: usize,
}

/// Outcome of a fully applied rename batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameReport {
    pub applied: Vec<AppliedRename>,
}

impl RenameReport {
    pub fn renames(&self) -> impl Iterator<Item = &Rename> {
        self.applied.iter().map(|applied| &applied.rename)
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}

/// A row write that has been carried out and can be reversed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    EdgeFileRenamed {
        id: EdgeFileId,
        from: String,
        to: String,
    },
    ThreadAssignmentRebound {
        id: ThreadAssignmentId,
        from: String,
        to: String,
    },
}

impl fmt::Display for JournalEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EdgeFileRenamed { id, from, to } => {
                write!(f, "edgefile {id}: {from} -> {to}")
            }
            Self::ThreadAssignmentRebound { id, from, to } => {
                write!(f, "thread assignment {id}: {from} -> {to}")
            }
        }
    }
}

/// Ordered log of completed writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameJournal {
    entries: Vec<JournalEntry>,
}

impl RenameJournal {
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn record(&mut self, entry: JournalEntry) {
        self.entries.push(entry);
    }
}

/// A rename batch stopped part way through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameInterrupted {
    /// The rename whose writes failed.
    pub failed: Rename,
    pub source: InventoryStoreError,
    /// Renames fully applied before the failure.
    pub completed: RenameReport,
    /// Every write carried out, including those of `failed`.
    pub journal: RenameJournal,
}

/// Writes that could not be reversed during compensation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompensationFailure {
    pub unreverted: Vec<JournalEntry>,
    pub source: InventoryStoreError,
}

/// Engine that plans, applies and undoes account renames.
#[derive(Clone)]
pub struct CascadingRenameEngine<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> CascadingRenameEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S> CascadingRenameEngine<S>
where
    S: InventoryStore + ?Sized,
{
    /// Read every row each rename will touch.
    pub async fn plan(
        &self,
        role_id: RoleId,
        role_name: &str,
        renames: &[Rename],
    ) -> Result<RenamePlan, InventoryStoreError> {
        let mut steps = Vec::with_capacity(renames.len());
        for rename in renames {
            let old_suffix = edge_file_suffix(role_name, &rename.old);
            let new_suffix = edge_file_suffix(role_name, &rename.new);
            let edge_files = self
                .store
                .get_edge_files_by_name_suffix(&old_suffix)
                .await?
                .into_iter()
                .filter_map(|file| {
                    let to = format!("{}{new_suffix}", segment_stem(&file.name, &old_suffix)?);
                    Some(EdgeFileRewrite {
                        id: file.id,
                        from: file.name,
                        to,
                    })
                })
                .collect();
            let thread_assignments = self
                .store
                .list_thread_assignments_by_role_and_account(role_id, &rename.old)
                .await?
                .into_iter()
                .map(|assignment| assignment.id)
                .collect();
            steps.push(RenameStep {
                rename: rename.clone(),
                edge_files,
                thread_assignments,
            });
        }
        Ok(RenamePlan {
            role_id,
            role_name: role_name.to_owned(),
            steps,
        })
    }

    /// Carry out a plan, journalling each write.
    pub async fn apply(
        &self,
        plan: &RenamePlan,
    ) -> Result<(RenameReport, RenameJournal), RenameInterrupted> {
        let mut report = RenameReport::default();
        let mut journal = RenameJournal::default();

        for step in &plan.steps {
            if let Err(source) = self.apply_step(step, &mut journal).await {
                warn!(
                    role_id = %plan.role_id,
                    rename = %step.rename,
                    error = %source,
                    "account rename failed"
                );
                return Err(RenameInterrupted {
                    failed: step.rename.clone(),
                    source,
                    completed: report,
                    journal,
                });
            }
            info!(
                role_id = %plan.role_id,
                rename = %step.rename,
                edge_files = step.edge_files.len(),
                thread_assignments = step.thread_assignments.len(),
                "account renamed"
            );
            report.applied.push(AppliedRename {
                rename: step.rename.clone(),
                edge_files: step.edge_files.len(),
                thread_assignments: step.thread_assignments.len(),
            });
        }

        Ok((report, journal))
    }

    async fn apply_step(
        &self,
        step: &RenameStep,
        journal: &mut RenameJournal,
    ) -> Result<(), InventoryStoreError> {
        for rewrite in &step.edge_files {
            self.store.rename_edge_file(rewrite.id, &rewrite.to).await?;
            journal.record(JournalEntry::EdgeFileRenamed {
                id: rewrite.id,
                from: rewrite.from.clone(),
                to: rewrite.to.clone(),
            });
        }
        for id in &step.thread_assignments {
            self.store
                .update_thread_assignment_account(*id, &step.rename.new)
                .await?;
            journal.record(JournalEntry::ThreadAssignmentRebound {
                id: *id,
                from: step.rename.old.clone(),
                to: step.rename.new.clone(),
            });
        }
        Ok(())
    }

    /// Undo journalled writes, newest first.
    ///
    /// Keeps going after a failed reversal so as many rows as possible are
    /// restored; the writes left in place are returned with the first error.
    pub async fn compensate(&self, journal: &RenameJournal) -> Result<(), CompensationFailure> {
        let mut unreverted = Vec::new();
        let mut first_error = None;

        for entry in journal.entries().iter().rev() {
            let outcome = match entry {
                JournalEntry::EdgeFileRenamed { id, from, .. } => {
                    self.store.rename_edge_file(*id, from).await
                }
                JournalEntry::ThreadAssignmentRebound { id, from, .. } => {
                    self.store.update_thread_assignment_account(*id, from).await
                }
            };
            if let Err(error) = outcome {
                warn!(entry = %entry, error = %error, "failed to reverse rename write");
                unreverted.push(entry.clone());
                first_error.get_or_insert(error);
            }
        }

        match first_error {
            None => {
                if !journal.is_empty() {
                    info!(writes = journal.entries().len(), "rename writes reversed");
                }
                Ok(())
            }
            Some(source) => Err(CompensationFailure { unreverted, source }),
        }
    }
}

#[cfg(test)]
#[path = "rename_tests.rs"]
mod tests;
