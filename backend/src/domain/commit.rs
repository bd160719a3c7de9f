//! Commit pipelines for inventory edits.
//!
//! Every edit runs validate -> rename -> persist -> propagate as one linear
//! pipeline. Validation happens before any write. Once account renames have
//! started, the rename journal and the role write form one unit of work: if
//! either fails the journal is replayed backwards before the error is
//! returned.

use std::sync::Arc;

use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use super::accounts::AccountSet;
use super::cpu_locks::CpuLocks;
use super::dirty::{DirtyMarks, DirtyPropagator, PropagationFailed};
use super::error::CommitError;
use super::inventory::{Cpu, CpuAssignment, EdgeFile, Role, RoleId, ThreadAssignment};
use super::naming_rules::NamingRules;
use super::ports::{InventoryStore, InventoryStoreError};
use super::rename::{
    CascadingRenameEngine, Rename, RenameJournal, RenameReport, compute_renames,
};
use super::uniqueness::{Candidate, find_conflicts};

/// Proposed cpu and account changes for one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleEditRequest {
    pub role_id: RoleId,
    pub cpu: CpuAssignment,
    /// Whitespace-separated account list as typed by the operator.
    pub accounts: String,
}

/// Result of a successful role edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleEditOutcome {
    /// The role as persisted.
    pub role: Role,
    pub renames: RenameReport,
    pub marks: DirtyMarks,
}

/// Result of a successful account membership change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipOutcome {
    pub role: Role,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Thread assignments still bound to a removed account.
    pub orphaned: Vec<ThreadAssignment>,
    pub marks: DirtyMarks,
}

/// Dirty marks left by an edgefile or cpu save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveOutcome {
    pub marks: DirtyMarks,
}

/// Sequences validation, renames, persistence and dirty propagation.
pub struct ChangeCommitCoordinator<S: ?Sized> {
    store: Arc<S>,
    renames: CascadingRenameEngine<S>,
    propagator: DirtyPropagator<S>,
    cpu_locks: CpuLocks,
}

impl<S: ?Sized> ChangeCommitCoordinator<S> {
    /// Create a coordinator over `store` using the given naming rules.
    pub fn new(store: Arc<S>, naming_rules: Arc<NamingRules>) -> Self {
        Self {
            renames: CascadingRenameEngine::new(Arc::clone(&store)),
            propagator: DirtyPropagator::new(Arc::clone(&store), naming_rules),
            store,
            cpu_locks: CpuLocks::new(),
        }
    }
}

impl<S> ChangeCommitCoordinator<S>
where
    S: InventoryStore + ?Sized,
{
    /// Move a role and/or rename its accounts.
    ///
    /// # Errors
    ///
    /// - [`CommitError::DuplicateAccount`] when another role on the proposed
    ///   cpu already claims one of the accounts;
    /// - [`CommitError::AccountCountMismatch`] when the account count
    ///   changes (use [`Self::commit_account_membership`]);
    /// - [`CommitError::RenameFailed`] when the cascade or the role write
    ///   fails after renames started;
    /// - [`CommitError::PartiallyCommitted`] when the role was saved but
    ///   not every dirty flag could be set.
    pub async fn commit_role_edit(
        &self,
        request: RoleEditRequest,
    ) -> Result<RoleEditOutcome, CommitError> {
        let RoleEditRequest {
            role_id,
            cpu,
            accounts,
        } = request;
        let (current, _guards) = self.lock_role(role_id, cpu).await?;
        let proposed = AccountSet::parse(&accounts);

        if cpu != current.cpu {
            self.ensure_cpu_exists(cpu).await?;
        }
        self.ensure_accounts_unique(role_id, cpu, &proposed).await?;

        let accounts_changed = current.accounts.serialize() != proposed.serialize();
        let (renames, journal) = if accounts_changed {
            self.apply_renames(&current, &proposed).await?
        } else {
            (RenameReport::default(), RenameJournal::default())
        };

        let updated = Role {
            accounts: proposed,
            cpu,
            ..current.clone()
        };
        if let Err(source) = self.store.save_role(&updated).await {
            if journal.is_empty() {
                return Err(source.into());
            }
            return Err(self.roll_back(None, source, &renames, &journal).await);
        }

        let mut marks = DirtyMarks::default();
        let cpu_marks = self
            .propagator
            .on_cpu_reassignment(current.cpu, cpu)
            .await
            .map_err(|failure| partially_committed(&marks, failure))?;
        marks.merge(cpu_marks);
        let account_marks = self
            .propagator
            .on_accounts_changed(role_id, &current.accounts, &updated.accounts)
            .await
            .map_err(|failure| partially_committed(&marks, failure))?;
        marks.merge(account_marks);

        info!(
            %role_id,
            role = %updated.name,
            from_cpu = %current.cpu,
            to_cpu = %cpu,
            renames = renames.applied.len(),
            dirty_roles = marks.roles.len(),
            dirty_cpus = marks.cpus.len(),
            "role edit committed"
        );

        Ok(RoleEditOutcome {
            role: updated,
            renames,
            marks,
        })
    }

    /// Add or remove accounts of a role without cascading renames.
    ///
    /// Edgefiles and thread assignments of removed accounts are left in
    /// place; the assignments are reported as orphans for manual cleanup.
    ///
    /// # Errors
    ///
    /// [`CommitError::AccountRenameRequired`] when the account count is
    /// unchanged but tokens were replaced; renames go through
    /// [`Self::commit_role_edit`] so edgefiles and thread assignments follow.
    pub async fn commit_account_membership(
        &self,
        role_id: RoleId,
        accounts: &str,
    ) -> Result<MembershipOutcome, CommitError> {
        let (current, _guards) = self.lock_role(role_id, CpuAssignment::Unassigned).await?;

        let proposed = AccountSet::parse(accounts);
        let added = difference(&proposed, &current.accounts);
        let removed = difference(&current.accounts, &proposed);
        if !added.is_empty() && proposed.len() == current.accounts.len() {
            return Err(CommitError::AccountRenameRequired { removed, added });
        }
        self.ensure_accounts_unique(role_id, current.cpu, &proposed)
            .await?;

        let mut orphaned = Vec::new();
        for account in &removed {
            orphaned.extend(
                self.store
                    .list_thread_assignments_by_role_and_account(role_id, account)
                    .await?,
            );
        }

        let updated = Role {
            accounts: proposed,
            ..current.clone()
        };
        if current.accounts.serialize() != updated.accounts.serialize() {
            self.store.save_role(&updated).await?;
        }

        let marks = self
            .propagator
            .on_accounts_changed(role_id, &current.accounts, &updated.accounts)
            .await
            .map_err(|failure| partially_committed(&DirtyMarks::default(), failure))?;

        if !orphaned.is_empty() {
            warn!(
                %role_id,
                orphaned = orphaned.len(),
                "thread assignments still reference removed accounts"
            );
        }
        info!(
            %role_id,
            added = added.len(),
            removed = removed.len(),
            "account membership committed"
        );

        Ok(MembershipOutcome {
            role: updated,
            added,
            removed,
            orphaned,
            marks,
        })
    }

    /// Save an edgefile and mark every role that uses it.
    pub async fn commit_edge_file_edit(
        &self,
        edge_file: &EdgeFile,
    ) -> Result<SaveOutcome, CommitError> {
        self.store.save_edge_file(edge_file).await?;

        let marks = self
            .propagator
            .on_edge_file_saved(edge_file.id, &edge_file.name)
            .await
            .map_err(|failure| partially_committed(&DirtyMarks::default(), failure))?;

        info!(
            edge_file_id = %edge_file.id,
            edge_file = %edge_file.name,
            dirty_roles = marks.roles.len(),
            "edgefile committed"
        );
        Ok(SaveOutcome { marks })
    }

    /// Save a cpu after checking its node number is unique.
    pub async fn commit_cpu_edit(&self, cpu: &Cpu) -> Result<SaveOutcome, CommitError> {
        let _guard = self.cpu_locks.acquire(cpu.id).await;

        if self.store.get_cpu(cpu.id).await?.is_none() {
            return Err(CommitError::CpuNotFound(cpu.id));
        }
        let cpus = self.store.list_cpus().await?;
        if let Some(holder) = cpus
            .iter()
            .find(|other| other.id != cpu.id && other.node_number == cpu.node_number)
        {
            return Err(CommitError::DuplicateNodeNumber {
                node_number: cpu.node_number,
                held_by: holder.name.clone(),
            });
        }

        self.store.save_cpu(cpu).await?;
        let marks = self
            .propagator
            .on_cpu_saved(cpu.id)
            .await
            .map_err(|failure| partially_committed(&DirtyMarks::default(), failure))?;

        info!(cpu_id = %cpu.id, cpu = %cpu.name, "cpu committed");
        Ok(SaveOutcome { marks })
    }

    /// Load a role while holding the locks of its cpu and of `target`.
    ///
    /// A concurrent edit may move the role between the unlocked read and
    /// the lock; the locks are then released and taken again for the new
    /// cpu until the stored cpu matches the one held.
    async fn lock_role(
        &self,
        role_id: RoleId,
        target: CpuAssignment,
    ) -> Result<(Role, Vec<OwnedMutexGuard<()>>), CommitError> {
        let mut seen = self.load_role(role_id).await?.cpu;
        loop {
            let guards = self
                .cpu_locks
                .acquire_all(seen.cpu_id().into_iter().chain(target.cpu_id()))
                .await;
            let current = self.load_role(role_id).await?;
            if current.cpu == seen {
                return Ok((current, guards));
            }
            debug!(
                %role_id,
                from = %seen,
                to = %current.cpu,
                "role moved while waiting for its cpu lock"
            );
            drop(guards);
            seen = current.cpu;
        }
    }

    async fn load_role(&self, role_id: RoleId) -> Result<Role, CommitError> {
        self.store
            .get_role(role_id)
            .await?
            .ok_or(CommitError::RoleNotFound(role_id))
    }

    async fn ensure_cpu_exists(&self, cpu: CpuAssignment) -> Result<(), CommitError> {
        match cpu.cpu_id() {
            Some(cpu_id) if self.store.get_cpu(cpu_id).await?.is_none() => {
                Err(CommitError::CpuNotFound(cpu_id))
            }
            _ => Ok(()),
        }
    }

    async fn ensure_accounts_unique(
        &self,
        role_id: RoleId,
        cpu: CpuAssignment,
        accounts: &AccountSet,
    ) -> Result<(), CommitError> {
        let Some(cpu_id) = cpu.cpu_id() else {
            return Ok(());
        };
        let neighbours = self.store.list_roles_by_cpu(cpu_id).await?;
        let conflicts = find_conflicts(
            Candidate {
                role_id,
                cpu,
                accounts,
            },
            &neighbours,
        );
        match CommitError::duplicate_account(conflicts) {
            Some(error) => {
                warn!(%role_id, %cpu_id, error = %error, "account uniqueness violated");
                Err(error)
            }
            None => Ok(()),
        }
    }

    async fn apply_renames(
        &self,
        current: &Role,
        proposed: &AccountSet,
    ) -> Result<(RenameReport, RenameJournal), CommitError> {
        let renames = compute_renames(&current.accounts, proposed)?;
        let plan = self
            .renames
            .plan(current.id, &current.name, &renames)
            .await?;
        match self.renames.apply(&plan).await {
            Ok(applied) => Ok(applied),
            Err(interrupted) => Err(self
                .roll_back(
                    Some(interrupted.failed),
                    interrupted.source,
                    &interrupted.completed,
                    &interrupted.journal,
                )
                .await),
        }
    }

    async fn roll_back(
        &self,
        failed: Option<Rename>,
        source: InventoryStoreError,
        completed: &RenameReport,
        journal: &RenameJournal,
    ) -> CommitError {
        let applied: Vec<Rename> = completed.renames().cloned().collect();
        let unreverted = match self.renames.compensate(journal).await {
            Ok(()) => Vec::new(),
            Err(failure) => failure.unreverted,
        };
        CommitError::RenameFailed {
            failed,
            source,
            applied,
            unreverted,
        }
    }
}

fn partially_committed(marked: &DirtyMarks, failure: PropagationFailed) -> CommitError {
    let mut all = marked.clone();
    all.merge(failure.marked);
    CommitError::PartiallyCommitted {
        marked: all,
        source: failure.source,
    }
}

/// Tokens of `left` absent from `right`, in `left` order.
fn difference(left: &AccountSet, right: &AccountSet) -> Vec<String> {
    left.iter()
        .filter(|token| !right.contains(token))
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
#[path = "commit_tests.rs"]
mod tests;
