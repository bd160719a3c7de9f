//! Dirty-flag propagation.
//!
//! Deployment agents poll the `hasdata` flag of roles and cpus to learn
//! which nodes need their configuration pushed again. The propagator only
//! ever sets flags; clearing them is the agents' job.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use super::accounts::AccountSet;
use super::inventory::{CpuAssignment, CpuId, EdgeFileId, RoleId};
use super::naming_rules::NamingRules;
use super::ports::{InventoryStore, InventoryStoreError};

/// Rows marked dirty by one propagation call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyMarks {
    pub roles: BTreeSet<RoleId>,
    pub cpus: BTreeSet<CpuId>,
}

impl DirtyMarks {
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty() && self.cpus.is_empty()
    }

    /// Fold `other` into `self`.
    pub fn merge(&mut self, other: Self) {
        self.roles.extend(other.roles);
        self.cpus.extend(other.cpus);
    }
}

/// Marking stopped at a store failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("dirty propagation stopped: {source}")]
pub struct PropagationFailed {
    /// Flags set before the failure.
    pub marked: DirtyMarks,
    pub source: InventoryStoreError,
}

/// Marks roles and cpus whose deployed configuration went stale.
#[derive(Clone)]
pub struct DirtyPropagator<S: ?Sized> {
    store: Arc<S>,
    naming_rules: Arc<NamingRules>,
}

impl<S: ?Sized> DirtyPropagator<S> {
    pub fn new(store: Arc<S>, naming_rules: Arc<NamingRules>) -> Self {
        Self {
            store,
            naming_rules,
        }
    }

    pub fn naming_rules(&self) -> &NamingRules {
        &self.naming_rules
    }
}

impl<S> DirtyPropagator<S>
where
    S: InventoryStore + ?Sized,
{
    /// Mark both ends of a cpu move. Unassigned ends are skipped.
    pub async fn on_cpu_reassignment(
        &self,
        old: CpuAssignment,
        new: CpuAssignment,
    ) -> Result<DirtyMarks, PropagationFailed> {
        let mut marks = DirtyMarks::default();
        if old == new {
            return Ok(marks);
        }
        for cpu_id in [old.cpu_id(), new.cpu_id()].into_iter().flatten() {
            self.mark_cpu(cpu_id, &mut marks).await?;
        }
        Ok(marks)
    }

    /// Mark the role when its serialised account list changed.
    ///
    /// Reordering counts as a change.
    pub async fn on_accounts_changed(
        &self,
        role_id: RoleId,
        old: &AccountSet,
        new: &AccountSet,
    ) -> Result<DirtyMarks, PropagationFailed> {
        let mut marks = DirtyMarks::default();
        if old.serialize() != new.serialize() {
            self.mark_role(role_id, &mut marks).await?;
        }
        Ok(marks)
    }

    /// Mark a cpu whose own payloads were edited.
    pub async fn on_cpu_saved(&self, cpu_id: CpuId) -> Result<DirtyMarks, PropagationFailed> {
        let mut marks = DirtyMarks::default();
        self.mark_cpu(cpu_id, &mut marks).await?;
        Ok(marks)
    }

    /// Mark every role using a saved edgefile.
    ///
    /// Roles referencing the file through a thread assignment are marked
    /// first, then every role implied by the naming rules. Names that do not
    /// match an existing role are skipped.
    pub async fn on_edge_file_saved(
        &self,
        edge_file_id: EdgeFileId,
        edge_file_name: &str,
    ) -> Result<DirtyMarks, PropagationFailed> {
        let mut marks = DirtyMarks::default();

        let referencing = self
            .store
            .list_thread_assignments_by_edge_file(edge_file_id)
            .await
            .map_err(|source| PropagationFailed {
                marked: marks.clone(),
                source,
            })?;
        let referenced_roles: BTreeSet<RoleId> = referencing
            .iter()
            .map(|assignment| assignment.role_id)
            .collect();
        for role_id in referenced_roles {
            self.mark_role(role_id, &mut marks).await?;
        }

        for role_name in self.naming_rules.roles_for(edge_file_name) {
            let role = self
                .store
                .find_role_by_name(&role_name)
                .await
                .map_err(|source| PropagationFailed {
                    marked: marks.clone(),
                    source,
                })?;
            match role {
                Some(role) if !marks.roles.contains(&role.id) => {
                    self.mark_role(role.id, &mut marks).await?;
                }
                Some(_) => {}
                None => debug!(
                    edge_file = edge_file_name,
                    role = %role_name,
                    "naming rule names an unknown role"
                ),
            }
        }

        Ok(marks)
    }

    async fn mark_role(
        &self,
        role_id: RoleId,
        marks: &mut DirtyMarks,
    ) -> Result<(), PropagationFailed> {
        self.store
            .mark_role_dirty(role_id)
            .await
            .map_err(|source| PropagationFailed {
                marked: marks.clone(),
                source,
            })?;
        debug!(%role_id, "role marked dirty");
        marks.roles.insert(role_id);
        Ok(())
    }

    async fn mark_cpu(&self, cpu_id: CpuId, marks: &mut DirtyMarks) -> Result<(), PropagationFailed> {
        self.store
            .mark_cpu_dirty(cpu_id)
            .await
            .map_err(|source| PropagationFailed {
                marked: marks.clone(),
                source,
            })?;
        debug!(%cpu_id, "cpu marked dirty");
        marks.cpus.insert(cpu_id);
        Ok(())
    }
}

#[cfg(test)]
#[path = "dirty_tests.rs"]
mod tests;
