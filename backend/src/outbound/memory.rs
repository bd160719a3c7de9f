//! Process-local inventory store.
//!
//! Holds every table in ordered maps behind one mutex. Used by the
//! integration suites and for dry runs; it supports injected write failures
//! so rollback paths can be exercised without a database.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::ports::{InventoryStore, InventoryStoreError};
use crate::domain::{
    Cpu, CpuId, EdgeFile, EdgeFileId, Role, RoleId, ThreadAssignment, ThreadAssignmentId,
};

#[derive(Debug, Default)]
struct Tables {
    roles: BTreeMap<RoleId, Role>,
    cpus: BTreeMap<CpuId, Cpu>,
    edge_files: BTreeMap<EdgeFileId, EdgeFile>,
    thread_assignments: BTreeMap<ThreadAssignmentId, ThreadAssignment>,
}

#[derive(Debug, Default)]
struct Faults {
    edge_file_targets: HashSet<String>,
    thread_assignments: HashSet<ThreadAssignmentId>,
    role_writes: bool,
    dirty_marks: bool,
}

/// In-memory [`InventoryStore`] with seeding and fault injection helpers.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    tables: Mutex<Tables>,
    faults: Mutex<Faults>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn injected(operation: &str) -> InventoryStoreError {
    InventoryStoreError::query(format!("injected failure: {operation}"))
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_role(&self, role: Role) {
        lock(&self.tables).roles.insert(role.id, role);
    }

    pub fn insert_cpu(&self, cpu: Cpu) {
        lock(&self.tables).cpus.insert(cpu.id, cpu);
    }

    pub fn insert_edge_file(&self, edge_file: EdgeFile) {
        lock(&self.tables).edge_files.insert(edge_file.id, edge_file);
    }

    pub fn insert_thread_assignment(&self, assignment: ThreadAssignment) {
        lock(&self.tables)
            .thread_assignments
            .insert(assignment.id, assignment);
    }

    pub fn role(&self, id: RoleId) -> Option<Role> {
        lock(&self.tables).roles.get(&id).cloned()
    }

    pub fn cpu(&self, id: CpuId) -> Option<Cpu> {
        lock(&self.tables).cpus.get(&id).cloned()
    }

    pub fn edge_file(&self, id: EdgeFileId) -> Option<EdgeFile> {
        lock(&self.tables).edge_files.get(&id).cloned()
    }

    pub fn thread_assignment(&self, id: ThreadAssignmentId) -> Option<ThreadAssignment> {
        lock(&self.tables).thread_assignments.get(&id).cloned()
    }

    /// Names of every edgefile, in id order.
    pub fn edge_file_names(&self) -> Vec<String> {
        lock(&self.tables)
            .edge_files
            .values()
            .map(|file| file.name.clone())
            .collect()
    }

    /// Reset every `has_data` flag, as the deployment agents do.
    pub fn clear_dirty_flags(&self) {
        let mut tables = lock(&self.tables);
        tables.roles.values_mut().for_each(|role| role.has_data = false);
        tables.cpus.values_mut().for_each(|cpu| cpu.has_data = false);
    }

    /// Make every rename of an edgefile *to* `name` fail.
    pub fn fail_edge_file_rename_to(&self, name: impl Into<String>) {
        lock(&self.faults).edge_file_targets.insert(name.into());
    }

    /// Make every account update of `id` fail.
    pub fn fail_thread_assignment_update(&self, id: ThreadAssignmentId) {
        lock(&self.faults).thread_assignments.insert(id);
    }

    pub fn fail_role_writes(&self) {
        lock(&self.faults).role_writes = true;
    }

    pub fn fail_dirty_marks(&self) {
        lock(&self.faults).dirty_marks = true;
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn get_role(&self, id: RoleId) -> Result<Option<Role>, InventoryStoreError> {
        Ok(self.role(id))
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, InventoryStoreError> {
        Ok(lock(&self.tables)
            .roles
            .values()
            .find(|role| role.name == name)
            .cloned())
    }

    async fn list_roles_by_cpu(&self, cpu_id: CpuId) -> Result<Vec<Role>, InventoryStoreError> {
        Ok(lock(&self.tables)
            .roles
            .values()
            .filter(|role| role.cpu.cpu_id() == Some(cpu_id))
            .cloned()
            .collect())
    }

    async fn save_role(&self, role: &Role) -> Result<(), InventoryStoreError> {
        if lock(&self.faults).role_writes {
            return Err(injected("save_role"));
        }
        let mut tables = lock(&self.tables);
        let stored = tables
            .roles
            .get_mut(&role.id)
            .ok_or_else(|| InventoryStoreError::missing_row("roles", role.id.get()))?;
        let has_data = stored.has_data;
        *stored = Role {
            has_data,
            ..role.clone()
        };
        Ok(())
    }

    async fn get_cpu(&self, id: CpuId) -> Result<Option<Cpu>, InventoryStoreError> {
        Ok(self.cpu(id))
    }

    async fn list_cpus(&self) -> Result<Vec<Cpu>, InventoryStoreError> {
        Ok(lock(&self.tables).cpus.values().cloned().collect())
    }

    async fn save_cpu(&self, cpu: &Cpu) -> Result<(), InventoryStoreError> {
        let mut tables = lock(&self.tables);
        let stored = tables
            .cpus
            .get_mut(&cpu.id)
            .ok_or_else(|| InventoryStoreError::missing_row("cpus", cpu.id.get()))?;
        let has_data = stored.has_data;
        *stored = Cpu {
            has_data,
            ..cpu.clone()
        };
        Ok(())
    }

    async fn save_edge_file(&self, edge_file: &EdgeFile) -> Result<(), InventoryStoreError> {
        self.insert_edge_file(edge_file.clone());
        Ok(())
    }

    async fn get_edge_files_by_name_suffix(
        &self,
        suffix: &str,
    ) -> Result<Vec<EdgeFile>, InventoryStoreError> {
        Ok(lock(&self.tables)
            .edge_files
            .values()
            .filter(|file| file.name.ends_with(suffix))
            .cloned()
            .collect())
    }

    async fn rename_edge_file(
        &self,
        id: EdgeFileId,
        new_name: &str,
    ) -> Result<(), InventoryStoreError> {
        if lock(&self.faults).edge_file_targets.contains(new_name) {
            return Err(injected("rename_edge_file"));
        }
        let mut tables = lock(&self.tables);
        let file = tables
            .edge_files
            .get_mut(&id)
            .ok_or_else(|| InventoryStoreError::missing_row("edgefiles", id.get()))?;
        new_name.clone_into(&mut file.name);
        Ok(())
    }

    async fn list_thread_assignments_by_role_and_account(
        &self,
        role_id: RoleId,
        account: &str,
    ) -> Result<Vec<ThreadAssignment>, InventoryStoreError> {
        Ok(lock(&self.tables)
            .thread_assignments
            .values()
            .filter(|assignment| assignment.role_id == role_id && assignment.account == account)
            .cloned()
            .collect())
    }

    async fn update_thread_assignment_account(
        &self,
        id: ThreadAssignmentId,
        account: &str,
    ) -> Result<(), InventoryStoreError> {
        if lock(&self.faults).thread_assignments.contains(&id) {
            return Err(injected("update_thread_assignment_account"));
        }
        let mut tables = lock(&self.tables);
        let assignment = tables
            .thread_assignments
            .get_mut(&id)
            .ok_or_else(|| InventoryStoreError::missing_row("edgemomsetup", id.get()))?;
        account.clone_into(&mut assignment.account);
        Ok(())
    }

    async fn list_thread_assignments_by_edge_file(
        &self,
        edge_file_id: EdgeFileId,
    ) -> Result<Vec<ThreadAssignment>, InventoryStoreError> {
        Ok(lock(&self.tables)
            .thread_assignments
            .values()
            .filter(|assignment| assignment.edge_file_id == Some(edge_file_id))
            .cloned()
            .collect())
    }

    async fn mark_cpu_dirty(&self, id: CpuId) -> Result<(), InventoryStoreError> {
        if lock(&self.faults).dirty_marks {
            return Err(injected("mark_cpu_dirty"));
        }
        let mut tables = lock(&self.tables);
        let cpu = tables
            .cpus
            .get_mut(&id)
            .ok_or_else(|| InventoryStoreError::missing_row("cpus", id.get()))?;
        cpu.has_data = true;
        Ok(())
    }

    async fn mark_role_dirty(&self, id: RoleId) -> Result<(), InventoryStoreError> {
        if lock(&self.faults).dirty_marks {
            return Err(injected("mark_role_dirty"));
        }
        let mut tables = lock(&self.tables);
        let role = tables
            .roles
            .get_mut(&id)
            .ok_or_else(|| InventoryStoreError::missing_row("roles", id.get()))?;
        role.has_data = true;
        Ok(())
    }
}
