//! Port for the relational inventory of roles, cpus, edgefiles and thread
//! assignments.
//!
//! The engine only needs row-at-a-time reads and writes keyed by id plus a
//! handful of filtered lists. Adapters must not cache rows across calls.

use async_trait::async_trait;

use crate::domain::{
    Cpu, CpuId, EdgeFile, EdgeFileId, Role, RoleId, ThreadAssignment, ThreadAssignmentId,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by inventory store adapters.
    pub enum InventoryStoreError {
        /// Store connection could not be established.
        Connection { message: String } =>
            "inventory store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "inventory store query failed: {message}",
        /// A write targeted a row that does not exist.
        MissingRow { table: String, id: i64 } =>
            "inventory store has no {table} row with id {id}",
    }
}

/// Read/write access to inventory rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Find a role by primary key.
    async fn get_role(&self, id: RoleId) -> Result<Option<Role>, InventoryStoreError>;

    /// Find a role by its exact, case-sensitive name.
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, InventoryStoreError>;

    /// List every role bound to `cpu_id`.
    async fn list_roles_by_cpu(&self, cpu_id: CpuId) -> Result<Vec<Role>, InventoryStoreError>;

    /// Overwrite an existing role row. The `has_data` field is not written;
    /// dirty flags only change through [`InventoryStore::mark_role_dirty`].
    async fn save_role(&self, role: &Role) -> Result<(), InventoryStoreError>;

    /// Find a cpu by primary key.
    async fn get_cpu(&self, id: CpuId) -> Result<Option<Cpu>, InventoryStoreError>;

    /// List every cpu.
    async fn list_cpus(&self) -> Result<Vec<Cpu>, InventoryStoreError>;

    /// Overwrite an existing cpu row, leaving `has_data` untouched.
    async fn save_cpu(&self, cpu: &Cpu) -> Result<(), InventoryStoreError>;

    /// Insert or overwrite an edgefile row.
    async fn save_edge_file(&self, edge_file: &EdgeFile) -> Result<(), InventoryStoreError>;

    /// List edgefiles whose name ends with `suffix` (plain text match).
    async fn get_edge_files_by_name_suffix(
        &self,
        suffix: &str,
    ) -> Result<Vec<EdgeFile>, InventoryStoreError>;

    /// Change the name of an edgefile.
    async fn rename_edge_file(
        &self,
        id: EdgeFileId,
        new_name: &str,
    ) -> Result<(), InventoryStoreError>;

    /// List thread assignments of `role_id` bound to `account`.
    async fn list_thread_assignments_by_role_and_account(
        &self,
        role_id: RoleId,
        account: &str,
    ) -> Result<Vec<ThreadAssignment>, InventoryStoreError>;

    /// Rebind a thread assignment to another account.
    async fn update_thread_assignment_account(
        &self,
        id: ThreadAssignmentId,
        new_account: &str,
    ) -> Result<(), InventoryStoreError>;

    /// List thread assignments referencing an edgefile.
    async fn list_thread_assignments_by_edge_file(
        &self,
        edge_file_id: EdgeFileId,
    ) -> Result<Vec<ThreadAssignment>, InventoryStoreError>;

    /// Set `hasdata` on a cpu.
    async fn mark_cpu_dirty(&self, id: CpuId) -> Result<(), InventoryStoreError>;

    /// Set `hasdata` on a role.
    async fn mark_role_dirty(&self, id: RoleId) -> Result<(), InventoryStoreError>;
}
