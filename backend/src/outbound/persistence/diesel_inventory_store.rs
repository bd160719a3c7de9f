//! PostgreSQL-backed `InventoryStore` implementation using Diesel ORM.
//!
//! Every method checks out its own pooled connection. Writes touch exactly
//! one row and report [`InventoryStoreError::MissingRow`] when the row is
//! gone, so the rename journal never records a write that did not happen.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{InventoryStore, InventoryStoreError};
use crate::domain::{
    Cpu, CpuId, EdgeFile, EdgeFileId, Role, RoleId, ThreadAssignment, ThreadAssignmentId,
};

use super::diesel_error_mapping::{expect_one_row, map_diesel_error, map_pool_error};
use super::models::{
    CpuRow, CpuUpdate, EdgeFileRow, EdgeFileUpsert, RoleRow, RoleUpdate, ThreadAssignmentRow,
};
use super::pool::DbPool;
use super::schema::{cpus, edgefiles, edgemomsetup, roles};

/// Diesel-backed implementation of the [`InventoryStore`] port.
#[derive(Clone)]
pub struct DieselInventoryStore {
    pool: DbPool,
}

impl DieselInventoryStore {
    /// Create a new store with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Build a `LIKE` pattern matching names that end with `suffix` verbatim.
fn suffix_pattern(suffix: &str) -> String {
    let mut pattern = String::with_capacity(suffix.len() + 1);
    pattern.push('%');
    for ch in suffix.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern
}

#[async_trait]
impl InventoryStore for DieselInventoryStore {
    async fn get_role(&self, id: RoleId) -> Result<Option<Role>, InventoryStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<RoleRow> = roles::table
            .find(id.get())
            .select(RoleRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(err, "get_role"))?;
        Ok(row.map(Role::from))
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, InventoryStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<RoleRow> = roles::table
            .filter(roles::role.eq(name))
            .select(RoleRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(err, "find_role_by_name"))?;
        Ok(row.map(Role::from))
    }

    async fn list_roles_by_cpu(&self, cpu_id: CpuId) -> Result<Vec<Role>, InventoryStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<RoleRow> = roles::table
            .filter(roles::cpuid.eq(cpu_id.get()))
            .order(roles::id.asc())
            .select(RoleRow::as_select())
            .load(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "list_roles_by_cpu"))?;
        Ok(rows.into_iter().map(Role::from).collect())
    }

    async fn save_role(&self, role: &Role) -> Result<(), InventoryStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated = diesel::update(roles::table.find(role.id.get()))
            .set(RoleUpdate::from(role))
            .execute(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "save_role"))?;
        expect_one_row(updated, "roles", role.id.get())
    }

    async fn get_cpu(&self, id: CpuId) -> Result<Option<Cpu>, InventoryStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<CpuRow> = cpus::table
            .find(id.get())
            .select(CpuRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(err, "get_cpu"))?;
        Ok(row.map(Cpu::from))
    }

    async fn list_cpus(&self) -> Result<Vec<Cpu>, InventoryStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<CpuRow> = cpus::table
            .order(cpus::id.asc())
            .select(CpuRow::as_select())
            .load(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "list_cpus"))?;
        Ok(rows.into_iter().map(Cpu::from).collect())
    }

    async fn save_cpu(&self, cpu: &Cpu) -> Result<(), InventoryStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated = diesel::update(cpus::table.find(cpu.id.get()))
            .set(CpuUpdate::from(cpu))
            .execute(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "save_cpu"))?;
        expect_one_row(updated, "cpus", cpu.id.get())
    }

    async fn save_edge_file(&self, edge_file: &EdgeFile) -> Result<(), InventoryStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = EdgeFileUpsert::from(edge_file);
        diesel::insert_into(edgefiles::table)
            .values(&row)
            .on_conflict(edgefiles::id)
            .do_update()
            .set((
                edgefiles::edgefile.eq(excluded(edgefiles::edgefile)),
                edgefiles::content.eq(excluded(edgefiles::content)),
            ))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| map_diesel_error(err, "save_edge_file"))
    }

    async fn get_edge_files_by_name_suffix(
        &self,
        suffix: &str,
    ) -> Result<Vec<EdgeFile>, InventoryStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<EdgeFileRow> = edgefiles::table
            .filter(edgefiles::edgefile.like(suffix_pattern(suffix)))
            .order(edgefiles::id.asc())
            .select(EdgeFileRow::as_select())
            .load(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "get_edge_files_by_name_suffix"))?;
        Ok(rows.into_iter().map(EdgeFile::from).collect())
    }

    async fn rename_edge_file(
        &self,
        id: EdgeFileId,
        new_name: &str,
    ) -> Result<(), InventoryStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated = diesel::update(edgefiles::table.find(id.get()))
            .set(edgefiles::edgefile.eq(new_name))
            .execute(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "rename_edge_file"))?;
        expect_one_row(updated, "edgefiles", id.get())
    }

    async fn list_thread_assignments_by_role_and_account(
        &self,
        role_id: RoleId,
        account: &str,
    ) -> Result<Vec<ThreadAssignment>, InventoryStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<ThreadAssignmentRow> = edgemomsetup::table
            .filter(edgemomsetup::roleid.eq(role_id.get()))
            .filter(edgemomsetup::account.eq(account))
            .order(edgemomsetup::id.asc())
            .select(ThreadAssignmentRow::as_select())
            .load(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "list_thread_assignments_by_role_and_account"))?;
        Ok(rows.into_iter().map(ThreadAssignment::from).collect())
    }

    async fn update_thread_assignment_account(
        &self,
        id: ThreadAssignmentId,
        account: &str,
    ) -> Result<(), InventoryStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated = diesel::update(edgemomsetup::table.find(id.get()))
            .set(edgemomsetup::account.eq(account))
            .execute(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "update_thread_assignment_account"))?;
        expect_one_row(updated, "edgemomsetup", id.get())
    }

    async fn list_thread_assignments_by_edge_file(
        &self,
        edge_file_id: EdgeFileId,
    ) -> Result<Vec<ThreadAssignment>, InventoryStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<ThreadAssignmentRow> = edgemomsetup::table
            .filter(edgemomsetup::edgefileid.eq(edge_file_id.get()))
            .order(edgemomsetup::id.asc())
            .select(ThreadAssignmentRow::as_select())
            .load(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "list_thread_assignments_by_edge_file"))?;
        Ok(rows.into_iter().map(ThreadAssignment::from).collect())
    }

    async fn mark_cpu_dirty(&self, id: CpuId) -> Result<(), InventoryStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated = diesel::update(cpus::table.find(id.get()))
            .set(cpus::hasdata.eq(true))
            .execute(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "mark_cpu_dirty"))?;
        expect_one_row(updated, "cpus", id.get())
    }

    async fn mark_role_dirty(&self, id: RoleId) -> Result<(), InventoryStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated = diesel::update(roles::table.find(id.get()))
            .set(roles::hasdata.eq(true))
            .execute(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "mark_role_dirty"))?;
        expect_one_row(updated, "roles", id.get())
    }
}
