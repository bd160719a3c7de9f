//! Internal Diesel row structs for inventory tables.
//!
//! These types stay inside the persistence layer. Conversions into domain
//! types live next to the rows they convert.

use diesel::prelude::*;

use crate::domain::{
    AccountSet, Cpu, CpuAssignment, CpuId, EdgeFile, EdgeFileId, Role, RoleId, ThreadAssignment,
    ThreadAssignmentId,
};

use super::schema::{cpus, edgefiles, edgemomsetup, roles};

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = roles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct RoleRow {
    pub id: i64,
    pub role: String,
    pub ipadr: String,
    pub accounts: String,
    pub cpuid: Option<i64>,
    pub hasdata: bool,
    pub description: String,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Self {
            id: RoleId::new(row.id),
            name: row.role,
            ipadr: row.ipadr,
            accounts: AccountSet::parse(&row.accounts),
            cpu: CpuAssignment::from_column(row.cpuid),
            has_data: row.hasdata,
            description: row.description,
        }
    }
}

/// Role columns written by an edit; `hasdata` is not among them.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = roles)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct RoleUpdate<'a> {
    pub role: &'a str,
    pub ipadr: &'a str,
    pub accounts: String,
    pub cpuid: Option<i64>,
    pub description: &'a str,
}

impl<'a> From<&'a Role> for RoleUpdate<'a> {
    fn from(role: &'a Role) -> Self {
        Self {
            role: &role.name,
            ipadr: &role.ipadr,
            accounts: role.accounts.serialize(),
            cpuid: role.cpu.to_column(),
            description: &role.description,
        }
    }
}

// ---------------------------------------------------------------------------
// Cpus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = cpus)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct CpuRow {
    pub id: i64,
    pub cpu: String,
    pub nodenumber: i32,
    pub ipadr: String,
    pub os: String,
    pub hasdata: bool,
    pub edgeprop: String,
    pub crontab: String,
}

impl From<CpuRow> for Cpu {
    fn from(row: CpuRow) -> Self {
        Self {
            id: CpuId::new(row.id),
            name: row.cpu,
            node_number: row.nodenumber,
            ipadr: row.ipadr,
            os: row.os,
            has_data: row.hasdata,
            edgeprop: row.edgeprop,
            crontab: row.crontab,
        }
    }
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = cpus)]
pub(crate) struct CpuUpdate<'a> {
    pub cpu: &'a str,
    pub nodenumber: i32,
    pub ipadr: &'a str,
    pub os: &'a str,
    pub edgeprop: &'a str,
    pub crontab: &'a str,
}

impl<'a> From<&'a Cpu> for CpuUpdate<'a> {
    fn from(cpu: &'a Cpu) -> Self {
        Self {
            cpu: &cpu.name,
            nodenumber: cpu.node_number,
            ipadr: &cpu.ipadr,
            os: &cpu.os,
            edgeprop: &cpu.edgeprop,
            crontab: &cpu.crontab,
        }
    }
}

// ---------------------------------------------------------------------------
// Edgefiles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = edgefiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct EdgeFileRow {
    pub id: i64,
    pub edgefile: String,
    pub content: String,
}

impl From<EdgeFileRow> for EdgeFile {
    fn from(row: EdgeFileRow) -> Self {
        Self {
            id: EdgeFileId::new(row.id),
            name: row.edgefile,
            content: row.content,
        }
    }
}

/// Full edgefile row, used for upserts keyed by id.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = edgefiles)]
pub(crate) struct EdgeFileUpsert<'a> {
    pub id: i64,
    pub edgefile: &'a str,
    pub content: &'a str,
}

impl<'a> From<&'a EdgeFile> for EdgeFileUpsert<'a> {
    fn from(file: &'a EdgeFile) -> Self {
        Self {
            id: file.id.get(),
            edgefile: &file.name,
            content: &file.content,
        }
    }
}

// ---------------------------------------------------------------------------
// Thread assignments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = edgemomsetup)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ThreadAssignmentRow {
    pub id: i64,
    pub roleid: i64,
    pub account: String,
    pub edgefileid: Option<i64>,
    pub tag: String,
    pub args: String,
}

impl From<ThreadAssignmentRow> for ThreadAssignment {
    fn from(row: ThreadAssignmentRow) -> Self {
        Self {
            id: ThreadAssignmentId::new(row.id),
            role_id: RoleId::new(row.roleid),
            account: row.account,
            // Legacy rows use 0 for "no edgefile".
            edge_file_id: row.edgefileid.filter(|id| *id != 0).map(EdgeFileId::new),
            tag: row.tag,
            args: row.args,
        }
    }
}
