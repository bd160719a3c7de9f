//! Inventory rows the engine reads and writes.
//!
//! These types mirror the four row kinds kept by the inventory store: roles,
//! cpus, edgefiles and thread assignments (edgemomsetup rows). Payload fields
//! such as `edgeprop`, `crontab`, edgefile content and thread arguments are
//! opaque to the engine and are carried through untouched.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::accounts::AccountSet;

/// Token the console uses for "no cpu assigned".
pub const UNASSIGNED_CPU_TOKEN: &str = "NONE";

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw database key.
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Raw database key.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id! {
    /// Primary key of a role row.
    RoleId
}
row_id! {
    /// Primary key of a cpu row.
    CpuId
}
row_id! {
    /// Primary key of an edgefile row.
    EdgeFileId
}
row_id! {
    /// Primary key of an edgemomsetup row.
    ThreadAssignmentId
}

/// Cpu binding of a role.
///
/// A stored cpu id of `0`, a null column, and the literal `NONE` all mean the
/// role is not placed on any node. Unassigned roles never take part in
/// account uniqueness checks and never dirty a cpu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CpuAssignment {
    /// Not bound to a node.
    #[default]
    Unassigned,
    /// Bound to the given cpu.
    Assigned(CpuId),
}

impl CpuAssignment {
    /// Interpret a nullable cpu column.
    pub fn from_column(raw: Option<i64>) -> Self {
        match raw {
            None | Some(0) => Self::Unassigned,
            Some(id) => Self::Assigned(CpuId::new(id)),
        }
    }

    /// Value written back to the nullable cpu column.
    pub fn to_column(self) -> Option<i64> {
        match self {
            Self::Unassigned => None,
            Self::Assigned(id) => Some(id.get()),
        }
    }

    /// The assigned cpu, if any.
    pub fn cpu_id(self) -> Option<CpuId> {
        match self {
            Self::Unassigned => None,
            Self::Assigned(id) => Some(id),
        }
    }

    /// Whether the role is placed on a node.
    pub fn is_assigned(self) -> bool {
        matches!(self, Self::Assigned(_))
    }
}

impl From<CpuId> for CpuAssignment {
    fn from(value: CpuId) -> Self {
        Self::from_column(Some(value.get()))
    }
}

/// Errors raised when parsing a cpu selection typed by an operator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CpuAssignmentParseError {
    /// The value is neither `NONE` nor an integer id.
    #[error("cpu selection `{value}` is neither NONE nor a numeric id")]
    Invalid { value: String },
}

impl std::str::FromStr for CpuAssignment {
    type Err = CpuAssignmentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(UNASSIGNED_CPU_TOKEN) {
            return Ok(Self::Unassigned);
        }
        trimmed
            .parse::<i64>()
            .map(|raw| Self::from_column(Some(raw)))
            .map_err(|_| CpuAssignmentParseError::Invalid {
                value: trimmed.to_owned(),
            })
    }
}

impl fmt::Display for CpuAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unassigned => f.write_str(UNASSIGNED_CPU_TOKEN),
            Self::Assigned(id) => write!(f, "{id}"),
        }
    }
}

/// A logical service instance assignable to a cpu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub ipadr: String,
    pub accounts: AccountSet,
    pub cpu: CpuAssignment,
    pub has_data: bool,
    pub description: String,
}

/// A physical or virtual node hosting roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cpu {
    pub id: CpuId,
    pub name: String,
    /// Must be unique across all cpus.
    pub node_number: i32,
    pub ipadr: String,
    pub os: String,
    pub has_data: bool,
    pub edgeprop: String,
    pub crontab: String,
}

/// A stored configuration file deployed to nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeFile {
    pub id: EdgeFileId,
    /// Conventionally `<prefix>.<role>.<account>`.
    pub name: String,
    pub content: String,
}

/// An edgemomsetup row binding a thread to a role and account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadAssignment {
    pub id: ThreadAssignmentId,
    pub role_id: RoleId,
    pub account: String,
    pub edge_file_id: Option<EdgeFileId>,
    pub tag: String,
    pub args: String,
}
