//! Diesel table definitions for the inventory schema.
//!
//! These definitions must match `migrations/` exactly. Column names follow
//! the legacy inventory (`cpuid`, `hasdata`, `edgefileid`); the row structs
//! in `models.rs` map them onto domain names.

diesel::table! {
    /// Physical nodes.
    cpus (id) {
        id -> Int8,
        cpu -> Varchar,
        /// Unique across all cpus.
        nodenumber -> Int4,
        ipadr -> Varchar,
        os -> Varchar,
        /// Dirty flag polled by the deployment agents.
        hasdata -> Bool,
        edgeprop -> Text,
        crontab -> Text,
    }
}

diesel::table! {
    /// Logical service instances.
    roles (id) {
        id -> Int8,
        role -> Varchar,
        ipadr -> Varchar,
        /// Space-separated account list.
        accounts -> Text,
        /// `NULL` or `0` when unassigned.
        cpuid -> Nullable<Int8>,
        hasdata -> Bool,
        description -> Text,
    }
}

diesel::table! {
    /// Named configuration files, conventionally `<prefix>.<role>.<account>`.
    edgefiles (id) {
        id -> Int8,
        edgefile -> Varchar,
        content -> Text,
    }
}

diesel::table! {
    /// Per-role thread configurations.
    edgemomsetup (id) {
        id -> Int8,
        roleid -> Int8,
        account -> Varchar,
        edgefileid -> Nullable<Int8>,
        tag -> Varchar,
        args -> Text,
    }
}

diesel::joinable!(edgemomsetup -> roles (roleid));
diesel::joinable!(edgemomsetup -> edgefiles (edgefileid));

diesel::allow_tables_to_appear_in_same_query!(cpus, roles, edgefiles, edgemomsetup);
