//! Test utilities shared by unit tests (in `src/`) and integration suites
//! (in `tests/`). Compiled for tests and under the `test-support` feature.

pub mod cap_fs {
    //! Capability-safe file helpers for tests that need files on disk.

    use std::io;
    use std::path::{Path, PathBuf};

    use cap_std::{ambient_authority, fs::Dir};

    /// Write bytes to a file through `cap_std`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use edgeconfig::test_support::cap_fs::write_file;
    ///
    /// let dir = tempfile::tempdir()?;
    /// write_file(&dir.path().join("rules.json"), b"{\"rules\":[]}")?;
    /// # Ok::<(), std::io::Error>(())
    /// ```
    pub fn write_file(path: &Path, contents: &[u8]) -> io::Result<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let file_name = path.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "path must include a file name")
        })?;
        let directory = Dir::open_ambient_dir(parent, ambient_authority())?;
        directory.write(Path::new(file_name), contents)
    }

    /// Create `name` with `contents` inside a fresh temporary directory.
    ///
    /// The directory is removed when the returned guard drops.
    pub fn temp_file(name: &str, contents: &str) -> io::Result<(tempfile::TempDir, PathBuf)> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(name);
        write_file(&path, contents.as_bytes())?;
        Ok((dir, path))
    }
}

pub mod inventory {
    //! Row builders and a seeded fleet for engine tests.

    use crate::domain::{
        AccountSet, Cpu, CpuAssignment, CpuId, EdgeFile, EdgeFileId, Role, RoleId,
        ThreadAssignment, ThreadAssignmentId,
    };
    use crate::outbound::memory::InMemoryInventoryStore;

    /// A clean role on `cpu` (`None` for unassigned).
    pub fn role(id: i64, name: &str, cpu: Option<i64>, accounts: &str) -> Role {
        Role {
            id: RoleId::new(id),
            name: name.to_owned(),
            ipadr: format!("10.0.0.{id}"),
            accounts: AccountSet::parse(accounts),
            cpu: CpuAssignment::from_column(cpu),
            has_data: false,
            description: String::new(),
        }
    }

    /// A clean cpu whose node number equals its id.
    pub fn cpu(id: i64, name: &str) -> Cpu {
        Cpu {
            id: CpuId::new(id),
            name: name.to_owned(),
            node_number: i32::try_from(id).unwrap_or(i32::MAX),
            ipadr: format!("10.1.0.{id}"),
            os: "Linux".to_owned(),
            has_data: false,
            edgeprop: String::new(),
            crontab: String::new(),
        }
    }

    pub fn edge_file(id: i64, name: &str) -> EdgeFile {
        EdgeFile {
            id: EdgeFileId::new(id),
            name: name.to_owned(),
            content: format!("# {name}\n"),
        }
    }

    pub fn thread_assignment(
        id: i64,
        role_id: i64,
        account: &str,
        edge_file_id: Option<i64>,
    ) -> ThreadAssignment {
        ThreadAssignment {
            id: ThreadAssignmentId::new(id),
            role_id: RoleId::new(role_id),
            account: account.to_owned(),
            edge_file_id: edge_file_id.map(EdgeFileId::new),
            tag: "EdgeMom".to_owned(),
            args: String::new(),
        }
    }

    /// Two cpus and four roles:
    ///
    /// | role  | id | cpu | accounts    |
    /// |-------|----|-----|-------------|
    /// | QS    | 1  | 1   | `qs`        |
    /// | DL    | 2  | 2   | `dl`        |
    /// | gacq1 | 3  | 1   | `vdl vdl2`  |
    /// | gacq4 | 4  | 2   | `reftek`    |
    ///
    /// gacq1 owns `edgemom.setup.gacq1.vdl`, `crontab.gacq1.vdl2` and two
    /// thread assignments; `etc.~reftek.cfg` belongs to gacq4 by name only.
    pub fn seeded_fleet() -> InMemoryInventoryStore {
        let store = InMemoryInventoryStore::new();
        store.insert_cpu(cpu(1, "alpha"));
        store.insert_cpu(cpu(2, "beta"));
        store.insert_role(role(1, "QS", Some(1), "qs"));
        store.insert_role(role(2, "DL", Some(2), "dl"));
        store.insert_role(role(3, "gacq1", Some(1), "vdl vdl2"));
        store.insert_role(role(4, "gacq4", Some(2), "reftek"));
        store.insert_edge_file(edge_file(10, "edgemom.setup.gacq1.vdl"));
        store.insert_edge_file(edge_file(11, "crontab.gacq1.vdl2"));
        store.insert_edge_file(edge_file(12, "etc.~reftek.cfg"));
        store.insert_edge_file(edge_file(13, "edgemom.setup.xgacq1.vdl"));
        store.insert_thread_assignment(thread_assignment(20, 3, "vdl", Some(10)));
        store.insert_thread_assignment(thread_assignment(21, 3, "vdl2", None));
        store
    }
}
