//! End-to-end commit behaviour over the in-memory inventory store.

use std::sync::Arc;

use edgeconfig::domain::{
    ChangeCommitCoordinator, CommitError, CpuAssignment, CpuId, EdgeFileId, ErrorCode,
    NamingRules, RoleEditRequest, RoleId, ThreadAssignmentId,
};
use edgeconfig::outbound::memory::InMemoryInventoryStore;
use edgeconfig::test_support::inventory::{cpu, edge_file, role, seeded_fleet};
use rstest::{fixture, rstest};

const QS: RoleId = RoleId::new(1);
const GACQ1: RoleId = RoleId::new(3);
const GACQ4: RoleId = RoleId::new(4);

struct Harness {
    store: Arc<InMemoryInventoryStore>,
    coordinator: Arc<ChangeCommitCoordinator<InMemoryInventoryStore>>,
}

impl Harness {
    fn edit(role: RoleId, cpu: Option<i64>, accounts: &str) -> RoleEditRequest {
        RoleEditRequest {
            role_id: role,
            cpu: CpuAssignment::from_column(cpu),
            accounts: accounts.to_owned(),
        }
    }

    fn edge_file_name(&self, id: i64) -> String {
        self.store
            .edge_file(EdgeFileId::new(id))
            .map(|file| file.name)
            .expect("edgefile exists")
    }

    fn thread_account(&self, id: i64) -> String {
        self.store
            .thread_assignment(ThreadAssignmentId::new(id))
            .map(|assignment| assignment.account)
            .expect("thread assignment exists")
    }

    fn role_dirty(&self, id: RoleId) -> bool {
        self.store.role(id).expect("role exists").has_data
    }

    fn cpu_dirty(&self, id: i64) -> bool {
        self.store.cpu(CpuId::new(id)).expect("cpu exists").has_data
    }
}

#[fixture]
fn harness() -> Harness {
    let store = Arc::new(seeded_fleet());
    let coordinator = Arc::new(ChangeCommitCoordinator::new(
        Arc::clone(&store),
        Arc::new(NamingRules::default()),
    ));
    Harness { store, coordinator }
}

#[rstest]
#[tokio::test]
async fn moving_qs_onto_dl_cpu_with_dl_account_is_rejected(harness: Harness) {
    let err = harness
        .coordinator
        .commit_role_edit(Harness::edit(QS, Some(2), "dl"))
        .await
        .expect_err("dl already used on cpu 2");

    let CommitError::DuplicateAccount { account, .. } = &err else {
        panic!("expected duplicate account, got {err:?}");
    };
    assert_eq!(account, "dl");
    let qs = harness.store.role(QS).expect("QS exists");
    assert_eq!(qs.cpu, CpuAssignment::Assigned(CpuId::new(1)));
    assert_eq!(qs.accounts.serialize(), "qs");
    assert!(!harness.cpu_dirty(1) && !harness.cpu_dirty(2));
}

#[rstest]
#[tokio::test]
async fn renaming_onto_a_neighbours_account_is_rejected() {
    let store = Arc::new(InMemoryInventoryStore::new());
    store.insert_cpu(cpu(3, "node3"));
    store.insert_role(role(1, "QS", Some(3), "edge query"));
    store.insert_role(role(2, "DL", Some(3), "dl"));
    let coordinator = ChangeCommitCoordinator::new(
        Arc::clone(&store),
        Arc::new(NamingRules::default()),
    );

    let err = coordinator
        .commit_role_edit(Harness::edit(QS, Some(3), "edge dl"))
        .await
        .expect_err("dl belongs to DL");

    assert_eq!(err.code(), ErrorCode::DuplicateAccount);
    assert!(err.to_string().contains("dl"));
    let accounts = |id| store.role(RoleId::new(id)).expect("exists").accounts.serialize();
    assert_eq!(accounts(1), "edge query");
    assert_eq!(accounts(2), "dl");
}

#[rstest]
#[tokio::test]
async fn rename_rewrites_edge_files_and_thread_assignments(harness: Harness) {
    let outcome = harness
        .coordinator
        .commit_role_edit(Harness::edit(GACQ1, Some(1), "vdl vdl3"))
        .await
        .expect("rename commits");

    assert_eq!(outcome.renames.applied.len(), 1);
    assert_eq!(harness.edge_file_name(11), "crontab.gacq1.vdl3");
    assert_eq!(harness.edge_file_name(10), "edgemom.setup.gacq1.vdl");
    assert_eq!(harness.thread_account(21), "vdl3");
    assert_eq!(harness.thread_account(20), "vdl");
    assert!(harness.role_dirty(GACQ1));
    assert!(!harness.cpu_dirty(1));
}

#[rstest]
#[tokio::test]
async fn swapping_accounts_swaps_suffixes(harness: Harness) {
    harness
        .coordinator
        .commit_role_edit(Harness::edit(GACQ1, Some(1), "vdl2 vdl"))
        .await
        .expect("swap commits");

    assert_eq!(harness.edge_file_name(10), "edgemom.setup.gacq1.vdl2");
    assert_eq!(harness.edge_file_name(11), "crontab.gacq1.vdl");
    assert_eq!(harness.edge_file_name(13), "edgemom.setup.xgacq1.vdl");
    assert_eq!(harness.thread_account(20), "vdl2");
    assert_eq!(harness.thread_account(21), "vdl");
}

#[rstest]
#[tokio::test]
async fn changing_the_account_count_touches_nothing(harness: Harness) {
    let err = harness
        .coordinator
        .commit_role_edit(Harness::edit(GACQ1, Some(1), "vdl vdl2 vdl3"))
        .await
        .expect_err("count changed");

    assert_eq!(err.code(), ErrorCode::AccountCountMismatch);
    assert_eq!(
        harness.store.role(GACQ1).expect("exists").accounts.serialize(),
        "vdl vdl2"
    );
    assert!(!harness.role_dirty(GACQ1));
}

#[rstest]
#[tokio::test]
async fn cpu_move_dirties_both_cpus(harness: Harness) {
    let outcome = harness
        .coordinator
        .commit_role_edit(Harness::edit(GACQ1, Some(2), "vdl vdl2"))
        .await
        .expect("move commits");

    assert!(harness.cpu_dirty(1));
    assert!(harness.cpu_dirty(2));
    assert!(!harness.role_dirty(GACQ1));
    assert_eq!(outcome.marks.cpus.len(), 2);
}

#[rstest]
#[tokio::test]
async fn saving_a_referenced_edge_file_dirties_its_role(harness: Harness) {
    let mut file = edge_file(10, "edgemom.setup.gacq1.vdl");
    file.content = "# new thread layout\n".to_owned();

    let outcome = harness
        .coordinator
        .commit_edge_file_edit(&file)
        .await
        .expect("edgefile commits");

    assert_eq!(outcome.marks.roles.iter().copied().collect::<Vec<_>>(), [GACQ1]);
    assert!(harness.role_dirty(GACQ1));
}

#[rstest]
#[tokio::test]
async fn reftek_file_dirties_gacq4_by_name(harness: Harness) {
    harness
        .coordinator
        .commit_edge_file_edit(&edge_file(12, "etc.~reftek.cfg"))
        .await
        .expect("edgefile commits");

    assert!(harness.role_dirty(GACQ4));
    assert!(!harness.role_dirty(GACQ1));
}

#[rstest]
#[tokio::test]
async fn repeating_a_commit_marks_nothing_new(harness: Harness) {
    let edit = Harness::edit(GACQ1, Some(2), "vdl vdl3");
    harness
        .coordinator
        .commit_role_edit(edit.clone())
        .await
        .expect("first commit");
    harness.store.clear_dirty_flags();

    let again = harness
        .coordinator
        .commit_role_edit(edit)
        .await
        .expect("second commit");

    assert!(again.renames.is_empty());
    assert!(again.marks.is_empty());
    assert!(!harness.role_dirty(GACQ1));
    assert!(!harness.cpu_dirty(2));
}

#[rstest]
#[tokio::test]
async fn failed_cascade_restores_every_row(harness: Harness) {
    harness
        .store
        .fail_thread_assignment_update(ThreadAssignmentId::new(21));

    let err = harness
        .coordinator
        .commit_role_edit(Harness::edit(GACQ1, Some(1), "vdl vdl3"))
        .await
        .expect_err("thread assignment write fails");

    assert!(err.left_inventory_unchanged());
    assert_eq!(harness.edge_file_name(11), "crontab.gacq1.vdl2");
    assert_eq!(
        harness.store.role(GACQ1).expect("exists").accounts.serialize(),
        "vdl vdl2"
    );
    assert!(!harness.role_dirty(GACQ1));
}

#[rstest]
#[tokio::test]
async fn failed_compensation_is_reported_as_partial_success(harness: Harness) {
    harness
        .store
        .fail_thread_assignment_update(ThreadAssignmentId::new(21));
    harness.store.fail_edge_file_rename_to("crontab.gacq1.vdl2");

    let err = harness
        .coordinator
        .commit_role_edit(Harness::edit(GACQ1, Some(1), "vdl vdl3"))
        .await
        .expect_err("cascade and rollback fail");

    assert_eq!(err.code(), ErrorCode::PartialSuccess);
    let CommitError::RenameFailed { unreverted, .. } = &err else {
        panic!("expected rename failure, got {err:?}");
    };
    assert_eq!(unreverted.len(), 1);
    assert_eq!(harness.edge_file_name(11), "crontab.gacq1.vdl3");
}

#[rstest]
#[tokio::test]
async fn removing_an_account_reports_orphaned_threads(harness: Harness) {
    let outcome = harness
        .coordinator
        .commit_account_membership(GACQ1, "vdl")
        .await
        .expect("membership commits");

    assert_eq!(outcome.removed, ["vdl2"]);
    let orphans: Vec<_> = outcome.orphaned.iter().map(|assignment| assignment.id).collect();
    assert_eq!(orphans, [ThreadAssignmentId::new(21)]);
    assert_eq!(harness.edge_file_name(11), "crontab.gacq1.vdl2");
    assert!(harness.role_dirty(GACQ1));
}

#[rstest]
#[tokio::test]
async fn membership_refuses_to_rename_without_cascading(harness: Harness) {
    let err = harness
        .coordinator
        .commit_account_membership(GACQ1, "vdl vdl3")
        .await
        .expect_err("vdl2 -> vdl3 is a rename");

    assert_eq!(err.code(), ErrorCode::AccountRenameRequired);
    assert_eq!(
        harness.store.role(GACQ1).expect("exists").accounts.serialize(),
        "vdl vdl2"
    );
    assert_eq!(harness.edge_file_name(11), "crontab.gacq1.vdl2");
    assert_eq!(harness.thread_account(21), "vdl2");
    assert!(!harness.role_dirty(GACQ1));
}
